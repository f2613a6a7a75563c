//! Periodic mean-field solutions sampled on a mesh of k-points.

use std::fmt;

use derive_builder::Builder;
use itertools::Itertools;
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Axis};
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auxiliary::lattice::{KMesh, Lattice};
use crate::basis::ao::BasisAngularOrder;
use crate::errors::UnfoldError;
use crate::symmetry::kpoint_symmetry::KPointSymmetry;
use crate::symmetry::symmetry_adapted::{
    assemble_orbitals, IrrepBlockCoefficients, SymmetryAdaptedBasis,
};
use crate::target::SpinConstraint;

pub mod supercell;


// ==================
// Struct definitions
// ==================

// --------------
// KPointOrbitals
// --------------

/// Structure containing the orbitals of one spin channel at one k-point.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate", error = "UnfoldError"))]
pub struct KPointOrbitals {
    /// The complex coefficients of the orbitals, of shape (basis functions, orbitals).
    coefficients: Array2<Complex<f64>>,

    /// The orbital energies.
    energies: Array1<f64>,

    /// The orbital occupation numbers.
    occupations: Array1<f64>,

    /// The irrep label of every orbital, if the orbitals are symmetry-adapted.
    #[builder(default = "None")]
    #[serde(default)]
    irrep_labels: Option<Vec<String>>,
}

impl KPointOrbitalsBuilder {
    fn validate(&self) -> Result<(), UnfoldError> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| UnfoldError::Dimension("no coefficients found".to_string()))?;
        let energies = self
            .energies
            .as_ref()
            .ok_or_else(|| UnfoldError::Dimension("no orbital energies found".to_string()))?;
        let occupations = self
            .occupations
            .as_ref()
            .ok_or_else(|| UnfoldError::Dimension("no occupations found".to_string()))?;
        let irrep_labels = self.irrep_labels.as_ref().and_then(|labels| labels.as_ref());
        check_orbital_dimensions(coefficients, energies, occupations, irrep_labels)
    }
}

impl KPointOrbitals {
    /// Returns a builder to construct a new [`KPointOrbitals`].
    pub fn builder() -> KPointOrbitalsBuilder {
        KPointOrbitalsBuilder::default()
    }

    /// Constructs orbitals from a symmetry-adapted basis and per-irrep coefficient blocks.
    ///
    /// The orbitals are assembled irrep by irrep in canonical order and carry their irrep labels;
    /// `energies` and `occupations` refer to the assembled order.
    pub fn from_symmetry_adapted(
        basis: &SymmetryAdaptedBasis<Complex<f64>>,
        blocks: &IrrepBlockCoefficients<Complex<f64>>,
        energies: Array1<f64>,
        occupations: Array1<f64>,
    ) -> Result<Self, UnfoldError> {
        let (coefficients, labels) = assemble_orbitals(basis, blocks);
        KPointOrbitals::builder()
            .coefficients(coefficients)
            .energies(energies)
            .occupations(occupations)
            .irrep_labels(Some(labels))
            .build()
    }

    /// Checks the internal consistency of a deserialised structure.
    pub fn validate(&self) -> Result<(), UnfoldError> {
        check_orbital_dimensions(
            &self.coefficients,
            &self.energies,
            &self.occupations,
            self.irrep_labels.as_ref(),
        )
    }

    /// The orbital coefficients.
    pub fn coefficients(&self) -> &Array2<Complex<f64>> {
        &self.coefficients
    }

    /// The orbital energies.
    pub fn energies(&self) -> &Array1<f64> {
        &self.energies
    }

    /// The orbital occupation numbers.
    pub fn occupations(&self) -> &Array1<f64> {
        &self.occupations
    }

    /// The irrep labels of the orbitals, if available.
    pub fn irrep_labels(&self) -> Option<&Vec<String>> {
        self.irrep_labels.as_ref()
    }

    /// The number of basis functions.
    pub fn nao(&self) -> usize {
        self.coefficients.nrows()
    }

    /// The number of orbitals.
    pub fn nmo(&self) -> usize {
        self.coefficients.ncols()
    }

    /// Returns the orbitals whose occupation numbers exceed `thresh`.
    pub fn occupied(&self, thresh: f64) -> KPointOrbitals {
        let indices = self
            .occupations
            .iter()
            .positions(|occ| *occ > thresh)
            .collect_vec();
        KPointOrbitals {
            coefficients: self.coefficients.select(Axis(1), &indices),
            energies: self.energies.select(Axis(0), &indices),
            occupations: self.occupations.select(Axis(0), &indices),
            irrep_labels: self
                .irrep_labels
                .as_ref()
                .map(|labels| indices.iter().map(|i| labels[*i].clone()).collect()),
        }
    }
}

// -----------------
// PeriodicMeanField
// -----------------

/// Structure containing a periodic mean-field solution sampled on a mesh of k-points.
///
/// When [`Self::kpoint_symmetry`] is present, only the irreducible k-points are stored and the
/// full mesh is generated by [`Self::expand_to_full_mesh`].
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate", error = "UnfoldError"))]
pub struct PeriodicMeanField {
    /// The primitive lattice.
    lattice: Lattice,

    /// The basis layout of the primitive cell.
    bao: BasisAngularOrder,

    /// The spin constraint of the solution.
    spin_constraint: SpinConstraint,

    /// The Cartesian k-points at which the solution is stored.
    kpts: Vec<Vector3<f64>>,

    /// The atomic-orbital overlap matrix at every stored k-point.
    overlaps: Vec<Array2<Complex<f64>>>,

    /// The orbitals of every spin channel at every stored k-point, indexed as `[spin][k]`.
    orbitals: Vec<Vec<KPointOrbitals>>,

    /// The stars of the stored k-points on the full mesh, present when only irreducible k-points
    /// are stored.
    #[builder(default = "None")]
    #[serde(default)]
    kpoint_symmetry: Option<KPointSymmetry>,
}

impl PeriodicMeanFieldBuilder {
    fn validate(&self) -> Result<(), UnfoldError> {
        let missing = |field: &str| UnfoldError::Dimension(format!("no {field} found"));
        check_mean_field(
            self.bao.as_ref().ok_or_else(|| missing("basis layout"))?,
            self.spin_constraint
                .as_ref()
                .ok_or_else(|| missing("spin constraint"))?,
            self.kpts.as_ref().ok_or_else(|| missing("k-points"))?,
            self.overlaps.as_ref().ok_or_else(|| missing("overlap matrices"))?,
            self.orbitals.as_ref().ok_or_else(|| missing("orbitals"))?,
            self.kpoint_symmetry.as_ref().and_then(|ksym| ksym.as_ref()),
        )
    }
}

impl PeriodicMeanField {
    /// Returns a builder to construct a new [`PeriodicMeanField`].
    pub fn builder() -> PeriodicMeanFieldBuilder {
        PeriodicMeanFieldBuilder::default()
    }

    /// Checks the internal consistency of a deserialised structure.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Dimension`] if any array dimension disagrees with the basis size,
    /// the number of k-points, or the number of spin channels.
    pub fn validate(&self) -> Result<(), UnfoldError> {
        check_mean_field(
            &self.bao,
            &self.spin_constraint,
            &self.kpts,
            &self.overlaps,
            &self.orbitals,
            self.kpoint_symmetry.as_ref(),
        )
    }

    /// The primitive lattice.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// The basis layout of the primitive cell.
    pub fn bao(&self) -> &BasisAngularOrder {
        &self.bao
    }

    /// The spin constraint.
    pub fn spin_constraint(&self) -> SpinConstraint {
        self.spin_constraint
    }

    /// The stored Cartesian k-points.
    pub fn kpts(&self) -> &[Vector3<f64>] {
        &self.kpts
    }

    /// The overlap matrices at the stored k-points.
    pub fn overlaps(&self) -> &[Array2<Complex<f64>>] {
        &self.overlaps
    }

    /// The orbitals, indexed as `[spin][k]`.
    pub fn orbitals(&self) -> &[Vec<KPointOrbitals>] {
        &self.orbitals
    }

    /// The stars of the stored k-points, if only irreducible k-points are stored.
    pub fn kpoint_symmetry(&self) -> Option<&KPointSymmetry> {
        self.kpoint_symmetry.as_ref()
    }

    /// The number of basis functions in the primitive cell.
    pub fn nao(&self) -> usize {
        self.bao.n_funcs()
    }

    /// The k-points of the full mesh.
    pub fn full_kpts(&self) -> &[Vector3<f64>] {
        self.kpoint_symmetry
            .as_ref()
            .map(|ksym| ksym.full_kpts())
            .unwrap_or(&self.kpts)
    }

    /// Infers the k-point mesh from the full set of k-points.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the k-points do not form a complete mesh commensurate
    /// with an integer supercell.
    pub fn mesh(&self) -> Result<KMesh, UnfoldError> {
        KMesh::from_kpts(&self.lattice, self.full_kpts())
    }

    /// Generates the solution on the full mesh from the irreducible k-points using the stored
    /// space-group operations.
    ///
    /// Every full-mesh k-point $`\mathbf{k}' = g\mathbf{k}`$ receives
    /// $`\mathbf{C}_{\mathbf{k}'} = \mathbf{D}^{\mathbf{k}}(g)\mathbf{C}_{\mathbf{k}}`$ and
    /// $`\mathbf{S}(\mathbf{k}') = \mathbf{D}\mathbf{S}(\mathbf{k})\mathbf{D}^{\dagger}`$, with
    /// complex conjugation for time-reversed operations. Energies and occupations are carried
    /// over; irrep labels are kept only for the irreducible k-points themselves. A solution
    /// without symmetry information is returned unchanged.
    ///
    /// # Arguments
    ///
    /// * `thresh` - Threshold on fractional coordinates and scaled k-points for identifying atoms
    ///   and k-points.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if an operation does not map the crystal onto itself or
    /// maps an irreducible k-point away from its recorded image.
    pub fn expand_to_full_mesh(&self, thresh: f64) -> Result<PeriodicMeanField, UnfoldError> {
        let Some(ksym) = self.kpoint_symmetry.as_ref() else {
            return Ok(self.clone());
        };
        let expanded = ksym
            .full_kpts()
            .par_iter()
            .zip(ksym.images().par_iter())
            .map(|(kpt_full, image)| {
                let op = &ksym.operations()[image.operation_index];
                let kpt_irr = &self.kpts[image.irreducible_index];
                let (kpt_image, dmat) =
                    op.ao_representation(&self.lattice, &self.bao, kpt_irr, thresh)?;
                if !self.lattice.kpts_equivalent(&kpt_image, kpt_full, thresh) {
                    return Err(UnfoldError::Domain(format!(
                        "operation {op} does not map the irreducible k-point {} onto the full-mesh k-point ({})",
                        image.irreducible_index,
                        kpt_full.iter().map(|x| format!("{x:+.6}")).join(", ")
                    )));
                }
                let overlap = op.transform_overlap(&dmat, &self.overlaps[image.irreducible_index])?;
                let orbitals = self
                    .orbitals
                    .iter()
                    .map(|channel| {
                        let orbs = &channel[image.irreducible_index];
                        KPointOrbitals {
                            coefficients: op.transform_coefficients(&dmat, &orbs.coefficients),
                            energies: orbs.energies.clone(),
                            occupations: orbs.occupations.clone(),
                            irrep_labels: if image.operation_index == 0 {
                                orbs.irrep_labels.clone()
                            } else {
                                None
                            },
                        }
                    })
                    .collect_vec();
                Ok((overlap, orbitals))
            })
            .collect::<Result<Vec<_>, UnfoldError>>()?;
        log::debug!(
            "Expanded {} irreducible k-point(s) to {} k-point(s).",
            self.kpts.len(),
            expanded.len()
        );

        let nchannels = self.spin_constraint.n_channels();
        let mut overlaps = Vec::with_capacity(expanded.len());
        let mut orbitals = vec![Vec::with_capacity(expanded.len()); nchannels];
        for (overlap, orbs) in expanded {
            overlaps.push(overlap);
            for (ispin, orb) in orbs.into_iter().enumerate() {
                orbitals[ispin].push(orb);
            }
        }
        Ok(PeriodicMeanField {
            lattice: self.lattice.clone(),
            bao: self.bao.clone(),
            spin_constraint: self.spin_constraint,
            kpts: ksym.full_kpts().to_vec(),
            overlaps,
            orbitals,
            kpoint_symmetry: None,
        })
    }
}

impl fmt::Display for PeriodicMeanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Primitive lattice:")?;
        write!(f, "{}", self.lattice)?;
        writeln!(f, "Spin constraint: {}", self.spin_constraint)?;
        writeln!(f, "Basis functions per cell: {}", self.nao())?;
        writeln!(f, "Stored k-points: {}", self.kpts.len())?;
        if let Some(ksym) = self.kpoint_symmetry.as_ref() {
            writeln!(f, "Full-mesh k-points: {}", ksym.full_kpts().len())?;
        }
        for (ispin, channel) in self.orbitals.iter().enumerate() {
            writeln!(
                f,
                "Orbitals per k-point (spin channel {ispin}): {}",
                channel.iter().map(|orbs| orbs.nmo().to_string()).join(", ")
            )?;
        }
        Ok(())
    }
}

// =========
// Functions
// =========

/// Checks that the coefficients, energies, occupations and labels of a set of orbitals agree in
/// size.
fn check_orbital_dimensions(
    coefficients: &Array2<Complex<f64>>,
    energies: &Array1<f64>,
    occupations: &Array1<f64>,
    irrep_labels: Option<&Vec<String>>,
) -> Result<(), UnfoldError> {
    let nmo = coefficients.ncols();
    if energies.len() != nmo {
        return Err(UnfoldError::Dimension(format!(
            "{} orbital energies given for {nmo} orbitals",
            energies.len()
        )));
    }
    if occupations.len() != nmo {
        return Err(UnfoldError::Dimension(format!(
            "{} occupation numbers given for {nmo} orbitals",
            occupations.len()
        )));
    }
    if let Some(labels) = irrep_labels {
        if labels.len() != nmo {
            return Err(UnfoldError::Dimension(format!(
                "{} irrep labels given for {nmo} orbitals",
                labels.len()
            )));
        }
    }
    Ok(())
}

/// Checks the dimensions of all components of a periodic mean-field solution against each other.
fn check_mean_field(
    bao: &BasisAngularOrder,
    spin_constraint: &SpinConstraint,
    kpts: &[Vector3<f64>],
    overlaps: &[Array2<Complex<f64>>],
    orbitals: &[Vec<KPointOrbitals>],
    kpoint_symmetry: Option<&KPointSymmetry>,
) -> Result<(), UnfoldError> {
    let nao = bao.n_funcs();
    let nk = kpts.len();
    if nk == 0 {
        return Err(UnfoldError::Dimension("no k-points have been given".to_string()));
    }
    if overlaps.len() != nk {
        return Err(UnfoldError::Dimension(format!(
            "{} overlap matrices given for {nk} k-points",
            overlaps.len()
        )));
    }
    if let Some((k, smat)) = overlaps
        .iter()
        .enumerate()
        .find(|(_, smat)| smat.shape() != [nao, nao])
    {
        log::error!("Overlap matrix at k-point {k} has shape {:?}.", smat.shape());
        return Err(UnfoldError::Dimension(format!(
            "the overlap matrix at k-point {k} has shape {:?} instead of [{nao}, {nao}]",
            smat.shape()
        )));
    }
    if orbitals.len() != spin_constraint.n_channels() {
        return Err(UnfoldError::Dimension(format!(
            "{} spin channel(s) of orbitals given instead of {}",
            orbitals.len(),
            spin_constraint.n_channels()
        )));
    }
    for (ispin, channel) in orbitals.iter().enumerate() {
        if channel.len() != nk {
            return Err(UnfoldError::Dimension(format!(
                "spin channel {ispin} holds orbitals for {} k-points instead of {nk}",
                channel.len()
            )));
        }
        for (k, orbs) in channel.iter().enumerate() {
            if orbs.nao() != nao {
                log::error!(
                    "Orbital coefficients of spin channel {ispin} at k-point {k} span {} basis functions.",
                    orbs.nao()
                );
                return Err(UnfoldError::Dimension(format!(
                    "the coefficients of spin channel {ispin} at k-point {k} have {} rows instead of {nao}",
                    orbs.nao()
                )));
            }
            orbs.validate()?;
        }
    }
    if let Some(ksym) = kpoint_symmetry {
        ksym.validate()?;
        if ksym.n_irreducible() != nk {
            return Err(UnfoldError::Dimension(format!(
                "the k-point stars reference {} irreducible k-points but {nk} are stored",
                ksym.n_irreducible()
            )));
        }
    }
    Ok(())
}
