//! Driver for unfolding k-point-sampled mean-field solutions onto the commensurate supercell.

use std::fmt;

use anyhow::format_err;
use derive_builder::Builder;
use itertools::Itertools;
use log;
use ndarray::{Array1, Array2, Axis};
use ndarray_linalg::Norm;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::auxiliary::lattice::{KMesh, SCALED_KPT_THRESHOLD};
use crate::drivers::UnfoldDriver;
use crate::errors::{NumericalWarning, NumericalWarningKind, UnfoldError};
use crate::io::format::{kunfold_output, log_subtitle, log_title, nice_bool, write_subtitle, UnfoldOutput};
use crate::io::{write_kunfold_binary, KUnfoldFileType};
use crate::nonortho::LowdinOrthonormalisable;
use crate::target::mean_field::supercell::SupercellMeanField;
use crate::target::mean_field::{KPointOrbitals, PeriodicMeanField};
use crate::unfolding::{
    assemble_supercell_columns, check_time_reversal_partners, phase_matrix, realise_orbitals,
    to_supercell_ao_integrals, RealisationThresholds, OCCUPATION_THRESHOLD,
};


// ================
// Enum definitions
// ================

/// An enumerated type for the orbitals of every k-point carried onto the supercell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitalSelection {
    /// All orbitals, occupied and virtual.
    All,

    /// Only orbitals whose occupation numbers are positive.
    OccupiedOnly,
}

impl fmt::Display for OrbitalSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrbitalSelection::All => write!(f, "all orbitals"),
            OrbitalSelection::OccupiedOnly => write!(f, "occupied orbitals only"),
        }
    }
}

/// An enumerated type for the order of the supercell orbitals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitalOrdering {
    /// Ascending orbital energy, ties kept in k-point-major order.
    Energy,

    /// Grouped by k-point, in the order of the k-points.
    KPointMajor,
}

impl fmt::Display for OrbitalOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrbitalOrdering::Energy => write!(f, "ascending energy"),
            OrbitalOrdering::KPointMajor => write!(f, "k-point-major"),
        }
    }
}

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

const fn default_true() -> bool {
    true
}
const fn default_selection() -> OrbitalSelection {
    OrbitalSelection::All
}
const fn default_ordering() -> OrbitalOrdering {
    OrbitalOrdering::Energy
}
const fn default_kpt_thresh() -> f64 {
    SCALED_KPT_THRESHOLD
}
const fn default_real_thresh() -> f64 {
    1e-4
}
const fn default_imag_residue_thresh() -> f64 {
    1e-4
}
const fn default_zero_thresh() -> f64 {
    1e-7
}
const fn default_hermiticity_thresh() -> f64 {
    1e-8
}
const fn default_ortho_thresh() -> f64 {
    1e-6
}
const fn default_reortho_thresh() -> f64 {
    1e-6
}

/// A structure containing control parameters for k-point unfolding.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
pub struct KPointUnfoldingParams {
    /// Boolean indicating if the supercell orbitals are to be made real.
    #[builder(default = "default_true()")]
    #[serde(default = "default_true")]
    pub realise: bool,

    /// Boolean indicating if the supercell orbitals are to be re-orthonormalised against the
    /// supercell overlap matrix.
    #[builder(default = "default_true()")]
    #[serde(default = "default_true")]
    pub reorthonormalise: bool,

    /// The orbitals of every k-point to be carried onto the supercell.
    #[builder(default = "default_selection()")]
    #[serde(default = "default_selection")]
    pub orbital_selection: OrbitalSelection,

    /// The order of the supercell orbitals.
    #[builder(default = "default_ordering()")]
    #[serde(default = "default_ordering")]
    pub orbital_ordering: OrbitalOrdering,

    /// Optional mesh dimensions expected by the caller. If given, they must be three positive
    /// integers matching the mesh spanned by the k-points of the solution.
    #[builder(default = "None")]
    #[serde(default)]
    pub mesh_descriptor: Option<Vec<f64>>,

    /// Threshold on scaled k-point coordinates and fractional atom coordinates for identifying
    /// k-points and atoms.
    #[builder(default = "default_kpt_thresh()")]
    #[serde(default = "default_kpt_thresh")]
    pub kpt_threshold: f64,

    /// Coefficients whose imaginary parts all fall below this threshold are taken as real
    /// directly during realisation.
    #[builder(default = "default_real_thresh()")]
    #[serde(default = "default_real_thresh")]
    pub real_threshold: f64,

    /// Tolerance on the imaginary part of the energy-weighted supercell matrix during
    /// realisation.
    #[builder(default = "default_imag_residue_thresh()")]
    #[serde(default = "default_imag_residue_thresh")]
    pub imag_residue_threshold: f64,

    /// Threshold for discarding zero eigenvalues of overlap and energy-weighted matrices.
    #[builder(default = "default_zero_thresh()")]
    #[serde(default = "default_zero_thresh")]
    pub zero_eigenvalue_threshold: f64,

    /// Threshold for verifying that the supercell overlap matrix is symmetric.
    #[builder(default = "default_hermiticity_thresh()")]
    #[serde(default = "default_hermiticity_thresh")]
    pub hermiticity_threshold: f64,

    /// Tolerance on the deviation of the supercell orbitals from orthonormality.
    #[builder(default = "default_ortho_thresh()")]
    #[serde(default = "default_ortho_thresh")]
    pub orthonormality_threshold: f64,

    /// Tolerance on the change of the supercell orbitals upon re-orthonormalisation.
    #[builder(default = "default_reortho_thresh()")]
    #[serde(default = "default_reortho_thresh")]
    pub reorthonormalisation_threshold: f64,

    /// Optional name for saving the result as a binary file of type [`KUnfoldFileType::Scf`]. If
    /// `None`, the result will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub result_save_name: Option<String>,
}

impl KPointUnfoldingParams {
    /// Returns a builder to construct a [`KPointUnfoldingParams`] structure.
    pub fn builder() -> KPointUnfoldingParamsBuilder {
        KPointUnfoldingParamsBuilder::default()
    }

    fn realisation_thresholds(&self) -> RealisationThresholds {
        RealisationThresholds {
            real: self.real_threshold,
            imag_residue: self.imag_residue_threshold,
            offdiag: self.hermiticity_threshold,
            zeroov: self.zero_eigenvalue_threshold,
        }
    }
}

impl Default for KPointUnfoldingParams {
    fn default() -> Self {
        KPointUnfoldingParams {
            realise: default_true(),
            reorthonormalise: default_true(),
            orbital_selection: default_selection(),
            orbital_ordering: default_ordering(),
            mesh_descriptor: None,
            kpt_threshold: default_kpt_thresh(),
            real_threshold: default_real_thresh(),
            imag_residue_threshold: default_imag_residue_thresh(),
            zero_eigenvalue_threshold: default_zero_thresh(),
            hermiticity_threshold: default_hermiticity_thresh(),
            orthonormality_threshold: default_ortho_thresh(),
            reorthonormalisation_threshold: default_reortho_thresh(),
            result_save_name: None,
        }
    }
}

impl fmt::Display for KPointUnfoldingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Orbitals carried onto the supercell: {}", self.orbital_selection)?;
        writeln!(f, "Supercell orbital order: {}", self.orbital_ordering)?;
        if let Some(descriptor) = self.mesh_descriptor.as_ref() {
            writeln!(
                f,
                "Expected k-point mesh: {}",
                descriptor.iter().map(|x| x.to_string()).join(" × ")
            )?;
        }
        writeln!(f, "Make orbitals real: {}", nice_bool(self.realise))?;
        if self.realise {
            writeln!(f, "  Realness threshold: {:.3e}", self.real_threshold)?;
            writeln!(
                f,
                "  Imaginary residue tolerance: {:.3e}",
                self.imag_residue_threshold
            )?;
        }
        writeln!(
            f,
            "Re-orthonormalise orbitals: {}",
            nice_bool(self.reorthonormalise)
        )?;
        if self.reorthonormalise {
            writeln!(
                f,
                "  Re-orthonormalisation tolerance: {:.3e}",
                self.reorthonormalisation_threshold
            )?;
        }
        writeln!(f, "k-point threshold: {:.3e}", self.kpt_threshold)?;
        writeln!(
            f,
            "Zero-eigenvalue threshold: {:.3e}",
            self.zero_eigenvalue_threshold
        )?;
        writeln!(
            f,
            "Orthonormality tolerance: {:.3e}",
            self.orthonormality_threshold
        )?;
        writeln!(
            f,
            "Save unfolding results to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                format!("{name}.{}", KUnfoldFileType::Scf.ext())
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Result
// ------

/// A structure to contain k-point unfolding results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct KPointUnfoldingResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: KPointUnfoldingParams,

    /// The unfolded supercell solution.
    pub supercell_mean_field: SupercellMeanField,
}

impl KPointUnfoldingResult {
    /// Returns a builder to construct a [`KPointUnfoldingResult`] structure.
    fn builder() -> KPointUnfoldingResultBuilder {
        KPointUnfoldingResultBuilder::default()
    }
}

impl fmt::Display for KPointUnfoldingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, "Unfolded supercell solution")?;
        writeln!(f)?;
        write!(f, "{}", self.supercell_mean_field)?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for unfolding a k-point-sampled mean-field solution onto its supercell.
#[derive(Clone, Builder)]
pub struct KPointUnfoldingDriver<'a> {
    /// The control parameters for k-point unfolding.
    parameters: &'a KPointUnfoldingParams,

    /// The periodic mean-field solution to be unfolded.
    mean_field: &'a PeriodicMeanField,

    /// The result of the unfolding.
    #[builder(setter(skip), default = "None")]
    result: Option<KPointUnfoldingResult>,
}

impl<'a> KPointUnfoldingDriver<'a> {
    /// Returns a builder to construct a [`KPointUnfoldingDriver`] structure.
    pub fn builder() -> KPointUnfoldingDriverBuilder<'a> {
        KPointUnfoldingDriverBuilder::default()
    }

    /// Executes k-point unfolding.
    fn unfold(&mut self) -> Result<(), anyhow::Error> {
        log_title("k-Point Unfolding");
        kunfold_output!("");
        let params = self.parameters;
        params.log_output_display();

        log_subtitle("Periodic mean-field solution");
        kunfold_output!("");
        self.mean_field.log_output_display();
        kunfold_output!("");

        let scmf = unfold_mean_field(self.mean_field, params)?;
        self.result = Some(
            KPointUnfoldingResult::builder()
                .parameters(params.clone())
                .supercell_mean_field(scmf)
                .build()?,
        );

        if let Some(unfold_res) = self.result.as_ref() {
            unfold_res.log_output_display();
            if let Some(name) = params.result_save_name.as_ref() {
                write_kunfold_binary(name, KUnfoldFileType::Scf, &unfold_res.supercell_mean_field)?;
                kunfold_output!(
                    "Unfolded supercell solution saved as {name}.{}.",
                    KUnfoldFileType::Scf.ext()
                );
                kunfold_output!("");
            }
        }
        Ok(())
    }
}

impl UnfoldDriver for KPointUnfoldingDriver<'_> {
    type Params = KPointUnfoldingParams;

    type Outcome = KPointUnfoldingResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No k-point unfolding results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.unfold()
    }
}

// =========
// Functions
// =========

/// The supercell orbitals of one spin channel.
struct ChannelOutcome {
    coefficients: Array2<Complex<f64>>,
    energies: Array1<f64>,
    occupations: Array1<f64>,
    provenance: Option<Vec<(usize, usize)>>,
    mo_phase: Array2<Complex<f64>>,
    warnings: Vec<NumericalWarning>,
}

/// Unfolds a periodic mean-field solution onto the supercell commensurate with its k-point mesh.
///
/// The mesh is inferred and validated first, irreducible k-points are expanded onto the full mesh,
/// and time-reversal partners are checked when real orbitals are requested, all before any
/// supercell quantity is formed. The input is never modified.
///
/// # Arguments
///
/// * `mean_field` - The periodic mean-field solution.
/// * `params` - The unfolding parameters.
///
/// # Errors
///
/// Errors with [`UnfoldError::Domain`] if the expected mesh descriptor is not made of positive
/// integers or disagrees with the k-points, if the k-points do not form a commensurate mesh, if the
/// symmetry expansion fails, or if time-reversal partners are missing or inconsistent; with
/// [`UnfoldError::Dimension`] if the solution is internally inconsistent; and with
/// [`UnfoldError::Numerical`] if a linear-algebra routine fails.
pub fn unfold_mean_field(
    mean_field: &PeriodicMeanField,
    params: &KPointUnfoldingParams,
) -> Result<SupercellMeanField, UnfoldError> {
    let expected_mesh = params
        .mesh_descriptor
        .as_ref()
        .map(|descriptor| KMesh::from_descriptor(descriptor))
        .transpose()?;
    mean_field.validate()?;
    let mesh = mean_field.mesh()?;
    if let Some(expected_mesh) = expected_mesh {
        if expected_mesh != mesh {
            return Err(UnfoldError::Domain(format!(
                "the k-points span a {mesh} mesh instead of the expected {expected_mesh} mesh"
            )));
        }
    }
    let full = mean_field.expand_to_full_mesh(params.kpt_threshold)?;
    if params.realise {
        check_time_reversal_partners(
            full.lattice(),
            full.kpts(),
            full.orbitals(),
            params.kpt_threshold,
            OCCUPATION_THRESHOLD,
        )?;
    }
    log::debug!("Unfolding onto a {mesh} supercell.");

    let lattice = full.lattice();
    let translations = mesh.translation_vectors(lattice);
    let bao_sc = full.bao().tile(&translations);
    let phase = phase_matrix(lattice, &mesh, full.kpts());

    let ssc_complex = to_supercell_ao_integrals(&phase, full.overlaps())?;
    let ssc_imag = ssc_complex.mapv(|s| s.im).norm_max();
    log::debug!("Largest imaginary part of the supercell overlap: {ssc_imag:.3e}");
    let ssc = ssc_complex.mapv(|s| s.re);

    let outcomes = full
        .orbitals()
        .iter()
        .enumerate()
        .map(|(ispin, channel)| {
            let selected = channel
                .iter()
                .map(|orbs| match params.orbital_selection {
                    OrbitalSelection::All => orbs.clone(),
                    OrbitalSelection::OccupiedOnly => orbs.occupied(OCCUPATION_THRESHOLD),
                })
                .collect_vec();
            unfold_channel(ispin, &phase, &selected, &ssc, params)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let provenance = outcomes
        .iter()
        .map(|outcome| outcome.provenance.clone())
        .collect::<Option<Vec<_>>>();
    let mut coefficients = Vec::with_capacity(outcomes.len());
    let mut energies = Vec::with_capacity(outcomes.len());
    let mut occupations = Vec::with_capacity(outcomes.len());
    let mut mo_phase = Vec::with_capacity(outcomes.len());
    let mut warnings = vec![];
    for outcome in outcomes {
        coefficients.push(outcome.coefficients);
        energies.push(outcome.energies);
        occupations.push(outcome.occupations);
        mo_phase.push(outcome.mo_phase);
        warnings.extend(outcome.warnings);
    }
    SupercellMeanField::builder()
        .lattice(lattice.supercell(&mesh))
        .bao(bao_sc)
        .mesh(mesh)
        .spin_constraint(full.spin_constraint())
        .coefficients(coefficients)
        .energies(energies)
        .occupations(occupations)
        .overlap(ssc)
        .provenance(provenance)
        .mo_phase(mo_phase)
        .is_real(params.realise)
        .warnings(warnings)
        .build()
}

/// Unfolds the orbitals of one spin channel.
fn unfold_channel(
    ispin: usize,
    phase: &Array2<Complex<f64>>,
    orbitals: &[KPointOrbitals],
    ssc: &Array2<f64>,
    params: &KPointUnfoldingParams,
) -> Result<ChannelOutcome, UnfoldError> {
    let kmajor = assemble_supercell_columns(phase, orbitals)?;
    let energies_k = orbitals
        .iter()
        .flat_map(|orbs| orbs.energies().iter().cloned())
        .collect::<Array1<f64>>();
    let occupations_k = orbitals
        .iter()
        .flat_map(|orbs| orbs.occupations().iter().cloned())
        .collect::<Array1<f64>>();
    let provenance_k = orbitals
        .iter()
        .enumerate()
        .flat_map(|(k, orbs)| (0..orbs.nmo()).map(move |m| (k, m)))
        .collect_vec();

    let order = match params.orbital_ordering {
        OrbitalOrdering::Energy => (0..energies_k.len())
            .sorted_by(|i, j| energies_k[*i].total_cmp(&energies_k[*j]))
            .collect_vec(),
        OrbitalOrdering::KPointMajor => (0..energies_k.len()).collect_vec(),
    };
    let cmat = kmajor.select(Axis(1), &order);
    let energies = energies_k.select(Axis(0), &order);
    let occupations = occupations_k.select(Axis(0), &order);
    let provenance = order.iter().map(|i| provenance_k[*i]).collect_vec();

    let mut warnings = vec![];
    let ssc_complex = ssc.mapv(|s| Complex::new(s, 0.0));
    let (coefficients, energies, occupations, provenance) = if params.realise {
        let realised = realise_orbitals(
            &cmat,
            &energies,
            &occupations,
            ssc,
            ispin,
            &params.realisation_thresholds(),
        )?;
        warnings.extend(realised.warnings);
        let creal = if params.reorthonormalise {
            reorthonormalise_real(ispin, &realised.coefficients, ssc, params, &mut warnings)?
        } else {
            realised.coefficients
        };
        let provenance = if realised.rederived {
            None
        } else {
            Some(provenance)
        };
        (
            creal.mapv(|c| Complex::new(c, 0.0)),
            realised.energies,
            realised.occupations,
            provenance,
        )
    } else {
        let ccomplex = if params.reorthonormalise {
            let corth = cmat
                .view()
                .lowdin_orthonormalise(&ssc_complex.view(), params.zero_eigenvalue_threshold)?;
            let change = (&corth - &cmat).mapv(|c| c.norm()).norm_max();
            record_reorthonormalisation(ispin, change, params, &mut warnings);
            corth
        } else {
            cmat
        };
        (ccomplex, energies, occupations, Some(provenance))
    };

    let deviation = coefficients
        .view()
        .orthonormality_deviation(&ssc_complex.view());
    log::debug!("Spin channel {ispin}: orthonormality deviation {deviation:.3e}.");
    if deviation > params.orthonormality_threshold {
        warnings.push(NumericalWarning::raise(
            NumericalWarningKind::Orthonormality,
            ispin,
            deviation,
            params.orthonormality_threshold,
        ));
    }

    let mo_phase = kmajor
        .t()
        .mapv(|c| c.conj())
        .dot(&ssc_complex)
        .dot(&coefficients);
    Ok(ChannelOutcome {
        coefficients,
        energies,
        occupations,
        provenance,
        mo_phase,
        warnings,
    })
}

/// Löwdin-orthonormalises real supercell orbitals, recording the size of the correction.
fn reorthonormalise_real(
    ispin: usize,
    cmat: &Array2<f64>,
    ssc: &Array2<f64>,
    params: &KPointUnfoldingParams,
    warnings: &mut Vec<NumericalWarning>,
) -> Result<Array2<f64>, UnfoldError> {
    let corth = cmat
        .view()
        .lowdin_orthonormalise(&ssc.view(), params.zero_eigenvalue_threshold)?;
    let change = (&corth - cmat).norm_max();
    record_reorthonormalisation(ispin, change, params, warnings);
    Ok(corth)
}

fn record_reorthonormalisation(
    ispin: usize,
    change: f64,
    params: &KPointUnfoldingParams,
    warnings: &mut Vec<NumericalWarning>,
) {
    log::debug!("Spin channel {ispin}: re-orthonormalisation changed the orbitals by {change:.3e}.");
    if change > params.reorthonormalisation_threshold {
        warnings.push(NumericalWarning::raise(
            NumericalWarningKind::Reorthonormalisation,
            ispin,
            change,
            params.reorthonormalisation_threshold,
        ));
    }
}
