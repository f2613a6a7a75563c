//! Mean-field solutions expressed on a supercell.

use std::fmt;

use derive_builder::Builder;
use itertools::Itertools;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::auxiliary::lattice::{KMesh, Lattice};
use crate::basis::ao::BasisAngularOrder;
use crate::errors::{NumericalWarning, UnfoldError};
use crate::target::SpinConstraint;

/// Structure containing a mean-field solution on the supercell commensurate with a k-point mesh,
/// as produced by unfolding.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate", error = "UnfoldError"))]
pub struct SupercellMeanField {
    /// The supercell lattice.
    lattice: Lattice,

    /// The basis layout of the supercell, tiled translation-major from the primitive cell.
    bao: BasisAngularOrder,

    /// The k-point mesh from which the supercell is built.
    mesh: KMesh,

    /// The spin constraint of the solution.
    spin_constraint: SpinConstraint,

    /// The orbital coefficients of every spin channel. Their imaginary parts vanish when
    /// [`Self::is_real`] is set.
    coefficients: Vec<Array2<Complex<f64>>>,

    /// The orbital energies of every spin channel.
    energies: Vec<Array1<f64>>,

    /// The orbital occupation numbers of every spin channel.
    occupations: Vec<Array1<f64>>,

    /// The supercell atomic-orbital overlap matrix.
    overlap: Array2<f64>,

    /// For every spin channel and every orbital, the originating k-point index and orbital index
    /// within that k-point. Absent once the orbitals have been realised, as real orbitals mix
    /// time-reversed k-points.
    #[builder(default = "None")]
    provenance: Option<Vec<Vec<(usize, usize)>>>,

    /// For every spin channel, the unitary transformation from the k-adapted orbitals (rows, in
    /// k-point-major order) to the supercell orbitals (columns).
    mo_phase: Vec<Array2<Complex<f64>>>,

    /// Boolean indicating if the orbital coefficients are real.
    is_real: bool,

    /// The numerical warnings raised while constructing this solution.
    #[builder(default = "Vec::new()")]
    warnings: Vec<NumericalWarning>,
}

impl SupercellMeanFieldBuilder {
    fn validate(&self) -> Result<(), UnfoldError> {
        let missing = |field: &str| UnfoldError::Dimension(format!("no {field} found"));
        let bao = self.bao.as_ref().ok_or_else(|| missing("basis layout"))?;
        let nchannels = self
            .spin_constraint
            .as_ref()
            .ok_or_else(|| missing("spin constraint"))?
            .n_channels();
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| missing("coefficients"))?;
        let energies = self.energies.as_ref().ok_or_else(|| missing("energies"))?;
        let occupations = self
            .occupations
            .as_ref()
            .ok_or_else(|| missing("occupations"))?;
        let overlap = self.overlap.as_ref().ok_or_else(|| missing("overlap"))?;
        let mo_phase = self.mo_phase.as_ref().ok_or_else(|| missing("mo_phase"))?;
        let nsc = bao.n_funcs();

        if overlap.shape() != [nsc, nsc] {
            return Err(UnfoldError::Dimension(format!(
                "the supercell overlap has shape {:?} instead of [{nsc}, {nsc}]",
                overlap.shape()
            )));
        }
        if [coefficients.len(), energies.len(), occupations.len(), mo_phase.len()]
            .iter()
            .any(|n| *n != nchannels)
        {
            return Err(UnfoldError::Dimension(format!(
                "the supercell solution must hold exactly {nchannels} spin channel(s)"
            )));
        }
        for (ispin, ((cmat, e), occ)) in coefficients
            .iter()
            .zip(energies.iter())
            .zip(occupations.iter())
            .enumerate()
        {
            let nmo = cmat.ncols();
            if cmat.nrows() != nsc || e.len() != nmo || occ.len() != nmo {
                return Err(UnfoldError::Dimension(format!(
                    "spin channel {ispin} has coefficients of shape {:?} with {} energies and {} occupations",
                    cmat.shape(),
                    e.len(),
                    occ.len()
                )));
            }
            if mo_phase[ispin].ncols() != nmo {
                return Err(UnfoldError::Dimension(format!(
                    "the k-adapted transformation of spin channel {ispin} has {} columns instead of {nmo}",
                    mo_phase[ispin].ncols()
                )));
            }
        }
        if let Some(Some(provenance)) = self.provenance.as_ref() {
            if provenance.len() != nchannels
                || provenance
                    .iter()
                    .zip(coefficients.iter())
                    .any(|(prov, cmat)| prov.len() != cmat.ncols())
            {
                return Err(UnfoldError::Dimension(
                    "the orbital provenance does not match the orbital count".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl SupercellMeanField {
    /// Returns a builder to construct a new [`SupercellMeanField`].
    pub fn builder() -> SupercellMeanFieldBuilder {
        SupercellMeanFieldBuilder::default()
    }

    /// The supercell lattice.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// The supercell basis layout.
    pub fn bao(&self) -> &BasisAngularOrder {
        &self.bao
    }

    /// The k-point mesh.
    pub fn mesh(&self) -> &KMesh {
        &self.mesh
    }

    /// The spin constraint.
    pub fn spin_constraint(&self) -> SpinConstraint {
        self.spin_constraint
    }

    /// The orbital coefficients of every spin channel.
    pub fn coefficients(&self) -> &[Array2<Complex<f64>>] {
        &self.coefficients
    }

    /// The real orbital coefficients of every spin channel.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the orbitals have not been realised.
    pub fn real_coefficients(&self) -> Result<Vec<Array2<f64>>, UnfoldError> {
        if !self.is_real {
            return Err(UnfoldError::Domain(
                "the supercell orbitals are complex and have not been realised".to_string(),
            ));
        }
        Ok(self
            .coefficients
            .iter()
            .map(|cmat| cmat.mapv(|c| c.re))
            .collect())
    }

    /// The orbital energies of every spin channel.
    pub fn energies(&self) -> &[Array1<f64>] {
        &self.energies
    }

    /// The orbital occupation numbers of every spin channel.
    pub fn occupations(&self) -> &[Array1<f64>] {
        &self.occupations
    }

    /// The supercell overlap matrix.
    pub fn overlap(&self) -> &Array2<f64> {
        &self.overlap
    }

    /// The originating k-point and orbital of every supercell orbital, if not realised.
    pub fn provenance(&self) -> Option<&Vec<Vec<(usize, usize)>>> {
        self.provenance.as_ref()
    }

    /// The unitary transformation from k-adapted orbitals to supercell orbitals.
    pub fn mo_phase(&self) -> &[Array2<Complex<f64>>] {
        &self.mo_phase
    }

    /// Returns `true` if the orbital coefficients are real.
    pub fn is_real(&self) -> bool {
        self.is_real
    }

    /// The numerical warnings raised while constructing this solution.
    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }

    /// The number of supercell basis functions.
    pub fn nao(&self) -> usize {
        self.bao.n_funcs()
    }

    /// The number of orbitals of every spin channel.
    pub fn nmo(&self) -> Vec<usize> {
        self.coefficients.iter().map(|cmat| cmat.ncols()).collect()
    }
}

impl fmt::Display for SupercellMeanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Supercell lattice ({} mesh):", self.mesh)?;
        write!(f, "{}", self.lattice)?;
        writeln!(f, "Spin constraint: {}", self.spin_constraint)?;
        writeln!(f, "Supercell basis functions: {}", self.nao())?;
        writeln!(
            f,
            "Supercell orbitals: {}",
            self.nmo().iter().map(|n| n.to_string()).join(", ")
        )?;
        writeln!(f, "Real orbitals: {}", if self.is_real { "yes" } else { "no" })?;
        for (ispin, (e, occ)) in self.energies.iter().zip(self.occupations.iter()).enumerate() {
            let nocc = occ.iter().filter(|o| **o > 0.0).count();
            let homo = occ
                .iter()
                .zip(e.iter())
                .filter(|(o, _)| **o > 0.0)
                .map(|(_, e)| *e)
                .fold(f64::NEG_INFINITY, f64::max);
            writeln!(
                f,
                "Spin channel {ispin}: {nocc} occupied orbital(s), highest occupied energy {homo:+.7}"
            )?;
        }
        if self.warnings.is_empty() {
            writeln!(f, "Numerical warnings: none")?;
        } else {
            writeln!(f, "Numerical warnings:")?;
            for warning in self.warnings.iter() {
                writeln!(f, "  {warning}")?;
            }
        }
        Ok(())
    }
}
