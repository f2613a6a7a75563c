//! Error and warning types raised while unfolding periodic mean-field solutions.

use std::error::Error;
use std::fmt;

use derive_builder::UninitializedFieldError;
use serde::{Deserialize, Serialize};

// ================
// Enum definitions
// ================

/// An enumerated type for the structural and numerical failures of the unfolding machinery.
///
/// Structural failures ([`Self::Domain`] and [`Self::Dimension`]) are always detected before any
/// numerical work begins, so that no partial output is ever produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnfoldError {
    /// The k-point mesh cannot be mapped onto an integer supercell multiplication, or the
    /// time-reversal partners required for a real supercell solution are missing or inconsistent,
    /// or a space-group operation does not map the crystal onto itself.
    Domain(String),

    /// Matrix or vector dimensions disagree with the declared basis size or orbital count, or
    /// irrep blocks do not tile the basis.
    Dimension(String),

    /// A linear-algebra backend routine failed.
    Numerical(String),
}

impl UnfoldError {
    /// Returns `true` if this is a [`Self::Domain`] error.
    pub fn is_domain(&self) -> bool {
        matches!(self, UnfoldError::Domain(_))
    }

    /// Returns `true` if this is a [`Self::Dimension`] error.
    pub fn is_dimension(&self) -> bool {
        matches!(self, UnfoldError::Dimension(_))
    }

    /// Returns `true` if this is a [`Self::Numerical`] error.
    pub fn is_numerical(&self) -> bool {
        matches!(self, UnfoldError::Numerical(_))
    }
}

impl fmt::Display for UnfoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfoldError::Domain(msg) => write!(f, "Domain error: {msg}."),
            UnfoldError::Dimension(msg) => write!(f, "Dimension error: {msg}."),
            UnfoldError::Numerical(msg) => write!(f, "Numerical error: {msg}."),
        }
    }
}

impl Error for UnfoldError {}

impl From<UninitializedFieldError> for UnfoldError {
    fn from(err: UninitializedFieldError) -> Self {
        UnfoldError::Dimension(format!("required field `{}` has not been set", err.field_name()))
    }
}

impl From<ndarray_linalg::error::LinalgError> for UnfoldError {
    fn from(err: ndarray_linalg::error::LinalgError) -> Self {
        UnfoldError::Numerical(err.to_string())
    }
}

/// An enumerated type for the kinds of non-fatal numerical issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericalWarningKind {
    /// The unfolded orbitals deviate from orthonormality with respect to the supercell overlap.
    Orthonormality,

    /// The energy-weighted supercell matrix retains an imaginary part during realisation.
    ImaginaryResidue,

    /// The realisation step did not recover one real orbital per unfolded orbital.
    RealisationRank,

    /// Re-orthonormalisation changed the orbitals by more than the configured tolerance.
    Reorthonormalisation,
}

impl fmt::Display for NumericalWarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalWarningKind::Orthonormality => write!(f, "orthonormality deviation"),
            NumericalWarningKind::ImaginaryResidue => write!(f, "imaginary residue"),
            NumericalWarningKind::RealisationRank => write!(f, "realisation rank mismatch"),
            NumericalWarningKind::Reorthonormalisation => {
                write!(f, "re-orthonormalisation correction")
            }
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A non-fatal numerical warning reported alongside a best-effort result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericalWarning {
    /// The kind of numerical issue.
    pub kind: NumericalWarningKind,

    /// The spin channel in which the issue was observed.
    pub spin_index: usize,

    /// The observed magnitude of the issue.
    pub magnitude: f64,

    /// The tolerance that was exceeded.
    pub tolerance: f64,
}

impl NumericalWarning {
    /// Constructs a warning and logs it at the `warn` level.
    pub(crate) fn raise(
        kind: NumericalWarningKind,
        spin_index: usize,
        magnitude: f64,
        tolerance: f64,
    ) -> Self {
        let warning = NumericalWarning {
            kind,
            spin_index,
            magnitude,
            tolerance,
        };
        log::warn!("{warning}");
        warning
    }
}

impl fmt::Display for NumericalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Numerical warning (spin channel {}): {} of {:.3e} exceeds tolerance {:.3e}.",
            self.spin_index, self.kind, self.magnitude, self.tolerance
        )
    }
}
