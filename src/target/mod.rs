//! Mean-field solutions of periodic systems, sampled on k-point meshes or expressed on supercells.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod mean_field;

/// An enumerated type for the spin constraint imposed on a mean-field solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpinConstraint {
    /// A single set of spatial orbitals shared by both spins.
    Restricted,

    /// Two independent sets of spatial orbitals, one per spin.
    Unrestricted,
}

impl SpinConstraint {
    /// The number of spin channels carrying their own orbitals.
    pub fn n_channels(&self) -> usize {
        match self {
            SpinConstraint::Restricted => 1,
            SpinConstraint::Unrestricted => 2,
        }
    }
}

impl Default for SpinConstraint {
    fn default() -> Self {
        SpinConstraint::Restricted
    }
}

impl fmt::Display for SpinConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpinConstraint::Restricted => write!(f, "Spin-restricted (1 channel)"),
            SpinConstraint::Unrestricted => write!(f, "Spin-unrestricted (2 channels)"),
        }
    }
}
