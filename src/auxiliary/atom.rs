//! Atoms in a periodic cell.

use std::fmt;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Structure representing an atom in the primitive cell of a crystal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// The label of the atom, usually its atomic symbol.
    pub label: String,

    /// The Cartesian position of the atom.
    pub coordinates: Point3<f64>,
}

impl Atom {
    /// Constructs a new atom.
    ///
    /// # Arguments
    ///
    /// * `label` - The label of the atom.
    /// * `coordinates` - The Cartesian position of the atom.
    pub fn new(label: &str, coordinates: Point3<f64>) -> Self {
        Self {
            label: label.to_string(),
            coordinates,
        }
    }

    /// Returns a copy of this atom displaced by a Cartesian vector.
    pub fn translated(&self, displacement: &nalgebra::Vector3<f64>) -> Self {
        Self {
            label: self.label.clone(),
            coordinates: self.coordinates + displacement,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9} {:>3} {:+11.7} {:+11.7} {:+11.7}",
            "Atom", self.label, self.coordinates[0], self.coordinates[1], self.coordinates[2],
        )
    }
}
