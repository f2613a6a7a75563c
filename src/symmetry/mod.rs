//! Crystal symmetry: space-group operations, k-point stars and symmetry-adapted orbitals.

pub mod irrep_table;
pub mod kpoint_symmetry;
pub mod space_group;
pub mod symmetry_adapted;
