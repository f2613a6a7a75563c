//! Transformations of angular functions under point operations.

pub mod cart_rotation_3d;
pub mod sh_rotation_3d;

/// Alphabetical labels of angular momenta.
pub static ANGMOM_LABELS: [&str; 7] = ["S", "P", "D", "F", "G", "H", "I"];
