//! Crystal structure helpers: atoms, lattices and k-point meshes.

pub mod atom;
pub mod lattice;

#[cfg(test)]
pub(crate) mod template_models;
