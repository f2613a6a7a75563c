//! # kunfold: Unfolding of k-point-sampled mean-field solutions
//!
//! kunfold maps a periodic mean-field solution sampled on a regular mesh of $`N_k`$ k-points onto
//! the equivalent $`\Gamma`$-point solution of the commensurate supercell containing $`N_k`$
//! copies of the primitive cell. Its capabilities include:
//! - inference and validation of regular k-point meshes, $`\Gamma`$-centred or commensurately
//!   shifted,
//! - expansion of irreducible k-points onto the full mesh by space-group operations, including
//!   time reversal,
//! - construction of supercell atomic-orbital matrices from k-space or real-space matrices,
//! - unfolding of restricted and unrestricted orbitals onto the supercell, with optional
//!   realisation and re-orthonormalisation of the supercell orbitals, and
//! - reconstruction of full orbital coefficient matrices from symmetry-adapted (Molpro-style)
//!   irrep blocks.
//!
//! The unfolded orbitals can be verified through Mulliken populations, occupied-subspace overlap
//! determinants and array fingerprints.
//!
//! ## Getting started
//!
//! To use kunfold in your Rust project, simply add this crate to your project's `Cargo.toml`.
//!
//! ### Linear algebra backend
//!
//! There are six features defining six different ways a linear algebra backend can be configured
//! for kunfold. These are inherited from the
//! [`ndarray-linalg`](https://docs.rs/ndarray-linalg/latest/ndarray_linalg/) crate. One
//! (and only one) of these must be enabled:
//! - `openblas-static`: Downloads, builds OpenBLAS, and links statically
//! - `openblas-system`: Finds and links existing OpenBLAS in the system
//! - `netlib-static`: Downloads, builds LAPACK, and links statically
//! - `netlib-system`: Finds and links existing LAPACK in the system
//! - `intel-mkl-static`: Finds and links existing static Intel MKL in the system, or downloads and
//!   links statically if not found
//! - `intel-mkl-system`: Finds and links existing shared Intel MKL in the system
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! The `kunfold` binary reads a YAML input file naming the periodic mean-field solution and the
//! unfolding parameters:
//!
//! ```bash
//! kunfold --config input.yml --output output.log -vv
//! ```
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod analysis;
pub mod angmom;
pub mod auxiliary;
pub mod basis;
pub mod drivers;
pub mod errors;
pub mod interfaces;
pub mod io;
pub mod nonortho;
pub mod symmetry;
pub mod target;
pub mod unfolding;
