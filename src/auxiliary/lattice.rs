//! Crystal lattices and regular k-point meshes.

use std::collections::HashSet;
use std::f64::consts::PI;
use std::fmt;

use approx;
use itertools::Itertools;
use nalgebra::{Matrix3, RowVector3, Vector3};
use ndarray::Array2;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::errors::UnfoldError;

#[cfg(test)]
#[path = "lattice_tests.rs"]
mod lattice_tests;

/// Threshold below which a lattice is considered singular.
const SINGULAR_LATTICE_THRESHOLD: f64 = 1e-10;

/// Threshold for comparing scaled (fractional) k-point coordinates.
pub const SCALED_KPT_THRESHOLD: f64 = 1e-6;

// ==================
// Struct definitions
// ==================

// -------
// Lattice
// -------

/// Structure representing a three-dimensional Bravais lattice through its primitive lattice
/// vectors $`\mathbf{a}_1`$, $`\mathbf{a}_2`$, $`\mathbf{a}_3`$.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Lattice {
    /// The lattice vectors stored as the rows of a $`3 \times 3`$ matrix.
    vectors: Matrix3<f64>,
}

impl Lattice {
    /// Constructs a lattice from its three lattice vectors.
    ///
    /// # Arguments
    ///
    /// * `rows` - The lattice vectors $`\mathbf{a}_1`$, $`\mathbf{a}_2`$, $`\mathbf{a}_3`$ in
    ///   Cartesian coordinates.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the three vectors are linearly dependent.
    pub fn new(rows: [[f64; 3]; 3]) -> Result<Self, UnfoldError> {
        let vectors = Matrix3::from_rows(&[
            RowVector3::from(rows[0]),
            RowVector3::from(rows[1]),
            RowVector3::from(rows[2]),
        ]);
        Self::from_matrix(vectors)
    }

    /// Constructs a lattice from a matrix whose rows are the lattice vectors.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the matrix is singular.
    pub fn from_matrix(vectors: Matrix3<f64>) -> Result<Self, UnfoldError> {
        if vectors.determinant().abs() < SINGULAR_LATTICE_THRESHOLD {
            return Err(UnfoldError::Domain(
                "the lattice vectors are linearly dependent".to_string(),
            ));
        }
        Ok(Self { vectors })
    }

    /// Returns the lattice vectors as the rows of a matrix.
    pub fn vectors(&self) -> &Matrix3<f64> {
        &self.vectors
    }

    /// Returns the `i`th lattice vector.
    pub fn vector(&self, i: usize) -> Vector3<f64> {
        self.vectors.row(i).transpose()
    }

    /// The volume of the unit cell.
    pub fn volume(&self) -> f64 {
        self.vectors.determinant().abs()
    }

    /// Returns the reciprocal lattice vectors as the rows of a matrix, normalised such that
    /// $`\mathbf{b}_i \cdot \mathbf{a}_j = 2\pi \delta_{ij}`$.
    pub fn reciprocal_vectors(&self) -> Matrix3<f64> {
        // `vectors` is non-singular by construction.
        let inv = self
            .vectors
            .try_inverse()
            .unwrap_or_else(Matrix3::zeros);
        inv.transpose() * (2.0 * PI)
    }

    /// Converts fractional coordinates with respect to the lattice vectors to Cartesian
    /// coordinates.
    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.vectors.transpose() * frac
    }

    /// Converts Cartesian coordinates to fractional coordinates with respect to the lattice
    /// vectors.
    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.reciprocal_vectors() * cart / (2.0 * PI)
    }

    /// Returns the scaled coordinates of a k-point, *i.e.* its coordinates in units of the
    /// reciprocal lattice vectors.
    ///
    /// # Arguments
    ///
    /// * `kpt` - A k-point in Cartesian coordinates.
    pub fn scaled_kpt(&self, kpt: &Vector3<f64>) -> Vector3<f64> {
        self.vectors * kpt / (2.0 * PI)
    }

    /// Returns the Cartesian coordinates of a k-point given its scaled coordinates.
    pub fn kpt_from_scaled(&self, scaled: &Vector3<f64>) -> Vector3<f64> {
        self.reciprocal_vectors().transpose() * scaled
    }

    /// Generates the k-points of a regular mesh in Cartesian coordinates.
    ///
    /// The mesh is enumerated with the first axis running slowest. A $`\Gamma`$-centred mesh has
    /// scaled coordinates $`j / n_i`$; otherwise the Monkhorst--Pack shift gives
    /// $`(j + 1/2) / n_i - 1/2`$.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The mesh dimensions.
    /// * `with_gamma_point` - Boolean indicating if the mesh should contain the $`\Gamma`$ point.
    pub fn make_kpts(&self, mesh: &KMesh, with_gamma_point: bool) -> Vec<Vector3<f64>> {
        let axes = mesh
            .dims()
            .iter()
            .map(|&n| {
                let nf = n.to_f64().unwrap_or(1.0);
                (0..n)
                    .map(|j| {
                        let jf = j.to_f64().unwrap_or(0.0);
                        if with_gamma_point {
                            jf / nf
                        } else {
                            (jf + 0.5) / nf - 0.5
                        }
                    })
                    .collect_vec()
            })
            .collect_vec();
        axes[0]
            .iter()
            .cartesian_product(axes[1].iter())
            .cartesian_product(axes[2].iter())
            .map(|((s0, s1), s2)| self.kpt_from_scaled(&Vector3::new(*s0, *s1, *s2)))
            .collect()
    }

    /// Constructs the supercell lattice commensurate with a k-point mesh, whose lattice vectors
    /// are $`n_i \mathbf{a}_i`$.
    pub fn supercell(&self, mesh: &KMesh) -> Lattice {
        let mut vectors = self.vectors;
        mesh.dims().iter().enumerate().for_each(|(i, &n)| {
            let nf = n.to_f64().unwrap_or(1.0);
            vectors.row_mut(i).scale_mut(nf);
        });
        Lattice { vectors }
    }

    /// Determines if two k-points differ by a reciprocal lattice vector.
    ///
    /// # Arguments
    ///
    /// * `kpt1`, `kpt2` - Two k-points in Cartesian coordinates.
    /// * `thresh` - Threshold on the deviation of the scaled difference from integers.
    pub fn kpts_equivalent(&self, kpt1: &Vector3<f64>, kpt2: &Vector3<f64>, thresh: f64) -> bool {
        let diff = self.scaled_kpt(&(kpt1 - kpt2));
        diff.iter()
            .all(|x| approx::abs_diff_eq!(*x, x.round(), epsilon = thresh))
    }
}

impl TryFrom<[[f64; 3]; 3]> for Lattice {
    type Error = UnfoldError;

    fn try_from(rows: [[f64; 3]; 3]) -> Result<Self, Self::Error> {
        Lattice::new(rows)
    }
}

impl From<Lattice> for [[f64; 3]; 3] {
    fn from(lattice: Lattice) -> Self {
        let v = lattice.vectors;
        [
            [v[(0, 0)], v[(0, 1)], v[(0, 2)]],
            [v[(1, 0)], v[(1, 1)], v[(1, 2)]],
            [v[(2, 0)], v[(2, 1)], v[(2, 2)]],
        ]
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..3 {
            let a = self.vector(i);
            writeln!(
                f,
                "  a{} = ({:+.7}, {:+.7}, {:+.7})",
                i + 1,
                a[0],
                a[1],
                a[2]
            )?;
        }
        Ok(())
    }
}

// -----
// KMesh
// -----

/// Structure representing the dimensions $`[n_1, n_2, n_3]`$ of a regular k-point mesh, which are
/// also the multiplicities of the commensurate supercell along the three lattice vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[usize; 3]", into = "[usize; 3]")]
pub struct KMesh {
    dims: [usize; 3],
}

impl KMesh {
    /// Constructs a mesh from three positive integers.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if any dimension is zero.
    pub fn new(dims: [usize; 3]) -> Result<Self, UnfoldError> {
        if dims.iter().any(|&n| n == 0) {
            return Err(UnfoldError::Domain(format!(
                "mesh dimensions {dims:?} must all be positive"
            )));
        }
        Ok(Self { dims })
    }

    /// Constructs a mesh from floating-point descriptors, as would be read from loosely typed
    /// sources.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if there are not exactly three descriptors, or if any
    /// of them is not a positive integer.
    pub fn from_descriptor(descriptor: &[f64]) -> Result<Self, UnfoldError> {
        if descriptor.len() != 3 {
            return Err(UnfoldError::Domain(format!(
                "a mesh descriptor needs exactly three entries, but {} were given",
                descriptor.len()
            )));
        }
        let dims = descriptor
            .iter()
            .map(|&x| {
                if x.is_finite()
                    && x >= 1.0
                    && approx::abs_diff_eq!(x, x.round(), epsilon = 1e-8)
                {
                    x.round().to_usize().ok_or_else(|| {
                        UnfoldError::Domain(format!("mesh descriptor {x} is out of range"))
                    })
                } else {
                    Err(UnfoldError::Domain(format!(
                        "mesh descriptor {x} is not a positive integer"
                    )))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new([dims[0], dims[1], dims[2]])
    }

    /// Infers the mesh from an explicit list of k-points.
    ///
    /// The scaled coordinates of the k-points along each reciprocal axis are folded into
    /// $`[0, 1)`$; the number of distinct values along each axis gives the mesh dimension. The
    /// list must then contain exactly one k-point per mesh point, and every k-point must be
    /// commensurate with the resulting supercell.
    ///
    /// # Arguments
    ///
    /// * `lattice` - The primitive lattice.
    /// * `kpts` - The k-points in Cartesian coordinates.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the list is empty, incomplete, contains duplicates,
    /// or is not commensurate with an integer supercell.
    pub fn from_kpts(lattice: &Lattice, kpts: &[Vector3<f64>]) -> Result<Self, UnfoldError> {
        if kpts.is_empty() {
            return Err(UnfoldError::Domain("no k-points have been given".to_string()));
        }
        let scaled = kpts
            .iter()
            .map(|k| lattice.scaled_kpt(k).map(fold_unit_interval))
            .collect_vec();
        let dims = (0..3)
            .map(|i| {
                scaled
                    .iter()
                    .map(|s| s[i])
                    .sorted_by(|a, b| a.total_cmp(b))
                    .dedup_by(|a, b| approx::abs_diff_eq!(*a, *b, epsilon = SCALED_KPT_THRESHOLD))
                    .count()
            })
            .collect_vec();
        let mesh = KMesh::new([dims[0], dims[1], dims[2]])?;
        if mesh.nk() != kpts.len() {
            return Err(UnfoldError::Domain(format!(
                "{} k-points cannot form a complete {} mesh",
                kpts.len(),
                mesh
            )));
        }

        let indices = scaled
            .iter()
            .map(|s| mesh.mesh_index_of_scaled(s))
            .collect::<Result<Vec<_>, _>>()?;
        let unique_indices = indices.iter().collect::<HashSet<_>>();
        if unique_indices.len() != indices.len() {
            return Err(UnfoldError::Domain(format!(
                "the k-points contain duplicates modulo the reciprocal lattice and cannot form a complete {mesh} mesh"
            )));
        }
        Ok(mesh)
    }

    /// The mesh dimensions.
    pub fn dims(&self) -> &[usize; 3] {
        &self.dims
    }

    /// The number of k-points in the mesh, which is also the number of primitive cells in the
    /// commensurate supercell.
    pub fn nk(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the integer mesh index $`(j_1, j_2, j_3)`$ of a scaled k-point, such that its
    /// scaled coordinates are $`j_i / n_i`$ modulo integers.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the k-point is not commensurate with the supercell
    /// of this mesh.
    pub fn mesh_index_of_scaled(&self, scaled: &Vector3<f64>) -> Result<[usize; 3], UnfoldError> {
        let mut index = [0usize; 3];
        for i in 0..3 {
            let n = self.dims[i];
            let x = scaled[i] * n.to_f64().unwrap_or(1.0);
            if !approx::abs_diff_eq!(x, x.round(), epsilon = SCALED_KPT_THRESHOLD * 10.0) {
                return Err(UnfoldError::Domain(format!(
                    "scaled k-point component {:.6} is not commensurate with mesh dimension {n}",
                    scaled[i]
                )));
            }
            let j = x.round().to_i64().ok_or_else(|| {
                UnfoldError::Domain(format!("scaled k-point component {} is out of range", scaled[i]))
            })?;
            let n_i64 = n.to_i64().unwrap_or(1);
            index[i] = j.rem_euclid(n_i64).to_usize().unwrap_or(0);
        }
        Ok(index)
    }

    /// Enumerates the lattice translations inside the supercell as integer triples, with the first
    /// axis running slowest.
    pub fn translations(&self) -> Vec<[usize; 3]> {
        (0..self.dims[0])
            .cartesian_product(0..self.dims[1])
            .cartesian_product(0..self.dims[2])
            .map(|((t0, t1), t2)| [t0, t1, t2])
            .collect()
    }

    /// Enumerates the lattice translations inside the supercell as Cartesian vectors.
    pub fn translation_vectors(&self, lattice: &Lattice) -> Vec<Vector3<f64>> {
        self.translations()
            .iter()
            .map(|t| {
                lattice.to_cartesian(&Vector3::new(
                    t[0].to_f64().unwrap_or(0.0),
                    t[1].to_f64().unwrap_or(0.0),
                    t[2].to_f64().unwrap_or(0.0),
                ))
            })
            .collect()
    }

    /// Returns the position of an arbitrary integer translation, folded into the supercell, in the
    /// enumeration of [`Self::translations`].
    pub fn translation_index(&self, t: [i64; 3]) -> usize {
        let folded = (0..3)
            .map(|i| {
                let n = self.dims[i].to_i64().unwrap_or(1);
                t[i].rem_euclid(n).to_usize().unwrap_or(0)
            })
            .collect_vec();
        (folded[0] * self.dims[1] + folded[1]) * self.dims[2] + folded[2]
    }

    /// Returns the double-translation index table $`D`$ of size $`N_k \times N_k`$, where
    /// $`D_{RS}`$ is the index of the translation $`S - R`$ folded into the supercell.
    ///
    /// A supercell matrix is obtained from translation-indexed blocks $`M(T)`$ via
    /// $`M^{\mathrm{sc}}_{RS} = M(D_{RS})`$.
    pub fn double_translation_indices(&self) -> Array2<usize> {
        let translations = self.translations();
        let nk = translations.len();
        Array2::from_shape_fn((nk, nk), |(r, s)| {
            let tr = translations[r];
            let ts = translations[s];
            let diff = [
                ts[0].to_i64().unwrap_or(0) - tr[0].to_i64().unwrap_or(0),
                ts[1].to_i64().unwrap_or(0) - tr[1].to_i64().unwrap_or(0),
                ts[2].to_i64().unwrap_or(0) - tr[2].to_i64().unwrap_or(0),
            ];
            self.translation_index(diff)
        })
    }
}

impl TryFrom<[usize; 3]> for KMesh {
    type Error = UnfoldError;

    fn try_from(dims: [usize; 3]) -> Result<Self, Self::Error> {
        KMesh::new(dims)
    }
}

impl From<KMesh> for [usize; 3] {
    fn from(mesh: KMesh) -> Self {
        mesh.dims
    }
}

impl fmt::Display for KMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} × {} × {}", self.dims[0], self.dims[1], self.dims[2])
    }
}

// =================
// Utility functions
// =================

/// Folds a scaled coordinate into $`[0, 1)`$, snapping values within threshold of $`1`$ to $`0`$.
fn fold_unit_interval(x: f64) -> f64 {
    let folded = x - x.floor();
    if approx::abs_diff_eq!(folded, 1.0, epsilon = SCALED_KPT_THRESHOLD) {
        0.0
    } else {
        folded
    }
}
