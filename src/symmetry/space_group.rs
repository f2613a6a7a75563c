//! Space-group operations and their actions on k-points and Bloch-summed atomic orbitals.

use std::fmt;

use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use ndarray::{s, Array2};
use ndarray_linalg::Inverse;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::angmom::cart_rotation_3d::cart_shell_matrix;
use crate::angmom::sh_rotation_3d::rlmats;
use crate::auxiliary::atom::Atom;
use crate::auxiliary::lattice::Lattice;
use crate::basis::ao::{BasisAngularOrder, BasisShell, ShellOrder};
use crate::errors::UnfoldError;

#[cfg(test)]
#[path = "space_group_tests.rs"]
mod space_group_tests;

/// Tolerance on the deviation of a Cartesian rotation matrix from orthogonality.
const ORTHOGONALITY_THRESHOLD: f64 = 1e-8;

// ==================
// Struct definitions
// ==================

/// Structure representing a space-group operation $`\{\mathbf{W}|\mathbf{w}\}`$, optionally
/// augmented by time reversal.
///
/// The operation acts on fractional coordinates as
/// $`\mathbf{r} \mapsto \mathbf{W}\mathbf{r} + \mathbf{w}`$, with $`\mathbf{W}`$ an integer matrix
/// with determinant $`\pm 1`$.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpaceGroupOperationData", into = "SpaceGroupOperationData")]
pub struct SpaceGroupOperation {
    /// The integer rotation matrix $`\mathbf{W}`$ acting on fractional coordinates.
    rotation: Matrix3<i32>,

    /// The fractional translation $`\mathbf{w}`$.
    translation: Vector3<f64>,

    /// Boolean indicating if the operation is augmented by time reversal.
    time_reversal: bool,
}

/// Row-major serialisation form of [`SpaceGroupOperation`].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SpaceGroupOperationData {
    rotation: [[i32; 3]; 3],

    #[serde(default)]
    translation: [f64; 3],

    #[serde(default)]
    time_reversal: bool,
}

impl SpaceGroupOperation {
    /// Constructs a new space-group operation.
    ///
    /// # Arguments
    ///
    /// * `rotation` - The rows of the integer rotation matrix acting on fractional coordinates.
    /// * `translation` - The fractional translation.
    /// * `time_reversal` - Boolean indicating if the operation is augmented by time reversal.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the rotation matrix is not unimodular.
    pub fn new(
        rotation: [[i32; 3]; 3],
        translation: [f64; 3],
        time_reversal: bool,
    ) -> Result<Self, UnfoldError> {
        let rotation = Matrix3::from_fn(|i, j| rotation[i][j]);
        let det = rotation.map(f64::from).determinant().round();
        if (det.abs() - 1.0).abs() > f64::EPSILON {
            return Err(UnfoldError::Domain(format!(
                "rotation matrix with determinant {det} is not a lattice symmetry"
            )));
        }
        Ok(SpaceGroupOperation {
            rotation,
            translation: Vector3::from(translation),
            time_reversal,
        })
    }

    /// The identity operation.
    pub fn identity() -> Self {
        SpaceGroupOperation {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            time_reversal: false,
        }
    }

    /// Pure time reversal, mapping $`\mathbf{k}`$ to $`-\mathbf{k}`$.
    pub fn time_reversal() -> Self {
        SpaceGroupOperation {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            time_reversal: true,
        }
    }

    /// The integer rotation matrix acting on fractional coordinates.
    pub fn rotation(&self) -> &Matrix3<i32> {
        &self.rotation
    }

    /// The fractional translation.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Returns `true` if the operation is augmented by time reversal.
    pub fn is_antiunitary(&self) -> bool {
        self.time_reversal
    }

    /// Returns `true` if this is the identity operation.
    pub fn is_identity(&self) -> bool {
        self.rotation == Matrix3::identity()
            && self.translation.iter().all(|w| w.abs() < f64::EPSILON)
            && !self.time_reversal
    }

    /// Returns the Cartesian matrix of the rotational part,
    /// $`\mathbf{A}^{\mathsf{T}}\mathbf{W}\mathbf{A}^{-\mathsf{T}}`$, where the rows of
    /// $`\mathbf{A}`$ are the lattice vectors.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the result is not orthogonal, *i.e.* the rotation is
    /// not a point symmetry of the lattice.
    pub fn cartesian_rotation(&self, lattice: &Lattice) -> Result<Matrix3<f64>, UnfoldError> {
        let at = lattice.vectors().transpose();
        let at_inv = lattice.reciprocal_vectors() / (2.0 * std::f64::consts::PI);
        let wmat = at * self.rotation.map(f64::from) * at_inv;
        let deviation = (wmat.transpose() * wmat - Matrix3::identity()).amax();
        if deviation > ORTHOGONALITY_THRESHOLD {
            return Err(UnfoldError::Domain(format!(
                "operation {self} is not an isometry of the lattice (deviation {deviation:.3e})"
            )));
        }
        Ok(wmat)
    }

    /// Applies the operation to a point in fractional coordinates.
    pub fn apply_fractional(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.map(f64::from) * frac + self.translation
    }

    /// Transforms a Cartesian k-point, $`\mathbf{k} \mapsto \mathbf{W}\mathbf{k}`$, negated if
    /// the operation is augmented by time reversal.
    pub fn transform_kpt(
        &self,
        lattice: &Lattice,
        kpt: &Vector3<f64>,
    ) -> Result<Vector3<f64>, UnfoldError> {
        let wk = self.cartesian_rotation(lattice)? * kpt;
        Ok(if self.time_reversal { -wk } else { wk })
    }

    /// Determines how the operation permutes the atoms of the unit cell.
    ///
    /// # Arguments
    ///
    /// * `lattice` - The lattice of the crystal.
    /// * `atoms` - The atoms of the unit cell.
    /// * `thresh` - Threshold on fractional coordinates for identifying atoms.
    ///
    /// # Returns
    ///
    /// For every atom $`a`$, the index of the atom $`b`$ onto which it is mapped and the Cartesian
    /// lattice vector $`\mathbf{L}_a = \mathbf{W}\mathbf{r}_a + \mathbf{w} - \mathbf{r}_b`$.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if some atom is not mapped onto an equivalent atom.
    pub fn atom_mapping(
        &self,
        lattice: &Lattice,
        atoms: &[&Atom],
        thresh: f64,
    ) -> Result<Vec<(usize, Vector3<f64>)>, UnfoldError> {
        let fracs = atoms
            .iter()
            .map(|atom| lattice.to_fractional(&atom.coordinates.coords))
            .collect_vec();
        atoms
            .iter()
            .zip(fracs.iter())
            .map(|(atom_a, frac_a)| {
                let image = self.apply_fractional(frac_a);
                atoms
                    .iter()
                    .zip(fracs.iter())
                    .enumerate()
                    .find_map(|(b, (atom_b, frac_b))| {
                        let lvec = image - frac_b;
                        let lvec_int = lvec.map(f64::round);
                        if atom_a.label == atom_b.label && (lvec - lvec_int).amax() < thresh {
                            Some((b, lattice.to_cartesian(&lvec_int)))
                        } else {
                            None
                        }
                    })
                    .ok_or_else(|| {
                        UnfoldError::Domain(format!(
                            "operation {self} maps atom {atom_a} onto no equivalent atom"
                        ))
                    })
            })
            .collect()
    }

    /// Computes the representation matrix of the operation in the basis of Bloch-summed atomic
    /// orbitals.
    ///
    /// With $`\mathbf{k}' = \mathbf{W}\mathbf{k}`$ (or $`-\mathbf{W}\mathbf{k}`$ under time
    /// reversal), the operation maps the Bloch functions at $`\mathbf{k}`$ onto those at
    /// $`\mathbf{k}'`$ through
    /// ```math
    /// D_{(b\mu'),(a\mu)} = \exp(-i\mathbf{k}' \cdot \mathbf{L}_a)\, R_{\mu'\mu}(\mathbf{W}),
    /// ```
    /// where $`\mathbf{R}`$ is the representation matrix of the rotational part in the shell
    /// containing $`\mu`$.
    ///
    /// # Arguments
    ///
    /// * `lattice` - The lattice of the crystal.
    /// * `bao` - The basis layout of the unit cell.
    /// * `kpt` - The Cartesian k-point $`\mathbf{k}`$.
    /// * `thresh` - Threshold on fractional coordinates for identifying atoms.
    ///
    /// # Returns
    ///
    /// The transformed k-point $`\mathbf{k}'`$ and the representation matrix $`\mathbf{D}`$.
    pub fn ao_representation(
        &self,
        lattice: &Lattice,
        bao: &BasisAngularOrder,
        kpt: &Vector3<f64>,
        thresh: f64,
    ) -> Result<(Vector3<f64>, Array2<Complex<f64>>), UnfoldError> {
        let wmat = self.cartesian_rotation(lattice)?;
        let kpt_image = self.transform_kpt(lattice, kpt)?;
        let atoms = bao
            .basis_atoms()
            .iter()
            .map(|basis_atom| &basis_atom.atom)
            .collect_vec();
        let mapping = self.atom_mapping(lattice, &atoms, thresh)?;
        let lmax = bao.basis_shells().map(|shell| shell.l).max().unwrap_or(0);
        let rls = rlmats(lmax, &wmat);

        let atom_bounds = bao.atom_boundary_indices();
        let nao = bao.n_funcs();
        let mut dmat = Array2::<Complex<f64>>::zeros((nao, nao));
        for (a, (b, lvec)) in mapping.iter().enumerate() {
            let shells_a = &bao.basis_atoms()[a].basis_shells;
            let shells_b = &bao.basis_atoms()[*b].basis_shells;
            if shells_a != shells_b {
                return Err(UnfoldError::Domain(format!(
                    "atoms {a} and {b} are mapped onto each other but carry different shells"
                )));
            }
            let phase = Complex::new(0.0, -kpt_image.dot(lvec)).exp();
            let (col_start, _) = atom_bounds[a];
            let (row_start, _) = atom_bounds[*b];
            let mut offset = 0;
            for shell in shells_a.iter() {
                let rmat = shell_representation(shell, &rls, &wmat);
                let n = shell.n_funcs();
                dmat.slice_mut(s![
                    row_start + offset..row_start + offset + n,
                    col_start + offset..col_start + offset + n
                ])
                .assign(&rmat.mapv(|r| phase * r));
                offset += n;
            }
        }
        Ok((kpt_image, dmat))
    }

    /// Transforms the coefficients of orbitals at $`\mathbf{k}`$ into those at $`\mathbf{k}'`$,
    /// $`\mathbf{C}_{\mathbf{k}'} = \mathbf{D}\mathbf{C}_{\mathbf{k}}`$, with $`\mathbf{C}`$
    /// complex-conjugated first under time reversal.
    pub fn transform_coefficients(
        &self,
        dmat: &Array2<Complex<f64>>,
        cmat: &Array2<Complex<f64>>,
    ) -> Array2<Complex<f64>> {
        if self.time_reversal {
            dmat.dot(&cmat.mapv(|c| c.conj()))
        } else {
            dmat.dot(cmat)
        }
    }

    /// Transforms the atomic-orbital overlap matrix at $`\mathbf{k}`$ into that at
    /// $`\mathbf{k}'`$, $`\mathbf{S}(\mathbf{k}') = \mathbf{D}^{-\dagger}\mathbf{S}(\mathbf{k})
    /// \mathbf{D}^{-1}`$, which reduces to $`\mathbf{D}\mathbf{S}\mathbf{D}^{\dagger}`$ for
    /// orthonormal shell representations.
    pub fn transform_overlap(
        &self,
        dmat: &Array2<Complex<f64>>,
        smat: &Array2<Complex<f64>>,
    ) -> Result<Array2<Complex<f64>>, UnfoldError> {
        let dinv = dmat.inv()?;
        let dinv_h = dinv.t().mapv(|d| d.conj());
        let smat_in = if self.time_reversal {
            smat.mapv(|v| v.conj())
        } else {
            smat.to_owned()
        };
        Ok(dinv_h.dot(&smat_in).dot(&dinv))
    }
}

impl TryFrom<SpaceGroupOperationData> for SpaceGroupOperation {
    type Error = UnfoldError;

    fn try_from(data: SpaceGroupOperationData) -> Result<Self, Self::Error> {
        SpaceGroupOperation::new(data.rotation, data.translation, data.time_reversal)
    }
}

impl From<SpaceGroupOperation> for SpaceGroupOperationData {
    fn from(op: SpaceGroupOperation) -> Self {
        SpaceGroupOperationData {
            rotation: [0, 1, 2].map(|i| [0, 1, 2].map(|j| op.rotation[(i, j)])),
            translation: [op.translation[0], op.translation[1], op.translation[2]],
            time_reversal: op.time_reversal,
        }
    }
}

impl fmt::Display for SpaceGroupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = (0..3)
            .map(|i| (0..3).map(|j| format!("{:+}", self.rotation[(i, j)])).join(" "))
            .join("; ");
        write!(
            f,
            "{{[{rows}] | ({})}}{}",
            self.translation.iter().map(|w| format!("{w:+.3}")).join(", "),
            if self.time_reversal { "′" } else { "" }
        )
    }
}

// =========
// Functions
// =========

/// Returns the representation matrix of a Cartesian transformation in a single shell, in the
/// shell's own component order.
///
/// # Arguments
///
/// * `shell` - The shell.
/// * `rls` - Representation matrices of real solid harmonics in increasing-$`m`$ order, up to at
///   least the rank of `shell`.
/// * `wmat` - The Cartesian matrix of the transformation.
fn shell_representation(shell: &BasisShell, rls: &[Array2<f64>], wmat: &Matrix3<f64>) -> Array2<f64> {
    match &shell.shell_order {
        ShellOrder::Pure(pure_order) => {
            let rl = &rls[pure_order.lpure as usize];
            let pos = pure_order.increasingm_positions();
            Array2::from_shape_fn((pos.len(), pos.len()), |(i, j)| rl[(pos[i], pos[j])])
        }
        ShellOrder::Cart(cart_order) => cart_shell_matrix(cart_order, wmat),
    }
}
