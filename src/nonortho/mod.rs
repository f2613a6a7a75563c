//! Orthogonalisation in non-orthogonal atomic-orbital bases.

use duplicate::duplicate_item;
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Eigh, Norm, Scalar, UPLO};
use num_complex::Complex;

use crate::errors::UnfoldError;


// =================
// Trait definitions
// =================

/// Trait for Löwdin canonical orthogonalisation of a Hermitian positive-semidefinite matrix
/// $`\mathbf{S}`$, giving $`\mathbf{X} = \mathbf{U}\mathbf{s}^{-1/2}`$ with $`\mathbf{U}`$ and
/// $`\mathbf{s}`$ the eigenvectors and non-zero eigenvalues of $`\mathbf{S}`$.
pub trait CanonicalOrthogonalisable {
    /// Numerical type of the matrix elements.
    type NumType;

    /// Calculates the canonical orthogonalisation matrix.
    ///
    /// # Arguments
    ///
    /// * `thresh_offdiag` - Threshold for verifying that the matrix is Hermitian.
    /// * `thresh_zeroov` - Threshold for determining zero eigenvalues of the matrix.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Numerical`] if the matrix is not Hermitian, has negative
    /// eigenvalues, or cannot be diagonalised.
    fn calc_canonical_orthogonal_matrix(
        &self,
        thresh_offdiag: f64,
        thresh_zeroov: f64,
    ) -> Result<CanonicalOrthogonalisationResult<Self::NumType>, UnfoldError>;
}

/// Trait for symmetric (Löwdin) orthonormalisation of a set of vectors with respect to a metric,
/// $`\mathbf{C} \mapsto \mathbf{C}(\mathbf{C}^\dagger\mathbf{S}\mathbf{C})^{-1/2}`$.
pub trait LowdinOrthonormalisable {
    /// Numerical type of the matrix elements.
    type NumType;

    /// Orthonormalises the columns of `self` with respect to the metric `smat`.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Numerical`] if the columns are linearly dependent within
    /// `thresh_zeroov` or the overlap cannot be diagonalised.
    fn lowdin_orthonormalise(
        &self,
        smat: &ArrayView2<Self::NumType>,
        thresh_zeroov: f64,
    ) -> Result<Array2<Self::NumType>, UnfoldError>;

    /// Returns $`\max_{ij} |(\mathbf{C}^\dagger\mathbf{S}\mathbf{C} - \mathbf{I})_{ij}|`$.
    fn orthonormality_deviation(&self, smat: &ArrayView2<Self::NumType>) -> f64;
}

// ==================
// Struct definitions
// ==================

/// Structure containing the results of the Löwdin canonical orthogonalisation.
#[derive(Clone, Debug)]
pub struct CanonicalOrthogonalisationResult<T> {
    /// The eigenvalues of the input matrix.
    eigenvalues: Array1<f64>,

    /// The Löwdin canonical orthogonalisation matrix $`\mathbf{X}`$.
    xmat: Array2<T>,

    /// The conjugate transpose of the Löwdin canonical orthogonalisation matrix,
    /// $`\mathbf{X}^{\dagger}`$.
    xmat_d: Array2<T>,
}

impl<T> CanonicalOrthogonalisationResult<T> {
    /// Returns the eigenvalues of the input matrix.
    pub fn eigenvalues(&self) -> ArrayView1<f64> {
        self.eigenvalues.view()
    }

    /// Returns the Löwdin canonical orthogonalisation matrix $`\mathbf{X}`$.
    pub fn xmat(&self) -> ArrayView2<T> {
        self.xmat.view()
    }

    /// Returns the conjugate transpose $`\mathbf{X}^{\dagger}`$ of the Löwdin canonical
    /// orthogonalisation matrix.
    pub fn xmat_d(&self) -> ArrayView2<T> {
        self.xmat_d.view()
    }
}

// =====================
// Trait implementations
// =====================

#[duplicate_item(
    [
        dtype_ [ f64 ]
    ]
    [
        dtype_ [ Complex<f64> ]
    ]
)]
impl CanonicalOrthogonalisable for ArrayView2<'_, dtype_> {
    type NumType = dtype_;

    fn calc_canonical_orthogonal_matrix(
        &self,
        thresh_offdiag: f64,
        thresh_zeroov: f64,
    ) -> Result<CanonicalOrthogonalisationResult<Self::NumType>, UnfoldError> {
        let smat = self;
        let hermiticity = (smat.to_owned() - smat.map(|v| v.conj()).t()).norm_max();
        if hermiticity > thresh_offdiag {
            return Err(UnfoldError::Numerical(format!(
                "the overlap matrix deviates from hermiticity by {hermiticity:.3e}"
            )));
        }

        let (s_eig, umat) = smat.eigh(UPLO::Lower)?;
        let nonzero_s_indices = s_eig
            .iter()
            .positions(|x| x.abs() > thresh_zeroov)
            .collect_vec();
        let nonzero_s_eig = s_eig.select(Axis(0), &nonzero_s_indices);
        if nonzero_s_eig.iter().any(|v| *v < 0.0) {
            return Err(UnfoldError::Numerical(
                "the overlap matrix has negative eigenvalues and cannot be orthogonalised"
                    .to_string(),
            ));
        }
        let nullity = smat.nrows() - nonzero_s_indices.len();
        if nullity > 0 {
            log::debug!("Canonical orthogonalisation removes {nullity} linear dependencies.");
        }
        let nonzero_umat = umat.select(Axis(1), &nonzero_s_indices);
        let s_s = Array2::<dtype_>::from_diag(
            &nonzero_s_eig.mapv(|x| <dtype_>::from(1.0 / x.sqrt())),
        );
        let xmat = nonzero_umat.dot(&s_s);
        let xmat_d = xmat.map(|v| v.conj()).t().to_owned();
        Ok(CanonicalOrthogonalisationResult {
            eigenvalues: s_eig,
            xmat,
            xmat_d,
        })
    }
}

#[duplicate_item(
    [
        dtype_ [ f64 ]
    ]
    [
        dtype_ [ Complex<f64> ]
    ]
)]
impl LowdinOrthonormalisable for ArrayView2<'_, dtype_> {
    type NumType = dtype_;

    fn lowdin_orthonormalise(
        &self,
        smat: &ArrayView2<Self::NumType>,
        thresh_zeroov: f64,
    ) -> Result<Array2<Self::NumType>, UnfoldError> {
        let cmat = self;
        let omat = cmat.map(|v| v.conj()).t().dot(smat).dot(cmat);
        let (o_eig, vmat) = omat.eigh(UPLO::Lower)?;
        if let Some(smallest) = o_eig.iter().find(|x| **x <= thresh_zeroov) {
            return Err(UnfoldError::Numerical(format!(
                "the orbitals are linearly dependent (overlap eigenvalue {smallest:.3e})"
            )));
        }
        let o_s = Array2::<dtype_>::from_diag(&o_eig.mapv(|x| <dtype_>::from(1.0 / x.sqrt())));
        let o_inv_sqrt = vmat.dot(&o_s).dot(&vmat.map(|v| v.conj()).t());
        Ok(cmat.dot(&o_inv_sqrt))
    }

    fn orthonormality_deviation(&self, smat: &ArrayView2<Self::NumType>) -> f64 {
        let cmat = self;
        let omat = cmat.map(|v| v.conj()).t().dot(smat).dot(cmat);
        (omat - Array2::<dtype_>::eye(cmat.ncols())).norm_max()
    }
}

// =========
// Functions
// =========

/// Solves the real symmetric generalised eigenvalue problem of the second kind,
/// $`\mathbf{F}\mathbf{S}\mathbf{x} = e\mathbf{x}`$, with $`\mathbf{S}`$ positive-semidefinite.
///
/// With $`\mathbf{S} = \mathbf{Z}^{\mathsf{T}}\mathbf{Z}`$ and
/// $`\mathbf{Z} = \mathbf{X}^{\dagger}\mathbf{S}`$ from canonical orthogonalisation, the problem
/// becomes the standard eigenvalue problem of $`\mathbf{Z}\mathbf{F}\mathbf{Z}^{\mathsf{T}}`$, whose
/// eigenvectors $`\mathbf{y}`$ give $`\mathbf{x} = \mathbf{X}\mathbf{y}`$, normalised such that
/// $`\mathbf{x}^{\mathsf{T}}\mathbf{S}\mathbf{x} = 1`$.
///
/// # Arguments
///
/// * `fmat` - The real symmetric matrix $`\mathbf{F}`$.
/// * `smat` - The real symmetric metric $`\mathbf{S}`$.
/// * `thresh_offdiag` - Threshold for verifying that $`\mathbf{S}`$ is symmetric.
/// * `thresh_zeroov` - Threshold for determining zero eigenvalues of $`\mathbf{S}`$.
///
/// # Returns
///
/// The eigenvalues in ascending order and the corresponding eigenvectors as columns.
pub fn solve_type2_generalised_eigh(
    fmat: &ArrayView2<f64>,
    smat: &ArrayView2<f64>,
    thresh_offdiag: f64,
    thresh_zeroov: f64,
) -> Result<(Array1<f64>, Array2<f64>), UnfoldError> {
    let co = smat.calc_canonical_orthogonal_matrix(thresh_offdiag, thresh_zeroov)?;
    let zmat = co.xmat_d().dot(smat);
    let mmat = zmat.dot(fmat).dot(&zmat.t());
    let mmat_sym = (&mmat + &mmat.t()) * 0.5;
    let (eigvals, ymat) = mmat_sym.eigh(UPLO::Lower)?;
    Ok((eigvals, co.xmat().dot(&ymat)))
}
