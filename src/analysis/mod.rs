//! Verification scalars for comparing orbital sets: Mulliken populations, subspace overlap
//! determinants and array fingerprints.

use duplicate::duplicate_item;
use ndarray::{s, Array1, ArrayView1, ArrayView2};
use ndarray_linalg::{Determinant, Scalar};
use num_complex::Complex;
use num_traits::ToPrimitive;

use crate::basis::ao::BasisAngularOrder;
use crate::errors::UnfoldError;


/// Computes the Mulliken gross population of every basis function,
/// ```math
/// q_{\mu} = \mathrm{Re} \sum_{\nu} (\mathbf{C}\mathbf{n}\mathbf{C}^{\dagger})_{\mu\nu} S_{\nu\mu}.
/// ```
///
/// # Arguments
///
/// * `cmat` - The orbital coefficients, of shape (basis functions, orbitals).
/// * `occupations` - The orbital occupation numbers.
/// * `smat` - The Hermitian overlap matrix of the basis.
///
/// # Errors
///
/// Errors with [`UnfoldError::Dimension`] if the shapes disagree.
#[duplicate_item(
    [
        dtype_ [ f64 ]
        mulliken_populations_ [ mulliken_populations ]
    ]
    [
        dtype_ [ Complex<f64> ]
        mulliken_populations_ [ mulliken_populations_complex ]
    ]
)]
pub fn mulliken_populations_(
    cmat: &ArrayView2<dtype_>,
    occupations: &ArrayView1<f64>,
    smat: &ArrayView2<dtype_>,
) -> Result<Array1<f64>, UnfoldError> {
    let (nao, nmo) = cmat.dim();
    if occupations.len() != nmo || smat.dim() != (nao, nao) {
        return Err(UnfoldError::Dimension(format!(
            "coefficients of shape {:?} with {} occupations and an overlap of shape {:?}",
            cmat.shape(),
            occupations.len(),
            smat.shape()
        )));
    }
    let sc = smat.dot(cmat);
    let weighted = cmat.to_owned() * sc.map(|x| x.conj());
    Ok(weighted.map(|x| x.re()).dot(occupations))
}

/// Sums basis-function populations onto the atoms of a basis layout.
///
/// # Errors
///
/// Errors with [`UnfoldError::Dimension`] if the number of populations is not the number of basis
/// functions.
pub fn atom_populations(
    populations: &Array1<f64>,
    bao: &BasisAngularOrder,
) -> Result<Array1<f64>, UnfoldError> {
    if populations.len() != bao.n_funcs() {
        return Err(UnfoldError::Dimension(format!(
            "{} populations given for {} basis functions",
            populations.len(),
            bao.n_funcs()
        )));
    }
    Ok(bao
        .atom_boundary_indices()
        .iter()
        .map(|(start, end)| populations.slice(s![*start..*end]).sum())
        .collect())
}

/// Computes $`|\det(\mathbf{C}_1^{\dagger}\mathbf{S}\mathbf{C}_2)|`$ for two sets of orbitals
/// spanning subspaces of equal dimension.
///
/// The value is $`1`$ if and only if the two sets of orthonormal orbitals span the same subspace,
/// independently of any unitary mixing within either set.
///
/// # Errors
///
/// Errors with [`UnfoldError::Dimension`] if the two sets hold different numbers of orbitals or the
/// shapes disagree with the overlap matrix, and with [`UnfoldError::Numerical`] if the determinant
/// cannot be computed.
#[duplicate_item(
    [
        dtype_ [ f64 ]
        occupied_overlap_determinant_ [ occupied_overlap_determinant ]
    ]
    [
        dtype_ [ Complex<f64> ]
        occupied_overlap_determinant_ [ occupied_overlap_determinant_complex ]
    ]
)]
pub fn occupied_overlap_determinant_(
    cmat_1: &ArrayView2<dtype_>,
    cmat_2: &ArrayView2<dtype_>,
    smat: &ArrayView2<dtype_>,
) -> Result<f64, UnfoldError> {
    let nao = smat.nrows();
    if cmat_1.ncols() != cmat_2.ncols()
        || cmat_1.nrows() != nao
        || cmat_2.nrows() != nao
        || smat.ncols() != nao
    {
        return Err(UnfoldError::Dimension(format!(
            "orbital sets of shapes {:?} and {:?} cannot be compared through an overlap of shape {:?}",
            cmat_1.shape(),
            cmat_2.shape(),
            smat.shape()
        )));
    }
    let ovmat = cmat_1.map(|x| x.conj()).t().dot(smat).dot(cmat_2);
    let det = ovmat.det()?;
    log::debug!("Occupied-subspace overlap determinant: {det:+.8e}");
    Ok(det.abs())
}

/// Computes the cosine-weighted fingerprint $`\sum_i a_i \cos(i)`$ of a sequence of values, taken
/// in logical (row-major) order for arrays.
pub fn fingerprint<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| i.to_f64().unwrap_or(f64::NAN).cos() * v)
        .sum()
}
