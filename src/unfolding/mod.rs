//! Building blocks for unfolding k-point-sampled orbitals onto a commensurate supercell.
//!
//! A Bloch orbital $`\psi_{\mathbf{k}m}`$ with coefficients $`\mathbf{C}_{\mathbf{k}}`$ is
//! expressed in the supercell basis, whose functions are the primitive-cell functions replicated
//! at the lattice translations $`\mathbf{R}`$ inside the supercell, as
//! ```math
//! C^{\mathrm{sc}}_{(\mathbf{R}\mu),(\mathbf{k}m)}
//!     = \frac{e^{i\mathbf{k}\cdot\mathbf{R}}}{\sqrt{N_k}} C_{\mathbf{k},\mu m}.
//! ```

use itertools::Itertools;
use nalgebra::Vector3;
use ndarray::{concatenate, s, stack, Array1, Array2, Axis};
use ndarray_einsum_beta::einsum;
use ndarray_linalg::Norm;
use num_complex::Complex;
use num_traits::{ToPrimitive, Zero};
use rayon::prelude::*;

use crate::auxiliary::lattice::{KMesh, Lattice};
use crate::errors::{NumericalWarning, NumericalWarningKind, UnfoldError};
use crate::nonortho::solve_type2_generalised_eigh;
use crate::target::mean_field::KPointOrbitals;

#[cfg(test)]
#[path = "unfolding_tests.rs"]
mod unfolding_tests;

/// Occupation numbers above this value mark an orbital as occupied.
pub const OCCUPATION_THRESHOLD: f64 = 1e-8;

/// Energy offset below the lowest orbital energy used to make the energy-weighted supercell
/// matrix positive-semidefinite during realisation.
const REALISATION_SHIFT: f64 = 0.1;

// ==================
// Struct definitions
// ==================

/// Structure containing the thresholds of the realisation step.
#[derive(Clone, Copy, Debug)]
pub struct RealisationThresholds {
    /// Coefficients whose imaginary parts are all below this value are taken as real directly.
    pub real: f64,

    /// Tolerance on the imaginary part of the energy-weighted supercell matrix.
    pub imag_residue: f64,

    /// Threshold for verifying that the supercell overlap matrix is symmetric.
    pub offdiag: f64,

    /// Threshold below which shifted eigenvalues are discarded.
    pub zeroov: f64,
}

/// Structure containing the real orbitals of one spin channel produced by realisation.
#[derive(Clone, Debug)]
pub struct RealisedOrbitals {
    /// The real orbital coefficients.
    pub coefficients: Array2<f64>,

    /// The orbital energies in ascending order, unless the input was already real.
    pub energies: Array1<f64>,

    /// The orbital occupation numbers.
    pub occupations: Array1<f64>,

    /// Boolean indicating if the coefficients were re-derived from the energy-weighted matrix.
    pub rederived: bool,

    /// The numerical warnings raised.
    pub warnings: Vec<NumericalWarning>,
}

// =========
// Functions
// =========

/// Computes the phase matrix $`\mathrm{phase}_{\mathbf{R}\mathbf{k}} = e^{i\mathbf{k}\cdot\mathbf{R}} /
/// \sqrt{N_k}`$ between the lattice translations of the supercell and a set of k-points.
///
/// # Arguments
///
/// * `lattice` - The primitive lattice.
/// * `mesh` - The k-point mesh defining the supercell.
/// * `kpts` - The Cartesian k-points.
///
/// # Returns
///
/// The phase matrix of shape $`(N_R, N_k)`$, unitary when `kpts` is the full mesh.
pub fn phase_matrix(lattice: &Lattice, mesh: &KMesh, kpts: &[Vector3<f64>]) -> Array2<Complex<f64>> {
    let translations = mesh.translation_vectors(lattice);
    let norm = 1.0 / mesh.nk().to_f64().unwrap_or(1.0).sqrt();
    Array2::from_shape_fn((translations.len(), kpts.len()), |(r, k)| {
        Complex::new(0.0, kpts[k].dot(&translations[r])).exp() * norm
    })
}

/// Transforms atomic-orbital matrices sampled at the k-points of a mesh into the supercell matrix
/// ```math
/// M^{\mathrm{sc}}_{(\mathbf{R}\mu),(\mathbf{S}\nu)}
///     = \sum_{\mathbf{k}} \mathrm{phase}_{\mathbf{R}\mathbf{k}} M_{\mathbf{k},\mu\nu}
///       \mathrm{phase}^*_{\mathbf{S}\mathbf{k}}.
/// ```
///
/// # Arguments
///
/// * `phase` - The phase matrix from [`phase_matrix`].
/// * `mats` - The matrices at every k-point, in the column order of `phase`.
///
/// # Errors
///
/// Errors with [`UnfoldError::Dimension`] if the number of matrices does not match the number of
/// k-points or the matrices have different shapes.
pub fn to_supercell_ao_integrals(
    phase: &Array2<Complex<f64>>,
    mats: &[Array2<Complex<f64>>],
) -> Result<Array2<Complex<f64>>, UnfoldError> {
    let (nr, nk) = phase.dim();
    if mats.len() != nk {
        return Err(UnfoldError::Dimension(format!(
            "{} matrices given for {nk} k-points",
            mats.len()
        )));
    }
    let views = mats.iter().map(|m| m.view()).collect_vec();
    let mats_k = stack(Axis(0), &views).map_err(|err| UnfoldError::Dimension(err.to_string()))?;
    let (_, nao, nao2) = mats_k.dim();
    let phase_conj = phase.mapv(|p| p.conj());
    let msc = einsum(
        "Rk,kuv,Sk->RuSv",
        &[&phase.view(), &mats_k.view(), &phase_conj.view()],
    )
    .map_err(|err| UnfoldError::Dimension(err.to_string()))?;
    Array2::from_shape_vec((nr * nao, nr * nao2), msc.iter().cloned().collect())
        .map_err(|err| UnfoldError::Dimension(err.to_string()))
}

/// Assembles a supercell matrix from lattice-summed blocks indexed by translation,
/// $`M^{\mathrm{sc}}_{\mathbf{R}\mathbf{S}} = M(\mathbf{S} - \mathbf{R})`$.
///
/// # Arguments
///
/// * `mesh` - The k-point mesh defining the supercell.
/// * `mats` - The blocks $`M(\mathbf{T})`$ between the reference cell and the image cell at
///   every translation $`\mathbf{T}`$, in the order of [`KMesh::translations`].
///
/// # Errors
///
/// Errors with [`UnfoldError::Dimension`] if the number of blocks is not the number of
/// translations or the blocks have different shapes.
pub fn to_supercell_from_translations<T: Clone + Zero>(
    mesh: &KMesh,
    mats: &[Array2<T>],
) -> Result<Array2<T>, UnfoldError> {
    let nk = mesh.nk();
    if mats.len() != nk {
        return Err(UnfoldError::Dimension(format!(
            "{} translation blocks given for a supercell of {nk} cells",
            mats.len()
        )));
    }
    let (nrow, ncol) = mats[0].dim();
    if mats.iter().any(|m| m.dim() != (nrow, ncol)) {
        return Err(UnfoldError::Dimension(
            "the translation blocks have different shapes".to_string(),
        ));
    }
    let idx = mesh.double_translation_indices();
    let mut msc = Array2::<T>::zeros((nk * nrow, nk * ncol));
    for ((r, s_), t) in idx.indexed_iter() {
        msc.slice_mut(s![r * nrow..(r + 1) * nrow, s_ * ncol..(s_ + 1) * ncol])
            .assign(&mats[*t]);
    }
    Ok(msc)
}

/// Locates the time-reversal partner $`-\mathbf{k}`$ of every k-point and checks that partners
/// carry matching orbitals.
///
/// # Arguments
///
/// * `lattice` - The primitive lattice.
/// * `kpts` - The Cartesian k-points of the full mesh.
/// * `orbitals` - The orbitals of every spin channel at every k-point.
/// * `kpt_thresh` - Threshold on scaled k-point coordinates.
/// * `occ_thresh` - Threshold on differences between occupation numbers.
///
/// # Returns
///
/// The index of the partner of every k-point.
///
/// # Errors
///
/// Errors with [`UnfoldError::Domain`] if some k-point has no partner, or if partners differ in
/// their number of orbitals or occupations.
pub fn check_time_reversal_partners(
    lattice: &Lattice,
    kpts: &[Vector3<f64>],
    orbitals: &[Vec<KPointOrbitals>],
    kpt_thresh: f64,
    occ_thresh: f64,
) -> Result<Vec<usize>, UnfoldError> {
    let partners = kpts
        .iter()
        .enumerate()
        .map(|(i, kpt)| {
            kpts.iter()
                .position(|other| lattice.kpts_equivalent(&(-kpt), other, kpt_thresh))
                .ok_or_else(|| {
                    UnfoldError::Domain(format!(
                        "k-point {i} has no time-reversal partner in the mesh"
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    for (ispin, channel) in orbitals.iter().enumerate() {
        for (i, j) in partners.iter().enumerate().filter(|(i, j)| i < *j) {
            let (orbs_i, orbs_j) = (&channel[i], &channel[*j]);
            if orbs_i.nmo() != orbs_j.nmo() {
                return Err(UnfoldError::Domain(format!(
                    "spin channel {ispin}: k-point {i} has {} orbitals but its time-reversal partner {j} has {}",
                    orbs_i.nmo(),
                    orbs_j.nmo()
                )));
            }
            let mismatch = (orbs_i.occupations() - orbs_j.occupations())
                .iter()
                .any(|d| d.abs() > occ_thresh);
            if mismatch {
                return Err(UnfoldError::Domain(format!(
                    "spin channel {ispin}: occupations at k-point {i} and its time-reversal partner {j} differ"
                )));
            }
        }
    }
    Ok(partners)
}

/// Builds the supercell columns of the orbitals at every k-point, in k-point-major order.
///
/// The column block of every k-point is computed in parallel and the blocks are concatenated
/// afterwards.
///
/// # Arguments
///
/// * `phase` - The phase matrix from [`phase_matrix`].
/// * `orbitals` - The orbitals at every k-point, in the column order of `phase`.
pub fn assemble_supercell_columns(
    phase: &Array2<Complex<f64>>,
    orbitals: &[KPointOrbitals],
) -> Result<Array2<Complex<f64>>, UnfoldError> {
    let nr = phase.nrows();
    let blocks = orbitals
        .par_iter()
        .enumerate()
        .map(|(k, orbs)| {
            let (nao, nmo) = orbs.coefficients().dim();
            let mut block = Array2::<Complex<f64>>::zeros((nr * nao, nmo));
            for r in 0..nr {
                block
                    .slice_mut(s![r * nao..(r + 1) * nao, ..])
                    .assign(&orbs.coefficients().mapv(|c| c * phase[(r, k)]));
            }
            block
        })
        .collect::<Vec<_>>();
    let views = blocks.iter().map(|b| b.view()).collect_vec();
    concatenate(Axis(1), &views).map_err(|err| UnfoldError::Dimension(err.to_string()))
}

/// Turns the complex supercell orbitals of one spin channel into real orbitals spanning the same
/// space.
///
/// If all imaginary parts are below `thresholds.real`, the real parts are taken directly.
/// Otherwise the energy-weighted matrix
/// $`\mathbf{F} = \mathbf{C}(\mathbf{E} - \epsilon_{\mathrm{shift}})\mathbf{C}^{\dagger}`$, with
/// $`\epsilon_{\mathrm{shift}}`$ just below the lowest energy, is diagonalised against the
/// supercell overlap through $`\mathbf{F}\mathbf{S}\mathbf{x} = e\mathbf{x}`$; the eigenvectors
/// with positive eigenvalues are the real orbitals and $`e + \epsilon_{\mathrm{shift}}`$ their
/// energies.
///
/// # Arguments
///
/// * `cmat` - The supercell orbital coefficients.
/// * `energies` - The orbital energies.
/// * `occupations` - The orbital occupation numbers.
/// * `smat` - The real supercell overlap matrix.
/// * `spin_index` - The spin channel, for reporting.
/// * `thresholds` - The realisation thresholds.
pub fn realise_orbitals(
    cmat: &Array2<Complex<f64>>,
    energies: &Array1<f64>,
    occupations: &Array1<f64>,
    smat: &Array2<f64>,
    spin_index: usize,
    thresholds: &RealisationThresholds,
) -> Result<RealisedOrbitals, UnfoldError> {
    let max_imag = cmat.iter().map(|c| c.im.abs()).fold(0.0, f64::max);
    if max_imag < thresholds.real || cmat.ncols() == 0 {
        log::debug!(
            "Spin channel {spin_index}: supercell orbitals are real already (max |Im| = {max_imag:.3e})."
        );
        return Ok(RealisedOrbitals {
            coefficients: cmat.mapv(|c| c.re),
            energies: energies.clone(),
            occupations: occupations.clone(),
            rederived: false,
            warnings: vec![],
        });
    }

    let nmo = cmat.ncols();
    let mut warnings = vec![];
    let emin = energies.iter().cloned().fold(f64::INFINITY, f64::min);
    let shift = emin - REALISATION_SHIFT;
    let shifted = energies.mapv(|e| Complex::new(e - shift, 0.0));
    let weighted = cmat * &shifted.insert_axis(Axis(0));
    let fmat = weighted.dot(&cmat.t().mapv(|c| c.conj()));
    let imag_residue = fmat.mapv(|f| f.im).norm_max();
    if imag_residue > thresholds.imag_residue {
        warnings.push(NumericalWarning::raise(
            NumericalWarningKind::ImaginaryResidue,
            spin_index,
            imag_residue,
            thresholds.imag_residue,
        ));
    }
    let fmat_re = fmat.mapv(|f| f.re);
    let (evals, evecs) = solve_type2_generalised_eigh(
        &fmat_re.view(),
        &smat.view(),
        thresholds.offdiag,
        thresholds.zeroov,
    )?;
    let kept = evals
        .iter()
        .positions(|e| *e > thresholds.zeroov)
        .collect_vec();
    if kept.len() != nmo {
        let magnitude = kept.len().abs_diff(nmo).to_f64().unwrap_or(f64::NAN);
        warnings.push(NumericalWarning::raise(
            NumericalWarningKind::RealisationRank,
            spin_index,
            magnitude,
            0.0,
        ));
    }
    log::debug!(
        "Spin channel {spin_index}: {} real orbital(s) recovered from {nmo} complex orbital(s).",
        kept.len()
    );

    let sorted_occupations = energies
        .iter()
        .zip(occupations.iter())
        .sorted_by(|(ea, _), (eb, _)| ea.total_cmp(eb))
        .map(|(_, occ)| *occ)
        .chain(std::iter::repeat(0.0))
        .take(kept.len())
        .collect::<Array1<f64>>();
    Ok(RealisedOrbitals {
        coefficients: evecs.select(Axis(1), &kept),
        energies: evals.select(Axis(0), &kept).mapv(|e| e + shift),
        occupations: sorted_occupations,
        rederived: true,
        warnings,
    })
}
