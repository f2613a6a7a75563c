use itertools::Itertools;
use ndarray::{concatenate, Array1, Array2, Axis};
use ndarray_linalg::assert::close_l2;
use ndarray_linalg::{Eigh, UPLO};
use num_complex::Complex;

use crate::auxiliary::lattice::KMesh;
use crate::auxiliary::template_models::TightBindingModel;
use crate::errors::NumericalWarningKind;
use crate::nonortho::CanonicalOrthogonalisable;
use crate::target::mean_field::KPointOrbitals;
use crate::target::SpinConstraint;
use crate::unfolding::{
    assemble_supercell_columns, check_time_reversal_partners, phase_matrix, realise_orbitals,
    to_supercell_ao_integrals, to_supercell_from_translations, RealisationThresholds,
};

type C128 = Complex<f64>;

fn thresholds() -> RealisationThresholds {
    RealisationThresholds {
        real: 1e-10,
        imag_residue: 1e-4,
        offdiag: 1e-10,
        zeroov: 1e-7,
    }
}

fn to_complex(mat: &Array2<f64>) -> Array2<C128> {
    mat.mapv(|x| C128::new(x, 0.0))
}

#[test]
fn test_unfolding_phase_matrix_unitary() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let kpts = model.lattice.make_kpts(&mesh, true);
    let phase = phase_matrix(&model.lattice, &mesh, &kpts);
    assert_eq!(phase.dim(), (3, 3));
    let pp = phase.t().mapv(|p| p.conj()).dot(&phase);
    close_l2(&pp, &Array2::<C128>::eye(3), 1e-12);
}

#[test]
fn test_unfolding_supercell_overlap_matches_direct() {
    let model = TightBindingModel::cubic_sp();
    let mesh = KMesh::new([2, 2, 1]).unwrap();
    let kpts = model.lattice.make_kpts(&mesh, true);
    let sks = kpts
        .iter()
        .map(|kpt| model.kpoint_matrices(kpt).1)
        .collect_vec();
    let phase = phase_matrix(&model.lattice, &mesh, &kpts);
    let ssc = to_supercell_ao_integrals(&phase, &sks).unwrap();
    let (_, ssc_direct) = model.supercell_matrices(&mesh);
    assert_eq!(ssc.dim(), (4 * model.nao(), 4 * model.nao()));
    let max_imag = ssc.iter().map(|s| s.im.abs()).fold(0.0, f64::max);
    assert!(max_imag < 1e-12);
    close_l2(&ssc.mapv(|s| s.re), &ssc_direct, 1e-10);
}

#[test]
fn test_unfolding_supercell_integrals_count_mismatch() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([2, 1, 1]).unwrap();
    let kpts = model.lattice.make_kpts(&mesh, true);
    let phase = phase_matrix(&model.lattice, &mesh, &kpts);
    let sks = vec![model.kpoint_matrices(&kpts[0]).1];
    assert!(to_supercell_ao_integrals(&phase, &sks)
        .unwrap_err()
        .is_dimension());
}

#[test]
fn test_unfolding_supercell_from_translations() {
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let blocks = vec![
        Array2::from_elem((1, 1), 1.0),
        Array2::from_elem((1, 1), 2.0),
        Array2::from_elem((1, 1), 3.0),
    ];
    let msc = to_supercell_from_translations(&mesh, &blocks).unwrap();
    #[rustfmt::skip]
    let expected = Array2::from_shape_vec((3, 3), vec![
        1.0, 2.0, 3.0,
        3.0, 1.0, 2.0,
        2.0, 3.0, 1.0,
    ]).unwrap();
    assert_eq!(msc, expected);

    let err = to_supercell_from_translations(&mesh, &blocks[..2]).unwrap_err();
    assert!(err.is_dimension());
    let ragged = vec![
        Array2::from_elem((1, 1), 1.0),
        Array2::from_elem((2, 2), 2.0),
        Array2::from_elem((1, 1), 3.0),
    ];
    assert!(to_supercell_from_translations(&mesh, &ragged)
        .unwrap_err()
        .is_dimension());
}

#[test]
fn test_unfolding_columns_diagonalise_supercell() {
    let model = TightBindingModel::cubic_sp();
    let mesh = KMesh::new([2, 1, 2]).unwrap();
    let pmf = model.periodic_mean_field(&mesh, SpinConstraint::Restricted, &[2]);
    let phase = phase_matrix(&model.lattice, &mesh, pmf.kpts());
    let cmat = assemble_supercell_columns(&phase, &pmf.orbitals()[0]).unwrap();
    let nsc = 4 * model.nao();
    assert_eq!(cmat.dim(), (nsc, nsc));

    let (hsc, ssc) = model.supercell_matrices(&mesh);
    let cmat_h = cmat.t().mapv(|c| c.conj());
    let ovlp = cmat_h.dot(&to_complex(&ssc)).dot(&cmat);
    close_l2(&ovlp, &Array2::<C128>::eye(nsc), 1e-10);

    let energies = pmf.orbitals()[0]
        .iter()
        .map(|orbs| orbs.energies().view())
        .collect_vec();
    let energies = concatenate(Axis(0), &energies).unwrap();
    let fock = cmat_h.dot(&to_complex(&hsc)).dot(&cmat);
    close_l2(
        &fock,
        &Array2::from_diag(&energies.mapv(|e| C128::new(e, 0.0))),
        1e-10,
    );
}

#[test]
fn test_unfolding_time_reversal_partners() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let pmf = model.periodic_mean_field(&mesh, SpinConstraint::Restricted, &[1]);
    let partners =
        check_time_reversal_partners(&model.lattice, pmf.kpts(), pmf.orbitals(), 1e-6, 1e-8).unwrap();
    assert_eq!(partners, vec![0, 2, 1]);

    let partial = vec![pmf.orbitals()[0][..2].to_vec()];
    let err = check_time_reversal_partners(&model.lattice, &pmf.kpts()[..2], &partial, 1e-6, 1e-8)
        .unwrap_err();
    assert!(err.is_domain());
}

#[test]
fn test_unfolding_time_reversal_partners_occupation_mismatch() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let kpts = model.lattice.make_kpts(&mesh, true);
    let orbitals = vec![vec![
        model.solve_kpt(&kpts[0], 1, 2.0).0,
        model.solve_kpt(&kpts[1], 1, 2.0).0,
        model.solve_kpt(&kpts[2], 0, 2.0).0,
    ]];
    let err =
        check_time_reversal_partners(&model.lattice, &kpts, &orbitals, 1e-6, 1e-8).unwrap_err();
    assert!(err.is_domain());
}

#[test]
fn test_unfolding_time_reversal_partners_occupation_tolerance() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let kpts = model.lattice.make_kpts(&mesh, true);
    let (orbs_minus, _) = model.solve_kpt(&kpts[2], 1, 2.0);
    let perturbed = KPointOrbitals::builder()
        .coefficients(orbs_minus.coefficients().clone())
        .energies(orbs_minus.energies().clone())
        .occupations(
            orbs_minus
                .occupations()
                .mapv(|occ| if occ > 0.0 { occ - 1e-5 } else { occ }),
        )
        .build()
        .unwrap();
    let orbitals = vec![vec![
        model.solve_kpt(&kpts[0], 1, 2.0).0,
        model.solve_kpt(&kpts[1], 1, 2.0).0,
        perturbed,
    ]];

    // A loose k-point threshold does not loosen the occupation comparison.
    let err =
        check_time_reversal_partners(&model.lattice, &kpts, &orbitals, 1e-3, 1e-8).unwrap_err();
    assert!(err.is_domain());
    let partners = check_time_reversal_partners(&model.lattice, &kpts, &orbitals, 1e-6, 1e-4)
        .unwrap();
    assert_eq!(partners, vec![0, 2, 1]);
}

#[test]
fn test_unfolding_realise_chain() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let pmf = model.periodic_mean_field(&mesh, SpinConstraint::Restricted, &[1]);
    let phase = phase_matrix(&model.lattice, &mesh, pmf.kpts());
    let cmat = assemble_supercell_columns(&phase, &pmf.orbitals()[0]).unwrap();
    let energies = pmf.orbitals()[0]
        .iter()
        .flat_map(|orbs| orbs.energies().iter().cloned())
        .collect::<Array1<f64>>();
    let occupations = pmf.orbitals()[0]
        .iter()
        .flat_map(|orbs| orbs.occupations().iter().cloned())
        .collect::<Array1<f64>>();
    let (hsc, ssc) = model.supercell_matrices(&mesh);

    let realised =
        realise_orbitals(&cmat, &energies, &occupations, &ssc, 0, &thresholds()).unwrap();
    assert!(realised.rederived);
    assert!(realised.warnings.is_empty());
    assert_eq!(realised.coefficients.dim(), (3, 3));

    let sorted_energies = energies
        .iter()
        .cloned()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Array1<f64>>();
    close_l2(&realised.energies, &sorted_energies, 1e-10);
    let c = &realised.coefficients;
    close_l2(&c.t().dot(&ssc).dot(c), &Array2::<f64>::eye(3), 1e-10);
    close_l2(
        &c.t().dot(&hsc).dot(c),
        &Array2::from_diag(&realised.energies),
        1e-10,
    );
    assert_eq!(realised.occupations.to_vec(), vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_unfolding_realise_already_real() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([2, 1, 1]).unwrap();
    let (hsc, ssc) = model.supercell_matrices(&mesh);
    let co = ssc
        .view()
        .calc_canonical_orthogonal_matrix(1e-10, 1e-10)
        .unwrap();
    let hprime = co.xmat().t().dot(&hsc).dot(&co.xmat());
    let (energies, ymat) = hprime.eigh(UPLO::Lower).unwrap();
    let cmat = to_complex(&co.xmat().dot(&ymat));
    let occupations = Array1::from_vec(vec![2.0, 0.0]);
    let realised =
        realise_orbitals(&cmat, &energies, &occupations, &ssc, 0, &thresholds()).unwrap();
    assert!(!realised.rederived);
    assert_eq!(realised.energies, energies);
    assert_eq!(realised.occupations, occupations);
    close_l2(&realised.coefficients, &co.xmat().dot(&ymat), 1e-14);
}

#[test]
fn test_unfolding_realise_rank_warning() {
    let model = TightBindingModel::chain_s();
    let mesh = KMesh::new([3, 1, 1]).unwrap();
    let pmf = model.periodic_mean_field(&mesh, SpinConstraint::Restricted, &[1]);
    // Without its time-reversal partner, a single complex orbital spans a two-dimensional real
    // space.
    let phase = phase_matrix(&model.lattice, &mesh, &pmf.kpts()[1..2]);
    let cmat = assemble_supercell_columns(&phase, &pmf.orbitals()[0][1..2]).unwrap();
    let energies = pmf.orbitals()[0][1].energies().clone();
    let occupations = pmf.orbitals()[0][1].occupations().clone();
    let (_, ssc) = model.supercell_matrices(&mesh);
    let realised =
        realise_orbitals(&cmat, &energies, &occupations, &ssc, 0, &thresholds()).unwrap();
    assert_eq!(realised.coefficients.ncols(), 2);
    assert!(realised
        .warnings
        .iter()
        .any(|w| w.kind == NumericalWarningKind::RealisationRank));
    assert!(realised
        .warnings
        .iter()
        .any(|w| w.kind == NumericalWarningKind::ImaginaryResidue));
    assert_eq!(realised.occupations.to_vec(), vec![2.0, 0.0]);
}
