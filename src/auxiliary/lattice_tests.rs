use std::f64::consts::PI;

use approx;
use nalgebra::Vector3;
use proptest::prelude::*;

use crate::auxiliary::lattice::{KMesh, Lattice};

fn bcc_lattice() -> Lattice {
    Lattice::new([
        [1.755, 1.755, -1.755],
        [-1.755, 1.755, 1.755],
        [1.755, -1.755, 1.755],
    ])
    .unwrap()
}

#[test]
fn test_lattice_reciprocal_vectors() {
    let lattice = bcc_lattice();
    let recip = lattice.reciprocal_vectors();
    for i in 0..3 {
        for j in 0..3 {
            let dot = recip.row(i).dot(&lattice.vectors().row(j));
            let expected = if i == j { 2.0 * PI } else { 0.0 };
            approx::assert_abs_diff_eq!(dot, expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_lattice_singular() {
    let err = Lattice::new([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).unwrap_err();
    assert!(err.is_domain());
}

#[test]
fn test_lattice_fractional_round_trip() {
    let lattice = bcc_lattice();
    let frac = Vector3::new(0.25, -0.5, 0.75);
    let cart = lattice.to_cartesian(&frac);
    approx::assert_abs_diff_eq!(lattice.to_fractional(&cart), frac, epsilon = 1e-12);

    let scaled = Vector3::new(0.5, 0.0, -0.25);
    let kpt = lattice.kpt_from_scaled(&scaled);
    approx::assert_abs_diff_eq!(lattice.scaled_kpt(&kpt), scaled, epsilon = 1e-12);
}

#[test]
fn test_lattice_make_kpts_gamma_centred() {
    let lattice = Lattice::new([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]).unwrap();
    let mesh = KMesh::new([2, 2, 1]).unwrap();
    let kpts = lattice.make_kpts(&mesh, true);
    assert_eq!(kpts.len(), 4);
    approx::assert_abs_diff_eq!(kpts[0], Vector3::zeros(), epsilon = 1e-14);
    approx::assert_abs_diff_eq!(kpts[1], Vector3::new(0.0, PI / 2.0, 0.0), epsilon = 1e-14);
    approx::assert_abs_diff_eq!(kpts[2], Vector3::new(PI / 2.0, 0.0, 0.0), epsilon = 1e-14);
    approx::assert_abs_diff_eq!(
        kpts[3],
        Vector3::new(PI / 2.0, PI / 2.0, 0.0),
        epsilon = 1e-14
    );
    assert_eq!(KMesh::from_kpts(&lattice, &kpts).unwrap(), mesh);
}

#[test]
fn test_lattice_make_kpts_shifted_odd_mesh_is_commensurate() {
    let lattice = bcc_lattice();
    let mesh = KMesh::new([3, 1, 3]).unwrap();
    let kpts = lattice.make_kpts(&mesh, false);
    assert_eq!(KMesh::from_kpts(&lattice, &kpts).unwrap(), mesh);
}

#[test]
fn test_lattice_kpts_equivalent() {
    let lattice = bcc_lattice();
    let k = lattice.kpt_from_scaled(&Vector3::new(0.5, 0.0, 0.0));
    let mk = lattice.kpt_from_scaled(&Vector3::new(-0.5, 0.0, 0.0));
    assert!(lattice.kpts_equivalent(&k, &mk, 1e-8));
    let q = lattice.kpt_from_scaled(&Vector3::new(0.25, 0.0, 0.0));
    assert!(!lattice.kpts_equivalent(&k, &q, 1e-8));
}

#[test]
fn test_kmesh_from_descriptor() {
    assert_eq!(
        KMesh::from_descriptor(&[2.0, 2.0, 1.0]).unwrap(),
        KMesh::new([2, 2, 1]).unwrap()
    );
    assert!(KMesh::from_descriptor(&[2.5, 2.0, 1.0])
        .unwrap_err()
        .is_domain());
    assert!(KMesh::from_descriptor(&[0.0, 2.0, 1.0])
        .unwrap_err()
        .is_domain());
    assert!(KMesh::from_descriptor(&[-2.0, 2.0, 1.0])
        .unwrap_err()
        .is_domain());
    assert!(KMesh::from_descriptor(&[2.0, 2.0]).unwrap_err().is_domain());
    assert!(KMesh::from_descriptor(&[f64::NAN, 1.0, 1.0])
        .unwrap_err()
        .is_domain());
    assert!(KMesh::new([1, 0, 1]).unwrap_err().is_domain());
}

#[test]
fn test_kmesh_from_kpts_inconsistent() {
    let lattice = Lattice::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();

    // Shifted by a non-commensurate offset.
    let shifted = [0.1, 0.35, 0.6, 0.85]
        .iter()
        .map(|s| lattice.kpt_from_scaled(&Vector3::new(*s, 0.0, 0.0)))
        .collect::<Vec<_>>();
    assert!(KMesh::from_kpts(&lattice, &shifted).unwrap_err().is_domain());

    // Incomplete 2 × 2 mesh.
    let incomplete = [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5)]
        .iter()
        .map(|(a, b)| lattice.kpt_from_scaled(&Vector3::new(*a, *b, 0.0)))
        .collect::<Vec<_>>();
    assert!(KMesh::from_kpts(&lattice, &incomplete)
        .unwrap_err()
        .is_domain());

    // Duplicates modulo the reciprocal lattice.
    let duplicated = [0.0, 0.5, 1.0]
        .iter()
        .map(|s| lattice.kpt_from_scaled(&Vector3::new(*s, 0.0, 0.0)))
        .collect::<Vec<_>>();
    assert!(KMesh::from_kpts(&lattice, &duplicated)
        .unwrap_err()
        .is_domain());

    assert!(KMesh::from_kpts(&lattice, &[]).unwrap_err().is_domain());
}

#[test]
fn test_kmesh_translations_and_double_indices() {
    let mesh = KMesh::new([2, 3, 1]).unwrap();
    let translations = mesh.translations();
    assert_eq!(
        translations,
        vec![
            [0, 0, 0],
            [0, 1, 0],
            [0, 2, 0],
            [1, 0, 0],
            [1, 1, 0],
            [1, 2, 0]
        ]
    );
    assert_eq!(mesh.translation_index([-1, -1, 0]), 5);
    assert_eq!(mesh.translation_index([2, 3, 7]), 0);

    let idx = mesh.double_translation_indices();
    assert_eq!(idx.shape(), &[6, 6]);
    // D[R, R] = 0 and D[0, S] = S.
    for r in 0..6 {
        assert_eq!(idx[(r, r)], 0);
        assert_eq!(idx[(0, r)], r);
    }
    // (0, 2, 0) - (1, 1, 0) = (-1, 1, 0) ≡ (1, 1, 0).
    assert_eq!(idx[(4, 2)], 4);
}

#[test]
fn test_kmesh_serde() {
    let mesh: KMesh = serde_yaml::from_str("[2, 2, 1]").unwrap();
    assert_eq!(mesh.dims(), &[2, 2, 1]);
    assert!(serde_yaml::from_str::<KMesh>("[2, 0, 1]").is_err());

    let lattice: Lattice = serde_yaml::from_str("[[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]").unwrap();
    approx::assert_abs_diff_eq!(lattice.volume(), 8.0, epsilon = 1e-12);
}

proptest! {
    #[test]
    fn test_supercell_volume_and_cardinality(n1 in 1usize..5, n2 in 1usize..5, n3 in 1usize..5) {
        let lattice = bcc_lattice();
        let mesh = KMesh::new([n1, n2, n3]).unwrap();
        let supercell = lattice.supercell(&mesh);
        let nk = (n1 * n2 * n3) as f64;
        prop_assert!((supercell.volume() - nk * lattice.volume()).abs() < 1e-8 * supercell.volume());
        prop_assert_eq!(mesh.translations().len(), mesh.nk());
        let kpts = lattice.make_kpts(&mesh, true);
        prop_assert_eq!(KMesh::from_kpts(&lattice, &kpts).unwrap(), mesh);
    }
}
