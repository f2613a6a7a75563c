use approx::assert_relative_eq;
use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::Array2;
use ndarray_linalg::assert::close_l2;
use num_complex::Complex;

use crate::auxiliary::atom::Atom;
use crate::auxiliary::lattice::Lattice;
use crate::basis::ao::{BasisAngularOrder, BasisAtom, BasisShell, PureOrder, ShellOrder};
use crate::symmetry::space_group::SpaceGroupOperation;

fn cubic_lattice() -> Lattice {
    Lattice::new([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]).unwrap()
}

fn sp_basis(atoms: &[Atom]) -> BasisAngularOrder {
    let shells = [
        BasisShell::new(ShellOrder::Pure(PureOrder::increasingm(0))),
        BasisShell::new(ShellOrder::Pure(PureOrder::xyz_p(1))),
    ];
    let batms = atoms
        .iter()
        .map(|atom| BasisAtom::new(atom.clone(), &shells))
        .collect::<Vec<_>>();
    BasisAngularOrder::new(&batms)
}

fn c4z() -> SpaceGroupOperation {
    SpaceGroupOperation::new([[0, -1, 0], [1, 0, 0], [0, 0, 1]], [0.0; 3], false).unwrap()
}

#[test]
fn test_space_group_operation_rejects_non_unimodular() {
    let res = SpaceGroupOperation::new([[2, 0, 0], [0, 1, 0], [0, 0, 1]], [0.0; 3], false);
    assert!(res.unwrap_err().is_domain());
}

#[test]
fn test_space_group_operation_cartesian_rotation() {
    let lattice = cubic_lattice();
    let wmat = c4z().cartesian_rotation(&lattice).unwrap();
    let expected = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
    assert_relative_eq!(wmat, expected, epsilon = 1e-12);

    // A shear is unimodular but not an isometry of the cubic lattice.
    let shear = SpaceGroupOperation::new([[1, 1, 0], [0, 1, 0], [0, 0, 1]], [0.0; 3], false)
        .unwrap();
    assert!(shear.cartesian_rotation(&lattice).unwrap_err().is_domain());
}

#[test]
fn test_space_group_operation_transform_kpt() {
    let lattice = cubic_lattice();
    let kpt = Vector3::new(0.3, 0.0, 0.1);
    let wk = c4z().transform_kpt(&lattice, &kpt).unwrap();
    assert_relative_eq!(wk, Vector3::new(0.0, 0.3, 0.1), epsilon = 1e-12);

    let trk = SpaceGroupOperation::time_reversal()
        .transform_kpt(&lattice, &kpt)
        .unwrap();
    assert_relative_eq!(trk, -kpt, epsilon = 1e-12);
}

#[test]
fn test_space_group_operation_atom_mapping() {
    let lattice = cubic_lattice();
    let atoms = [
        Atom::new("H", Point3::new(0.0, 0.0, 0.0)),
        Atom::new("H", Point3::new(1.0, 1.0, 1.0)),
    ];
    let atom_refs = atoms.iter().collect::<Vec<_>>();
    let inversion =
        SpaceGroupOperation::new([[-1, 0, 0], [0, -1, 0], [0, 0, -1]], [0.0; 3], false).unwrap();
    let mapping = inversion.atom_mapping(&lattice, &atom_refs, 1e-6).unwrap();
    assert_eq!(mapping[0].0, 0);
    assert_relative_eq!(mapping[0].1, Vector3::zeros(), epsilon = 1e-12);
    assert_eq!(mapping[1].0, 1);
    assert_relative_eq!(mapping[1].1, Vector3::new(-2.0, -2.0, -2.0), epsilon = 1e-12);

    // A quarter translation along x maps no atom onto an equivalent one.
    let glide =
        SpaceGroupOperation::new([[1, 0, 0], [0, 1, 0], [0, 0, 1]], [0.25, 0.0, 0.0], false)
            .unwrap();
    assert!(glide
        .atom_mapping(&lattice, &atom_refs, 1e-6)
        .unwrap_err()
        .is_domain());
}

#[test]
fn test_space_group_operation_ao_representation_identity() {
    let lattice = cubic_lattice();
    let bao = sp_basis(&[Atom::new("He", Point3::new(0.0, 0.0, 0.0))]);
    let kpt = Vector3::new(0.4, -0.2, 0.9);
    let (kpt_image, dmat) = SpaceGroupOperation::identity()
        .ao_representation(&lattice, &bao, &kpt, 1e-6)
        .unwrap();
    assert_relative_eq!(kpt_image, kpt, epsilon = 1e-12);
    close_l2(&dmat, &Array2::<Complex<f64>>::eye(4), 1e-12);
}

#[test]
fn test_space_group_operation_ao_representation_c4z_p_shell() {
    let lattice = cubic_lattice();
    let bao = sp_basis(&[Atom::new("He", Point3::new(0.0, 0.0, 0.0))]);
    let (_, dmat) = c4z()
        .ao_representation(&lattice, &bao, &Vector3::zeros(), 1e-6)
        .unwrap();
    // The p shell is ordered (x, y, z), so its block is the Cartesian matrix itself.
    #[rustfmt::skip]
    let expected = ndarray::array![
        [1.0, 0.0,  0.0, 0.0],
        [0.0, 0.0, -1.0, 0.0],
        [0.0, 1.0,  0.0, 0.0],
        [0.0, 0.0,  0.0, 1.0],
    ]
    .mapv(|x| Complex::new(x, 0.0));
    close_l2(&dmat, &expected, 1e-12);
}

#[test]
fn test_space_group_operation_ao_representation_lattice_phase() {
    let lattice = cubic_lattice();
    let bao = sp_basis(&[Atom::new("He", Point3::new(1.0, 0.0, 0.0))]);
    let inversion =
        SpaceGroupOperation::new([[-1, 0, 0], [0, -1, 0], [0, 0, -1]], [0.0; 3], false).unwrap();
    let kpt = Vector3::new(0.5, 0.0, 0.0);
    let (kpt_image, dmat) = inversion
        .ao_representation(&lattice, &bao, &kpt, 1e-6)
        .unwrap();
    assert_relative_eq!(kpt_image, -kpt, epsilon = 1e-12);
    // The atom at x = 1 is mapped onto itself shifted by L = (-2, 0, 0).
    let phase = Complex::new(0.0, -(kpt_image[0] * -2.0)).exp();
    assert_relative_eq!(dmat[(0, 0)].re, phase.re, epsilon = 1e-12);
    assert_relative_eq!(dmat[(0, 0)].im, phase.im, epsilon = 1e-12);
    assert_relative_eq!(dmat[(1, 1)].re, -phase.re, epsilon = 1e-12);
    assert_relative_eq!(dmat[(1, 1)].im, -phase.im, epsilon = 1e-12);
}

#[test]
fn test_space_group_operation_transform_overlap_unitary() {
    let lattice = cubic_lattice();
    let bao = sp_basis(&[Atom::new("He", Point3::new(0.0, 0.0, 0.0))]);
    let kpt = Vector3::new(0.2, 0.1, 0.0);
    let (_, dmat) = c4z().ao_representation(&lattice, &bao, &kpt, 1e-6).unwrap();
    let smat = Array2::<Complex<f64>>::from_shape_fn((4, 4), |(i, j)| {
        if i == j {
            Complex::new(1.0, 0.0)
        } else if i + j == 3 {
            Complex::new(0.1, 0.05 * (i as f64 - j as f64))
        } else {
            Complex::new(0.0, 0.0)
        }
    });
    let transformed = c4z().transform_overlap(&dmat, &smat).unwrap();
    let expected = dmat.dot(&smat).dot(&dmat.t().mapv(|d| d.conj()));
    close_l2(&transformed, &expected, 1e-10);
}

#[test]
fn test_space_group_operation_serde() {
    let yaml = "rotation:\n- [0, -1, 0]\n- [1, 0, 0]\n- [0, 0, 1]\ntranslation: [0.0, 0.0, 0.5]\n";
    let op: SpaceGroupOperation = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(op.rotation()[(0, 1)], -1);
    assert_eq!(op.rotation()[(1, 0)], 1);
    assert!(!op.is_antiunitary());
    assert_relative_eq!(op.translation()[2], 0.5);
    let roundtrip: SpaceGroupOperation =
        serde_yaml::from_str(&serde_yaml::to_string(&op).unwrap()).unwrap();
    assert_eq!(roundtrip, op);

    let bad = "rotation:\n- [1, 1, 0]\n- [1, 1, 0]\n- [0, 0, 1]\n";
    assert!(serde_yaml::from_str::<SpaceGroupOperation>(bad).is_err());
}
