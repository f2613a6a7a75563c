use approx;
use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use ndarray::Array2;

use crate::angmom::cart_rotation_3d::cart_shell_matrix;
use crate::basis::ao::CartOrder;

fn rotation(angle: f64, axis: Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle).into_inner()
}

#[test]
fn test_cart_rotation_3d_p_shell() {
    let w = rotation(0.9, Vector3::new(1.0, 1.0, -0.5));
    let tmat = cart_shell_matrix(&CartOrder::lex(1), &w);
    for i in 0..3 {
        for j in 0..3 {
            approx::assert_relative_eq!(tmat[(i, j)], w[(i, j)], epsilon = 1e-14);
        }
    }
}

#[test]
fn test_cart_rotation_3d_d_shell_c4z() {
    // C4 about z: x -> y, y -> -x.
    let w = rotation(std::f64::consts::FRAC_PI_2, Vector3::z());
    let order = CartOrder::lex(2);
    let tmat = cart_shell_matrix(&order, &w);
    // xx -> yy
    approx::assert_relative_eq!(tmat[(3, 0)], 1.0, epsilon = 1e-14);
    // xy -> -yx
    approx::assert_relative_eq!(tmat[(1, 1)], -1.0, epsilon = 1e-14);
    // xz -> yz
    approx::assert_relative_eq!(tmat[(4, 2)], 1.0, epsilon = 1e-14);
    // zz -> zz
    approx::assert_relative_eq!(tmat[(5, 5)], 1.0, epsilon = 1e-14);
    approx::assert_relative_eq!(tmat.map(|x| x.abs()).sum(), 6.0, epsilon = 1e-12);
}

#[test]
fn test_cart_rotation_3d_homomorphism() {
    let w1 = rotation(0.4, Vector3::new(0.2, -1.0, 0.3));
    let w2 = -rotation(2.1, Vector3::new(1.0, 0.0, 0.7));
    let order = CartOrder::lex(3);
    let t12 = cart_shell_matrix(&order, &(w1 * w2));
    let t1t2 = cart_shell_matrix(&order, &w1).dot(&cart_shell_matrix(&order, &w2));
    let diff: Array2<f64> = t12 - t1t2;
    approx::assert_relative_eq!(diff.map(|x| x.abs()).sum(), 0.0, epsilon = 1e-12);
}
