//! Representation matrices of Cartesian monomials under orthogonal transformations.

use std::collections::HashMap;

use nalgebra::Matrix3;
use ndarray::Array2;

use crate::basis::ao::CartOrder;

#[cfg(test)]
#[path = "cart_rotation_3d_tests.rs"]
mod cart_rotation_3d_tests;

type Monomial = (u32, u32, u32);

/// Multiplies a homogeneous polynomial by the linear form $`\sum_i c_i x_i`$.
fn multiply_linear(poly: &HashMap<Monomial, f64>, coeffs: [f64; 3]) -> HashMap<Monomial, f64> {
    let mut product = HashMap::with_capacity(poly.len() * 3);
    for (&(lx, ly, lz), &value) in poly {
        for (i, c) in coeffs.iter().enumerate() {
            if *c == 0.0 {
                continue;
            }
            let key = match i {
                0 => (lx + 1, ly, lz),
                1 => (lx, ly + 1, lz),
                _ => (lx, ly, lz + 1),
            };
            *product.entry(key).or_insert(0.0) += value * c;
        }
    }
    product
}

/// Computes the representation matrix of an orthogonal transformation in a Cartesian shell.
///
/// With $`\hat{W} x_j = \sum_i x_i W_{ij}`$, a monomial transforms as
/// ```math
/// \hat{W}\, x^{a} y^{b} z^{c}
///     = \Big(\sum_i W_{i0} x_i\Big)^{a} \Big(\sum_i W_{i1} x_i\Big)^{b}
///       \Big(\sum_i W_{i2} x_i\Big)^{c},
/// ```
/// and column $`\nu`$ of the returned matrix holds the expansion of the transformed $`\nu`$th
/// component over the components of the shell, in the order of `cart_order`.
///
/// # Arguments
///
/// * `cart_order` - The Cartesian shell and its component order.
/// * `wmat` - The Cartesian matrix of the transformation acting on positions.
pub fn cart_shell_matrix(cart_order: &CartOrder, wmat: &Matrix3<f64>) -> Array2<f64> {
    let index: HashMap<Monomial, usize> = cart_order
        .iter()
        .enumerate()
        .map(|(i, tuple)| (*tuple, i))
        .collect();
    let n = cart_order.ncomps();
    let mut tmat = Array2::<f64>::zeros((n, n));
    for (col, &(a, b, c)) in cart_order.iter().enumerate() {
        let mut poly = HashMap::from([((0, 0, 0), 1.0)]);
        for (axis, power) in [a, b, c].into_iter().enumerate() {
            let coeffs = [wmat[(0, axis)], wmat[(1, axis)], wmat[(2, axis)]];
            for _ in 0..power {
                poly = multiply_linear(&poly, coeffs);
            }
        }
        for (monomial, value) in poly {
            if let Some(&row) = index.get(&monomial) {
                tmat[(row, col)] += value;
            }
        }
    }
    tmat
}
