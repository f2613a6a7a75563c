//! Representation matrices of real solid harmonics under orthogonal transformations.
//!
//! The recursion follows Ivanic, J. & Ruedenberg, K. Rotation Matrices for Real Spherical
//! Harmonics. Direct Determination by Recursion. *The Journal of Physical Chemistry* **100**,
//! 6342–6347 (1996), [DOI](https://doi.org/10.1021/jp953350u), with the corrections published in
//! *The Journal of Physical Chemistry A* **102**, 9099–9100 (1998).

use std::cmp::Ordering;

use approx;
use nalgebra::Matrix3;
use ndarray::{Array2, ArrayView2};
use num_traits::ToPrimitive;

#[cfg(test)]
#[path = "sh_rotation_3d_tests.rs"]
mod sh_rotation_3d_tests;

/// Returns the Kronecker delta $`\delta_{ij}`$ as a floating-point number.
fn kdelta(i: i64, j: i64) -> f64 {
    if i == j {
        1.0
    } else {
        0.0
    }
}

/// Converts a small integer to `f64`.
fn to_f64(x: i64) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}

// ==================
// Struct definitions
// ==================

/// Structure holding the two matrices that feed one step of the recursion from
/// $`\mathbf{R}^{l-1}`$ to $`\mathbf{R}^{l}`$.
struct RecursionStep<'a> {
    /// The rank $`l \ge 2`$ being constructed.
    l: i64,

    /// The representation matrix in the basis of the coordinate functions $`(y, z, x)`$, which
    /// are isosymmetric to $`(Y_{1, -1}, Y_{1, 0}, Y_{1, 1})`$.
    r1: ArrayView2<'a, f64>,

    /// The representation matrix in the basis of $`Y_{l-1, m}`$ in increasing-$`m`$ order.
    rlm1: ArrayView2<'a, f64>,
}

impl<'a> RecursionStep<'a> {
    /// The function $`_iP^l_{\mu m'}`$ of Table 2.
    fn p(&self, i: i64, mu: i64, mdash: i64) -> f64 {
        let l = self.l;
        debug_assert!(i.abs() <= 1 && mu.abs() < l && mdash.abs() <= l);
        let ii = (i + 1) as usize;
        let mui = (mu + l - 1) as usize;
        let last = (2 * l - 2) as usize;
        if mdash == l {
            self.r1[(ii, 2)] * self.rlm1[(mui, last)] - self.r1[(ii, 0)] * self.rlm1[(mui, 0)]
        } else if mdash == -l {
            self.r1[(ii, 2)] * self.rlm1[(mui, 0)] + self.r1[(ii, 0)] * self.rlm1[(mui, last)]
        } else {
            self.r1[(ii, 1)] * self.rlm1[(mui, (mdash + l - 1) as usize)]
        }
    }

    /// The function $`U^l_{mm'}`$ of Table 2.
    fn u(&self, m: i64, mdash: i64) -> f64 {
        self.p(0, m, mdash)
    }

    /// The function $`V^l_{mm'}`$ of Table 2.
    fn v(&self, m: i64, mdash: i64) -> f64 {
        match m.cmp(&0) {
            Ordering::Greater => {
                self.p(1, m - 1, mdash) * (1.0 + kdelta(m, 1)).sqrt()
                    - self.p(-1, -m + 1, mdash) * (1.0 - kdelta(m, 1))
            }
            Ordering::Less => {
                self.p(1, m + 1, mdash) * (1.0 - kdelta(m, -1))
                    + self.p(-1, -m - 1, mdash) * (1.0 + kdelta(m, -1)).sqrt()
            }
            Ordering::Equal => self.p(1, 1, mdash) + self.p(-1, -1, mdash),
        }
    }

    /// The function $`W^l_{mm'}`$ of Table 2, defined for $`m \ne 0`$.
    fn w(&self, m: i64, mdash: i64) -> f64 {
        if m > 0 {
            self.p(1, m + 1, mdash) + self.p(-1, -m - 1, mdash)
        } else {
            self.p(1, m - 1, mdash) - self.p(-1, -m + 1, mdash)
        }
    }

    /// The denominator shared by the coefficients $`u`$, $`v`$ and $`w`$ of Table 1.
    fn denominator(&self, mdash: i64) -> f64 {
        let l = self.l;
        if mdash.abs() < l {
            to_f64((l + mdash) * (l - mdash))
        } else {
            to_f64((2 * l) * (2 * l - 1))
        }
    }

    /// The coefficient $`u^l_{mm'}`$ of Table 1.
    fn coeff_u(&self, m: i64, mdash: i64) -> f64 {
        let l = self.l;
        (to_f64((l + m) * (l - m)) / self.denominator(mdash)).sqrt()
    }

    /// The coefficient $`v^l_{mm'}`$ of Table 1.
    fn coeff_v(&self, m: i64, mdash: i64) -> f64 {
        let l = self.l;
        let num = (1.0 + kdelta(m, 0)) * to_f64((l + m.abs() - 1) * (l + m.abs()));
        0.5 * (num / self.denominator(mdash)).sqrt() * (1.0 - 2.0 * kdelta(m, 0))
    }

    /// The coefficient $`w^l_{mm'}`$ of Table 1.
    fn coeff_w(&self, m: i64, mdash: i64) -> f64 {
        let l = self.l;
        let num = to_f64((l - m.abs() - 1) * (l - m.abs()));
        -0.5 * (num / self.denominator(mdash)).sqrt() * (1.0 - kdelta(m, 0))
    }

    /// Evaluates $`\mathbf{R}^l`$ in increasing-$`m`$ order.
    fn evaluate(&self) -> Array2<f64> {
        let l = self.l;
        let dim = (2 * l + 1) as usize;
        Array2::from_shape_fn((dim, dim), |(mi, mdashi)| {
            let m = mi as i64 - l;
            let mdash = mdashi as i64 - l;
            let nonzero = |c: f64| approx::relative_ne!(c.abs(), 0.0, epsilon = 1e-14, max_relative = 1e-14);

            let cu = self.coeff_u(m, mdash);
            let cv = self.coeff_v(m, mdash);
            let cw = self.coeff_w(m, mdash);
            let f_u = if nonzero(cu) { self.u(m, mdash) } else { 0.0 };
            let f_v = if nonzero(cv) { self.v(m, mdash) } else { 0.0 };
            let f_w = if nonzero(cw) { self.w(m, mdash) } else { 0.0 };
            cu * f_u + cv * f_v + cw * f_w
        })
    }
}

// =========
// Functions
// =========

/// Returns the representation matrix of a proper rotation in the basis of the coordinate
/// *functions* $`(y, z, x)`$.
///
/// Let $`\mathbf{W}`$ be the Cartesian matrix of a proper rotation acting on positions,
/// $`\mathbf{r} \mapsto \mathbf{W}\mathbf{r}`$. The induced operator on functions satisfies
/// $`\hat{W} x_j = \sum_i x_i W_{ij}`$, so that its representation matrix in the basis
/// $`(y, z, x)`$ is $`\mathbf{W}`$ with both axes permuted by $`(1, 2, 0)`$.
pub fn yzx_matrix(wmat: &Matrix3<f64>) -> Array2<f64> {
    let perm = [1usize, 2, 0];
    Array2::from_shape_fn((3, 3), |(i, j)| wmat[(perm[i], perm[j])])
}

/// Computes the representation matrix $`\mathbf{R}^l`$ for a proper rotation in the basis of
/// real spherical harmonics $`Y_{lm}`$ ordered by increasing $`m`$, as defined in Equation 5.8 of
/// Ivanic and Ruedenberg.
///
/// # Arguments
///
/// * `l` - The spherical harmonic order $`l \ge 2`$.
/// * `r1` - The representation matrix of the rotation in the basis $`(y, z, x)`$.
/// * `rlm1` - The representation matrix of the rotation in the basis of $`Y_{l-1, m}`$ in
///   increasing-$`m`$ order.
///
/// # Panics
///
/// Panics when `l` is less than `2` or when the shapes of `r1` and `rlm1` are inconsistent with
/// `l`.
#[must_use]
pub fn rlmat(l: u32, r1: &Array2<f64>, rlm1: &Array2<f64>) -> Array2<f64> {
    assert!(l >= 2, "`l` must be at least 2.");
    assert_eq!(r1.shape(), &[3, 3], "`r1` must be a 3 × 3 matrix.");
    let dim = 2 * l as usize - 1;
    assert_eq!(rlm1.shape(), &[dim, dim], "`rlm1` must be a {dim} × {dim} matrix.");
    RecursionStep {
        l: i64::from(l),
        r1: r1.view(),
        rlm1: rlm1.view(),
    }
    .evaluate()
}

/// Computes the representation matrices $`\mathbf{R}^0, \ldots, \mathbf{R}^{l_{\mathrm{max}}}`$
/// of an orthogonal transformation in the bases of real spherical harmonics in increasing-$`m`$
/// order.
///
/// Improper transformations are handled through
/// $`\mathbf{R}^l(\mathbf{W}) = (\det \mathbf{W})^l\, \mathbf{R}^l(\det \mathbf{W} \cdot \mathbf{W})`$,
/// since $`Y_{lm}(-\mathbf{r}) = (-1)^l Y_{lm}(\mathbf{r})`$.
///
/// # Arguments
///
/// * `lmax` - The highest order required.
/// * `wmat` - The Cartesian matrix of the transformation acting on positions.
pub fn rlmats(lmax: u32, wmat: &Matrix3<f64>) -> Vec<Array2<f64>> {
    let det = if wmat.determinant() < 0.0 { -1.0 } else { 1.0 };
    let proper = wmat * det;
    let r1 = yzx_matrix(&proper);
    let mut rls: Vec<Array2<f64>> = Vec::with_capacity(lmax as usize + 1);
    rls.push(Array2::ones((1, 1)));
    if lmax >= 1 {
        rls.push(r1.clone());
    }
    for l in 2..=lmax {
        let next = rlmat(l, &r1, &rls[l as usize - 1]);
        rls.push(next);
    }
    rls.into_iter()
        .enumerate()
        .map(|(l, rl)| if l % 2 == 1 { rl * det } else { rl })
        .collect()
}
