//! One- and two-dimensional piecewise-cubic interpolation.
//!
//! All interpolants extrapolate with their end polynomials; nothing here
//! rejects an out-of-range query.

pub mod akima;
pub mod bicubic;
pub mod pchip;
pub mod spline;

pub use akima::akima;
pub use bicubic::{Bicubic, Sample2};
pub use pchip::pchip;
pub use spline::NotAKnot;

use crate::error::{MdoError, Result};

/// Value and first two derivatives at a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub d1: f64,
    pub d2: f64,
}

/// Piecewise cubic in local coordinates: on `[x_i, x_{i+1}]`,
/// `p(x) = c0 + c1 s + c2 s² + c3 s³` with `s = x − x_i`.
#[derive(Debug, Clone)]
pub struct PiecewiseCubic {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
}

impl PiecewiseCubic {
    /// Cubic Hermite interpolant through `(x, y)` with node slopes `slopes`.
    pub fn hermite(x: &[f64], y: &[f64], slopes: &[f64]) -> Result<Self> {
        check_grid(x, y)?;
        if slopes.len() != x.len() {
            return Err(MdoError::TableShape { expected: x.len(), found: slopes.len() });
        }
        Ok(Self::from_slopes(x, y, slopes))
    }

    /// Same as [`hermite`](Self::hermite) for a grid already known to be valid.
    pub(crate) fn from_slopes(x: &[f64], y: &[f64], slopes: &[f64]) -> Self {
        let coeffs = x
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let h = w[1] - w[0];
                let m = (y[i + 1] - y[i]) / h;
                let (t0, t1) = (slopes[i], slopes[i + 1]);
                [y[i], t0, (3.0 * m - 2.0 * t0 - t1) / h, (t0 + t1 - 2.0 * m) / (h * h)]
            })
            .collect();
        PiecewiseCubic { x: x.to_vec(), coeffs }
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    /// Interval index used for `xq`; end intervals cover everything outside.
    fn interval(&self, xq: f64) -> usize {
        let last = self.coeffs.len() - 1;
        self.x.partition_point(|&xi| xi <= xq).saturating_sub(1).min(last)
    }

    pub fn eval(&self, xq: f64) -> f64 {
        let i = self.interval(xq);
        let s = xq - self.x[i];
        let [c0, c1, c2, c3] = self.coeffs[i];
        c0 + s * (c1 + s * (c2 + s * c3))
    }

    pub fn sample(&self, xq: f64) -> Sample {
        let i = self.interval(xq);
        let s = xq - self.x[i];
        let [c0, c1, c2, c3] = self.coeffs[i];
        Sample {
            value: c0 + s * (c1 + s * (c2 + s * c3)),
            d1: c1 + s * (2.0 * c2 + 3.0 * s * c3),
            d2: 2.0 * c2 + 6.0 * s * c3,
        }
    }
}

/// Interval slopes `(y_{i+1} − y_i)/(x_{i+1} − x_i)`.
pub(crate) fn secants(x: &[f64], y: &[f64]) -> Vec<f64> {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| (yw[1] - yw[0]) / (xw[1] - xw[0]))
        .collect()
}

pub(crate) fn check_grid(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(MdoError::TableShape { expected: x.len(), found: y.len() });
    }
    if x.len() < 2 {
        return Err(MdoError::TableShape { expected: 2, found: x.len() });
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(MdoError::InvalidConfig("interpolation grid must be strictly increasing".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hermite_reproduces_cubic() {
        // y = x³ with exact slopes 3x²
        let x = [0.0, 1.0, 2.5, 4.0];
        let y: Vec<f64> = x.iter().map(|v| v * v * v).collect();
        let d: Vec<f64> = x.iter().map(|v| 3.0 * v * v).collect();
        let p = PiecewiseCubic::hermite(&x, &y, &d).unwrap();
        let s = p.sample(1.7);
        assert_relative_eq!(s.value, 1.7f64.powi(3), epsilon = 1e-12);
        assert_relative_eq!(s.d1, 3.0 * 1.7 * 1.7, epsilon = 1e-12);
        assert_relative_eq!(s.d2, 6.0 * 1.7, epsilon = 1e-12);
    }

    #[test]
    fn extrapolates_with_end_pieces() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        let p = PiecewiseCubic::hermite(&x, &y, &[1.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(p.eval(-3.0), -3.0, epsilon = 1e-12);
        assert_relative_eq!(p.eval(5.0), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_unsorted_grid() {
        assert!(check_grid(&[0.0, 2.0, 1.0], &[0.0, 1.0, 2.0]).is_err());
        assert!(check_grid(&[0.0, 1.0], &[0.0]).is_err());
    }
}
