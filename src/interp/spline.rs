use nalgebra::{DMatrix, DVector};

use super::{check_grid, secants, PiecewiseCubic};
use crate::error::{MdoError, Result};

/// Not-a-knot cubic spline on a fixed grid.
///
/// The slope system depends only on the abscissae, so it is factorized once
/// and reused for every data column fitted on the same grid.
#[derive(Debug, Clone)]
pub struct NotAKnot {
    x: Vec<f64>,
    lu: nalgebra::LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
}

impl NotAKnot {
    pub fn new(x: &[f64]) -> Result<Self> {
        let n = x.len();
        if n < 4 {
            return Err(MdoError::TableShape { expected: 4, found: n });
        }
        check_grid(x, x)?;
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

        let mut a = DMatrix::zeros(n, n);
        a[(0, 0)] = h[1];
        a[(0, 1)] = h[0] + h[1];
        for i in 1..n - 1 {
            a[(i, i - 1)] = h[i];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i - 1];
        }
        a[(n - 1, n - 2)] = h[n - 3] + h[n - 2];
        a[(n - 1, n - 1)] = h[n - 3];

        Ok(NotAKnot { x: x.to_vec(), lu: a.lu() })
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    /// Node slopes of the spline through `y`.
    fn slopes(&self, y: &[f64]) -> Result<Vec<f64>> {
        let x = &self.x;
        let n = x.len();
        if y.len() != n {
            return Err(MdoError::TableShape { expected: n, found: y.len() });
        }
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let m = secants(x, y);

        let mut b = DVector::zeros(n);
        let d0 = h[0] + h[1];
        b[0] = ((h[0] + 2.0 * d0) * h[1] * m[0] + h[0] * h[0] * m[1]) / d0;
        for i in 1..n - 1 {
            b[i] = 3.0 * (h[i] * m[i - 1] + h[i - 1] * m[i]);
        }
        let dn = h[n - 3] + h[n - 2];
        b[n - 1] = (h[n - 2] * h[n - 2] * m[n - 3] + (2.0 * dn + h[n - 2]) * h[n - 3] * m[n - 2]) / dn;

        let s = self
            .lu
            .solve(&b)
            .ok_or_else(|| MdoError::InvalidConfig("singular spline system".into()))?;
        Ok(s.iter().copied().collect())
    }

    pub fn fit(&self, y: &[f64]) -> Result<PiecewiseCubic> {
        let slopes = self.slopes(y)?;
        PiecewiseCubic::hermite(&self.x, y, &slopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reproduces_cubic_exactly() {
        let x = [0.0, 0.5, 1.5, 2.0, 3.5, 4.0];
        let f = |v: f64| 1.0 - 2.0 * v + 0.5 * v * v - 0.3 * v * v * v;
        let y: Vec<f64> = x.iter().map(|&v| f(v)).collect();
        let s = NotAKnot::new(&x).unwrap().fit(&y).unwrap();
        for q in [0.2, 1.1, 2.7, 3.9, 4.6, -0.4] {
            assert_relative_eq!(s.eval(q), f(q), epsilon = 1e-10);
        }
        let d = s.sample(2.7);
        assert_relative_eq!(d.d1, -2.0 + 2.7 - 0.9 * 2.7 * 2.7, epsilon = 1e-10);
    }

    #[test]
    fn too_few_points() {
        assert!(NotAKnot::new(&[0.0, 1.0, 2.0]).is_err());
    }
}
