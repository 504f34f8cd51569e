use super::{check_grid, secants, PiecewiseCubic};
use crate::error::Result;

/// Monotone piecewise cubic (Fritsch–Carlson weighted harmonic mean slopes,
/// three-point shape-preserving end slopes).
pub fn pchip(x: &[f64], y: &[f64]) -> Result<PiecewiseCubic> {
    check_grid(x, y)?;
    Ok(pchip_sorted(x, y))
}

pub(crate) fn pchip_sorted(x: &[f64], y: &[f64]) -> PiecewiseCubic {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let m = secants(x, y);
    if n == 2 {
        return PiecewiseCubic::from_slopes(x, y, &[m[0], m[0]]);
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (m0, m1) = (m[k - 1], m[k]);
        if m0 == 0.0 || m1 == 0.0 || m0.signum() != m1.signum() {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / m0 + w2 / m1);
    }
    d[0] = end_slope(h[0], h[1], m[0], m[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], m[n - 2], m[n - 3]);

    PiecewiseCubic::from_slopes(x, y, &d)
}

fn end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn monotone_data_gives_monotone_curve() {
        let x = [0.0, 0.3, 0.7, 1.1, 1.3];
        let y = [0.42, 0.51, 0.63, 1.30, 1.65];
        let p = pchip(&x, &y).unwrap();
        let mut prev = p.eval(0.0);
        for k in 1..=130 {
            let v = p.eval(k as f64 * 0.01);
            assert!(v >= prev - 1e-12, "not monotone at {}", k);
            prev = v;
        }
    }

    #[test]
    fn local_extremum_is_flat() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.0, 0.5, 0.2];
        let p = pchip(&x, &y).unwrap();
        assert_relative_eq!(p.sample(1.0).d1, 0.0);
        assert_relative_eq!(p.eval(2.0), 0.5, epsilon = 1e-12);
    }
}
