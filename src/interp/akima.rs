use super::{check_grid, secants, PiecewiseCubic};
use crate::error::Result;

/// Akima spline through `(x, y)`.
///
/// Node slopes are the weighted average of neighbouring secants with weights
/// `|m_{i+1} − m_i|` and `|m_{i−1} − m_{i−2}|`; two ghost secants are
/// extrapolated linearly at each end. Where both weights vanish the slope
/// falls back to the mean of the outer secants.
pub fn akima(x: &[f64], y: &[f64]) -> Result<PiecewiseCubic> {
    check_grid(x, y)?;
    Ok(akima_sorted(x, y))
}

/// [`akima`] on a grid the caller guarantees to be valid.
pub(crate) fn akima_sorted(x: &[f64], y: &[f64]) -> PiecewiseCubic {
    let n = x.len();
    let m = secants(x, y);
    if n == 2 {
        return PiecewiseCubic::from_slopes(x, y, &[m[0], m[0]]);
    }

    // ext[k] holds secant k - 2
    let mut ext = vec![0.0; n + 3];
    ext[2..n + 1].copy_from_slice(&m);
    ext[1] = 2.0 * ext[2] - ext[3];
    ext[0] = 2.0 * ext[1] - ext[2];
    ext[n + 1] = 2.0 * ext[n] - ext[n - 1];
    ext[n + 2] = 2.0 * ext[n + 1] - ext[n];

    let dm: Vec<f64> = ext.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let weights: Vec<f64> = (0..n).map(|i| dm[i + 2] + dm[i]).collect();
    let scale = weights.iter().cloned().fold(0.0, f64::max);

    let slopes: Vec<f64> = (0..n)
        .map(|i| {
            let (f1, f2) = (dm[i + 2], dm[i]);
            let f12 = f1 + f2;
            if f12 > 1e-9 * scale {
                (f1 * ext[i + 1] + f2 * ext[i + 2]) / f12
            } else {
                0.5 * (ext[i + 3] + ext[i])
            }
        })
        .collect();

    PiecewiseCubic::from_slopes(x, y, &slopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn passes_through_nodes() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.5, 6.0];
        let y = [1.0, 0.5, 0.7, 2.0, 2.1, 0.0];
        let p = akima(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert_relative_eq!(p.eval(*xi), *yi, epsilon = 1e-12);
        }
    }

    #[test]
    fn linear_data_stays_linear() {
        let x: Vec<f64> = (0..8).map(|i| i as f64 * 1.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 - 2.0 * v).collect();
        let p = akima(&x, &y).unwrap();
        let s = p.sample(4.2);
        assert_relative_eq!(s.value, 3.0 - 8.4, epsilon = 1e-12);
        assert_relative_eq!(s.d1, -2.0, epsilon = 1e-12);
        assert!(s.d2.abs() < 1e-12);
        assert_relative_eq!(p.eval(20.0), 3.0 - 40.0, epsilon = 1e-9);
    }

    #[test]
    fn flat_step_does_not_overshoot() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let p = akima(&x, &y).unwrap();
        for k in 0..50 {
            let v = p.eval(k as f64 * 0.1);
            assert!((-1e-12..=1.0 + 1e-12).contains(&v), "overshoot {} at {}", v, k);
        }
    }
}
