use super::{NotAKnot, PiecewiseCubic};
use crate::error::{MdoError, Result};

/// Tensor-product not-a-knot bicubic interpolant on a rectangular grid.
///
/// Rows along `y` are fitted once at construction; each query evaluates them
/// at `yq` and fits the resulting column along `x` with the pre-factorized
/// `x` system.
#[derive(Debug, Clone)]
pub struct Bicubic {
    along_x: NotAKnot,
    rows: Vec<PiecewiseCubic>,
}

/// Value and gradient of a bicubic query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample2 {
    pub value: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Bicubic {
    /// `z` is row-major: `z[i * y.len() + j]` is the value at `(x[i], y[j])`.
    pub fn new(x: &[f64], y: &[f64], z: &[f64]) -> Result<Self> {
        let (nx, ny) = (x.len(), y.len());
        if z.len() != nx * ny {
            return Err(MdoError::TableShape { expected: nx * ny, found: z.len() });
        }
        let along_x = NotAKnot::new(x)?;
        let along_y = NotAKnot::new(y)?;
        let rows = z
            .chunks(ny)
            .map(|row| along_y.fit(row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Bicubic { along_x, rows })
    }

    pub fn sample(&self, xq: f64, yq: f64) -> Result<Sample2> {
        let (values, slopes): (Vec<f64>, Vec<f64>) = self
            .rows
            .iter()
            .map(|row| {
                let s = row.sample(yq);
                (s.value, s.d1)
            })
            .unzip();
        let column = self.along_x.fit(&values)?.sample(xq);
        let dy = self.along_x.fit(&slopes)?.eval(xq);
        Ok(Sample2 { value: column.value, dx: column.d1, dy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reproduces_bicubic_polynomial() {
        let f = |x: f64, y: f64| 1.0 + x * y - 0.2 * x * x * x + 0.1 * x * y * y * y;
        let x: Vec<f64> = (0..6).map(|i| 1.6 + 0.2 * i as f64).collect();
        let y: Vec<f64> = (0..5).map(|j| 60.0 + 10.0 * j as f64).collect();
        let z: Vec<f64> = x.iter().flat_map(|&xi| y.iter().map(move |&yj| f(xi, yj))).collect();
        let b = Bicubic::new(&x, &y, &z).unwrap();

        let (xq, yq) = (2.05, 83.0);
        let s = b.sample(xq, yq).unwrap();
        assert_relative_eq!(s.value, f(xq, yq), max_relative = 1e-9);
        assert_relative_eq!(s.dx, yq - 0.6 * xq * xq + 0.1 * yq * yq * yq, max_relative = 1e-8);
        assert_relative_eq!(s.dy, xq + 0.3 * xq * yq * yq, max_relative = 1e-8);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let x = [0.0, 1.0, 2.0, 3.0];
        assert!(Bicubic::new(&x, &x, &[0.0; 15]).is_err());
    }
}
