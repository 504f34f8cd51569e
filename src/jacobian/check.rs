use crate::error::Result;

use super::{at, Component, Shape, Values};

/// Worst mismatch between the analytic partial and a central difference for
/// one `(output, input)` pair.
#[derive(Debug, Clone)]
pub struct PartialCheck {
    pub of: &'static str,
    pub wrt: &'static str,
    pub declared: bool,
    pub node: usize,
    pub analytic: f64,
    pub numeric: f64,
    /// Mismatch left after removing the difference quotient's round-off,
    /// `(|analytic - numeric| - noise)⁺ / max(1, |analytic|, |numeric|)`
    /// with `noise = ε·max(|y+|, |y-|) / h`.
    pub error: f64,
}

impl PartialCheck {
    pub fn passes(&self, tol: f64) -> bool {
        self.error <= tol
    }
}

/// Compare every analytic partial of `component` with central differences.
///
/// Nodal inputs are perturbed at all nodes at once, which is valid because
/// component Jacobians are node-diagonal. Pairs that are neither declared nor
/// numerically non-zero are left out of the report.
pub fn check_partials(
    component: &dyn Component,
    inputs: &Values,
    rel_step: f64,
) -> Result<Vec<PartialCheck>> {
    let n = component.num_nodes();
    let name = component.name().to_string();

    let mut partials = component.new_partials();
    component.compute_partials(inputs, &mut partials)?;

    let outputs = component.outputs();
    let mut report = Vec::new();

    for input in component.inputs() {
        let base = inputs.require(&name, input.name)?.to_vec();
        let steps: Vec<f64> = base.iter().map(|x| rel_step * x.abs().max(1.0)).collect();

        let shifted = |sign: f64| -> Values {
            let mut v = inputs.clone();
            let moved = base.iter().zip(&steps).map(|(x, h)| x + sign * h).collect();
            v.set(input.name, moved);
            v
        };
        let up = component.compute(&shifted(1.0))?;
        let down = component.compute(&shifted(-1.0))?;

        for output in &outputs {
            if output.shape == Shape::Scalar && input.shape == Shape::Nodal {
                continue;
            }
            let yp = up.require(&name, output.name)?;
            let ym = down.require(&name, output.name)?;
            let declared = partials.is_declared(output.name, input.name);

            let mut worst: Option<PartialCheck> = None;
            for node in 0..output.len(n) {
                let h = at(&steps, node);
                let numeric = (yp[node] - ym[node]) / (2.0 * h);
                let analytic = partials.get(output.name, input.name, node);
                let noise = f64::EPSILON * yp[node].abs().max(ym[node].abs()) / h;
                let scale = numeric.abs().max(analytic.abs()).max(1.0);
                let error = ((analytic - numeric).abs() - noise).max(0.0) / scale;
                let error = if error.is_nan() { f64::INFINITY } else { error };
                if worst.as_ref().map_or(true, |w| error > w.error) {
                    worst = Some(PartialCheck {
                        of: output.name,
                        wrt: input.name,
                        declared,
                        node,
                        analytic,
                        numeric,
                        error,
                    });
                }
            }

            if let Some(w) = worst {
                if declared || w.numeric.abs() > 1e-12 {
                    report.push(w);
                }
            }
        }
    }

    Ok(report)
}

/// Largest error in a report, with the offending pair.
pub fn worst(report: &[PartialCheck]) -> Option<&PartialCheck> {
    report.iter().max_by(|a, b| a.error.total_cmp(&b.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::{Partials, Pattern, PortSpec, SparsityTemplate};

    struct Square {
        n: usize,
        wrong: bool,
    }

    impl Component for Square {
        fn name(&self) -> &str {
            "square"
        }
        fn num_nodes(&self) -> usize {
            self.n
        }
        fn inputs(&self) -> Vec<PortSpec> {
            vec![PortSpec::nodal("x", ""), PortSpec::scalar("k", "")]
        }
        fn outputs(&self) -> Vec<PortSpec> {
            vec![PortSpec::nodal("y", "")]
        }
        fn declare_partials(&self) -> SparsityTemplate {
            SparsityTemplate::new()
                .declare("y", "x", Pattern::Diagonal)
                .declare("y", "k", Pattern::Column)
        }
        fn compute(&self, inputs: &Values) -> Result<Values> {
            let x = inputs.require("square", "x")?;
            let k = inputs.scalar("square", "k")?;
            Ok(Values::new().with("y", x.iter().map(|x| k * x * x).collect()))
        }
        fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
            let x = inputs.require("square", "x")?;
            let k = inputs.scalar("square", "k")?;
            for (i, &xi) in x.iter().enumerate() {
                let factor = if self.wrong { 3.0 } else { 2.0 };
                p.set("y", "x", i, factor * k * xi);
                p.set("y", "k", i, xi * xi);
            }
            Ok(())
        }
    }

    fn inputs() -> Values {
        Values::new().with("x", vec![1.0, -2.0, 3.5]).with_scalar("k", 0.7)
    }

    #[test]
    fn correct_partials_pass() {
        let report = check_partials(&Square { n: 3, wrong: false }, &inputs(), 1e-6).unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|c| c.passes(1e-6)), "{:?}", report);
    }

    struct Offset;

    impl Component for Offset {
        fn name(&self) -> &str {
            "offset"
        }
        fn num_nodes(&self) -> usize {
            1
        }
        fn inputs(&self) -> Vec<PortSpec> {
            vec![PortSpec::nodal("a", "")]
        }
        fn outputs(&self) -> Vec<PortSpec> {
            vec![PortSpec::nodal("y", "")]
        }
        fn declare_partials(&self) -> SparsityTemplate {
            SparsityTemplate::new().declare("y", "a", Pattern::Diagonal)
        }
        fn compute(&self, inputs: &Values) -> Result<Values> {
            let a = inputs.require("offset", "a")?;
            Ok(Values::new().with("y", a.iter().map(|a| 1e6 - 3e-3 * a).collect()))
        }
        fn compute_partials(&self, _inputs: &Values, p: &mut Partials) -> Result<()> {
            p.set("y", "a", 0, -3e-3);
            Ok(())
        }
    }

    #[test]
    fn small_partial_of_large_output_is_not_round_off() {
        // thrust-like output: a 1e6 offset swamps the 1e-7 step in the quotient
        let inputs = Values::new().with("a", vec![0.8]);
        let report = check_partials(&Offset, &inputs, 1e-7).unwrap();
        let c = &report[0];
        assert!((c.analytic - c.numeric).abs() > 1e-6, "{:?}", c);
        assert!(c.passes(1e-5), "{:?}", c);
    }

    #[test]
    fn wrong_partials_are_caught() {
        let report = check_partials(&Square { n: 3, wrong: true }, &inputs(), 1e-6).unwrap();
        let w = worst(&report).unwrap();
        assert_eq!((w.of, w.wrt), ("y", "x"));
        assert!(!w.passes(1e-3));
    }
}
