use crate::dynamics::state::{Deriv, Earth, State};
use crate::error::Result;
use crate::jacobian::{at, Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

// ---------------------------------------------------------------------------
// Planar point-mass dynamics over a rotating spherical Earth
// ---------------------------------------------------------------------------

/// Forces and pitch acting on the vehicle at one instant.
#[derive(Debug, Clone, Copy)]
pub struct Loads {
    pub thrust: f64, // N
    pub mfr: f64,    // kg/s
    pub theta: f64,  // rad, pitch from local horizontal
    pub drag: f64,   // N
    pub g: f64,      // m/s^2
}

/// State rates and axial load factor. Lift is zero for this vehicle.
pub fn rates(earth: &Earth, s: &State, l: &Loads) -> (Deriv, f64) {
    let w = earth.omega;
    let (sin_phi, cos_phi) = s.phi.sin_cos();
    let (sin_tp, cos_tp) = (l.theta - s.phi).sin_cos();
    let centrifugal = w * w * s.r - l.g;

    let d = Deriv {
        r_dot: s.v * sin_phi,
        lambda_dot: s.v * cos_phi / s.r,
        v_dot: (l.thrust * cos_tp - l.drag) / s.m + centrifugal * sin_phi,
        phi_dot: l.thrust * sin_tp / (s.m * s.v)
            + centrifugal * cos_phi / s.v
            + 2.0 * w
            + s.v * cos_phi / s.r,
        m_dot: -l.mfr,
    };
    let n_f = (l.thrust - l.drag * cos_tp) / (s.m * earth.g0);
    (d, n_f)
}

#[derive(Debug, Clone)]
pub struct Eom {
    pub num_nodes: usize,
    pub earth: Earth,
}

const OUTPUTS: [&str; 6] = ["r_dot", "lambda_dot", "v_dot", "phi_dot", "m_dot", "n_f"];

impl Eom {
    fn node(inputs: &Values, i: usize) -> Result<(State, Loads)> {
        let get = |name: &str| inputs.require("eom", name).map(|v| at(v, i));
        let state = State { r: get("r")?, lambda: 0.0, v: get("v")?, phi: get("phi")?, m: get("m")? };
        let loads = Loads {
            thrust: get("thrust")?,
            mfr: get("mfr")?,
            theta: get("theta")?,
            drag: get("Drag")?,
            g: get("g")?,
        };
        Ok((state, loads))
    }
}

impl Component for Eom {
    fn name(&self) -> &str {
        "eom"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::nodal("r", "m"),
            PortSpec::nodal("v", "m/s"),
            PortSpec::nodal("phi", "rad"),
            PortSpec::nodal("m", "kg"),
            PortSpec::nodal("thrust", "N"),
            PortSpec::nodal("mfr", "kg/s"),
            PortSpec::nodal("theta", "rad"),
            PortSpec::nodal("g", "m/s**2"),
            PortSpec::nodal("Drag", "N"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::nodal("r_dot", "m/s"),
            PortSpec::nodal("lambda_dot", "rad/s"),
            PortSpec::nodal("v_dot", "m/s**2"),
            PortSpec::nodal("phi_dot", "rad/s"),
            PortSpec::nodal("m_dot", "kg/s"),
            PortSpec::nodal("n_f", ""),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("r_dot", &["v", "phi"], Pattern::Diagonal)
            .declare_all("lambda_dot", &["r", "v", "phi"], Pattern::Diagonal)
            .declare_all(
                "v_dot",
                &["r", "phi", "m", "thrust", "theta", "g", "Drag"],
                Pattern::Diagonal,
            )
            .declare_all(
                "phi_dot",
                &["r", "v", "phi", "m", "thrust", "theta", "g"],
                Pattern::Diagonal,
            )
            .declare_fixed("m_dot", "mfr", Pattern::Diagonal, -1.0)
            .declare_all("n_f", &["phi", "m", "thrust", "theta", "Drag"], Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let mut cols: Vec<Vec<f64>> = vec![Vec::with_capacity(self.num_nodes); OUTPUTS.len()];
        for i in 0..self.num_nodes {
            let (s, l) = Self::node(inputs, i)?;
            let (d, n_f) = rates(&self.earth, &s, &l);
            let row = [d.r_dot, d.lambda_dot, d.v_dot, d.phi_dot, d.m_dot, n_f];
            for (col, x) in cols.iter_mut().zip(row) {
                col.push(x);
            }
        }
        Ok(OUTPUTS
            .iter()
            .zip(cols)
            .fold(Values::new(), |acc, (name, col)| acc.with(name, col)))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let w = self.earth.omega;
        let g0 = self.earth.g0;
        for i in 0..self.num_nodes {
            let (s, l) = Self::node(inputs, i)?;
            let (r, v, m, t, dr) = (s.r, s.v, s.m, l.thrust, l.drag);
            let (sin_phi, cos_phi) = s.phi.sin_cos();
            let (sin_tp, cos_tp) = (l.theta - s.phi).sin_cos();
            let centrifugal = w * w * r - l.g;

            p.set("r_dot", "v", i, sin_phi);
            p.set("r_dot", "phi", i, v * cos_phi);

            p.set("lambda_dot", "r", i, -v * cos_phi / (r * r));
            p.set("lambda_dot", "v", i, cos_phi / r);
            p.set("lambda_dot", "phi", i, -v * sin_phi / r);

            p.set("v_dot", "r", i, w * w * sin_phi);
            p.set("v_dot", "phi", i, t * sin_tp / m + centrifugal * cos_phi);
            p.set("v_dot", "m", i, -(t * cos_tp - dr) / (m * m));
            p.set("v_dot", "thrust", i, cos_tp / m);
            p.set("v_dot", "theta", i, -t * sin_tp / m);
            p.set("v_dot", "g", i, -sin_phi);
            p.set("v_dot", "Drag", i, -1.0 / m);

            p.set("phi_dot", "r", i, w * w * cos_phi / v - v * cos_phi / (r * r));
            p.set(
                "phi_dot",
                "v",
                i,
                -t * sin_tp / (m * v * v) - centrifugal * cos_phi / (v * v) + cos_phi / r,
            );
            p.set(
                "phi_dot",
                "phi",
                i,
                -t * cos_tp / (m * v) - centrifugal * sin_phi / v - v * sin_phi / r,
            );
            p.set("phi_dot", "m", i, -t * sin_tp / (m * m * v));
            p.set("phi_dot", "thrust", i, sin_tp / (m * v));
            p.set("phi_dot", "theta", i, t * cos_tp / (m * v));
            p.set("phi_dot", "g", i, -cos_phi / v);

            p.set("n_f", "thrust", i, 1.0 / (m * g0));
            p.set("n_f", "Drag", i, -cos_tp / (m * g0));
            p.set("n_f", "theta", i, dr * sin_tp / (m * g0));
            p.set("n_f", "phi", i, -dr * sin_tp / (m * g0));
            p.set("n_f", "m", i, -(t - dr * cos_tp) / (m * m * g0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;
    use approx::assert_relative_eq;

    fn sample_inputs() -> Values {
        Values::new()
            .with("r", vec![6_378_500.0, 6_410_000.0, 6_500_000.0])
            .with("v", vec![40.0, 900.0, 3_100.0])
            .with("phi", vec![1.55, 0.9, 0.3])
            .with("m", vec![360_000.0, 250_000.0, 80_000.0])
            .with("thrust", vec![7.6e6, 7.9e6, 9.0e5])
            .with("mfr", vec![2_490.0, 2_490.0, 271.0])
            .with("theta", vec![1.5708, 0.85, 0.25])
            .with("g", vec![9.79, 9.70, 9.43])
            .with("Drag", vec![1_000.0, 4.0e5, 2.0e3])
    }

    #[test]
    fn rates_reproduce_closed_form() {
        let earth = Earth::default();
        let s = State { r: 6.5e6, lambda: 0.2, v: 2_000.0, phi: 0.4, m: 1.0e5 };
        let l = Loads { thrust: 1.0e6, mfr: 300.0, theta: 0.5, drag: 5.0e3, g: 9.4 };
        let (d, n_f) = rates(&earth, &s, &l);
        let w = earth.omega;
        let c = w * w * s.r - l.g;
        assert_relative_eq!(d.r_dot, 2_000.0 * 0.4f64.sin(), max_relative = 1e-14);
        assert_relative_eq!(d.lambda_dot, 2_000.0 * 0.4f64.cos() / 6.5e6, max_relative = 1e-14);
        assert_relative_eq!(
            d.v_dot,
            (1.0e6 * 0.1f64.cos() - 5.0e3) / 1.0e5 + c * 0.4f64.sin(),
            max_relative = 1e-14
        );
        assert_relative_eq!(
            d.phi_dot,
            1.0e6 * 0.1f64.sin() / (1.0e5 * 2_000.0)
                + c * 0.4f64.cos() / 2_000.0
                + 2.0 * w
                + 2_000.0 * 0.4f64.cos() / 6.5e6,
            max_relative = 1e-12
        );
        assert_eq!(d.m_dot, -300.0);
        assert_relative_eq!(
            n_f,
            (1.0e6 - 5.0e3 * 0.1f64.cos()) / (1.0e5 * earth.g0),
            max_relative = 1e-14
        );
    }

    #[test]
    fn component_matches_rates() {
        let comp = Eom { num_nodes: 3, earth: Earth::default() };
        let out = comp.compute(&sample_inputs()).unwrap();
        assert_eq!(out.get("m_dot").unwrap(), &[-2_490.0, -2_490.0, -271.0]);
        assert!(out.get("n_f").unwrap().iter().all(|n| *n > 0.0));
    }

    #[test]
    fn eom_partials_match_finite_differences() {
        let comp = Eom { num_nodes: 3, earth: Earth::default() };
        let report = check_partials(&comp, &sample_inputs(), 1e-7).unwrap();
        assert!(report.iter().all(|c| c.declared), "undeclared dependency: {:?}", report);
        for c in &report {
            assert!(c.passes(1e-6), "{:?}", c);
        }
    }
}
