use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::error::Result;
use crate::interp::{pchip::pchip_sorted, PiecewiseCubic};
use crate::jacobian::{at, Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

// ---------------------------------------------------------------------------
// Drag coefficient table (zero-lift, slender launcher)
// ---------------------------------------------------------------------------

const MACH: [f64; 20] = [
    0.0, 0.3, 0.7, 1.1, 1.3, 1.5, 1.8, 2.1, 2.7, 3.0, 4.0, 5.0, 7.0, 8.5, 10.0, 11.0, 12.0, 13.0,
    14.0, 15.0,
];

const CD: [f64; 20] = [
    0.42, 0.51, 0.63, 1.30, 1.65, 1.38, 1.22, 1.15, 0.95, 0.90, 0.70, 0.60, 0.58, 0.58, 0.59,
    0.59, 0.59, 0.59, 0.59, 0.59,
];

/// Monotone interpolant of the drag curve, shared by every phase.
pub fn cd_curve() -> &'static PiecewiseCubic {
    static CURVE: OnceLock<PiecewiseCubic> = OnceLock::new();
    CURVE.get_or_init(|| pchip_sorted(&MACH, &CD))
}

/// `(Cd, dCd/dMach)`, extrapolated outside the tabulated Mach range.
pub fn drag_coefficient(mach: f64) -> (f64, f64) {
    let s = cd_curve().sample(mach);
    (s.value, s.d1)
}

/// Aerodynamic reference area for a body of diameter `d`.
pub fn reference_area(d: f64) -> f64 {
    PI / 4.0 * d * d
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MachNumber {
    pub num_nodes: usize,
}

impl Component for MachNumber {
    fn name(&self) -> &str {
        "mach_number"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("v", "m/s"), PortSpec::nodal("sos", "m/s")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("Mach", "")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("Mach", &["v", "sos"], Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let v = inputs.require(self.name(), "v")?;
        let sos = inputs.require(self.name(), "sos")?;
        let mach = (0..self.num_nodes).map(|i| at(v, i) / at(sos, i)).collect();
        Ok(Values::new().with("Mach", mach))
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let v = inputs.require(self.name(), "v")?;
        let sos = inputs.require(self.name(), "sos")?;
        for i in 0..self.num_nodes {
            let (v, a) = (at(v, i), at(sos, i));
            partials.set("Mach", "v", i, 1.0 / a);
            partials.set("Mach", "sos", i, -v / (a * a));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DragCoefficient {
    pub num_nodes: usize,
}

impl Component for DragCoefficient {
    fn name(&self) -> &str {
        "drag_coefficient"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("Mach", "")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("Cd", "")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare("Cd", "Mach", Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let mach = inputs.require(self.name(), "Mach")?;
        Ok(Values::new().with("Cd", mach.iter().map(|&m| drag_coefficient(m).0).collect()))
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let mach = inputs.require(self.name(), "Mach")?;
        for (i, &m) in mach.iter().enumerate() {
            partials.set("Cd", "Mach", i, drag_coefficient(m).1);
        }
        Ok(())
    }
}

/// `q_dyn = ½ρv²`, `q_heat = ½ρv³`
#[derive(Debug, Clone)]
pub struct HeatFluxAndDynamicPressure {
    pub num_nodes: usize,
}

impl Component for HeatFluxAndDynamicPressure {
    fn name(&self) -> &str {
        "heat_flux_and_dynamic_pressure"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("v", "m/s"), PortSpec::nodal("rho", "kg/m**3")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("q_dyn", "Pa"), PortSpec::nodal("q_heat", "W/m**2")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("q_dyn", &["v", "rho"], Pattern::Diagonal)
            .declare_all("q_heat", &["v", "rho"], Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let v = inputs.require(self.name(), "v")?;
        let rho = inputs.require(self.name(), "rho")?;
        let n = self.num_nodes;
        let q_dyn = (0..n).map(|i| 0.5 * at(rho, i) * at(v, i).powi(2)).collect();
        let q_heat = (0..n).map(|i| 0.5 * at(rho, i) * at(v, i).powi(3)).collect();
        Ok(Values::new().with("q_dyn", q_dyn).with("q_heat", q_heat))
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let v = inputs.require(self.name(), "v")?;
        let rho = inputs.require(self.name(), "rho")?;
        for i in 0..self.num_nodes {
            let (v, rho) = (at(v, i), at(rho, i));
            partials.set("q_dyn", "v", i, rho * v);
            partials.set("q_dyn", "rho", i, 0.5 * v * v);
            partials.set("q_heat", "v", i, 1.5 * rho * v * v);
            partials.set("q_heat", "rho", i, 0.5 * v * v * v);
        }
        Ok(())
    }
}

/// `Drag = q_dyn · Cd · π/4 · D²`
#[derive(Debug, Clone)]
pub struct DragForce {
    pub num_nodes: usize,
}

impl Component for DragForce {
    fn name(&self) -> &str {
        "drag_force"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::nodal("q_dyn", "Pa"),
            PortSpec::nodal("Cd", ""),
            PortSpec::scalar("diameter", "m"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("Drag", "N")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("Drag", &["q_dyn", "Cd"], Pattern::Diagonal)
            .declare("Drag", "diameter", Pattern::Column)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let q = inputs.require(self.name(), "q_dyn")?;
        let cd = inputs.require(self.name(), "Cd")?;
        let s = reference_area(inputs.scalar(self.name(), "diameter")?);
        let drag = (0..self.num_nodes).map(|i| at(q, i) * at(cd, i) * s).collect();
        Ok(Values::new().with("Drag", drag))
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let q = inputs.require(self.name(), "q_dyn")?;
        let cd = inputs.require(self.name(), "Cd")?;
        let d = inputs.scalar(self.name(), "diameter")?;
        let s = reference_area(d);
        for i in 0..self.num_nodes {
            partials.set("Drag", "q_dyn", i, at(cd, i) * s);
            partials.set("Drag", "Cd", i, at(q, i) * s);
            partials.set("Drag", "diameter", i, at(q, i) * at(cd, i) * PI / 2.0 * d);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    #[test]
    fn cd_hits_table_points() {
        for (m, cd) in MACH.iter().zip(CD.iter()) {
            assert!((drag_coefficient(*m).0 - cd).abs() < 1e-12, "Cd({}) off table", m);
        }
    }

    #[test]
    fn cd_peaks_transonic() {
        let (cd_peak, slope) = drag_coefficient(1.3);
        assert!(cd_peak > drag_coefficient(1.0).0 && cd_peak > drag_coefficient(1.6).0);
        assert!(slope.abs() < 1e-12, "local maximum should be flat, got {}", slope);
    }

    #[test]
    fn cd_extrapolates_past_table() {
        let (cd, _) = drag_coefficient(20.0);
        assert!((cd - 0.59).abs() < 1e-9);
        assert!(drag_coefficient(-0.1).0.is_finite());
    }

    #[test]
    fn drag_matches_closed_form() {
        let comp = DragForce { num_nodes: 1 };
        let inputs = Values::new()
            .with("q_dyn", vec![30_000.0])
            .with("Cd", vec![0.9])
            .with_scalar("diameter", 5.0);
        let out = comp.compute(&inputs).unwrap();
        let expected = 30_000.0 * 0.9 * PI / 4.0 * 25.0;
        assert!((out.get("Drag").unwrap()[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn aero_partials_match_finite_differences() {
        let n = 3;
        let v = vec![120.0, 480.0, 1_900.0];
        let rho = vec![1.1, 0.4, 0.02];
        let cases: Vec<(Box<dyn Component>, Values)> = vec![
            (
                Box::new(MachNumber { num_nodes: n }),
                Values::new().with("v", v.clone()).with("sos", vec![338.0, 310.0, 295.0]),
            ),
            (
                Box::new(DragCoefficient { num_nodes: n }),
                Values::new().with("Mach", vec![0.5, 1.2, 6.0]),
            ),
            (
                Box::new(HeatFluxAndDynamicPressure { num_nodes: n }),
                Values::new().with("v", v.clone()).with("rho", rho),
            ),
            (
                Box::new(DragForce { num_nodes: n }),
                Values::new()
                    .with("q_dyn", vec![8_000.0, 40_000.0, 60_000.0])
                    .with("Cd", vec![0.5, 1.4, 0.6])
                    .with_scalar("diameter", 4.9),
            ),
        ];
        for (comp, inputs) in &cases {
            for c in check_partials(comp.as_ref(), inputs, 1e-6).unwrap() {
                assert!(c.passes(1e-6), "{}: {:?}", comp.name(), c);
            }
        }
    }
}
