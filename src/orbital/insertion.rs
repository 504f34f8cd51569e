//! Orbit reached at burnout and the mass left after circularizing it.
//!
//! The components are nodal so the exoatmospheric ODE can evaluate them at
//! every node; only the last node is constrained.

use serde::{Deserialize, Serialize};

use super::maneuvers::{circularization, rocket_equation};
use crate::dynamics::state::{Earth, State};
use crate::error::Result;
use crate::jacobian::group::GroupBuilder;
use crate::jacobian::{at, Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Orbit and circularization budget at one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Insertion {
    pub v_inertial: f64, // m/s
    pub energy: f64,     // J/kg
    pub momentum: f64,   // m²/s
    pub eccentricity: f64,
    pub sma: f64, // m
    pub ra: f64,  // m
    pub rp: f64,  // m
    pub delta_v2: f64,
    pub m_final: f64, // kg
}

/// Closed-form insertion of a burnout state (no partials).
pub fn insertion(earth: &Earth, s: &State, isp: f64) -> Insertion {
    let v_inertial = s.v + earth.omega * earth.r0;
    let energy = v_inertial * v_inertial / 2.0 - earth.mu / s.r;
    let momentum = s.r * v_inertial * s.phi.cos();
    let sma = -earth.mu / (2.0 * energy);
    let eccentricity = (1.0 + 2.0 * momentum * momentum * energy / (earth.mu * earth.mu)).sqrt();
    let ra = sma * (1.0 + eccentricity);
    let rp = sma * (1.0 - eccentricity);
    let (delta_v2, ..) = circularization(earth.mu, ra, rp);
    let (m_final, ..) = rocket_equation(s.m, delta_v2, isp, earth.g0);
    Insertion { v_inertial, energy, momentum, eccentricity, sma, ra, rp, delta_v2, m_final }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// `v_i = v + ω·r0`; the ground speed is lifted to inertial with the
/// rotation speed at the reference radius.
#[derive(Debug, Clone)]
pub struct SpeedInertial {
    pub num_nodes: usize,
    pub omega: f64,
    pub r_ref: f64,
}

impl Component for SpeedInertial {
    fn name(&self) -> &str {
        "speed_inertial"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("v", "m/s")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("v_i", "m/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_fixed("v_i", "v", Pattern::Diagonal, 1.0)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let v = inputs.require(self.name(), "v")?;
        let shift = self.omega * self.r_ref;
        Ok(Values::new().with("v_i", (0..self.num_nodes).map(|i| at(v, i) + shift).collect()))
    }

    fn compute_partials(&self, _inputs: &Values, _p: &mut Partials) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EnergyAndMomentum {
    pub num_nodes: usize,
    pub mu: f64,
}

impl Component for EnergyAndMomentum {
    fn name(&self) -> &str {
        "energy_and_momentum"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("v_i", "m/s"), PortSpec::nodal("r", "m"), PortSpec::nodal("phi", "rad")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("E", "J/kg"), PortSpec::nodal("H", "m**2/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("E", &["v_i", "r"], Pattern::Diagonal)
            .declare_all("H", &["v_i", "r", "phi"], Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let v = inputs.require(self.name(), "v_i")?;
        let r = inputs.require(self.name(), "r")?;
        let phi = inputs.require(self.name(), "phi")?;
        let (mut e, mut h) = (Vec::with_capacity(self.num_nodes), Vec::with_capacity(self.num_nodes));
        for i in 0..self.num_nodes {
            let (v, r, phi) = (at(v, i), at(r, i), at(phi, i));
            e.push(v * v / 2.0 - self.mu / r);
            h.push(r * v * phi.cos());
        }
        Ok(Values::new().with("E", e).with("H", h))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let v = inputs.require(self.name(), "v_i")?;
        let r = inputs.require(self.name(), "r")?;
        let phi = inputs.require(self.name(), "phi")?;
        for i in 0..self.num_nodes {
            let (v, r, phi) = (at(v, i), at(r, i), at(phi, i));
            p.set("E", "v_i", i, v);
            p.set("E", "r", i, self.mu / (r * r));
            p.set("H", "v_i", i, r * phi.cos());
            p.set("H", "r", i, v * phi.cos());
            p.set("H", "phi", i, -r * v * phi.sin());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EccentricityAndMajorAxis {
    pub num_nodes: usize,
    pub mu: f64,
}

impl Component for EccentricityAndMajorAxis {
    fn name(&self) -> &str {
        "eccentricity_and_major_axis"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("E", "J/kg"), PortSpec::nodal("H", "m**2/s")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("e", ""), PortSpec::nodal("a", "m")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("e", &["E", "H"], Pattern::Diagonal)
            .declare("a", "E", Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let en = inputs.require(self.name(), "E")?;
        let h = inputs.require(self.name(), "H")?;
        let mu2 = self.mu * self.mu;
        let (mut e, mut a) = (Vec::with_capacity(self.num_nodes), Vec::with_capacity(self.num_nodes));
        for i in 0..self.num_nodes {
            let (en, h) = (at(en, i), at(h, i));
            e.push((1.0 + 2.0 * h * h * en / mu2).sqrt());
            a.push(-self.mu / (2.0 * en));
        }
        Ok(Values::new().with("e", e).with("a", a))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let en = inputs.require(self.name(), "E")?;
        let h = inputs.require(self.name(), "H")?;
        let mu2 = self.mu * self.mu;
        for i in 0..self.num_nodes {
            let (en, h) = (at(en, i), at(h, i));
            let e = (1.0 + 2.0 * h * h * en / mu2).sqrt();
            p.set("e", "E", i, h * h / (mu2 * e));
            p.set("e", "H", i, 2.0 * h * en / (mu2 * e));
            p.set("a", "E", i, self.mu / (2.0 * en * en));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ApogeeAndPerigee {
    pub num_nodes: usize,
}

impl Component for ApogeeAndPerigee {
    fn name(&self) -> &str {
        "apogee_and_perigee"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("e", ""), PortSpec::nodal("a", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("ra", "m"), PortSpec::nodal("rp", "m")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("ra", &["e", "a"], Pattern::Diagonal)
            .declare_all("rp", &["e", "a"], Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let e = inputs.require(self.name(), "e")?;
        let a = inputs.require(self.name(), "a")?;
        let n = self.num_nodes;
        Ok(Values::new()
            .with("ra", (0..n).map(|i| at(a, i) * (1.0 + at(e, i))).collect())
            .with("rp", (0..n).map(|i| at(a, i) * (1.0 - at(e, i))).collect()))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let e = inputs.require(self.name(), "e")?;
        let a = inputs.require(self.name(), "a")?;
        for i in 0..self.num_nodes {
            p.set("ra", "e", i, at(a, i));
            p.set("ra", "a", i, 1.0 + at(e, i));
            p.set("rp", "e", i, -at(a, i));
            p.set("rp", "a", i, 1.0 - at(e, i));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeltaV2 {
    pub num_nodes: usize,
    pub mu: f64,
}

impl Component for DeltaV2 {
    fn name(&self) -> &str {
        "delta_v2"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("ra", "m"), PortSpec::nodal("rp", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("delta_v2", "m/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("delta_v2", &["ra", "rp"], Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let ra = inputs.require(self.name(), "ra")?;
        let rp = inputs.require(self.name(), "rp")?;
        let dv = (0..self.num_nodes).map(|i| circularization(self.mu, at(ra, i), at(rp, i)).0);
        Ok(Values::new().with("delta_v2", dv.collect()))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let ra = inputs.require(self.name(), "ra")?;
        let rp = inputs.require(self.name(), "rp")?;
        for i in 0..self.num_nodes {
            let (_, d_ra, d_rp) = circularization(self.mu, at(ra, i), at(rp, i));
            p.set("delta_v2", "ra", i, d_ra);
            p.set("delta_v2", "rp", i, d_rp);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FinalMass {
    pub num_nodes: usize,
    pub g0: f64,
}

impl Component for FinalMass {
    fn name(&self) -> &str {
        "final_mass"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::nodal("m_0", "kg"),
            PortSpec::nodal("delta_v2", "m/s"),
            PortSpec::scalar("Isp", "s"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("m_final", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("m_final", &["m_0", "delta_v2"], Pattern::Diagonal)
            .declare("m_final", "Isp", Pattern::Column)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let m0 = inputs.require(self.name(), "m_0")?;
        let dv = inputs.require(self.name(), "delta_v2")?;
        let isp = inputs.scalar(self.name(), "Isp")?;
        let m = (0..self.num_nodes).map(|i| rocket_equation(at(m0, i), at(dv, i), isp, self.g0).0);
        Ok(Values::new().with("m_final", m.collect()))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let m0 = inputs.require(self.name(), "m_0")?;
        let dv = inputs.require(self.name(), "delta_v2")?;
        let isp = inputs.scalar(self.name(), "Isp")?;
        for i in 0..self.num_nodes {
            let (_, d_m0, d_dv, d_isp) = rocket_equation(at(m0, i), at(dv, i), isp, self.g0);
            p.set("m_final", "m_0", i, d_m0);
            p.set("m_final", "delta_v2", i, d_dv);
            p.set("m_final", "Isp", i, d_isp);
        }
        Ok(())
    }
}

/// Append the orbital-parameter chain to a group. `r`, `v`, `phi`, `m` and
/// `isp` name the group variables that feed it; outputs land under
/// `speed_inertial.*`, `energy.*`, `orbit.*`, `apsides.*`, `delta_v2.*` and
/// `final_mass.*`.
pub fn add_orbital_parameters(
    builder: GroupBuilder,
    earth: &Earth,
    num_nodes: usize,
    (r, v, phi, m, isp): (&str, &str, &str, &str, &str),
) -> GroupBuilder {
    builder
        .add("speed_inertial", SpeedInertial { num_nodes, omega: earth.omega, r_ref: earth.r0 })
        .connect(v, "speed_inertial.v")
        .add("energy", EnergyAndMomentum { num_nodes, mu: earth.mu })
        .connect("speed_inertial.v_i", "energy.v_i")
        .connect(r, "energy.r")
        .connect(phi, "energy.phi")
        .add("orbit", EccentricityAndMajorAxis { num_nodes, mu: earth.mu })
        .connect("energy.E", "orbit.E")
        .connect("energy.H", "orbit.H")
        .add("apsides", ApogeeAndPerigee { num_nodes })
        .connect("orbit.e", "apsides.e")
        .connect("orbit.a", "apsides.a")
        .add("delta_v2", DeltaV2 { num_nodes, mu: earth.mu })
        .connect("apsides.ra", "delta_v2.ra")
        .connect("apsides.rp", "delta_v2.rp")
        .add("final_mass", FinalMass { num_nodes, g0: earth.g0 })
        .connect(m, "final_mass.m_0")
        .connect("delta_v2.delta_v2", "final_mass.delta_v2")
        .connect(isp, "final_mass.Isp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;
    use crate::jacobian::PortSpec;

    fn circular_state(earth: &Earth, altitude: f64) -> State {
        let r = earth.r0 + altitude;
        let v_i = (earth.mu / r).sqrt();
        State { r, lambda: 0.0, v: v_i - earth.omega * earth.r0, phi: 0.0, m: 20_000.0 }
    }

    #[test]
    fn circular_burnout_keeps_its_mass() {
        let earth = Earth::default();
        let s = circular_state(&earth, 400e3);
        let ins = insertion(&earth, &s, 340.0);
        assert!(ins.eccentricity < 1e-6, "e = {}", ins.eccentricity);
        assert!((ins.ra - s.r).abs() < 10.0 && (ins.rp - s.r).abs() < 10.0);
        assert!(ins.delta_v2.abs() < 1e-2);
        assert!((ins.m_final - s.m).abs() < 0.1);
    }

    #[test]
    fn elliptic_burnout_pays_to_circularize() {
        let earth = Earth::default();
        let mut s = circular_state(&earth, 150e3);
        s.v += 80.0;
        let ins = insertion(&earth, &s, 340.0);
        assert!(ins.ra > s.r + 100e3 && (ins.rp - s.r).abs() < 1e3);
        assert!(ins.delta_v2 > 0.0 && ins.m_final < s.m);
    }

    #[test]
    fn orbital_chain_totals_match_finite_differences() {
        let earth = Earth::default();
        let n = 3;
        let group = add_orbital_parameters(
            GroupBuilder::new("orbital_parameters", n)
                .input(PortSpec::nodal("r", "m"))
                .input(PortSpec::nodal("v", "m/s"))
                .input(PortSpec::nodal("phi", "rad"))
                .input(PortSpec::nodal("m", "kg"))
                .input(PortSpec::scalar("Isp", "s")),
            &earth,
            n,
            ("r", "v", "phi", "m", "Isp"),
        )
        .expose("apsides.ra", "ra")
        .expose("apsides.rp", "rp")
        .expose("final_mass.m_final", "m_final")
        .build()
        .unwrap();

        let r0 = earth.r0;
        let inputs = Values::new()
            .with("r", vec![r0 + 140e3, r0 + 170e3, r0 + 200e3])
            .with("v", vec![7300.0, 7420.0, 7480.0])
            .with("phi", vec![0.05, 0.02, 0.001])
            .with("m", vec![40_000.0, 30_000.0, 20_000.0])
            .with_scalar("Isp", 339.4);
        // e near zero loses digits in a(1 − e); a wider step keeps the
        // quotient above that noise at the near-horizontal node
        for c in check_partials(&group, &inputs, 1e-5).unwrap() {
            assert!(c.declared && c.passes(1e-5), "{:?}", c);
        }
    }
}
