//! Empirical structural-mass regressions of the first stage
//! (aluminium structure, RP-1/LOX, gas-generator engines, hydraulic TVC).

use std::f64::consts::PI;

use crate::dynamics::state::G0;
use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

const FT: f64 = 3.2808; // ft per m
const FT3: f64 = 35.315; // ft³ per m³
const LB: f64 = 0.4536; // kg per lb

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// `thrust_single = thrust / nb_e`
#[derive(Debug, Clone)]
pub struct SingleEngineThrust {
    pub nb_engines: u32,
}

impl Component for SingleEngineThrust {
    fn name(&self) -> &str {
        "single_engine_thrust"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("thrust", "N")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("thrust_single", "N")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_fixed("thrust_single", "thrust", Pattern::Single, 1.0 / self.nb_engines as f64)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let thrust = inputs.scalar(self.name(), "thrust")?;
        Ok(Values::new().with_scalar("thrust_single", thrust / self.nb_engines as f64))
    }

    fn compute_partials(&self, _inputs: &Values, _p: &mut Partials) -> Result<()> {
        Ok(())
    }
}

/// Gas-generator engine mass, `a·T^b + c` with `T` in N.
#[derive(Debug, Clone)]
pub struct EngineMass {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for EngineMass {
    fn default() -> Self {
        EngineMass { a: 3.75407e3, b: 7.05627e-2, c: -8.8479e3 }
    }
}

impl Component for EngineMass {
    fn name(&self) -> &str {
        "engine_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("thrust_single", "N")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("engine_mass", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare("engine_mass", "thrust_single", Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let t = inputs.scalar(self.name(), "thrust_single")?;
        Ok(Values::new().with_scalar("engine_mass", self.a * t.powf(self.b) + self.c))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let t = inputs.scalar(self.name(), "thrust_single")?;
        p.set("engine_mass", "thrust_single", 0, self.a * self.b * t.powf(self.b - 1.0));
        Ok(())
    }
}

/// Aluminium thrust frame sized by engine count, thrust, engine mass and
/// the axial load limit.
#[derive(Debug, Clone)]
pub struct ThrustFrameMass {
    pub nb_engines: u32,
    pub ssm: f64,  // structural safety margin
    pub k_sm: f64, // material factor, 1 for aluminium
}

impl ThrustFrameMass {
    /// `(mass, d/dthrust_single, d/dengine_mass, d/dn_ax_max)`
    fn eval(&self, t: f64, m_eng: f64, n_ax: f64) -> (f64, f64, f64, f64) {
        let n = self.nb_engines as f64;
        let x = 0.013 * n.powf(0.795) * (224.81 * t * 1e-3).powf(0.579);
        let y = 0.01 * n * (m_eng / 0.45).powf(0.717);
        let load = 0.45 * (1.5 * self.ssm * n_ax * G0) * self.k_sm;
        let mass = (x + y) * load;
        (mass, 0.579 * x / t * load, 0.717 * y / m_eng * load, mass / n_ax)
    }

    fn read(&self, inputs: &Values) -> Result<(f64, f64, f64, f64)> {
        Ok(self.eval(
            inputs.scalar(self.name(), "thrust_single")?,
            inputs.scalar(self.name(), "engine_mass")?,
            inputs.scalar(self.name(), "n_ax_max")?,
        ))
    }
}

impl Component for ThrustFrameMass {
    fn name(&self) -> &str {
        "thrust_frame_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("thrust_single", "N"),
            PortSpec::scalar("engine_mass", "kg"),
            PortSpec::scalar("n_ax_max", ""),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("thrust_frame_mass", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all(
            "thrust_frame_mass",
            &["thrust_single", "engine_mass", "n_ax_max"],
            Pattern::Single,
        )
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let (mass, ..) = self.read(inputs)?;
        Ok(Values::new().with_scalar("thrust_frame_mass", mass))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let (_, dt, dm, dn) = self.read(inputs)?;
        p.set("thrust_frame_mass", "thrust_single", 0, dt);
        p.set("thrust_frame_mass", "engine_mass", 0, dm);
        p.set("thrust_frame_mass", "n_ax_max", 0, dn);
        Ok(())
    }
}

/// Hydraulic thrust-vector control of one engine.
#[derive(Debug, Clone, Default)]
pub struct TvcMass;

impl Component for TvcMass {
    fn name(&self) -> &str {
        "tvc_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("thrust_single", "N")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("tvc_mass", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_fixed("tvc_mass", "thrust_single", Pattern::Single, 0.1976e-3)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let t = inputs.scalar(self.name(), "thrust_single")?;
        Ok(Values::new().with_scalar("tvc_mass", 0.1976 * t * 1e-3 + 20.922))
    }

    fn compute_partials(&self, _inputs: &Values, _p: &mut Partials) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tanks
// ---------------------------------------------------------------------------

/// Fuel and oxidizer tank walls, LOX insulation and the inter-tank skirt.
#[derive(Debug, Clone)]
pub struct TankMass {
    pub ssm: f64,
    pub k_sm: f64,
    pub p_tanks_ox: f64, // bar
    pub p_tanks_f: f64,  // bar
}

impl Default for TankMass {
    fn default() -> Self {
        TankMass { ssm: 1.25, k_sm: 1.0, p_tanks_ox: 3.0, p_tanks_f: 3.0 }
    }
}

const K1: f64 = 1.15; // material
const K2: f64 = 1.0; // inter-tank configuration
const K3: f64 = 1.3; // vertical integration
const K4_REF: f64 = 5.76404;
const K5_REF: f64 = 1.29134;
const K6_REF: f64 = 2.7862;
const K_INS_OX: f64 = 0.9765; // kg/m², LOX insulation
const K_IT: f64 = 0.3;

impl TankMass {
    fn factor(&self, q: f64, n_ax: f64, p_tank: f64) -> f64 {
        let k4 = q.powf(0.16) / K4_REF;
        let k5 = (self.ssm * n_ax).powf(0.15) / K5_REF;
        let k6 = 1.3012 + 1.4359e-6 * p_tank / K6_REF;
        K1 * K2 * K3 * k4 * k5 * k6
    }

    fn inter_tank(&self, d: f64) -> (f64, f64) {
        let l_it = 2.0 * K_IT * d + 0.5;
        let m = self.k_sm * 5.4015 * d * PI * l_it * (d * FT).powf(0.5169);
        (m, m * (1.0 / d + 2.0 * K_IT / l_it + 0.5169 / d))
    }
}

impl Component for TankMass {
    fn name(&self) -> &str {
        "tank_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("P_dyn_max", "Pa"),
            PortSpec::scalar("n_ax_max", ""),
            PortSpec::scalar("V_F", "m**3"),
            PortSpec::scalar("V_LOX", "m**3"),
            PortSpec::scalar("D", "m"),
            PortSpec::scalar("S_OX", "m**2"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("M_FT", "kg"),
            PortSpec::scalar("M_OxT", "kg"),
            PortSpec::scalar("M_inter_tank", "kg"),
            PortSpec::scalar("M_TPS_OxT", "kg"),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("M_FT", &["P_dyn_max", "n_ax_max", "V_F"], Pattern::Single)
            .declare_all("M_OxT", &["P_dyn_max", "n_ax_max", "V_LOX"], Pattern::Single)
            .declare("M_inter_tank", "D", Pattern::Single)
            .declare_fixed("M_TPS_OxT", "S_OX", Pattern::Single, K_INS_OX)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let n = self.name();
        let q = inputs.scalar(n, "P_dyn_max")?;
        let n_ax = inputs.scalar(n, "n_ax_max")?;
        let v_f = inputs.scalar(n, "V_F")?;
        let v_lox = inputs.scalar(n, "V_LOX")?;
        let (m_it, _) = self.inter_tank(inputs.scalar(n, "D")?);
        Ok(Values::new()
            .with_scalar("M_FT", self.factor(q, n_ax, self.p_tanks_f) * (v_f * FT3 * 0.4856 + 800.0) * LB)
            .with_scalar("M_OxT", self.factor(q, n_ax, self.p_tanks_ox) * (v_lox * FT3 * 0.4856 + 700.0) * LB)
            .with_scalar("M_inter_tank", m_it)
            .with_scalar("M_TPS_OxT", K_INS_OX * inputs.scalar(n, "S_OX")?))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let n = self.name();
        let q = inputs.scalar(n, "P_dyn_max")?;
        let n_ax = inputs.scalar(n, "n_ax_max")?;
        let v_f = inputs.scalar(n, "V_F")?;
        let v_lox = inputs.scalar(n, "V_LOX")?;

        for (of, v, base, p_tank, wrt) in [
            ("M_FT", v_f, 800.0, self.p_tanks_f, "V_F"),
            ("M_OxT", v_lox, 700.0, self.p_tanks_ox, "V_LOX"),
        ] {
            let k = self.factor(q, n_ax, p_tank);
            let m = k * (v * FT3 * 0.4856 + base) * LB;
            p.set(of, "P_dyn_max", 0, 0.16 * m / q);
            p.set(of, "n_ax_max", 0, 0.15 * m / n_ax);
            p.set(of, wrt, 0, k * FT3 * 0.4856 * LB);
        }
        let (_, dm_it) = self.inter_tank(inputs.scalar(n, "D")?);
        p.set("M_inter_tank", "D", 0, dm_it);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Avionics, power, interstage
// ---------------------------------------------------------------------------

const K_RL: f64 = 1.3; // reliability level 3

/// Avionics and electrical power, linear in exterior surface.
#[derive(Debug, Clone, Default)]
pub struct AvionicsMass;

impl Component for AvionicsMass {
    fn name(&self) -> &str {
        "eps_avio_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("S_exterieur", "m**2")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("M_avio", "kg"), PortSpec::scalar("M_EPS", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_fixed("M_avio", "S_exterieur", Pattern::Single, K_RL * 1.3183)
            .declare_fixed("M_EPS", "S_exterieur", Pattern::Single, K_RL * 0.405 * K_RL * 1.3183)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let s = inputs.scalar(self.name(), "S_exterieur")?;
        let avio = K_RL * (246.76 + 1.3183 * s);
        Ok(Values::new().with_scalar("M_avio", avio).with_scalar("M_EPS", K_RL * 0.405 * avio))
    }

    fn compute_partials(&self, _inputs: &Values, _p: &mut Partials) -> Result<()> {
        Ok(())
    }
}

/// Lower interstage, regression in the mean diameter of both stages.
#[derive(Debug, Clone)]
pub struct InterstageMass {
    pub s_interstage: f64, // m²
    pub k_sm: f64,
}

impl InterstageMass {
    fn eval(&self, d1: f64, d2: f64) -> (f64, f64) {
        let d = (d1 + d2) / 2.0;
        let m = self.k_sm * 7.7165 * self.s_interstage * (d * FT).powf(0.4856);
        (m, 0.4856 * m / (2.0 * d))
    }
}

impl Component for InterstageMass {
    fn name(&self) -> &str {
        "interstage_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("D_stage_1", "m"), PortSpec::scalar("D_stage_2", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("mass_interstage", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("mass_interstage", &["D_stage_1", "D_stage_2"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let (m, _) = self.eval(
            inputs.scalar(self.name(), "D_stage_1")?,
            inputs.scalar(self.name(), "D_stage_2")?,
        );
        Ok(Values::new().with_scalar("mass_interstage", m))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let (_, dm) = self.eval(
            inputs.scalar(self.name(), "D_stage_1")?,
            inputs.scalar(self.name(), "D_stage_2")?,
        );
        p.set("mass_interstage", "D_stage_1", 0, dm);
        p.set("mass_interstage", "D_stage_2", 0, dm);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sum
// ---------------------------------------------------------------------------

/// Parts that enter the dry mass once, and those counted per engine.
const SHARED_PARTS: [&str; 8] = [
    "thrust_frame_mass",
    "M_FT",
    "M_OxT",
    "M_inter_tank",
    "M_TPS_OxT",
    "M_avio",
    "M_EPS",
    "mass_interstage",
];
const PER_ENGINE_PARTS: [&str; 2] = ["engine_mass", "tvc_mass"];

#[derive(Debug, Clone)]
pub struct AddUpMass {
    pub nb_engines: u32,
    pub mass_aux: f64, // kg
}

impl Component for AddUpMass {
    fn name(&self) -> &str {
        "add_up_mass"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        PER_ENGINE_PARTS
            .into_iter()
            .chain(SHARED_PARTS)
            .map(|name| PortSpec::scalar(name, "kg"))
            .collect()
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("ms", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        let nb = self.nb_engines as f64;
        let t = PER_ENGINE_PARTS
            .into_iter()
            .fold(SparsityTemplate::new(), |t, wrt| t.declare_fixed("ms", wrt, Pattern::Single, nb));
        SHARED_PARTS
            .into_iter()
            .fold(t, |t, wrt| t.declare_fixed("ms", wrt, Pattern::Single, 1.0))
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let nb = self.nb_engines as f64;
        let mut total = self.mass_aux;
        for name in PER_ENGINE_PARTS {
            total += nb * inputs.scalar(self.name(), name)?;
        }
        for name in SHARED_PARTS {
            total += inputs.scalar(self.name(), name)?;
        }
        Ok(Values::new().with_scalar("ms", total))
    }

    fn compute_partials(&self, _inputs: &Values, _p: &mut Partials) -> Result<()> {
        Ok(())
    }
}
