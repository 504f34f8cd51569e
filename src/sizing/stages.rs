use log::debug;
use serde::{Deserialize, Serialize};

use super::geometry::{TankSizing, TankVolume};
use super::structure::{
    AddUpMass, AvionicsMass, EngineMass, InterstageMass, SingleEngineThrust, TankMass, ThrustFrameMass, TvcMass,
};
use crate::error::Result;
use crate::jacobian::group::{Group, GroupBuilder};
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Material and layout constants of the first-stage mass model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingOptions {
    pub nb_engines: u32,
    pub mass_aux: f64,     // kg
    pub mu_f: f64,         // kg/m³, RP-1
    pub mu_lox: f64,       // kg/m³
    pub knud_p: f64,       // Knud Thomsen exponent
    pub s_interstage: f64, // m²
    pub p_tanks: f64,      // bar
    pub ssm: f64,
    pub k_sm: f64,
}

impl Default for SizingOptions {
    fn default() -> Self {
        SizingOptions {
            nb_engines: 9,
            mass_aux: 3000.0,
            mu_f: 810.0,
            mu_lox: 1141.0,
            knud_p: 1.6075,
            s_interstage: 30.0,
            p_tanks: 3.0,
            ssm: 1.25,
            k_sm: 1.0,
        }
    }
}

/// Inputs of the first-stage dry-mass model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageOneLoads {
    pub mp: f64,       // kg
    pub o_f: f64,
    pub diameter: f64, // m
    pub thrust: f64,   // N, vacuum
    pub n_ax_max: f64,
    pub q_dyn_max: f64, // Pa
}

/// Dry-mass breakdown of the first stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DryMassBreakdown {
    pub engines: f64,
    pub thrust_frame: f64,
    pub fuel_tank: f64,
    pub lox_tank: f64,
    pub inter_tank: f64,
    pub tps: f64,
    pub tvc: f64,
    pub avionics: f64,
    pub eps: f64,
    pub interstage: f64,
    pub auxiliary: f64,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// First stage
// ---------------------------------------------------------------------------

/// Detailed first-stage dry mass, wired from the regressions.
#[derive(Debug)]
pub struct DryMassStageOne {
    pub options: SizingOptions,
    group: Group,
}

impl DryMassStageOne {
    pub fn new(options: SizingOptions) -> Result<Self> {
        let o = &options;
        let group = GroupBuilder::new("dry_mass_stage_1", 1)
            .input(PortSpec::scalar("mp", "kg"))
            .input(PortSpec::scalar("o_f", ""))
            .input(PortSpec::scalar("D", "m"))
            .input(PortSpec::scalar("thrust", "N"))
            .input(PortSpec::scalar("n_ax_max", ""))
            .input(PortSpec::scalar("P_dyn_max", "Pa"))
            .add("sizing", TankSizing { mu_f: o.mu_f, mu_lox: o.mu_lox, knud_p: o.knud_p })
            .connect("mp", "sizing.mp")
            .connect("o_f", "sizing.o_f")
            .connect("D", "sizing.D")
            .add("single", SingleEngineThrust { nb_engines: o.nb_engines })
            .connect("thrust", "single.thrust")
            .add("engine", EngineMass::default())
            .connect("single.thrust_single", "engine.thrust_single")
            .add("frame", ThrustFrameMass { nb_engines: o.nb_engines, ssm: o.ssm, k_sm: o.k_sm })
            .connect("single.thrust_single", "frame.thrust_single")
            .connect("engine.engine_mass", "frame.engine_mass")
            .connect("n_ax_max", "frame.n_ax_max")
            .add("volume", TankVolume { mu_f: o.mu_f, mu_lox: o.mu_lox })
            .connect("o_f", "volume.o_f")
            .connect("mp", "volume.mp")
            .add("tanks", TankMass { ssm: o.ssm, k_sm: o.k_sm, p_tanks_ox: o.p_tanks, p_tanks_f: o.p_tanks })
            .connect("P_dyn_max", "tanks.P_dyn_max")
            .connect("n_ax_max", "tanks.n_ax_max")
            .connect("volume.V_F", "tanks.V_F")
            .connect("volume.V_LOX", "tanks.V_LOX")
            .connect("D", "tanks.D")
            .connect("sizing.S_OX", "tanks.S_OX")
            .add("tvc", TvcMass)
            .connect("single.thrust_single", "tvc.thrust_single")
            .add("avionics", AvionicsMass)
            .connect("sizing.S_exterieur", "avionics.S_exterieur")
            .add("interstage", InterstageMass { s_interstage: o.s_interstage, k_sm: o.k_sm })
            .connect("D", "interstage.D_stage_1")
            .connect("D", "interstage.D_stage_2")
            .add("total", AddUpMass { nb_engines: o.nb_engines, mass_aux: o.mass_aux })
            .connect("engine.engine_mass", "total.engine_mass")
            .connect("tvc.tvc_mass", "total.tvc_mass")
            .connect("frame.thrust_frame_mass", "total.thrust_frame_mass")
            .connect("tanks.M_FT", "total.M_FT")
            .connect("tanks.M_OxT", "total.M_OxT")
            .connect("tanks.M_inter_tank", "total.M_inter_tank")
            .connect("tanks.M_TPS_OxT", "total.M_TPS_OxT")
            .connect("avionics.M_avio", "total.M_avio")
            .connect("avionics.M_EPS", "total.M_EPS")
            .connect("interstage.mass_interstage", "total.mass_interstage")
            .expose("total.ms", "ms_1")
            .build()?;
        Ok(DryMassStageOne { options, group })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn inputs(loads: &StageOneLoads) -> Values {
        Values::new()
            .with_scalar("mp", loads.mp)
            .with_scalar("o_f", loads.o_f)
            .with_scalar("D", loads.diameter)
            .with_scalar("thrust", loads.thrust)
            .with_scalar("n_ax_max", loads.n_ax_max)
            .with_scalar("P_dyn_max", loads.q_dyn_max)
    }

    pub fn dry_mass(&self, loads: &StageOneLoads) -> Result<f64> {
        Ok(self.group.compute(&Self::inputs(loads))?.first("ms_1").unwrap_or(f64::NAN))
    }

    pub fn breakdown(&self, loads: &StageOneLoads) -> Result<DryMassBreakdown> {
        let vars = self.group.evaluate(&Self::inputs(loads))?;
        let get = |name: &str| vars.first(name).unwrap_or(f64::NAN);
        let nb = self.options.nb_engines as f64;
        let b = DryMassBreakdown {
            engines: nb * get("engine.engine_mass"),
            thrust_frame: get("frame.thrust_frame_mass"),
            fuel_tank: get("tanks.M_FT"),
            lox_tank: get("tanks.M_OxT"),
            inter_tank: get("tanks.M_inter_tank"),
            tps: get("tanks.M_TPS_OxT"),
            tvc: nb * get("tvc.tvc_mass"),
            avionics: get("avionics.M_avio"),
            eps: get("avionics.M_EPS"),
            interstage: get("interstage.mass_interstage"),
            auxiliary: self.options.mass_aux,
            total: get("total.ms"),
        };
        debug!("first-stage dry mass {:.1} kg ({:.1} kg engines)", b.total, b.engines);
        Ok(b)
    }
}

// ---------------------------------------------------------------------------
// Second stage
// ---------------------------------------------------------------------------

/// `ms_2 = 0.8·√1000·√mp_2`
#[derive(Debug, Clone, Copy, Default)]
pub struct DryMassStageTwo;

const STAGE_2_COEFF: f64 = 0.8 * 31.622_776_601_683_793; // 0.8·√1000

impl DryMassStageTwo {
    pub fn dry_mass(mp_2: f64) -> f64 {
        STAGE_2_COEFF * mp_2.sqrt()
    }
}

impl Component for DryMassStageTwo {
    fn name(&self) -> &str {
        "dry_mass_stage_2"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("mp_2", "kg")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("ms_2", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare("ms_2", "mp_2", Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let mp = inputs.scalar(self.name(), "mp_2")?;
        Ok(Values::new().with_scalar("ms_2", Self::dry_mass(mp)))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let mp = inputs.scalar(self.name(), "mp_2")?;
        p.set("ms_2", "mp_2", 0, 0.5 * STAGE_2_COEFF / mp.sqrt());
        Ok(())
    }
}
