use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::cea::{CeaTable, RocketCea};
use super::chemistry::{AreaRatio, CharacteristicVelocity, ChemistryOptions, SpecificImpulse, ThrustCoefficient};
use super::nozzle::{MassFlowRate, NozzleExitArea, ThroatArea};
use crate::error::Result;
use crate::jacobian::group::{Group, GroupBuilder};
use crate::jacobian::{Component, PortSpec, Values};

/// Engine design point of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineDesign {
    pub thrust: f64, // N, vacuum, whole stage
    pub p_c: f64,    // Pa
    pub p_e: f64,    // Pa
    pub o_f: f64,
}

/// Everything the propulsion chain produces for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePerformance {
    pub gamma_t: f64,
    pub tc: f64,      // K
    pub mc: f64,      // kg/kmol
    pub c_star: f64,  // m/s
    pub epsilon: f64,
    pub c_f: f64,
    pub isp: f64,     // s
    pub mfr_max: f64, // kg/s
    pub at: f64,      // m², one engine
    pub ae: f64,      // m², one engine
    pub ae_t: f64,    // m², whole stage
}

/// The chemistry and nozzle chain of one stage, wired as a [`Group`].
///
/// Inputs `thrust`, `P_c`, `P_e`, `o_f`; both stages share one table.
#[derive(Debug)]
pub struct PropulsionStage {
    pub nb_engines: u32,
    group: Group,
}

impl PropulsionStage {
    pub fn new(name: &str, table: Arc<CeaTable>, options: ChemistryOptions, nb_engines: u32) -> Result<Self> {
        let group = GroupBuilder::new(name, 1)
            .input(PortSpec::scalar("thrust", "N"))
            .input(PortSpec::scalar("P_c", "Pa"))
            .input(PortSpec::scalar("P_e", "Pa"))
            .input(PortSpec::scalar("o_f", ""))
            .add("cea", RocketCea { table })
            .connect("P_c", "cea.P_c")
            .connect("o_f", "cea.o_f")
            .add("cstar", CharacteristicVelocity { eta_c_star: options.eta_c_star, rmc: options.rmc })
            .connect("cea.gamma_t", "cstar.gamma_t")
            .connect("cea.tc", "cstar.tc")
            .connect("cea.mc", "cstar.mc")
            .add("eps", AreaRatio)
            .connect("P_c", "eps.P_c")
            .connect("P_e", "eps.P_e")
            .connect("cea.gamma_t", "eps.gamma_t")
            .add("cf", ThrustCoefficient { eta_c_f: options.eta_c_f, p_a: options.p_a })
            .connect("cea.gamma_t", "cf.gamma_t")
            .connect("P_c", "cf.P_c")
            .connect("P_e", "cf.P_e")
            .connect("eps.epsilon", "cf.epsilon")
            .add("isp", SpecificImpulse { g0: options.g0 })
            .connect("cstar.cStar", "isp.cStar")
            .connect("cf.C_f", "isp.C_f")
            .add("mfr", MassFlowRate { g0: options.g0 })
            .connect("thrust", "mfr.thrust")
            .connect("isp.Isp", "mfr.Isp")
            .add("throat", ThroatArea { nb_engines })
            .connect("cstar.cStar", "throat.cStar")
            .connect("mfr.mfr_max", "throat.mfr_max")
            .connect("P_c", "throat.P_c")
            .add("exit", NozzleExitArea { nb_engines })
            .connect("eps.epsilon", "exit.epsilon")
            .connect("throat.At", "exit.At")
            .expose("cea.gamma_t", "gamma_t")
            .expose("cea.tc", "tc")
            .expose("cea.mc", "mc")
            .expose("cstar.cStar", "cStar")
            .expose("eps.epsilon", "epsilon")
            .expose("cf.C_f", "C_f")
            .expose("isp.Isp", "Isp")
            .expose("mfr.mfr_max", "mfr_max")
            .expose("throat.At", "At")
            .expose("exit.Ae", "Ae")
            .expose("exit.Ae_t", "Ae_t")
            .build()?;
        Ok(PropulsionStage { nb_engines, group })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn inputs(design: &EngineDesign) -> Values {
        Values::new()
            .with_scalar("thrust", design.thrust)
            .with_scalar("P_c", design.p_c)
            .with_scalar("P_e", design.p_e)
            .with_scalar("o_f", design.o_f)
    }

    pub fn performance(&self, design: &EngineDesign) -> Result<StagePerformance> {
        let out = self.group.compute(&Self::inputs(design))?;
        let get = |name: &str| out.first(name).unwrap_or(f64::NAN);
        let perf = StagePerformance {
            gamma_t: get("gamma_t"),
            tc: get("tc"),
            mc: get("mc"),
            c_star: get("cStar"),
            epsilon: get("epsilon"),
            c_f: get("C_f"),
            isp: get("Isp"),
            mfr_max: get("mfr_max"),
            at: get("At"),
            ae: get("Ae"),
            ae_t: get("Ae_t"),
        };
        debug!(
            "{}: Isp {:.1} s, mfr {:.1} kg/s, eps {:.2}, Ae_t {:.3} m2",
            self.group.name(),
            perf.isp,
            perf.mfr_max,
            perf.epsilon,
            perf.ae_t
        );
        Ok(perf)
    }
}
