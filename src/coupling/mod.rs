//! Residuals tying the trajectory's mass history and loads back to the
//! propulsion and mass-sizing disciplines.
//!
//! Every relation is linear except the exit-area margin, so almost all
//! partials are fixed at template construction.

pub mod audit;
pub mod jettison;
pub mod residuals;

pub use audit::MassAudit;
pub use jettison::{JettisonConstraints, MassJettison};
pub use residuals::{ExitAreaConstraints, LoadMargin, PropellantConstraints};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::jacobian::group::{Group, GroupBuilder};
use crate::jacobian::{Component, PortSpec, Values};

/// Coupling residuals in report order. All are inequality constraints with
/// lower bound zero.
pub const RESIDUALS: [&str; 9] = [
    "residual_ms_1",
    "residual_mplf",
    "residual_m_final",
    "residual_area_1",
    "residual_area_2",
    "residual_max_q_dyn",
    "residual_mp_1",
    "residual_mp_2",
    "residual_max_n_f_1",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CouplingOptions {
    pub mplf: f64, // kg
    pub md: f64,   // kg
    pub area_factor_1: f64,
    pub area_factor_2: f64,
}

/// Everything the coupling layer reads, gathered from the trajectory, the
/// disciplines and the design point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplingInputs {
    // trajectory boundary values
    pub mf_a: f64, // first lift_off mass
    pub me_a: f64, // last gravity_turn_b mass
    pub mf_b: f64, // first gravity_turn_c mass
    pub mi_b: f64, // last exoatmos_a mass
    pub mi_c: f64, // first exoatmos_b mass
    pub m_final: f64,
    pub n_f_end_1: f64,
    pub q_dyn_end_gravity_turn: f64,
    // disciplines
    pub ms_1: f64,
    pub ms_2: f64,
    pub ae_t_1: f64,
    pub ae_t_2: f64,
    // design point
    pub mp_1: f64,
    pub mp_2: f64,
    pub max_n_f_1: f64,
    pub max_q_dyn_1: f64,
    pub diameter: f64,
}

/// The wired coupling group.
#[derive(Debug)]
pub struct CouplingLayer {
    group: Group,
}

impl CouplingLayer {
    pub fn new(options: &CouplingOptions) -> Result<Self> {
        let mut builder = GroupBuilder::new("coupling", 1);
        for name in EXTERNALS {
            builder = builder.input(PortSpec::scalar(name, ""));
        }
        let builder = builder
            .add("mass_jettison", MassJettison)
            .connect("me_a", "mass_jettison.me_a")
            .connect("mf_b", "mass_jettison.mf_b")
            .connect("mi_b", "mass_jettison.mi_b")
            .connect("mi_c", "mass_jettison.mi_c")
            .add("jettison", JettisonConstraints { mplf: options.mplf, md: options.md })
            .connect("mass_jettison.massjettison_first_stage", "jettison.massjettison_first_stage")
            .connect("mass_jettison.massjettison_plf", "jettison.massjettison_plf")
            .connect("ms_1", "jettison.ms_1")
            .connect("ms_2", "jettison.ms_2")
            .connect("m_final", "jettison.m_final")
            .add(
                "exit_area",
                ExitAreaConstraints { area_factor_1: options.area_factor_1, area_factor_2: options.area_factor_2 },
            )
            .connect("D", "exit_area.D_stage_1")
            .connect("D", "exit_area.D_stage_2")
            .connect("Ae_t_1", "exit_area.Ae_t_1")
            .connect("Ae_t_2", "exit_area.Ae_t_2")
            .add("dynamic_pressure", LoadMargin::dynamic_pressure())
            .connect("max_q_dyn_1", "dynamic_pressure.max_q_dyn_1")
            .connect("q_dyn_end_gravity_turn", "dynamic_pressure.q_dyn_end_gravity_turn")
            .add("propellants", PropellantConstraints { mplf: options.mplf })
            .connect("mp_1", "propellants.mp_1")
            .connect("mp_2", "propellants.mp_2")
            .connect("mf_a", "propellants.mf_a")
            .connect("me_a", "propellants.me_a")
            .connect("mf_b", "propellants.mf_b")
            .connect("m_final", "propellants.m_final")
            .add("load_factor", LoadMargin::load_factor())
            .connect("max_n_f_1", "load_factor.max_n_f_1")
            .connect("n_f_end_1", "load_factor.n_f_end_1");
        let group = RESIDUALS
            .into_iter()
            .fold(builder, |b, name| b.expose(&format!("{}.{}", owner(name), name), name))
            .build()?;
        Ok(CouplingLayer { group })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn inputs(c: &CouplingInputs) -> Values {
        [
            ("mf_a", c.mf_a),
            ("me_a", c.me_a),
            ("mf_b", c.mf_b),
            ("mi_b", c.mi_b),
            ("mi_c", c.mi_c),
            ("m_final", c.m_final),
            ("n_f_end_1", c.n_f_end_1),
            ("q_dyn_end_gravity_turn", c.q_dyn_end_gravity_turn),
            ("ms_1", c.ms_1),
            ("ms_2", c.ms_2),
            ("Ae_t_1", c.ae_t_1),
            ("Ae_t_2", c.ae_t_2),
            ("mp_1", c.mp_1),
            ("mp_2", c.mp_2),
            ("max_n_f_1", c.max_n_f_1),
            ("max_q_dyn_1", c.max_q_dyn_1),
            ("D", c.diameter),
        ]
        .into_iter()
        .fold(Values::new(), |v, (name, x)| v.with_scalar(name, x))
    }

    /// Residuals in [`RESIDUALS`] order.
    pub fn residuals(&self, c: &CouplingInputs) -> Result<Vec<(&'static str, f64)>> {
        let out = self.group.compute(&Self::inputs(c))?;
        Ok(RESIDUALS.into_iter().map(|name| (name, out.first(name).unwrap_or(f64::NAN))).collect())
    }
}

const EXTERNALS: [&str; 17] = [
    "mf_a",
    "me_a",
    "mf_b",
    "mi_b",
    "mi_c",
    "m_final",
    "n_f_end_1",
    "q_dyn_end_gravity_turn",
    "ms_1",
    "ms_2",
    "Ae_t_1",
    "Ae_t_2",
    "mp_1",
    "mp_2",
    "max_n_f_1",
    "max_q_dyn_1",
    "D",
];

fn owner(residual: &str) -> &'static str {
    match residual {
        "residual_ms_1" | "residual_mplf" | "residual_m_final" => "jettison",
        "residual_area_1" | "residual_area_2" => "exit_area",
        "residual_max_q_dyn" => "dynamic_pressure",
        "residual_mp_1" | "residual_mp_2" => "propellants",
        _ => "load_factor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    fn options() -> CouplingOptions {
        CouplingOptions { mplf: 1_900.0, md: 11_000.0, area_factor_1: 0.64, area_factor_2: 0.64 }
    }

    fn inputs() -> CouplingInputs {
        CouplingInputs {
            mf_a: 369_421.5,
            me_a: 118_470.0,
            mf_b: 89_776.3,
            mi_b: 75_000.0,
            mi_c: 73_100.0,
            m_final: 17_701.6,
            n_f_end_1: 6.2,
            q_dyn_end_gravity_turn: 64_000.0,
            ms_1: 28_693.7,
            ms_2: 6_701.6,
            ae_t_1: 9.344,
            ae_t_2: 11.687,
            mp_1: 250_951.5,
            mp_2: 70_174.7,
            max_n_f_1: 6.63,
            max_q_dyn_1: 86_566.3,
            diameter: 4.9973,
        }
    }

    #[test]
    fn residuals_follow_report_order() {
        let layer = CouplingLayer::new(&options()).unwrap();
        let r = layer.residuals(&inputs()).unwrap();
        let names: Vec<_> = r.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, RESIDUALS.to_vec());
        let get = |name: &str| r.iter().find(|(n, _)| *n == name).map(|(_, v)| *v).unwrap();
        assert!((get("residual_ms_1") - (118_470.0 - 89_776.3 - 28_693.7)).abs() < 1e-6);
        assert!(get("residual_mplf").abs() < 1e-9);
        assert!((get("residual_max_n_f_1") - 0.43).abs() < 1e-9);
    }

    #[test]
    fn coupling_group_totals_match_finite_differences() {
        let layer = CouplingLayer::new(&options()).unwrap();
        let values = CouplingLayer::inputs(&inputs());
        for c in check_partials(layer.group(), &values, 1e-7).unwrap() {
            assert!(c.declared && c.passes(1e-6), "{:?}", c);
        }
    }
}
