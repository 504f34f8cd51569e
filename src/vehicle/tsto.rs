use serde::{Deserialize, Serialize};

use super::stage::{Stage, StageBuilder};
use crate::dynamics::state::{G0, P0};

// ---------------------------------------------------------------------------
// Two-stage-to-orbit vehicle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tsto {
    pub name: String,
    pub stage_1: Stage,
    pub stage_2: Stage,
    pub fairing_mass: f64, // kg
    pub payload_mass: f64, // kg
}

impl Tsto {
    /// Everything above the first stage at separation.
    pub fn upper_mass(&self) -> f64 {
        self.stage_2.total_mass() + self.fairing_mass + self.payload_mass
    }

    pub fn lift_off_mass(&self) -> f64 {
        self.stage_1.total_mass() + self.upper_mass()
    }

    /// Sea-level thrust over lift-off weight.
    pub fn lift_off_thrust_to_weight(&self) -> f64 {
        self.stage_1.thrust_at(P0) / (self.lift_off_mass() * G0)
    }

    /// Vacuum thrust over weight at second-stage ignition.
    pub fn upper_thrust_to_weight(&self) -> f64 {
        self.stage_2.thrust / (self.upper_mass() * G0)
    }

    /// Ideal Δv of each stage, the fairing carried through the second burn.
    pub fn stage_delta_v(&self) -> [f64; 2] {
        [
            self.stage_1.delta_v(self.upper_mass()),
            self.stage_2.delta_v(self.fairing_mass + self.payload_mass),
        ]
    }

    pub fn total_delta_v(&self) -> f64 {
        self.stage_delta_v().iter().sum()
    }

    /// Payload over lift-off mass.
    pub fn payload_fraction(&self) -> f64 {
        self.payload_mass / self.lift_off_mass()
    }
}

// ---------------------------------------------------------------------------
// Tsto builder
// ---------------------------------------------------------------------------

pub struct TstoBuilder {
    name: String,
    stages: Vec<Stage>,
    fairing_mass: f64,
    payload_mass: f64,
}

impl TstoBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stages: vec![], fairing_mass: 0.0, payload_mass: 0.0 }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn fairing_mass(mut self, v: f64) -> Self { self.fairing_mass = v; self }
    pub fn payload_mass(mut self, v: f64) -> Self { self.payload_mass = v; self }

    /// `None` unless exactly two stages were given.
    pub fn build(self) -> Option<Tsto> {
        let [stage_1, stage_2]: [Stage; 2] = self.stages.try_into().ok()?;
        Some(Tsto {
            name: self.name,
            stage_1,
            stage_2,
            fairing_mass: self.fairing_mass,
            payload_mass: self.payload_mass,
        })
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;
    use crate::config::VehicleConfig;
    use crate::model::Evaluation;

    /// Vehicle described by an evaluated design point.
    pub fn from_evaluation(name: &str, eval: &Evaluation, vehicle: &VehicleConfig) -> Tsto {
        let (d, p) = (&eval.design, &eval.disciplines);
        Tsto {
            name: name.into(),
            stage_1: StageBuilder::new("stage_1")
                .dry_mass(p.ms_1)
                .propellant_mass(d.mp_1)
                .thrust(d.thrust_1)
                .isp(p.stage_1.isp)
                .mfr_max(p.stage_1.mfr_max)
                .ae_t(p.stage_1.ae_t)
                .nb_engines(vehicle.nb_engines_1)
                .build(),
            stage_2: StageBuilder::new("stage_2")
                .dry_mass(p.ms_2)
                .propellant_mass(d.mp_2)
                .thrust(d.thrust_2)
                .isp(p.stage_2.isp)
                .mfr_max(p.stage_2.mfr_max)
                .ae_t(p.stage_2.ae_t)
                .nb_engines(vehicle.nb_engines_2)
                .build(),
            fairing_mass: vehicle.mplf,
            payload_mass: vehicle.md,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle() -> Tsto {
        TstoBuilder::new("test")
            .stage(StageBuilder::new("s1").dry_mass(20e3).propellant_mass(200e3).thrust(5e6).isp(300.0).ae_t(5.0).build())
            .stage(StageBuilder::new("s2").dry_mass(5e3).propellant_mass(50e3).thrust(8e5).isp(340.0).build())
            .fairing_mass(1e3)
            .payload_mass(4e3)
            .build()
            .unwrap()
    }

    #[test]
    fn masses_and_ratios() {
        let v = vehicle();
        assert!((v.upper_mass() - 60e3).abs() < 1e-9);
        assert!((v.lift_off_mass() - 280e3).abs() < 1e-9);
        let tw = (5e6 - 5.0 * P0) / (280e3 * G0);
        assert!((v.lift_off_thrust_to_weight() - tw).abs() < 1e-12);
        let [dv1, dv2] = v.stage_delta_v();
        assert!((dv1 - 300.0 * G0 * (280.0_f64 / 80.0).ln()).abs() < 1e-6);
        assert!((dv2 - 340.0 * G0 * (60.0_f64 / 10.0).ln()).abs() < 1e-6);
        assert!((v.payload_fraction() - 4.0 / 280.0).abs() < 1e-12);
    }

    #[test]
    fn builder_needs_two_stages() {
        assert!(TstoBuilder::new("one").stage(StageBuilder::new("s1").build()).build().is_none());
    }
}
