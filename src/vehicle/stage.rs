use serde::{Deserialize, Serialize};

use crate::dynamics::state::G0;

// ---------------------------------------------------------------------------
// Stage record (one stage of the launcher)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub dry_mass: f64,        // kg
    pub propellant_mass: f64, // kg
    pub thrust: f64,          // N, vacuum
    pub isp: f64,             // s, vacuum
    pub mfr_max: f64,         // kg/s
    pub ae_t: f64,            // m², total nozzle exit area
    pub nb_engines: u32,
}

impl Stage {
    pub fn total_mass(&self) -> f64 {
        self.dry_mass + self.propellant_mass
    }

    /// Full-throttle burn time.
    pub fn burn_time(&self) -> f64 {
        if self.mfr_max > 0.0 {
            self.propellant_mass / self.mfr_max
        } else {
            0.0
        }
    }

    /// `ms / (ms + mp)`
    pub fn structural_coefficient(&self) -> f64 {
        self.dry_mass / self.total_mass()
    }

    /// Thrust with the nozzle exit at ambient pressure `p_a`.
    pub fn thrust_at(&self, p_a: f64) -> f64 {
        self.thrust - self.ae_t * p_a
    }

    /// Ideal vacuum Δv carrying `payload_mass` on top.
    pub fn delta_v(&self, payload_mass: f64) -> f64 {
        let m0 = self.total_mass() + payload_mass;
        let mf = self.dry_mass + payload_mass;
        self.isp * G0 * (m0 / mf).ln()
    }
}

// ---------------------------------------------------------------------------
// Stage builder
// ---------------------------------------------------------------------------

pub struct StageBuilder {
    name: String,
    dry_mass: f64,
    propellant_mass: f64,
    thrust: f64,
    isp: f64,
    mfr_max: Option<f64>,
    ae_t: f64,
    nb_engines: u32,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dry_mass: 1_000.0,
            propellant_mass: 10_000.0,
            thrust: 200e3,
            isp: 300.0,
            mfr_max: None,
            ae_t: 1.0,
            nb_engines: 1,
        }
    }

    pub fn dry_mass(mut self, v: f64) -> Self { self.dry_mass = v; self }
    pub fn propellant_mass(mut self, v: f64) -> Self { self.propellant_mass = v; self }
    pub fn thrust(mut self, v: f64) -> Self { self.thrust = v; self }
    pub fn isp(mut self, v: f64) -> Self { self.isp = v; self }
    pub fn mfr_max(mut self, v: f64) -> Self { self.mfr_max = Some(v); self }
    pub fn ae_t(mut self, v: f64) -> Self { self.ae_t = v; self }
    pub fn nb_engines(mut self, v: u32) -> Self { self.nb_engines = v; self }

    /// Mass flow defaults to `thrust / (Isp·g0)` when not given.
    pub fn build(self) -> Stage {
        Stage {
            mfr_max: self.mfr_max.unwrap_or(self.thrust / (self.isp * G0)),
            name: self.name,
            dry_mass: self.dry_mass,
            propellant_mass: self.propellant_mass,
            thrust: self.thrust,
            isp: self.isp,
            ae_t: self.ae_t,
            nb_engines: self.nb_engines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_quantities() {
        let s = StageBuilder::new("upper")
            .dry_mass(2_000.0)
            .propellant_mass(18_000.0)
            .thrust(300e3)
            .isp(G0.recip() * 3_000.0)
            .build();
        assert!((s.mfr_max - 100.0).abs() < 1e-9);
        assert!((s.burn_time() - 180.0).abs() < 1e-9);
        assert!((s.structural_coefficient() - 0.1).abs() < 1e-12);
        assert!((s.delta_v(0.0) - 3_000.0 * 10.0_f64.ln()).abs() < 1e-6);
        assert!((s.thrust_at(1e5) - 200e3).abs() < 1e-9);
    }
}
