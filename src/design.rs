//! Design variables of the TSTO problem and their bounds.

use serde::{Deserialize, Serialize};

use crate::error::{MdoError, Result};
use crate::propulsion::EngineDesign;
use crate::sizing::StageOneLoads;

const DEG: f64 = std::f64::consts::PI / 180.0;

// ---------------------------------------------------------------------------
// Bounded scalar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounded {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Bounded {
    pub const fn new(value: f64, lower: f64, upper: f64) -> Self {
        Bounded { value, lower, upper }
    }

    /// Distance outside `[lower, upper]`, zero when inside.
    pub fn violation(&self) -> f64 {
        (self.lower - self.value).max(self.value - self.upper).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Design point
// ---------------------------------------------------------------------------

/// One value for every design variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignPoint {
    pub p_c_1: f64, // Pa
    pub p_c_2: f64,
    pub p_e_1: f64, // Pa
    pub p_e_2: f64,
    pub o_f_1: f64,
    pub o_f_2: f64,
    pub thrust_1: f64, // N, vacuum
    pub thrust_2: f64,
    pub mp_1: f64, // kg
    pub mp_2: f64,
    pub max_n_f_1: f64,
    pub max_q_dyn_1: f64, // Pa
    pub diameter: f64,    // m
    pub delta_theta_pitch_over: f64, // rad
    pub xi: f64,
    pub delta_theta_exoatmos: f64, // rad
    pub theta_f: f64,              // rad
    pub duration_exoatmos_a: f64,  // s
    pub duration_exoatmos_b: f64,  // s
}

impl DesignPoint {
    pub fn engine(&self, stage: u8) -> EngineDesign {
        if stage == 1 {
            EngineDesign { thrust: self.thrust_1, p_c: self.p_c_1, p_e: self.p_e_1, o_f: self.o_f_1 }
        } else {
            EngineDesign { thrust: self.thrust_2, p_c: self.p_c_2, p_e: self.p_e_2, o_f: self.o_f_2 }
        }
    }

    pub fn stage_one_loads(&self) -> StageOneLoads {
        StageOneLoads {
            mp: self.mp_1,
            o_f: self.o_f_1,
            diameter: self.diameter,
            thrust: self.thrust_1,
            n_ax_max: self.max_n_f_1,
            q_dyn_max: self.max_q_dyn_1,
        }
    }
}

// ---------------------------------------------------------------------------
// Design space
// ---------------------------------------------------------------------------

/// Every design variable with its bounds. Defaults to the converged
/// reference vehicle; the exoatmospheric durations are those of the
/// reference forward shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSpace {
    pub p_c_1: Bounded,
    pub p_c_2: Bounded,
    pub p_e_1: Bounded,
    pub p_e_2: Bounded,
    pub o_f_1: Bounded,
    pub o_f_2: Bounded,
    pub thrust_1: Bounded,
    pub thrust_2: Bounded,
    pub mp_1: Bounded,
    pub mp_2: Bounded,
    pub max_n_f_1: Bounded,
    pub max_q_dyn_1: Bounded,
    pub diameter: Bounded,
    pub delta_theta_pitch_over: Bounded,
    pub xi: Bounded,
    pub delta_theta_exoatmos: Bounded,
    pub theta_f: Bounded,
    pub duration_exoatmos_a: Bounded,
    pub duration_exoatmos_b: Bounded,
}

impl Default for DesignSpace {
    fn default() -> Self {
        DesignSpace {
            p_c_1: Bounded::new(9.999_92e6, 6e6, 10e6),
            p_c_2: Bounded::new(9.999_99e6, 6e6, 10e6),
            p_e_1: Bounded::new(40_546.16, 0.4 * 101_325.0, 2e5),
            p_e_2: Bounded::new(1_733.98, 1.0, 1e4),
            o_f_1: Bounded::new(2.3133, 2.0, 4.0),
            o_f_2: Bounded::new(2.3540, 2.0, 4.0),
            thrust_1: Bounded::new(7_639_320.0, 5e6, 15e6),
            thrust_2: Bounded::new(901_591.7, 1e5, 1.4e6),
            mp_1: Bounded::new(250_951.47, 230e3, 280e3),
            mp_2: Bounded::new(70_174.74, 50e3, 75e3),
            max_n_f_1: Bounded::new(6.6295, 1.0, 10.0),
            max_q_dyn_1: Bounded::new(86_566.3, 10.0, 1e5),
            diameter: Bounded::new(4.9973, 1.0, 5.0),
            delta_theta_pitch_over: Bounded::new(0.0544, 1.0 * DEG, 10.0 * DEG),
            xi: Bounded::new(-0.1997, -1.0, 1.0),
            delta_theta_exoatmos: Bounded::new(-0.1734, -60.0 * DEG, 60.0 * DEG),
            theta_f: Bounded::new(0.0555, -20.0 * DEG, 20.0 * DEG),
            duration_exoatmos_a: Bounded::new(59.41, 1.0, 250.0),
            duration_exoatmos_b: Bounded::new(197.63, 1.0, 250.0),
        }
    }
}

impl DesignSpace {
    /// Variables in declaration order, which is the order the optimizer
    /// vector uses.
    pub fn entries(&self) -> [(&'static str, Bounded); 19] {
        [
            ("p_c_1", self.p_c_1),
            ("p_c_2", self.p_c_2),
            ("p_e_1", self.p_e_1),
            ("p_e_2", self.p_e_2),
            ("o_f_1", self.o_f_1),
            ("o_f_2", self.o_f_2),
            ("thrust_1", self.thrust_1),
            ("thrust_2", self.thrust_2),
            ("mp_1", self.mp_1),
            ("mp_2", self.mp_2),
            ("max_n_f_1", self.max_n_f_1),
            ("max_q_dyn_1", self.max_q_dyn_1),
            ("diameter", self.diameter),
            ("delta_theta_pitch_over", self.delta_theta_pitch_over),
            ("xi", self.xi),
            ("delta_theta_exoatmos", self.delta_theta_exoatmos),
            ("theta_f", self.theta_f),
            ("duration_exoatmos_a", self.duration_exoatmos_a),
            ("duration_exoatmos_b", self.duration_exoatmos_b),
        ]
    }

    pub fn point(&self) -> DesignPoint {
        DesignPoint {
            p_c_1: self.p_c_1.value,
            p_c_2: self.p_c_2.value,
            p_e_1: self.p_e_1.value,
            p_e_2: self.p_e_2.value,
            o_f_1: self.o_f_1.value,
            o_f_2: self.o_f_2.value,
            thrust_1: self.thrust_1.value,
            thrust_2: self.thrust_2.value,
            mp_1: self.mp_1.value,
            mp_2: self.mp_2.value,
            max_n_f_1: self.max_n_f_1.value,
            max_q_dyn_1: self.max_q_dyn_1.value,
            diameter: self.diameter.value,
            delta_theta_pitch_over: self.delta_theta_pitch_over.value,
            xi: self.xi.value,
            delta_theta_exoatmos: self.delta_theta_exoatmos.value,
            theta_f: self.theta_f.value,
            duration_exoatmos_a: self.duration_exoatmos_a.value,
            duration_exoatmos_b: self.duration_exoatmos_b.value,
        }
    }

    /// Bounds paired with the values of `p`.
    pub fn bounds_of(&self, p: &DesignPoint) -> Vec<(&'static str, Bounded)> {
        let values = [
            p.p_c_1,
            p.p_c_2,
            p.p_e_1,
            p.p_e_2,
            p.o_f_1,
            p.o_f_2,
            p.thrust_1,
            p.thrust_2,
            p.mp_1,
            p.mp_2,
            p.max_n_f_1,
            p.max_q_dyn_1,
            p.diameter,
            p.delta_theta_pitch_over,
            p.xi,
            p.delta_theta_exoatmos,
            p.theta_f,
            p.duration_exoatmos_a,
            p.duration_exoatmos_b,
        ];
        self.entries()
            .into_iter()
            .zip(values)
            .map(|((name, b), value)| (name, Bounded { value, ..b }))
            .collect()
    }

    /// Variables of `p` lying outside their bounds, with the distance.
    pub fn violations(&self, p: &DesignPoint) -> Vec<(&'static str, f64)> {
        self.bounds_of(p)
            .into_iter()
            .filter_map(|(name, b)| {
                let v = b.violation();
                (v > 0.0 || v.is_nan()).then_some((name, v))
            })
            .collect()
    }

    /// Inverted bounds are a configuration error; out-of-bound values are not.
    pub fn validate(&self) -> Result<()> {
        for (name, b) in self.entries() {
            if !(b.lower <= b.upper) {
                return Err(MdoError::InvalidConfig(format!(
                    "design variable '{name}': lower {} above upper {}",
                    b.lower, b.upper
                )));
            }
        }
        Ok(())
    }
}
