use serde::{Deserialize, Serialize};

use super::guess::StateHistory;
use super::phase::PhaseKind;
use crate::dynamics::state::Earth;
use crate::jacobian::Values;
use crate::model::Constraint;

/// Orbit and aero limits the ascent must meet, as altitudes above `r0`
/// where they concern a radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub lift_off_altitude: (f64, f64), // m, end of lift-off
    pub apogee_altitude: (f64, f64),   // m
    pub perigee_altitude_min: f64,     // m
    pub q_dot_gravity_turn: f64,       // Pa/s, end of gravity_turn
    pub q_dyn_max_gravity_turn_c: f64, // Pa
    pub q_heat_max_exoatmos_a: f64,    // W/m²
}

impl Default for Targets {
    fn default() -> Self {
        Targets {
            lift_off_altitude: (150.0, 2_000.0),
            apogee_altitude: (400e3, 420e3),
            perigee_altitude_min: 145e3,
            q_dot_gravity_turn: 0.0,
            q_dyn_max_gravity_turn_c: 1e3,
            q_heat_max_exoatmos_a: 1_135.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Initial,
    Final,
}

/// Bound on a state or ODE output at one end of a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConstraint {
    pub phase: PhaseKind,
    pub var: &'static str,
    pub location: Location,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl BoundaryConstraint {
    pub fn name(&self) -> String {
        let at = match self.location {
            Location::Initial => "initial",
            Location::Final => "final",
        };
        format!("{}.{}.{}", self.phase, at, self.var)
    }

    /// Value from the state history when `var` is a state, otherwise from
    /// the phase ODE outputs. NaN when neither holds it.
    pub fn value(&self, states: &StateHistory, outputs: &Values) -> f64 {
        let column = match states.get(self.var) {
            [] => outputs.get(self.var).unwrap_or(&[]),
            col => col,
        };
        let pick = match self.location {
            Location::Initial => column.first(),
            Location::Final => column.last(),
        };
        pick.copied().unwrap_or(f64::NAN)
    }

    pub fn evaluate(&self, states: &StateHistory, outputs: &Values) -> Constraint {
        Constraint { name: self.name(), value: self.value(states, outputs), lower: self.lower, upper: self.upper }
    }
}

/// Boundary constraints of the ascent, in evaluation order.
pub fn boundary_constraints(earth: &Earth, t: &Targets) -> Vec<BoundaryConstraint> {
    let at_end = |phase, var, lower, upper| BoundaryConstraint { phase, var, location: Location::Final, lower, upper };
    vec![
        at_end(
            PhaseKind::LiftOff,
            "r",
            Some(earth.r0 + t.lift_off_altitude.0),
            Some(earth.r0 + t.lift_off_altitude.1),
        ),
        at_end(PhaseKind::GravityTurn, "q_dot", Some(t.q_dot_gravity_turn), Some(t.q_dot_gravity_turn)),
        at_end(PhaseKind::GravityTurnC, "q_dyn", None, Some(t.q_dyn_max_gravity_turn_c)),
        at_end(PhaseKind::ExoatmosA, "q_heat", None, Some(t.q_heat_max_exoatmos_a)),
        at_end(
            PhaseKind::ExoatmosB,
            "ra",
            Some(earth.r0 + t.apogee_altitude.0),
            Some(earth.r0 + t.apogee_altitude.1),
        ),
        at_end(PhaseKind::ExoatmosB, "rp", Some(earth.r0 + t.perigee_altitude_min), None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::state::State;

    #[test]
    fn states_take_precedence_over_outputs() {
        let earth = Earth::default();
        let list = boundary_constraints(&earth, &Targets::default());
        assert_eq!(list.len(), 6);
        assert_eq!(list[0].name(), "lift_off.final.r");

        let a = State { r: earth.r0, lambda: 0.0, v: 1e-3, phi: 1.57, m: 369e3 };
        let b = State { r: earth.r0 + 155.0, ..a };
        let states = StateHistory::linear(&a, &b, 3);
        let c = list[0].evaluate(&states, &Values::new());
        assert!((c.value - b.r).abs() < 1e-9);
        assert!(c.violation() == 0.0);

        let outputs = Values::new().with("q_dyn", vec![5e4, 2e3]);
        let q = list[2].evaluate(&states, &outputs);
        assert!((q.violation() - 1e3).abs() < 1e-9);
    }

    #[test]
    fn missing_output_reads_as_nan() {
        let c = boundary_constraints(&Earth::default(), &Targets::default())[3];
        assert!(c.value(&StateHistory::default(), &Values::new()).is_nan());
    }
}
