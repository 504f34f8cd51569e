//! Forward shooting: integrate every phase right-hand side from lift-off to
//! the end of the second burn to get a dynamically consistent guess.

use std::f64::consts::FRAC_PI_2;

use log::{debug, info};

use super::event::{AltitudeDetector, ApogeeDetector, EventDetector, EventKind, SimEvent};
use super::integrator::{propagate, rk4_step};
use crate::design::DesignPoint;
use crate::dynamics::eom::{rates, Loads};
use crate::dynamics::state::{Deriv, Earth, State};
use crate::error::{MdoError, Result};
use crate::jacobian::Values;
use crate::model::{Disciplines, MdoModel};
use crate::trajectory::{PhaseGuess, PhaseKind, PhaseOde, PhaseParams, StateHistory, TrajectoryGuess, RATES};

/// Altitude whose first crossing goes in the shot's event log.
pub const SPACE_ALTITUDE: f64 = 100e3; // m

// ---------------------------------------------------------------------------
// Shot plan
// ---------------------------------------------------------------------------

/// Design point and phase durations of one forward shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotPlan {
    pub design: DesignPoint,
    pub durations: [f64; 8], // s, flight order
    pub max_step: f64,       // s
}

impl ShotPlan {
    /// The reference ascent: fixed endoatmospheric phase lengths, the first
    /// stage burnt to depletion in `gravity_turn_b`, and steering settings
    /// that reach orbit without an optimizer.
    pub fn reference(model: &MdoModel) -> Result<Self> {
        let design = DesignPoint {
            delta_theta_pitch_over: 0.1243,
            xi: -0.2585,
            delta_theta_exoatmos: -0.5012,
            theta_f: -0.0584,
            ..model.config().design.point()
        };
        let disciplines = model.disciplines(&design)?;
        let burn_1 = design.mp_1 / disciplines.stage_1.mfr_max;
        let durations = [
            6.0,
            10.0,
            10.0,
            40.0,
            burn_1 - 66.0,
            10.0,
            design.duration_exoatmos_a,
            design.duration_exoatmos_b,
        ];
        Ok(ShotPlan { design, durations, max_step: 0.25 })
    }

    pub fn duration(&self, kind: PhaseKind) -> f64 {
        self.durations[kind.index()]
    }

    /// Lift-off mass: both stages fully loaded, fairing and payload.
    pub fn initial_mass(&self, disciplines: &Disciplines, mplf: f64, md: f64) -> f64 {
        self.design.mp_1 + disciplines.ms_1 + self.design.mp_2 + disciplines.ms_2 + mplf + md
    }
}

/// Result of a forward shot.
#[derive(Debug, Clone)]
pub struct Shot {
    pub guess: TrajectoryGuess,
    pub events: Vec<SimEvent>,
    /// State at the end of the second burn.
    pub final_state: State,
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

/// Single-node right-hand side of one phase.
struct NodeRhs<'a> {
    ode: PhaseOde,
    params: &'a PhaseParams,
}

impl NodeRhs<'_> {
    fn outputs(&self, t: f64, s: &State) -> Result<Values> {
        self.ode.evaluate(&StateHistory::from_states(&[*s]), &[t], self.params)
    }

    fn deriv(&self, t: f64, s: &State) -> Result<Deriv> {
        let out = self.outputs(t, s)?;
        let rate = |name: &str| out.first(name).unwrap_or(f64::NAN);
        Ok(Deriv {
            r_dot: rate(RATES[0]),
            lambda_dot: rate(RATES[1]),
            v_dot: rate(RATES[2]),
            phi_dot: rate(RATES[3]),
            m_dot: rate(RATES[4]),
        })
    }
}

/// Shoot the whole ascent and sample it on the model's phase grids.
pub fn shoot(model: &MdoModel, plan: &ShotPlan) -> Result<Shot> {
    let earth = model.earth();
    let design = &plan.design;
    let disciplines = model.disciplines(design)?;
    let vehicle = &model.config().vehicle;

    let mut state = State {
        r: earth.r0,
        lambda: 0.0,
        v: 1e-3,
        phi: FRAC_PI_2,
        m: plan.initial_mass(&disciplines, vehicle.mplf, vehicle.md),
    };
    let mut t0 = 0.0;
    let mut theta_gt = f64::NAN;
    let mut phases = Vec::with_capacity(PhaseKind::ALL.len());
    let mut events = Vec::new();
    let mut space = AltitudeDetector::new(earth.r0, SPACE_ALTITUDE, true);

    for kind in PhaseKind::ALL {
        let duration = plan.duration(kind);
        if !(duration > 0.0) {
            return Err(MdoError::GuessMismatch {
                phase: kind.to_string(),
                reason: format!("shot duration {duration} is not positive"),
            });
        }
        events.push(SimEvent { time: t0, kind: EventKind::PhaseStart(kind), state });

        let params = model.phase_params(kind, design, &disciplines, duration, theta_gt);
        let rhs = NodeRhs { ode: PhaseOde::new(kind, 1, earth)?, params: &params };
        let times = model.layout().grid(kind).times(0.0, duration);

        let mut samples = vec![state];
        for w in times.windows(2) {
            let prev = state;
            state = propagate(&state, w[0], w[1], plan.max_step, |t, s| rhs.deriv(t, s))?;
            if let Some(event) = space.check(&prev, &state) {
                events.push(SimEvent { time: t0 + w[1], kind: event, state });
            }
            samples.push(state);
        }
        debug!("shot {kind}: {:.1} s, h = {:.0} m, v = {:.0} m/s", duration, earth.altitude(state.r), state.v);

        if kind == PhaseKind::GravityTurnC {
            theta_gt = rhs.outputs(duration, &state)?.first("theta").unwrap_or(f64::NAN);
        }
        phases.push(PhaseGuess {
            phase: kind,
            t_initial: t0,
            t_duration: duration,
            states: StateHistory::from_states(&samples),
        });
        t0 += duration;

        let dropped = match kind {
            PhaseKind::GravityTurnB => disciplines.ms_1,
            PhaseKind::ExoatmosA => vehicle.mplf,
            _ => 0.0,
        };
        if dropped > 0.0 {
            state.m -= dropped;
            events.push(SimEvent { time: t0, kind: EventKind::Jettison { mass: dropped }, state });
        }
    }
    events.push(SimEvent { time: t0, kind: EventKind::Burnout, state });
    info!(
        "forward shot: {:.1} s, h = {:.1} km, v = {:.0} m/s, m = {:.0} kg",
        t0,
        earth.altitude(state.r) / 1e3,
        state.v,
        state.m
    );

    Ok(Shot { guess: TrajectoryGuess { design: *design, phases }, events, final_state: state })
}

// ---------------------------------------------------------------------------
// Coast
// ---------------------------------------------------------------------------

/// Unpowered drag-free rates: no thrust, no mass flow, pitch along the
/// velocity.
pub fn coast_rates(earth: &Earth, s: &State) -> Deriv {
    let loads = Loads { thrust: 0.0, mfr: 0.0, theta: s.phi, drag: 0.0, g: earth.gravity(s.r) };
    rates(earth, s, &loads).0
}

/// Coast from `start` until apogee or `max_time`, whichever comes first.
/// Returns the sampled states and the apogee event if it was reached.
pub fn coast(earth: &Earth, start: &State, dt: f64, max_time: f64) -> Result<(Vec<State>, Option<SimEvent>)> {
    let mut detector = ApogeeDetector;
    let mut states = vec![*start];
    let mut t = 0.0;
    while t < max_time {
        let prev = states[states.len() - 1];
        let next = rk4_step(&prev, t, dt, |_, s| Ok(coast_rates(earth, s)))?;
        t += dt;
        states.push(next);
        if let Some(kind) = detector.check(&prev, &next) {
            return Ok((states, Some(SimEvent { time: t, kind, state: next })));
        }
    }
    Ok((states, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MdoConfig;

    #[test]
    fn reference_plan_burns_the_first_stage() {
        let model = MdoModel::new(&MdoConfig::default()).unwrap();
        let plan = ShotPlan::reference(&model).unwrap();
        let d = model.disciplines(&plan.design).unwrap();
        let burn: f64 = plan.durations[..5].iter().sum();
        assert!((burn * d.stage_1.mfr_max - plan.design.mp_1).abs() < 1e-6);
        assert!(plan.duration(PhaseKind::GravityTurnB) > 1.0);
    }

    #[test]
    fn coast_reaches_apogee_with_constant_mass() {
        let earth = Earth::default();
        let start = State { r: earth.r0 + 200e3, lambda: 0.0, v: 7_000.0, phi: 0.05, m: 15e3 };
        let (states, apogee) = coast(&earth, &start, 1.0, 3_000.0).unwrap();
        let apogee = apogee.expect("coast should pass apogee");
        assert_eq!(apogee.kind, EventKind::Apogee);
        assert!(apogee.state.r > start.r);
        assert!(states.iter().all(|s| s.m == start.m));
    }
}
