use crate::dynamics::state::{Deriv, State};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Planar RK4 integrator
// ---------------------------------------------------------------------------

/// Single RK4 step of a time-dependent right-hand side `f(t, state)`.
///
/// Steering laws depend on the phase clock, so the intermediate stages are
/// evaluated at `t + dt/2` and `t + dt`.
pub fn rk4_step<F>(state: &State, t: f64, dt: f64, mut f: F) -> Result<State>
where
    F: FnMut(f64, &State) -> Result<Deriv>,
{
    let k1 = f(t, state)?;
    let k2 = f(t + dt * 0.5, &state.apply(&k1, dt * 0.5))?;
    let k3 = f(t + dt * 0.5, &state.apply(&k2, dt * 0.5))?;
    let k4 = f(t + dt, &state.apply(&k3, dt))?;
    Ok(state.apply(&Deriv::blend(&k1, &k2, &k3, &k4), dt))
}

/// Integrate from `t0` to `t1` in equal steps no longer than `max_step`.
pub fn propagate<F>(state: &State, t0: f64, t1: f64, max_step: f64, mut f: F) -> Result<State>
where
    F: FnMut(f64, &State) -> Result<Deriv>,
{
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(*state);
    }
    let steps = (span / max_step).ceil().max(1.0) as usize;
    let dt = span / steps as f64;
    let mut s = *state;
    for k in 0..steps {
        s = rk4_step(&s, t0 + k as f64 * dt, dt, &mut f)?;
    }
    Ok(s)
}
