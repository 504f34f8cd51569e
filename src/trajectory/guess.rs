use serde::{Deserialize, Serialize};

use super::phase::{Grid, PhaseKind};
use super::TrajectoryLayout;
use crate::design::DesignPoint;
use crate::dynamics::state::{Earth, State};
use crate::error::{MdoError, Result};

const DEG: f64 = std::f64::consts::PI / 180.0;

// ---------------------------------------------------------------------------
// State history of one phase
// ---------------------------------------------------------------------------

/// Per-node state arrays, stored column-wise the way the transcription and
/// the guess file expect them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    pub r: Vec<f64>,
    pub lambda: Vec<f64>,
    pub v: Vec<f64>,
    pub phi: Vec<f64>,
    pub m: Vec<f64>,
}

impl StateHistory {
    pub fn from_states(states: &[State]) -> Self {
        let column = |f: fn(&State) -> f64| -> Vec<f64> { states.iter().map(f).collect() };
        StateHistory {
            r: column(|s| s.r),
            lambda: column(|s| s.lambda),
            v: column(|s| s.v),
            phi: column(|s| s.phi),
            m: column(|s| s.m),
        }
    }

    /// `n` nodes evenly spaced between two states.
    pub fn linear(a: &State, b: &State, n: usize) -> Self {
        let (a, b) = (a.as_array(), b.as_array());
        let states: Vec<State> = (0..n)
            .map(|i| {
                let s = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                let mut x = [0.0; 5];
                for k in 0..5 {
                    x[k] = a[k] + s * (b[k] - a[k]);
                }
                State::from_array(x)
            })
            .collect();
        StateHistory::from_states(&states)
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Column by state name; unknown names give an empty slice.
    pub fn get(&self, name: &str) -> &[f64] {
        match name {
            "r" => self.r.as_slice(),
            "lambda" => self.lambda.as_slice(),
            "v" => self.v.as_slice(),
            "phi" => self.phi.as_slice(),
            "m" => self.m.as_slice(),
            _ => &[],
        }
    }

    pub fn state(&self, i: usize) -> State {
        State { r: self.r[i], lambda: self.lambda[i], v: self.v[i], phi: self.phi[i], m: self.m[i] }
    }

    pub fn first(&self) -> Option<State> {
        (!self.is_empty()).then(|| self.state(0))
    }

    pub fn last(&self) -> Option<State> {
        self.len().checked_sub(1).map(|i| self.state(i))
    }

    /// Linear resampling onto `n` evenly spaced nodes.
    pub fn resample(&self, n: usize) -> Self {
        let len = self.len();
        if len == n || len < 2 {
            return self.clone();
        }
        let states: Vec<State> = (0..n)
            .map(|i| {
                let x = i as f64 / (n - 1).max(1) as f64 * (len - 1) as f64;
                let k = (x.floor() as usize).min(len - 2);
                let s = x - k as f64;
                let (a, b) = (self.state(k).as_array(), self.state(k + 1).as_array());
                let mut y = [0.0; 5];
                for j in 0..5 {
                    y[j] = a[j] + s * (b[j] - a[j]);
                }
                State::from_array(y)
            })
            .collect();
        StateHistory::from_states(&states)
    }

    fn columns(&self) -> [(&'static str, &[f64]); 5] {
        State::NAMES.map(|name| (name, self.get(name)))
    }
}

// ---------------------------------------------------------------------------
// Trajectory guess
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseGuess {
    pub phase: PhaseKind,
    pub t_initial: f64,  // s
    pub t_duration: f64, // s
    pub states: StateHistory,
}

impl PhaseGuess {
    /// Phase-local node times for `grid`.
    pub fn local_times(&self, grid: &Grid) -> Vec<f64> {
        grid.times(0.0, self.t_duration)
    }

    pub fn t_final(&self) -> f64 {
        self.t_initial + self.t_duration
    }
}

/// Design parameters and per-phase state histories seeding one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryGuess {
    pub design: DesignPoint,
    pub phases: Vec<PhaseGuess>,
}

impl TrajectoryGuess {
    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseGuess> {
        self.phases.iter().find(|p| p.phase == kind)
    }

    /// Fails on a phase list out of flight order, a node count that does not
    /// match the grid, ragged state columns or a non-positive mass.
    pub fn check(&self, layout: &TrajectoryLayout) -> Result<()> {
        let order: Vec<PhaseKind> = self.phases.iter().map(|p| p.phase).collect();
        if order != PhaseKind::ALL {
            return Err(MdoError::GuessMismatch {
                phase: order.first().map_or("-".to_string(), |p| p.to_string()),
                reason: format!("phases {order:?} are not the eight ascent phases in flight order"),
            });
        }
        for p in &self.phases {
            let mismatch = |reason: String| MdoError::GuessMismatch { phase: p.phase.to_string(), reason };
            let n = layout.grid(p.phase).num_nodes();
            for (name, col) in p.states.columns() {
                if col.len() != n {
                    return Err(mismatch(format!("'{name}' has {} nodes, grid has {n}", col.len())));
                }
            }
            if p.states.m.iter().any(|m| !(*m > 0.0)) {
                return Err(mismatch("mass must stay positive".to_string()));
            }
            if !(p.t_duration > 0.0) {
                return Err(mismatch(format!("duration {} is not positive", p.t_duration)));
            }
        }
        Ok(())
    }

    /// Copy with every phase resampled onto `layout`.
    pub fn regrid(&self, layout: &TrajectoryLayout) -> Self {
        let phases = self
            .phases
            .iter()
            .map(|p| PhaseGuess { states: p.states.resample(layout.grid(p.phase).num_nodes()), ..p.clone() })
            .collect();
        TrajectoryGuess { design: self.design, phases }
    }
}

// ---------------------------------------------------------------------------
// Manual seeding
// ---------------------------------------------------------------------------

/// Endpoint values of the hand-made guess, per phase:
/// `(r − r0 at start, at end, v, v, λ, λ, φ°, φ°, m, m, t_initial, duration)`.
const MANUAL: [[f64; 12]; 8] = [
    [0.0, 300.0, 1e-3, 60.0, 0.0, 1e-8, 90.0, 90.0, 400e3, 380e3, 0.0, 10.0],
    [300.0, 1_000.0, 60.0, 100.0, 1e-8, 5e-8, 90.0, 88.0, 380e3, 360e3, 10.0, 10.0],
    [1_000.0, 2_000.0, 100.0, 200.0, 5e-8, 1e-7, 88.0, 78.0, 360e3, 330e3, 20.0, 10.0],
    [2_000.0, 30_000.0, 200.0, 2_000.0, 1e-7, 1e-5, 78.0, 60.0, 330e3, 270e3, 30.0, 40.0],
    [30_000.0, 60_000.0, 2e3, 3e3, 1e-5, 1e-4, 60.0, 30.0, 270e3, 180e3, 70.0, 70.0],
    [60_000.0, 61_000.0, 3e3, 3.1e3, 1e-4, 1e-3, 30.0, 29.0, 180e3, 175e3, 140.0, 10.0],
    [61_000.0, 90_000.0, 3.1e3, 5e3, 1e-3, 1e-2, 29.0, 20.0, 150e3, 120e3, 150.0, 50.0],
    [90_000.0, 160_000.0, 5e3, 8e3, 1e-2, 0.2, 20.0, 0.0, 118e3, 20e3, 200.0, 230.0],
];

/// Straight-line states between hand-picked endpoints for every phase.
/// The exoatmospheric durations of `design` are replaced by the manual
/// ones so the guess stays self-consistent.
pub fn manual_guess(earth: &Earth, layout: &TrajectoryLayout, design: &DesignPoint) -> TrajectoryGuess {
    let phases = PhaseKind::ALL
        .into_iter()
        .zip(MANUAL)
        .map(|(phase, row)| {
            let a = State { r: earth.r0 + row[0], lambda: row[4], v: row[2], phi: row[6] * DEG, m: row[8] };
            let b = State { r: earth.r0 + row[1], lambda: row[5], v: row[3], phi: row[7] * DEG, m: row[9] };
            PhaseGuess {
                phase,
                t_initial: row[10],
                t_duration: row[11],
                states: StateHistory::linear(&a, &b, layout.grid(phase).num_nodes()),
            }
        })
        .collect();
    let design = DesignPoint { duration_exoatmos_a: MANUAL[6][11], duration_exoatmos_b: MANUAL[7][11], ..*design };
    TrajectoryGuess { design, phases }
}
