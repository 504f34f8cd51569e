use crate::dynamics::state::State;
use crate::trajectory::PhaseKind;

// ---------------------------------------------------------------------------
// Flight events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    PhaseStart(PhaseKind),
    /// Dropped mass, kg.
    Jettison { mass: f64 },
    Burnout,
    Apogee,
    Altitude { altitude: f64, ascending: bool },
}

/// A discrete event met during propagation.
#[derive(Debug, Clone)]
pub struct SimEvent {
    pub time: f64,
    pub kind: EventKind,
    pub state: State,
}

/// Passive detectors comparing consecutive states.
pub trait EventDetector {
    fn check(&mut self, prev: &State, current: &State) -> Option<EventKind>;
}

/// Radial speed `v·sin φ` going from positive to non-positive.
pub struct ApogeeDetector;

impl EventDetector for ApogeeDetector {
    fn check(&mut self, prev: &State, current: &State) -> Option<EventKind> {
        if prev.phi.sin() > 0.0 && current.phi.sin() <= 0.0 {
            Some(EventKind::Apogee)
        } else {
            None
        }
    }
}

/// Fires once when the altitude above `r0` crosses a threshold.
pub struct AltitudeDetector {
    pub r0: f64,
    pub altitude: f64,
    pub ascending: bool,
    fired: bool,
}

impl AltitudeDetector {
    pub fn new(r0: f64, altitude: f64, ascending: bool) -> Self {
        Self { r0, altitude, ascending, fired: false }
    }
}

impl EventDetector for AltitudeDetector {
    fn check(&mut self, prev: &State, current: &State) -> Option<EventKind> {
        if self.fired {
            return None;
        }
        let (h0, h1) = (prev.r - self.r0, current.r - self.r0);
        let crossed = if self.ascending {
            h0 < self.altitude && h1 >= self.altitude
        } else {
            h0 > self.altitude && h1 <= self.altitude
        };
        if crossed {
            self.fired = true;
            Some(EventKind::Altitude { altitude: self.altitude, ascending: self.ascending })
        } else {
            None
        }
    }
}
