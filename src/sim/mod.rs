pub mod event;
pub mod integrator;
pub mod shooting;

pub use event::{AltitudeDetector, ApogeeDetector, EventDetector, EventKind, SimEvent};
pub use integrator::{propagate, rk4_step};
pub use shooting::{coast, coast_rates, shoot, Shot, ShotPlan, SPACE_ALTITUDE};
