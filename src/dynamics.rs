//! Planar rotating-Earth dynamics: state, equations of motion and the
//! per-node helpers that feed them (thrust losses, dynamic-pressure rate).

pub mod eom;
pub mod qdot;
pub mod state;
pub mod thrust;

pub use eom::{rates, Eom, Loads};
pub use qdot::QDot;
pub use state::{Deriv, Earth, State};
pub use thrust::ThrustLosses;
