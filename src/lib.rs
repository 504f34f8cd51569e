//! Physics core of a two-stage-to-orbit launch-vehicle MDO problem.
//!
//! Every discipline is a [`jacobian::Component`] with analytic partials:
//! aero and gravity (`physics`), the planar equations of motion
//! (`dynamics`), steering (`gnc`), chemistry and nozzles (`propulsion`),
//! dry-mass regressions (`sizing`), insertion orbit (`orbital`) and the
//! coupling checks between them (`coupling`). [`model::MdoModel`] wires
//! them into one evaluation of objective and constraints.

pub mod config;
pub mod coupling;
pub mod design;
pub mod dynamics;
pub mod error;
mod gnc_mod;
pub mod interp;
pub mod io;
pub mod jacobian;
pub mod model;
pub mod orbital;
pub mod physics;
pub mod propulsion;
pub mod sim;
pub mod sizing;
pub mod trajectory;
pub mod vehicle;

// The gnc module: expose gnc_mod as `gnc` publicly
pub mod gnc {
    pub use crate::gnc_mod::*;
}

pub use config::MdoConfig;
pub use error::{MdoError, Result};
pub use model::{Evaluation, MdoModel};
