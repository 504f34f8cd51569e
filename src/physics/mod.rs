pub mod aerodynamics;
pub mod atmosphere;
pub mod gravity;

pub use aerodynamics::{DragCoefficient, DragForce, HeatFluxAndDynamicPressure, MachNumber};
pub use atmosphere::{Altitude, Atmos, Atmosphere};
pub use gravity::Gravity;
