//! Structural mass of both stages from propellant load, geometry and
//! flight loads.

pub mod geometry;
pub mod stages;
pub mod structure;

pub use geometry::{dome_surface, TankSizing, TankVolume};
pub use stages::{DryMassBreakdown, DryMassStageOne, DryMassStageTwo, SizingOptions, StageOneLoads};
pub use structure::{
    AddUpMass, AvionicsMass, EngineMass, InterstageMass, SingleEngineThrust, TankMass, ThrustFrameMass, TvcMass,
};
