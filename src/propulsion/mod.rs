//! Liquid-engine performance: combustion table, ideal-rocket chemistry and
//! nozzle sizing. Evaluated once per design point, never per node.

pub mod cea;
pub mod chemistry;
pub mod nozzle;
pub mod stage;

pub use cea::{CeaGrid, CeaTable, Combustion, RocketCea};
pub use chemistry::{AreaRatio, CharacteristicVelocity, ChemistryOptions, SpecificImpulse, ThrustCoefficient};
pub use nozzle::{MassFlowRate, NozzleExitArea, ThroatArea};
pub use stage::{EngineDesign, PropulsionStage, StagePerformance};
