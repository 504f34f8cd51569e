pub mod insertion;
pub mod maneuvers;

pub use insertion::{
    add_orbital_parameters, insertion, ApogeeAndPerigee, DeltaV2, EccentricityAndMajorAxis, EnergyAndMomentum,
    FinalMass, Insertion, SpeedInertial,
};
pub use maneuvers::{circular_velocity, circularization, rocket_equation};
