pub mod guidance;
pub mod timing;

pub use guidance::{Guidance, GuidanceLaw, Pitch, PitchArgs, BLT_BASE};
pub use timing::{ExoSegment, ExoTiming};
