pub mod stage;
pub mod tsto;

pub use stage::{Stage, StageBuilder};
pub use tsto::{presets, Tsto, TstoBuilder};
