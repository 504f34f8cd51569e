//! Files in and out: the persisted initial guess, evaluation summaries and
//! the per-node timeseries export.

pub mod csv;
pub mod json;

pub use self::csv::{read_timeseries, timeseries, write_timeseries, write_timeseries_file, TimeseriesRow};
pub use self::json::{load_guess, read_guess, save_guess, write_guess, write_summary, EvaluationSummary};
