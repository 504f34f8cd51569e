use std::io::{Read, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::dynamics::state::Earth;
use crate::error::Result;
use crate::model::Evaluation;
use crate::trajectory::{PhaseKind, TrajectoryGuess, TrajectoryLayout};

// ---------------------------------------------------------------------------
// Persisted initial guess
// ---------------------------------------------------------------------------

pub fn write_guess<W: Write>(writer: W, guess: &TrajectoryGuess) -> Result<()> {
    serde_json::to_writer_pretty(writer, guess)?;
    Ok(())
}

pub fn read_guess<R: Read>(reader: R) -> Result<TrajectoryGuess> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn save_guess(path: impl AsRef<Path>, guess: &TrajectoryGuess) -> Result<()> {
    let path = path.as_ref();
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_guess(&mut writer, guess)?;
    writer.flush()?;
    info!("initial guess written to {}", path.display());
    Ok(())
}

/// Load a guess and check it against the phase grids of `layout`.
pub fn load_guess(path: impl AsRef<Path>, layout: &TrajectoryLayout) -> Result<TrajectoryGuess> {
    let guess = read_guess(std::io::BufReader::new(std::fs::File::open(path)?))?;
    guess.check(layout)?;
    Ok(guess)
}

// ---------------------------------------------------------------------------
// Evaluation summary
// ---------------------------------------------------------------------------

/// Headline numbers of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub lift_off_mass: f64,     // kg
    pub final_altitude: f64,    // m
    pub final_speed: f64,       // m/s
    pub apogee_altitude: f64,   // m
    pub perigee_altitude: f64,  // m
    pub m_final: f64,           // kg
    pub max_q_dyn: f64,         // Pa
    pub max_violation: f64,
    pub worst_constraint: Option<String>,
    pub design_violations: usize,
}

impl EvaluationSummary {
    pub fn from_evaluation(earth: &Earth, eval: &Evaluation) -> Self {
        let exo_b = eval.phase(PhaseKind::ExoatmosB);
        let end = exo_b.and_then(|p| p.states.last());
        let last = |name: &str| exo_b.map_or(f64::NAN, |p| p.last_output(name));
        EvaluationSummary {
            lift_off_mass: eval.objective,
            final_altitude: end.map_or(f64::NAN, |s| earth.altitude(s.r)),
            final_speed: end.map_or(f64::NAN, |s| s.v),
            apogee_altitude: earth.altitude(last("ra")),
            perigee_altitude: earth.altitude(last("rp")),
            m_final: eval.coupling.m_final,
            max_q_dyn: eval.max_q_dyn(),
            max_violation: eval.feasibility.max_violation,
            worst_constraint: eval.feasibility.worst.clone(),
            design_violations: eval.feasibility.design_violations.len(),
        }
    }
}

pub fn write_summary<W: Write>(writer: W, summary: &EvaluationSummary) -> Result<()> {
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}
