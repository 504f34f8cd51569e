use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dynamics::state::Earth;
use crate::error::Result;
use crate::model::Evaluation;

/// One node of the exported timeseries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesRow {
    pub phase: String,
    pub time: f64,     // s
    pub r: f64,        // m
    pub lambda: f64,   // rad
    pub v: f64,        // m/s
    pub phi: f64,      // rad
    pub m: f64,        // kg
    pub theta: f64,    // rad
    pub altitude: f64, // m
    pub mach: f64,
    pub q_dyn: f64, // Pa
    pub n_f: f64,
}

/// Every node of every phase in flight order. Outputs a phase does not
/// produce are NaN.
pub fn timeseries(earth: &Earth, eval: &Evaluation) -> Vec<TimeseriesRow> {
    let mut rows = Vec::new();
    for p in &eval.phases {
        let output = |name: &str, i: usize| p.outputs.get(name).and_then(|col| col.get(i)).copied().unwrap_or(f64::NAN);
        for (i, &time) in p.times.iter().enumerate() {
            let s = p.states.state(i);
            rows.push(TimeseriesRow {
                phase: p.kind.to_string(),
                time,
                r: s.r,
                lambda: s.lambda,
                v: s.v,
                phi: s.phi,
                m: s.m,
                theta: output("theta", i),
                altitude: earth.altitude(s.r),
                mach: output("Mach", i),
                q_dyn: output("q_dyn", i),
                n_f: output("n_f", i),
            });
        }
    }
    rows
}

pub fn write_timeseries<W: Write>(writer: W, rows: &[TimeseriesRow]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_timeseries_file(path: impl AsRef<Path>, rows: &[TimeseriesRow]) -> Result<()> {
    write_timeseries(std::fs::File::create(path)?, rows)
}

pub fn read_timeseries<R: Read>(reader: R) -> Result<Vec<TimeseriesRow>> {
    let mut r = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in r.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(phase: &str, time: f64) -> TimeseriesRow {
        TimeseriesRow {
            phase: phase.into(),
            time,
            r: 6_378_135.0 + 100.0 * time,
            lambda: 0.0,
            v: 50.0 * time,
            phi: 1.5,
            m: 369e3 - 2_500.0 * time,
            theta: 1.5,
            altitude: 100.0 * time,
            mach: 0.15 * time,
            q_dyn: 1e3 * time,
            n_f: 1.3,
        }
    }

    #[test]
    fn csv_output_has_header_and_rows() {
        let rows = vec![row("lift_off", 0.0), row("lift_off", 3.0), row("pitch_over_linear", 6.0)];
        let mut buf = Vec::new();
        write_timeseries(&mut buf, &rows).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("phase,time,r,lambda,v,phi,m,theta,altitude,mach,q_dyn,n_f"));
        assert_eq!(lines.len(), 4); // header + 3 data rows

        let back = read_timeseries(output.as_bytes()).unwrap();
        assert_eq!(back[2].phase, "pitch_over_linear");
        assert!((back[1].q_dyn - 3e3).abs() < 1e-9);
    }
}
