//! Precomputed combustion-chemistry table and its bicubic lookup.

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::error::{MdoError, Result};
use crate::interp::Bicubic;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Table shipped with the crate (LOX/RP-1, frozen at the throat).
pub const DEFAULT_TABLE: &str = include_str!("../../data/cea_table.txt");

const ROWS_PER_POINT: usize = 3; // chamber, throat, exit
const COLUMNS: usize = 5; // gamma mw T p isp
const BAR: f64 = 1e5; // Pa

/// Axes of the table: mixture ratio (outer loop) by chamber pressure in bar
/// (inner loop).
#[derive(Debug, Clone, PartialEq)]
pub struct CeaGrid {
    pub o_f: Vec<f64>,
    pub p_c_bar: Vec<f64>,
}

impl Default for CeaGrid {
    fn default() -> Self {
        CeaGrid {
            o_f: (0..13).map(|i| 1.6 + 0.2 * i as f64).collect(),
            p_c_bar: (0..12).map(|j| 60.0 + 10.0 * j as f64).collect(),
        }
    }
}

/// Lookup result with gradients per input. Pressure derivatives are per Pa.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Combustion {
    pub gamma_t: f64,
    pub tc: f64, // K
    pub mc: f64, // kg/kmol
    pub dgamma_t_dpc: f64,
    pub dgamma_t_dof: f64,
    pub dtc_dpc: f64,
    pub dtc_dof: f64,
    pub dmc_dpc: f64,
    pub dmc_dof: f64,
}

/// Isentropic exponent at the throat, chamber temperature and molecular
/// mass over `(o_f, P_c)`. Read-only once built; share it with [`Arc`].
#[derive(Debug, Clone)]
pub struct CeaTable {
    grid: CeaGrid,
    gamma_t: Bicubic,
    tc: Bicubic,
    mc: Bicubic,
}

impl CeaTable {
    /// Parse whitespace-delimited rows `gamma mw T p isp`. A non-numeric first
    /// line is taken as a header; blank lines are skipped.
    pub fn parse(text: &str, grid: CeaGrid) -> Result<Self> {
        let mut rows: Vec<[f64; COLUMNS]> = Vec::new();
        for (k, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            let parsed: std::result::Result<Vec<f64>, _> = fields.iter().map(|f| f.parse::<f64>()).collect();
            let values = match parsed {
                Ok(v) => v,
                Err(_) if rows.is_empty() && k == 0 => continue,
                Err(e) => return Err(MdoError::CeaTable { line: k + 1, reason: e.to_string() }),
            };
            if values.len() != COLUMNS {
                return Err(MdoError::CeaTable {
                    line: k + 1,
                    reason: format!("expected {COLUMNS} columns, found {}", values.len()),
                });
            }
            rows.push([values[0], values[1], values[2], values[3], values[4]]);
        }

        let points = grid.o_f.len() * grid.p_c_bar.len();
        if rows.len() != ROWS_PER_POINT * points {
            return Err(MdoError::TableShape { expected: ROWS_PER_POINT * points, found: rows.len() });
        }

        // chamber row carries mc and tc, throat row carries gamma_t
        let chamber = |col: usize| -> Vec<f64> { rows.chunks(ROWS_PER_POINT).map(|p| p[0][col]).collect() };
        let gamma_t: Vec<f64> = rows.chunks(ROWS_PER_POINT).map(|p| p[1][0]).collect();

        let table = CeaTable {
            gamma_t: Bicubic::new(&grid.o_f, &grid.p_c_bar, &gamma_t)?,
            mc: Bicubic::new(&grid.o_f, &grid.p_c_bar, &chamber(1))?,
            tc: Bicubic::new(&grid.o_f, &grid.p_c_bar, &chamber(2))?,
            grid,
        };
        info!(
            "combustion table loaded: {} mixture ratios x {} chamber pressures",
            table.grid.o_f.len(),
            table.grid.p_c_bar.len()
        );
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, CeaGrid::default())
    }

    /// The LOX/RP-1 table bundled with the crate.
    pub fn bundled() -> Result<Self> {
        Self::parse(DEFAULT_TABLE, CeaGrid::default())
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn grid(&self) -> &CeaGrid {
        &self.grid
    }

    /// Bicubic lookup; queries outside the grid extrapolate.
    pub fn lookup(&self, p_c: f64, o_f: f64) -> Result<Combustion> {
        let p_bar = p_c / BAR;
        let g = self.gamma_t.sample(o_f, p_bar)?;
        let t = self.tc.sample(o_f, p_bar)?;
        let m = self.mc.sample(o_f, p_bar)?;
        Ok(Combustion {
            gamma_t: g.value,
            tc: t.value,
            mc: m.value,
            dgamma_t_dpc: g.dy / BAR,
            dgamma_t_dof: g.dx,
            dtc_dpc: t.dy / BAR,
            dtc_dof: t.dx,
            dmc_dpc: m.dy / BAR,
            dmc_dof: m.dx,
        })
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// `(P_c, o_f) -> (gamma_t, tc, mc)` through the shared table.
#[derive(Debug, Clone)]
pub struct RocketCea {
    pub table: Arc<CeaTable>,
}

impl Component for RocketCea {
    fn name(&self) -> &str {
        "rocket_cea"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("P_c", "Pa"), PortSpec::scalar("o_f", "")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("gamma_t", ""),
            PortSpec::scalar("tc", "K"),
            PortSpec::scalar("mc", "kg/kmol"),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        ["gamma_t", "tc", "mc"]
            .into_iter()
            .fold(SparsityTemplate::new(), |t, of| t.declare_all(of, &["P_c", "o_f"], Pattern::Single))
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let c = self
            .table
            .lookup(inputs.scalar(self.name(), "P_c")?, inputs.scalar(self.name(), "o_f")?)?;
        Ok(Values::new()
            .with_scalar("gamma_t", c.gamma_t)
            .with_scalar("tc", c.tc)
            .with_scalar("mc", c.mc))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let c = self
            .table
            .lookup(inputs.scalar(self.name(), "P_c")?, inputs.scalar(self.name(), "o_f")?)?;
        p.set("gamma_t", "P_c", 0, c.dgamma_t_dpc);
        p.set("gamma_t", "o_f", 0, c.dgamma_t_dof);
        p.set("tc", "P_c", 0, c.dtc_dpc);
        p.set("tc", "o_f", 0, c.dtc_dof);
        p.set("mc", "P_c", 0, c.dmc_dpc);
        p.set("mc", "o_f", 0, c.dmc_dof);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    #[test]
    fn bundled_table_parses() {
        let table = CeaTable::bundled().unwrap();
        assert_eq!(table.grid().o_f.len(), 13);
        assert_eq!(table.grid().p_c_bar.len(), 12);
    }

    #[test]
    fn grid_points_are_reproduced() {
        let table = CeaTable::bundled().unwrap();
        // o_f = 2.4 is the fifth mixture ratio, 100 bar the fifth pressure
        let c = table.lookup(100.0e5, 2.4).unwrap();
        let row = DEFAULT_TABLE
            .lines()
            .skip(1)
            .skip(3 * (4 * 12 + 4))
            .take(2)
            .map(|l| l.split_whitespace().map(|f| f.parse::<f64>().unwrap()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        assert!((c.gamma_t - row[1][0]).abs() < 1e-9, "gamma_t {}", c.gamma_t);
        assert!((c.mc - row[0][1]).abs() < 1e-9, "mc {}", c.mc);
        assert!((c.tc - row[0][2]).abs() < 1e-6, "tc {}", c.tc);
    }

    #[test]
    fn malformed_line_is_reported() {
        let text = "gamma mw T p isp\n1.2 20.0 3000 60 0\n1.2 oops 3000 60 0\n";
        match CeaTable::parse(text, CeaGrid::default()) {
            Err(MdoError::CeaTable { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn short_table_is_a_shape_error() {
        let text = "1.2 20.0 3000 60 0\n1.25 20.0 2700 35 160\n1.28 20.1 1200 0.5 290\n";
        assert!(matches!(
            CeaTable::parse(text, CeaGrid::default()),
            Err(MdoError::TableShape { expected: 468, found: 3 })
        ));
    }

    #[test]
    fn lookup_partials_match_finite_differences() {
        let comp = RocketCea { table: CeaTable::bundled().unwrap().shared() };
        for (pc, of) in [(9.99992e6, 2.3133), (7.3e6, 3.1), (6.2e6, 1.9)] {
            let inputs = Values::new().with_scalar("P_c", pc).with_scalar("o_f", of);
            for c in check_partials(&comp, &inputs, 1e-6).unwrap() {
                assert!(c.passes(1e-5), "{:?}", c);
            }
        }
    }
}
