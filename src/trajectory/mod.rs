//! The eight-phase ascent: grids, phase right-hand sides, links across
//! phase boundaries, boundary constraints and the initial guess.

pub mod boundary;
pub mod guess;
pub mod links;
pub mod ode;
pub mod phase;

pub use boundary::{boundary_constraints, BoundaryConstraint, Location, Targets};
pub use guess::{manual_guess, PhaseGuess, StateHistory, TrajectoryGuess};
pub use links::PhaseLink;
pub use ode::{max_scaled_defect, simpson_defects, PhaseOde, PhaseParams, RATES};
pub use phase::{Grid, PhaseKind};

use serde::{Deserialize, Serialize};

use crate::dynamics::state::Earth;
use crate::error::{MdoError, Result};

/// Segment counts of every phase grid, indexed by flight order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryLayout {
    pub segments: [usize; 8],
}

impl Default for TrajectoryLayout {
    fn default() -> Self {
        TrajectoryLayout { segments: PhaseKind::ALL.map(PhaseKind::default_segments) }
    }
}

impl TrajectoryLayout {
    pub fn grid(&self, kind: PhaseKind) -> Grid {
        Grid::new(self.segments[kind.index()])
    }

    pub fn validate(&self) -> Result<()> {
        for kind in PhaseKind::ALL {
            if self.segments[kind.index()] == 0 {
                return Err(MdoError::InvalidConfig(format!("phase '{kind}' needs at least one segment")));
            }
        }
        Ok(())
    }

    /// One right-hand side per phase, sized to its grid.
    pub fn build_odes(&self, earth: &Earth) -> Result<Vec<PhaseOde>> {
        PhaseKind::ALL.into_iter().map(|k| PhaseOde::new(k, self.grid(k).num_nodes(), earth)).collect()
    }

    pub fn total_nodes(&self) -> usize {
        PhaseKind::ALL.into_iter().map(|k| self.grid(k).num_nodes()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_node_counts() {
        let layout = TrajectoryLayout::default();
        assert_eq!(layout.grid(PhaseKind::LiftOff).num_nodes(), 15);
        assert_eq!(layout.grid(PhaseKind::ExoatmosB).num_nodes(), 29);
        assert_eq!(layout.total_nodes(), 15 * 5 + 9 + 7 + 29);
    }

    #[test]
    fn empty_phase_is_a_config_error() {
        let mut layout = TrajectoryLayout::default();
        layout.segments[5] = 0;
        assert!(matches!(layout.validate(), Err(MdoError::InvalidConfig(_))));
    }
}
