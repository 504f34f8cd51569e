use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MdoError;
use crate::gnc::{ExoSegment, GuidanceLaw};

// ---------------------------------------------------------------------------
// Flight phases
// ---------------------------------------------------------------------------

/// The eight ascent phases, in flight order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    LiftOff,
    PitchOverLinear,
    PitchOverExponential,
    GravityTurn,
    GravityTurnB,
    GravityTurnC,
    ExoatmosA,
    ExoatmosB,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 8] = [
        PhaseKind::LiftOff,
        PhaseKind::PitchOverLinear,
        PhaseKind::PitchOverExponential,
        PhaseKind::GravityTurn,
        PhaseKind::GravityTurnB,
        PhaseKind::GravityTurnC,
        PhaseKind::ExoatmosA,
        PhaseKind::ExoatmosB,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PhaseKind::LiftOff => "lift_off",
            PhaseKind::PitchOverLinear => "pitch_over_linear",
            PhaseKind::PitchOverExponential => "pitch_over_exponential",
            PhaseKind::GravityTurn => "gravity_turn",
            PhaseKind::GravityTurnB => "gravity_turn_b",
            PhaseKind::GravityTurnC => "gravity_turn_c",
            PhaseKind::ExoatmosA => "exoatmos_a",
            PhaseKind::ExoatmosB => "exoatmos_b",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Steering law, or `None` for lift-off (pitch held vertical).
    pub fn guidance(self) -> Option<GuidanceLaw> {
        match self {
            PhaseKind::LiftOff => None,
            PhaseKind::PitchOverLinear => Some(GuidanceLaw::Linear),
            PhaseKind::PitchOverExponential => Some(GuidanceLaw::Exponential),
            PhaseKind::GravityTurn | PhaseKind::GravityTurnB | PhaseKind::GravityTurnC => {
                Some(GuidanceLaw::GravityTurn)
            }
            PhaseKind::ExoatmosA | PhaseKind::ExoatmosB => Some(GuidanceLaw::BilinearTangent),
        }
    }

    /// Stage providing thrust: 1 up to first-stage separation, 2 after.
    pub fn stage(self) -> u8 {
        if self <= PhaseKind::GravityTurnB {
            1
        } else {
            2
        }
    }

    pub fn default_segments(self) -> usize {
        match self {
            PhaseKind::GravityTurn => 4,
            PhaseKind::GravityTurnB => 3,
            PhaseKind::ExoatmosB => 14,
            _ => 7,
        }
    }

    /// Duration bounds in seconds. The exoatmospheric durations are design
    /// variables and share one range.
    pub fn duration_bounds(self) -> (f64, f64) {
        match self {
            PhaseKind::LiftOff | PhaseKind::PitchOverExponential => (1.0, 100.0),
            PhaseKind::PitchOverLinear => (5.0, 10.0),
            PhaseKind::GravityTurn | PhaseKind::GravityTurnB | PhaseKind::GravityTurnC => (1.0, 150.0),
            PhaseKind::ExoatmosA | PhaseKind::ExoatmosB => (1.0, 250.0),
        }
    }

    /// Gravity-turn phases carry the dynamic-pressure rate.
    pub fn has_qdot(self) -> bool {
        matches!(self, PhaseKind::GravityTurn | PhaseKind::GravityTurnB | PhaseKind::GravityTurnC)
    }

    pub fn exo_segment(self) -> Option<ExoSegment> {
        match self {
            PhaseKind::ExoatmosA => Some(ExoSegment::A),
            PhaseKind::ExoatmosB => Some(ExoSegment::B),
            _ => None,
        }
    }

    pub fn next(self) -> Option<PhaseKind> {
        PhaseKind::ALL.get(self.index() + 1).copied()
    }

    /// Mass is discontinuous across the boundary that ends this phase.
    pub fn ends_with_jettison(self) -> bool {
        matches!(self, PhaseKind::GravityTurnB | PhaseKind::ExoatmosA)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhaseKind {
    type Err = MdoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseKind::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| MdoError::UnknownPhase(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Gauss-Lobatto order-3 grid
// ---------------------------------------------------------------------------

/// Equal segments on `τ ∈ [−1, 1]`, each with its two ends and midpoint as
/// nodes; neighbouring segments share their end node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub segments: usize,
}

impl Grid {
    pub fn new(segments: usize) -> Self {
        Grid { segments }
    }

    pub fn num_nodes(&self) -> usize {
        2 * self.segments + 1
    }

    pub fn taus(&self) -> Vec<f64> {
        let n = self.num_nodes();
        (0..n).map(|i| -1.0 + 2.0 * i as f64 / (n - 1) as f64).collect()
    }

    /// Absolute node times of a phase starting at `t0`.
    pub fn times(&self, t0: f64, duration: f64) -> Vec<f64> {
        self.taus().into_iter().map(|tau| t0 + 0.5 * (tau + 1.0) * duration).collect()
    }

    /// Node indices `(start, mid, end)` of segment `k`.
    pub fn segment_nodes(&self, k: usize) -> (usize, usize, usize) {
        (2 * k, 2 * k + 1, 2 * k + 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_flight_order() {
        let mut p = PhaseKind::LiftOff;
        let mut seen = vec![p];
        while let Some(n) = p.next() {
            seen.push(n);
            p = n;
        }
        assert_eq!(seen, PhaseKind::ALL.to_vec());
        assert_eq!(PhaseKind::GravityTurnB.stage(), 1);
        assert_eq!(PhaseKind::GravityTurnC.stage(), 2);
    }

    #[test]
    fn names_parse_back() {
        for p in PhaseKind::ALL {
            assert_eq!(p.name().parse::<PhaseKind>().unwrap(), p);
        }
        assert!(matches!("coast".parse::<PhaseKind>(), Err(MdoError::UnknownPhase(_))));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PhaseKind::PitchOverExponential).unwrap();
        assert_eq!(json, "\"pitch_over_exponential\"");
    }

    #[test]
    fn grid_nodes_span_the_phase() {
        let g = Grid::new(PhaseKind::GravityTurnB.default_segments());
        assert_eq!(g.num_nodes(), 7);
        let t = g.times(66.0, 30.0);
        assert!((t[0] - 66.0).abs() < 1e-12);
        assert!((t[6] - 96.0).abs() < 1e-12);
        assert!((t[3] - 81.0).abs() < 1e-12);
        assert_eq!(g.segment_nodes(2), (4, 5, 6));
    }
}
