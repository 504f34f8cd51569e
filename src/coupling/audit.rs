use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::CouplingInputs;

/// Post-convergence mass bookkeeping.
///
/// Every residual is zero for a converged design; the circularization
/// propellant is the mass burnt by the analytic second burn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassAudit {
    pub stage_jettison: f64,   // me_a − mf_b − ms_1
    pub fairing_jettison: f64, // mi_b − mi_c − mplf
    pub circularization: f64,  // m_end − m_final
    pub final_mass: f64,       // m_final − ms_2 − md
}

impl MassAudit {
    /// `m_end` is the last mass of the final burn, before circularization.
    pub fn new(c: &CouplingInputs, m_end: f64, mplf: f64, md: f64) -> Self {
        let audit = MassAudit {
            stage_jettison: c.me_a - c.mf_b - c.ms_1,
            fairing_jettison: c.mi_b - c.mi_c - mplf,
            circularization: m_end - c.m_final,
            final_mass: c.m_final - c.ms_2 - md,
        };
        debug!(
            "mass audit: stage {:.2} kg, fairing {:.2} kg, circularization {:.1} kg, final {:.2} kg",
            audit.stage_jettison, audit.fairing_jettison, audit.circularization, audit.final_mass
        );
        audit
    }

    /// Jettison and final-mass residuals within `tol` kilograms.
    pub fn is_consistent(&self, tol: f64) -> bool {
        let ok = [self.stage_jettison, self.fairing_jettison, self.final_mass]
            .iter()
            .all(|r| r.abs() <= tol);
        if !ok {
            warn!("mass audit outside {} kg: {:?}", tol, self);
        }
        ok
    }
}
