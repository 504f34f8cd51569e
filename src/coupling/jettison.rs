use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Mass dropped across the two jettison boundaries, read from the state
/// histories on both sides.
///
/// `massjettison_first_stage = me_a − mf_b`, `massjettison_plf = mi_b − mi_c`
#[derive(Debug, Clone, Copy, Default)]
pub struct MassJettison;

impl Component for MassJettison {
    fn name(&self) -> &str {
        "mass_jettison"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("me_a", "kg"),
            PortSpec::scalar("mf_b", "kg"),
            PortSpec::scalar("mi_b", "kg"),
            PortSpec::scalar("mi_c", "kg"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("massjettison_first_stage", "kg"),
            PortSpec::scalar("massjettison_plf", "kg"),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_fixed("massjettison_first_stage", "me_a", Pattern::Single, 1.0)
            .declare_fixed("massjettison_first_stage", "mf_b", Pattern::Single, -1.0)
            .declare_fixed("massjettison_plf", "mi_b", Pattern::Single, 1.0)
            .declare_fixed("massjettison_plf", "mi_c", Pattern::Single, -1.0)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let get = |name: &str| inputs.scalar(self.name(), name);
        Ok(Values::new()
            .with_scalar("massjettison_first_stage", get("me_a")? - get("mf_b")?)
            .with_scalar("massjettison_plf", get("mi_b")? - get("mi_c")?))
    }

    fn compute_partials(&self, _inputs: &Values, _partials: &mut Partials) -> Result<()> {
        Ok(())
    }
}

/// Jettisoned masses against the sized structure, and the circularized mass
/// against second-stage structure plus payload.
#[derive(Debug, Clone, Copy)]
pub struct JettisonConstraints {
    pub mplf: f64, // kg, payload fairing
    pub md: f64,   // kg, payload
}

impl Component for JettisonConstraints {
    fn name(&self) -> &str {
        "constraints_jettison"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("massjettison_first_stage", "kg"),
            PortSpec::scalar("massjettison_plf", "kg"),
            PortSpec::scalar("ms_1", "kg"),
            PortSpec::scalar("ms_2", "kg"),
            PortSpec::scalar("m_final", "kg"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("residual_ms_1", "kg"),
            PortSpec::scalar("residual_mplf", "kg"),
            PortSpec::scalar("residual_m_final", "kg"),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_fixed("residual_ms_1", "massjettison_first_stage", Pattern::Single, 1.0)
            .declare_fixed("residual_ms_1", "ms_1", Pattern::Single, -1.0)
            .declare_fixed("residual_mplf", "massjettison_plf", Pattern::Single, 1.0)
            .declare_fixed("residual_m_final", "m_final", Pattern::Single, 1.0)
            .declare_fixed("residual_m_final", "ms_2", Pattern::Single, -1.0)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let get = |name: &str| inputs.scalar(self.name(), name);
        Ok(Values::new()
            .with_scalar("residual_ms_1", get("massjettison_first_stage")? - get("ms_1")?)
            .with_scalar("residual_mplf", get("massjettison_plf")? - self.mplf)
            .with_scalar("residual_m_final", get("m_final")? - get("ms_2")? - self.md))
    }

    fn compute_partials(&self, _inputs: &Values, _partials: &mut Partials) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    #[test]
    fn jettisoned_mass_matches_structure() {
        let ms_1 = 28_693.7;
        let mf_b = 95_776.0;
        let inputs = Values::new()
            .with_scalar("me_a", mf_b + ms_1)
            .with_scalar("mf_b", mf_b)
            .with_scalar("mi_b", 60_000.0)
            .with_scalar("mi_c", 58_100.0);
        let dropped = MassJettison.compute(&inputs).unwrap();
        assert!((dropped.first("massjettison_first_stage").unwrap() - ms_1).abs() < 1e-9);

        let mut inputs = dropped;
        inputs.set_scalar("ms_1", ms_1);
        inputs.set_scalar("ms_2", 6_701.6);
        inputs.set_scalar("m_final", 6_701.6 + 11_000.0);
        let residuals = JettisonConstraints { mplf: 1_900.0, md: 11_000.0 }.compute(&inputs).unwrap();
        for name in ["residual_ms_1", "residual_mplf", "residual_m_final"] {
            assert!(residuals.first(name).unwrap().abs() < 1e-9, "{} = {:?}", name, residuals.first(name));
        }
    }

    #[test]
    fn fixed_partials_match_finite_differences() {
        let inputs = Values::new()
            .with_scalar("massjettison_first_stage", 30e3)
            .with_scalar("massjettison_plf", 2e3)
            .with_scalar("ms_1", 29e3)
            .with_scalar("ms_2", 6.7e3)
            .with_scalar("m_final", 18e3);
        let comp = JettisonConstraints { mplf: 1_900.0, md: 11_000.0 };
        for c in check_partials(&comp, &inputs, 1e-6).unwrap() {
            assert!(c.declared && c.passes(1e-7), "{:?}", c);
        }
    }
}
