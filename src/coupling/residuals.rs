use std::f64::consts::PI;

use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

// ---------------------------------------------------------------------------
// Propellant bookkeeping
// ---------------------------------------------------------------------------

/// Propellant loads chosen by the optimizer against what the trajectory
/// actually burns.
///
/// `residual_mp_1 = mp_1 − mf_a + me_a`,
/// `residual_mp_2 = mp_2 − mf_b + m_final + mplf`
#[derive(Debug, Clone, Copy)]
pub struct PropellantConstraints {
    pub mplf: f64, // kg
}

impl Component for PropellantConstraints {
    fn name(&self) -> &str {
        "constraints_propellants"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("mp_1", "kg"),
            PortSpec::scalar("mp_2", "kg"),
            PortSpec::scalar("mf_a", "kg"),
            PortSpec::scalar("me_a", "kg"),
            PortSpec::scalar("mf_b", "kg"),
            PortSpec::scalar("m_final", "kg"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("residual_mp_1", "kg"), PortSpec::scalar("residual_mp_2", "kg")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_fixed("residual_mp_1", "mp_1", Pattern::Single, 1.0)
            .declare_fixed("residual_mp_1", "mf_a", Pattern::Single, -1.0)
            .declare_fixed("residual_mp_1", "me_a", Pattern::Single, 1.0)
            .declare_fixed("residual_mp_2", "mp_2", Pattern::Single, 1.0)
            .declare_fixed("residual_mp_2", "mf_b", Pattern::Single, -1.0)
            .declare_fixed("residual_mp_2", "m_final", Pattern::Single, 1.0)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let get = |name: &str| inputs.scalar(self.name(), name);
        Ok(Values::new()
            .with_scalar("residual_mp_1", get("mp_1")? - get("mf_a")? + get("me_a")?)
            .with_scalar("residual_mp_2", get("mp_2")? - get("mf_b")? + get("m_final")? + self.mplf))
    }

    fn compute_partials(&self, _inputs: &Values, _partials: &mut Partials) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loads used by the mass model against loads flown
// ---------------------------------------------------------------------------

/// `residual = design − flown` for one scalar load (axial load factor or
/// dynamic pressure). The mass model is sized for the design value, so the
/// flown value must not exceed it.
#[derive(Debug, Clone, Copy)]
pub struct LoadMargin {
    name: &'static str,
    design: &'static str,
    flown: &'static str,
    residual: &'static str,
    units: &'static str,
}

impl LoadMargin {
    pub const fn load_factor() -> Self {
        LoadMargin {
            name: "constraints_load_factor",
            design: "max_n_f_1",
            flown: "n_f_end_1",
            residual: "residual_max_n_f_1",
            units: "",
        }
    }

    pub const fn dynamic_pressure() -> Self {
        LoadMargin {
            name: "constraints_dynamic_pressure",
            design: "max_q_dyn_1",
            flown: "q_dyn_end_gravity_turn",
            residual: "residual_max_q_dyn",
            units: "Pa",
        }
    }
}

impl Component for LoadMargin {
    fn name(&self) -> &str {
        self.name
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar(self.design, self.units), PortSpec::scalar(self.flown, self.units)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar(self.residual, self.units)]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_fixed(self.residual, self.design, Pattern::Single, 1.0)
            .declare_fixed(self.residual, self.flown, Pattern::Single, -1.0)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let design = inputs.scalar(self.name, self.design)?;
        let flown = inputs.scalar(self.name, self.flown)?;
        Ok(Values::new().with_scalar(self.residual, design - flown))
    }

    fn compute_partials(&self, _inputs: &Values, _partials: &mut Partials) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Nozzle exit area against stage cross-section
// ---------------------------------------------------------------------------

/// `residual_area_i = π/4 · D_i² · factor_i − Ae_t_i`
#[derive(Debug, Clone, Copy)]
pub struct ExitAreaConstraints {
    pub area_factor_1: f64,
    pub area_factor_2: f64,
}

const AREA_PORTS: [(&str, &str, &str); 2] = [
    ("residual_area_1", "D_stage_1", "Ae_t_1"),
    ("residual_area_2", "D_stage_2", "Ae_t_2"),
];

impl ExitAreaConstraints {
    fn factor(&self, i: usize) -> f64 {
        if i == 0 {
            self.area_factor_1
        } else {
            self.area_factor_2
        }
    }
}

impl Component for ExitAreaConstraints {
    fn name(&self) -> &str {
        "constraints_exit_area"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("D_stage_1", "m"),
            PortSpec::scalar("D_stage_2", "m"),
            PortSpec::scalar("Ae_t_1", "m**2"),
            PortSpec::scalar("Ae_t_2", "m**2"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("residual_area_1", "m**2"), PortSpec::scalar("residual_area_2", "m**2")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        AREA_PORTS.into_iter().fold(SparsityTemplate::new(), |t, (res, d, ae)| {
            t.declare(res, d, Pattern::Single).declare_fixed(res, ae, Pattern::Single, -1.0)
        })
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let mut out = Values::new();
        for (i, (res, d, ae)) in AREA_PORTS.into_iter().enumerate() {
            let d = inputs.scalar(self.name(), d)?;
            let ae = inputs.scalar(self.name(), ae)?;
            out.set_scalar(res, PI / 4.0 * d * d * self.factor(i) - ae);
        }
        Ok(out)
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        for (i, (res, d, _)) in AREA_PORTS.into_iter().enumerate() {
            let dv = inputs.scalar(self.name(), d)?;
            p.set(res, d, 0, PI / 2.0 * dv * self.factor(i));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    #[test]
    fn propellant_residuals_close_on_consistent_masses() {
        let (ms_1, ms_2, mp_1, mp_2, md, mplf) = (28_693.7, 6_701.6, 250_951.5, 70_174.7, 11_000.0, 1_900.0);
        let mf_a = ms_1 + ms_2 + mplf + md + mp_1 + mp_2;
        let me_a = mf_a - mp_1;
        let mf_b = me_a - ms_1;
        let m_final = ms_2 + md;
        let inputs = Values::new()
            .with_scalar("mp_1", mp_1)
            .with_scalar("mp_2", mp_2)
            .with_scalar("mf_a", mf_a)
            .with_scalar("me_a", me_a)
            .with_scalar("mf_b", mf_b)
            .with_scalar("m_final", m_final);
        let out = PropellantConstraints { mplf }.compute(&inputs).unwrap();
        assert!(out.first("residual_mp_1").unwrap().abs() < 1e-8);
        assert!(out.first("residual_mp_2").unwrap().abs() < 1e-8);
    }

    #[test]
    fn load_margins_are_design_minus_flown() {
        let q = LoadMargin::dynamic_pressure();
        let inputs = Values::new()
            .with_scalar("max_q_dyn_1", 86_566.3)
            .with_scalar("q_dyn_end_gravity_turn", 64_000.0);
        let out = q.compute(&inputs).unwrap();
        assert!((out.first("residual_max_q_dyn").unwrap() - 22_566.3).abs() < 1e-9);

        let n = LoadMargin::load_factor();
        assert_eq!(n.inputs().len(), 2);
        assert!(n.declare_partials().position("residual_max_n_f_1", "n_f_end_1").is_some());
    }

    #[test]
    fn exit_area_partials_match_finite_differences() {
        let comp = ExitAreaConstraints { area_factor_1: 0.64, area_factor_2: 0.64 };
        let inputs = Values::new()
            .with_scalar("D_stage_1", 4.9973)
            .with_scalar("D_stage_2", 4.9973)
            .with_scalar("Ae_t_1", 9.344)
            .with_scalar("Ae_t_2", 11.687);
        let out = comp.compute(&inputs).unwrap();
        // 0.64 · π/4 · 4.9973² = 12.553
        assert!((out.first("residual_area_1").unwrap() - (12.553 - 9.344)).abs() < 1e-2);
        for c in check_partials(&comp, &inputs, 1e-6).unwrap() {
            assert!(c.declared && c.passes(1e-7), "{:?}", c);
        }
    }
}
