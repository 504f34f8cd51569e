//! Ideal-rocket relations from combustion products to specific impulse.
//!
//! Every relation is closed form with exact partials. Nothing is guarded:
//! `gamma_t <= 1` or `P_e >= P_c` yields NaN, which the caller sees.

use serde::{Deserialize, Serialize};

use crate::dynamics::state::G0;
use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Efficiencies and constants shared by the chemistry chain of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemistryOptions {
    pub g0: f64,         // m/s²
    pub eta_c_star: f64, // combustion efficiency
    pub eta_c_f: f64,    // nozzle efficiency
    pub rmc: f64,        // J/(kmol·K), universal gas constant
    pub p_a: f64,        // Pa, design back-pressure
}

impl Default for ChemistryOptions {
    fn default() -> Self {
        ChemistryOptions { g0: G0, eta_c_star: 0.98, eta_c_f: 0.98, rmc: 8314.0, p_a: 0.0 }
    }
}

// ---------------------------------------------------------------------------
// Closed forms
// ---------------------------------------------------------------------------

/// Characteristic velocity and partials `(cStar, d/dgamma, d/dtc, d/dmc)`.
pub fn characteristic_velocity(eta: f64, rmc: f64, gamma: f64, tc: f64, mc: f64) -> (f64, f64, f64, f64) {
    let l = (2.0 / (gamma + 1.0)).ln();
    let e = (gamma + 1.0) / (2.0 * (gamma - 1.0));
    let c = eta * (gamma * rmc / mc * tc).sqrt() / (gamma * (e * l).exp());
    let dln_dgamma = -0.5 / gamma + l / ((gamma - 1.0) * (gamma - 1.0)) + 0.5 / (gamma - 1.0);
    (c, c * dln_dgamma, 0.5 * c / tc, -0.5 * c / mc)
}

/// `(Pe/Pc)^((γ−1)/γ)` and its partials `(x, d/dgamma, d/dpc, d/dpe)`.
fn pressure_term(gamma: f64, p_c: f64, p_e: f64) -> (f64, f64, f64, f64) {
    let k = (gamma - 1.0) / gamma;
    let x = (p_e / p_c).powf(k);
    (x, x * (p_e / p_c).ln() / (gamma * gamma), -k * x / p_c, k * x / p_e)
}

/// Nozzle expansion ratio and partials `(eps, d/dpc, d/dpe, d/dgamma)`.
pub fn area_ratio(p_c: f64, p_e: f64, gamma: f64) -> (f64, f64, f64, f64) {
    let gm1 = gamma - 1.0;
    let l = (2.0 / (gamma + 1.0)).ln();
    let a = (l / gm1).exp();
    let b = (p_c / p_e).powf(1.0 / gamma);
    let c = (gamma + 1.0) / gm1;
    let (x, dx_dg, dx_dpc, dx_dpe) = pressure_term(gamma, p_c, p_e);
    let d = 1.0 - x;
    let eps = a * b / (c * d).sqrt();

    let dln_a = -1.0 / ((gamma + 1.0) * gm1) - l / (gm1 * gm1);
    let dln_b = -(p_c / p_e).ln() / (gamma * gamma);
    let dln_c = 1.0 / (gamma + 1.0) - 1.0 / gm1;
    let d_gamma = eps * (dln_a + dln_b - 0.5 * dln_c + 0.5 * dx_dg / d);
    let d_pc = eps * (1.0 / (gamma * p_c) + 0.5 * dx_dpc / d);
    let d_pe = eps * (-1.0 / (gamma * p_e) + 0.5 * dx_dpe / d);
    (eps, d_pc, d_pe, d_gamma)
}

/// Thrust coefficient and partials `(C_f, d/dgamma, d/dpc, d/dpe, d/deps)`.
pub fn thrust_coefficient(
    eta: f64,
    p_a: f64,
    gamma: f64,
    p_c: f64,
    p_e: f64,
    eps: f64,
) -> (f64, f64, f64, f64, f64) {
    let gm1 = gamma - 1.0;
    let l = (2.0 / (gamma + 1.0)).ln();
    let g = 2.0 / gm1 * ((gamma + 1.0) / gm1 * l).exp();
    let (x, dx_dg, dx_dpc, dx_dpe) = pressure_term(gamma, p_c, p_e);
    let d = 1.0 - x;
    let s = (g * d).sqrt();

    let dln_g = -2.0 / gm1 - 2.0 * l / (gm1 * gm1);
    let ds_dg = 0.5 * s * (dln_g - dx_dg / d);
    let ds_dpc = -0.5 * s * dx_dpc / d;
    let ds_dpe = -0.5 * s * dx_dpe / d;

    let cf = eta * (gamma * s + eps / p_c * (p_e - p_a));
    (
        cf,
        eta * (s + gamma * ds_dg),
        eta * (gamma * ds_dpc - eps * (p_e - p_a) / (p_c * p_c)),
        eta * (gamma * ds_dpe + eps / p_c),
        eta * (p_e - p_a) / p_c,
    )
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CharacteristicVelocity {
    pub eta_c_star: f64,
    pub rmc: f64,
}

impl Component for CharacteristicVelocity {
    fn name(&self) -> &str {
        "characteristic_velocity"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("gamma_t", ""),
            PortSpec::scalar("tc", "K"),
            PortSpec::scalar("mc", "kg/kmol"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("cStar", "m/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("cStar", &["gamma_t", "tc", "mc"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let (c, ..) = characteristic_velocity(
            self.eta_c_star,
            self.rmc,
            inputs.scalar(self.name(), "gamma_t")?,
            inputs.scalar(self.name(), "tc")?,
            inputs.scalar(self.name(), "mc")?,
        );
        Ok(Values::new().with_scalar("cStar", c))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let (_, dg, dt, dm) = characteristic_velocity(
            self.eta_c_star,
            self.rmc,
            inputs.scalar(self.name(), "gamma_t")?,
            inputs.scalar(self.name(), "tc")?,
            inputs.scalar(self.name(), "mc")?,
        );
        p.set("cStar", "gamma_t", 0, dg);
        p.set("cStar", "tc", 0, dt);
        p.set("cStar", "mc", 0, dm);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AreaRatio;

impl AreaRatio {
    fn eval(&self, inputs: &Values) -> Result<(f64, f64, f64, f64)> {
        Ok(area_ratio(
            inputs.scalar("area_ratio", "P_c")?,
            inputs.scalar("area_ratio", "P_e")?,
            inputs.scalar("area_ratio", "gamma_t")?,
        ))
    }
}

impl Component for AreaRatio {
    fn name(&self) -> &str {
        "area_ratio"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("P_c", "Pa"),
            PortSpec::scalar("P_e", "Pa"),
            PortSpec::scalar("gamma_t", ""),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("epsilon", "")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("epsilon", &["P_c", "P_e", "gamma_t"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let (eps, ..) = self.eval(inputs)?;
        Ok(Values::new().with_scalar("epsilon", eps))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let (_, d_pc, d_pe, d_gamma) = self.eval(inputs)?;
        p.set("epsilon", "P_c", 0, d_pc);
        p.set("epsilon", "P_e", 0, d_pe);
        p.set("epsilon", "gamma_t", 0, d_gamma);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ThrustCoefficient {
    pub eta_c_f: f64,
    pub p_a: f64,
}

impl ThrustCoefficient {
    fn eval(&self, inputs: &Values) -> Result<(f64, f64, f64, f64, f64)> {
        let n = self.name();
        Ok(thrust_coefficient(
            self.eta_c_f,
            self.p_a,
            inputs.scalar(n, "gamma_t")?,
            inputs.scalar(n, "P_c")?,
            inputs.scalar(n, "P_e")?,
            inputs.scalar(n, "epsilon")?,
        ))
    }
}

impl Component for ThrustCoefficient {
    fn name(&self) -> &str {
        "thrust_coefficient"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("gamma_t", ""),
            PortSpec::scalar("P_c", "Pa"),
            PortSpec::scalar("P_e", "Pa"),
            PortSpec::scalar("epsilon", ""),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("C_f", "")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("C_f", &["gamma_t", "P_c", "P_e", "epsilon"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let (cf, ..) = self.eval(inputs)?;
        Ok(Values::new().with_scalar("C_f", cf))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let (_, d_gamma, d_pc, d_pe, d_eps) = self.eval(inputs)?;
        p.set("C_f", "gamma_t", 0, d_gamma);
        p.set("C_f", "P_c", 0, d_pc);
        p.set("C_f", "P_e", 0, d_pe);
        p.set("C_f", "epsilon", 0, d_eps);
        Ok(())
    }
}

/// `Isp = cStar · C_f / g0`
#[derive(Debug, Clone)]
pub struct SpecificImpulse {
    pub g0: f64,
}

impl Component for SpecificImpulse {
    fn name(&self) -> &str {
        "specific_impulse"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("cStar", "m/s"), PortSpec::scalar("C_f", "")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("Isp", "s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("Isp", &["cStar", "C_f"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let c = inputs.scalar(self.name(), "cStar")?;
        let cf = inputs.scalar(self.name(), "C_f")?;
        Ok(Values::new().with_scalar("Isp", c * cf / self.g0))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let c = inputs.scalar(self.name(), "cStar")?;
        let cf = inputs.scalar(self.name(), "C_f")?;
        p.set("Isp", "cStar", 0, cf / self.g0);
        p.set("Isp", "C_f", 0, c / self.g0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    fn assert_partials(comp: &dyn Component, inputs: &Values) {
        for c in check_partials(comp, inputs, 1e-6).unwrap() {
            assert!(c.declared && c.passes(1e-6), "{}: {:?}", comp.name(), c);
        }
    }

    #[test]
    fn frozen_flow_closed_forms() {
        // γ = 1.2 expanding 70 bar to 1 bar: ε ≈ 9.06, C_f (vacuum) ≈ 1.73
        let (eps, ..) = area_ratio(70e5, 1e5, 1.2);
        assert!((eps - 9.06).abs() < 0.02, "eps = {}", eps);
        let (cf, ..) = thrust_coefficient(1.0, 0.0, 1.2, 70e5, 1e5, eps);
        assert!((cf - 1.730).abs() < 0.005, "C_f = {}", cf);
        // matched expansion drops the pressure term
        let (cf_matched, ..) = thrust_coefficient(1.0, 1e5, 1.2, 70e5, 1e5, eps);
        assert!(cf_matched < cf);
    }

    #[test]
    fn exit_pressure_above_chamber_is_nan() {
        let (eps, ..) = area_ratio(1e5, 2e5, 1.2);
        assert!(eps.is_nan());
    }

    #[test]
    fn chemistry_partials_match_finite_differences() {
        let inputs = Values::new()
            .with_scalar("gamma_t", 1.2368)
            .with_scalar("tc", 3600.0)
            .with_scalar("mc", 22.3)
            .with_scalar("P_c", 9.9e6)
            .with_scalar("P_e", 40_546.0)
            .with_scalar("epsilon", 21.5)
            .with_scalar("cStar", 1790.0)
            .with_scalar("C_f", 1.7);

        assert_partials(&CharacteristicVelocity { eta_c_star: 0.98, rmc: 8314.0 }, &inputs);
        assert_partials(&AreaRatio, &inputs);
        assert_partials(&ThrustCoefficient { eta_c_f: 0.98, p_a: 0.0 }, &inputs);
        assert_partials(&ThrustCoefficient { eta_c_f: 0.98, p_a: 101_325.0 }, &inputs);
        assert_partials(&SpecificImpulse { g0: G0 }, &inputs);
    }
}
