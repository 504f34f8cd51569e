use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::jacobian::{at, Component, Partials, Pattern, PortSpec, Shape, SparsityTemplate, Values};

// ---------------------------------------------------------------------------
// Pitch programs
// ---------------------------------------------------------------------------

/// Base of the bilinear-tangent shape parameter, `A = a^ξ`.
pub const BLT_BASE: f64 = 100.0;

/// Pitch steering law of one flight phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceLaw {
    /// `θ = φ − (t/T)·Δθ`
    Linear,
    /// `θ = φ − Δθ·exp(−3t/T)`
    Exponential,
    /// `θ = φ` (zero angle of attack)
    GravityTurn,
    /// `tan θ = [A tan θi + (tan θf − A tan θi)τ] / [A + (1 − A)τ]`,
    /// `θi = θ_gt + Δθ`, `τ = t/T`
    BilinearTangent,
}

/// Everything any law may read at one node.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchArgs {
    pub phi: f64,         // rad
    pub t: f64,           // s, time since phase start
    pub duration: f64,    // s
    pub delta_theta: f64, // rad
    pub theta_gt: f64,    // rad
    pub theta_f: f64,     // rad
    pub xi: f64,
}

/// Commanded pitch and its sensitivities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pitch {
    pub theta: f64,
    pub d_phi: f64,
    pub d_t: f64,
    pub d_duration: f64,
    pub d_delta_theta: f64,
    pub d_theta_gt: f64,
    pub d_theta_f: f64,
    pub d_xi: f64,
}

impl GuidanceLaw {
    pub fn pitch(&self, a: &PitchArgs) -> Pitch {
        match self {
            GuidanceLaw::Linear => {
                let tau = a.t / a.duration;
                Pitch {
                    theta: a.phi - tau * a.delta_theta,
                    d_phi: 1.0,
                    d_t: -a.delta_theta / a.duration,
                    d_duration: a.t * a.delta_theta / (a.duration * a.duration),
                    d_delta_theta: -tau,
                    ..Pitch::default()
                }
            }
            GuidanceLaw::Exponential => {
                let e = (-3.0 * a.t / a.duration).exp();
                Pitch {
                    theta: a.phi - a.delta_theta * e,
                    d_phi: 1.0,
                    d_t: 3.0 * a.delta_theta * e / a.duration,
                    d_duration: -3.0 * a.delta_theta * e * a.t / (a.duration * a.duration),
                    d_delta_theta: -e,
                    ..Pitch::default()
                }
            }
            GuidanceLaw::GravityTurn => Pitch { theta: a.phi, d_phi: 1.0, ..Pitch::default() },
            GuidanceLaw::BilinearTangent => bilinear_tangent(a),
        }
    }

    /// Input ports the law reads.
    pub fn ports(&self) -> Vec<PortSpec> {
        match self {
            GuidanceLaw::Linear | GuidanceLaw::Exponential => vec![
                PortSpec::nodal("phi", "rad"),
                PortSpec::nodal("phase_time", "s"),
                PortSpec::scalar("phase_duration", "s"),
                PortSpec::scalar("delta_theta", "rad"),
            ],
            GuidanceLaw::GravityTurn => vec![PortSpec::nodal("phi", "rad")],
            GuidanceLaw::BilinearTangent => vec![
                PortSpec::nodal("phase_time", "s"),
                PortSpec::scalar("phase_duration", "s"),
                PortSpec::scalar("delta_theta", "rad"),
                PortSpec::scalar("theta_gt", "rad"),
                PortSpec::scalar("theta_f", "rad"),
                PortSpec::scalar("xi", ""),
            ],
        }
    }
}

// NaN/inf near θ = ±90°: tan is not guarded.
fn bilinear_tangent(a: &PitchArgs) -> Pitch {
    let big_a = BLT_BASE.powf(a.xi);
    let s = (a.theta_gt + a.delta_theta).tan();
    let f = a.theta_f.tan();
    let tau = a.t / a.duration;

    let num = big_a * s + (f - big_a * s) * tau;
    let den = big_a + (1.0 - big_a) * tau;
    let u = num / den;
    let dtheta_du = 1.0 / (1.0 + u * u);

    let du_dthi = big_a * (1.0 + s * s) * (1.0 - tau) / den;
    let du_dthf = tau * (1.0 + f * f) / den;
    let du_dtau = ((f - big_a * s) * den - num * (1.0 - big_a)) / (den * den);
    let du_da = (1.0 - tau) * (s * den - num) / (den * den);

    let d_thi = dtheta_du * du_dthi;
    let d_tau = dtheta_du * du_dtau;
    Pitch {
        theta: u.atan(),
        d_phi: 0.0,
        d_t: d_tau / a.duration,
        d_duration: -d_tau * a.t / (a.duration * a.duration),
        d_delta_theta: d_thi,
        d_theta_gt: d_thi,
        d_theta_f: dtheta_du * du_dthf,
        d_xi: dtheta_du * du_da * big_a * BLT_BASE.ln(),
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Guidance {
    pub num_nodes: usize,
    pub law: GuidanceLaw,
}

impl Guidance {
    fn args(&self, inputs: &Values, i: usize) -> Result<PitchArgs> {
        let mut a = PitchArgs::default();
        for port in self.law.ports() {
            let x = at(inputs.require(self.name(), port.name)?, i);
            match port.name {
                "phi" => a.phi = x,
                "phase_time" => a.t = x,
                "phase_duration" => a.duration = x,
                "delta_theta" => a.delta_theta = x,
                "theta_gt" => a.theta_gt = x,
                "theta_f" => a.theta_f = x,
                _ => a.xi = x,
            }
        }
        Ok(a)
    }
}

impl Component for Guidance {
    fn name(&self) -> &str {
        "guidance"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        self.law.ports()
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("theta", "rad")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        if self.law == GuidanceLaw::GravityTurn {
            return SparsityTemplate::new().declare_fixed("theta", "phi", Pattern::Diagonal, 1.0);
        }
        self.law.ports().into_iter().fold(SparsityTemplate::new(), |t, port| {
            t.declare("theta", port.name, Pattern::from_shapes(Shape::Nodal, port.shape))
        })
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let theta = (0..self.num_nodes)
            .map(|i| self.args(inputs, i).map(|a| self.law.pitch(&a).theta))
            .collect::<Result<Vec<_>>>()?;
        Ok(Values::new().with("theta", theta))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        if self.law == GuidanceLaw::GravityTurn {
            return Ok(());
        }
        for i in 0..self.num_nodes {
            let d = self.law.pitch(&self.args(inputs, i)?);
            for port in self.law.ports() {
                let value = match port.name {
                    "phi" => d.d_phi,
                    "phase_time" => d.d_t,
                    "phase_duration" => d.d_duration,
                    "delta_theta" => d.d_delta_theta,
                    "theta_gt" => d.d_theta_gt,
                    "theta_f" => d.d_theta_f,
                    _ => d.d_xi,
                };
                p.set("theta", port.name, i, value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;
    use approx::assert_abs_diff_eq;

    fn args(t: f64) -> PitchArgs {
        PitchArgs {
            phi: 1.2,
            t,
            duration: 40.0,
            delta_theta: 0.05,
            theta_gt: 0.42,
            theta_f: 0.06,
            xi: -0.2,
        }
    }

    #[test]
    fn linear_boundary_values() {
        let law = GuidanceLaw::Linear;
        assert_abs_diff_eq!(law.pitch(&args(0.0)).theta, 1.2, epsilon = 1e-15);
        assert_abs_diff_eq!(law.pitch(&args(40.0)).theta, 1.2 - 0.05, epsilon = 1e-15);
    }

    #[test]
    fn gravity_turn_follows_flight_path() {
        for t in [0.0, 3.0, 17.5, 40.0] {
            assert_eq!(GuidanceLaw::GravityTurn.pitch(&args(t)).theta, 1.2);
        }
    }

    #[test]
    fn exponential_decays_towards_phi() {
        let law = GuidanceLaw::Exponential;
        assert_abs_diff_eq!(law.pitch(&args(0.0)).theta, 1.2 - 0.05, epsilon = 1e-15);
        let end = law.pitch(&args(40.0)).theta;
        assert!(end > 1.2 - 0.05 && end < 1.2);
    }

    #[test]
    fn bilinear_tangent_boundary_law() {
        let law = GuidanceLaw::BilinearTangent;
        assert_abs_diff_eq!(law.pitch(&args(0.0)).theta, 0.42 + 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(law.pitch(&args(40.0)).theta, 0.06, epsilon = 1e-12);
        let mid = law.pitch(&args(20.0)).theta;
        assert!(mid < 0.47 && mid > 0.06, "mid-phase pitch {}", mid);
    }

    #[test]
    fn guidance_partials_match_finite_differences() {
        let n = 4;
        let inputs = Values::new()
            .with("phi", vec![1.5, 1.2, 0.9, 0.6])
            .with("phase_time", vec![0.0, 5.0, 13.0, 39.0])
            .with_scalar("phase_duration", 40.0)
            .with_scalar("delta_theta", 0.06)
            .with_scalar("theta_gt", 0.41)
            .with_scalar("theta_f", 0.05)
            .with_scalar("xi", -0.2);
        for law in [
            GuidanceLaw::Linear,
            GuidanceLaw::Exponential,
            GuidanceLaw::GravityTurn,
            GuidanceLaw::BilinearTangent,
        ] {
            let comp = Guidance { num_nodes: n, law };
            for c in check_partials(&comp, &inputs, 1e-7).unwrap() {
                assert!(c.declared && c.passes(1e-6), "{:?}: {:?}", law, c);
            }
        }
    }
}
