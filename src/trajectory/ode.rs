//! Right-hand side of one flight phase.
//!
//! Every phase shares the same dynamics core (aero, gravity, thrust losses,
//! equations of motion). The phase kind plugs in its steering law, the
//! exoatmospheric clock, the dynamic-pressure rate and the insertion orbit
//! where they apply.

use std::f64::consts::FRAC_PI_2;

use log::debug;

use super::guess::StateHistory;
use super::phase::{Grid, PhaseKind};
use crate::dynamics::state::Earth;
use crate::dynamics::{Eom, QDot, ThrustLosses};
use crate::error::{MdoError, Result};
use crate::gnc::{ExoSegment, ExoTiming, Guidance, GuidanceLaw};
use crate::jacobian::group::{Group, GroupBuilder};
use crate::jacobian::{Component, PortSpec, Values};
use crate::orbital::add_orbital_parameters;
use crate::physics::{Altitude, Atmos, DragCoefficient, DragForce, Gravity, HeatFluxAndDynamicPressure, MachNumber};

/// State rates in [`crate::dynamics::State::NAMES`] order.
pub const RATES: [&str; 5] = ["r_dot", "lambda_dot", "v_dot", "phi_dot", "m_dot"];

/// Engine and vehicle quantities held constant over a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseParams {
    pub thrust_vac: f64, // N
    pub mfr_max: f64,    // kg/s
    pub ae_t: f64,       // m²
    pub isp: f64,        // s
    pub diameter: f64,   // m
    pub throttle: f64,
    pub duration: f64,   // s
    /// Durations of both exoatmospheric phases, `(a, b)`.
    pub exo_durations: (f64, f64),
    pub delta_theta: f64, // rad
    pub theta_gt: f64,    // rad
    pub theta_f: f64,     // rad
    pub xi: f64,
}

// ---------------------------------------------------------------------------
// Phase ODE
// ---------------------------------------------------------------------------

pub struct PhaseOde {
    pub kind: PhaseKind,
    pub num_nodes: usize,
    group: Group,
}

impl std::fmt::Debug for PhaseOde {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseOde").field("kind", &self.kind).field("num_nodes", &self.num_nodes).finish()
    }
}

impl PhaseOde {
    pub fn new(kind: PhaseKind, num_nodes: usize, earth: &Earth) -> Result<Self> {
        let n = num_nodes;
        let mut b = GroupBuilder::new(kind.name(), n)
            .input(PortSpec::nodal("r", "m"))
            .input(PortSpec::nodal("v", "m/s"))
            .input(PortSpec::nodal("phi", "rad"))
            .input(PortSpec::nodal("m", "kg"))
            .input(PortSpec::nodal("throttle", ""))
            .input(PortSpec::scalar("thrust_vac", "N"))
            .input(PortSpec::scalar("mfr_max", "kg/s"))
            .input(PortSpec::scalar("Ae_t", "m**2"))
            .input(PortSpec::scalar("diameter", "m"));

        // aero
        b = b
            .add("altitude", Altitude { num_nodes: n, r0: earth.r0 })
            .connect("r", "altitude.r")
            .add("atmos", Atmos { num_nodes: n })
            .connect("altitude.h", "atmos.h")
            .add("mach", MachNumber { num_nodes: n })
            .connect("v", "mach.v")
            .connect("atmos.sos", "mach.sos")
            .add("cd", DragCoefficient { num_nodes: n })
            .connect("mach.Mach", "cd.Mach")
            .add("heat", HeatFluxAndDynamicPressure { num_nodes: n })
            .connect("v", "heat.v")
            .connect("atmos.rho", "heat.rho")
            .add("drag", DragForce { num_nodes: n })
            .connect("heat.q_dyn", "drag.q_dyn")
            .connect("cd.Cd", "drag.Cd")
            .connect("diameter", "drag.diameter")
            .add("gravity", Gravity { num_nodes: n, mu: earth.mu })
            .connect("r", "gravity.r")
            .add("thrust_losses", ThrustLosses { num_nodes: n })
            .connect("thrust_vac", "thrust_losses.thrust_vac")
            .connect("throttle", "thrust_losses.throttle")
            .connect("atmos.P_a", "thrust_losses.P_a")
            .connect("Ae_t", "thrust_losses.Ae_t")
            .connect("mfr_max", "thrust_losses.mfr_max");

        // steering
        let theta = match kind.guidance() {
            None => {
                b = b.input(PortSpec::nodal("theta", "rad"));
                "theta"
            }
            Some(law) => {
                b = wire_guidance(b, kind, law, n);
                "guidance.theta"
            }
        };

        b = b
            .add("eom", Eom { num_nodes: n, earth: *earth })
            .connect("r", "eom.r")
            .connect("v", "eom.v")
            .connect("phi", "eom.phi")
            .connect("m", "eom.m")
            .connect("thrust_losses.thrust", "eom.thrust")
            .connect("thrust_losses.mfr", "eom.mfr")
            .connect(theta, "eom.theta")
            .connect("gravity.g", "eom.g")
            .connect("drag.Drag", "eom.Drag");

        if kind.has_qdot() {
            b = b
                .add("q_dot", QDot { num_nodes: n })
                .connect("eom.v_dot", "q_dot.v_dot")
                .connect("eom.r_dot", "q_dot.r_dot")
                .connect("v", "q_dot.v")
                .connect("atmos.rho", "q_dot.rho")
                .connect("atmos.d_rho_wrt_h", "q_dot.d_rho_wrt_h")
                .expose("q_dot.q_dot", "q_dot");
        }

        if kind == PhaseKind::ExoatmosB {
            b = add_orbital_parameters(
                b.input(PortSpec::scalar("Isp", "s")),
                earth,
                n,
                ("r", "v", "phi", "m", "Isp"),
            )
            .expose("apsides.ra", "ra")
            .expose("apsides.rp", "rp")
            .expose("final_mass.m_final", "m_final");
        }

        let group = b
            .expose("eom.r_dot", "r_dot")
            .expose("eom.lambda_dot", "lambda_dot")
            .expose("eom.v_dot", "v_dot")
            .expose("eom.phi_dot", "phi_dot")
            .expose("eom.m_dot", "m_dot")
            .expose("eom.n_f", "n_f")
            .expose(theta, "theta")
            .expose("altitude.h", "h")
            .expose("mach.Mach", "Mach")
            .expose("atmos.rho", "rho")
            .expose("heat.q_dyn", "q_dyn")
            .expose("heat.q_heat", "q_heat")
            .expose("gravity.g", "g")
            .expose("thrust_losses.thrust", "thrust")
            .build()?;
        debug!("phase ODE '{}' assembled with {} nodes", kind, n);
        Ok(PhaseOde { kind, num_nodes, group })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// External inputs for a state history at phase-local `times`.
    pub fn externals(&self, states: &StateHistory, times: &[f64], p: &PhaseParams) -> Result<Values> {
        let n = self.num_nodes;
        if states.len() != n || times.len() != n {
            return Err(MdoError::GuessMismatch {
                phase: self.kind.name().to_string(),
                reason: format!("{} states and {} times for {} nodes", states.len(), times.len(), n),
            });
        }
        let mut v = Values::new()
            .with("r", states.r.clone())
            .with("v", states.v.clone())
            .with("phi", states.phi.clone())
            .with("m", states.m.clone())
            .with("throttle", vec![p.throttle; n])
            .with_scalar("thrust_vac", p.thrust_vac)
            .with_scalar("mfr_max", p.mfr_max)
            .with_scalar("Ae_t", p.ae_t)
            .with_scalar("diameter", p.diameter);

        match self.kind {
            PhaseKind::LiftOff => v.set("theta", vec![FRAC_PI_2; n]),
            PhaseKind::PitchOverLinear | PhaseKind::PitchOverExponential => {
                v.set("phase_time", times.to_vec());
                v.set_scalar("phase_duration", p.duration);
                v.set_scalar("delta_theta", p.delta_theta);
            }
            PhaseKind::GravityTurn | PhaseKind::GravityTurnB | PhaseKind::GravityTurnC => {}
            PhaseKind::ExoatmosA | PhaseKind::ExoatmosB => {
                let clock = if self.kind == PhaseKind::ExoatmosA { "phase_time" } else { "phase_time_b" };
                v.set(clock, times.to_vec());
                v.set_scalar("phase_duration_a", p.exo_durations.0);
                v.set_scalar("phase_duration_b", p.exo_durations.1);
                v.set_scalar("delta_theta", p.delta_theta);
                v.set_scalar("theta_gt", p.theta_gt);
                v.set_scalar("theta_f", p.theta_f);
                v.set_scalar("xi", p.xi);
            }
        }
        if self.kind == PhaseKind::ExoatmosB {
            v.set_scalar("Isp", p.isp);
        }
        Ok(v)
    }

    /// Exposed outputs (rates and path quantities) at every node.
    pub fn evaluate(&self, states: &StateHistory, times: &[f64], p: &PhaseParams) -> Result<Values> {
        self.group.compute(&self.externals(states, times, p)?)
    }
}

fn wire_guidance(b: GroupBuilder, kind: PhaseKind, law: GuidanceLaw, n: usize) -> GroupBuilder {
    let b = match law {
        GuidanceLaw::Linear | GuidanceLaw::Exponential => b
            .input(PortSpec::nodal("phase_time", "s"))
            .input(PortSpec::scalar("phase_duration", "s"))
            .input(PortSpec::scalar("delta_theta", "rad")),
        GuidanceLaw::GravityTurn => b,
        GuidanceLaw::BilinearTangent => {
            let segment = kind.exo_segment().unwrap_or(ExoSegment::A);
            let b = b
                .input(PortSpec::scalar("phase_duration_a", "s"))
                .input(PortSpec::scalar("phase_duration_b", "s"))
                .input(PortSpec::scalar("delta_theta", "rad"))
                .input(PortSpec::scalar("theta_gt", "rad"))
                .input(PortSpec::scalar("theta_f", "rad"))
                .input(PortSpec::scalar("xi", ""))
                .add("time_exoatmos", ExoTiming { num_nodes: n, segment })
                .connect("phase_duration_a", "time_exoatmos.phase_duration_a")
                .connect("phase_duration_b", "time_exoatmos.phase_duration_b");
            match segment {
                ExoSegment::A => b.input(PortSpec::nodal("phase_time", "s")),
                ExoSegment::B => b
                    .input(PortSpec::nodal("phase_time_b", "s"))
                    .connect("phase_time_b", "time_exoatmos.phase_time_b"),
            }
        }
    };

    let mut b = b.add("guidance", Guidance { num_nodes: n, law });
    for port in law.ports() {
        let source = match (port.name, kind) {
            ("phase_duration", PhaseKind::ExoatmosA | PhaseKind::ExoatmosB) => {
                "time_exoatmos.phase_duration_total"
            }
            ("phase_time", PhaseKind::ExoatmosB) => "time_exoatmos.phase_time_b_shifted",
            (name, _) => name,
        };
        b = b.connect(source, &format!("guidance.{}", port.name));
    }
    b
}

// ---------------------------------------------------------------------------
// Simpson defects
// ---------------------------------------------------------------------------

/// Collocation defects of an order-3 Gauss-Lobatto grid, one row per state
/// and one column per segment:
/// `x_end − x_start − h/6·(f_start + 4 f_mid + f_end)`.
///
/// The transcription engine owns the real defect constraints; these are a
/// consistency diagnostic for a state history and its rates.
pub fn simpson_defects(grid: &Grid, duration: f64, states: &StateHistory, rates: &Values) -> Result<[Vec<f64>; 5]> {
    let h = duration / grid.segments as f64;
    let mut out: [Vec<f64>; 5] = Default::default();
    for (row, (name, rate)) in crate::dynamics::State::NAMES.iter().zip(RATES).enumerate() {
        let x = states.get(name);
        let f = rates.require("simpson_defects", rate)?;
        out[row] = (0..grid.segments)
            .map(|k| {
                let (a, m, e) = grid.segment_nodes(k);
                x[e] - x[a] - h / 6.0 * (f[a] + 4.0 * f[m] + f[e])
            })
            .collect();
    }
    Ok(out)
}

/// Largest defect scaled by the magnitude of its state.
pub fn max_scaled_defect(defects: &[Vec<f64>; 5], states: &StateHistory) -> f64 {
    crate::dynamics::State::NAMES
        .iter()
        .zip(defects)
        .flat_map(|(name, row)| {
            let scale = states.get(name).iter().fold(1.0_f64, |s, x| s.max(x.abs()));
            row.iter().map(move |d| d.abs() / scale)
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::State;
    use crate::jacobian::check_partials;

    fn params() -> PhaseParams {
        PhaseParams {
            thrust_vac: 7.64e6,
            mfr_max: 2_528.0,
            ae_t: 9.34,
            isp: 340.0,
            diameter: 5.0,
            throttle: 1.0,
            duration: 10.0,
            exo_durations: (60.0, 200.0),
            delta_theta: 0.12,
            theta_gt: 0.7,
            theta_f: -0.05,
            xi: -0.25,
        }
    }

    fn history(n: usize, r: f64, v: f64, phi: f64, m: f64) -> StateHistory {
        let states: Vec<State> = (0..n)
            .map(|i| {
                let k = i as f64;
                State { r: r + 50.0 * k, lambda: 1e-5 * k, v: v + 5.0 * k, phi: phi - 0.01 * k, m: m - 100.0 * k }
            })
            .collect();
        StateHistory::from_states(&states)
    }

    #[test]
    fn lift_off_rates_match_closed_form() {
        let earth = Earth::default();
        let ode = PhaseOde::new(PhaseKind::LiftOff, 1, &earth).unwrap();
        let s = StateHistory::from_states(&[State { r: earth.r0, lambda: 0.0, v: 1e-3, phi: FRAC_PI_2, m: 369e3 }]);
        let out = ode.evaluate(&s, &[0.0], &params()).unwrap();
        let thrust = out.first("thrust").unwrap();
        assert!((thrust - (7.64e6 - 9.34 * 101_325.0)).abs() < 5.0, "thrust = {}", thrust);
        let g = earth.gravity(earth.r0);
        let expected = thrust / 369e3 - g + earth.omega * earth.omega * earth.r0;
        assert!((out.first("v_dot").unwrap() - expected).abs() < 1e-6);
        assert!((out.first("m_dot").unwrap() + 2_528.0).abs() < 1e-9);
        assert!((out.first("theta").unwrap() - FRAC_PI_2).abs() < 1e-15);
    }

    #[test]
    fn every_phase_assembles() {
        let earth = Earth::default();
        for kind in PhaseKind::ALL {
            let ode = PhaseOde::new(kind, 3, &earth).unwrap();
            let names: Vec<_> = ode.group().outputs().iter().map(|p| p.name).collect();
            assert!(names.contains(&"v_dot"), "{kind}: {names:?}");
            assert_eq!(names.contains(&"q_dot"), kind.has_qdot(), "{kind}");
            assert_eq!(names.contains(&"m_final"), kind == PhaseKind::ExoatmosB, "{kind}");
        }
    }

    #[test]
    fn pitch_over_totals_match_finite_differences() {
        let earth = Earth::default();
        let ode = PhaseOde::new(PhaseKind::PitchOverLinear, 3, &earth).unwrap();
        let s = history(3, earth.r0 + 300.0, 60.0, 1.55, 380e3);
        let inputs = ode.externals(&s, &[0.0, 5.0, 10.0], &params()).unwrap();
        for c in check_partials(ode.group(), &inputs, 1e-7).unwrap() {
            assert!(c.declared && c.passes(1e-4), "{:?}", c);
        }
    }

    #[test]
    fn exoatmos_b_totals_match_finite_differences() {
        let earth = Earth::default();
        let ode = PhaseOde::new(PhaseKind::ExoatmosB, 3, &earth).unwrap();
        let s = history(3, earth.r0 + 120_333.0, 5_500.0, 0.2, 60e3);
        let p = PhaseParams { thrust_vac: 9.0e5, mfr_max: 270.0, ae_t: 11.7, ..params() };
        let inputs = ode.externals(&s, &[0.0, 100.0, 200.0], &p).unwrap();
        for c in check_partials(ode.group(), &inputs, 1e-7).unwrap() {
            assert!(c.declared && c.passes(1e-4), "{:?}", c);
        }
    }

    #[test]
    fn simpson_defects_vanish_for_quadratic_history() {
        // r = t², r_dot = 2t: Simpson's rule is exact.
        let grid = Grid::new(2);
        let t = grid.times(0.0, 4.0);
        let states: Vec<State> =
            t.iter().map(|&t| State { r: t * t, lambda: 0.0, v: 0.0, phi: 0.0, m: 1.0 }).collect();
        let h = StateHistory::from_states(&states);
        let mut rates = Values::new().with("r_dot", t.iter().map(|t| 2.0 * t).collect());
        for name in ["lambda_dot", "v_dot", "phi_dot", "m_dot"] {
            rates.set(name, vec![0.0; t.len()]);
        }
        let d = simpson_defects(&grid, 4.0, &h, &rates).unwrap();
        assert!(d[0].iter().all(|x| x.abs() < 1e-12), "{:?}", d[0]);
        assert!(max_scaled_defect(&d, &h) < 1e-12);
    }
}
