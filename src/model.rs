//! Whole-vehicle evaluation: disciplines, the eight phases, links, boundary
//! and coupling constraints for one design point and trajectory guess.
//!
//! The NLP solver and the transcription engine live outside this crate;
//! [`MdoModel::evaluate`] is the call they would make once per iteration.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::MdoConfig;
use crate::coupling::{CouplingInputs, CouplingLayer, CouplingOptions, MassAudit};
use crate::design::DesignPoint;
use crate::dynamics::state::Earth;
use crate::error::{MdoError, Result};
use crate::jacobian::{check_partials, Component, PartialCheck, Values};
use crate::propulsion::{CeaTable, PropulsionStage, StagePerformance};
use crate::sizing::{DryMassBreakdown, DryMassStageOne, DryMassStageTwo};
use crate::trajectory::{
    boundary_constraints, max_scaled_defect, simpson_defects, BoundaryConstraint, PhaseKind, PhaseLink, PhaseOde,
    PhaseParams, StateHistory, TrajectoryGuess, TrajectoryLayout,
};

const V_LIFT_OFF: f64 = 1e-3; // m/s, fixed initial speed

// ---------------------------------------------------------------------------
// Constraint record
// ---------------------------------------------------------------------------

/// One entry of the ordered constraint vector. `lower == upper` is an
/// equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Constraint {
    pub fn equality(name: impl Into<String>, value: f64, target: f64) -> Self {
        Constraint { name: name.into(), value, lower: Some(target), upper: Some(target) }
    }

    pub fn is_equality(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l == u)
    }

    /// Distance outside the bounds; infinite for a non-finite value.
    pub fn violation(&self) -> f64 {
        if !self.value.is_finite() {
            return f64::INFINITY;
        }
        let below = self.lower.map_or(0.0, |l| (l - self.value).max(0.0));
        let above = self.upper.map_or(0.0, |u| (self.value - u).max(0.0));
        below.max(above)
    }
}

// ---------------------------------------------------------------------------
// Evaluation results
// ---------------------------------------------------------------------------

/// Outputs of the algebraic disciplines for one design point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disciplines {
    pub stage_1: StagePerformance,
    pub stage_2: StagePerformance,
    pub dry_mass_1: DryMassBreakdown,
    pub ms_1: f64, // kg
    pub ms_2: f64, // kg
}

/// One evaluated phase.
#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub kind: PhaseKind,
    pub t_initial: f64, // s
    pub times: Vec<f64>, // s, absolute
    pub params: PhaseParams,
    pub states: StateHistory,
    /// Rates and path quantities at every node.
    pub outputs: Values,
    pub max_defect: f64,
}

impl PhaseResult {
    pub fn t_final(&self) -> f64 {
        self.t_initial + self.params.duration
    }

    pub fn last_output(&self, name: &str) -> f64 {
        self.outputs.last(name).unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feasibility {
    pub max_violation: f64,
    pub worst: Option<String>,
    /// Design variables outside their bounds, with the distance.
    pub design_violations: Vec<(&'static str, f64)>,
    /// Largest scaled collocation defect over every phase.
    pub max_defect: f64,
    pub non_finite: Vec<String>,
}

impl Feasibility {
    pub fn is_feasible(&self, tol: f64) -> bool {
        self.max_violation <= tol && self.design_violations.is_empty() && self.non_finite.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub design: DesignPoint,
    /// Initial lift-off mass, minimized.
    pub objective: f64,
    pub constraints: Vec<Constraint>,
    pub disciplines: Disciplines,
    pub phases: Vec<PhaseResult>,
    pub coupling: CouplingInputs,
    pub audit: MassAudit,
    pub feasibility: Feasibility,
}

impl Evaluation {
    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.kind == kind)
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Largest dynamic pressure over the whole ascent.
    pub fn max_q_dyn(&self) -> f64 {
        self.phases
            .iter()
            .flat_map(|p| p.outputs.get("q_dyn").unwrap_or(&[]).iter().copied())
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Every discipline and constraint of the vehicle, built once from a
/// configuration and evaluated many times.
#[derive(Debug)]
pub struct MdoModel {
    config: MdoConfig,
    layout: TrajectoryLayout,
    propulsion: [PropulsionStage; 2],
    stage_one: DryMassStageOne,
    odes: Vec<PhaseOde>,
    links: Vec<PhaseLink>,
    boundaries: Vec<BoundaryConstraint>,
    coupling: CouplingLayer,
}

impl MdoModel {
    pub fn new(config: &MdoConfig) -> Result<Self> {
        let table = match &config.tables.cea_table {
            Some(path) => CeaTable::load(path)?,
            None => CeaTable::bundled()?,
        };
        Self::with_table(config, table.shared())
    }

    /// Build around an already loaded combustion table.
    pub fn with_table(config: &MdoConfig, table: Arc<CeaTable>) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();
        layout.validate()?;
        let chemistry = config.chemistry();
        let v = &config.vehicle;
        let propulsion = [
            PropulsionStage::new("propulsion_1", Arc::clone(&table), chemistry, v.nb_engines_1)?,
            PropulsionStage::new("propulsion_2", table, chemistry, v.nb_engines_2)?,
        ];
        let coupling = CouplingLayer::new(&CouplingOptions {
            mplf: v.mplf,
            md: v.md,
            area_factor_1: v.area_factor_1,
            area_factor_2: v.area_factor_2,
        })?;
        let model = MdoModel {
            config: config.clone(),
            layout,
            propulsion,
            stage_one: DryMassStageOne::new(v.sizing())?,
            odes: layout.build_odes(&config.earth)?,
            links: PhaseLink::all(),
            boundaries: boundary_constraints(&config.earth, &config.targets),
            coupling,
        };
        info!("model built: {} phases, {} nodes", model.odes.len(), layout.total_nodes());
        Ok(model)
    }

    pub fn config(&self) -> &MdoConfig {
        &self.config
    }

    pub fn earth(&self) -> &Earth {
        &self.config.earth
    }

    pub fn layout(&self) -> &TrajectoryLayout {
        &self.layout
    }

    pub fn ode(&self, kind: PhaseKind) -> &PhaseOde {
        &self.odes[kind.index()]
    }

    pub fn propulsion(&self, stage: u8) -> &PropulsionStage {
        &self.propulsion[if stage == 1 { 0 } else { 1 }]
    }

    pub fn disciplines(&self, design: &DesignPoint) -> Result<Disciplines> {
        let stage_1 = self.propulsion[0].performance(&design.engine(1))?;
        let stage_2 = self.propulsion[1].performance(&design.engine(2))?;
        let dry_mass_1 = self.stage_one.breakdown(&design.stage_one_loads())?;
        Ok(Disciplines {
            stage_1,
            stage_2,
            dry_mass_1,
            ms_1: dry_mass_1.total,
            ms_2: DryMassStageTwo::dry_mass(design.mp_2),
        })
    }

    /// Constants a phase needs from the design point and its stage.
    pub fn phase_params(
        &self,
        kind: PhaseKind,
        design: &DesignPoint,
        disciplines: &Disciplines,
        duration: f64,
        theta_gt: f64,
    ) -> PhaseParams {
        let perf = if kind.stage() == 1 { &disciplines.stage_1 } else { &disciplines.stage_2 };
        let delta_theta = match kind {
            PhaseKind::PitchOverLinear | PhaseKind::PitchOverExponential => design.delta_theta_pitch_over,
            _ => design.delta_theta_exoatmos,
        };
        PhaseParams {
            thrust_vac: design.engine(kind.stage()).thrust,
            mfr_max: perf.mfr_max,
            ae_t: perf.ae_t,
            isp: perf.isp,
            diameter: design.diameter,
            throttle: 1.0,
            duration,
            exo_durations: (design.duration_exoatmos_a, design.duration_exoatmos_b),
            delta_theta,
            theta_gt,
            theta_f: design.theta_f,
            xi: design.xi,
        }
    }

    /// Phase duration: the guess for the endoatmospheric phases, the design
    /// point for the two exoatmospheric ones.
    pub fn duration(kind: PhaseKind, design: &DesignPoint, guess_duration: f64) -> f64 {
        match kind {
            PhaseKind::ExoatmosA => design.duration_exoatmos_a,
            PhaseKind::ExoatmosB => design.duration_exoatmos_b,
            _ => guess_duration,
        }
    }

    /// Objective, ordered constraints and a feasibility report. Infeasible
    /// or non-finite results are reported, never raised.
    pub fn evaluate(&self, guess: &TrajectoryGuess) -> Result<Evaluation> {
        guess.check(&self.layout)?;
        let design = guess.design;
        let disciplines = self.disciplines(&design)?;
        debug!(
            "disciplines: Isp {:.1}/{:.1} s, ms {:.1}/{:.1} kg",
            disciplines.stage_1.isp, disciplines.stage_2.isp, disciplines.ms_1, disciplines.ms_2
        );

        let phases = self.evaluate_phases(guess, &disciplines)?;
        let coupling = self.coupling_inputs(&design, &disciplines, &phases)?;

        let mut constraints = Vec::new();
        constraints.extend(self.initial_constraints(&phases[0]));
        constraints.extend(self.duration_constraints(&phases));
        for link in &self.links {
            constraints.extend(self.link_constraints(link, &phases)?);
        }
        for b in &self.boundaries {
            let p = &phases[b.phase.index()];
            constraints.push(b.evaluate(&p.states, &p.outputs));
        }
        for (name, value) in self.coupling.residuals(&coupling)? {
            constraints.push(Constraint { name: name.to_string(), value, lower: Some(0.0), upper: None });
        }

        let objective = coupling.mf_a;
        let m_end = phases[PhaseKind::ExoatmosB.index()].states.last().map_or(f64::NAN, |s| s.m);
        let audit = MassAudit::new(&coupling, m_end, self.config.vehicle.mplf, self.config.vehicle.md);
        let feasibility = self.feasibility(&design, objective, &constraints, &phases);

        Ok(Evaluation { design, objective, constraints, disciplines, phases, coupling, audit, feasibility })
    }

    fn evaluate_phases(&self, guess: &TrajectoryGuess, disciplines: &Disciplines) -> Result<Vec<PhaseResult>> {
        let design = &guess.design;
        let mut theta_gt = f64::NAN;
        let mut out = Vec::with_capacity(PhaseKind::ALL.len());
        for (p, ode) in guess.phases.iter().zip(&self.odes) {
            let grid = self.layout.grid(p.phase);
            let duration = Self::duration(p.phase, design, p.t_duration);
            let params = self.phase_params(p.phase, design, disciplines, duration, theta_gt);
            let local = grid.times(0.0, duration);
            let outputs = ode.evaluate(&p.states, &local, &params)?;
            let defects = simpson_defects(&grid, duration, &p.states, &outputs)?;
            let max_defect = max_scaled_defect(&defects, &p.states);
            debug!("{}: {} nodes over {:.2} s, max scaled defect {:.3e}", p.phase, ode.num_nodes, duration, max_defect);
            if p.phase == PhaseKind::GravityTurnC {
                theta_gt = outputs.last("theta").unwrap_or(f64::NAN);
            }
            out.push(PhaseResult {
                kind: p.phase,
                t_initial: p.t_initial,
                times: local.iter().map(|t| p.t_initial + t).collect(),
                params,
                states: p.states.clone(),
                outputs,
                max_defect,
            });
        }
        Ok(out)
    }

    /// Boundary values the coupling layer reads, gathered from the phases.
    pub fn coupling_inputs(
        &self,
        design: &DesignPoint,
        disciplines: &Disciplines,
        phases: &[PhaseResult],
    ) -> Result<CouplingInputs> {
        let at = |kind: PhaseKind| phase_at(phases, kind);
        let first_m = |p: &PhaseResult| p.states.m.first().copied().unwrap_or(f64::NAN);
        let last_m = |p: &PhaseResult| p.states.m.last().copied().unwrap_or(f64::NAN);
        Ok(CouplingInputs {
            mf_a: first_m(at(PhaseKind::LiftOff)?),
            me_a: last_m(at(PhaseKind::GravityTurnB)?),
            mf_b: first_m(at(PhaseKind::GravityTurnC)?),
            mi_b: last_m(at(PhaseKind::ExoatmosA)?),
            mi_c: first_m(at(PhaseKind::ExoatmosB)?),
            m_final: at(PhaseKind::ExoatmosB)?.last_output("m_final"),
            n_f_end_1: at(PhaseKind::GravityTurnB)?.last_output("n_f"),
            q_dyn_end_gravity_turn: at(PhaseKind::GravityTurn)?.last_output("q_dyn"),
            ms_1: disciplines.ms_1,
            ms_2: disciplines.ms_2,
            ae_t_1: disciplines.stage_1.ae_t,
            ae_t_2: disciplines.stage_2.ae_t,
            mp_1: design.mp_1,
            mp_2: design.mp_2,
            max_n_f_1: design.max_n_f_1,
            max_q_dyn_1: design.max_q_dyn_1,
            diameter: design.diameter,
        })
    }

    fn initial_constraints(&self, lift_off: &PhaseResult) -> Vec<Constraint> {
        let s = lift_off.states.first();
        let value = |f: fn(&crate::dynamics::State) -> f64| s.as_ref().map_or(f64::NAN, f);
        vec![
            Constraint::equality("lift_off.initial.r", value(|s| s.r), self.config.earth.r0),
            Constraint::equality("lift_off.initial.lambda", value(|s| s.lambda), 0.0),
            Constraint::equality("lift_off.initial.v", value(|s| s.v), V_LIFT_OFF),
            Constraint::equality("lift_off.initial.phi", value(|s| s.phi), FRAC_PI_2),
        ]
    }

    fn duration_constraints(&self, phases: &[PhaseResult]) -> Vec<Constraint> {
        phases
            .iter()
            .filter(|p| p.kind.exo_segment().is_none())
            .map(|p| {
                let (lower, upper) = self.config.settings(p.kind).duration;
                Constraint {
                    name: format!("{}.duration", p.kind),
                    value: p.params.duration,
                    lower: Some(lower),
                    upper: Some(upper),
                }
            })
            .collect()
    }

    fn link_constraints(&self, link: &PhaseLink, phases: &[PhaseResult]) -> Result<Vec<Constraint>> {
        let (a, b) = (&phases[link.from.index()], &phases[link.to.index()]);
        let (Some(end), Some(start)) = (a.states.last(), b.states.first()) else {
            return Err(MdoError::GuessMismatch { phase: link.from.to_string(), reason: "empty state history".into() });
        };
        let out = link.compute(&link.boundary_values(a.t_final(), &end, b.t_initial, &start))?;
        Ok(link
            .residuals()
            .into_iter()
            .map(|res| Constraint::equality(format!("{}.{}", link.name(), res), out.first(res).unwrap_or(f64::NAN), 0.0))
            .collect())
    }

    fn feasibility(
        &self,
        design: &DesignPoint,
        objective: f64,
        constraints: &[Constraint],
        phases: &[PhaseResult],
    ) -> Feasibility {
        let mut report = Feasibility {
            design_violations: self.config.design.violations(design),
            max_defect: phases.iter().map(|p| p.max_defect).fold(0.0, f64::max),
            ..Feasibility::default()
        };
        for c in constraints {
            if !c.value.is_finite() {
                report.non_finite.push(c.name.clone());
            }
            let v = c.violation();
            if v > report.max_violation {
                report.max_violation = v;
                report.worst = Some(c.name.clone());
            }
        }
        if !objective.is_finite() {
            report.non_finite.insert(0, "objective".to_string());
        }
        if !report.non_finite.is_empty() {
            warn!("non-finite values in evaluation: {}", report.non_finite.join(", "));
        }
        debug!(
            "max violation {:.3e} ({}), {} design bounds violated",
            report.max_violation,
            report.worst.as_deref().unwrap_or("-"),
            report.design_violations.len()
        );
        report
    }

    /// Finite-difference audit of every component and group the model
    /// evaluates, at the point `guess` describes.
    pub fn audit_partials(&self, guess: &TrajectoryGuess, rel_step: f64) -> Result<Vec<(String, Vec<PartialCheck>)>> {
        let eval = self.evaluate(guess)?;
        let design = &eval.design;
        let mut report = Vec::new();
        let mut run = |name: String, c: &dyn Component, inputs: &Values| -> Result<()> {
            report.push((name, check_partials(c, inputs, rel_step)?));
            Ok(())
        };

        for stage in [1u8, 2] {
            let p = self.propulsion(stage);
            run(format!("propulsion_{stage}"), p.group(), &PropulsionStage::inputs(&design.engine(stage)))?;
        }
        run(
            "dry_mass_stage_1".to_string(),
            self.stage_one.group(),
            &DryMassStageOne::inputs(&design.stage_one_loads()),
        )?;
        run("dry_mass_stage_2".to_string(), &DryMassStageTwo, &Values::new().with_scalar("mp_2", design.mp_2))?;

        for (phase, ode) in eval.phases.iter().zip(&self.odes) {
            let local: Vec<f64> = phase.times.iter().map(|t| t - phase.t_initial).collect();
            let inputs = ode.externals(&phase.states, &local, &phase.params)?;
            run(phase.kind.to_string(), ode.group(), &inputs)?;
        }
        for link in &self.links {
            let (a, b) = (&eval.phases[link.from.index()], &eval.phases[link.to.index()]);
            if let (Some(end), Some(start)) = (a.states.last(), b.states.first()) {
                run(link.name().to_string(), link, &link.boundary_values(a.t_final(), &end, b.t_initial, &start))?;
            }
        }
        run("coupling".to_string(), self.coupling.group(), &CouplingLayer::inputs(&eval.coupling))?;
        Ok(report)
    }
}

fn phase_at(phases: &[PhaseResult], kind: PhaseKind) -> Result<&PhaseResult> {
    phases.get(kind.index()).filter(|p| p.kind == kind).ok_or_else(|| MdoError::GuessMismatch {
        phase: kind.to_string(),
        reason: "phase missing from the evaluation".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::manual_guess;

    fn model() -> MdoModel {
        MdoModel::new(&MdoConfig::default()).unwrap()
    }

    #[test]
    fn violation_measures_distance_outside_bounds() {
        let c = Constraint { name: "c".into(), value: 5.0, lower: Some(0.0), upper: Some(3.0) };
        assert!((c.violation() - 2.0).abs() < 1e-12);
        let c = Constraint { value: -1.0, ..c };
        assert!((c.violation() - 1.0).abs() < 1e-12);
        let c = Constraint { value: f64::NAN, ..c };
        assert!(c.violation().is_infinite());
        assert!(Constraint::equality("e", 1.0, 1.0).is_equality());
        assert!(Constraint::equality("e", 1.0, 1.0).violation() == 0.0);
    }

    #[test]
    fn reference_disciplines() {
        let m = model();
        let d = m.disciplines(&m.config().design.point()).unwrap();
        assert!((d.ms_1 - 28_693.7).abs() < 50.0, "ms_1 = {}", d.ms_1);
        assert!((d.ms_2 - 0.8 * (1000.0 * 70_174.74_f64).sqrt()).abs() < 1e-6);
        assert!(d.stage_1.isp > 250.0 && d.stage_1.isp < 340.0, "Isp_1 = {}", d.stage_1.isp);
        assert!(d.stage_2.isp > d.stage_1.isp, "vacuum stage should beat the booster");
    }

    #[test]
    fn manual_guess_evaluates_in_order() {
        let m = model();
        let guess = manual_guess(m.earth(), m.layout(), &m.config().design.point());
        let eval = m.evaluate(&guess).unwrap();

        assert!((eval.objective - 400e3).abs() < 1e-9);
        assert_eq!(eval.phases.len(), 8);
        assert_eq!(eval.constraints[0].name, "lift_off.initial.r");

        // initial state, endoatmospheric durations, links, boundaries, coupling
        let links: usize = PhaseLink::all().iter().map(|l| l.residuals().len()).sum();
        assert_eq!(links, 5 * 6 + 2 * 5);
        assert_eq!(eval.constraints.len(), 4 + 6 + links + 6 + 9);
        let last = eval.constraints.last().unwrap();
        assert_eq!(last.name, "residual_max_n_f_1");

        // manual guess is continuous in every state except at the jettisons
        let link = eval.constraint("link_lift_off_pitch_over_linear.r_link").unwrap();
        assert!(link.value.abs() < 1e-6, "{link:?}");
        assert!(eval.feasibility.max_defect > 0.0);
        assert!(eval.feasibility.max_violation > 0.0);
    }

    #[test]
    fn theta_gt_flows_from_gravity_turn_c() {
        let m = model();
        let guess = manual_guess(m.earth(), m.layout(), &m.config().design.point());
        let eval = m.evaluate(&guess).unwrap();
        let gtc = eval.phase(PhaseKind::GravityTurnC).unwrap();
        let exo = eval.phase(PhaseKind::ExoatmosA).unwrap();
        assert!((exo.params.theta_gt - gtc.last_output("theta")).abs() < 1e-12);
        assert!(exo.params.theta_gt.is_finite());
        assert!((exo.params.duration - guess.design.duration_exoatmos_a).abs() < 1e-12);
    }

    #[test]
    fn mismatched_guess_is_an_error() {
        let m = model();
        let mut guess = manual_guess(m.earth(), m.layout(), &m.config().design.point());
        guess.phases.swap(0, 1);
        assert!(matches!(m.evaluate(&guess), Err(MdoError::GuessMismatch { .. })));
    }
}
