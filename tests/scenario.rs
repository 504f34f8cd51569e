//! End-to-end: reference vehicle, forward-shot ascent, full evaluation.

use approx::assert_abs_diff_eq;

use tsto_mdo::io::{self, EvaluationSummary};
use tsto_mdo::sim::{coast, shoot, EventKind, ShotPlan, SPACE_ALTITUDE};
use tsto_mdo::trajectory::PhaseKind;
use tsto_mdo::vehicle::presets;
use tsto_mdo::{MdoConfig, MdoModel};

fn model() -> MdoModel {
    MdoModel::new(&MdoConfig::default()).unwrap()
}

#[test]
fn reference_config_file_matches_defaults() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/reference.toml");
    let c = MdoConfig::load(path).unwrap();
    let d = MdoConfig::default();
    assert_eq!(c.earth, d.earth);
    assert_eq!(c.vehicle, d.vehicle);
    assert_eq!(c.design, d.design);
    assert_eq!(c.targets, d.targets);
    assert_eq!(c.layout(), d.layout());
    for kind in PhaseKind::ALL {
        assert_eq!(c.settings(kind), d.settings(kind), "{kind}");
    }
}

#[test]
fn forward_shot_reaches_orbit() {
    let model = model();
    let plan = ShotPlan::reference(&model).unwrap();
    let shot = shoot(&model, &plan).unwrap();
    let earth = model.earth();

    let end = shot.final_state;
    let h = earth.altitude(end.r);
    assert!(h > 100e3, "final altitude {h}");
    assert!(end.v > 6_500.0, "final speed {}", end.v);

    // lift-off mass is the sum of both stages, fairing and payload
    let d = model.disciplines(&plan.design).unwrap();
    let v = &model.config().vehicle;
    let m0 = plan.design.mp_1 + d.ms_1 + plan.design.mp_2 + d.ms_2 + v.mplf + v.md;
    assert_abs_diff_eq!(shot.guess.phases[0].states.m[0], m0, epsilon = 1e-6);
    // the optimized vehicle lifts off at 390 to 410 t; this unconverged
    // shot of the default design point sits lower
    assert!(m0 > 360e3 && m0 < 380e3, "m0 = {m0}");

    let jettisons: Vec<f64> = shot
        .events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Jettison { mass } => Some(mass),
            _ => None,
        })
        .collect();
    assert_eq!(jettisons.len(), 2);
    assert_abs_diff_eq!(jettisons[0], d.ms_1, epsilon = 1e-9);
    assert_abs_diff_eq!(jettisons[1], v.mplf, epsilon = 1e-9);

    let crossings: Vec<_> = shot
        .events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Altitude { ascending: true, .. }))
        .collect();
    assert_eq!(crossings.len(), 1);
    assert!(earth.altitude(crossings[0].state.r) >= SPACE_ALTITUDE);
    assert!(crossings[0].time > 0.0 && crossings[0].time <= shot.events.last().unwrap().time);

    let (_, apogee) = coast(earth, &end, 1.0, 6_000.0).unwrap();
    if let Some(a) = apogee {
        assert!(a.state.r >= end.r - 1.0);
    }
}

#[test]
fn shot_evaluation_is_consistent() {
    let model = model();
    let shot = shoot(&model, &ShotPlan::reference(&model).unwrap()).unwrap();
    let eval = model.evaluate(&shot.guess).unwrap();

    // the shot is continuous, so every link closes
    for c in eval.constraints.iter().filter(|c| c.name.starts_with("link_")) {
        assert!(c.value.abs() < 1e-6, "{} = {}", c.name, c.value);
    }
    for c in eval.constraints.iter().filter(|c| c.name.starts_with("lift_off.initial.")) {
        assert!(c.violation() < 1e-9, "{c:?}");
    }

    // jettisons are exact; the burn itself is not converged
    assert_abs_diff_eq!(eval.audit.stage_jettison, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(eval.audit.fairing_jettison, 0.0, epsilon = 1e-6);
    assert!(eval.audit.circularization > 0.0);

    // first-stage propellant is burnt to depletion
    let mp_1 = eval.constraint("residual_mp_1").unwrap();
    assert!(mp_1.value.abs() < 1.0, "{mp_1:?}");

    let summary = EvaluationSummary::from_evaluation(model.earth(), &eval);
    assert!(summary.apogee_altitude > 200e3 && summary.apogee_altitude < 800e3, "{summary:?}");
    assert!(summary.max_q_dyn > 1e4 && summary.max_q_dyn < 1e5, "{summary:?}");
    assert!(summary.m_final > 0.0 && summary.m_final < eval.coupling.mi_c);
    assert!(eval.feasibility.design_violations.is_empty(), "{:?}", eval.feasibility.design_violations);
    assert!(eval.feasibility.non_finite.is_empty(), "{:?}", eval.feasibility.non_finite);
    assert!(eval.feasibility.max_defect < 1e-2, "defect {}", eval.feasibility.max_defect);

    let tsto = presets::from_evaluation("reference", &eval, &model.config().vehicle);
    assert_abs_diff_eq!(tsto.lift_off_mass(), eval.objective, epsilon = 1e-6);
    assert!(tsto.lift_off_thrust_to_weight() > 1.0);
    assert!(tsto.total_delta_v() > 7_500.0);
}

#[test]
fn exported_timeseries_covers_every_node() {
    let model = model();
    let shot = shoot(&model, &ShotPlan::reference(&model).unwrap()).unwrap();
    let eval = model.evaluate(&shot.guess).unwrap();
    let rows = io::timeseries(model.earth(), &eval);
    assert_eq!(rows.len(), model.layout().total_nodes());
    assert!(rows.windows(2).all(|w| w[1].time >= w[0].time));
    assert!(rows.iter().all(|r| r.q_dyn.is_finite() && r.theta.is_finite()));

    let mut buf = Vec::new();
    io::write_timeseries(&mut buf, &rows).unwrap();
    let back = io::read_timeseries(buf.as_slice()).unwrap();
    assert_eq!(back.len(), rows.len());
    assert_eq!(back.last().unwrap().phase, "exoatmos_b");
}
