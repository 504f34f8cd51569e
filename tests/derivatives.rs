//! Analytic Jacobians of the whole model against central differences, at a
//! physically meaningful point of the reference ascent.

use tsto_mdo::jacobian::check::worst;
use tsto_mdo::jacobian::{Component, Partials, PortLayout};
use tsto_mdo::sim::{shoot, ShotPlan};
use tsto_mdo::trajectory::PhaseKind;
use tsto_mdo::{MdoConfig, MdoModel};

#[test]
fn every_model_jacobian_matches_finite_differences() {
    let model = MdoModel::new(&MdoConfig::default()).unwrap();
    let shot = shoot(&model, &ShotPlan::reference(&model).unwrap()).unwrap();
    let report = model.audit_partials(&shot.guess, 1e-7).unwrap();

    // two propulsion stages, two dry masses, eight phases, seven links, coupling
    assert_eq!(report.len(), 2 + 2 + 8 + 7 + 1);
    for (name, checks) in &report {
        assert!(!checks.is_empty(), "{name} reported no partials");
        let w = worst(checks).unwrap();
        assert!(w.declared, "{name}: undeclared dependency {} / {}", w.of, w.wrt);
        // same step and tolerance as the `check-partials` command
        for c in checks {
            assert!(c.passes(1e-5), "{name}: {c:?}");
        }
    }
}

#[test]
fn phase_jacobian_is_node_diagonal() {
    let model = MdoModel::new(&MdoConfig::default()).unwrap();
    let shot = shoot(&model, &ShotPlan::reference(&model).unwrap()).unwrap();
    let eval = model.evaluate(&shot.guess).unwrap();

    let phase = eval.phase(PhaseKind::GravityTurn).unwrap();
    let ode = model.ode(PhaseKind::GravityTurn).group();
    let local: Vec<f64> = phase.times.iter().map(|t| t - phase.t_initial).collect();
    let inputs = model.ode(PhaseKind::GravityTurn).externals(&phase.states, &local, &phase.params).unwrap();

    let mut partials: Partials = ode.new_partials();
    ode.compute_partials(&inputs, &mut partials).unwrap();
    let layout = PortLayout::for_component(ode);
    let dense = partials.to_dense(&layout);

    let n = ode.num_nodes();
    let (v_dot, r) = (layout.row_offset("v_dot").unwrap(), layout.col_offset("r").unwrap());
    for i in 0..n {
        for j in 0..n {
            if i != j {
                assert_eq!(dense[(v_dot + i, r + j)], 0.0);
            }
        }
    }
    assert!((0..n).any(|i| dense[(v_dot + i, r + i)] != 0.0));
}
