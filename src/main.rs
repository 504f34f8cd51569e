use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use tsto_mdo::io::{self, EvaluationSummary};
use tsto_mdo::jacobian::check::worst;
use tsto_mdo::model::{Evaluation, MdoModel};
use tsto_mdo::sim::{coast, shoot, EventKind, Shot, ShotPlan};
use tsto_mdo::trajectory::{manual_guess, TrajectoryGuess};
use tsto_mdo::vehicle::presets;
use tsto_mdo::MdoConfig;

#[derive(Parser)]
#[command(author, version, about = "Two-stage-to-orbit MDO model evaluation")]
struct Cli {
    /// TOML configuration (defaults to the reference vehicle)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate objective, disciplines and constraints
    Evaluate {
        #[arg(long, value_enum, default_value_t = GuessSource::Shot)]
        guess: GuessSource,

        /// Read the initial guess from a JSON file instead
        #[arg(long)]
        guess_file: Option<PathBuf>,

        /// Print a JSON summary instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Compare every analytic Jacobian with finite differences
    CheckPartials {
        /// Relative central-difference step
        #[arg(long, default_value_t = 1e-7)]
        step: f64,

        /// Error above which a partial is reported as failing
        #[arg(long, default_value_t = 1e-5)]
        tol: f64,
    },
    /// Write the shot trajectory as CSV and the initial guess as JSON
    Export {
        #[arg(long, default_value = "trajectory.csv")]
        csv: PathBuf,

        #[arg(long, default_value = "guess.json")]
        guess: PathBuf,
    },
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum GuessSource {
    /// Forward-shot reference ascent
    Shot,
    /// Straight lines between hand-picked phase endpoints
    Manual,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => MdoConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => MdoConfig::default(),
    };
    let model = MdoModel::new(&config).context("building the model")?;

    match cli.command {
        Command::Evaluate { guess, guess_file, json } => {
            let (shot, guess) = match (guess_file, guess) {
                (Some(path), _) => (None, io::load_guess(&path, model.layout())?),
                (None, GuessSource::Manual) => {
                    (None, manual_guess(model.earth(), model.layout(), &config.design.point()))
                }
                (None, GuessSource::Shot) => {
                    let shot = shoot(&model, &ShotPlan::reference(&model)?)?;
                    let guess = shot.guess.clone();
                    (Some(shot), guess)
                }
            };
            let eval = model.evaluate(&guess)?;
            if json {
                let summary = EvaluationSummary::from_evaluation(model.earth(), &eval);
                io::write_summary(std::io::stdout().lock(), &summary)?;
                println!();
            } else {
                print_report(&model, &eval, shot.as_ref())?;
            }
        }
        Command::CheckPartials { step, tol } => {
            let guess = reference_guess(&model)?;
            check_partials(&model, &guess, step, tol)?;
        }
        Command::Export { csv, guess } => {
            let shot = shoot(&model, &ShotPlan::reference(&model)?)?;
            let eval = model.evaluate(&shot.guess)?;
            let rows = io::timeseries(model.earth(), &eval);
            io::write_timeseries_file(&csv, &rows).with_context(|| format!("writing {}", csv.display()))?;
            io::save_guess(&guess, &shot.guess).with_context(|| format!("writing {}", guess.display()))?;
            println!("  {} rows -> {}", rows.len(), csv.display());
            println!("  initial guess -> {}", guess.display());
        }
    }
    Ok(())
}

fn reference_guess(model: &MdoModel) -> anyhow::Result<TrajectoryGuess> {
    Ok(shoot(model, &ShotPlan::reference(model)?)?.guess)
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

fn rule() {
    println!("  ──────────────────────────────────────────────────────────────────");
}

fn print_report(model: &MdoModel, eval: &Evaluation, shot: Option<&Shot>) -> anyhow::Result<()> {
    let earth = model.earth();
    let tsto = presets::from_evaluation("TSTO", eval, &model.config().vehicle);
    let summary = EvaluationSummary::from_evaluation(earth, eval);

    println!();
    println!("====================================================================");
    println!("  TSTO MDO EVALUATION — {}", tsto.name);
    println!("====================================================================");
    println!();
    println!("  Vehicle");
    rule();
    for s in [&tsto.stage_1, &tsto.stage_2] {
        println!(
            "  {:<8} ms {:>9.1} kg   mp {:>9.1} kg   T {:>10.0} N   Isp {:>6.1} s",
            s.name, s.dry_mass, s.propellant_mass, s.thrust, s.isp
        );
        println!(
            "           burn {:>6.1} s     eps_s {:>6.4}     Ae_t {:>7.3} m^2   Δv {:>6.0} m/s",
            s.burn_time(),
            s.structural_coefficient(),
            s.ae_t,
            s.delta_v(0.0)
        );
    }
    println!(
        "  Lift-off mass: {:>9.1} kg   T/W {:>5.2}   upper T/W {:>5.2}   total Δv {:>6.0} m/s",
        tsto.lift_off_mass(),
        tsto.lift_off_thrust_to_weight(),
        tsto.upper_thrust_to_weight(),
        tsto.total_delta_v()
    );
    println!();

    if let Some(shot) = shot {
        println!("  Flight Events");
        rule();
        for e in &shot.events {
            let label = match &e.kind {
                EventKind::PhaseStart(kind) => format!("START {kind}"),
                EventKind::Jettison { mass } => format!("JETTISON {mass:.0} kg"),
                EventKind::Burnout => "BURNOUT".to_string(),
                EventKind::Apogee => "APOGEE".to_string(),
                EventKind::Altitude { altitude, .. } => format!("ALTITUDE {altitude:.0} m"),
            };
            println!(
                "  t={:>6.1}s  alt={:>9.0}m  vel={:>7.1}m/s  m={:>9.1}kg  {}",
                e.time,
                earth.altitude(e.state.r),
                e.state.v,
                e.state.m,
                label
            );
        }
        let (_, apogee) = coast(earth, &shot.final_state, 1.0, 6_000.0)?;
        if let Some(a) = apogee {
            println!("  coast to apogee: +{:.0} s, alt {:.1} km", a.time, earth.altitude(a.state.r) / 1e3);
        }
        println!();
    }

    println!("  Phases");
    rule();
    println!(
        "  {:<24} {:>7} {:>8} {:>9} {:>8} {:>10}",
        "phase", "t0 (s)", "dur (s)", "alt (km)", "v (m/s)", "defect"
    );
    for p in &eval.phases {
        let end = p.states.last();
        println!(
            "  {:<24} {:>7.1} {:>8.2} {:>9.2} {:>8.0} {:>10.2e}",
            p.kind.to_string(),
            p.t_initial,
            p.params.duration,
            end.map_or(f64::NAN, |s| earth.altitude(s.r) / 1e3),
            end.map_or(f64::NAN, |s| s.v),
            p.max_defect
        );
    }
    println!();

    println!("  Constraints");
    rule();
    let bound = |b: Option<f64>| b.map_or("-".to_string(), |v| format!("{v:.4e}"));
    for c in &eval.constraints {
        let flag = if c.violation() > 1e-6 { "  !" } else { "" };
        println!(
            "  {:<48} {:>12.4e}  [{:>11}, {:>11}]{}",
            c.name,
            c.value,
            bound(c.lower),
            bound(c.upper),
            flag
        );
    }
    println!();

    println!("  Performance Summary");
    rule();
    println!("  Objective (m0):  {:>10.1} kg", eval.objective);
    println!(
        "  Final orbit:     {:>10.1} km x {:.1} km   (h {:.1} km, v {:.0} m/s)",
        summary.apogee_altitude / 1e3,
        summary.perigee_altitude / 1e3,
        summary.final_altitude / 1e3,
        summary.final_speed
    );
    println!("  m_final:         {:>10.1} kg", summary.m_final);
    println!("  Max q_dyn:       {:>10.1} Pa", summary.max_q_dyn);
    let a = &eval.audit;
    println!(
        "  Mass audit:      stage {:.2} kg, fairing {:.2} kg, circularization {:.1} kg, final {:.2} kg",
        a.stage_jettison, a.fairing_jettison, a.circularization, a.final_mass
    );
    let f = &eval.feasibility;
    println!(
        "  Max violation:   {:>10.3e}  ({})",
        f.max_violation,
        f.worst.as_deref().unwrap_or("-")
    );
    println!("  Max defect:      {:>10.3e}", f.max_defect);
    for (name, v) in &f.design_violations {
        println!("  design bound:    {name} outside by {v:.4e}");
    }
    if !f.non_finite.is_empty() {
        println!("  non-finite:      {}", f.non_finite.join(", "));
    }
    println!();
    Ok(())
}

fn check_partials(model: &MdoModel, guess: &TrajectoryGuess, step: f64, tol: f64) -> anyhow::Result<()> {
    let report = model.audit_partials(guess, step)?;

    println!();
    println!("  Partial derivative check (step {step:.1e}, tol {tol:.1e})");
    rule();
    println!("  {:<40} {:>6} {:>6} {:>11}  worst pair", "component", "pairs", "fail", "max error");
    let mut failing = 0;
    for (name, checks) in &report {
        let fails = checks.iter().filter(|c| !c.passes(tol)).count();
        failing += fails;
        match worst(checks) {
            Some(w) => println!(
                "  {:<40} {:>6} {:>6} {:>11.3e}  {} / {}{}",
                name,
                checks.len(),
                fails,
                w.error,
                w.of,
                w.wrt,
                if w.declared { "" } else { " (undeclared)" }
            ),
            None => println!("  {:<40} {:>6} {:>6} {:>11}", name, 0, 0, "-"),
        }
    }
    println!();
    if failing > 0 {
        anyhow::bail!("{failing} partials above {tol:e}");
    }
    println!("  all partials within {tol:.1e}");
    Ok(())
}
