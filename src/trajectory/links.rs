use crate::dynamics::state::State;
use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

use super::phase::PhaseKind;

/// `(variable, value at end of the earlier phase, value at start of the
/// later one, residual)`. Mass comes last so jettison links can drop it.
static LINKED: [(&str, &str, &str, &str); 6] = [
    ("time", "time_end", "time_start", "time_link"),
    ("r", "r_end", "r_start", "r_link"),
    ("lambda", "lambda_end", "lambda_start", "lambda_link"),
    ("v", "v_end", "v_start", "v_link"),
    ("phi", "phi_end", "phi_start", "phi_link"),
    ("m", "m_end", "m_start", "m_link"),
];

/// Continuity residuals `x_start(next) − x_end(prev)` across one phase
/// boundary, all with lower = upper = 0 and unit Jacobians.
///
/// Mass is left out where a stage or the fairing is dropped; that jump is
/// checked by the coupling layer instead.
#[derive(Debug, Clone)]
pub struct PhaseLink {
    pub from: PhaseKind,
    pub to: PhaseKind,
    name: String,
}

impl PhaseLink {
    pub fn new(from: PhaseKind) -> Option<Self> {
        from.next().map(|to| PhaseLink { from, to, name: format!("link_{from}_{to}") })
    }

    /// Links of the whole ascent, in flight order.
    pub fn all() -> Vec<PhaseLink> {
        PhaseKind::ALL.into_iter().filter_map(PhaseLink::new).collect()
    }

    pub fn linked(&self) -> &'static [(&'static str, &'static str, &'static str, &'static str)] {
        if self.from.ends_with_jettison() {
            &LINKED[..5]
        } else {
            &LINKED
        }
    }

    /// Residual names, in output order.
    pub fn residuals(&self) -> Vec<&'static str> {
        self.linked().iter().map(|l| l.3).collect()
    }

    /// Component inputs from the two boundary states.
    pub fn boundary_values(&self, t_end: f64, end: &State, t_start: f64, start: &State) -> Values {
        let value = |var: &str, t: f64, s: &State| match var {
            "time" => t,
            "r" => s.r,
            "lambda" => s.lambda,
            "v" => s.v,
            "phi" => s.phi,
            _ => s.m,
        };
        self.linked().iter().fold(Values::new(), |v, &(var, e, st, _)| {
            v.with_scalar(e, value(var, t_end, end)).with_scalar(st, value(var, t_start, start))
        })
    }
}

impl Component for PhaseLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        self.linked()
            .iter()
            .flat_map(|&(_, e, s, _)| [PortSpec::scalar(e, ""), PortSpec::scalar(s, "")])
            .collect()
    }

    fn outputs(&self) -> Vec<PortSpec> {
        self.linked().iter().map(|l| PortSpec::scalar(l.3, "")).collect()
    }

    fn declare_partials(&self) -> SparsityTemplate {
        self.linked().iter().fold(SparsityTemplate::new(), |t, &(_, e, s, res)| {
            t.declare_fixed(res, s, Pattern::Single, 1.0).declare_fixed(res, e, Pattern::Single, -1.0)
        })
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let mut out = Values::new();
        for &(_, e, s, res) in self.linked() {
            out.set_scalar(res, inputs.scalar(&self.name, s)? - inputs.scalar(&self.name, e)?);
        }
        Ok(out)
    }

    fn compute_partials(&self, _inputs: &Values, _partials: &mut Partials) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    fn state(m: f64) -> State {
        State { r: 6.44e6, lambda: 0.01, v: 3_000.0, phi: 0.5, m }
    }

    #[test]
    fn seven_links_with_two_mass_free() {
        let links = PhaseLink::all();
        assert_eq!(links.len(), 7);
        let without_mass: Vec<_> =
            links.iter().filter(|l| !l.residuals().contains(&"m_link")).map(|l| l.from).collect();
        assert_eq!(without_mass, vec![PhaseKind::GravityTurnB, PhaseKind::ExoatmosA]);
        assert_eq!(links[4].name(), "link_gravity_turn_b_gravity_turn_c");
    }

    #[test]
    fn jettison_does_not_break_the_link() {
        let link = PhaseLink::new(PhaseKind::GravityTurnB).unwrap();
        let out = link.compute(&link.boundary_values(100.0, &state(120e3), 100.0, &state(90e3))).unwrap();
        for res in link.residuals() {
            assert!(out.first(res).unwrap().abs() < 1e-12, "{res}");
        }
    }

    #[test]
    fn unit_partials_match_finite_differences() {
        let link = PhaseLink::new(PhaseKind::GravityTurn).unwrap();
        let inputs = link.boundary_values(70.0, &state(270e3), 70.5, &state(269e3));
        let out = link.compute(&inputs).unwrap();
        assert!((out.first("m_link").unwrap() + 1e3).abs() < 1e-9);
        for c in check_partials(&link, &inputs, 1e-6).unwrap() {
            assert!(c.declared && c.passes(1e-7), "{:?}", c);
        }
    }
}
