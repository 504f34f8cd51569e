use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Inverse-square gravity, `g = μ / r²`.
#[derive(Debug, Clone)]
pub struct Gravity {
    pub num_nodes: usize,
    pub mu: f64, // m^3/s^2
}

impl Component for Gravity {
    fn name(&self) -> &str {
        "gravity"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("r", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("g", "m/s**2")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare("g", "r", Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let r = inputs.require(self.name(), "r")?;
        Ok(Values::new().with("g", r.iter().map(|r| self.mu / (r * r)).collect()))
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let r = inputs.require(self.name(), "r")?;
        for (i, &r) in r.iter().enumerate() {
            partials.set("g", "r", i, -2.0 * self.mu / (r * r * r));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::state::{EARTH_RADIUS, G0, MU_EARTH};
    use crate::jacobian::check_partials;

    #[test]
    fn sea_level_gravity() {
        let comp = Gravity { num_nodes: 1, mu: MU_EARTH };
        let out = comp.compute(&Values::new().with("r", vec![EARTH_RADIUS])).unwrap();
        assert!((out.get("g").unwrap()[0] - G0).abs() < 0.02);
    }

    #[test]
    fn gravity_partial() {
        let comp = Gravity { num_nodes: 2, mu: MU_EARTH };
        let inputs = Values::new().with("r", vec![EARTH_RADIUS, EARTH_RADIUS + 400e3]);
        for c in check_partials(&comp, &inputs, 1e-6).unwrap() {
            assert!(c.passes(1e-8), "{:?}", c);
        }
    }
}
