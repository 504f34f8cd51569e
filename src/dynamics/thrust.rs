use crate::error::Result;
use crate::jacobian::{at, Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Delivered thrust after nozzle back-pressure loss, and throttled mass flow.
///
/// `thrust = thrust_vac · throttle − Ae_t · P_a`, `mfr = mfr_max · throttle`
#[derive(Debug, Clone)]
pub struct ThrustLosses {
    pub num_nodes: usize,
}

impl Component for ThrustLosses {
    fn name(&self) -> &str {
        "thrust_losses"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("thrust_vac", "N"),
            PortSpec::nodal("throttle", ""),
            PortSpec::nodal("P_a", "Pa"),
            PortSpec::scalar("Ae_t", "m**2"),
            PortSpec::scalar("mfr_max", "kg/s"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("thrust", "N"), PortSpec::nodal("mfr", "kg/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare("thrust", "thrust_vac", Pattern::Column)
            .declare("thrust", "throttle", Pattern::Diagonal)
            .declare("thrust", "P_a", Pattern::Diagonal)
            .declare("thrust", "Ae_t", Pattern::Column)
            .declare("mfr", "throttle", Pattern::Diagonal)
            .declare("mfr", "mfr_max", Pattern::Column)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let name = self.name();
        let t_vac = inputs.scalar(name, "thrust_vac")?;
        let ae_t = inputs.scalar(name, "Ae_t")?;
        let mfr_max = inputs.scalar(name, "mfr_max")?;
        let throttle = inputs.require(name, "throttle")?;
        let p_a = inputs.require(name, "P_a")?;

        let n = self.num_nodes;
        let thrust = (0..n).map(|i| t_vac * at(throttle, i) - ae_t * at(p_a, i)).collect();
        let mfr = (0..n).map(|i| mfr_max * at(throttle, i)).collect();
        Ok(Values::new().with("thrust", thrust).with("mfr", mfr))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let name = self.name();
        let t_vac = inputs.scalar(name, "thrust_vac")?;
        let ae_t = inputs.scalar(name, "Ae_t")?;
        let mfr_max = inputs.scalar(name, "mfr_max")?;
        let throttle = inputs.require(name, "throttle")?;
        let p_a = inputs.require(name, "P_a")?;

        for i in 0..self.num_nodes {
            let tau = at(throttle, i);
            p.set("thrust", "thrust_vac", i, tau);
            p.set("thrust", "throttle", i, t_vac);
            p.set("thrust", "P_a", i, -ae_t);
            p.set("thrust", "Ae_t", i, -at(p_a, i));
            p.set("mfr", "throttle", i, mfr_max);
            p.set("mfr", "mfr_max", i, tau);
        }
        Ok(())
    }
}
