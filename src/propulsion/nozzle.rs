use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// `mfr_max = thrust / (Isp · g0)`
#[derive(Debug, Clone)]
pub struct MassFlowRate {
    pub g0: f64,
}

impl Component for MassFlowRate {
    fn name(&self) -> &str {
        "mass_flow_rate"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("thrust", "N"), PortSpec::scalar("Isp", "s")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("mfr_max", "kg/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("mfr_max", &["thrust", "Isp"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let thrust = inputs.scalar(self.name(), "thrust")?;
        let isp = inputs.scalar(self.name(), "Isp")?;
        Ok(Values::new().with_scalar("mfr_max", thrust / (isp * self.g0)))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let thrust = inputs.scalar(self.name(), "thrust")?;
        let isp = inputs.scalar(self.name(), "Isp")?;
        p.set("mfr_max", "thrust", 0, 1.0 / (isp * self.g0));
        p.set("mfr_max", "Isp", 0, -thrust / (isp * isp * self.g0));
        Ok(())
    }
}

/// Throat area of one engine, `At = cStar · mfr / (nb_e · P_c)`.
#[derive(Debug, Clone)]
pub struct ThroatArea {
    pub nb_engines: u32,
}

impl Component for ThroatArea {
    fn name(&self) -> &str {
        "throat_area"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("cStar", "m/s"),
            PortSpec::scalar("mfr_max", "kg/s"),
            PortSpec::scalar("P_c", "Pa"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("At", "m**2")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("At", &["cStar", "mfr_max", "P_c"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let n = self.name();
        let c = inputs.scalar(n, "cStar")?;
        let mfr = inputs.scalar(n, "mfr_max")?;
        let p_c = inputs.scalar(n, "P_c")?;
        Ok(Values::new().with_scalar("At", c * mfr / (self.nb_engines as f64 * p_c)))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let n = self.name();
        let c = inputs.scalar(n, "cStar")?;
        let mfr = inputs.scalar(n, "mfr_max")?;
        let p_c = inputs.scalar(n, "P_c")?;
        let nb = self.nb_engines as f64;
        p.set("At", "cStar", 0, mfr / (nb * p_c));
        p.set("At", "mfr_max", 0, c / (nb * p_c));
        p.set("At", "P_c", 0, -c * mfr / (nb * p_c * p_c));
        Ok(())
    }
}

/// Exit area of one engine and of the whole stage.
#[derive(Debug, Clone)]
pub struct NozzleExitArea {
    pub nb_engines: u32,
}

impl Component for NozzleExitArea {
    fn name(&self) -> &str {
        "nozzle_exit_area"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("epsilon", ""), PortSpec::scalar("At", "m**2")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("Ae", "m**2"), PortSpec::scalar("Ae_t", "m**2")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("Ae", &["epsilon", "At"], Pattern::Single)
            .declare_all("Ae_t", &["epsilon", "At"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let eps = inputs.scalar(self.name(), "epsilon")?;
        let at = inputs.scalar(self.name(), "At")?;
        let ae = at * eps;
        Ok(Values::new()
            .with_scalar("Ae", ae)
            .with_scalar("Ae_t", ae * self.nb_engines as f64))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let eps = inputs.scalar(self.name(), "epsilon")?;
        let at = inputs.scalar(self.name(), "At")?;
        let nb = self.nb_engines as f64;
        p.set("Ae", "epsilon", 0, at);
        p.set("Ae", "At", 0, eps);
        p.set("Ae_t", "epsilon", 0, at * nb);
        p.set("Ae_t", "At", 0, eps * nb);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::state::G0;
    use crate::jacobian::check_partials;

    #[test]
    fn nozzle_relations() {
        let inputs = Values::new()
            .with_scalar("thrust", 7.64e6)
            .with_scalar("Isp", 312.8)
            .with_scalar("cStar", 1780.0)
            .with_scalar("mfr_max", 2490.0)
            .with_scalar("P_c", 1e7)
            .with_scalar("epsilon", 21.5)
            .with_scalar("At", 0.0492);

        let mfr = MassFlowRate { g0: G0 }.compute(&inputs).unwrap().first("mfr_max").unwrap();
        assert!((mfr - 7.64e6 / (312.8 * G0)).abs() < 1e-9);

        let areas = NozzleExitArea { nb_engines: 9 }.compute(&inputs).unwrap();
        let ae = areas.first("Ae").unwrap();
        assert!((areas.first("Ae_t").unwrap() - 9.0 * ae).abs() < 1e-12);

        let comps: [&dyn Component; 3] = [
            &MassFlowRate { g0: G0 },
            &ThroatArea { nb_engines: 9 },
            &NozzleExitArea { nb_engines: 9 },
        ];
        for comp in comps {
            for c in check_partials(comp, &inputs, 1e-6).unwrap() {
                assert!(c.declared && c.passes(1e-7), "{}: {:?}", comp.name(), c);
            }
        }
    }
}
