use crate::error::Result;
use crate::jacobian::{at, Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Rate of change of dynamic pressure along the trajectory.
///
/// `qDot = ½ (dρ/dh) ṙ v² + ρ v v̇`; its sign change marks max-q.
#[derive(Debug, Clone)]
pub struct QDot {
    pub num_nodes: usize,
}

const WRT: [&str; 5] = ["v_dot", "r_dot", "v", "rho", "d_rho_wrt_h"];

impl Component for QDot {
    fn name(&self) -> &str {
        "q_dot"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::nodal("v_dot", "m/s**2"),
            PortSpec::nodal("r_dot", "m/s"),
            PortSpec::nodal("v", "m/s"),
            PortSpec::nodal("rho", "kg/m**3"),
            PortSpec::nodal("d_rho_wrt_h", "kg/m**4"),
        ]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("q_dot", "Pa/s")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_all("q_dot", &WRT, Pattern::Diagonal)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let [v_dot, r_dot, v, rho, drho] = self.columns(inputs)?;
        let q_dot = (0..self.num_nodes)
            .map(|i| {
                let v = at(v, i);
                0.5 * at(drho, i) * at(r_dot, i) * v * v + at(rho, i) * v * at(v_dot, i)
            })
            .collect();
        Ok(Values::new().with("q_dot", q_dot))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let [v_dot, r_dot, v, rho, drho] = self.columns(inputs)?;
        for i in 0..self.num_nodes {
            let (vd, rd, v, rho, drho) = (at(v_dot, i), at(r_dot, i), at(v, i), at(rho, i), at(drho, i));
            p.set("q_dot", "v_dot", i, rho * v);
            p.set("q_dot", "r_dot", i, 0.5 * drho * v * v);
            p.set("q_dot", "v", i, drho * rd * v + rho * vd);
            p.set("q_dot", "rho", i, v * vd);
            p.set("q_dot", "d_rho_wrt_h", i, 0.5 * rd * v * v);
        }
        Ok(())
    }
}

impl QDot {
    fn columns<'a>(&self, inputs: &'a Values) -> Result<[&'a [f64]; 5]> {
        Ok([
            inputs.require(self.name(), WRT[0])?,
            inputs.require(self.name(), WRT[1])?,
            inputs.require(self.name(), WRT[2])?,
            inputs.require(self.name(), WRT[3])?,
            inputs.require(self.name(), WRT[4])?,
        ])
    }
}
