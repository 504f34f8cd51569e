use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

/// Which half of the exoatmospheric burn a phase covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExoSegment {
    A,
    B,
}

/// Stretches the bilinear-tangent law over both exoatmospheric phases.
///
/// Both segments output `phase_duration_total = T_a + T_b`; segment B also
/// shifts its local time by `T_a` so the steering law sees one continuous
/// clock.
#[derive(Debug, Clone)]
pub struct ExoTiming {
    pub num_nodes: usize,
    pub segment: ExoSegment,
}

impl Component for ExoTiming {
    fn name(&self) -> &str {
        "time_exoatmos"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        let mut ports = vec![
            PortSpec::scalar("phase_duration_a", "s"),
            PortSpec::scalar("phase_duration_b", "s"),
        ];
        if self.segment == ExoSegment::B {
            ports.push(PortSpec::nodal("phase_time_b", "s"));
        }
        ports
    }

    fn outputs(&self) -> Vec<PortSpec> {
        let mut ports = vec![PortSpec::scalar("phase_duration_total", "s")];
        if self.segment == ExoSegment::B {
            ports.push(PortSpec::nodal("phase_time_b_shifted", "s"));
        }
        ports
    }

    fn declare_partials(&self) -> SparsityTemplate {
        let t = SparsityTemplate::new()
            .declare_fixed("phase_duration_total", "phase_duration_a", Pattern::Single, 1.0)
            .declare_fixed("phase_duration_total", "phase_duration_b", Pattern::Single, 1.0);
        match self.segment {
            ExoSegment::A => t,
            ExoSegment::B => t
                .declare_fixed("phase_time_b_shifted", "phase_duration_a", Pattern::Column, 1.0)
                .declare_fixed("phase_time_b_shifted", "phase_time_b", Pattern::Diagonal, 1.0),
        }
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let ta = inputs.scalar(self.name(), "phase_duration_a")?;
        let tb = inputs.scalar(self.name(), "phase_duration_b")?;
        let mut out = Values::new().with_scalar("phase_duration_total", ta + tb);
        if self.segment == ExoSegment::B {
            let t = inputs.require(self.name(), "phase_time_b")?;
            out.set("phase_time_b_shifted", t.iter().map(|t| t + ta).collect());
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

    #[test]
    fn segment_b_sees_continuous_clock() {
        let comp = ExoTiming { num_nodes: 3, segment: ExoSegment::B };
        let inputs = Values::new()
            .with_scalar("phase_duration_a", 50.0)
            .with_scalar("phase_duration_b", 200.0)
            .with("phase_time_b", vec![0.0, 100.0, 200.0]);
        let out = comp.compute(&inputs).unwrap();
        assert_eq!(out.get("phase_duration_total").unwrap(), &[250.0]);
        assert_eq!(out.get("phase_time_b_shifted").unwrap(), &[50.0, 150.0, 250.0]);
        for c in check_partials(&comp, &inputs, 1e-6).unwrap() {
            assert!(c.passes(1e-6), "{:?}", c);
        }
    }
}
