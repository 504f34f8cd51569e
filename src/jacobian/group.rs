//! Explicitly wired groups of components.
//!
//! A [`Group`] owns an ordered list of members and a wiring table of
//! `(source variable, member.port)` pairs fixed at build time. Variables are
//! the group's external inputs (plain names) and every member output
//! (`member.port`). Evaluation runs members in insertion order; total
//! derivatives of every variable with respect to every external input are
//! propagated forward by the chain rule, one node at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use super::{at, Component, Partials, Pattern, PortSpec, Shape, SparsityTemplate, Values};
use crate::error::{MdoError, Result};

struct Member {
    name: String,
    component: Box<dyn Component>,
    template: SparsityTemplate,
    /// `(input port, source variable)` for every input of the component.
    sources: Vec<(&'static str, String)>,
}

/// Total derivatives `d var / d external`, node-diagonal.
///
/// Each entry has one value per node, or a single value when both the
/// variable and the external input are scalars (or the derivative is the
/// same at every node).
#[derive(Debug, Clone, Default)]
pub struct Totals {
    map: BTreeMap<String, BTreeMap<&'static str, Vec<f64>>>,
}

impl Totals {
    pub fn get(&self, var: &str, external: &str) -> Option<&[f64]> {
        self.map.get(var).and_then(|m| m.get(external)).map(|v| v.as_slice())
    }

    /// Derivative at one node, zero where no dependency exists.
    pub fn at(&self, var: &str, external: &str, node: usize) -> f64 {
        self.get(var, external).map_or(0.0, |v| at(v, node))
    }

    pub fn of(&self, var: &str) -> impl Iterator<Item = (&'static str, &[f64])> {
        self.map.get(var).into_iter().flat_map(|m| m.iter().map(|(k, v)| (*k, v.as_slice())))
    }
}

fn product(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len().max(b.len());
    (0..n).map(|i| at(a, i) * at(b, i)).collect()
}

fn accumulate(into: &mut Vec<f64>, add: Vec<f64>) {
    if into.is_empty() {
        *into = add;
    } else if into.len() == add.len() {
        into.iter_mut().zip(add).for_each(|(x, y)| *x += y);
    } else {
        let n = into.len().max(add.len());
        *into = (0..n).map(|i| at(into, i) + at(&add, i)).collect();
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct GroupBuilder {
    name: String,
    num_nodes: usize,
    externals: Vec<PortSpec>,
    members: Vec<(String, Box<dyn Component>)>,
    connections: Vec<(String, String)>,
    exposed: Vec<(String, &'static str)>,
}

impl GroupBuilder {
    pub fn new(name: impl Into<String>, num_nodes: usize) -> Self {
        GroupBuilder {
            name: name.into(),
            num_nodes,
            externals: Vec::new(),
            members: Vec::new(),
            connections: Vec::new(),
            exposed: Vec::new(),
        }
    }

    pub fn input(mut self, port: PortSpec) -> Self {
        self.externals.push(port);
        self
    }

    pub fn add(mut self, name: &str, component: impl Component + 'static) -> Self {
        self.members.push((name.to_string(), Box::new(component)));
        self
    }

    /// Wire `source` (an external input or `member.port`) into `member.port`.
    pub fn connect(mut self, source: &str, target: &str) -> Self {
        self.connections.push((source.to_string(), target.to_string()));
        self
    }

    /// Publish a variable as a group output named `as_name`.
    pub fn expose(mut self, var: &str, as_name: &'static str) -> Self {
        self.exposed.push((var.to_string(), as_name));
        self
    }

    pub fn build(self) -> Result<Group> {
        let GroupBuilder { name, num_nodes, externals, members, connections, exposed } = self;
        let wiring = |reason: String| MdoError::InvalidConfig(format!("group '{name}': {reason}"));

        // variable -> shape, in definition order
        let mut shapes: HashMap<String, Shape> = HashMap::new();
        for port in &externals {
            shapes.insert(port.name.to_string(), port.shape);
        }

        let mut built: Vec<Member> = Vec::with_capacity(members.len());
        for (m_name, component) in members {
            let mut sources = Vec::new();
            for input in component.inputs() {
                let target = format!("{m_name}.{}", input.name);
                let source = connections
                    .iter()
                    .find(|(_, t)| *t == target)
                    .map(|(s, _)| s.clone())
                    .ok_or_else(|| MdoError::MissingPort {
                        component: format!("{name}.{m_name}"),
                        port: input.name.to_string(),
                    })?;
                match shapes.get(&source) {
                    Some(Shape::Nodal) if input.shape == Shape::Scalar => {
                        return Err(wiring(format!("nodal '{source}' feeds scalar '{target}'")))
                    }
                    Some(_) => {}
                    None => return Err(wiring(format!("'{source}' is not defined before '{target}'"))),
                }
                sources.push((input.name, source));
            }
            for output in component.outputs() {
                shapes.insert(format!("{m_name}.{}", output.name), output.shape);
            }
            let template = component.declare_partials();
            built.push(Member { name: m_name, component, template, sources });
        }

        for (source, target) in &connections {
            let known = built.iter().any(|m| {
                m.sources.iter().any(|(p, s)| s == source && format!("{}.{}", m.name, p) == *target)
            });
            if !known {
                return Err(wiring(format!("connection '{source}' -> '{target}' has no matching input")));
            }
        }

        // structural dependencies of every variable on the externals
        let mut depends: HashMap<String, BTreeSet<&'static str>> = HashMap::new();
        for port in &externals {
            depends.insert(port.name.to_string(), BTreeSet::from([port.name]));
        }
        for m in &built {
            for output in m.component.outputs() {
                let mut set = BTreeSet::new();
                for (port, source) in &m.sources {
                    if m.template.position(output.name, port).is_some() {
                        if let Some(d) = depends.get(source) {
                            set.extend(d.iter().copied());
                        }
                    }
                }
                depends.insert(format!("{}.{}", m.name, output.name), set);
            }
        }

        let mut outputs = Vec::with_capacity(exposed.len());
        for (var, as_name) in exposed {
            let &shape = shapes
                .get(&var)
                .ok_or_else(|| wiring(format!("exposed variable '{var}' does not exist")))?;
            let port = match shape {
                Shape::Nodal => PortSpec::nodal(as_name, ""),
                Shape::Scalar => PortSpec::scalar(as_name, ""),
            };
            outputs.push((var, port));
        }

        debug!(
            "group '{}' built: {} members, {} externals, {} outputs",
            name,
            built.len(),
            externals.len(),
            outputs.len()
        );
        Ok(Group { name, num_nodes, externals, members: built, outputs, depends })
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

pub struct Group {
    name: String,
    num_nodes: usize,
    externals: Vec<PortSpec>,
    members: Vec<Member>,
    outputs: Vec<(String, PortSpec)>,
    depends: HashMap<String, BTreeSet<&'static str>>,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("num_nodes", &self.num_nodes)
            .field("members", &self.members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl Group {
    pub fn externals(&self) -> &[PortSpec] {
        &self.externals
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// The wiring table as `(source, member.port)` pairs.
    pub fn connections(&self) -> Vec<(String, String)> {
        self.members
            .iter()
            .flat_map(|m| m.sources.iter().map(move |(p, s)| (s.clone(), format!("{}.{}", m.name, p))))
            .collect()
    }

    fn gather(&self, m: &Member, vars: &Values) -> Result<Values> {
        let mut inputs = Values::new();
        for (port, source) in &m.sources {
            inputs.set(port, vars.require(&self.name, source)?.to_vec());
        }
        Ok(inputs)
    }

    /// Every variable of the group: externals and all member outputs.
    pub fn evaluate(&self, externals: &Values) -> Result<Values> {
        let mut vars = Values::new();
        for port in &self.externals {
            vars.set(port.name, externals.require(&self.name, port.name)?.to_vec());
        }
        for m in &self.members {
            let out = m.component.compute(&self.gather(m, &vars)?)?;
            for (port, values) in out.iter() {
                vars.set(&format!("{}.{}", m.name, port), values.to_vec());
            }
        }
        Ok(vars)
    }

    /// Variables and their total derivatives with respect to every external.
    pub fn totals(&self, externals: &Values) -> Result<(Values, Totals)> {
        let vars = self.evaluate(externals)?;
        let mut totals = Totals::default();
        for port in &self.externals {
            totals.map.entry(port.name.to_string()).or_default().insert(port.name, vec![1.0]);
        }

        for m in &self.members {
            let inputs = self.gather(m, &vars)?;
            let mut partials = Partials::new(m.template.clone(), m.component.num_nodes());
            m.component.compute_partials(&inputs, &mut partials)?;

            for output in m.component.outputs() {
                let mut acc: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
                for (port, source) in &m.sources {
                    let Some(block) = partials.block(output.name, port) else { continue };
                    for (ext, d) in totals.of(source) {
                        accumulate(acc.entry(ext).or_default(), product(block, d));
                    }
                }
                totals.map.insert(format!("{}.{}", m.name, output.name), acc);
            }
        }
        Ok((vars, totals))
    }
}

impl Component for Group {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        self.externals.clone()
    }

    fn outputs(&self) -> Vec<PortSpec> {
        self.outputs.iter().map(|(_, p)| *p).collect()
    }

    fn declare_partials(&self) -> SparsityTemplate {
        let mut t = SparsityTemplate::new();
        for (var, port) in &self.outputs {
            for ext in self.depends.get(var).into_iter().flatten() {
                if let Some(spec) = self.externals.iter().find(|e| e.name == *ext) {
                    t = t.declare(port.name, spec.name, Pattern::from_shapes(port.shape, spec.shape));
                }
            }
        }
        t
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let vars = self.evaluate(inputs)?;
        let mut out = Values::new();
        for (var, port) in &self.outputs {
            out.set(port.name, vars.require(&self.name, var)?.to_vec());
        }
        Ok(out)
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let (_, totals) = self.totals(inputs)?;
        for (var, port) in &self.outputs {
            for (ext, d) in totals.of(var) {
                partials.set_block(port.name, ext, d);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    /// `y = a · x²`
    struct Scale;

    impl Component for Scale {
        fn name(&self) -> &str {
            "scale"
        }
        fn num_nodes(&self) -> usize {
            3
        }
        fn inputs(&self) -> Vec<PortSpec> {
            vec![PortSpec::nodal("x", ""), PortSpec::scalar("a", "")]
        }
        fn outputs(&self) -> Vec<PortSpec> {
            vec![PortSpec::nodal("y", "")]
        }
        fn declare_partials(&self) -> SparsityTemplate {
            SparsityTemplate::new()
                .declare("y", "x", Pattern::Diagonal)
                .declare("y", "a", Pattern::Column)
        }
        fn compute(&self, inputs: &Values) -> Result<Values> {
            let x = inputs.require("scale", "x")?;
            let a = inputs.scalar("scale", "a")?;
            Ok(Values::new().with("y", (0..3).map(|i| a * at(x, i).powi(2)).collect()))
        }
        fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
            let x = inputs.require("scale", "x")?;
            let a = inputs.scalar("scale", "a")?;
            for i in 0..3 {
                p.set("y", "x", i, 2.0 * a * at(x, i));
                p.set("y", "a", i, at(x, i).powi(2));
            }
            Ok(())
        }
    }

    fn chain() -> Result<Group> {
        GroupBuilder::new("chain", 3)
            .input(PortSpec::nodal("u", ""))
            .input(PortSpec::scalar("k", ""))
            .add("first", Scale)
            .add("second", Scale)
            .connect("u", "first.x")
            .connect("k", "first.a")
            .connect("first.y", "second.x")
            .connect("k", "second.a")
            .expose("second.y", "z")
            .build()
    }

    #[test]
    fn chain_rule_through_two_members() {
        let g = chain().unwrap();
        let inputs = Values::new().with("u", vec![1.0, 2.0, -0.5]).with_scalar("k", 1.5);
        let (vars, totals) = g.totals(&inputs).unwrap();
        // z = k (k u²)² = k³ u⁴
        let z = vars.get("second.y").unwrap();
        assert!((z[1] - 1.5f64.powi(3) * 16.0).abs() < 1e-12);
        assert!((totals.at("second.y", "u", 1) - 4.0 * 1.5f64.powi(3) * 8.0).abs() < 1e-9);
        assert!((totals.at("second.y", "k", 1) - 3.0 * 1.5f64.powi(2) * 16.0).abs() < 1e-9);

        for c in check_partials(&g, &inputs, 1e-6).unwrap() {
            assert!(c.declared && c.passes(1e-6), "{:?}", c);
        }
    }

    #[test]
    fn unwired_input_is_rejected() {
        let err = GroupBuilder::new("broken", 3)
            .input(PortSpec::nodal("u", ""))
            .add("first", Scale)
            .connect("u", "first.x")
            .build()
            .unwrap_err();
        assert!(matches!(err, MdoError::MissingPort { ref port, .. } if port == "a"));
    }

    #[test]
    fn forward_reference_is_rejected() {
        let err = GroupBuilder::new("loop", 3)
            .input(PortSpec::scalar("k", ""))
            .add("first", Scale)
            .add("second", Scale)
            .connect("second.y", "first.x")
            .connect("k", "first.a")
            .connect("k", "second.a")
            .connect("first.y", "second.x")
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn wiring_table_is_reported() {
        let g = chain().unwrap();
        let table = g.connections();
        assert!(table.contains(&("first.y".to_string(), "second.x".to_string())));
        assert_eq!(table.len(), 4);
    }
}
