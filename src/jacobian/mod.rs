//! Named-port component boundary and sparse partial-derivative storage.
//!
//! Every discipline exposes its outputs and their analytic Jacobian through
//! the [`Component`] trait. Inputs and outputs are either nodal (one value per
//! discretization node) or scalar (one value shared by all nodes). Partials
//! are keyed by `(output, input)` and stored per node, so the Jacobian of a
//! nodal output with respect to a nodal input is always diagonal.

pub mod check;
pub mod group;

use std::collections::{BTreeMap, HashMap};

use nalgebra::DMatrix;

use crate::error::{MdoError, Result};

pub use check::{check_partials, PartialCheck};
pub use group::{Group, GroupBuilder, Totals};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Nodal,
    Scalar,
}

#[derive(Debug, Clone, Copy)]
pub struct PortSpec {
    pub name: &'static str,
    pub shape: Shape,
    pub units: &'static str,
}

impl PortSpec {
    pub const fn nodal(name: &'static str, units: &'static str) -> Self {
        PortSpec { name, shape: Shape::Nodal, units }
    }

    pub const fn scalar(name: &'static str, units: &'static str) -> Self {
        PortSpec { name, shape: Shape::Scalar, units }
    }

    pub fn len(&self, num_nodes: usize) -> usize {
        match self.shape {
            Shape::Nodal => num_nodes,
            Shape::Scalar => 1,
        }
    }
}

/// Value at `node`, broadcasting length-one (scalar) slices.
#[inline]
pub fn at(values: &[f64], node: usize) -> f64 {
    if values.len() == 1 {
        values[0]
    } else {
        values[node]
    }
}

// ---------------------------------------------------------------------------
// Values: named arrays flowing between components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    map: BTreeMap<String, Vec<f64>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<f64>) -> Self {
        self.set(name, values);
        self
    }

    pub fn with_scalar(self, name: &str, value: f64) -> Self {
        self.with(name, vec![value])
    }

    pub fn set(&mut self, name: &str, values: Vec<f64>) {
        self.map.insert(name.to_string(), values);
    }

    pub fn set_scalar(&mut self, name: &str, value: f64) {
        self.set(name, vec![value]);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.map.get(name).map(|v| v.as_slice())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<f64>> {
        self.map.get_mut(name)
    }

    /// Look up a port, reporting which component asked for it when absent.
    pub fn require(&self, component: &str, name: &str) -> Result<&[f64]> {
        self.get(name).ok_or_else(|| MdoError::MissingPort {
            component: component.to_string(),
            port: name.to_string(),
        })
    }

    pub fn scalar(&self, component: &str, name: &str) -> Result<f64> {
        Ok(self.require(component, name)?[0])
    }

    /// Last element of a named array, the usual "final value" of a phase.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.last().copied())
    }

    pub fn first(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.first().copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn extend(&mut self, other: Values) {
        self.map.extend(other.map);
    }

    pub fn is_finite(&self) -> bool {
        self.map.values().all(|v| v.iter().all(|x| x.is_finite()))
    }
}

// ---------------------------------------------------------------------------
// Sparsity template: declared once per component, reused every evaluation
// ---------------------------------------------------------------------------

/// Storage pattern of one declared `(output, input)` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Nodal output, nodal input: one entry per node on the diagonal.
    Diagonal,
    /// Nodal output, scalar input: one entry per node in a single column.
    Column,
    /// Scalar output, scalar input.
    Single,
}

impl Pattern {
    pub fn from_shapes(of: Shape, wrt: Shape) -> Pattern {
        match (of, wrt) {
            (Shape::Nodal, Shape::Nodal) => Pattern::Diagonal,
            (Shape::Nodal, Shape::Scalar) => Pattern::Column,
            (Shape::Scalar, Shape::Scalar) => Pattern::Single,
            // Scalar outputs never depend on per-node inputs in this model.
            (Shape::Scalar, Shape::Nodal) => Pattern::Single,
        }
    }

    fn len(&self, num_nodes: usize) -> usize {
        match self {
            Pattern::Diagonal | Pattern::Column => num_nodes,
            Pattern::Single => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declared {
    pub of: &'static str,
    pub wrt: &'static str,
    pub pattern: Pattern,
    pub fixed: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SparsityTemplate {
    entries: Vec<Declared>,
    index: HashMap<&'static str, HashMap<&'static str, usize>>,
}

impl SparsityTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, of: &'static str, wrt: &'static str, pattern: Pattern) -> Self {
        self.push(Declared { of, wrt, pattern, fixed: None });
        self
    }

    /// Declare a block whose value never changes (linear relations).
    pub fn declare_fixed(
        mut self,
        of: &'static str,
        wrt: &'static str,
        pattern: Pattern,
        value: f64,
    ) -> Self {
        self.push(Declared { of, wrt, pattern, fixed: Some(value) });
        self
    }

    /// Declare `of` against every input in `wrt` with the same pattern.
    pub fn declare_all(mut self, of: &'static str, wrt: &[&'static str], pattern: Pattern) -> Self {
        for w in wrt {
            self = self.declare(of, *w, pattern);
        }
        self
    }

    fn push(&mut self, d: Declared) {
        match self.position(d.of, d.wrt) {
            Some(i) => self.entries[i] = d,
            None => {
                self.index.entry(d.of).or_default().insert(d.wrt, self.entries.len());
                self.entries.push(d);
            }
        }
    }

    pub fn entries(&self) -> &[Declared] {
        &self.entries
    }

    pub fn position(&self, of: &str, wrt: &str) -> Option<usize> {
        self.index.get(of).and_then(|m| m.get(wrt)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Partials: values for a template at a given node count
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Partials {
    template: SparsityTemplate,
    num_nodes: usize,
    values: Vec<Vec<f64>>,
}

impl Partials {
    pub fn new(template: SparsityTemplate, num_nodes: usize) -> Self {
        let values = template
            .entries
            .iter()
            .map(|d| vec![d.fixed.unwrap_or(0.0); d.pattern.len(num_nodes)])
            .collect();
        Partials { template, num_nodes, values }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn template(&self) -> &SparsityTemplate {
        &self.template
    }

    /// Zero the variable entries, restore the fixed ones.
    pub fn reset(&mut self) {
        for (d, v) in self.template.entries.iter().zip(self.values.iter_mut()) {
            let fill = d.fixed.unwrap_or(0.0);
            v.iter_mut().for_each(|x| *x = fill);
        }
    }

    fn slot(&self, of: &str, wrt: &str) -> Option<usize> {
        self.template.position(of, wrt)
    }

    /// Store one partial. Undeclared pairs are a wiring bug in the component.
    pub fn set(&mut self, of: &str, wrt: &str, node: usize, value: f64) {
        match self.slot(of, wrt) {
            Some(i) => {
                let v = &mut self.values[i];
                let k = if v.len() == 1 { 0 } else { node };
                v[k] = value;
            }
            None => debug_assert!(false, "partial ({of}, {wrt}) was never declared"),
        }
    }

    /// Store a whole block at once (length must match the pattern).
    pub fn set_block(&mut self, of: &str, wrt: &str, block: &[f64]) {
        if let Some(i) = self.slot(of, wrt) {
            let v = &mut self.values[i];
            if v.len() == block.len() {
                v.copy_from_slice(block);
            } else if block.len() == 1 {
                v.iter_mut().for_each(|x| *x = block[0]);
            }
        } else {
            debug_assert!(false, "partial ({of}, {wrt}) was never declared");
        }
    }

    /// Partial at `node`; zero for undeclared pairs.
    pub fn get(&self, of: &str, wrt: &str, node: usize) -> f64 {
        self.slot(of, wrt).map_or(0.0, |i| at(&self.values[i], node))
    }

    pub fn block(&self, of: &str, wrt: &str) -> Option<&[f64]> {
        self.slot(of, wrt).map(|i| self.values[i].as_slice())
    }

    pub fn is_declared(&self, of: &str, wrt: &str) -> bool {
        self.slot(of, wrt).is_some()
    }

    /// Iterate declared blocks with their values.
    pub fn blocks(&self) -> impl Iterator<Item = (&Declared, &[f64])> {
        self.template.entries.iter().zip(self.values.iter().map(|v| v.as_slice()))
    }

    /// Coordinate-format entries `(row, col, value)` in the given layout.
    pub fn triplets(&self, layout: &PortLayout) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        for (d, vals) in self.blocks() {
            let (Some(row0), Some(col0)) = (layout.row_offset(d.of), layout.col_offset(d.wrt)) else {
                continue;
            };
            match d.pattern {
                Pattern::Diagonal => {
                    for (i, &v) in vals.iter().enumerate() {
                        out.push((row0 + i, col0 + i, v));
                    }
                }
                Pattern::Column => {
                    for (i, &v) in vals.iter().enumerate() {
                        out.push((row0 + i, col0, v));
                    }
                }
                Pattern::Single => out.push((row0, col0, vals[0])),
            }
        }
        out
    }

    pub fn to_dense(&self, layout: &PortLayout) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(layout.rows(), layout.cols());
        for (r, c, v) in self.triplets(layout) {
            m[(r, c)] += v;
        }
        m
    }
}

// ---------------------------------------------------------------------------
// Row/column layout of a component's flattened Jacobian
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PortLayout {
    rows: Vec<(&'static str, usize, usize)>,
    cols: Vec<(&'static str, usize, usize)>,
}

impl PortLayout {
    pub fn new(outputs: &[PortSpec], inputs: &[PortSpec], num_nodes: usize) -> Self {
        fn offsets(ports: &[PortSpec], n: usize) -> Vec<(&'static str, usize, usize)> {
            let mut off = 0;
            ports
                .iter()
                .map(|p| {
                    let len = p.len(n);
                    let entry = (p.name, off, len);
                    off += len;
                    entry
                })
                .collect()
        }
        PortLayout { rows: offsets(outputs, num_nodes), cols: offsets(inputs, num_nodes) }
    }

    pub fn for_component(component: &dyn Component) -> Self {
        Self::new(&component.outputs(), &component.inputs(), component.num_nodes())
    }

    pub fn row_offset(&self, name: &str) -> Option<usize> {
        self.rows.iter().find(|(n, _, _)| *n == name).map(|&(_, o, _)| o)
    }

    pub fn col_offset(&self, name: &str) -> Option<usize> {
        self.cols.iter().find(|(n, _, _)| *n == name).map(|&(_, o, _)| o)
    }

    pub fn rows(&self) -> usize {
        self.rows.last().map_or(0, |&(_, o, l)| o + l)
    }

    pub fn cols(&self) -> usize {
        self.cols.last().map_or(0, |&(_, o, l)| o + l)
    }
}

// ---------------------------------------------------------------------------
// Component trait
// ---------------------------------------------------------------------------

/// A discipline with named ports, a value function and an analytic Jacobian.
pub trait Component {
    fn name(&self) -> &str;

    fn num_nodes(&self) -> usize;

    fn inputs(&self) -> Vec<PortSpec>;

    fn outputs(&self) -> Vec<PortSpec>;

    /// Sparsity of the analytic Jacobian; called once at setup.
    fn declare_partials(&self) -> SparsityTemplate;

    fn compute(&self, inputs: &Values) -> Result<Values>;

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()>;

    /// Fresh partials buffer sized for this component.
    fn new_partials(&self) -> Partials {
        Partials::new(self.declare_partials(), self.num_nodes())
    }

    fn input_spec(&self, name: &str) -> Option<PortSpec> {
        self.inputs().into_iter().find(|p| p.name == name)
    }

    fn output_spec(&self, name: &str) -> Option<PortSpec> {
        self.outputs().into_iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> SparsityTemplate {
        SparsityTemplate::new()
            .declare("y", "x", Pattern::Diagonal)
            .declare("y", "k", Pattern::Column)
            .declare_fixed("s", "k", Pattern::Single, 2.0)
    }

    #[test]
    fn fixed_entries_survive_reset() {
        let mut p = Partials::new(template(), 3);
        p.set("y", "x", 1, 5.0);
        assert_eq!(p.get("s", "k", 0), 2.0);
        p.reset();
        assert_eq!(p.get("y", "x", 1), 0.0);
        assert_eq!(p.get("s", "k", 2), 2.0);
    }

    #[test]
    fn undeclared_pairs_read_as_zero() {
        let p = Partials::new(template(), 3);
        assert_eq!(p.get("y", "nothing", 0), 0.0);
        assert!(!p.is_declared("s", "x"));
    }

    #[test]
    fn triplets_follow_layout() {
        let outputs = [PortSpec::nodal("y", ""), PortSpec::scalar("s", "")];
        let inputs = [PortSpec::nodal("x", ""), PortSpec::scalar("k", "")];
        let layout = PortLayout::new(&outputs, &inputs, 3);
        assert_eq!(layout.rows(), 4);
        assert_eq!(layout.cols(), 4);

        let mut p = Partials::new(template(), 3);
        p.set_block("y", "x", &[1.0, 2.0, 3.0]);
        p.set_block("y", "k", &[4.0, 5.0, 6.0]);
        let dense = p.to_dense(&layout);
        assert_eq!(dense[(0, 0)], 1.0);
        assert_eq!(dense[(2, 2)], 3.0);
        assert_eq!(dense[(1, 0)], 0.0);
        assert_eq!(dense[(1, 3)], 5.0);
        assert_eq!(dense[(3, 3)], 2.0);
    }

    #[test]
    fn redeclaring_replaces_entry() {
        let t = template().declare_fixed("y", "x", Pattern::Diagonal, 1.0);
        assert_eq!(t.len(), 3);
        let p = Partials::new(t, 2);
        assert_eq!(p.get("y", "x", 1), 1.0);
    }

    #[test]
    fn missing_port_is_reported() {
        let v = Values::new().with_scalar("a", 1.0);
        let err = v.require("comp", "b").unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }
}
