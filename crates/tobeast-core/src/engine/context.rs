//! # Lowering Context
//!
//! The mutable store one lowering run populates.
//!
//! ## Indices
//!
//! - `lowered`: source node → target, at most one entry per node
//! - `origin`: target → first source node registered for it
//! - `contributions`: target → every source node it stands for
//! - `state`: ordered, de-duplicated mutable state of the run
//!
//! The four indices, the operator skip set and the extra operator and
//! loggable lists only change together: [`Context::remove`] evicts a target
//! from all of them in one call.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tobeast_model::{Generator, GeneratorId, ModelGraph, ValueId};
use tracing::debug;

use crate::engine::classify;
use crate::engine::errors::LoweringError;
use crate::engine::loggers::ExtraLogger;
use crate::engine::registry::Registry;
use crate::engine::target::{
    Parameter, TargetId, TargetKind, TargetObject, TargetStore,
};
use crate::specs;

/// A node of the source graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum SourceRef {
    Value(ValueId),
    Generator(GeneratorId),
}

/// Central store of one lowering run.
pub struct Context<'a> {
    graph: &'a ModelGraph,
    registry: &'a Registry,
    store: TargetStore,
    lowered: FxHashMap<SourceRef, TargetId>,
    origin: FxHashMap<TargetId, SourceRef>,
    contributions: FxHashMap<TargetId, SmallVec<[SourceRef; 2]>>,
    state: Vec<TargetId>,
    skip_operators: FxHashSet<TargetId>,
    extra_operators: Vec<TargetId>,
    extra_loggables: Vec<TargetId>,
    extra_loggers: Vec<Box<dyn ExtraLogger>>,
}

impl<'a> Context<'a> {
    pub fn new(graph: &'a ModelGraph, registry: &'a Registry) -> Self {
        Context {
            graph,
            registry,
            store: TargetStore::new(),
            lowered: FxHashMap::default(),
            origin: FxHashMap::default(),
            contributions: FxHashMap::default(),
            state: Vec::new(),
            skip_operators: FxHashSet::default(),
            extra_operators: Vec::new(),
            extra_loggables: Vec::new(),
            extra_loggers: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'a ModelGraph {
        self.graph
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    // ---- arena ----

    /// Adds an auxiliary object that stands for no source node.
    pub fn add(&mut self, object: TargetObject) -> TargetId {
        self.store.add(object)
    }

    pub fn object(&self, id: TargetId) -> &TargetObject {
        self.store.get(id)
    }

    pub fn object_mut(&mut self, id: TargetId) -> &mut TargetObject {
        self.store.get_mut(id)
    }

    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    /// Identifier of a target, falling back to its engine type name.
    pub fn display_id(&self, id: TargetId) -> String {
        let obj = self.store.get(id);
        obj.id
            .clone()
            .unwrap_or_else(|| format!("{}#{}", specs::simple_name(&obj.spec), id.0))
    }

    // ---- indices ----

    pub fn lowered(&self, node: SourceRef) -> Option<TargetId> {
        self.lowered.get(&node).copied()
    }

    /// Target of `value` as downstream generators see it: the observed
    /// target when the value is clamped.
    pub fn target_of(&self, value: ValueId) -> Option<TargetId> {
        match classify::clamped_counterpart(self.graph, value) {
            Some(observed) => self.lowered(SourceRef::Value(observed)),
            None => self.lowered(SourceRef::Value(value)),
        }
    }

    /// Like [`Context::target_of`] but fails with `MissingTarget`.
    pub fn require_target(&self, value: ValueId) -> Result<TargetId, LoweringError> {
        self.target_of(value)
            .ok_or_else(|| LoweringError::MissingTarget(self.graph.label(value)))
    }

    pub fn generator_target(&self, generator: GeneratorId) -> Option<TargetId> {
        self.lowered(SourceRef::Generator(generator))
    }

    pub fn origin(&self, target: TargetId) -> Option<SourceRef> {
        self.origin.get(&target).copied()
    }

    pub fn contributors(&self, target: TargetId) -> &[SourceRef] {
        self.contributions
            .get(&target)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Every target registered in the contributions index, in creation order.
    pub fn registered_targets(&self) -> Vec<TargetId> {
        let mut out: Vec<TargetId> = self.contributions.keys().copied().collect();
        out.sort();
        out
    }

    /// `(generator, target)` pairs of every lowered generator, in target
    /// creation order.
    pub fn generator_targets(&self) -> Vec<(GeneratorId, TargetId)> {
        let mut out: Vec<(GeneratorId, TargetId)> = self
            .lowered
            .iter()
            .filter_map(|(node, t)| match node {
                SourceRef::Generator(g) => Some((*g, *t)),
                SourceRef::Value(_) => None,
            })
            .collect();
        out.sort_by_key(|(g, t)| (*t, *g));
        out
    }

    /// Registers `target` as the lowering of `node`.
    ///
    /// A value that classifies as state and feeds at least one generator is
    /// added to the state list.
    pub fn insert(&mut self, node: SourceRef, target: TargetId) -> Result<(), LoweringError> {
        if let Some(existing) = self.lowered.get(&node) {
            if *existing != target {
                return Err(LoweringError::Internal(format!(
                    "{:?} already lowered to {}",
                    node,
                    self.display_id(*existing)
                )));
            }
        }
        self.lowered.insert(node, target);
        self.origin.entry(target).or_insert(node);
        self.contribute(target, node);
        if let SourceRef::Value(v) = node {
            if classify::is_state(v, self) && !self.graph.consumers(v).is_empty() {
                self.add_state_node(target);
            }
        }
        Ok(())
    }

    /// Records that `target` also stands for `node`, without mapping `node`.
    pub fn contribute(&mut self, target: TargetId, node: SourceRef) {
        self.contributions.entry(target).or_default().push(node);
    }

    /// Evicts `target` from every index at once.
    pub fn remove(&mut self, target: TargetId) {
        debug!(target = %self.display_id(target), "evicting target");
        self.lowered.retain(|_, t| *t != target);
        self.origin.remove(&target);
        self.contributions.remove(&target);
        self.state.retain(|t| *t != target);
        self.skip_operators.remove(&target);
        self.extra_operators.retain(|t| *t != target);
        self.extra_loggables.retain(|t| *t != target);
    }

    /// Replaces the lowering of `node` with `target`, evicting the old one.
    pub fn replace(&mut self, node: SourceRef, target: TargetId) -> Result<(), LoweringError> {
        if let Some(old) = self.lowered(node) {
            if old == target {
                return Ok(());
            }
            self.remove(old);
        }
        self.insert(node, target)
    }

    /// Overwrites the object behind `target` with its coerced form. The id
    /// stays, so objects already built over `target` see the new kind and
    /// every index entry remains valid.
    fn coerce_in_place(&mut self, target: TargetId, replacement: TargetObject) {
        debug!(
            target = %self.display_id(target),
            to = %specs::simple_name(&replacement.spec),
            "coercing parameter in place"
        );
        *self.store.get_mut(target) = replacement;
    }

    // ---- state ----

    /// Adds `target` to state, unwrapping containers into the parameters and
    /// trees they are made of.
    pub fn add_state_node(&mut self, target: TargetId) {
        match &self.store.get(target).kind {
            TargetKind::Concatenate(parts) | TargetKind::Vector(parts) => {
                for part in parts.clone() {
                    self.add_state_node(part);
                }
            }
            TargetKind::Slice { source, .. } => {
                let source = *source;
                self.add_state_node(source);
            }
            TargetKind::RealParameter(_)
            | TargetKind::IntegerParameter(_)
            | TargetKind::BooleanParameter(_)
            | TargetKind::Tree(_) => {
                if !self.state.contains(&target) {
                    debug!(target = %self.display_id(target), "adding state node");
                    self.state.push(target);
                }
            }
            _ => {}
        }
    }

    pub fn state(&self) -> &[TargetId] {
        &self.state
    }

    pub fn is_state_node(&self, target: TargetId) -> bool {
        self.state.contains(&target)
    }

    /// Excludes `target` from automatic operator synthesis.
    pub fn skip_operators(&mut self, target: TargetId) {
        self.skip_operators.insert(target);
    }

    pub fn is_operator_skipped(&self, target: TargetId) -> bool {
        self.skip_operators.contains(&target)
    }

    /// State trees ordered by identifier.
    pub fn trees(&self) -> Vec<TargetId> {
        let mut trees: Vec<TargetId> = self
            .state
            .iter()
            .copied()
            .filter(|t| self.store.get(*t).is_tree())
            .collect();
        trees.sort_by_key(|t| self.display_id(*t));
        trees
    }

    /// First random source value behind `target`, with the generator that
    /// sampled it. Element selections report the generator of their array.
    pub fn random_provenance(&self, target: TargetId) -> Option<(ValueId, &'a Generator)> {
        let graph = self.graph;
        self.contributors(target).iter().find_map(|node| match node {
            SourceRef::Value(v) => classify::sampling_generator(graph, *v).map(|g| (*v, g)),
            SourceRef::Generator(_) => None,
        })
    }

    // ---- extras ----

    pub fn add_extra_operator(&mut self, operator: TargetId) {
        if !self.extra_operators.contains(&operator) {
            self.extra_operators.push(operator);
        }
    }

    /// True if an extra operator with identifier `id` is registered.
    pub fn has_extra_operator(&self, id: &str) -> bool {
        self.extra_operators
            .iter()
            .any(|t| self.store.get(*t).id() == Some(id))
    }

    pub fn extra_operators(&self) -> &[TargetId] {
        &self.extra_operators
    }

    pub fn add_extra_loggable(&mut self, loggable: TargetId) {
        if !self.extra_loggables.contains(&loggable) {
            self.extra_loggables.push(loggable);
        }
    }

    pub fn extra_loggables(&self) -> &[TargetId] {
        &self.extra_loggables
    }

    pub fn add_extra_logger(&mut self, logger: Box<dyn ExtraLogger>) {
        self.extra_loggers.push(logger);
    }

    pub(crate) fn take_extra_loggers(&mut self) -> Vec<Box<dyn ExtraLogger>> {
        std::mem::take(&mut self.extra_loggers)
    }

    // ---- coercion ----

    /// Returns the target of `value` as a real parameter, rewriting an
    /// integer parameter into a real one under the same target.
    pub fn as_real_parameter(&mut self, value: ValueId) -> Result<TargetId, LoweringError> {
        let target = self.require_target(value)?;
        let obj = self.store.get(target);
        let replacement = match &obj.kind {
            TargetKind::RealParameter(_) => return Ok(target),
            TargetKind::IntegerParameter(p) => {
                let mut real = Parameter::new(
                    p.values.iter().map(|v| *v as f64).collect(),
                    p.estimate,
                );
                real.lower = p.lower.map(|v| v as f64);
                real.upper = p.upper.map(|v| v as f64);
                real.keys = p.keys.clone();
                real.minor_dimension = p.minor_dimension;
                TargetObject::new(specs::REAL_PARAMETER, TargetKind::RealParameter(real))
                    .with_opt_id(obj.id.clone())
            }
            _ => {
                return Err(LoweringError::Coercion {
                    id: self.display_id(target),
                    from: specs::simple_name(&obj.spec).to_string(),
                    to: "RealParameter".into(),
                })
            }
        };
        self.coerce_in_place(target, replacement);
        Ok(target)
    }

    /// Returns the target of `value` as an integer parameter, rewriting a
    /// real parameter whose entries are all integral.
    pub fn as_integer_parameter(&mut self, value: ValueId) -> Result<TargetId, LoweringError> {
        let target = self.require_target(value)?;
        let obj = self.store.get(target);
        let coercion_error = || LoweringError::Coercion {
            id: obj.id.clone().unwrap_or_else(|| format!("#{}", target.0)),
            from: specs::simple_name(&obj.spec).to_string(),
            to: "IntegerParameter".into(),
        };
        let replacement = match &obj.kind {
            TargetKind::IntegerParameter(_) => return Ok(target),
            TargetKind::RealParameter(p) => {
                if p.values.iter().any(|v| v.fract() != 0.0 || !v.is_finite()) {
                    return Err(coercion_error());
                }
                let mut int = Parameter::new(
                    p.values.iter().map(|v| *v as i64).collect(),
                    p.estimate,
                );
                int.lower = p.lower.filter(|v| v.is_finite()).map(|v| v.ceil() as i64);
                int.upper = p.upper.filter(|v| v.is_finite()).map(|v| v.floor() as i64);
                int.keys = p.keys.clone();
                int.minor_dimension = p.minor_dimension;
                TargetObject::new(specs::INTEGER_PARAMETER, TargetKind::IntegerParameter(int))
                    .with_opt_id(obj.id.clone())
            }
            _ => return Err(coercion_error()),
        };
        self.coerce_in_place(target, replacement);
        Ok(target)
    }

    /// Sets bounds on a numeric parameter; other targets are left alone.
    pub fn set_bounds(&mut self, target: TargetId, lower: Option<f64>, upper: Option<f64>) {
        match &mut self.store.get_mut(target).kind {
            TargetKind::RealParameter(p) => {
                if lower.is_some() {
                    p.lower = lower;
                }
                if upper.is_some() {
                    p.upper = upper;
                }
            }
            TargetKind::IntegerParameter(p) => {
                if let Some(l) = lower.filter(|v| v.is_finite()) {
                    p.lower = Some(l.ceil() as i64);
                }
                if let Some(u) = upper.filter(|v| v.is_finite()) {
                    p.upper = Some(u.floor() as i64);
                }
            }
            _ => {}
        }
    }

    /// Burn-in units of the state: internal nodes for trees, dimension for
    /// everything else.
    pub fn burnin_units(&self) -> u64 {
        self.state
            .iter()
            .map(|t| match &self.store.get(*t).kind {
                TargetKind::Tree(tree) => tree.internal_nodes as u64,
                _ => self.store.get(*t).dimension() as u64,
            })
            .sum()
    }

    /// Hands the arena and state list over to the finished configuration.
    pub(crate) fn into_parts(self) -> (TargetStore, Vec<TargetId>) {
        (self.store, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tobeast_model::{kinds, Payload};

    fn parameter(id: &str, values: Vec<f64>) -> TargetObject {
        TargetObject::new(
            specs::REAL_PARAMETER,
            TargetKind::RealParameter(Parameter::new(values, true)),
        )
        .with_id(id)
    }

    /// `x ~ Exp(1)` feeding `y ~ Exp(x)`.
    fn chain_graph() -> (ModelGraph, ValueId, ValueId) {
        let mut g = ModelGraph::new();
        let one = g.add_constant("one", Payload::Real(1.0)).unwrap();
        let e1 = g
            .add_generator(tobeast_model::Generator::distribution(kinds::EXP).with_param("mean", one))
            .unwrap();
        let x = g.add_random("x", Payload::Real(0.5), e1).unwrap();
        let e2 = g
            .add_generator(tobeast_model::Generator::distribution(kinds::EXP).with_param("mean", x))
            .unwrap();
        let y = g.add_random("y", Payload::Real(0.2), e2).unwrap();
        (g, x, y)
    }

    #[test]
    fn insert_adds_consumed_random_values_to_state() {
        let (g, x, y) = chain_graph();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let tx = ctx.add(parameter("x", vec![0.5]));
        let ty = ctx.add(parameter("y", vec![0.2]));
        ctx.insert(SourceRef::Value(x), tx).unwrap();
        ctx.insert(SourceRef::Value(y), ty).unwrap();
        // y is a sink, so it is not state
        assert_eq!(ctx.state(), &[tx]);
        assert_eq!(ctx.origin(tx), Some(SourceRef::Value(x)));
    }

    #[test]
    fn insert_rejects_a_second_target_for_the_same_node() {
        let (g, x, _) = chain_graph();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let a = ctx.add(parameter("x", vec![0.5]));
        let b = ctx.add(parameter("x", vec![0.5]));
        ctx.insert(SourceRef::Value(x), a).unwrap();
        assert!(ctx.insert(SourceRef::Value(x), a).is_ok());
        assert!(matches!(
            ctx.insert(SourceRef::Value(x), b),
            Err(LoweringError::Internal(_))
        ));
    }

    #[test]
    fn remove_clears_every_index() {
        let (g, x, _) = chain_graph();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let tx = ctx.add(parameter("x", vec![0.5]));
        ctx.insert(SourceRef::Value(x), tx).unwrap();
        ctx.skip_operators(tx);
        ctx.add_extra_loggable(tx);
        ctx.remove(tx);
        assert_eq!(ctx.lowered(SourceRef::Value(x)), None);
        assert_eq!(ctx.origin(tx), None);
        assert!(ctx.contributors(tx).is_empty());
        assert!(ctx.state().is_empty());
        assert!(!ctx.is_operator_skipped(tx));
        assert!(ctx.extra_loggables().is_empty());
    }

    #[test]
    fn containers_unwrap_into_their_parts() {
        let (g, _, _) = chain_graph();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let a = ctx.add(parameter("a", vec![1.0]));
        let b = ctx.add(parameter("b", vec![2.0]));
        let concat = ctx.add(TargetObject::new(
            specs::CONCATENATE,
            TargetKind::Concatenate(vec![a, b]),
        ));
        let slice = ctx.add(TargetObject::new(
            specs::SLICE,
            TargetKind::Slice {
                source: a,
                index: 0,
                count: 1,
            },
        ));
        ctx.add_state_node(concat);
        ctx.add_state_node(slice);
        assert_eq!(ctx.state(), &[a, b]);
    }

    #[test]
    fn integer_parameter_coerces_to_real_in_place() {
        let mut g = ModelGraph::new();
        let one = g.add_constant("one", Payload::Real(1.0)).unwrap();
        let pois = g
            .add_generator(tobeast_model::Generator::distribution(kinds::POISSON).with_param("lambda", one))
            .unwrap();
        let k = g.add_random("k", Payload::Integer(3), pois).unwrap();
        g.add_generator(tobeast_model::Generator::distribution(kinds::EXP).with_param("mean", k))
            .unwrap();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let int = ctx.add(
            TargetObject::new(
                specs::INTEGER_PARAMETER,
                TargetKind::IntegerParameter(Parameter::new(vec![3], true)),
            )
            .with_id("k"),
        );
        ctx.insert(SourceRef::Value(k), int).unwrap();
        assert_eq!(ctx.state(), &[int]);

        let real = ctx.as_real_parameter(k).unwrap();
        assert_eq!(real, int);
        assert_eq!(ctx.object(real).id(), Some("k"));
        assert_eq!(ctx.object(real).spec, specs::REAL_PARAMETER);
        assert_eq!(ctx.object(real).real_values(), Some(vec![3.0]));
        assert_eq!(ctx.target_of(k), Some(real));
        assert_eq!(ctx.state(), &[real]);
        assert_eq!(ctx.origin(real), Some(SourceRef::Value(k)));
        assert_eq!(ctx.store().len(), 1);
        // already real: nothing changes
        assert_eq!(ctx.as_real_parameter(k).unwrap(), real);
        // and back again
        let back = ctx.as_integer_parameter(k).unwrap();
        assert_eq!(back, int);
        assert_eq!(ctx.object(back).spec, specs::INTEGER_PARAMETER);
        assert_eq!(ctx.state(), &[int]);
    }

    #[test]
    fn non_integral_values_do_not_coerce_to_integer() {
        let (g, x, _) = chain_graph();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let tx = ctx.add(parameter("x", vec![0.5]));
        ctx.insert(SourceRef::Value(x), tx).unwrap();
        let err = ctx.as_integer_parameter(x).unwrap_err();
        assert!(matches!(err, LoweringError::Coercion { .. }));
        assert_eq!(ctx.state(), &[tx]);
    }

    #[test]
    fn trees_cannot_be_coerced() {
        let (g, x, _) = chain_graph();
        let r = Registry::new();
        let mut ctx = Context::new(&g, &r);
        let tree = ctx.add(TargetObject::new(specs::TREE, TargetKind::Object).with_id("x"));
        ctx.insert(SourceRef::Value(x), tree).unwrap();
        assert!(matches!(
            ctx.as_real_parameter(x),
            Err(LoweringError::Coercion { .. })
        ));
    }
}
