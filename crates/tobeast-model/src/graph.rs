//! # Source Graph
//!
//! The DAG of value and generator nodes handed to the lowering engine.
//!
//! ## Design
//!
//! - Nodes live in two arenas addressed by [`ValueId`] and [`GeneratorId`].
//! - Named values are registered in one of two namespaces. A name present in
//!   both the `data` and the `model` namespace is a candidate for clamping.
//! - A reverse index from each value to the generators consuming it is kept
//!   current on every insertion, so sink computation is a single scan.
//!
//! ## Example
//!
//! ```rust
//! use tobeast_model::{Generator, ModelGraph, Payload, kinds};
//!
//! let mut g = ModelGraph::new();
//! let m = g.add_constant("M", Payload::Real(3.0)).unwrap();
//! let s = g.add_constant("S", Payload::Real(1.0)).unwrap();
//! let ln = g
//!     .add_generator(Generator::distribution(kinds::LOG_NORMAL).with_param("meanlog", m).with_param("sdlog", s))
//!     .unwrap();
//! let theta = g.add_random("Theta", Payload::Real(20.0), ln).unwrap();
//! assert_eq!(g.sinks(), vec![theta]);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use smallvec::SmallVec;

use crate::errors::ModelError;
use crate::payload::Payload;

/// Identifier of a value node.
///
/// ValueId implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueId(pub u32);

/// Identifier of a generator node.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorId(pub u32);

/// Namespace a value was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Namespace {
    /// Observed data.
    Data,
    /// The generative model.
    #[default]
    Model,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Data => f.write_str("data"),
            Namespace::Model => f.write_str("model"),
        }
    }
}

/// A value node: a payload plus its provenance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Value {
    /// Name of the value, `None` for anonymous intermediates.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<String>,
    pub payload: Payload,
    #[cfg_attr(feature = "serde", serde(default))]
    pub generator: Option<GeneratorId>,
    /// Sampled from a generative distribution rather than fixed or computed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub random: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub namespace: Namespace,
}

impl Value {
    /// An anonymous, fixed value in the model namespace.
    pub fn constant(payload: Payload) -> Self {
        Value {
            id: None,
            payload,
            generator: None,
            random: false,
            namespace: Namespace::Model,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.id = Some(name.into());
        self
    }

    pub fn in_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn generated_by(mut self, generator: GeneratorId, random: bool) -> Self {
        self.generator = Some(generator);
        self.random = random;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A generator node: a distribution or a deterministic function.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generator {
    pub kind: String,
    /// Kind names this generator also answers to, nearest first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub supertypes: Vec<String>,
    /// Named inputs in declaration order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: Vec<(String, ValueId)>,
    /// Values this generator produced. Rebuilt from the value arena.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing))]
    pub outputs: Vec<ValueId>,
    /// Generative distribution (as opposed to a deterministic function).
    #[cfg_attr(feature = "serde", serde(default))]
    pub generative: bool,
    /// Wrapped generators: the base of an IID wrapper, or the per-element
    /// generators of a vectorized distribution.
    #[cfg_attr(feature = "serde", serde(default))]
    pub components: Vec<GeneratorId>,
}

impl Generator {
    /// A deterministic function generator.
    pub fn function(kind: impl Into<String>) -> Self {
        Generator {
            kind: kind.into(),
            supertypes: Vec::new(),
            params: Vec::new(),
            outputs: Vec::new(),
            generative: false,
            components: Vec::new(),
        }
    }

    /// A generative distribution.
    pub fn distribution(kind: impl Into<String>) -> Self {
        Generator {
            generative: true,
            ..Generator::function(kind)
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: ValueId) -> Self {
        self.params.push((name.into(), value));
        self
    }

    pub fn with_supertype(mut self, kind: impl Into<String>) -> Self {
        self.supertypes.push(kind.into());
        self
    }

    pub fn with_component(mut self, component: GeneratorId) -> Self {
        self.components.push(component);
        self
    }

    pub fn param(&self, name: &str) -> Option<ValueId> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn inputs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.params.iter().map(|(_, v)| *v)
    }

    /// True if `kind` is this generator's kind or one of its supertypes.
    pub fn is_a(&self, kind: &str) -> bool {
        self.kind == kind || self.supertypes.iter().any(|s| s == kind)
    }

    pub fn output(&self) -> Option<ValueId> {
        self.outputs.first().copied()
    }
}

/// Source graph of one model instance.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "GraphData", into = "GraphData")
)]
pub struct ModelGraph {
    values: Vec<Value>,
    generators: Vec<Generator>,
    data_names: BTreeMap<String, ValueId>,
    model_names: BTreeMap<String, ValueId>,
    consumers: Vec<SmallVec<[GeneratorId; 2]>>,
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, registering its name and linking it to its generator.
    pub fn add_value(&mut self, value: Value) -> Result<ValueId, ModelError> {
        let id = ValueId(self.values.len() as u32);
        if let Some(g) = value.generator {
            if g.0 as usize >= self.generators.len() {
                return Err(ModelError::UnknownGenerator(g.0));
            }
        }
        if let Some(name) = &value.id {
            let names = match value.namespace {
                Namespace::Data => &mut self.data_names,
                Namespace::Model => &mut self.model_names,
            };
            if names.contains_key(name) {
                return Err(ModelError::DuplicateName {
                    name: name.clone(),
                    namespace: value.namespace.to_string(),
                });
            }
            names.insert(name.clone(), id);
        }
        if let Some(g) = value.generator {
            self.generators[g.0 as usize].outputs.push(id);
        }
        self.values.push(value);
        self.consumers.push(SmallVec::new());
        Ok(id)
    }

    /// Adds a named, fixed value to the model namespace.
    pub fn add_constant(&mut self, name: &str, payload: Payload) -> Result<ValueId, ModelError> {
        self.add_value(Value::constant(payload).named(name))
    }

    /// Adds a named observation to the data namespace.
    pub fn add_data(&mut self, name: &str, payload: Payload) -> Result<ValueId, ModelError> {
        self.add_value(
            Value::constant(payload)
                .named(name)
                .in_namespace(Namespace::Data),
        )
    }

    /// Adds a named random variable sampled from `generator`.
    pub fn add_random(
        &mut self,
        name: &str,
        payload: Payload,
        generator: GeneratorId,
    ) -> Result<ValueId, ModelError> {
        self.add_value(
            Value::constant(payload)
                .named(name)
                .generated_by(generator, true),
        )
    }

    /// Adds the deterministic output of a function generator.
    pub fn add_derived(
        &mut self,
        name: Option<&str>,
        payload: Payload,
        generator: GeneratorId,
    ) -> Result<ValueId, ModelError> {
        let mut value = Value::constant(payload).generated_by(generator, false);
        value.id = name.map(str::to_string);
        self.add_value(value)
    }

    /// Adds a generator after checking its inputs and components exist.
    pub fn add_generator(&mut self, mut generator: Generator) -> Result<GeneratorId, ModelError> {
        let id = GeneratorId(self.generators.len() as u32);
        for input in generator.inputs() {
            if input.0 as usize >= self.values.len() {
                return Err(ModelError::UnknownValue(input.0));
            }
        }
        for c in &generator.components {
            if c.0 as usize >= self.generators.len() {
                return Err(ModelError::UnknownGenerator(c.0));
            }
        }
        for input in generator.inputs() {
            let list = &mut self.consumers[input.0 as usize];
            if !list.contains(&id) {
                list.push(id);
            }
        }
        generator.outputs.clear();
        self.generators.push(generator);
        Ok(id)
    }

    /// Returns the value for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0 as usize]
    }

    pub fn get_value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.0 as usize)
    }

    /// Returns the generator for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn generator(&self, id: GeneratorId) -> &Generator {
        &self.generators[id.0 as usize]
    }

    pub fn get_generator(&self, id: GeneratorId) -> Option<&Generator> {
        self.generators.get(id.0 as usize)
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (ValueId(i as u32), v))
    }

    pub fn generators(&self) -> impl Iterator<Item = (GeneratorId, &Generator)> {
        self.generators
            .iter()
            .enumerate()
            .map(|(i, g)| (GeneratorId(i as u32), g))
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    /// Generators that take `value` as an input.
    pub fn consumers(&self, value: ValueId) -> &[GeneratorId] {
        self.consumers
            .get(value.0 as usize)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<ValueId> {
        match namespace {
            Namespace::Data => self.data_names.get(name).copied(),
            Namespace::Model => self.model_names.get(name).copied(),
        }
    }

    /// Generator that produced `value`, if any.
    pub fn generator_of(&self, value: ValueId) -> Option<&Generator> {
        self.value(value).generator.map(|g| self.generator(g))
    }

    /// Model-namespace values no generator consumes, in id order.
    pub fn sinks(&self) -> Vec<ValueId> {
        self.values()
            .filter(|(id, v)| v.namespace == Namespace::Model && self.consumers(*id).is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Values read by the generator of `value`, its wrapped components
    /// included.
    fn dependencies(&self, value: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(root) = self.values[value].generator else {
            return out;
        };
        let mut seen: SmallVec<[GeneratorId; 4]> = SmallVec::new();
        let mut stack = vec![root];
        while let Some(g) = stack.pop() {
            if seen.contains(&g) {
                continue;
            }
            seen.push(g);
            let gen = &self.generators[g.0 as usize];
            out.extend(gen.inputs().map(|v| v.0 as usize));
            stack.extend(gen.components.iter().copied());
        }
        out
    }

    /// Depth-first walk over value dependencies; fails on a back edge.
    fn check_acyclic(&self) -> Result<(), ModelError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Open,
            Done,
        }
        let mut marks = vec![Mark::Unvisited; self.values.len()];
        for start in 0..self.values.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            let mut stack = vec![(start, false)];
            while let Some((v, finished)) = stack.pop() {
                if finished {
                    marks[v] = Mark::Done;
                    continue;
                }
                match marks[v] {
                    Mark::Done => continue,
                    Mark::Open => return Err(ModelError::Cycle(self.label(ValueId(v as u32)))),
                    Mark::Unvisited => {}
                }
                marks[v] = Mark::Open;
                stack.push((v, true));
                for dep in self.dependencies(v) {
                    match marks[dep] {
                        Mark::Open => {
                            return Err(ModelError::Cycle(self.label(ValueId(dep as u32))))
                        }
                        Mark::Unvisited => stack.push((dep, false)),
                        Mark::Done => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Human-readable label for diagnostics: the name, or `_v{id}`.
    pub fn label(&self, value: ValueId) -> String {
        match self.get_value(value).and_then(Value::name) {
            Some(name) => name.to_string(),
            None => format!("_v{}", value.0),
        }
    }
}

/// Wire form of [`ModelGraph`]: the two arenas; indexes are rebuilt on load.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphData {
    #[cfg_attr(feature = "serde", serde(default))]
    pub generators: Vec<Generator>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub values: Vec<Value>,
}

impl TryFrom<GraphData> for ModelGraph {
    type Error = ModelError;

    fn try_from(data: GraphData) -> Result<Self, Self::Error> {
        let mut graph = ModelGraph::new();
        let value_count = data.values.len();
        // Generators may reference values declared after them on the wire, so
        // inputs are checked against the full value arena up front.
        for g in &data.generators {
            for input in g.inputs() {
                if input.0 as usize >= value_count {
                    return Err(ModelError::UnknownValue(input.0));
                }
            }
            for c in &g.components {
                if c.0 as usize >= data.generators.len() {
                    return Err(ModelError::UnknownGenerator(c.0));
                }
            }
        }
        graph.consumers = vec![SmallVec::new(); value_count];
        for (i, mut g) in data.generators.into_iter().enumerate() {
            let id = GeneratorId(i as u32);
            for input in g.inputs() {
                let list = &mut graph.consumers[input.0 as usize];
                if !list.contains(&id) {
                    list.push(id);
                }
            }
            g.outputs.clear();
            graph.generators.push(g);
        }
        let consumers = std::mem::take(&mut graph.consumers);
        for value in data.values {
            if let Payload::Tree(tree) = &value.payload {
                tree.validate()?;
            }
            graph.add_value(value)?;
        }
        graph.consumers = consumers;
        graph.check_acyclic()?;
        Ok(graph)
    }
}

impl From<ModelGraph> for GraphData {
    fn from(graph: ModelGraph) -> Self {
        GraphData {
            generators: graph.generators,
            values: graph.values,
        }
    }
}
