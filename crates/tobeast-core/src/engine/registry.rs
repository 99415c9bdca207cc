//! # Conversion Registry
//!
//! Ordered tables of converters consulted by the lowering passes.
//!
//! - Value converters are tried in registration order; the first whose
//!   `matches` predicate holds wins.
//! - Generator converters are found by exact kind first, then by a linear scan
//!   for the first registered kind listed among the generator's supertypes.
//! - Bundles contribute converters, datatypes, exclusions and tree operator
//!   strategies. Registering a key twice logs a warning; the later entry wins.
//!
//! A registry is built once and then only read, so it can be shared by
//! reference across concurrent lowering runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tobeast_model::{Generator, GeneratorId, ModelGraph, PayloadKind, Value, ValueId};
use tracing::{debug, warn};

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::target::TargetId;
use crate::engine::tree_strategy::{DefaultTreeOperatorStrategy, TreeOperatorStrategy};

/// Lowers one source value into a target object.
pub trait ValueConverter: Send + Sync + 'static {
    /// Registry key; registering a second converter with the same name
    /// replaces the first.
    fn name(&self) -> &str;

    fn matches(&self, value: &Value, graph: &ModelGraph) -> bool;

    fn lower(&self, value: ValueId, ctx: &mut Context<'_>) -> Result<TargetId, LoweringError>;
}

/// Lowers one generator into a distribution or process object.
pub trait GeneratorConverter: Send + Sync + 'static {
    /// Generator kind this converter handles.
    fn kind(&self) -> &str;

    /// Restructures already-lowered values before any generator is built.
    fn rewrite(
        &self,
        _generator: GeneratorId,
        _output: TargetId,
        _ctx: &mut Context<'_>,
    ) -> Result<(), LoweringError> {
        Ok(())
    }

    /// Builds the target object for `generator`, whose effective output
    /// target is `output`.
    fn build(
        &self,
        generator: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError>;

    /// Trees produced by this generator carry per-branch metadata and need a
    /// metadata-annotated tree logger.
    fn annotates_tree_branches(&self) -> bool {
        false
    }
}

/// Engine-side datatype descriptor for a sequence kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataType {
    pub name: String,
    pub state_count: Option<usize>,
}

impl DataType {
    pub fn new(name: impl Into<String>, state_count: Option<usize>) -> Self {
        DataType {
            name: name.into(),
            state_count,
        }
    }
}

/// Generators skipped silently instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorExclusion {
    /// Any generator of this kind or with it as a supertype.
    Kind(String),
    /// A wrapper of kind `wrapper` whose base component is of kind `base`.
    WrapperOf { wrapper: String, base: String },
}

impl GeneratorExclusion {
    pub fn kind(kind: impl Into<String>) -> Self {
        GeneratorExclusion::Kind(kind.into())
    }

    fn covers(&self, generator: &Generator, graph: &ModelGraph) -> bool {
        match self {
            GeneratorExclusion::Kind(kind) => generator.is_a(kind),
            GeneratorExclusion::WrapperOf { wrapper, base } => {
                generator.is_a(wrapper)
                    && generator
                        .components
                        .iter()
                        .any(|c| graph.generator(*c).is_a(base))
            }
        }
    }
}

/// A set of contributions loaded into a [`Registry`] as one unit.
pub trait Bundle {
    fn name(&self) -> &str;

    fn value_converters(&self) -> Vec<Arc<dyn ValueConverter>> {
        Vec::new()
    }

    fn generator_converters(&self) -> Vec<Arc<dyn GeneratorConverter>> {
        Vec::new()
    }

    /// `(sequence kind key, datatype)` pairs.
    fn datatypes(&self) -> Vec<(String, DataType)> {
        Vec::new()
    }

    fn value_exclusions(&self) -> Vec<PayloadKind> {
        Vec::new()
    }

    fn generator_exclusions(&self) -> Vec<GeneratorExclusion> {
        Vec::new()
    }

    fn tree_operator_strategy(&self) -> Option<Arc<dyn TreeOperatorStrategy>> {
        None
    }
}

/// Converter tables for one or more lowering runs.
#[derive(Clone)]
pub struct Registry {
    value_converters: Vec<Arc<dyn ValueConverter>>,
    generator_converters: Vec<Arc<dyn GeneratorConverter>>,
    generator_index: FxHashMap<String, usize>,
    datatypes: BTreeMap<String, DataType>,
    value_exclusions: Vec<PayloadKind>,
    generator_exclusions: Vec<GeneratorExclusion>,
    tree_strategies: Vec<Arc<dyn TreeOperatorStrategy>>,
    default_tree_strategy: Arc<dyn TreeOperatorStrategy>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("value_converters", &self.value_converter_names())
            .field("generator_kinds", &self.generator_kinds())
            .field("datatypes", &self.datatypes)
            .field("value_exclusions", &self.value_exclusions)
            .field("generator_exclusions", &self.generator_exclusions)
            .field("tree_strategies", &self.tree_strategies.len())
            .finish()
    }
}

impl Registry {
    /// An empty registry using the default tree operator strategy.
    pub fn new() -> Self {
        Registry {
            value_converters: Vec::new(),
            generator_converters: Vec::new(),
            generator_index: FxHashMap::default(),
            datatypes: BTreeMap::new(),
            value_exclusions: Vec::new(),
            generator_exclusions: Vec::new(),
            tree_strategies: Vec::new(),
            default_tree_strategy: Arc::new(DefaultTreeOperatorStrategy),
        }
    }

    /// A registry holding the default bundle.
    pub fn with_defaults() -> Self {
        let mut r = Registry::new();
        r.load(&crate::defaults::DefaultBundle);
        r
    }

    /// Loads bundles in order; later bundles override earlier ones.
    pub fn from_bundles(bundles: &[&dyn Bundle]) -> Self {
        let mut r = Registry::new();
        for bundle in bundles {
            r.load(*bundle);
        }
        r
    }

    pub fn load(&mut self, bundle: &dyn Bundle) {
        debug!(bundle = bundle.name(), "loading bundle");
        for c in bundle.value_converters() {
            self.register_value_converter(c);
        }
        for c in bundle.generator_converters() {
            self.register_generator_converter(c);
        }
        for (key, datatype) in bundle.datatypes() {
            self.register_datatype(key, datatype);
        }
        for kind in bundle.value_exclusions() {
            self.exclude_value(kind);
        }
        for rule in bundle.generator_exclusions() {
            self.exclude_generator(rule);
        }
        if let Some(strategy) = bundle.tree_operator_strategy() {
            self.register_tree_strategy(strategy);
        }
    }

    pub fn register_value_converter(&mut self, converter: Arc<dyn ValueConverter>) {
        let name = converter.name().to_string();
        match self
            .value_converters
            .iter()
            .position(|c| c.name() == name)
        {
            Some(i) => {
                warn!(converter = %name, "duplicate value converter registration, replacing");
                self.value_converters[i] = converter;
            }
            None => self.value_converters.push(converter),
        }
    }

    pub fn register_generator_converter(&mut self, converter: Arc<dyn GeneratorConverter>) {
        let kind = converter.kind().to_string();
        match self.generator_index.get(&kind) {
            Some(&i) => {
                warn!(kind = %kind, "duplicate generator converter registration, replacing");
                self.generator_converters[i] = converter;
            }
            None => {
                self.generator_index
                    .insert(kind, self.generator_converters.len());
                self.generator_converters.push(converter);
            }
        }
    }

    pub fn register_datatype(&mut self, key: impl Into<String>, datatype: DataType) {
        let key = key.into();
        if let Some(old) = self.datatypes.insert(key.clone(), datatype) {
            warn!(key = %key, previous = %old.name, "duplicate datatype registration, replacing");
        }
    }

    pub fn exclude_value(&mut self, kind: PayloadKind) {
        if !self.value_exclusions.contains(&kind) {
            self.value_exclusions.push(kind);
        }
    }

    pub fn exclude_generator(&mut self, rule: GeneratorExclusion) {
        if !self.generator_exclusions.contains(&rule) {
            self.generator_exclusions.push(rule);
        }
    }

    pub fn register_tree_strategy(&mut self, strategy: Arc<dyn TreeOperatorStrategy>) {
        if let Some(i) = self
            .tree_strategies
            .iter()
            .position(|s| s.name() == strategy.name())
        {
            warn!(strategy = strategy.name(), "duplicate tree operator strategy, replacing");
            self.tree_strategies[i] = strategy;
        } else {
            self.tree_strategies.push(strategy);
        }
    }

    /// First value converter, in registration order, matching `value`.
    pub fn find_value_converter(
        &self,
        value: &Value,
        graph: &ModelGraph,
    ) -> Option<&Arc<dyn ValueConverter>> {
        self.value_converters
            .iter()
            .find(|c| c.matches(value, graph))
    }

    /// Converter for the generator's exact kind, else for the first
    /// registered kind among its supertypes.
    pub fn find_generator_converter(
        &self,
        generator: &Generator,
    ) -> Option<&Arc<dyn GeneratorConverter>> {
        if let Some(&i) = self.generator_index.get(&generator.kind) {
            return Some(&self.generator_converters[i]);
        }
        self.generator_converters
            .iter()
            .find(|c| generator.supertypes.iter().any(|s| s == c.kind()))
    }

    pub fn is_excluded_value(&self, value: &Value) -> bool {
        self.value_exclusions.contains(&value.payload.kind())
    }

    pub fn is_excluded_generator(&self, generator: &Generator, graph: &ModelGraph) -> bool {
        self.generator_exclusions
            .iter()
            .any(|rule| rule.covers(generator, graph))
    }

    pub fn datatype(&self, key: &str) -> Option<&DataType> {
        self.datatypes.get(key)
    }

    /// First registered strategy applying to a tree produced by `generator`,
    /// else the default strategy.
    pub fn tree_strategy_for(&self, generator: Option<&Generator>) -> &Arc<dyn TreeOperatorStrategy> {
        self.tree_strategies
            .iter()
            .find(|s| s.applies_to(generator))
            .unwrap_or(&self.default_tree_strategy)
    }

    pub fn value_converter_names(&self) -> Vec<&str> {
        self.value_converters.iter().map(|c| c.name()).collect()
    }

    pub fn generator_kinds(&self) -> Vec<&str> {
        self.generator_converters.iter().map(|c| c.kind()).collect()
    }
}
