//! # Target Objects
//!
//! Engine-side constructs produced by converters: parameters, trees,
//! distributions, operators and loggers. Objects live in a [`TargetStore`]
//! arena and refer to each other by [`TargetId`].
//!
//! The typed [`TargetKind`] carries what the lowering passes need to reason
//! about (parameter values, container structure, tree size); everything else
//! an object feeds to the engine goes into its named `inputs`.

/// Identifier of an object in a [`TargetStore`].
///
/// Ids are issued in creation order, so sorting by id is creation order.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TargetId(pub u32);

/// A named input of a target object.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Ref(TargetId),
    Refs(Vec<TargetId>),
    Real(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Reals(Vec<f64>),
}

/// Values and bounds of a numeric or boolean parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter<T> {
    pub values: Vec<T>,
    pub lower: Option<T>,
    pub upper: Option<T>,
    /// Per-dimension names, e.g. deme names.
    pub keys: Option<Vec<String>>,
    /// Column count when the parameter stores a flattened matrix.
    pub minor_dimension: Option<usize>,
    pub estimate: bool,
}

impl<T> Parameter<T> {
    pub fn new(values: Vec<T>, estimate: bool) -> Self {
        Parameter {
            values,
            lower: None,
            upper: None,
            keys: None,
            minor_dimension: None,
            estimate,
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Starting tree handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeState {
    pub newick: String,
    pub taxa: Vec<String>,
    pub internal_nodes: usize,
    pub root_height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentData {
    /// `(taxon, sequence)` pairs in input order.
    pub sequences: Vec<(String, String)>,
    pub datatype: String,
    pub state_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Autodetect,
    Tree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggerData {
    pub file_name: Option<String>,
    pub log_every: u64,
    pub mode: LogMode,
    pub entries: Vec<TargetId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetKind {
    RealParameter(Parameter<f64>),
    IntegerParameter(Parameter<i64>),
    BooleanParameter(Parameter<bool>),
    Tree(TreeState),
    Alignment(AlignmentData),
    /// Parameters joined end to end into one vector view.
    Concatenate(Vec<TargetId>),
    /// A window of `count` entries starting at `index` of `source`.
    Slice {
        source: TargetId,
        index: usize,
        count: usize,
    },
    /// A list of independently lowered objects.
    Vector(Vec<TargetId>),
    Distribution,
    CompoundDistribution(Vec<TargetId>),
    Operator {
        weight: f64,
    },
    Logger(LoggerData),
    /// Any other engine object (models, parametric distributions, helpers).
    Object,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetObject {
    pub id: Option<String>,
    pub spec: String,
    pub kind: TargetKind,
    pub inputs: Vec<(String, Input)>,
}

impl TargetObject {
    pub fn new(spec: impl Into<String>, kind: TargetKind) -> Self {
        TargetObject {
            id: None,
            spec: spec.into(),
            kind,
            inputs: Vec::new(),
        }
    }

    /// An operator with the given identifier and weight.
    pub fn operator(spec: impl Into<String>, id: impl Into<String>, weight: f64) -> Self {
        TargetObject::new(spec, TargetKind::Operator { weight }).with_id(id)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_opt_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn input(mut self, name: impl Into<String>, input: Input) -> Self {
        self.set_input(name, input);
        self
    }

    /// Sets `name`, replacing an earlier input of the same name.
    pub fn set_input(&mut self, name: impl Into<String>, input: Input) {
        let name = name.into();
        match self.inputs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = input,
            None => self.inputs.push((name, input)),
        }
    }

    pub fn get_input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, i)| i)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_distribution(&self) -> bool {
        matches!(
            self.kind,
            TargetKind::Distribution | TargetKind::CompoundDistribution(_)
        )
    }

    pub fn is_parameter(&self) -> bool {
        matches!(
            self.kind,
            TargetKind::RealParameter(_)
                | TargetKind::IntegerParameter(_)
                | TargetKind::BooleanParameter(_)
        )
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.kind, TargetKind::Tree(_))
    }

    /// Number of entries of a parameter; 1 for anything else.
    pub fn dimension(&self) -> usize {
        match &self.kind {
            TargetKind::RealParameter(p) => p.dimension(),
            TargetKind::IntegerParameter(p) => p.dimension(),
            TargetKind::BooleanParameter(p) => p.dimension(),
            TargetKind::Concatenate(parts) | TargetKind::Vector(parts) => parts.len(),
            TargetKind::Slice { count, .. } => *count,
            _ => 1,
        }
    }

    /// Values of a numeric parameter as reals.
    pub fn real_values(&self) -> Option<Vec<f64>> {
        match &self.kind {
            TargetKind::RealParameter(p) => Some(p.values.clone()),
            TargetKind::IntegerParameter(p) => Some(p.values.iter().map(|v| *v as f64).collect()),
            _ => None,
        }
    }

    /// Every object this one refers to, kind references first.
    pub fn references(&self) -> Vec<TargetId> {
        let mut out = Vec::new();
        match &self.kind {
            TargetKind::Concatenate(parts)
            | TargetKind::Vector(parts)
            | TargetKind::CompoundDistribution(parts) => out.extend(parts.iter().copied()),
            TargetKind::Slice { source, .. } => out.push(*source),
            TargetKind::Logger(data) => out.extend(data.entries.iter().copied()),
            _ => {}
        }
        for (_, input) in &self.inputs {
            match input {
                Input::Ref(t) => out.push(*t),
                Input::Refs(ts) => out.extend(ts.iter().copied()),
                _ => {}
            }
        }
        out
    }
}

/// Arena of target objects.
#[derive(Debug, Clone, Default)]
pub struct TargetStore {
    objects: Vec<TargetObject>,
}

impl TargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: TargetObject) -> TargetId {
        let id = TargetId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this store.
    pub fn get(&self, id: TargetId) -> &TargetObject {
        &self.objects[id.0 as usize]
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this store.
    pub fn get_mut(&mut self, id: TargetId) -> &mut TargetObject {
        &mut self.objects[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &TargetObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (TargetId(i as u32), o))
    }

    /// First object carrying identifier `id`.
    pub fn find(&self, id: &str) -> Option<TargetId> {
        self.iter().find(|(_, o)| o.id() == Some(id)).map(|(t, _)| t)
    }
}
