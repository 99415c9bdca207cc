//! Value converters: one target object per source value.

use tobeast_model::{kinds, ModelGraph, Payload, PayloadKind, Value, ValueId};

use crate::engine::context::{Context, SourceRef};
use crate::engine::errors::LoweringError;
use crate::engine::operators::operator_weight;
use crate::engine::registry::{Registry, ValueConverter};
use crate::engine::target::{
    AlignmentData, Input, Parameter, TargetId, TargetKind, TargetObject, TreeState,
};
use crate::specs;

/// Builds the target object for a payload, or `None` for payloads with no
/// engine counterpart.
pub fn payload_object(
    payload: &Payload,
    id: Option<String>,
    estimate: bool,
    registry: &Registry,
) -> Result<Option<TargetObject>, LoweringError> {
    let obj = match payload {
        Payload::Real(x) => real_parameter(vec![*x], estimate),
        Payload::RealArray(xs) => real_parameter(xs.clone(), estimate),
        Payload::Integer(x) => integer_parameter(vec![*x], estimate),
        Payload::IntegerArray(xs) => integer_parameter(xs.clone(), estimate),
        Payload::Boolean(b) => boolean_parameter(vec![*b], estimate),
        Payload::BooleanArray(bs) => boolean_parameter(bs.clone(), estimate),
        Payload::RealMatrix(rows) => {
            let mut p = Parameter::new(rows.iter().flatten().copied().collect(), estimate);
            p.minor_dimension = rows.first().map(Vec::len);
            TargetObject::new(specs::REAL_PARAMETER, TargetKind::RealParameter(p))
        }
        Payload::Tree(tree) => TargetObject::new(
            specs::TREE,
            TargetKind::Tree(TreeState {
                newick: tree.to_newick(),
                taxa: tree.taxa_names(),
                internal_nodes: tree.internal_node_count(),
                root_height: tree.root_height(),
            }),
        ),
        Payload::Alignment(alignment) => {
            let key = alignment.sequence_type.key();
            let datatype = registry
                .datatype(key)
                .ok_or_else(|| LoweringError::Unsupported {
                    kind: "Alignment".into(),
                    reason: format!("no datatype registered for sequence type '{}'", key),
                })?;
            if alignment.taxa.len() != alignment.sequences.len() {
                return Err(LoweringError::DimensionMismatch {
                    what: format!("sequences of alignment {}", id.as_deref().unwrap_or("")),
                    expected: alignment.taxa.len().to_string(),
                    actual: alignment.sequences.len(),
                });
            }
            TargetObject::new(
                specs::ALIGNMENT,
                TargetKind::Alignment(AlignmentData {
                    sequences: alignment
                        .taxa
                        .iter()
                        .cloned()
                        .zip(alignment.sequences.iter().cloned())
                        .collect(),
                    datatype: datatype.name.clone(),
                    state_count: datatype
                        .state_count
                        .or_else(|| alignment.sequence_type.state_count()),
                }),
            )
        }
        _ => return Ok(None),
    };
    Ok(Some(obj.with_opt_id(id)))
}

fn real_parameter(values: Vec<f64>, estimate: bool) -> TargetObject {
    TargetObject::new(
        specs::REAL_PARAMETER,
        TargetKind::RealParameter(Parameter::new(values, estimate)),
    )
}

fn integer_parameter(values: Vec<i64>, estimate: bool) -> TargetObject {
    TargetObject::new(
        specs::INTEGER_PARAMETER,
        TargetKind::IntegerParameter(Parameter::new(values, estimate)),
    )
}

fn boolean_parameter(values: Vec<bool>, estimate: bool) -> TargetObject {
    TargetObject::new(
        specs::BOOLEAN_PARAMETER,
        TargetKind::BooleanParameter(Parameter::new(values, estimate)),
    )
}

fn lower_payload(value: ValueId, ctx: &mut Context<'_>) -> Result<TargetId, LoweringError> {
    let v = ctx.graph().value(value);
    let obj = payload_object(&v.payload, v.id.clone(), v.random, ctx.registry())?.ok_or_else(
        || LoweringError::UnhandledValue {
            id: ctx.graph().label(value),
            type_name: v.payload.kind().type_name().to_string(),
        },
    )?;
    Ok(ctx.add(obj))
}

/// Payload-kind driven converter; one instance per family of kinds.
pub struct PayloadConverter {
    name: &'static str,
    kinds: &'static [PayloadKind],
}

impl PayloadConverter {
    pub const REAL: PayloadConverter = PayloadConverter {
        name: "RealParameter",
        kinds: &[PayloadKind::Real, PayloadKind::RealArray],
    };
    pub const INTEGER: PayloadConverter = PayloadConverter {
        name: "IntegerParameter",
        kinds: &[PayloadKind::Integer, PayloadKind::IntegerArray],
    };
    pub const BOOLEAN: PayloadConverter = PayloadConverter {
        name: "BooleanParameter",
        kinds: &[PayloadKind::Boolean, PayloadKind::BooleanArray],
    };
    pub const MATRIX: PayloadConverter = PayloadConverter {
        name: "RealMatrix",
        kinds: &[PayloadKind::RealMatrix],
    };
    pub const TREE: PayloadConverter = PayloadConverter {
        name: "TimeTree",
        kinds: &[PayloadKind::Tree],
    };
    pub const ALIGNMENT: PayloadConverter = PayloadConverter {
        name: "Alignment",
        kinds: &[PayloadKind::Alignment],
    };
}

impl ValueConverter for PayloadConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, value: &Value, _graph: &ModelGraph) -> bool {
        self.kinds.contains(&value.payload.kind())
    }

    fn lower(&self, value: ValueId, ctx: &mut Context<'_>) -> Result<TargetId, LoweringError> {
        lower_payload(value, ctx)
    }
}

/// A vector of independently lowered elements, `{id}_{i}` each.
pub struct CompoundVectorConverter;

impl ValueConverter for CompoundVectorConverter {
    fn name(&self) -> &str {
        "CompoundVector"
    }

    fn matches(&self, value: &Value, _graph: &ModelGraph) -> bool {
        value.payload.kind() == PayloadKind::Compound
    }

    fn lower(&self, value: ValueId, ctx: &mut Context<'_>) -> Result<TargetId, LoweringError> {
        let graph = ctx.graph();
        let v = graph.value(value);
        let Payload::Compound(items) = &v.payload else {
            return Err(LoweringError::Internal("compound converter on non-compound".into()));
        };
        let label = graph.label(value);
        let mut elements = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let obj = payload_object(item, Some(format!("{}_{}", label, i)), v.random, ctx.registry())?
                .ok_or_else(|| LoweringError::UnhandledValue {
                    id: format!("{}_{}", label, i),
                    type_name: item.kind().type_name().to_string(),
                })?;
            let element = ctx.add(obj);
            ctx.contribute(element, SourceRef::Value(value));
            elements.push(element);
        }
        Ok(ctx.add(
            TargetObject::new(specs::VECTOR, TargetKind::Vector(elements)).with_opt_id(v.id.clone()),
        ))
    }
}

/// Splits a weighted-Dirichlet vector into per-element parameters joined by
/// a concatenation, proposed jointly by one weighted delta exchange.
pub struct WeightedDirichletConverter;

impl ValueConverter for WeightedDirichletConverter {
    fn name(&self) -> &str {
        "WeightedDirichletArray"
    }

    fn matches(&self, value: &Value, graph: &ModelGraph) -> bool {
        value.payload.kind() == PayloadKind::RealArray
            && value
                .generator
                .map(|g| graph.generator(g).is_a(kinds::WEIGHTED_DIRICHLET))
                .unwrap_or(false)
    }

    fn lower(&self, value: ValueId, ctx: &mut Context<'_>) -> Result<TargetId, LoweringError> {
        let graph = ctx.graph();
        let v = graph.value(value);
        let values = v.payload.as_reals().unwrap_or_default();
        let label = graph.label(value);
        let mut elements = Vec::with_capacity(values.len());
        for (i, x) in values.iter().enumerate() {
            let mut p = Parameter::new(vec![*x], true);
            p.lower = Some(0.0);
            let element = ctx.add(
                TargetObject::new(specs::REAL_PARAMETER, TargetKind::RealParameter(p))
                    .with_id(format!("{}_{}", label, i)),
            );
            ctx.skip_operators(element);
            ctx.contribute(element, SourceRef::Value(value));
            elements.push(element);
        }
        let concat = ctx.add(
            TargetObject::new(specs::CONCATENATE, TargetKind::Concatenate(elements.clone()))
                .with_opt_id(v.id.clone()),
        );

        if !graph.consumers(value).is_empty() {
            let generator = graph.generator_of(value);
            let weights = match generator.and_then(|g| g.param("weights")) {
                Some(w) => Some(ctx.as_integer_parameter(w)?),
                None => None,
            };
            let mut op = TargetObject::operator(
                specs::DELTA_EXCHANGE,
                format!("{}.deltaExchange", label),
                operator_weight(elements.len()),
            )
            .input("parameter", Input::Refs(elements));
            if let Some(w) = weights {
                op.set_input("weightvector", Input::Ref(w));
            }
            let op = ctx.add(op);
            ctx.add_extra_operator(op);
        }
        Ok(concat)
    }
}
