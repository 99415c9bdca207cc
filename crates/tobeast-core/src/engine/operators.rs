//! # Operator Synthesis
//!
//! Picks proposal operators for every state node not excluded from automatic
//! synthesis, from the node's type and the distribution that sampled it.
//!
//! | state                     | sampled by                 | operator                |
//! |---------------------------|----------------------------|-------------------------|
//! | real parameter            | Dirichlet (or a wrapper)   | delta exchange, 1/dim   |
//! | real parameter            | anything else              | scale, factor 0.75      |
//! | integer parameter         | RandomComposition          | integer delta exchange  |
//! | integer parameter         | anything else              | integer random walk     |
//! | boolean parameter         | any                        | bit flip                |
//! | tree                      | any                        | tree operator strategy  |
//!
//! Weights grow sub-linearly with size: `size^0.7`.

use tobeast_model::{kinds, Generator, ModelGraph};
use tracing::{debug, warn};

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::target::{Input, TargetId, TargetKind, TargetObject};
use crate::specs;

/// Exponent applied to a state node's size to get its operator weight.
pub const WEIGHT_EXPONENT: f64 = 0.7;

/// Scale factor of parameter scale operators.
pub const SCALE_FACTOR: f64 = 0.75;

/// Step of integer delta-exchange operators.
pub const INTEGER_DELTA: f64 = 2.0;

/// Window of integer random walks.
pub const RANDOM_WALK_WINDOW: i64 = 1;

pub fn operator_weight(size: usize) -> f64 {
    (size as f64).powf(WEIGHT_EXPONENT)
}

/// True for Dirichlet generators and wrappers of them.
pub fn is_dirichlet_family(generator: &Generator, graph: &ModelGraph) -> bool {
    generator.is_a(kinds::DIRICHLET)
        || generator.is_a(kinds::DIRICHLET_MULTI)
        || ((generator.is_a(kinds::IID) || generator.is_a(kinds::VECTORIZED))
            && generator
                .components
                .iter()
                .any(|c| graph.generator(*c).is_a(kinds::DIRICHLET)))
}

/// Builds the operators of every unskipped state node, appends the extra
/// operators and sorts the result by identifier.
pub fn synthesize_operators(ctx: &mut Context<'_>) -> Result<Vec<TargetId>, LoweringError> {
    let mut operators = Vec::new();
    for node in ctx.state().to_vec() {
        if ctx.is_operator_skipped(node) {
            debug!(node = %ctx.display_id(node), "operators skipped");
            continue;
        }
        operators.extend(operators_for(node, ctx)?);
    }
    for extra in ctx.extra_operators() {
        if !operators.contains(extra) {
            operators.push(*extra);
        }
    }
    sort_operators(&mut operators, ctx);
    Ok(operators)
}

/// Stable sort by identifier; anonymous operators keep their relative order
/// after the named ones.
pub fn sort_operators(operators: &mut [TargetId], ctx: &Context<'_>) {
    operators.sort_by(|a, b| {
        let ia = ctx.object(*a).id();
        let ib = ctx.object(*b).id();
        match (ia, ib) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
}

fn operators_for(node: TargetId, ctx: &mut Context<'_>) -> Result<Vec<TargetId>, LoweringError> {
    let graph = ctx.graph();
    let id = ctx.display_id(node);
    let dim = ctx.object(node).dimension();
    let operator = match &ctx.object(node).kind {
        TargetKind::RealParameter(p) => {
            let Some((_, generator)) = ctx.random_provenance(node) else {
                warn!(node = %id, "real state node has no random provenance, no operator created");
                return Ok(Vec::new());
            };
            if is_dirichlet_family(generator, graph) {
                TargetObject::operator(specs::DELTA_EXCHANGE, format!("{}.deltaExchange", id), operator_weight(dim))
                    .input("parameter", Input::Ref(node))
                    .input("delta", Input::Real(1.0 / p.dimension() as f64))
            } else {
                TargetObject::operator(specs::SCALE_OPERATOR, format!("{}.scale", id), operator_weight(dim))
                    .input("parameter", Input::Ref(node))
                    .input("scaleFactor", Input::Real(SCALE_FACTOR))
            }
        }
        TargetKind::IntegerParameter(_) => {
            let Some((_, generator)) = ctx.random_provenance(node) else {
                warn!(node = %id, "integer state node has no random provenance, no operator created");
                return Ok(Vec::new());
            };
            if generator.is_a(kinds::RANDOM_COMPOSITION) {
                TargetObject::operator(
                    specs::DELTA_EXCHANGE,
                    format!("{}.deltaExchange", id),
                    operator_weight(dim.saturating_sub(1)),
                )
                .input("intparameter", Input::Ref(node))
                .input("delta", Input::Real(INTEGER_DELTA))
                .input("integer", Input::Boolean(true))
            } else {
                TargetObject::operator(specs::INT_RANDOM_WALK, format!("{}.randomWalk", id), operator_weight(dim))
                    .input("parameter", Input::Ref(node))
                    .input("windowSize", Input::Integer(RANDOM_WALK_WINDOW))
            }
        }
        TargetKind::BooleanParameter(_) => {
            TargetObject::operator(specs::BIT_FLIP, format!("{}.bitFlip", id), operator_weight(dim))
                .input("parameter", Input::Ref(node))
        }
        TargetKind::Tree(_) => {
            let generator = ctx.random_provenance(node).map(|(_, g)| g);
            let strategy = ctx.registry().tree_strategy_for(generator);
            let ops = strategy.create_operators(node, ctx)?;
            if ops.is_empty() {
                return Err(LoweringError::InvalidTreeOperatorStrategy {
                    strategy: strategy.name().to_string(),
                    tree: id,
                });
            }
            debug!(tree = %id, strategy = strategy.name(), count = ops.len(), "tree operators");
            return Ok(ops);
        }
        _ => return Ok(Vec::new()),
    };
    Ok(vec![ctx.add(operator)])
}
