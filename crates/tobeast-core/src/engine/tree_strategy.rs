//! Tree operator strategies.
//!
//! A strategy turns one tree state node into its proposal operators. The
//! registry picks the first registered strategy that applies to the tree's
//! generator and falls back to [`DefaultTreeOperatorStrategy`].

use tobeast_model::Generator;

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::operators::operator_weight;
use crate::engine::target::{Input, TargetId, TargetKind, TargetObject, TreeState};
use crate::specs;

/// Scale factor of tree height scalers.
pub const TREE_SCALE_FACTOR: f64 = 0.75;

/// Upper limit of the tree scaler's scale factor.
pub const TREE_SCALE_UPPER: f64 = 0.975;

pub trait TreeOperatorStrategy: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Whether this strategy handles trees produced by `generator`.
    fn applies_to(&self, generator: Option<&Generator>) -> bool;

    fn create_operators(
        &self,
        tree: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<TargetId>, LoweringError>;
}

/// Identifier and size of a tree target, for operator construction.
pub fn tree_summary(tree: TargetId, ctx: &Context<'_>) -> Result<(String, TreeState), LoweringError> {
    match &ctx.object(tree).kind {
        TargetKind::Tree(state) => Ok((ctx.display_id(tree), state.clone())),
        _ => Err(LoweringError::Internal(format!(
            "{} is not a tree",
            ctx.display_id(tree)
        ))),
    }
}

/// Scale, root-age scale, narrow and wide exchange, uniform, subtree slide
/// and Wilson-Balding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTreeOperatorStrategy;

impl TreeOperatorStrategy for DefaultTreeOperatorStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn applies_to(&self, _generator: Option<&Generator>) -> bool {
        true
    }

    fn create_operators(
        &self,
        tree: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<TargetId>, LoweringError> {
        let (id, state) = tree_summary(tree, ctx)?;
        let w = operator_weight(state.internal_nodes);
        let ops = vec![
            TargetObject::operator(specs::SCALE_OPERATOR, format!("{}.scale", id), w)
                .input("tree", Input::Ref(tree))
                .input("scaleFactor", Input::Real(TREE_SCALE_FACTOR))
                .input("upper", Input::Real(TREE_SCALE_UPPER)),
            TargetObject::operator(
                specs::SCALE_OPERATOR,
                format!("{}.rootAgeScale", id),
                operator_weight(1),
            )
            .input("tree", Input::Ref(tree))
            .input("rootOnly", Input::Boolean(true))
            .input("scaleFactor", Input::Real(TREE_SCALE_FACTOR))
            .input("upper", Input::Real(TREE_SCALE_UPPER)),
            TargetObject::operator(specs::EXCHANGE, format!("{}.narrowExchange", id), w)
                .input("tree", Input::Ref(tree))
                .input("isNarrow", Input::Boolean(true)),
            TargetObject::operator(specs::EXCHANGE, format!("{}.wideExchange", id), w)
                .input("tree", Input::Ref(tree))
                .input("isNarrow", Input::Boolean(false)),
            TargetObject::operator(specs::UNIFORM_OPERATOR, format!("{}.uniform", id), w)
                .input("tree", Input::Ref(tree)),
            TargetObject::operator(specs::SUBTREE_SLIDE, format!("{}.subtreeSlide", id), w)
                .input("tree", Input::Ref(tree))
                .input("size", Input::Real(state.root_height / 10.0)),
            TargetObject::operator(specs::WILSON_BALDING, format!("{}.wilsonBalding", id), w)
                .input("tree", Input::Ref(tree)),
        ];
        Ok(ops.into_iter().map(|op| ctx.add(op)).collect())
    }
}
