//! Prior / likelihood partitioning of materialized distributions.

use rustc_hash::FxHashSet;
use tobeast_model::{GeneratorId, ModelGraph};
use tracing::debug;

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::target::{TargetId, TargetKind, TargetObject};
use crate::specs;

pub const POSTERIOR_ID: &str = "posterior";
pub const PRIOR_ID: &str = "prior";
pub const LIKELIHOOD_ID: &str = "likelihood";

/// The three compound distributions of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posterior {
    pub posterior: TargetId,
    pub prior: TargetId,
    pub likelihood: TargetId,
}

/// Generators of the model sinks, with their wrapped components.
pub fn sink_generators(graph: &ModelGraph) -> FxHashSet<GeneratorId> {
    let mut out = FxHashSet::default();
    let mut stack: Vec<GeneratorId> = graph
        .sinks()
        .into_iter()
        .filter_map(|s| graph.value(s).generator)
        .collect();
    while let Some(g) = stack.pop() {
        if out.insert(g) {
            stack.extend(graph.generator(g).components.iter().copied());
        }
    }
    out
}

/// Distributions a target stands for: itself, or the distribution elements
/// of a vector.
fn distributions_in(target: TargetId, ctx: &Context<'_>) -> Vec<TargetId> {
    let obj = ctx.object(target);
    match &obj.kind {
        TargetKind::Vector(items) => items
            .iter()
            .flat_map(|i| distributions_in(*i, ctx))
            .collect(),
        _ if obj.is_distribution() => vec![target],
        _ => Vec::new(),
    }
}

/// Splits every materialized distribution into prior or likelihood and
/// builds the compound posterior.
pub fn partition(ctx: &mut Context<'_>) -> Result<Posterior, LoweringError> {
    let sinks = sink_generators(ctx.graph());
    let mut assigned = FxHashSet::default();
    let mut prior = Vec::new();
    let mut likelihood = Vec::new();

    for (g, target) in ctx.generator_targets() {
        for dist in distributions_in(target, ctx) {
            if !assigned.insert(dist) {
                continue;
            }
            if sinks.contains(&g) {
                likelihood.push(dist);
            } else {
                prior.push(dist);
            }
        }
    }
    for target in ctx.registered_targets() {
        for dist in distributions_in(target, ctx) {
            if assigned.insert(dist) {
                debug!(distribution = %ctx.display_id(dist), "unattributed distribution, adding to prior");
                prior.push(dist);
            }
        }
    }

    let prior = ctx.add(
        TargetObject::new(specs::COMPOUND_DISTRIBUTION, TargetKind::CompoundDistribution(prior))
            .with_id(PRIOR_ID),
    );
    let likelihood = ctx.add(
        TargetObject::new(
            specs::COMPOUND_DISTRIBUTION,
            TargetKind::CompoundDistribution(likelihood),
        )
        .with_id(LIKELIHOOD_ID),
    );
    let posterior = ctx.add(
        TargetObject::new(
            specs::COMPOUND_DISTRIBUTION,
            TargetKind::CompoundDistribution(vec![prior, likelihood]),
        )
        .with_id(POSTERIOR_ID),
    );
    Ok(Posterior {
        posterior,
        prior,
        likelihood,
    })
}

/// Children of a compound distribution.
pub fn children(target: TargetId, ctx: &Context<'_>) -> Vec<TargetId> {
    match &ctx.object(target).kind {
        TargetKind::CompoundDistribution(items) => items.clone(),
        _ => Vec::new(),
    }
}
