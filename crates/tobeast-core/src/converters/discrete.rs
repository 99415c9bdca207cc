//! Distributions over boolean indicator arrays.

use tobeast_model::{kinds, GeneratorId};
use tracing::debug;

use crate::converters::{generator, real_input, required_param};
use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{Input, TargetId, TargetKind, TargetObject};
use crate::specs;

fn require_booleans(kind: &str, output: TargetId, ctx: &Context<'_>) -> Result<(), LoweringError> {
    match ctx.object(output).kind {
        TargetKind::BooleanParameter(_) => Ok(()),
        _ => Err(LoweringError::Unsupported {
            kind: kind.to_string(),
            reason: format!("{} is not a boolean parameter", ctx.display_id(output)),
        }),
    }
}

/// Independent Bernoulli trials over a boolean array, with an optional lower
/// bound on the number of successes.
pub struct BernoulliMultiConverter;

impl GeneratorConverter for BernoulliMultiConverter {
    fn kind(&self) -> &str {
        kinds::BERNOULLI_MULTI
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        require_booleans(&gen.kind, output, ctx)?;
        let p = real_input(ctx, gen, "p")?;
        let mut distr = TargetObject::new(specs::BERNOULLI, TargetKind::Distribution)
            .with_id(format!("{}.bernoulli", ctx.display_id(output)))
            .input("p", Input::Ref(p))
            .input("parameter", Input::Ref(output));
        if let Some(min) = gen.param("minSuccesses") {
            let min = ctx.as_integer_parameter(min)?;
            distr.set_input("minSuccesses", Input::Ref(min));
        }
        Ok(Some(ctx.add(distr)))
    }
}

/// `RandomBooleanArray(n, hammingWeight)`: a boolean array with exactly
/// `hammingWeight` entries set.
///
/// The count parameter and its prior leave the run. The count's
/// distribution moves onto the sum of the array instead, so proposals flip
/// indicators and the count follows.
pub struct RandomBooleanArrayConverter;

impl GeneratorConverter for RandomBooleanArrayConverter {
    fn kind(&self) -> &str {
        kinds::RANDOM_BOOLEAN_ARRAY
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let graph = ctx.graph();
        let gen = generator(ctx, id);
        require_booleans(&gen.kind, output, ctx)?;

        let weight = required_param(gen, "hammingWeight")?;
        let count = ctx.require_target(weight)?;
        if !matches!(ctx.object(count).kind, TargetKind::IntegerParameter(_)) {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("hamming weight {} is not an integer parameter", ctx.display_id(count)),
            });
        }
        let count_prior = graph
            .value(weight)
            .generator
            .and_then(|g| ctx.generator_target(g));
        let distr = count_prior
            .and_then(|p| match ctx.object(p).get_input("distr") {
                Some(Input::Ref(d)) => Some(*d),
                _ => None,
            })
            .ok_or_else(|| LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("hamming weight {} has no prior distribution", graph.label(weight)),
            })?;

        debug!(count = %ctx.display_id(count), array = %ctx.display_id(output), "count prior moved onto indicator sum");
        ctx.remove(count);
        if let Some(p) = count_prior {
            ctx.remove(p);
        }
        let sum = ctx.add(TargetObject::new(specs::SUM, TargetKind::Object).input("arg", Input::Ref(output)));
        let id = format!("{}.prior", ctx.display_id(output));
        Ok(Some(ctx.add(
            TargetObject::new(specs::PRIOR, TargetKind::Distribution)
                .with_id(id)
                .input("x", Input::Ref(sum))
                .input("distr", Input::Ref(distr)),
        )))
    }
}
