//! Default converters.
//!
//! - [`values`]: parameters, matrices, trees, alignments, vectors
//! - [`distributions`]: parametric priors and the Markov chain prior
//! - [`discrete`]: Bernoulli trials and fixed-weight boolean arrays
//! - [`wrappers`]: IID and vectorized distributions and functions
//! - [`substitution`]: rate matrix models
//! - [`tree_priors`]: coalescent and birth-death tree priors
//! - [`likelihood`]: phylogenetic CTMC likelihood and local clocks
//! - [`functions`]: slicing and element selection rewrites

pub mod discrete;
pub mod distributions;
pub mod functions;
pub mod likelihood;
pub mod substitution;
pub mod tree_priors;
pub mod values;
pub mod wrappers;

use tobeast_model::{Generator, GeneratorId};

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::target::{Input, TargetId, TargetKind, TargetObject};
use crate::specs;

/// Real parameter target for the generator input `name`.
pub fn real_input(
    ctx: &mut Context<'_>,
    generator: &Generator,
    name: &str,
) -> Result<TargetId, LoweringError> {
    let value = required_param(generator, name)?;
    ctx.as_real_parameter(value)
}

/// Value id of a required generator input.
pub fn required_param(
    generator: &Generator,
    name: &str,
) -> Result<tobeast_model::ValueId, LoweringError> {
    generator.param(name).ok_or_else(|| LoweringError::Unsupported {
        kind: generator.kind.clone(),
        reason: format!("missing parameter '{}'", name),
    })
}

/// A `Prior` over `x` with distribution `distr`, identified `{x}.prior`.
pub fn prior(ctx: &mut Context<'_>, x: TargetId, distr: TargetId) -> TargetId {
    let id = format!("{}.prior", ctx.display_id(x));
    ctx.add(
        TargetObject::new(specs::PRIOR, TargetKind::Distribution)
            .with_id(id)
            .input("x", Input::Ref(x))
            .input("distr", Input::Ref(distr)),
    )
}

/// The generator behind `id` as seen by converters.
pub fn generator<'a>(ctx: &Context<'a>, id: GeneratorId) -> &'a Generator {
    ctx.graph().generator(id)
}
