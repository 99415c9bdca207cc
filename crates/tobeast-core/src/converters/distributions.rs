//! Parametric distribution converters.
//!
//! Each converter builds the engine's parametric distribution from the
//! generator's inputs and wraps it in a `Prior` over the sampled value.

use tobeast_model::{kinds, GeneratorId};

use crate::converters::{generator, prior, real_input, required_param};
use crate::engine::context::{Context, SourceRef};
use crate::engine::errors::LoweringError;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{Input, TargetId, TargetKind, TargetObject};
use crate::specs;

/// Table entry mapping a generator input onto a distribution input.
#[derive(Debug, Clone, Copy)]
pub struct ParamMapping {
    pub source: &'static str,
    pub target: &'static str,
}

const fn map(source: &'static str, target: &'static str) -> ParamMapping {
    ParamMapping { source, target }
}

/// A distribution whose inputs are real parameters, optionally bounding
/// the sampled value.
#[derive(Debug, Clone, Copy)]
pub struct ParametricPriorConverter {
    pub kind: &'static str,
    pub spec: &'static str,
    pub params: &'static [ParamMapping],
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl ParametricPriorConverter {
    pub const LOG_NORMAL: Self = ParametricPriorConverter {
        kind: kinds::LOG_NORMAL,
        spec: specs::LOG_NORMAL,
        params: &[map("meanlog", "M"), map("sdlog", "S")],
        lower: Some(0.0),
        upper: None,
    };
    pub const NORMAL: Self = ParametricPriorConverter {
        kind: kinds::NORMAL,
        spec: specs::NORMAL,
        params: &[map("mean", "mean"), map("sd", "sigma")],
        lower: None,
        upper: None,
    };
    pub const EXP: Self = ParametricPriorConverter {
        kind: kinds::EXP,
        spec: specs::EXPONENTIAL,
        params: &[map("mean", "mean")],
        lower: Some(0.0),
        upper: None,
    };
    pub const GAMMA: Self = ParametricPriorConverter {
        kind: kinds::GAMMA,
        spec: specs::GAMMA,
        params: &[map("shape", "alpha"), map("scale", "beta")],
        lower: Some(0.0),
        upper: None,
    };
    pub const BETA: Self = ParametricPriorConverter {
        kind: kinds::BETA,
        spec: specs::BETA,
        params: &[map("alpha", "alpha"), map("beta", "beta")],
        lower: Some(0.0),
        upper: Some(1.0),
    };
    pub const INVERSE_GAMMA: Self = ParametricPriorConverter {
        kind: kinds::INVERSE_GAMMA,
        spec: specs::INVERSE_GAMMA,
        params: &[map("alpha", "alpha"), map("beta", "beta")],
        lower: Some(0.0),
        upper: None,
    };
    /// Shared inverse gamma over every entry of a real array.
    pub const INVERSE_GAMMA_MULTI: Self = ParametricPriorConverter {
        kind: kinds::INVERSE_GAMMA_MULTI,
        spec: specs::INVERSE_GAMMA,
        params: &[map("alpha", "alpha"), map("beta", "beta")],
        lower: Some(0.0),
        upper: None,
    };
    pub const POISSON: Self = ParametricPriorConverter {
        kind: kinds::POISSON,
        spec: specs::POISSON,
        params: &[map("lambda", "lambda")],
        lower: Some(0.0),
        upper: None,
    };
    pub const DIRICHLET: Self = ParametricPriorConverter {
        kind: kinds::DIRICHLET,
        spec: specs::DIRICHLET,
        params: &[map("concentration", "alpha")],
        lower: Some(0.0),
        upper: Some(1.0),
    };

    pub const ALL: [Self; 9] = [
        Self::LOG_NORMAL,
        Self::NORMAL,
        Self::EXP,
        Self::GAMMA,
        Self::BETA,
        Self::INVERSE_GAMMA,
        Self::INVERSE_GAMMA_MULTI,
        Self::POISSON,
        Self::DIRICHLET,
    ];
}

impl GeneratorConverter for ParametricPriorConverter {
    fn kind(&self) -> &str {
        self.kind
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let mut distr = TargetObject::new(self.spec, TargetKind::Object);
        for m in self.params {
            let param = real_input(ctx, gen, m.source)?;
            distr.set_input(m.target, Input::Ref(param));
        }
        let distr = ctx.add(distr);
        ctx.set_bounds(output, self.lower, self.upper);
        Ok(Some(prior(ctx, output, distr)))
    }
}

/// Uniform prior with constant bounds, copied onto the sampled parameter.
pub struct UniformConverter;

impl GeneratorConverter for UniformConverter {
    fn kind(&self) -> &str {
        kinds::UNIFORM
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let graph = ctx.graph();
        let gen = generator(ctx, id);
        let bound = |name: &str| -> Result<f64, LoweringError> {
            let v = required_param(gen, name)?;
            graph.value(v).payload.as_real().ok_or_else(|| LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("bound '{}' must be a constant scalar", name),
            })
        };
        let lower = bound("lower")?;
        let upper = bound("upper")?;
        if lower >= upper {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("lower bound {} is not below upper bound {}", lower, upper),
            });
        }
        ctx.set_bounds(output, Some(lower), Some(upper));
        let distr = ctx.add(
            TargetObject::new(specs::UNIFORM, TargetKind::Object)
                .input("lower", Input::Real(lower))
                .input("upper", Input::Real(upper)),
        );
        Ok(Some(prior(ctx, output, distr)))
    }
}

/// `DirichletMulti(concentration, n)`: one Dirichlet prior per simplex in a
/// vector, all sharing the concentration.
pub struct DirichletMultiConverter;

impl GeneratorConverter for DirichletMultiConverter {
    fn kind(&self) -> &str {
        kinds::DIRICHLET_MULTI
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let TargetKind::Vector(rows) = ctx.object(output).kind.clone() else {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("expected a vector of simplices, got {}", ctx.display_id(output)),
            });
        };
        let alpha = real_input(ctx, gen, "concentration")?;
        let mut priors = Vec::with_capacity(rows.len());
        for row in rows {
            let dirichlet = ctx.add(
                TargetObject::new(specs::DIRICHLET, TargetKind::Object).input("alpha", Input::Ref(alpha)),
            );
            ctx.set_bounds(row, Some(0.0), Some(1.0));
            priors.push(prior(ctx, row, dirichlet));
        }
        let id = format!("{}.distributions", ctx.display_id(output));
        Ok(Some(ctx.add(TargetObject::new(specs::VECTOR, TargetKind::Vector(priors)).with_id(id))))
    }
}

/// Log-normal Markov chain over a real vector. When the chain's first
/// element is a separate value, that value becomes a slice of the chain.
pub struct ExpMarkovChainConverter;

impl GeneratorConverter for ExpMarkovChainConverter {
    fn kind(&self) -> &str {
        kinds::EXP_MARKOV_CHAIN
    }

    fn rewrite(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<(), LoweringError> {
        let gen = generator(ctx, id);
        let Some(first) = gen.param("firstValue") else {
            return Ok(());
        };
        if ctx.target_of(first).is_none() {
            return Ok(());
        }
        let slice = ctx.add(
            TargetObject::new(
                specs::SLICE,
                TargetKind::Slice {
                    source: output,
                    index: 0,
                    count: 1,
                },
            )
            .with_id(ctx.graph().label(first)),
        );
        ctx.replace(SourceRef::Value(first), slice)
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let mut chain = TargetObject::new(specs::MARKOV_CHAIN, TargetKind::Distribution)
            .with_id(format!("{}.markovChain", ctx.display_id(output)))
            .input("parameter", Input::Ref(output))
            .input("shape", Input::Real(1.0));
        if gen.param("firstValue").is_none() {
            if let Some(mean) = gen.param("initialMean") {
                let mean = ctx.as_real_parameter(mean)?;
                chain.set_input("initialMean", Input::Ref(mean));
            }
        }
        ctx.set_bounds(output, Some(0.0), None);
        Ok(Some(ctx.add(chain)))
    }
}
