//! Tree priors: coalescent and birth-death processes over a time tree.
//!
//! Every prior is identified after the tree it samples, `{tree}.coalescent`,
//! `{tree}.yule`, `{tree}.birthDeath` or `{tree}.skyline`.

use tobeast_model::{kinds, GeneratorId};

use crate::converters::{generator, real_input};
use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{Input, Parameter, TargetId, TargetKind, TargetObject};
use crate::specs;

fn require_tree(kind: &str, output: TargetId, ctx: &Context<'_>) -> Result<String, LoweringError> {
    if !ctx.object(output).is_tree() {
        return Err(LoweringError::Unsupported {
            kind: kind.to_string(),
            reason: format!("{} is not a tree", ctx.display_id(output)),
        });
    }
    Ok(ctx.display_id(output))
}

fn tree_intervals(ctx: &mut Context<'_>, tree: TargetId) -> TargetId {
    ctx.add(
        TargetObject::new(specs::TREE_INTERVALS, TargetKind::Object)
            .input("tree", Input::Ref(tree)),
    )
}

/// Constant-size coalescent, also used for serially sampled tips.
pub struct CoalescentConverter {
    kind: &'static str,
}

impl CoalescentConverter {
    pub const CONSTANT: Self = CoalescentConverter {
        kind: kinds::COALESCENT,
    };
    pub const SERIAL: Self = CoalescentConverter {
        kind: kinds::SERIAL_COALESCENT,
    };
}

impl GeneratorConverter for CoalescentConverter {
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
        let tree = require_tree(&gen.kind, output, ctx)?;
        let theta = real_input(ctx, gen, "theta")?;
        let population = ctx.add(
            TargetObject::new(specs::CONSTANT_POPULATION, TargetKind::Object)
                .input("popSize", Input::Ref(theta)),
        );
        let intervals = tree_intervals(ctx, output);
        Ok(Some(ctx.add(
            TargetObject::new(specs::COALESCENT, TargetKind::Distribution)
                .with_id(format!("{}.coalescent", tree))
                .input("treeIntervals", Input::Ref(intervals))
                .input("populationModel", Input::Ref(population)),
        )))
    }
}

/// Piecewise-constant population sizes over coalescent intervals.
pub struct SkylineConverter;

impl GeneratorConverter for SkylineConverter {
    fn kind(&self) -> &str {
        kinds::SKYLINE_COALESCENT
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let tree = require_tree(&gen.kind, output, ctx)?;
        let pop_sizes = real_input(ctx, gen, "theta")?;
        let epochs = ctx.object(pop_sizes).dimension();
        ctx.object_mut(pop_sizes)
            .set_input("idStart1", Input::Boolean(true));

        let group_sizes = match gen.param("groupSizes") {
            Some(groups) => ctx.as_integer_parameter(groups)?,
            // one coalescent interval per epoch
            None => ctx.add(
                TargetObject::new(
                    specs::INTEGER_PARAMETER,
                    TargetKind::IntegerParameter(Parameter::new(vec![1; epochs], false)),
                )
                .with_id(format!("{}.groupSizes", tree)),
            ),
        };
        ctx.object_mut(group_sizes)
            .set_input("idStart1", Input::Boolean(true));

        let intervals = tree_intervals(ctx, output);
        Ok(Some(ctx.add(
            TargetObject::new(specs::BAYESIAN_SKYLINE, TargetKind::Distribution)
                .with_id(format!("{}.skyline", tree))
                .input("treeIntervals", Input::Ref(intervals))
                .input("popSizes", Input::Ref(pop_sizes))
                .input("groupSizes", Input::Ref(group_sizes)),
        )))
    }

    fn annotates_tree_branches(&self) -> bool {
        true
    }
}

/// Pure-birth process.
pub struct YuleConverter;

impl GeneratorConverter for YuleConverter {
    fn kind(&self) -> &str {
        kinds::YULE
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let tree = require_tree(&gen.kind, output, ctx)?;
        let lambda = real_input(ctx, gen, "lambda")?;
        Ok(Some(ctx.add(
            TargetObject::new(specs::YULE, TargetKind::Distribution)
                .with_id(format!("{}.yule", tree))
                .input("tree", Input::Ref(output))
                .input("birthDiffRate", Input::Ref(lambda)),
        )))
    }
}

/// Birth-death process parameterized by net diversification and turnover.
pub struct BirthDeathConverter;

impl GeneratorConverter for BirthDeathConverter {
    fn kind(&self) -> &str {
        kinds::BIRTH_DEATH
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let tree = require_tree(&gen.kind, output, ctx)?;
        if gen.param("diversification").is_none() || gen.param("turnover").is_none() {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: "only the diversification/turnover parameterization is supported".into(),
            });
        }
        let diversification = real_input(ctx, gen, "diversification")?;
        let turnover = real_input(ctx, gen, "turnover")?;
        ctx.set_bounds(turnover, Some(0.0), Some(1.0));
        Ok(Some(ctx.add(
            TargetObject::new(specs::BIRTH_DEATH, TargetKind::Distribution)
                .with_id(format!("{}.birthDeath", tree))
                .input("tree", Input::Ref(output))
                .input("birthDiffRate", Input::Ref(diversification))
                .input("relativeDeathRate", Input::Ref(turnover)),
        )))
    }
}
