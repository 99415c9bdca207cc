//! # Sampled Ancestors
//!
//! Fossilized birth-death tree priors whose trees may hold sampled
//! ancestors: zero-length branches placing a sampled fossil directly on a
//! lineage. Such trees need their own proposal set, so the bundle also
//! contributes a tree operator strategy for trees drawn from these
//! generators.

use std::sync::Arc;

use tobeast_core::engine::operators::operator_weight;
use tobeast_core::engine::tree_strategy::{tree_summary, TREE_SCALE_FACTOR, TREE_SCALE_UPPER};
use tobeast_core::engine::target::Parameter;
use tobeast_core::{
    Bundle, Context, GeneratorConverter, Input, LoweringError, SourceRef, TargetId, TargetKind,
    TargetObject, TreeOperatorStrategy,
};
use tobeast_model::{kinds, Generator, GeneratorId};
use tracing::debug;

pub const SA_BIRTH_DEATH: &str = "sa.evolution.speciation.SABirthDeathModel";
pub const SA_SCALE_OPERATOR: &str = "sa.evolution.operators.SAScaleOperator";
pub const SA_EXCHANGE: &str = "sa.evolution.operators.SAExchange";
pub const SA_UNIFORM: &str = "sa.evolution.operators.SAUniform";
pub const SA_WILSON_BALDING: &str = "sa.evolution.operators.SAWilsonBalding";
pub const LEAF_TO_SA_JUMP: &str = "sa.evolution.operators.LeafToSampledAncestorJump";

const REAL_PARAMETER: &str = tobeast_core::specs::REAL_PARAMETER;

/// Generator kinds producing sampled-ancestor trees.
pub const SAMPLED_ANCESTOR_KINDS: [&str; 3] = [
    kinds::SIM_FBD_AGE,
    kinds::FOSSIL_BIRTH_DEATH_TREE,
    kinds::SIM_FOSSILS_POISSON,
];

fn is_sampled_ancestor_generator(generator: &Generator) -> bool {
    SAMPLED_ANCESTOR_KINDS.iter().any(|k| generator.is_a(k))
}

fn real_param(
    gen: &Generator,
    names: &[&str],
    ctx: &mut Context<'_>,
) -> Result<TargetId, LoweringError> {
    let value = names
        .iter()
        .find_map(|n| gen.param(n))
        .ok_or_else(|| LoweringError::Unsupported {
            kind: gen.kind.clone(),
            reason: format!("missing parameter '{}'", names.join("' or '")),
        })?;
    ctx.as_real_parameter(value)
}

/// Fossilized birth-death generators to `SABirthDeathModel`.
pub struct SampledAncestorConverter {
    kind: &'static str,
}

impl SampledAncestorConverter {
    pub const SIM_FBD_AGE: Self = SampledAncestorConverter {
        kind: kinds::SIM_FBD_AGE,
    };
    pub const FOSSIL_BIRTH_DEATH_TREE: Self = SampledAncestorConverter {
        kind: kinds::FOSSIL_BIRTH_DEATH_TREE,
    };
    pub const SIM_FOSSILS_POISSON: Self = SampledAncestorConverter {
        kind: kinds::SIM_FOSSILS_POISSON,
    };

    /// Trees conditioned on their age carry an estimated origin above the root.
    fn conditions_on_origin(&self) -> bool {
        self.kind == kinds::SIM_FBD_AGE
    }
}

/// Identifier of the origin parameter of `tree`.
pub fn origin_id(tree: &str) -> String {
    format!("{}.origin", tree)
}

impl GeneratorConverter for SampledAncestorConverter {
    fn kind(&self) -> &str {
        self.kind
    }

    fn rewrite(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<(), LoweringError> {
        if !self.conditions_on_origin() {
            return Ok(());
        }
        let (tree_id, tree) = tree_summary(output, ctx)?;
        let origin_id = origin_id(&tree_id);
        if ctx.store().find(&origin_id).is_some() {
            return Ok(());
        }
        // start the origin clear of the root so the initial state is valid
        let mut origin = Parameter::new(vec![tree.root_height + tree.taxa.len() as f64], true);
        origin.lower = Some(0.0);
        let origin = ctx.add(
            TargetObject::new(REAL_PARAMETER, TargetKind::RealParameter(origin)).with_id(origin_id),
        );
        if let Some(value) = ctx.graph().generator(id).output() {
            ctx.contribute(origin, SourceRef::Value(value));
        }
        ctx.add_state_node(origin);
        debug!(tree = %tree_id, "added origin parameter");
        Ok(())
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = ctx.graph().generator(id);
        let (tree_id, _) = tree_summary(output, ctx)?;
        let birth = real_param(gen, &["lambda"], ctx)?;
        let death = real_param(gen, &["mu"], ctx)?;
        let rho = real_param(gen, &["rho", "frac"], ctx)?;
        let psi = real_param(gen, &["psi"], ctx)?;

        let mut model = TargetObject::new(SA_BIRTH_DEATH, TargetKind::Distribution)
            .with_id(format!("{}.saBirthDeath", tree_id))
            .input("tree", Input::Ref(output))
            .input("birthRate", Input::Ref(birth))
            .input("deathRate", Input::Ref(death))
            .input("rho", Input::Ref(rho))
            .input("samplingRate", Input::Ref(psi));
        if self.conditions_on_origin() {
            let origin = ctx
                .store()
                .find(&origin_id(&tree_id))
                .ok_or_else(|| LoweringError::MissingTarget(origin_id(&tree_id)))?;
            model.set_input("removalProbability", Input::Real(0.0));
            model.set_input("origin", Input::Ref(origin));
        } else {
            model.set_input("conditionOnRoot", Input::Boolean(true));
        }
        model.set_input("conditionOnSampling", Input::Boolean(true));
        Ok(Some(ctx.add(model)))
    }
}

/// Tree operators that keep sampled ancestors valid: the default moves in
/// their sampled-ancestor variants (no subtree slide) plus a jump between
/// leaf and sampled-ancestor positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampledAncestorTreeStrategy;

impl TreeOperatorStrategy for SampledAncestorTreeStrategy {
    fn name(&self) -> &str {
        "sampled-ancestor"
    }

    fn applies_to(&self, generator: Option<&Generator>) -> bool {
        generator.map(is_sampled_ancestor_generator).unwrap_or(false)
    }

    fn create_operators(
        &self,
        tree: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<TargetId>, LoweringError> {
        let (id, state) = tree_summary(tree, ctx)?;
        let w = operator_weight(state.internal_nodes);
        let ops = vec![
            TargetObject::operator(SA_SCALE_OPERATOR, format!("{}.scale", id), w)
                .input("tree", Input::Ref(tree))
                .input("scaleFactor", Input::Real(TREE_SCALE_FACTOR))
                .input("upper", Input::Real(TREE_SCALE_UPPER)),
            TargetObject::operator(SA_SCALE_OPERATOR, format!("{}.rootAgeScale", id), operator_weight(1))
                .input("tree", Input::Ref(tree))
                .input("rootOnly", Input::Boolean(true))
                .input("scaleFactor", Input::Real(TREE_SCALE_FACTOR))
                .input("upper", Input::Real(TREE_SCALE_UPPER)),
            TargetObject::operator(SA_EXCHANGE, format!("{}.narrowExchange", id), w)
                .input("tree", Input::Ref(tree))
                .input("isNarrow", Input::Boolean(true)),
            TargetObject::operator(SA_EXCHANGE, format!("{}.wideExchange", id), w)
                .input("tree", Input::Ref(tree))
                .input("isNarrow", Input::Boolean(false)),
            TargetObject::operator(SA_UNIFORM, format!("{}.uniform", id), w)
                .input("tree", Input::Ref(tree)),
            TargetObject::operator(SA_WILSON_BALDING, format!("{}.wilsonBalding", id), w)
                .input("tree", Input::Ref(tree)),
            TargetObject::operator(LEAF_TO_SA_JUMP, format!("{}.leafToSA", id), w)
                .input("tree", Input::Ref(tree)),
        ];
        Ok(ops.into_iter().map(|op| ctx.add(op)).collect())
    }
}

/// Sampled-ancestor converters and tree operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampledAncestorBundle;

impl Bundle for SampledAncestorBundle {
    fn name(&self) -> &str {
        "sampled-ancestors"
    }

    fn generator_converters(&self) -> Vec<Arc<dyn GeneratorConverter>> {
        vec![
            Arc::new(SampledAncestorConverter::SIM_FBD_AGE),
            Arc::new(SampledAncestorConverter::FOSSIL_BIRTH_DEATH_TREE),
            Arc::new(SampledAncestorConverter::SIM_FOSSILS_POISSON),
        ]
    }

    fn tree_operator_strategy(&self) -> Option<Arc<dyn TreeOperatorStrategy>> {
        Some(Arc::new(SampledAncestorTreeStrategy))
    }
}
