//! # Phylogenetic CTMC Likelihood
//!
//! An observed alignment sampled by `PhyloCTMC(tree, Q, mu, siteRates,
//! branchRates)` becomes a threaded tree likelihood over:
//!
//! - the substitution model built for `Q`'s rate-matrix generator
//! - a site model, gamma-distributed across sites when `siteRates` is drawn
//!   from a discretized gamma
//! - a strict clock with rate `mu` (1.0 when absent), an uncorrelated
//!   relaxed clock when `branchRates` is drawn from a log-normal, or the
//!   random local clock built for `LocalBranchRates`
//!
//! When both the clock rate and the tree are estimated, an up/down operator
//! scaling them in opposite directions is registered once per pair. Estimated
//! relaxed-clock rates on an estimated tree get the constant-distance
//! operators, which move node heights and rates together.

use tobeast_model::{kinds, Generator, GeneratorId, ModelGraph, ValueId};
use tracing::debug;

use crate::converters::{generator, real_input, required_param};
use crate::engine::classify;
use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::operators::operator_weight;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{Input, TargetId, TargetKind, TargetObject};
use crate::specs;

/// Scale factor of the clock-rate/tree up/down operator.
pub const UP_DOWN_SCALE_FACTOR: f64 = 0.9;

/// Gamma categories used when the site-rate generator does not say.
pub const DEFAULT_GAMMA_CATEGORIES: i64 = 4;

/// Rate window of the pulley operators.
pub const PULLEY_RATE_WINDOW: f64 = 0.1;

/// Fraction of the root height used as the time window of the
/// constant-distance operators.
pub const TIME_WINDOW_FRACTION: f64 = 0.1;

/// `(leaves, internal nodes, root height)` of a tree target.
fn tree_shape(tree: TargetId, ctx: &Context<'_>) -> Result<(usize, usize, f64), LoweringError> {
    match &ctx.object(tree).kind {
        TargetKind::Tree(t) => Ok((t.taxa.len(), t.internal_nodes, t.root_height)),
        _ => Err(LoweringError::Coercion {
            id: ctx.display_id(tree),
            from: specs::simple_name(&ctx.object(tree).spec).to_string(),
            to: "Tree".into(),
        }),
    }
}

/// The discretized gamma behind a site-rate value, looking through IID.
fn discretized_gamma<'g>(graph: &'g ModelGraph, site_rates: ValueId) -> Option<&'g Generator> {
    let gen = graph.generator_of(site_rates)?;
    if gen.is_a(kinds::DISCRETIZED_GAMMA) {
        return Some(gen);
    }
    if gen.is_a(kinds::IID) {
        return gen
            .components
            .iter()
            .map(|c| graph.generator(*c))
            .find(|c| c.is_a(kinds::DISCRETIZED_GAMMA));
    }
    None
}

pub struct PhyloCtmcConverter;

impl PhyloCtmcConverter {
    fn site_model(
        &self,
        gen: &Generator,
        substitution: TargetId,
        mean_rate: Option<TargetId>,
        ctx: &mut Context<'_>,
    ) -> Result<TargetId, LoweringError> {
        let graph = ctx.graph();
        let mut site_model = TargetObject::new(specs::SITE_MODEL, TargetKind::Object)
            .input("substModel", Input::Ref(substitution));
        if let Some(rate) = mean_rate {
            site_model.set_input("mutationRate", Input::Ref(rate));
        }
        if let Some(site_rates) = gen.param("siteRates") {
            let gamma = discretized_gamma(graph, site_rates).ok_or_else(|| LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: "site rates must be drawn from a discretized gamma".into(),
            })?;
            let shape = ctx.as_real_parameter(required_param(gamma, "shape")?)?;
            let categories = gamma
                .param("ncat")
                .and_then(|n| graph.value(n).payload.as_integer())
                .unwrap_or(DEFAULT_GAMMA_CATEGORIES);
            site_model.set_input("shape", Input::Ref(shape));
            site_model.set_input("gammaCategoryCount", Input::Integer(categories));
        }
        Ok(ctx.add(site_model))
    }

    fn branch_rate_model(
        &self,
        gen: &Generator,
        tree: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<TargetId, LoweringError> {
        let graph = ctx.graph();
        if let Some(branch_rates) = gen.param("branchRates") {
            let rates_gen = graph.value(branch_rates).generator;
            if let Some(local) = rates_gen.filter(|g| graph.generator(*g).is_a(kinds::LOCAL_BRANCH_RATES)) {
                return ctx
                    .generator_target(local)
                    .ok_or_else(|| LoweringError::MissingTarget(format!("local clock of {}", graph.label(branch_rates))));
            }
            let is_log_normal = graph
                .generator_of(branch_rates)
                .map(|g| {
                    g.is_a(kinds::LOG_NORMAL)
                        || (g.is_a(kinds::IID)
                            && g.components.iter().any(|c| graph.generator(*c).is_a(kinds::LOG_NORMAL)))
                })
                .unwrap_or(false);
            let distr = rates_gen
                .filter(|_| is_log_normal)
                .and_then(|g| ctx.generator_target(g))
                .and_then(|prior| match ctx.object(prior).get_input("distr") {
                    Some(Input::Ref(d)) => Some(*d),
                    _ => None,
                })
                .ok_or_else(|| LoweringError::Unsupported {
                    kind: gen.kind.clone(),
                    reason: "branch rates must be drawn from a single log-normal prior or local branch rates".into(),
                })?;
            let rates = ctx.as_real_parameter(branch_rates)?;
            let clock = ctx.add(
                TargetObject::new(specs::RELAXED_CLOCK, TargetKind::Object)
                    .input("rates", Input::Ref(rates))
                    .input("tree", Input::Ref(tree))
                    .input("distr", Input::Ref(distr)),
            );
            let statistic_id = format!("{}.rateStat", ctx.display_id(rates));
            let logged = ctx
                .extra_loggables()
                .iter()
                .any(|l| ctx.object(*l).id() == Some(statistic_id.as_str()));
            if !logged {
                let statistic = ctx.add(
                    TargetObject::new(specs::RATE_STATISTIC, TargetKind::Object)
                        .with_id(statistic_id)
                        .input("branchratemodel", Input::Ref(clock))
                        .input("tree", Input::Ref(tree)),
                );
                ctx.add_extra_loggable(statistic);
            }
            let tree_is_state = gen.param("tree").is_some_and(|t| classify::is_state(t, ctx));
            if classify::is_state(branch_rates, ctx) && tree_is_state {
                add_relaxed_clock_operators(clock, tree, rates, ctx)?;
            }
            return Ok(clock);
        }

        let rate = match gen.param("mu") {
            Some(mu) => Input::Ref(ctx.as_real_parameter(mu)?),
            None => Input::Real(1.0),
        };
        let clock = ctx.add(TargetObject::new(specs::STRICT_CLOCK, TargetKind::Object).input("clock.rate", rate));
        if let (Some(mu), Some(tree_value)) = (gen.param("mu"), gen.param("tree")) {
            if classify::is_state(mu, ctx) && classify::is_state(tree_value, ctx) {
                let rate = ctx.require_target(mu)?;
                add_up_down_operator(rate, tree, ctx)?;
            }
        }
        Ok(clock)
    }
}

/// Registers the constant-distance, simple-distance and pulley operators
/// over relaxed-clock `rates` and `tree`.
fn add_relaxed_clock_operators(
    clock: TargetId,
    tree: TargetId,
    rates: TargetId,
    ctx: &mut Context<'_>,
) -> Result<(), LoweringError> {
    let name = ctx.display_id(rates);
    if ctx.has_extra_operator(&format!("{}.inConstantDistance", name)) {
        return Ok(());
    }
    let (leaves, internal_nodes, root_height) = tree_shape(tree, ctx)?;
    let time_window = Input::Real(root_height * TIME_WINDOW_FRACTION);
    debug!(rates = %name, tree = %ctx.display_id(tree), "adding relaxed clock operators");

    let operators = [
        TargetObject::operator(
            specs::IN_CONSTANT_DISTANCE,
            format!("{}.inConstantDistance", name),
            operator_weight(leaves + internal_nodes),
        )
        .input("clockModel", Input::Ref(clock))
        .input("tree", Input::Ref(tree))
        .input("rates", Input::Ref(rates))
        .input("twindowSize", time_window.clone()),
        TargetObject::operator(specs::SIMPLE_DISTANCE, format!("{}.simpleDistance", name), operator_weight(2))
            .input("clockModel", Input::Ref(clock))
            .input("tree", Input::Ref(tree))
            .input("rates", Input::Ref(rates))
            .input("twindowSize", time_window.clone()),
        TargetObject::operator(specs::BIG_PULLEY, format!("{}.bigPulley", name), operator_weight(2))
            .input("tree", Input::Ref(tree))
            .input("rates", Input::Ref(rates))
            .input("twindowSize", time_window)
            .input("dwindowSize", Input::Real(PULLEY_RATE_WINDOW)),
        TargetObject::operator(specs::SMALL_PULLEY, format!("{}.smallPulley", name), operator_weight(2))
            .input("clockModel", Input::Ref(clock))
            .input("tree", Input::Ref(tree))
            .input("rates", Input::Ref(rates))
            .input("dwindowSize", Input::Real(PULLEY_RATE_WINDOW)),
    ];
    for op in operators {
        let op = ctx.add(op);
        ctx.add_extra_operator(op);
    }
    Ok(())
}

/// Registers `{rate}Up{tree}DownOperator` unless one already exists.
fn add_up_down_operator(rate: TargetId, tree: TargetId, ctx: &mut Context<'_>) -> Result<(), LoweringError> {
    let id = format!("{}Up{}DownOperator", ctx.display_id(rate), ctx.display_id(tree));
    if ctx.has_extra_operator(&id) {
        return Ok(());
    }
    let (_, internal_nodes, _) = tree_shape(tree, ctx)?;
    debug!(operator = %id, "adding up/down operator");
    let op = ctx.add(
        TargetObject::operator(specs::UP_DOWN, id, operator_weight(internal_nodes + 1))
            .input("scaleFactor", Input::Real(UP_DOWN_SCALE_FACTOR))
            .input("up", Input::Ref(rate))
            .input("down", Input::Ref(tree)),
    );
    ctx.add_extra_operator(op);
    Ok(())
}

impl GeneratorConverter for PhyloCtmcConverter {
    fn kind(&self) -> &str {
        kinds::PHYLO_CTMC
    }

    /// Site rates are integrated out by the site model, so their parameter
    /// leaves the run.
    fn rewrite(
        &self,
        id: GeneratorId,
        _output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<(), LoweringError> {
        let gen = generator(ctx, id);
        if let Some(site_rates) = gen.param("siteRates") {
            if discretized_gamma(ctx.graph(), site_rates).is_some() {
                if let Some(target) = ctx.target_of(site_rates) {
                    ctx.remove(target);
                }
            }
        }
        Ok(())
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let graph = ctx.graph();
        let gen = generator(ctx, id);
        if !matches!(ctx.object(output).kind, TargetKind::Alignment(_)) {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("{} is not an alignment", ctx.display_id(output)),
            });
        }
        let tree = ctx.require_target(required_param(gen, "tree")?)?;
        if !ctx.object(tree).is_tree() {
            return Err(LoweringError::Coercion {
                id: ctx.display_id(tree),
                from: specs::simple_name(&ctx.object(tree).spec).to_string(),
                to: "Tree".into(),
            });
        }

        let q = required_param(gen, "Q")?;
        let q_generator = graph.value(q).generator;
        let substitution = q_generator
            .and_then(|g| ctx.generator_target(g))
            .ok_or_else(|| LoweringError::MissingTarget(format!("substitution model of {}", graph.label(q))))?;
        let mean_rate = match q_generator.and_then(|g| graph.generator(g).param("meanRate")) {
            Some(rate) => Some(ctx.as_real_parameter(rate)?),
            None => None,
        };

        let site_model = self.site_model(gen, substitution, mean_rate, ctx)?;
        let clock = self.branch_rate_model(gen, tree, ctx)?;

        let likelihood = ctx.add(
            TargetObject::new(specs::TREE_LIKELIHOOD, TargetKind::Distribution)
                .with_id(format!("{}.treeLikelihood", ctx.display_id(output)))
                .input("data", Input::Ref(output))
                .input("tree", Input::Ref(tree))
                .input("siteModel", Input::Ref(site_model))
                .input("branchRateModel", Input::Ref(clock)),
        );
        ctx.add_extra_loggable(likelihood);
        Ok(Some(likelihood))
    }
}

/// `LocalBranchRates(tree, indicators, rates)`: a random local clock whose
/// boolean indicators switch a new rate on at each branch.
pub struct LocalBranchRatesConverter;

impl GeneratorConverter for LocalBranchRatesConverter {
    fn kind(&self) -> &str {
        kinds::LOCAL_BRANCH_RATES
    }

    fn build(
        &self,
        id: GeneratorId,
        _output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let tree = ctx.require_target(required_param(gen, "tree")?)?;
        tree_shape(tree, ctx)?;
        let indicators = ctx.require_target(required_param(gen, "indicators")?)?;
        if !matches!(ctx.object(indicators).kind, TargetKind::BooleanParameter(_)) {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("indicators {} are not a boolean parameter", ctx.display_id(indicators)),
            });
        }
        let rates = real_input(ctx, gen, "rates")?;
        Ok(Some(ctx.add(
            TargetObject::new(specs::RANDOM_LOCAL_CLOCK, TargetKind::Object)
                .input("tree", Input::Ref(tree))
                .input("indicators", Input::Ref(indicators))
                .input("rates", Input::Ref(rates))
                .input("ratesAreMultipliers", Input::Boolean(false))
                .input("clock.rate", Input::Real(1.0)),
        )))
    }
}
