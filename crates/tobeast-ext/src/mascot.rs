//! # Structured Coalescent
//!
//! Lowers `StructuredCoalescent(M, demes)` to the approximate structured
//! coalescent with constant dynamics. `M` must come from a migration-matrix
//! function so population sizes and backwards migration rates can be
//! estimated as separate parameters.
//!
//! Both parameters are keyed by deme so logs are labelled per location:
//! population sizes by deme name, migration rates by `{from}_{to}` over
//! ordered (asymmetric) or unordered (symmetric) deme pairs.

use std::collections::BTreeSet;
use std::sync::Arc;

use tobeast_core::engine::loggers::logger;
use tobeast_core::engine::target::LogMode;
use tobeast_core::engine::tree_strategy::tree_summary;
use tobeast_core::{
    Bundle, Context, ExtraLogger, GeneratorConverter, Input, LoggerSettings, LoweringError,
    TargetId, TargetKind, TargetObject,
};
use tobeast_model::{kinds, Generator, GeneratorId, ModelGraph};
use tracing::info;

pub const MASCOT: &str = "beast.mascot.distribution.Mascot";
pub const CONSTANT_DYNAMICS: &str = "beast.mascot.dynamics.Constant";
pub const STRUCTURED_TREE_INTERVALS: &str = "beast.mascot.distribution.StructuredTreeIntervals";
pub const STRUCTURED_TREE_LOGGER: &str = "beast.mascot.logger.StructuredTreeLogger";
pub const TRAIT_SET: &str = "beast.base.evolution.tree.TraitSet";
pub const TAXON_SET: &str = "beast.base.evolution.alignment.TaxonSet";

/// Trait name used when the model does not name the population label.
pub const DEFAULT_POPULATION_LABEL: &str = "deme";

/// Unique deme names in sorted order.
pub fn unique_demes(demes: &[String]) -> Vec<String> {
    demes
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keys of a migration-rate vector of `dimension` entries over `demes`, or
/// `None` when the dimension fits neither parameterization.
pub fn migration_keys(demes: &[String], dimension: usize) -> Option<Vec<String>> {
    let n = demes.len();
    let asymmetric = n * n.saturating_sub(1);
    let mut keys = Vec::new();
    if dimension == asymmetric {
        for (i, from) in demes.iter().enumerate() {
            for (j, to) in demes.iter().enumerate() {
                if i != j {
                    keys.push(format!("{}_{}", from, to));
                }
            }
        }
    } else if dimension == asymmetric / 2 {
        for (i, from) in demes.iter().enumerate() {
            for to in &demes[i + 1..] {
                keys.push(format!("{}_{}", from, to));
            }
        }
    } else {
        return None;
    }
    Some(keys)
}

fn set_keys(ctx: &mut Context<'_>, target: TargetId, keys: Vec<String>) {
    if let TargetKind::RealParameter(p) = &mut ctx.object_mut(target).kind {
        p.keys = Some(keys);
    }
}

fn unsupported(gen: &Generator, reason: impl Into<String>) -> LoweringError {
    LoweringError::Unsupported {
        kind: gen.kind.clone(),
        reason: reason.into(),
    }
}

fn text_param(graph: &ModelGraph, gen: &Generator, name: &str) -> Option<String> {
    let v = gen.param(name)?;
    match &graph.value(v).payload {
        tobeast_model::Payload::Text(s) => Some(s.clone()),
        _ => None,
    }
}

/// `StructuredCoalescent` to `Mascot`.
pub struct MascotConverter;

impl GeneratorConverter for MascotConverter {
    fn kind(&self) -> &str {
        kinds::STRUCTURED_COALESCENT
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let graph = ctx.graph();
        let gen = graph.generator(id);
        let (tree_id, tree) = tree_summary(output, ctx)?;

        if let Some(sort) = gen.param("sort") {
            if graph.value(sort).payload.as_boolean() == Some(false) {
                return Err(unsupported(gen, "demes are always sorted, 'sort' must be true"));
            }
        }

        let m = gen
            .param("M")
            .ok_or_else(|| unsupported(gen, "missing parameter 'M'"))?;
        let migration = graph
            .generator_of(m)
            .filter(|g| g.is_a(kinds::MIGRATION_MATRIX))
            .ok_or_else(|| unsupported(gen, "M must be built by a migration matrix function"))?;

        let demes_value = gen
            .param("demes")
            .ok_or_else(|| unsupported(gen, "missing parameter 'demes'"))?;
        let demes = graph
            .value(demes_value)
            .payload
            .as_texts()
            .ok_or_else(|| unsupported(gen, "demes must be a text array"))?;
        if demes.len() != tree.taxa.len() {
            return Err(LoweringError::DimensionMismatch {
                what: format!("demes of {}", tree_id),
                expected: tree.taxa.len().to_string(),
                actual: demes.len(),
            });
        }
        let unique = unique_demes(demes);
        let n = unique.len();

        let theta = migration
            .param("theta")
            .ok_or_else(|| unsupported(migration, "missing parameter 'theta'"))?;
        let ne = ctx.as_real_parameter(theta)?;
        let ne_dim = ctx.object(ne).dimension();
        if ne_dim != n {
            return Err(LoweringError::DimensionMismatch {
                what: format!("population sizes {}", ctx.display_id(ne)),
                expected: n.to_string(),
                actual: ne_dim,
            });
        }
        set_keys(ctx, ne, unique.clone());

        let rates = migration
            .param("m")
            .ok_or_else(|| unsupported(migration, "missing parameter 'm'"))?;
        let backwards = ctx.as_real_parameter(rates)?;
        let rates_dim = ctx.object(backwards).dimension();
        let keys = migration_keys(&unique, rates_dim).ok_or_else(|| LoweringError::DimensionMismatch {
            what: format!("migration rates {}", ctx.display_id(backwards)),
            expected: format!("{} or {}", n * n.saturating_sub(1), n * n.saturating_sub(1) / 2),
            actual: rates_dim,
        })?;
        info!(demes = ?unique, "assigned deme keys to migration rates");
        set_keys(ctx, backwards, keys);

        let label = text_param(graph, gen, "popLabel").unwrap_or_else(|| DEFAULT_POPULATION_LABEL.into());
        let traits = tree
            .taxa
            .iter()
            .zip(demes)
            .map(|(taxon, deme)| format!("{}={}", taxon, deme))
            .collect::<Vec<_>>()
            .join(", ");
        let taxa = ctx.add(
            TargetObject::new(TAXON_SET, TargetKind::Object)
                .input("taxon", Input::Text(tree.taxa.join(" "))),
        );
        let trait_set = ctx.add(
            TargetObject::new(TRAIT_SET, TargetKind::Object)
                .input("traitname", Input::Text(label))
                .input("value", Input::Text(traits))
                .input("taxa", Input::Ref(taxa)),
        );
        let dynamics = ctx.add(
            TargetObject::new(CONSTANT_DYNAMICS, TargetKind::Object)
                .input("Ne", Input::Ref(ne))
                .input("backwardsMigration", Input::Ref(backwards))
                .input("dimension", Input::Integer(n as i64))
                .input("typeTrait", Input::Ref(trait_set)),
        );
        let intervals = ctx.add(
            TargetObject::new(STRUCTURED_TREE_INTERVALS, TargetKind::Object)
                .input("tree", Input::Ref(output)),
        );
        let mascot = ctx.add(
            TargetObject::new(MASCOT, TargetKind::Distribution)
                .with_id(format!("{}.mascot", tree_id))
                .input("dynamics", Input::Ref(dynamics))
                .input("structuredTreeIntervals", Input::Ref(intervals))
                .input("tree", Input::Ref(output)),
        );
        ctx.add_extra_loggable(mascot);
        ctx.add_extra_logger(Box::new(MascotTreeLogger {
            mascot,
            tree: output,
        }));
        Ok(Some(mascot))
    }

    fn annotates_tree_branches(&self) -> bool {
        true
    }
}

/// Logs trees with their inferred ancestral locations to
/// `{stem}.mascot.trees`, or `{stem}_{tree}.mascot.trees` when the run has
/// several trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MascotTreeLogger {
    pub mascot: TargetId,
    pub tree: TargetId,
}

impl ExtraLogger for MascotTreeLogger {
    fn create_logger(
        &self,
        settings: &LoggerSettings,
        ctx: &mut Context<'_>,
    ) -> Result<TargetId, LoweringError> {
        let tree_id = ctx.display_id(self.tree);
        let structured = ctx.add(
            TargetObject::new(STRUCTURED_TREE_LOGGER, TargetKind::Object)
                .input("mascot", Input::Ref(self.mascot)),
        );
        Ok(ctx.add(logger(
            format!("StructuredTreeLogger{}", tree_id),
            Some(settings.tree_file_name(&tree_id, "mascot.trees")),
            settings.log_every,
            LogMode::Tree,
            vec![structured],
        )))
    }
}

/// The structured coalescent converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredCoalescentBundle;

impl Bundle for StructuredCoalescentBundle {
    fn name(&self) -> &str {
        "structured-coalescent"
    }

    fn generator_converters(&self) -> Vec<Arc<dyn GeneratorConverter>> {
        vec![Arc::new(MascotConverter)]
    }
}
