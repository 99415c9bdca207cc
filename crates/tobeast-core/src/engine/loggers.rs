//! # Logger Assembly
//!
//! Loggers are built in a fixed order:
//!
//! 1. screen logger, every `log_every × 100` samples
//! 2. parameter file logger `{stem}.log`
//! 3. one tree logger per tree, `{stem}.trees` or `{stem}_{tree}.trees`
//! 4. loggers registered by converters through [`ExtraLogger`]

use tracing::debug;

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::posterior::Posterior;
use crate::engine::target::{Input, LogMode, LoggerData, TargetId, TargetKind, TargetObject};
use crate::specs;

/// Screen output is this many times sparser than the parameter log.
pub const SCREEN_LOG_FACTOR: u64 = 100;

pub const SCREEN_LOGGER_ID: &str = "ScreenLogger";
pub const PARAMETER_LOGGER_ID: &str = "ParameterLogger";

/// What every logger needs to know to name its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerSettings {
    pub file_stem: String,
    pub log_every: u64,
    pub multiple_trees: bool,
}

impl LoggerSettings {
    /// Tree file name for `tree_id`, disambiguated when several trees exist.
    pub fn tree_file_name(&self, tree_id: &str, suffix: &str) -> String {
        if self.multiple_trees {
            format!("{}_{}.{}", self.file_stem, tree_id, suffix)
        } else {
            format!("{}.{}", self.file_stem, suffix)
        }
    }
}

/// A logger contributed by a converter, created after the default loggers.
pub trait ExtraLogger {
    fn create_logger(
        &self,
        settings: &LoggerSettings,
        ctx: &mut Context<'_>,
    ) -> Result<TargetId, LoweringError>;
}

/// A `Logger` writing `entries`; `file_name` of `None` logs to the screen.
pub fn logger(
    id: impl Into<String>,
    file_name: Option<String>,
    log_every: u64,
    mode: LogMode,
    entries: Vec<TargetId>,
) -> TargetObject {
    TargetObject::new(
        specs::LOGGER,
        TargetKind::Logger(LoggerData {
            file_name,
            log_every,
            mode,
            entries,
        }),
    )
    .with_id(id)
}

/// Builds every logger of the run.
pub fn assemble_loggers(
    ctx: &mut Context<'_>,
    posterior: &Posterior,
    file_stem: &str,
    log_every: u64,
) -> Result<Vec<TargetId>, LoweringError> {
    let trees = ctx.trees();
    let non_trees: Vec<TargetId> = ctx
        .state()
        .iter()
        .copied()
        .filter(|t| !ctx.object(*t).is_tree())
        .collect();
    let settings = LoggerSettings {
        file_stem: file_stem.to_string(),
        log_every,
        multiple_trees: trees.len() > 1,
    };

    let mut base = vec![posterior.posterior, posterior.likelihood, posterior.prior];
    base.extend(non_trees);

    let mut loggers = Vec::new();
    loggers.push(ctx.add(logger(
        SCREEN_LOGGER_ID,
        None,
        log_every * SCREEN_LOG_FACTOR,
        LogMode::Autodetect,
        base.clone(),
    )));

    let mut file_entries = base;
    for tree in &trees {
        let stat = TargetObject::new(specs::TREE_STAT_LOGGER, TargetKind::Object)
            .with_id(format!("{}.treeStats", ctx.display_id(*tree)))
            .input("tree", Input::Ref(*tree));
        file_entries.push(ctx.add(stat));
    }
    for extra in ctx.extra_loggables() {
        if !file_entries.contains(extra) {
            file_entries.push(*extra);
        }
    }
    loggers.push(ctx.add(logger(
        PARAMETER_LOGGER_ID,
        Some(format!("{}.log", file_stem)),
        log_every,
        LogMode::Autodetect,
        file_entries,
    )));

    for tree in &trees {
        let tree_id = ctx.display_id(*tree);
        let entry = if tree_annotates_branches(*tree, ctx) {
            ctx.add(
                TargetObject::new(specs::METADATA_TREE_LOGGER, TargetKind::Object)
                    .with_id(format!("{}.metadataLogger", tree_id))
                    .input("tree", Input::Ref(*tree)),
            )
        } else {
            *tree
        };
        debug!(tree = %tree_id, "tree logger");
        loggers.push(ctx.add(logger(
            format!("{}.treeLogger", tree_id),
            Some(settings.tree_file_name(&tree_id, "trees")),
            log_every,
            LogMode::Tree,
            vec![entry],
        )));
    }

    for extra in ctx.take_extra_loggers() {
        loggers.push(extra.create_logger(&settings, ctx)?);
    }
    Ok(loggers)
}

/// True if the converter of the generator that sampled `tree` asks for
/// branch metadata in the tree log.
fn tree_annotates_branches(tree: TargetId, ctx: &Context<'_>) -> bool {
    ctx.random_provenance(tree)
        .and_then(|(_, generator)| ctx.registry().find_generator_converter(generator))
        .map(|c| c.annotates_tree_branches())
        .unwrap_or(false)
}
