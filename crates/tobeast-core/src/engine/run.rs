//! # Lowering Runs
//!
//! Drives one model through the passes and assembly stages and packages the
//! result as a [`RunConfiguration`]. Each run (and each replicate) owns a
//! fresh [`Context`]; the registry is only read.

use tobeast_model::ModelGraph;
use tracing::info;

use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::loggers::assemble_loggers;
use crate::engine::lower::run_passes;
use crate::engine::operators::synthesize_operators;
use crate::engine::posterior::{partition, Posterior};
use crate::engine::registry::Registry;
use crate::engine::serialize;
use crate::engine::target::{TargetId, TargetObject, TargetStore};

/// Chain length used when none (or a non-positive one) is given.
pub const DEFAULT_CHAIN_LENGTH: u64 = 1_000_000;

/// Number of samples logged over a chain.
pub const SAMPLES_PER_CHAIN: u64 = 2000;

/// Multiplier applied to the state's burn-in units for automatic pre-burn-in.
pub const PRE_BURNIN_FACTOR: u64 = 10;

/// Run settings supplied by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringOptions {
    /// MCMC chain length; non-positive means [`DEFAULT_CHAIN_LENGTH`].
    pub chain_length: i64,
    /// Pre-burn-in samples; negative means computed from the state.
    pub pre_burnin: i64,
    /// Stem of every output file name.
    pub file_stem: String,
    pub replicates: usize,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        LoweringOptions {
            chain_length: DEFAULT_CHAIN_LENGTH as i64,
            pre_burnin: -1,
            file_stem: "model".into(),
            replicates: 1,
        }
    }
}

impl LoweringOptions {
    pub fn effective_chain_length(&self) -> u64 {
        if self.chain_length > 0 {
            self.chain_length as u64
        } else {
            DEFAULT_CHAIN_LENGTH
        }
    }

    /// Sampling interval of the parameter and tree logs.
    pub fn log_every(&self) -> u64 {
        (self.effective_chain_length() / SAMPLES_PER_CHAIN).max(1)
    }

    /// File stem of replicate `index`; unchanged for a single replicate.
    pub fn replicate_stem(&self, index: usize) -> String {
        if self.replicates > 1 {
            format!("{}_{}", self.file_stem, index)
        } else {
            self.file_stem.clone()
        }
    }
}

/// A fully assembled run, ready for serialization.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub store: TargetStore,
    pub chain_length: u64,
    pub pre_burnin: u64,
    pub file_stem: String,
    pub state: Vec<TargetId>,
    pub posterior: Posterior,
    pub operators: Vec<TargetId>,
    pub loggers: Vec<TargetId>,
}

impl RunConfiguration {
    pub fn object(&self, id: TargetId) -> &TargetObject {
        self.store.get(id)
    }

    /// Identifier of a target or an empty string for anonymous objects.
    pub fn id_of(&self, id: TargetId) -> &str {
        self.store.get(id).id().unwrap_or("")
    }

    pub fn operator_ids(&self) -> Vec<&str> {
        self.operators.iter().map(|o| self.id_of(*o)).collect()
    }

    pub fn state_ids(&self) -> Vec<&str> {
        self.state.iter().map(|s| self.id_of(*s)).collect()
    }

    pub fn logger_ids(&self) -> Vec<&str> {
        self.loggers.iter().map(|l| self.id_of(*l)).collect()
    }

    /// Renders the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, LoweringError> {
        Ok(serde_json::to_string_pretty(&serialize::to_json_value(self))?)
    }
}

/// Lowers `graph` into one run configuration.
pub fn lower(
    graph: &ModelGraph,
    registry: &Registry,
    options: &LoweringOptions,
) -> Result<RunConfiguration, LoweringError> {
    lower_with_stem(graph, registry, options, &options.file_stem)
}

fn lower_with_stem(
    graph: &ModelGraph,
    registry: &Registry,
    options: &LoweringOptions,
    file_stem: &str,
) -> Result<RunConfiguration, LoweringError> {
    let mut ctx = Context::new(graph, registry);
    run_passes(&mut ctx)?;
    let operators = synthesize_operators(&mut ctx)?;
    let posterior = partition(&mut ctx)?;
    let log_every = options.log_every();
    let loggers = assemble_loggers(&mut ctx, &posterior, file_stem, log_every)?;
    let pre_burnin = if options.pre_burnin < 0 {
        PRE_BURNIN_FACTOR * ctx.burnin_units()
    } else {
        options.pre_burnin as u64
    };
    info!(
        stem = file_stem,
        state = ctx.state().len(),
        operators = operators.len(),
        loggers = loggers.len(),
        pre_burnin,
        "lowered model"
    );
    let (store, state) = ctx.into_parts();
    Ok(RunConfiguration {
        store,
        chain_length: options.effective_chain_length(),
        pre_burnin,
        file_stem: file_stem.to_string(),
        state,
        posterior,
        operators,
        loggers,
    })
}

/// Lowers one configuration per replicate, each from a fresh context.
pub fn lower_replicates(
    graph: &ModelGraph,
    registry: &Registry,
    options: &LoweringOptions,
) -> Result<Vec<RunConfiguration>, LoweringError> {
    let count = options.replicates.max(1);

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        (0..count)
            .into_par_iter()
            .map(|i| lower_with_stem(graph, registry, options, &options.replicate_stem(i)))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        (0..count)
            .map(|i| lower_with_stem(graph, registry, options, &options.replicate_stem(i)))
            .collect()
    }
}
