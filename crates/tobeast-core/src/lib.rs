//! # tobeast-core
//!
//! Lowers a probabilistic model graph into a run configuration for a
//! Bayesian inference engine: state nodes, a prior/likelihood partitioned
//! posterior, proposal operators and loggers.
//!
//! ```rust,ignore
//! use tobeast_core::{lower, LoweringOptions, Registry};
//!
//! let registry = Registry::with_defaults();
//! let config = lower(&graph, &registry, &LoweringOptions::default())?;
//! println!("{}", config.to_json()?);
//! ```

pub mod converters;
pub mod defaults;
pub mod engine;
pub mod specs;

// Re-export commonly used types
pub use defaults::DefaultBundle;
pub use engine::context::{Context, SourceRef};
pub use engine::errors::LoweringError;
pub use engine::loggers::{ExtraLogger, LoggerSettings};
pub use engine::registry::{
    Bundle, DataType, GeneratorConverter, GeneratorExclusion, Registry, ValueConverter,
};
pub use engine::run::{lower, lower_replicates, LoweringOptions, RunConfiguration};
pub use engine::target::{Input, TargetId, TargetKind, TargetObject};
pub use engine::tree_strategy::{DefaultTreeOperatorStrategy, TreeOperatorStrategy};
