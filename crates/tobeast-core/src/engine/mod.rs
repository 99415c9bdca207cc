//! Lowering engine: context, registry, passes and assembly stages.

pub mod classify;
pub mod context;
pub mod errors;
pub mod loggers;
pub mod lower;
pub mod operators;
pub mod posterior;
pub mod registry;
pub mod run;
pub mod serialize;
pub mod target;
pub mod tree_strategy;
