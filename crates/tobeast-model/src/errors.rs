//! Error types for source graph construction.

use thiserror::Error;

/// Errors raised while building or querying a [`crate::ModelGraph`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// A value id does not refer to a value in the graph.
    #[error("unknown value id {0}")]
    UnknownValue(u32),

    /// A generator id does not refer to a generator in the graph.
    #[error("unknown generator id {0}")]
    UnknownGenerator(u32),

    /// Two values in the same namespace carry the same name.
    #[error("duplicate name '{name}' in {namespace} namespace")]
    DuplicateName { name: String, namespace: String },

    /// A value was attached to a second generator.
    #[error("value '{0}' already has a generator")]
    GeneratorAlreadySet(String),

    /// A value depends on itself through generator inputs.
    #[error("value '{0}' depends on itself")]
    Cycle(String),

    /// Malformed tree topology (no root, several roots, or a cycle).
    #[error("invalid tree: {0}")]
    InvalidTree(String),
}
