//! Error types for model lowering.

use thiserror::Error;
use tobeast_model::ModelError;

impl From<ModelError> for LoweringError {
    fn from(err: ModelError) -> Self {
        LoweringError::InvalidModel(err.to_string())
    }
}

impl From<serde_json::Error> for LoweringError {
    fn from(err: serde_json::Error) -> Self {
        LoweringError::Serialization(err.to_string())
    }
}

/// Errors that abort a lowering run.
///
/// Every variant is fatal for the run that raised it: there is no partial
/// output mode, and a failed run produces no configuration.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoweringError {
    /// No value converter matched and the value kind is not excluded.
    #[error("unhandled value '{id}' of type {type_name}")]
    UnhandledValue { id: String, type_name: String },

    /// No generator converter matched and the generator kind is not excluded.
    #[error("unhandled generator {0}")]
    UnhandledGenerator(String),

    /// A target could not be converted between numeric parameter types.
    #[error("cannot coerce '{id}' from {from} to {to}")]
    Coercion { id: String, from: String, to: String },

    /// A tree operator strategy produced no operators for a tree.
    #[error("tree operator strategy '{strategy}' produced no operators for tree '{tree}'")]
    InvalidTreeOperatorStrategy { strategy: String, tree: String },

    /// Dimensions of related inputs disagree.
    #[error("dimension mismatch for {what}: expected {expected}, found {actual}")]
    DimensionMismatch {
        what: String,
        expected: String,
        actual: usize,
    },

    /// A converter does not support the given parameterization.
    #[error("unsupported {kind}: {reason}")]
    Unsupported { kind: String, reason: String },

    /// A converter needed a target for an input that was never lowered.
    #[error("no target object for '{0}'")]
    MissingTarget(String),

    /// The source graph is inconsistent.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Rendering the configuration failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal invariant violation (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}
