//! # tobeast-model
//!
//! Source graph types for the model lowering engine: value and generator
//! nodes, their payloads, and the two declaration namespaces used for
//! clamping observed data onto modeled random variables.

pub mod errors;
pub mod graph;
pub mod kinds;
pub mod payload;

pub use errors::ModelError;
pub use graph::{Generator, GeneratorId, GraphData, ModelGraph, Namespace, Value, ValueId};
pub use payload::{Alignment, Payload, PayloadKind, SequenceType, TimeTree, TreeNode};
