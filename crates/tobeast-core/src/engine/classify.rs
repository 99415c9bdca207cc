//! Node classification: state, clamped, or derived.

use tobeast_model::{kinds, Generator, ModelGraph, Namespace, ValueId};

use crate::engine::context::Context;

/// How the lowering passes treat a source value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    /// Estimated during inference.
    State,
    /// Modeled random variable overridden by an observation of the same name.
    Clamped,
    /// Fixed or computed.
    Derived,
}

/// The observed value clamping `value`, if any.
///
/// A value is clamped when it is a random variable in the model namespace and
/// the data namespace holds a value of the same name.
pub fn clamped_counterpart(graph: &ModelGraph, value: ValueId) -> Option<ValueId> {
    let v = graph.get_value(value)?;
    if v.namespace != Namespace::Model || !v.random {
        return None;
    }
    graph.lookup(Namespace::Data, v.name()?)
}

pub fn is_clamped(graph: &ModelGraph, value: ValueId) -> bool {
    clamped_counterpart(graph, value).is_some()
}

/// True for an unclamped random variable, and for an element selection over
/// a random array that has no target of its own yet.
pub fn is_state(value: ValueId, ctx: &Context<'_>) -> bool {
    let graph = ctx.graph();
    let Some(v) = graph.get_value(value) else {
        return false;
    };
    if v.namespace == Namespace::Data || is_clamped(graph, value) {
        return false;
    }
    if v.random {
        return true;
    }
    match selected_array(graph, value) {
        Some(array) => graph.value(array).random && ctx.target_of(array).is_none(),
        None => false,
    }
}

pub fn classify(value: ValueId, ctx: &Context<'_>) -> NodeClass {
    if is_clamped(ctx.graph(), value) {
        NodeClass::Clamped
    } else if is_state(value, ctx) {
        NodeClass::State
    } else {
        NodeClass::Derived
    }
}

/// Array an element selection reads from.
pub fn selected_array(graph: &ModelGraph, value: ValueId) -> Option<ValueId> {
    let generator = graph.generator_of(value)?;
    if generator.is_a(kinds::ELEMENTS_AT) {
        generator.param("array")
    } else {
        None
    }
}

/// Generator that sampled `value`, looking through element selections.
pub fn sampling_generator(graph: &ModelGraph, value: ValueId) -> Option<&Generator> {
    let v = graph.get_value(value)?;
    if v.random {
        return graph.generator_of(value);
    }
    let array = selected_array(graph, value)?;
    if graph.value(array).random {
        graph.generator_of(array)
    } else {
        None
    }
}
