//! # Lowering Passes
//!
//! - **Value pass**: post-order from the model sinks; each value is lowered
//!   after every input of its generator.
//! - **Rewrite pass**: every generator once, inputs first; converters may
//!   restructure already-lowered values.
//! - **Materialize pass**: every generator once, inputs first; converters
//!   build the distribution or process object.
//!
//! The rewrite pass finishes over the whole graph before the materialize pass
//! starts, so no generator caches a target a later rewrite replaces.

use rustc_hash::FxHashSet;
use tobeast_model::{GeneratorId, ModelGraph, ValueId};
use tracing::{debug, warn};

use crate::engine::classify;
use crate::engine::context::{Context, SourceRef};
use crate::engine::errors::LoweringError;
use crate::engine::target::TargetId;

/// Lowers `value` and everything it depends on. Returns `None` for excluded
/// values.
pub fn lower_value(ctx: &mut Context<'_>, value: ValueId) -> Result<Option<TargetId>, LoweringError> {
    if let Some(t) = ctx.lowered(SourceRef::Value(value)) {
        if !classify::is_clamped(ctx.graph(), value) {
            return Ok(Some(t));
        }
    }
    let graph = ctx.graph();
    if let Some(g) = graph.value(value).generator {
        for input in generator_inputs(graph, g) {
            lower_value(ctx, input)?;
        }
    }

    if let Some(observed) = classify::clamped_counterpart(graph, value) {
        let observed_target = lower_value(ctx, observed)?;
        if let Some(modeled) = ctx.lowered(SourceRef::Value(value)) {
            if Some(modeled) == observed_target {
                return Ok(observed_target);
            }
            ctx.remove(modeled);
        }
        if let Some(t) = observed_target {
            debug!(value = %graph.label(value), "clamped to observed value");
            ctx.insert(SourceRef::Value(value), t)?;
        }
        return Ok(observed_target);
    }

    let v = graph.value(value);
    match ctx.registry().find_value_converter(v, graph) {
        Some(converter) => {
            let target = converter.lower(value, ctx)?;
            ctx.insert(SourceRef::Value(value), target)?;
            Ok(Some(target))
        }
        None if ctx.registry().is_excluded_value(v) => Ok(None),
        None => Err(LoweringError::UnhandledValue {
            id: graph.label(value),
            type_name: v.payload.kind().type_name().to_string(),
        }),
    }
}

/// Inputs of a generator and of its wrapped components.
fn generator_inputs(graph: &ModelGraph, generator: GeneratorId) -> Vec<ValueId> {
    let mut out = Vec::new();
    let mut stack = vec![generator];
    let mut seen = FxHashSet::default();
    while let Some(g) = stack.pop() {
        if !seen.insert(g) {
            continue;
        }
        let gen = graph.generator(g);
        for input in gen.inputs() {
            if !out.contains(&input) {
                out.push(input);
            }
        }
        stack.extend(gen.components.iter().rev().copied());
    }
    out
}

/// Value pass over every model sink.
pub fn lower_values(ctx: &mut Context<'_>) -> Result<(), LoweringError> {
    for sink in ctx.graph().sinks() {
        lower_value(ctx, sink)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Rewrite,
    Materialize,
}

/// Rewrite sub-pass.
pub fn rewrite_generators(ctx: &mut Context<'_>) -> Result<(), LoweringError> {
    traverse(ctx, Phase::Rewrite)
}

/// Materialize sub-pass.
pub fn materialize_generators(ctx: &mut Context<'_>) -> Result<(), LoweringError> {
    traverse(ctx, Phase::Materialize)
}

fn traverse(ctx: &mut Context<'_>, phase: Phase) -> Result<(), LoweringError> {
    let mut visited = FxHashSet::default();
    for sink in ctx.graph().sinks() {
        visit(ctx, sink, &mut visited, phase)?;
    }
    Ok(())
}

fn visit(
    ctx: &mut Context<'_>,
    value: ValueId,
    visited: &mut FxHashSet<GeneratorId>,
    phase: Phase,
) -> Result<(), LoweringError> {
    let graph = ctx.graph();
    let Some(g) = graph.value(value).generator else {
        return Ok(());
    };
    if visited.contains(&g) {
        return Ok(());
    }
    for input in generator_inputs(graph, g) {
        visit(ctx, input, visited, phase)?;
    }
    if visited.insert(g) {
        match phase {
            Phase::Rewrite => rewrite_one(ctx, value, g)?,
            Phase::Materialize => materialize_one(ctx, value, g)?,
        }
    }
    Ok(())
}

/// Output target a generator's converter works on: the observed target when
/// a generative distribution's output is clamped.
fn effective_output(ctx: &Context<'_>, value: ValueId, generator: GeneratorId) -> Option<TargetId> {
    let graph = ctx.graph();
    if graph.generator(generator).generative {
        if let Some(observed) = classify::clamped_counterpart(graph, value) {
            return ctx.lowered(SourceRef::Value(observed));
        }
    }
    ctx.lowered(SourceRef::Value(value))
}

fn rewrite_one(ctx: &mut Context<'_>, value: ValueId, g: GeneratorId) -> Result<(), LoweringError> {
    let graph = ctx.graph();
    let generator = graph.generator(g);
    let Some(converter) = ctx.registry().find_generator_converter(generator) else {
        return Ok(());
    };
    let Some(output) = effective_output(ctx, value, g) else {
        return Ok(());
    };
    converter.rewrite(g, output, ctx)
}

fn materialize_one(ctx: &mut Context<'_>, value: ValueId, g: GeneratorId) -> Result<(), LoweringError> {
    if ctx.generator_target(g).is_some() {
        return Ok(());
    }
    let graph = ctx.graph();
    let generator = graph.generator(g);
    let registry = ctx.registry();
    if registry.is_excluded_generator(generator, graph) {
        debug!(kind = %generator.kind, "generator excluded");
        return Ok(());
    }
    let converter = registry
        .find_generator_converter(generator)
        .ok_or_else(|| LoweringError::UnhandledGenerator(generator.kind.clone()))?;
    let Some(output) = effective_output(ctx, value, g) else {
        warn!(kind = %generator.kind, value = %graph.label(value), "generator output has no target, skipped");
        return Ok(());
    };
    match converter.build(g, output, ctx)? {
        Some(target) => ctx.insert(SourceRef::Generator(g), target),
        None => Err(LoweringError::UnhandledGenerator(generator.kind.clone())),
    }
}

/// Runs the value pass and both generator sub-passes.
pub fn run_passes(ctx: &mut Context<'_>) -> Result<(), LoweringError> {
    lower_values(ctx)?;
    debug!(state = ctx.state().len(), "value pass done");
    rewrite_generators(ctx)?;
    materialize_generators(ctx)?;
    debug!(objects = ctx.store().len(), "generator passes done");
    Ok(())
}
