//! Wrapper generators: IID and vectorized distributions, vectorized
//! functions.
//!
//! No wrapper has an engine counterpart of its own; each delegates to the
//! converters of its components.

use tobeast_model::{kinds, GeneratorId};
use tracing::debug;

use crate::converters::generator;
use crate::engine::context::{Context, SourceRef};
use crate::engine::errors::LoweringError;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{TargetId, TargetKind, TargetObject};
use crate::specs;

/// Builds the distribution of `component` over `output`.
fn delegate(
    component: GeneratorId,
    output: TargetId,
    ctx: &mut Context<'_>,
) -> Result<TargetId, LoweringError> {
    let base = generator(ctx, component);
    let converter = ctx
        .registry()
        .find_generator_converter(base)
        .ok_or_else(|| LoweringError::UnhandledGenerator(base.kind.clone()))?;
    converter
        .build(component, output, ctx)?
        .ok_or_else(|| LoweringError::UnhandledGenerator(base.kind.clone()))
}

fn vector_elements(output: TargetId, ctx: &Context<'_>) -> Option<Vec<TargetId>> {
    match &ctx.object(output).kind {
        TargetKind::Vector(elements) => Some(elements.clone()),
        _ => None,
    }
}

fn distribution_vector(ctx: &mut Context<'_>, output: TargetId, parts: Vec<TargetId>) -> TargetId {
    let id = format!("{}.distributions", ctx.display_id(output));
    ctx.add(TargetObject::new(specs::VECTOR, TargetKind::Vector(parts)).with_id(id))
}

/// `IID(base, n)`: one distribution over the whole parameter, or one per
/// element of a vector.
pub struct IidConverter;

impl GeneratorConverter for IidConverter {
    fn kind(&self) -> &str {
        kinds::IID
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let Some(&base) = gen.components.first() else {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: "no base distribution".into(),
            });
        };
        let size = gen
            .param("n")
            .and_then(|n| ctx.graph().value(n).payload.as_integer())
            .map(|n| n as usize);

        if let Some(elements) = vector_elements(output, ctx) {
            if let Some(n) = size.filter(|n| *n != elements.len()) {
                return Err(LoweringError::DimensionMismatch {
                    what: format!("elements of {}", ctx.display_id(output)),
                    expected: n.to_string(),
                    actual: elements.len(),
                });
            }
            let mut parts = Vec::with_capacity(elements.len());
            for element in elements {
                parts.push(delegate(base, element, ctx)?);
            }
            debug!(output = %ctx.display_id(output), count = parts.len(), "iid per-element priors");
            return Ok(Some(distribution_vector(ctx, output, parts)));
        }

        let obj = ctx.object(output);
        if !obj.is_parameter() {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("cannot sample {}", specs::simple_name(&obj.spec)),
            });
        }
        if let Some(n) = size.filter(|n| *n != obj.dimension()) {
            return Err(LoweringError::DimensionMismatch {
                what: format!("dimension of {}", ctx.display_id(output)),
                expected: n.to_string(),
                actual: obj.dimension(),
            });
        }
        delegate(base, output, ctx).map(Some)
    }
}

/// Vectorized distribution: component `i` samples element `i` of a vector.
pub struct VectorizedConverter;

impl GeneratorConverter for VectorizedConverter {
    fn kind(&self) -> &str {
        kinds::VECTORIZED
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let Some(elements) = vector_elements(output, ctx) else {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("expected a vector output, got {}", ctx.display_id(output)),
            });
        };
        if elements.len() != gen.components.len() {
            return Err(LoweringError::DimensionMismatch {
                what: format!("components of {}", gen.kind),
                expected: elements.len().to_string(),
                actual: gen.components.len(),
            });
        }
        let mut parts = Vec::with_capacity(elements.len());
        for (component, element) in gen.components.iter().zip(elements) {
            parts.push(delegate(*component, element, ctx)?);
        }
        Ok(Some(distribution_vector(ctx, output, parts)))
    }
}
/// Vectorized function: component `i` computes element `i` of a vector.
/// Each component is registered as lowered to its own object, so consumers
/// of a single component find it.
pub struct VectorizedFunctionConverter;

impl GeneratorConverter for VectorizedFunctionConverter {
    fn kind(&self) -> &str {
        kinds::VECTORIZED_FUNCTION
    }

    fn build(
        &self,
        id: GeneratorId,
        output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let Some(elements) = vector_elements(output, ctx) else {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("expected a vector output, got {}", ctx.display_id(output)),
            });
        };
        if elements.len() != gen.components.len() {
            return Err(LoweringError::DimensionMismatch {
                what: format!("components of {}", gen.kind),
                expected: elements.len().to_string(),
                actual: gen.components.len(),
            });
        }
        let mut parts = Vec::with_capacity(elements.len());
        for (component, element) in gen.components.iter().zip(elements) {
            let part = delegate(*component, element, ctx)?;
            ctx.insert(SourceRef::Generator(*component), part)?;
            parts.push(part);
        }
        let id = format!("{}.functions", ctx.display_id(output));
        Ok(Some(ctx.add(TargetObject::new(specs::VECTOR, TargetKind::Vector(parts)).with_id(id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::lower::run_passes;
    use crate::engine::registry::Registry;
    use tobeast_model::{Generator, ModelGraph, Payload};

    /// `x` is a two-element compound vector sampled by `wrapper` over
    /// `components` exponential components.
    fn wrapped(wrapper: &str, components: usize) -> (ModelGraph, GeneratorId) {
        let mut g = ModelGraph::new();
        let mut gen = Generator::distribution(wrapper);
        for i in 0..components {
            let mean = g
                .add_constant(&format!("mean{}", i), Payload::Real(1.0 + i as f64))
                .unwrap();
            let exp = g
                .add_generator(Generator::distribution(kinds::EXP).with_param("mean", mean))
                .unwrap();
            gen = gen.with_component(exp);
        }
        let w = g.add_generator(gen).unwrap();
        g.add_random(
            "x",
            Payload::Compound(vec![Payload::Real(0.5), Payload::Real(1.5)]),
            w,
        )
        .unwrap();
        (g, w)
    }

    fn element_ids(ctx: &Context<'_>, vector: TargetId) -> Vec<String> {
        match &ctx.object(vector).kind {
            TargetKind::Vector(items) => items.iter().map(|i| ctx.display_id(*i)).collect(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn vectorized_components_sample_one_element_each() {
        let (g, w) = wrapped(kinds::VECTORIZED, 2);
        let r = Registry::with_defaults();
        let mut ctx = Context::new(&g, &r);
        run_passes(&mut ctx).unwrap();

        let dists = ctx.generator_target(w).unwrap();
        assert_eq!(ctx.display_id(dists), "x.distributions");
        assert_eq!(element_ids(&ctx, dists), vec!["x_0.prior", "x_1.prior"]);
    }

    #[test]
    fn vectorized_component_count_must_match() {
        let (g, _) = wrapped(kinds::VECTORIZED, 3);
        let r = Registry::with_defaults();
        let mut ctx = Context::new(&g, &r);
        assert!(matches!(
            run_passes(&mut ctx),
            Err(LoweringError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn iid_over_a_vector_repeats_the_base() {
        let (g, w) = wrapped(kinds::IID, 1);
        let r = Registry::with_defaults();
        let mut ctx = Context::new(&g, &r);
        run_passes(&mut ctx).unwrap();

        let dists = ctx.generator_target(w).unwrap();
        assert_eq!(element_ids(&ctx, dists), vec!["x_0.prior", "x_1.prior"]);
    }

    #[test]
    fn iid_without_base_is_unsupported() {
        let (g, _) = wrapped(kinds::IID, 0);
        let r = Registry::with_defaults();
        let mut ctx = Context::new(&g, &r);
        assert!(matches!(
            run_passes(&mut ctx),
            Err(LoweringError::Unsupported { .. })
        ));
    }

    /// `Q` is a pair of rate matrices computed by `components` Jukes-Cantor
    /// functions.
    fn rate_matrices(components: usize) -> (ModelGraph, GeneratorId, Vec<GeneratorId>) {
        let mut g = ModelGraph::new();
        let mut gen = Generator::function(kinds::VECTORIZED_FUNCTION);
        let mut parts = Vec::new();
        for _ in 0..components {
            let jc = g.add_generator(Generator::function(kinds::JUKES_CANTOR)).unwrap();
            gen = gen.with_component(jc);
            parts.push(jc);
        }
        let v = g.add_generator(gen).unwrap();
        let matrix = Payload::RealMatrix(vec![vec![0.25; 4]; 4]);
        g.add_derived(Some("Q"), Payload::Compound(vec![matrix.clone(), matrix]), v)
            .unwrap();
        (g, v, parts)
    }

    #[test]
    fn vectorized_functions_lower_each_component() {
        let (g, v, parts) = rate_matrices(2);
        let r = Registry::with_defaults();
        let mut ctx = Context::new(&g, &r);
        run_passes(&mut ctx).unwrap();

        let functions = ctx.generator_target(v).unwrap();
        assert_eq!(ctx.display_id(functions), "Q.functions");
        let TargetKind::Vector(items) = &ctx.object(functions).kind else {
            panic!("not a vector");
        };
        assert_eq!(items.len(), 2);
        for (part, item) in parts.iter().zip(items) {
            assert_eq!(ctx.generator_target(*part), Some(*item));
            assert_eq!(ctx.object(*item).spec, specs::JUKES_CANTOR);
        }
    }

    #[test]
    fn vectorized_function_count_must_match() {
        let (g, _, _) = rate_matrices(3);
        let r = Registry::with_defaults();
        let mut ctx = Context::new(&g, &r);
        assert!(matches!(
            run_passes(&mut ctx),
            Err(LoweringError::DimensionMismatch { .. })
        ));
    }
}
