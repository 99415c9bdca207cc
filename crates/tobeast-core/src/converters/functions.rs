//! Array views: slices and element selections.
//!
//! Both rewrite the lowering of their output value into a view of the
//! array's target, so proposals on the array move the view with it.

use tobeast_model::{kinds, Generator, GeneratorId, ValueId};
use tracing::debug;

use crate::converters::{generator, required_param};
use crate::engine::context::{Context, SourceRef};
use crate::engine::errors::LoweringError;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{TargetId, TargetKind, TargetObject};
use crate::specs;

fn integer_param(gen: &Generator, name: &str, ctx: &Context<'_>) -> Result<usize, LoweringError> {
    let v = required_param(gen, name)?;
    ctx.graph()
        .value(v)
        .payload
        .as_integer()
        .filter(|i| *i >= 0)
        .map(|i| i as usize)
        .ok_or_else(|| LoweringError::Unsupported {
            kind: gen.kind.clone(),
            reason: format!("'{}' must be a constant non-negative integer", name),
        })
}

/// Re-lowers `value` as `count` entries of `array` from `start`: the element
/// itself when the array is a concatenation and one entry is taken, a slice
/// otherwise.
fn view_of(
    value: ValueId,
    array: ValueId,
    start: usize,
    count: usize,
    ctx: &mut Context<'_>,
) -> Result<Option<TargetId>, LoweringError> {
    let Some(source) = ctx.target_of(array) else {
        return Ok(None);
    };
    let dimension = ctx.object(source).dimension();
    if count == 0 || start + count > dimension {
        return Err(LoweringError::DimensionMismatch {
            what: format!("range [{}, {}) of {}", start, start + count, ctx.display_id(source)),
            expected: format!("at most {}", dimension),
            actual: start + count,
        });
    }
    let element = match &ctx.object(source).kind {
        TargetKind::Concatenate(parts) if count == 1 => Some(parts[start]),
        _ => None,
    };
    let view = match element {
        Some(part) => part,
        None => {
            let label = ctx.graph().label(value);
            ctx.add(
                TargetObject::new(
                    specs::SLICE,
                    TargetKind::Slice {
                        source,
                        index: start,
                        count,
                    },
                )
                .with_id(label),
            )
        }
    };
    debug!(value = %ctx.graph().label(value), view = %ctx.display_id(view), "value re-lowered as array view");
    ctx.replace(SourceRef::Value(value), view)?;
    Ok(Some(view))
}

/// `SliceDoubleArray(array, start, end)` with an inclusive `end`.
pub struct SliceConverter;

impl GeneratorConverter for SliceConverter {
    fn kind(&self) -> &str {
        kinds::SLICE_DOUBLE_ARRAY
    }

    fn rewrite(
        &self,
        id: GeneratorId,
        _output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<(), LoweringError> {
        let gen = generator(ctx, id);
        let Some(value) = gen.output() else {
            return Ok(());
        };
        let array = required_param(gen, "array")?;
        let start = integer_param(gen, "start", ctx)?;
        let end = integer_param(gen, "end", ctx)?;
        if end < start {
            return Err(LoweringError::Unsupported {
                kind: gen.kind.clone(),
                reason: format!("end {} precedes start {}", end, start),
            });
        }
        view_of(value, array, start, end - start + 1, ctx)?;
        Ok(())
    }

    fn build(
        &self,
        _id: GeneratorId,
        output: TargetId,
        _ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        Ok(Some(output))
    }
}

/// `ElementsAt(array, index)`: a single entry of an array.
pub struct ElementsAtConverter;

impl GeneratorConverter for ElementsAtConverter {
    fn kind(&self) -> &str {
        kinds::ELEMENTS_AT
    }

    fn rewrite(
        &self,
        id: GeneratorId,
        _output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<(), LoweringError> {
        let gen = generator(ctx, id);
        let Some(value) = gen.output() else {
            return Ok(());
        };
        let array = required_param(gen, "array")?;
        let index = integer_param(gen, "index", ctx)?;
        view_of(value, array, index, 1, ctx)?;
        Ok(())
    }

    /// Element selections only restructure values.
    fn build(
        &self,
        _id: GeneratorId,
        _output: TargetId,
        _ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        Ok(None)
    }
}
