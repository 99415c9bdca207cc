//! Rate-matrix functions to substitution models.

use tobeast_model::{kinds, Generator, GeneratorId};

use crate::converters::{generator, real_input};
use crate::engine::context::Context;
use crate::engine::errors::LoweringError;
use crate::engine::registry::GeneratorConverter;
use crate::engine::target::{Input, Parameter, TargetId, TargetKind, TargetObject};
use crate::specs;

/// Number of nucleotide states.
const NUCLEOTIDE_STATES: usize = 4;

/// `Frequencies` over the generator's `freq` input, or fixed equal
/// frequencies when it has none.
fn frequencies(ctx: &mut Context<'_>, gen: &Generator) -> Result<TargetId, LoweringError> {
    let freqs = match gen.param("freq") {
        Some(freq) => ctx.as_real_parameter(freq)?,
        None => ctx.add(TargetObject::new(
            specs::REAL_PARAMETER,
            TargetKind::RealParameter(Parameter::new(
                vec![1.0 / NUCLEOTIDE_STATES as f64; NUCLEOTIDE_STATES],
                false,
            )),
        )),
    };
    Ok(ctx.add(
        TargetObject::new(specs::FREQUENCIES, TargetKind::Object)
            .input("frequencies", Input::Ref(freqs)),
    ))
}

/// The nucleotide substitution models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionConverter {
    JukesCantor,
    /// HKY with equal frequencies.
    K80,
    /// HKY with a unit transition/transversion ratio.
    F81,
    Hky,
    Gtr,
}

impl SubstitutionConverter {
    pub const ALL: [Self; 5] = [
        SubstitutionConverter::JukesCantor,
        SubstitutionConverter::K80,
        SubstitutionConverter::F81,
        SubstitutionConverter::Hky,
        SubstitutionConverter::Gtr,
    ];
}

impl GeneratorConverter for SubstitutionConverter {
    fn kind(&self) -> &str {
        match self {
            SubstitutionConverter::JukesCantor => kinds::JUKES_CANTOR,
            SubstitutionConverter::K80 => kinds::K80,
            SubstitutionConverter::F81 => kinds::F81,
            SubstitutionConverter::Hky => kinds::HKY,
            SubstitutionConverter::Gtr => kinds::GTR,
        }
    }

    fn build(
        &self,
        id: GeneratorId,
        _output: TargetId,
        ctx: &mut Context<'_>,
    ) -> Result<Option<TargetId>, LoweringError> {
        let gen = generator(ctx, id);
        let model = match self {
            SubstitutionConverter::JukesCantor => {
                TargetObject::new(specs::JUKES_CANTOR, TargetKind::Object)
            }
            SubstitutionConverter::K80 | SubstitutionConverter::Hky => {
                let kappa = real_input(ctx, gen, "kappa")?;
                // K80 has no frequency input, so `frequencies` falls back to equal ones
                let freqs = frequencies(ctx, gen)?;
                TargetObject::new(specs::HKY, TargetKind::Object)
                    .input("kappa", Input::Ref(kappa))
                    .input("frequencies", Input::Ref(freqs))
            }
            SubstitutionConverter::F81 => {
                let freqs = frequencies(ctx, gen)?;
                TargetObject::new(specs::HKY, TargetKind::Object)
                    .input("kappa", Input::Real(1.0))
                    .input("frequencies", Input::Ref(freqs))
            }
            SubstitutionConverter::Gtr => {
                let rates = real_input(ctx, gen, "rates")?;
                let freqs = frequencies(ctx, gen)?;
                TargetObject::new(specs::GTR, TargetKind::Object)
                    .input("rates", Input::Ref(rates))
                    .input("frequencies", Input::Ref(freqs))
            }
        };
        Ok(Some(ctx.add(model)))
    }
}
