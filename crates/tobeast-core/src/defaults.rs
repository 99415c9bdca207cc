//! The default converter bundle.

use std::sync::Arc;

use tobeast_model::{kinds, PayloadKind};

use crate::converters::discrete::{BernoulliMultiConverter, RandomBooleanArrayConverter};
use crate::converters::distributions::{
    DirichletMultiConverter, ExpMarkovChainConverter, ParametricPriorConverter, UniformConverter,
};
use crate::converters::functions::{ElementsAtConverter, SliceConverter};
use crate::converters::likelihood::{LocalBranchRatesConverter, PhyloCtmcConverter};
use crate::converters::substitution::SubstitutionConverter;
use crate::converters::tree_priors::{
    BirthDeathConverter, CoalescentConverter, SkylineConverter, YuleConverter,
};
use crate::converters::values::{
    CompoundVectorConverter, PayloadConverter, WeightedDirichletConverter,
};
use crate::converters::wrappers::{IidConverter, VectorizedConverter, VectorizedFunctionConverter};
use crate::engine::registry::{
    Bundle, DataType, GeneratorConverter, GeneratorExclusion, ValueConverter,
};

/// Generator kinds that never produce an engine object.
const EXCLUDED_GENERATORS: &[&str] = &[
    kinds::NUCLEOTIDES,
    kinds::BINARY_DATATYPE,
    kinds::STANDARD_DATATYPE,
    kinds::TAXA,
    kinds::CREATE_TAXA,
    kinds::N_TAXA,
    kinds::N_CHAR,
    kinds::TAXA_AGES,
    kinds::SPECIES,
    kinds::READ_NEXUS,
    kinds::READ_FASTA,
    kinds::EXTRACT_TRAIT,
    kinds::UNIQUE,
    kinds::EXPRESSION_NODE,
    kinds::A_RANGE,
    kinds::RANGE,
    kinds::RANGE_LIST,
    kinds::REP,
    kinds::MAP,
    kinds::LENGTH,
    kinds::SELECT,
    kinds::SUM_BOOLEAN,
    kinds::METHOD_CALL,
    kinds::ELEMENTS_AT,
    kinds::INTEGER_ARRAY,
    kinds::DISCRETIZED_GAMMA,
    kinds::RANDOM_COMPOSITION,
    kinds::WEIGHTED_DIRICHLET,
    kinds::MIGRATION_MATRIX,
    kinds::MIGRATION_COUNT,
];

/// Converters for the core distributions, substitution models, tree priors
/// and the phylogenetic likelihood.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBundle;

impl Bundle for DefaultBundle {
    fn name(&self) -> &str {
        "default"
    }

    fn value_converters(&self) -> Vec<Arc<dyn ValueConverter>> {
        vec![
            Arc::new(WeightedDirichletConverter),
            Arc::new(PayloadConverter::REAL),
            Arc::new(PayloadConverter::INTEGER),
            Arc::new(PayloadConverter::BOOLEAN),
            Arc::new(PayloadConverter::MATRIX),
            Arc::new(PayloadConverter::TREE),
            Arc::new(PayloadConverter::ALIGNMENT),
            Arc::new(CompoundVectorConverter),
        ]
    }

    fn generator_converters(&self) -> Vec<Arc<dyn GeneratorConverter>> {
        let mut out: Vec<Arc<dyn GeneratorConverter>> = Vec::new();
        for c in ParametricPriorConverter::ALL {
            out.push(Arc::new(c));
        }
        out.push(Arc::new(UniformConverter));
        out.push(Arc::new(DirichletMultiConverter));
        out.push(Arc::new(ExpMarkovChainConverter));
        out.push(Arc::new(BernoulliMultiConverter));
        out.push(Arc::new(RandomBooleanArrayConverter));
        out.push(Arc::new(IidConverter));
        out.push(Arc::new(VectorizedConverter));
        out.push(Arc::new(VectorizedFunctionConverter));
        for c in SubstitutionConverter::ALL {
            out.push(Arc::new(c));
        }
        out.push(Arc::new(CoalescentConverter::CONSTANT));
        out.push(Arc::new(CoalescentConverter::SERIAL));
        out.push(Arc::new(SkylineConverter));
        out.push(Arc::new(YuleConverter));
        out.push(Arc::new(BirthDeathConverter));
        out.push(Arc::new(PhyloCtmcConverter));
        out.push(Arc::new(LocalBranchRatesConverter));
        out.push(Arc::new(SliceConverter));
        out.push(Arc::new(ElementsAtConverter));
        out
    }

    fn datatypes(&self) -> Vec<(String, DataType)> {
        vec![
            ("nucleotide".into(), DataType::new("nucleotide", Some(4))),
            ("aminoacid".into(), DataType::new("aminoacid", Some(20))),
            ("binary".into(), DataType::new("binary", Some(2))),
            ("standard".into(), DataType::new("standard", None)),
            ("continuous".into(), DataType::new("continuous", None)),
        ]
    }

    fn value_exclusions(&self) -> Vec<PayloadKind> {
        vec![
            PayloadKind::Text,
            PayloadKind::TextArray,
            PayloadKind::Map,
            PayloadKind::Taxa,
            PayloadKind::SequenceType,
        ]
    }

    fn generator_exclusions(&self) -> Vec<GeneratorExclusion> {
        let mut out: Vec<GeneratorExclusion> = EXCLUDED_GENERATORS
            .iter()
            .map(|k| GeneratorExclusion::kind(*k))
            .collect();
        out.push(GeneratorExclusion::WrapperOf {
            wrapper: kinds::IID.into(),
            base: kinds::DISCRETIZED_GAMMA.into(),
        });
        out
    }
}
