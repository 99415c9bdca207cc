//! Engine-side type names written into the `spec` field of target objects.

pub const MCMC: &str = "beast.base.inference.MCMC";
pub const STATE: &str = "beast.base.inference.State";
pub const COMPOUND_DISTRIBUTION: &str = "beast.base.inference.CompoundDistribution";
pub const PRIOR: &str = "beast.base.inference.distribution.Prior";
pub const LOGGER: &str = "beast.base.inference.Logger";

// Parameters and containers
pub const REAL_PARAMETER: &str = "beast.base.inference.parameter.RealParameter";
pub const INTEGER_PARAMETER: &str = "beast.base.inference.parameter.IntegerParameter";
pub const BOOLEAN_PARAMETER: &str = "beast.base.inference.parameter.BooleanParameter";
pub const CONCATENATE: &str = "feast.function.Concatenate";
pub const SLICE: &str = "feast.function.Slice";
pub const VECTOR: &str = "lphybeast.BEASTVector";

// Parametric distributions
pub const LOG_NORMAL: &str = "beast.base.inference.distribution.LogNormalDistributionModel";
pub const NORMAL: &str = "beast.base.inference.distribution.Normal";
pub const EXPONENTIAL: &str = "beast.base.inference.distribution.Exponential";
pub const GAMMA: &str = "beast.base.inference.distribution.Gamma";
pub const BETA: &str = "beast.base.inference.distribution.Beta";
pub const INVERSE_GAMMA: &str = "beast.base.inference.distribution.InverseGamma";
pub const UNIFORM: &str = "beast.base.inference.distribution.Uniform";
pub const POISSON: &str = "beast.base.inference.distribution.Poisson";
pub const DIRICHLET: &str = "beast.base.inference.distribution.Dirichlet";
pub const BERNOULLI: &str = "outercore.math.distributions.BernoulliDistribution";
pub const SUM: &str = "beast.base.evolution.Sum";
pub const MARKOV_CHAIN: &str = "beast.base.inference.distribution.MarkovChainDistribution";

// Phylogenetics
pub const TREE: &str = "beast.base.evolution.tree.Tree";
pub const ALIGNMENT: &str = "beast.base.evolution.alignment.Alignment";
pub const TREE_INTERVALS: &str = "beast.base.evolution.tree.TreeIntervals";
pub const CONSTANT_POPULATION: &str = "beast.base.evolution.tree.coalescent.ConstantPopulation";
pub const COALESCENT: &str = "beast.base.evolution.tree.coalescent.Coalescent";
pub const BAYESIAN_SKYLINE: &str = "beast.base.evolution.tree.coalescent.BayesianSkyline";
pub const YULE: &str = "beast.base.evolution.speciation.YuleModel";
pub const BIRTH_DEATH: &str = "beast.base.evolution.speciation.BirthDeathGernhard08Model";
pub const JUKES_CANTOR: &str = "beast.base.evolution.substitutionmodel.JukesCantor";
pub const HKY: &str = "beast.base.evolution.substitutionmodel.HKY";
pub const GTR: &str = "beast.base.evolution.substitutionmodel.GTR";
pub const FREQUENCIES: &str = "beast.base.evolution.substitutionmodel.Frequencies";
pub const SITE_MODEL: &str = "beast.base.evolution.sitemodel.SiteModel";
pub const STRICT_CLOCK: &str = "beast.base.evolution.branchratemodel.StrictClockModel";
pub const RELAXED_CLOCK: &str = "beast.base.evolution.branchratemodel.UCRelaxedClockModel";
pub const RANDOM_LOCAL_CLOCK: &str = "beast.base.evolution.branchratemodel.RandomLocalClockModel";
pub const RATE_STATISTIC: &str = "beast.base.evolution.RateStatistic";
pub const TREE_LIKELIHOOD: &str = "beast.base.evolution.likelihood.ThreadedTreeLikelihood";

// Operators
pub const SCALE_OPERATOR: &str = "beast.base.evolution.operator.ScaleOperator";
pub const DELTA_EXCHANGE: &str = "beast.base.inference.operator.DeltaExchangeOperator";
pub const INT_RANDOM_WALK: &str = "beast.base.inference.operator.IntRandomWalkOperator";
pub const BIT_FLIP: &str = "beast.base.inference.operator.BitFlipOperator";
pub const UP_DOWN: &str = "beast.base.inference.operator.UpDownOperator";
pub const EXCHANGE: &str = "beast.base.evolution.operator.Exchange";
pub const UNIFORM_OPERATOR: &str = "beast.base.evolution.operator.Uniform";
pub const SUBTREE_SLIDE: &str = "beast.base.evolution.operator.SubtreeSlide";
pub const WILSON_BALDING: &str = "beast.base.evolution.operator.WilsonBalding";
pub const IN_CONSTANT_DISTANCE: &str = "consoperators.InConstantDistanceOperator";
pub const SIMPLE_DISTANCE: &str = "consoperators.SimpleDistance";
pub const BIG_PULLEY: &str = "consoperators.BigPulley";
pub const SMALL_PULLEY: &str = "consoperators.SmallPulley";

// Loggers
pub const TREE_STAT_LOGGER: &str = "beast.base.evolution.tree.TreeStatLogger";
pub const METADATA_TREE_LOGGER: &str = "beast.base.evolution.TreeWithMetaDataLogger";

/// Last path segment of an engine type name.
pub fn simple_name(spec: &str) -> &str {
    spec.rsplit('.').next().unwrap_or(spec)
}
