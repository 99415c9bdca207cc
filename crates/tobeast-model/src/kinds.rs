//! Well-known generator kind names.
//!
//! Generators are identified by kind name so that extension crates can add
//! kinds the core never heard of. These constants name the kinds the default
//! converters and exclusion rules refer to.

// Parametric distributions
pub const LOG_NORMAL: &str = "LogNormal";
pub const NORMAL: &str = "Normal";
pub const EXP: &str = "Exp";
pub const GAMMA: &str = "Gamma";
pub const BETA: &str = "Beta";
pub const INVERSE_GAMMA: &str = "InverseGamma";
pub const INVERSE_GAMMA_MULTI: &str = "InverseGammaMulti";
pub const UNIFORM: &str = "Uniform";
pub const POISSON: &str = "Poisson";
pub const DIRICHLET: &str = "Dirichlet";
pub const DIRICHLET_MULTI: &str = "DirichletMulti";
pub const WEIGHTED_DIRICHLET: &str = "WeightedDirichlet";
pub const RANDOM_COMPOSITION: &str = "RandomComposition";
pub const RANDOM_BOOLEAN_ARRAY: &str = "RandomBooleanArray";
pub const BERNOULLI_MULTI: &str = "BernoulliMulti";
pub const EXP_MARKOV_CHAIN: &str = "ExpMarkovChain";

// Wrappers
pub const IID: &str = "IID";
pub const VECTORIZED: &str = "VectorizedDistribution";
pub const VECTORIZED_FUNCTION: &str = "VectorizedFunction";

// Substitution models and site rates
pub const RATE_MATRIX: &str = "RateMatrix";
pub const JUKES_CANTOR: &str = "JukesCantor";
pub const K80: &str = "K80";
pub const F81: &str = "F81";
pub const HKY: &str = "HKY";
pub const GTR: &str = "GTR";
pub const DISCRETIZED_GAMMA: &str = "DiscretizedGamma";

// Tree generative distributions
pub const TREE_DISTRIBUTION: &str = "TreeDistribution";
pub const COALESCENT: &str = "Coalescent";
pub const SERIAL_COALESCENT: &str = "SerialCoalescent";
pub const SKYLINE_COALESCENT: &str = "SkylineCoalescent";
pub const STRUCTURED_COALESCENT: &str = "StructuredCoalescent";
pub const YULE: &str = "Yule";
pub const BIRTH_DEATH: &str = "BirthDeath";
pub const SIM_FBD_AGE: &str = "SimFBDAge";
pub const FOSSIL_BIRTH_DEATH_TREE: &str = "FossilBirthDeathTree";
pub const SIM_FOSSILS_POISSON: &str = "SimFossilsPoisson";

// Likelihoods
pub const PHYLO_CTMC: &str = "PhyloCTMC";
pub const LOCAL_BRANCH_RATES: &str = "LocalBranchRates";

// Deterministic functions
pub const SLICE_DOUBLE_ARRAY: &str = "SliceDoubleArray";
pub const ELEMENTS_AT: &str = "ElementsAt";
pub const MIGRATION_MATRIX: &str = "MigrationMatrix";
pub const MIGRATION_COUNT: &str = "MigrationCount";
pub const EXPRESSION_NODE: &str = "ExpressionNode";
pub const INTEGER_ARRAY: &str = "IntegerArray";
pub const NUCLEOTIDES: &str = "Nucleotides";
pub const BINARY_DATATYPE: &str = "Binary";
pub const STANDARD_DATATYPE: &str = "Standard";
pub const TAXA: &str = "Taxa";
pub const CREATE_TAXA: &str = "CreateTaxa";
pub const N_TAXA: &str = "NTaxa";
pub const N_CHAR: &str = "NChar";
pub const TAXA_AGES: &str = "TaxaAges";
pub const SPECIES: &str = "Species";
pub const READ_NEXUS: &str = "ReadNexus";
pub const READ_FASTA: &str = "ReadFasta";
pub const EXTRACT_TRAIT: &str = "ExtractTrait";
pub const UNIQUE: &str = "Unique";
pub const A_RANGE: &str = "ARange";
pub const RANGE: &str = "Range";
pub const RANGE_LIST: &str = "RangeList";
pub const REP: &str = "Rep";
pub const MAP: &str = "Map";
pub const LENGTH: &str = "Length";
pub const SELECT: &str = "Select";
pub const SUM_BOOLEAN: &str = "SumBoolean";
pub const METHOD_CALL: &str = "MethodCall";
