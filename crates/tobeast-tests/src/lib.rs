//! Model fixtures shared by the integration and property tests.
//!
//! Every builder returns a complete [`ModelGraph`]; names follow the usual
//! phylogenetic conventions (`psi` for trees, `D` for alignments, `Q` for
//! rate matrices).

use tobeast_core::{lower, LoweringError, LoweringOptions, Registry, RunConfiguration, TargetKind};
use tobeast_model::{
    kinds, Alignment, Generator, GeneratorId, ModelGraph, Payload, SequenceType, TimeTree,
    TreeNode, ValueId,
};

/// Taxon names `t0 .. t{n-1}`.
pub fn taxa(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t{}", i)).collect()
}

/// Caterpillar tree over `names` with contemporaneous tips.
///
/// Internal node `k` sits at `root_height * (n-1-k) / (n-1)` and holds leaf
/// `k` and internal node `k+1`; the last internal node holds the last two
/// leaves.
pub fn ladder_tree(names: &[String], root_height: f64) -> TimeTree {
    let n = names.len();
    assert!(n >= 2, "a tree needs at least two taxa");
    let internal = n - 1;
    let mut nodes = Vec::with_capacity(2 * n - 1);
    for k in 0..internal {
        let height = root_height * (internal - k) as f64 / internal as f64;
        let parent = if k == 0 { None } else { Some(k - 1) };
        nodes.push(TreeNode::internal(height, parent));
    }
    for (i, name) in names.iter().enumerate() {
        nodes.push(TreeNode::leaf(name.clone(), 0.0, i.min(internal - 1)));
    }
    TimeTree::new(nodes).expect("ladder tree is valid")
}

/// Nucleotide alignment of `nchar` sites over `names`.
pub fn nucleotide_alignment(names: &[String], nchar: usize) -> Alignment {
    const BASES: [char; 4] = ['A', 'C', 'G', 'T'];
    Alignment {
        taxa: names.to_vec(),
        sequences: (0..names.len())
            .map(|i| (0..nchar).map(|j| BASES[(i + j) % 4]).collect())
            .collect(),
        sequence_type: SequenceType::Nucleotide,
    }
}

/// Adds `name ~ LogNormal(meanlog, sdlog)` with constant hyper-parameters.
pub fn log_normal(g: &mut ModelGraph, name: &str, meanlog: f64, sdlog: f64, value: Payload) -> ValueId {
    let m = g
        .add_value(tobeast_model::Value::constant(Payload::Real(meanlog)))
        .expect("value");
    let s = g
        .add_value(tobeast_model::Value::constant(Payload::Real(sdlog)))
        .expect("value");
    let ln = g
        .add_generator(
            Generator::distribution(kinds::LOG_NORMAL)
                .with_param("meanlog", m)
                .with_param("sdlog", s),
        )
        .expect("generator");
    g.add_random(name, value, ln).expect("random")
}

/// Adds `Q = jukesCantor()`.
pub fn jukes_cantor(g: &mut ModelGraph) -> ValueId {
    let jc = g
        .add_generator(Generator::function(kinds::JUKES_CANTOR).with_supertype(kinds::RATE_MATRIX))
        .expect("generator");
    g.add_derived(Some("Q"), Payload::RealMatrix(vec![vec![0.25; 4]; 4]), jc)
        .expect("derived")
}

/// Adds `name ~ PhyloCTMC(tree, Q, ...)` over `taxa` and observes it under
/// the same name. Returns the generator.
pub fn observed_ctmc(
    g: &mut ModelGraph,
    name: &str,
    names: &[String],
    params: &[(&str, ValueId)],
) -> GeneratorId {
    let mut ctmc = Generator::distribution(kinds::PHYLO_CTMC);
    for (k, v) in params {
        ctmc = ctmc.with_param(*k, *v);
    }
    let ctmc = g.add_generator(ctmc).expect("generator");
    let alignment = Payload::Alignment(nucleotide_alignment(names, 20));
    g.add_random(name, alignment.clone(), ctmc).expect("random");
    g.add_data(name, alignment).expect("data");
    ctmc
}

/// `theta ~ LogNormal(3, 1)`, `psi ~ Coalescent(theta)`, `Q = jukesCantor()`,
/// `D ~ PhyloCTMC(psi, Q)` with `D` observed.
pub fn coalescent_jc(ntaxa: usize) -> ModelGraph {
    let names = taxa(ntaxa);
    let mut g = ModelGraph::new();
    let theta = log_normal(&mut g, "theta", 3.0, 1.0, Payload::Real(20.0));
    let coal = g
        .add_generator(
            Generator::distribution(kinds::COALESCENT)
                .with_supertype(kinds::TREE_DISTRIBUTION)
                .with_param("theta", theta),
        )
        .expect("generator");
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 10.0)), coal)
        .expect("random");
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q)]);
    g
}

/// `pi ~ Dirichlet([1,1,1,1])`, `kappa ~ LogNormal(1, 1)`, `Q = hky(kappa, pi)`
/// over a fixed tree.
pub fn dirichlet_hky(ntaxa: usize) -> ModelGraph {
    let names = taxa(ntaxa);
    let mut g = ModelGraph::new();
    let conc = g
        .add_constant("conc", Payload::RealArray(vec![1.0; 4]))
        .expect("constant");
    let dir = g
        .add_generator(Generator::distribution(kinds::DIRICHLET).with_param("concentration", conc))
        .expect("generator");
    let pi = g
        .add_random("pi", Payload::RealArray(vec![0.25; 4]), dir)
        .expect("random");
    let kappa = log_normal(&mut g, "kappa", 1.0, 1.0, Payload::Real(2.0));
    let hky = g
        .add_generator(
            Generator::function(kinds::HKY)
                .with_supertype(kinds::RATE_MATRIX)
                .with_param("kappa", kappa)
                .with_param("freq", pi),
        )
        .expect("generator");
    let q = g
        .add_derived(Some("Q"), Payload::RealMatrix(vec![vec![0.25; 4]; 4]), hky)
        .expect("derived");
    let tree = g
        .add_constant("psi", Payload::Tree(ladder_tree(&names, 5.0)))
        .expect("constant");
    observed_ctmc(&mut g, "D", &names, &[("tree", tree), ("Q", q)]);
    g
}

/// `n` groups of `x_i ~ LogNormal(0, 1)` feeding `y_i ~ Exp(x_i)`; `y_i` is
/// observed when `observed[i]` is set.
pub fn hierarchical(observed: &[bool]) -> ModelGraph {
    let mut g = ModelGraph::new();
    for (i, obs) in observed.iter().enumerate() {
        let x = log_normal(&mut g, &format!("x{}", i), 0.0, 1.0, Payload::Real(1.0 + i as f64));
        let exp = g
            .add_generator(Generator::distribution(kinds::EXP).with_param("mean", x))
            .expect("generator");
        let y = format!("y{}", i);
        g.add_random(&y, Payload::Real(0.5), exp).expect("random");
        if *obs {
            g.add_data(&y, Payload::Real(0.25 + i as f64)).expect("data");
        }
    }
    g
}

/// `k ~ Poisson(3)` feeding `y ~ Exp(mean = k)`, `y` observed. The count is
/// an integer parameter read as a real by its consumer.
pub fn poisson_count() -> ModelGraph {
    let mut g = ModelGraph::new();
    let lambda = g.add_constant("lambda", Payload::Real(3.0)).expect("constant");
    let pois = g
        .add_generator(Generator::distribution(kinds::POISSON).with_param("lambda", lambda))
        .expect("generator");
    let k = g.add_random("k", Payload::Integer(4), pois).expect("random");
    let exp = g
        .add_generator(Generator::distribution(kinds::EXP).with_param("mean", k))
        .expect("generator");
    g.add_random("y", Payload::Real(0.5), exp).expect("random");
    g.add_data("y", Payload::Real(0.7)).expect("data");
    g
}

/// `S ~ Poisson(2)`, `I ~ RandomBooleanArray(5, S)` and the number of set
/// indicators derived from `I`.
pub fn indicator_count() -> ModelGraph {
    let mut g = ModelGraph::new();
    let lambda = g.add_constant("lambda", Payload::Real(2.0)).expect("constant");
    let pois = g
        .add_generator(Generator::distribution(kinds::POISSON).with_param("lambda", lambda))
        .expect("generator");
    let s = g.add_random("S", Payload::Integer(2), pois).expect("random");
    let n = g.add_constant("n", Payload::Integer(5)).expect("constant");
    let rba = g
        .add_generator(
            Generator::distribution(kinds::RANDOM_BOOLEAN_ARRAY)
                .with_param("n", n)
                .with_param("hammingWeight", s),
        )
        .expect("generator");
    let indicators = g
        .add_random("I", Payload::BooleanArray(vec![true, false, false, true, false]), rba)
        .expect("random");
    let sum = g
        .add_generator(Generator::function(kinds::SUM_BOOLEAN).with_param("x", indicators))
        .expect("generator");
    g.add_derived(Some("active"), Payload::Integer(2), sum)
        .expect("derived");
    g
}

/// [`coalescent_jc`] with `branchRates ~ LogNormal(-0.5, 0.5)` over the
/// `2n-2` branches of `psi`.
pub fn relaxed_clock(ntaxa: usize) -> ModelGraph {
    let names = taxa(ntaxa);
    let mut g = ModelGraph::new();
    let theta = log_normal(&mut g, "theta", 3.0, 1.0, Payload::Real(20.0));
    let coal = g
        .add_generator(Generator::distribution(kinds::COALESCENT).with_param("theta", theta))
        .expect("generator");
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 10.0)), coal)
        .expect("random");
    let q = jukes_cantor(&mut g);
    let rates = log_normal(
        &mut g,
        "branchRates",
        -0.5,
        0.5,
        Payload::RealArray(vec![1.0; 2 * ntaxa - 2]),
    );
    observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q), ("branchRates", rates)]);
    g
}

/// [`coalescent_jc`] with a random local clock: `indicators ~ Bernoulli(0.1)`
/// and `rates ~ LogNormal(0, 1)` over the `2n-2` branches of `psi`.
pub fn local_clock(ntaxa: usize) -> ModelGraph {
    let names = taxa(ntaxa);
    let branches = 2 * ntaxa - 2;
    let mut g = ModelGraph::new();
    let theta = log_normal(&mut g, "theta", 3.0, 1.0, Payload::Real(20.0));
    let coal = g
        .add_generator(Generator::distribution(kinds::COALESCENT).with_param("theta", theta))
        .expect("generator");
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 10.0)), coal)
        .expect("random");
    let p = g.add_constant("p", Payload::Real(0.1)).expect("constant");
    let bernoulli = g
        .add_generator(Generator::distribution(kinds::BERNOULLI_MULTI).with_param("p", p))
        .expect("generator");
    let indicators = g
        .add_random("indicators", Payload::BooleanArray(vec![false; branches]), bernoulli)
        .expect("random");
    let rates = log_normal(&mut g, "rates", 0.0, 1.0, Payload::RealArray(vec![1.0; branches]));
    let local = g
        .add_generator(
            Generator::function(kinds::LOCAL_BRANCH_RATES)
                .with_param("tree", psi)
                .with_param("indicators", indicators)
                .with_param("rates", rates),
        )
        .expect("generator");
    let branch_rates = g
        .add_derived(Some("branchRates"), Payload::RealArray(vec![1.0; branches]), local)
        .expect("derived");
    let q = jukes_cantor(&mut g);
    observed_ctmc(
        &mut g,
        "D",
        &names,
        &[("tree", psi), ("Q", q), ("branchRates", branch_rates)],
    );
    g
}

/// `theta0 ~ LogNormal(3, 1)`, `theta ~ ExpMarkovChain(firstValue = theta0)`
/// over `n-1` epochs, `psi ~ SkylineCoalescent(theta)`, `D` observed.
pub fn skyline_jc(ntaxa: usize) -> ModelGraph {
    let names = taxa(ntaxa);
    let mut g = ModelGraph::new();
    let first = log_normal(&mut g, "theta0", 3.0, 1.0, Payload::Real(20.0));
    let emc = g
        .add_generator(Generator::distribution(kinds::EXP_MARKOV_CHAIN).with_param("firstValue", first))
        .expect("generator");
    let theta = g
        .add_random("theta", Payload::RealArray(vec![20.0; ntaxa - 1]), emc)
        .expect("random");
    let skyline = g
        .add_generator(
            Generator::distribution(kinds::SKYLINE_COALESCENT)
                .with_supertype(kinds::TREE_DISTRIBUTION)
                .with_param("theta", theta),
        )
        .expect("generator");
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 10.0)), skyline)
        .expect("random");
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q)]);
    g
}

/// Every `id` field of a rendered document, in document order.
pub fn rendered_ids(doc: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![doc];
    while let Some(v) = stack.pop() {
        match v {
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(id)) = map.get("id") {
                    out.push(id.clone());
                }
                stack.extend(map.values().rev());
            }
            serde_json::Value::Array(items) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }
    out
}

/// Lowers with the default bundle and default options.
pub fn lower_default(graph: &ModelGraph) -> Result<RunConfiguration, LoweringError> {
    lower(graph, &Registry::with_defaults(), &LoweringOptions::default())
}

/// Lowers with every bundle loaded.
pub fn lower_full(graph: &ModelGraph) -> Result<RunConfiguration, LoweringError> {
    lower(graph, &tobeast_ext::full_registry(), &LoweringOptions::default())
}

/// Identifiers of the children of a compound distribution.
pub fn compound_ids(config: &RunConfiguration, compound: tobeast_core::TargetId) -> Vec<String> {
    match &config.object(compound).kind {
        TargetKind::CompoundDistribution(items) => items
            .iter()
            .map(|i| config.id_of(*i).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Operator weight of `id`, if such an operator exists.
pub fn operator_weight_of(config: &RunConfiguration, id: &str) -> Option<f64> {
    config
        .operators
        .iter()
        .find(|o| config.id_of(**o) == id)
        .and_then(|o| match config.object(*o).kind {
            TargetKind::Operator { weight } => Some(weight),
            _ => None,
        })
}

/// File name and entries of the logger `id`.
pub fn logger_of(config: &RunConfiguration, id: &str) -> Option<(Option<String>, Vec<tobeast_core::TargetId>)> {
    config
        .loggers
        .iter()
        .find(|l| config.id_of(**l) == id)
        .and_then(|l| match &config.object(*l).kind {
            TargetKind::Logger(data) => Some((data.file_name.clone(), data.entries.clone())),
            _ => None,
        })
}
