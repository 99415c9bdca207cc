use tobeast_core::{lower, LoweringError, LoweringOptions, Registry};
use tobeast_model::{kinds, Generator, ModelError, ModelGraph, Payload, ValueId};
use tobeast_tests::*;

/// `x ~ IID(Exp(1), n)` with `x` holding `values`.
fn iid_model(n: i64, values: Vec<f64>) -> ModelGraph {
    let mut g = ModelGraph::new();
    let one = g.add_constant("one", Payload::Real(1.0)).unwrap();
    let count = g.add_constant("n", Payload::Integer(n)).unwrap();
    let base = g
        .add_generator(Generator::distribution(kinds::EXP).with_param("mean", one))
        .unwrap();
    let iid = g
        .add_generator(
            Generator::distribution(kinds::IID)
                .with_param("n", count)
                .with_component(base),
        )
        .unwrap();
    g.add_random("x", Payload::RealArray(values), iid).unwrap();
    g
}

fn tree_prior_model(kind: &str, params: &[(&str, f64)]) -> ModelGraph {
    let names = taxa(4);
    let mut g = ModelGraph::new();
    let mut gen = Generator::distribution(kind).with_supertype(kinds::TREE_DISTRIBUTION);
    for (name, x) in params {
        let v: ValueId = g.add_constant(name, Payload::Real(*x)).unwrap();
        gen = gen.with_param(*name, v);
    }
    let gen = g.add_generator(gen).unwrap();
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 1.0)), gen)
        .unwrap();
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q)]);
    g
}

#[test]
fn test_unknown_generator_kind() {
    let mut g = ModelGraph::new();
    let a = g.add_constant("a", Payload::Real(1.0)).unwrap();
    let gen = g
        .add_generator(Generator::distribution("Mystery").with_param("a", a))
        .unwrap();
    g.add_random("x", Payload::Real(0.5), gen).unwrap();

    assert_eq!(
        lower_default(&g).unwrap_err(),
        LoweringError::UnhandledGenerator("Mystery".into())
    );
}

#[test]
fn test_empty_registry_cannot_lower_values() {
    let err = lower(&coalescent_jc(4), &Registry::new(), &LoweringOptions::default()).unwrap_err();
    assert!(matches!(err, LoweringError::UnhandledValue { .. }));
}

#[test]
fn test_birth_death_needs_diversification_and_turnover() {
    let g = tree_prior_model(kinds::BIRTH_DEATH, &[("lambda", 1.0), ("mu", 0.5)]);
    assert!(matches!(
        lower_default(&g),
        Err(LoweringError::Unsupported { .. })
    ));

    let g = tree_prior_model(
        kinds::BIRTH_DEATH,
        &[("diversification", 1.0), ("turnover", 0.5)],
    );
    let config = lower_default(&g).unwrap();
    assert_eq!(compound_ids(&config, config.posterior.prior), vec!["psi.birthDeath"]);
}

#[test]
fn test_yule_tree_prior() {
    let config = lower_default(&tree_prior_model(kinds::YULE, &[("lambda", 2.0)])).unwrap();
    assert_eq!(compound_ids(&config, config.posterior.prior), vec!["psi.yule"]);
}

#[test]
fn test_iid_count_must_match_the_sampled_vector() {
    assert!(matches!(
        lower_default(&iid_model(3, vec![0.1, 0.2])),
        Err(LoweringError::DimensionMismatch { .. })
    ));

    let config = lower_default(&iid_model(3, vec![0.1, 0.2, 0.3])).unwrap();
    assert_eq!(compound_ids(&config, config.posterior.likelihood), vec!["x.prior"]);
}

#[test]
fn test_likelihood_tree_must_be_a_tree() {
    let names = taxa(4);
    let mut g = ModelGraph::new();
    let not_a_tree = g.add_constant("psi", Payload::Real(1.0)).unwrap();
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", not_a_tree), ("Q", q)]);
    assert!(matches!(
        lower_default(&g),
        Err(LoweringError::Coercion { .. })
    ));
}

#[test]
fn test_uniform_bounds_must_be_ordered() {
    let mut g = ModelGraph::new();
    let lower_bound = g.add_constant("lower", Payload::Real(2.0)).unwrap();
    let upper_bound = g.add_constant("upper", Payload::Real(1.0)).unwrap();
    let u = g
        .add_generator(
            Generator::distribution(kinds::UNIFORM)
                .with_param("lower", lower_bound)
                .with_param("upper", upper_bound),
        )
        .unwrap();
    g.add_random("x", Payload::Real(1.5), u).unwrap();
    assert!(matches!(
        lower_default(&g),
        Err(LoweringError::Unsupported { .. })
    ));
}

#[test]
fn test_slice_beyond_the_array() {
    let mut g = ModelGraph::new();
    let conc = g.add_constant("conc", Payload::RealArray(vec![1.0; 3])).unwrap();
    let dir = g
        .add_generator(Generator::distribution(kinds::DIRICHLET).with_param("concentration", conc))
        .unwrap();
    let pi = g
        .add_random("pi", Payload::RealArray(vec![0.2, 0.3, 0.5]), dir)
        .unwrap();
    let start = g.add_constant("start", Payload::Integer(2)).unwrap();
    let end = g.add_constant("end", Payload::Integer(4)).unwrap();
    let slice = g
        .add_generator(
            Generator::function(kinds::SLICE_DOUBLE_ARRAY)
                .with_param("array", pi)
                .with_param("start", start)
                .with_param("end", end),
        )
        .unwrap();
    let s = g
        .add_derived(Some("s"), Payload::RealArray(vec![0.5, 0.0, 0.0]), slice)
        .unwrap();
    let exp = g
        .add_generator(Generator::distribution(kinds::EXP).with_param("mean", s))
        .unwrap();
    g.add_random("y", Payload::RealArray(vec![1.0, 1.0, 1.0]), exp).unwrap();

    assert!(matches!(
        lower_default(&g),
        Err(LoweringError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_graph_rejects_dangling_inputs() {
    let mut g = ModelGraph::new();
    let err = g
        .add_generator(Generator::distribution(kinds::EXP).with_param("mean", ValueId(7)))
        .unwrap_err();
    assert_eq!(err, ModelError::UnknownValue(7));
}

#[test]
fn test_cyclic_wire_graph_is_rejected() {
    let data = tobeast_model::GraphData {
        generators: vec![
            Generator::distribution(kinds::EXP).with_param("mean", ValueId(0)),
            Generator::distribution(kinds::EXP).with_param("mean", ValueId(0)),
        ],
        values: vec![
            tobeast_model::Value::constant(Payload::Real(1.0))
                .named("a")
                .generated_by(tobeast_model::GeneratorId(0), true),
            tobeast_model::Value::constant(Payload::Real(2.0))
                .named("b")
                .generated_by(tobeast_model::GeneratorId(1), true),
        ],
    };
    let text = serde_json::to_string(&data).unwrap();
    assert!(serde_json::from_str::<ModelGraph>(&text).is_err());

    let err = ModelGraph::try_from(data).unwrap_err();
    assert_eq!(err, ModelError::Cycle("a".into()));
    assert!(matches!(LoweringError::from(err), LoweringError::InvalidModel(_)));
}
