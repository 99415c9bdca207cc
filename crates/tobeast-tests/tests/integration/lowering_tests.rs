use tobeast_core::engine::operators::operator_weight;
use tobeast_core::{Input, TargetKind};
use tobeast_model::{kinds, Generator, Payload};
use tobeast_tests::*;

#[test]
fn test_coalescent_model_state_and_operators() {
    let config = lower_default(&coalescent_jc(10)).unwrap();

    assert_eq!(config.state_ids(), vec!["theta", "psi"]);
    assert_eq!(
        config.operator_ids(),
        vec![
            "psi.narrowExchange",
            "psi.rootAgeScale",
            "psi.scale",
            "psi.subtreeSlide",
            "psi.uniform",
            "psi.wideExchange",
            "psi.wilsonBalding",
            "theta.scale",
        ]
    );

    // nine internal nodes
    let w = operator_weight_of(&config, "psi.scale").unwrap();
    assert!((w - 9f64.powf(0.7)).abs() < 1e-12);
    assert_eq!(operator_weight_of(&config, "psi.rootAgeScale"), Some(1.0));
    assert_eq!(operator_weight_of(&config, "theta.scale"), Some(1.0));
}

#[test]
fn test_coalescent_model_posterior() {
    let config = lower_default(&coalescent_jc(10)).unwrap();

    assert_eq!(
        compound_ids(&config, config.posterior.prior),
        vec!["theta.prior", "psi.coalescent"]
    );
    assert_eq!(
        compound_ids(&config, config.posterior.likelihood),
        vec!["D.treeLikelihood"]
    );
    assert_eq!(
        compound_ids(&config, config.posterior.posterior),
        vec!["prior", "likelihood"]
    );
}

#[test]
fn test_coalescent_model_run_settings() {
    let config = lower_default(&coalescent_jc(10)).unwrap();

    assert_eq!(config.chain_length, 1_000_000);
    // (1 theta + 9 internal nodes) x 10
    assert_eq!(config.pre_burnin, 100);
    assert_eq!(config.file_stem, "model");
}

#[test]
fn test_theta_is_bounded_by_its_log_normal_prior() {
    let config = lower_default(&coalescent_jc(5)).unwrap();
    let theta = config.state[0];
    match &config.object(theta).kind {
        TargetKind::RealParameter(p) => {
            assert_eq!(p.values, vec![20.0]);
            assert_eq!(p.lower, Some(0.0));
            assert!(p.estimate);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_dirichlet_frequencies_use_delta_exchange() {
    let config = lower_default(&dirichlet_hky(6)).unwrap();

    assert_eq!(config.state_ids(), vec!["kappa", "pi"]);
    assert_eq!(config.operator_ids(), vec!["kappa.scale", "pi.deltaExchange"]);

    let delta = config
        .operators
        .iter()
        .copied()
        .find(|o| config.id_of(*o) == "pi.deltaExchange")
        .unwrap();
    assert_eq!(config.object(delta).get_input("delta"), Some(&Input::Real(0.25)));
    let w = operator_weight_of(&config, "pi.deltaExchange").unwrap();
    assert!((w - operator_weight(4)).abs() < 1e-12);
}

#[test]
fn test_fixed_tree_is_not_state() {
    let config = lower_default(&dirichlet_hky(6)).unwrap();
    assert!(!config.state_ids().contains(&"psi"));
    assert!(config.operator_ids().iter().all(|id| !id.starts_with("psi.")));
    // no estimated tree, no tree logger
    assert_eq!(config.logger_ids(), vec!["ScreenLogger", "ParameterLogger"]);
}

#[test]
fn test_clamped_values_and_sinks_are_not_state() {
    let config = lower_default(&hierarchical(&[true, false, true])).unwrap();

    assert_eq!(config.state_ids(), vec!["x0", "x1", "x2"]);
    assert_eq!(
        compound_ids(&config, config.posterior.likelihood),
        vec!["y0.prior", "y1.prior", "y2.prior"]
    );
    assert_eq!(
        compound_ids(&config, config.posterior.prior),
        vec!["x0.prior", "x1.prior", "x2.prior"]
    );
}

#[test]
fn test_random_clock_rate_adds_up_down_operator() {
    let names = taxa(10);
    let mut g = tobeast_model::ModelGraph::new();
    let theta = log_normal(&mut g, "theta", 3.0, 1.0, Payload::Real(20.0));
    let coal = g
        .add_generator(Generator::distribution(kinds::COALESCENT).with_param("theta", theta))
        .unwrap();
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 10.0)), coal)
        .unwrap();
    let mu = log_normal(&mut g, "mu", 0.0, 1.0, Payload::Real(1.0));
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q), ("mu", mu)]);

    let config = lower_default(&g).unwrap();
    let ups: Vec<&str> = config
        .operator_ids()
        .into_iter()
        .filter(|id| id.contains("Up"))
        .collect();
    assert_eq!(ups, vec!["muUppsiDownOperator"]);
    let w = operator_weight_of(&config, "muUppsiDownOperator").unwrap();
    assert!((w - operator_weight(10)).abs() < 1e-12);
    assert!(config.operator_ids().contains(&"mu.scale"));
}

#[test]
fn test_constant_clock_rate_adds_no_up_down_operator() {
    let names = taxa(4);
    let mut g = tobeast_model::ModelGraph::new();
    let theta = log_normal(&mut g, "theta", 3.0, 1.0, Payload::Real(20.0));
    let coal = g
        .add_generator(Generator::distribution(kinds::COALESCENT).with_param("theta", theta))
        .unwrap();
    let psi = g
        .add_random("psi", Payload::Tree(ladder_tree(&names, 3.0)), coal)
        .unwrap();
    let mu = g.add_constant("mu", Payload::Real(0.5)).unwrap();
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q), ("mu", mu)]);

    let config = lower_default(&g).unwrap();
    assert!(config.operator_ids().iter().all(|id| !id.contains("Up")));
}

#[test]
fn test_weighted_dirichlet_is_split_into_elements() {
    let mut g = tobeast_model::ModelGraph::new();
    let conc = g.add_constant("conc", Payload::RealArray(vec![1.0; 3])).unwrap();
    let weights = g
        .add_constant("weights", Payload::IntegerArray(vec![100, 200, 300]))
        .unwrap();
    let wd = g
        .add_generator(
            Generator::distribution(kinds::WEIGHTED_DIRICHLET)
                .with_param("conc", conc)
                .with_param("weights", weights),
        )
        .unwrap();
    let w = g
        .add_random("w", Payload::RealArray(vec![0.2, 0.3, 0.5]), wd)
        .unwrap();
    let zero = g.add_constant("zero", Payload::Integer(0)).unwrap();
    let slice = g
        .add_generator(
            Generator::function(kinds::SLICE_DOUBLE_ARRAY)
                .with_param("array", w)
                .with_param("start", zero)
                .with_param("end", zero),
        )
        .unwrap();
    let r = g.add_derived(Some("r"), Payload::Real(0.2), slice).unwrap();
    let exp = g
        .add_generator(Generator::distribution(kinds::EXP).with_param("mean", r))
        .unwrap();
    g.add_random("y", Payload::Real(0.1), exp).unwrap();

    let config = lower_default(&g).unwrap();
    assert_eq!(config.state_ids(), vec!["w_0", "w_1", "w_2"]);
    assert_eq!(config.operator_ids(), vec!["w.deltaExchange"]);

    let y_prior = config.store.find("y.prior").unwrap();
    let distr = match config.object(y_prior).get_input("distr") {
        Some(Input::Ref(d)) => *d,
        other => panic!("unexpected {:?}", other),
    };
    let mean = match config.object(distr).get_input("mean") {
        Some(Input::Ref(m)) => *m,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(config.id_of(mean), "w_0");
}

#[test]
fn test_pre_burnin_override() {
    let options = tobeast_core::LoweringOptions {
        pre_burnin: 0,
        chain_length: -5,
        ..Default::default()
    };
    let config = tobeast_core::lower(
        &coalescent_jc(4),
        &tobeast_core::Registry::with_defaults(),
        &options,
    )
    .unwrap();
    assert_eq!(config.pre_burnin, 0);
    assert_eq!(config.chain_length, 1_000_000);
}

#[test]
fn test_up_down_weight_uses_internal_nodes_plus_one() {
    assert!((operator_weight(9 + 1) - 10f64.powf(0.7)).abs() < 1e-12);
}

fn ref_of(config: &tobeast_core::RunConfiguration, target: tobeast_core::TargetId, name: &str) -> tobeast_core::TargetId {
    match config.object(target).get_input(name) {
        Some(Input::Ref(t)) => *t,
        other => panic!("{} is {:?}", name, other),
    }
}

#[test]
fn test_boolean_state_gets_bit_flip() {
    let config = lower_default(&local_clock(6)).unwrap();

    assert_eq!(config.state_ids(), vec!["theta", "psi", "indicators", "rates"]);
    assert!(config.operator_ids().contains(&"indicators.bitFlip"));
    let flip = config.store.find("indicators.bitFlip").unwrap();
    assert_eq!(config.object(flip).spec, tobeast_core::specs::BIT_FLIP);
    let w = operator_weight_of(&config, "indicators.bitFlip").unwrap();
    assert!((w - operator_weight(10)).abs() < 1e-12);
}

#[test]
fn test_local_branch_rates_drive_the_likelihood() {
    let config = lower_default(&local_clock(6)).unwrap();

    let likelihood = config.store.find("D.treeLikelihood").unwrap();
    let clock = ref_of(&config, likelihood, "branchRateModel");
    assert_eq!(config.object(clock).spec, tobeast_core::specs::RANDOM_LOCAL_CLOCK);
    assert_eq!(config.id_of(ref_of(&config, clock, "indicators")), "indicators");
    assert_eq!(config.id_of(ref_of(&config, clock, "rates")), "rates");
    assert_eq!(config.id_of(ref_of(&config, clock, "tree")), "psi");
    assert!(config
        .operator_ids()
        .iter()
        .all(|id| !id.starts_with("branchRates")));
    assert_eq!(
        compound_ids(&config, config.posterior.prior),
        vec!["theta.prior", "psi.coalescent", "indicators.bernoulli", "rates.prior"]
    );
}

#[test]
fn test_hamming_weight_prior_moves_onto_the_indicators() {
    let config = lower_default(&indicator_count()).unwrap();

    assert_eq!(config.state_ids(), vec!["I"]);
    assert_eq!(config.operator_ids(), vec!["I.bitFlip"]);
    assert_eq!(compound_ids(&config, config.posterior.prior), vec!["I.prior"]);

    let prior = config.store.find("I.prior").unwrap();
    let sum = ref_of(&config, prior, "x");
    assert_eq!(config.object(sum).spec, tobeast_core::specs::SUM);
    assert_eq!(ref_of(&config, sum, "arg"), config.state[0]);
    let distr = ref_of(&config, prior, "distr");
    assert_eq!(config.object(distr).spec, tobeast_core::specs::POISSON);

    let doc: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
    let ids = rendered_ids(&doc);
    assert!(ids.iter().any(|id| id == "I.prior"));
    assert!(!ids.iter().any(|id| id == "S" || id == "S.prior"));
}

#[test]
fn test_relaxed_clock_gets_distance_operators() {
    let config = lower_default(&relaxed_clock(6)).unwrap();

    assert_eq!(config.state_ids(), vec!["theta", "psi", "branchRates"]);
    let clock_ops: Vec<&str> = config
        .operator_ids()
        .into_iter()
        .filter(|id| id.starts_with("branchRates"))
        .collect();
    assert_eq!(
        clock_ops,
        vec![
            "branchRates.bigPulley",
            "branchRates.inConstantDistance",
            "branchRates.scale",
            "branchRates.simpleDistance",
            "branchRates.smallPulley",
        ]
    );
    // six leaves and five internal nodes
    let w = operator_weight_of(&config, "branchRates.inConstantDistance").unwrap();
    assert!((w - operator_weight(11)).abs() < 1e-12);
    let w = operator_weight_of(&config, "branchRates.smallPulley").unwrap();
    assert!((w - operator_weight(2)).abs() < 1e-12);

    let likelihood = config.store.find("D.treeLikelihood").unwrap();
    let clock = ref_of(&config, likelihood, "branchRateModel");
    let distance = config.store.find("branchRates.inConstantDistance").unwrap();
    assert_eq!(ref_of(&config, distance, "clockModel"), clock);
    assert_eq!(config.object(distance).get_input("twindowSize"), Some(&Input::Real(1.0)));
}

#[test]
fn test_markov_chain_first_value_is_a_view_of_the_chain() {
    let config = lower_default(&skyline_jc(5)).unwrap();

    assert_eq!(config.state_ids(), vec!["theta", "psi"]);
    let prior = config.store.find("theta0.prior").unwrap();
    let first = ref_of(&config, prior, "x");
    assert_eq!(
        config.object(first).kind,
        TargetKind::Slice {
            source: config.state[0],
            index: 0,
            count: 1
        }
    );
    let mut priors = compound_ids(&config, config.posterior.prior);
    priors.sort();
    assert_eq!(priors, vec!["psi.skyline", "theta.markovChain", "theta0.prior"]);
    assert!(config.operator_ids().contains(&"theta.scale"));
    assert!(!config.operator_ids().contains(&"theta0.scale"));
}
