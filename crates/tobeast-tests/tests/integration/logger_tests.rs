use tobeast_core::engine::target::LogMode;
use tobeast_core::{specs, LoweringOptions, Registry, TargetKind};
use tobeast_model::{kinds, Generator, ModelGraph, Payload};
use tobeast_tests::*;

/// Two trees under one shared population size, each with its own alignment.
fn two_tree_model() -> ModelGraph {
    let mut g = ModelGraph::new();
    let theta = log_normal(&mut g, "theta", 3.0, 1.0, Payload::Real(20.0));
    let q = jukes_cantor(&mut g);
    for (tree, data, n) in [("psi1", "D1", 5), ("psi2", "D2", 6)] {
        let names = taxa(n);
        let coal = g
            .add_generator(Generator::distribution(kinds::COALESCENT).with_param("theta", theta))
            .unwrap();
        let psi = g
            .add_random(tree, Payload::Tree(ladder_tree(&names, 4.0)), coal)
            .unwrap();
        observed_ctmc(&mut g, data, &names, &[("tree", psi), ("Q", q)]);
    }
    g
}

#[test]
fn test_default_logger_layout() {
    let config = lower_default(&coalescent_jc(10)).unwrap();
    assert_eq!(
        config.logger_ids(),
        vec!["ScreenLogger", "ParameterLogger", "psi.treeLogger"]
    );

    let (file, entries) = logger_of(&config, "ScreenLogger").unwrap();
    assert_eq!(file, None);
    assert_eq!(
        &entries[..3],
        &[
            config.posterior.posterior,
            config.posterior.likelihood,
            config.posterior.prior
        ]
    );

    let (file, _) = logger_of(&config, "ParameterLogger").unwrap();
    assert_eq!(file.as_deref(), Some("model.log"));

    let (file, entries) = logger_of(&config, "psi.treeLogger").unwrap();
    assert_eq!(file.as_deref(), Some("model.trees"));
    assert_eq!(entries, vec![config.state[1]]);
}

#[test]
fn test_sampling_intervals_follow_chain_length() {
    let options = LoweringOptions {
        chain_length: 2_000_000,
        ..Default::default()
    };
    let config = tobeast_core::lower(&coalescent_jc(4), &Registry::with_defaults(), &options).unwrap();
    for id in ["ScreenLogger", "ParameterLogger", "psi.treeLogger"] {
        let logger = config
            .loggers
            .iter()
            .copied()
            .find(|l| config.id_of(*l) == id)
            .unwrap();
        let every = match &config.object(logger).kind {
            TargetKind::Logger(data) => data.log_every,
            other => panic!("unexpected {:?}", other),
        };
        let expected = if id == "ScreenLogger" { 100_000 } else { 1000 };
        assert_eq!(every, expected, "{}", id);
    }
}

#[test]
fn test_parameter_log_holds_tree_statistics_and_likelihoods() {
    let config = lower_default(&coalescent_jc(6)).unwrap();
    let (_, entries) = logger_of(&config, "ParameterLogger").unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| config.id_of(*e)).collect();
    assert!(ids.contains(&"theta"));
    assert!(ids.contains(&"psi.treeStats"));
    assert!(ids.contains(&"D.treeLikelihood"));
    // trees go to their own logs
    assert!(!ids.contains(&"psi"));
}

#[test]
fn test_two_trees_get_distinct_files() {
    let config = lower_default(&two_tree_model()).unwrap();

    assert_eq!(
        config.logger_ids(),
        vec![
            "ScreenLogger",
            "ParameterLogger",
            "psi1.treeLogger",
            "psi2.treeLogger"
        ]
    );
    let (f1, _) = logger_of(&config, "psi1.treeLogger").unwrap();
    let (f2, _) = logger_of(&config, "psi2.treeLogger").unwrap();
    assert_eq!(f1.as_deref(), Some("model_psi1.trees"));
    assert_eq!(f2.as_deref(), Some("model_psi2.trees"));
}

#[test]
fn test_screen_log_has_no_trees() {
    let config = lower_default(&two_tree_model()).unwrap();
    let (_, entries) = logger_of(&config, "ScreenLogger").unwrap();
    for e in entries {
        let obj = config.object(e);
        assert!(!obj.is_tree());
        assert_ne!(obj.spec, specs::TREE_STAT_LOGGER);
    }

    let (_, entries) = logger_of(&config, "ParameterLogger").unwrap();
    let stats = entries
        .iter()
        .filter(|e| config.object(**e).spec == specs::TREE_STAT_LOGGER)
        .count();
    assert_eq!(stats, 2);
}

#[test]
fn test_tree_loggers_are_in_tree_mode() {
    let config = lower_default(&two_tree_model()).unwrap();
    for l in &config.loggers[2..] {
        match &config.object(*l).kind {
            TargetKind::Logger(data) => assert_eq!(data.mode, LogMode::Tree),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn test_file_stem_names_every_output() {
    let options = LoweringOptions {
        file_stem: "run1".into(),
        ..Default::default()
    };
    let config = tobeast_core::lower(&two_tree_model(), &Registry::with_defaults(), &options).unwrap();
    let (f, _) = logger_of(&config, "ParameterLogger").unwrap();
    assert_eq!(f.as_deref(), Some("run1.log"));
    let (f, _) = logger_of(&config, "psi2.treeLogger").unwrap();
    assert_eq!(f.as_deref(), Some("run1_psi2.trees"));
}

#[test]
fn test_skyline_trees_log_branch_metadata() {
    let config = lower_default(&skyline_jc(5)).unwrap();
    let (file, entries) = logger_of(&config, "psi.treeLogger").unwrap();
    assert_eq!(file.as_deref(), Some("model.trees"));
    assert_eq!(entries.len(), 1);
    assert_eq!(config.id_of(entries[0]), "psi.metadataLogger");
    let metadata = config.object(entries[0]);
    assert_eq!(metadata.spec, specs::METADATA_TREE_LOGGER);
    assert_eq!(
        metadata.get_input("tree"),
        Some(&tobeast_core::Input::Ref(config.state[1]))
    );
}

#[test]
fn test_relaxed_clock_rates_are_summarised_in_the_parameter_log() {
    let config = lower_default(&relaxed_clock(5)).unwrap();
    let (_, entries) = logger_of(&config, "ParameterLogger").unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| config.id_of(*e)).collect();
    assert!(ids.contains(&"branchRates.rateStat"));
    assert!(ids.contains(&"D.treeLikelihood"));
    let (_, screen) = logger_of(&config, "ScreenLogger").unwrap();
    assert!(screen.iter().all(|e| config.id_of(*e) != "branchRates.rateStat"));
}
