use tobeast_core::{Input, LoweringError, TargetKind};
use tobeast_ext::{mascot, sa};
use tobeast_model::{kinds, Generator, ModelGraph, Payload};
use tobeast_tests::*;

fn fossil_model(kind: &str, ntaxa: usize) -> ModelGraph {
    let names = taxa(ntaxa);
    let mut g = ModelGraph::new();
    let lambda = g.add_constant("lambda", Payload::Real(1.0)).unwrap();
    let mu = g.add_constant("mu", Payload::Real(0.5)).unwrap();
    let rho = g.add_constant("rho", Payload::Real(0.8)).unwrap();
    let psi = g.add_constant("samplingRate", Payload::Real(0.2)).unwrap();
    let fbd = g
        .add_generator(
            Generator::distribution(kind)
                .with_supertype(kinds::TREE_DISTRIBUTION)
                .with_param("lambda", lambda)
                .with_param("mu", mu)
                .with_param("rho", rho)
                .with_param("psi", psi),
        )
        .unwrap();
    let tree = g
        .add_random("tree", Payload::Tree(ladder_tree(&names, 6.0)), fbd)
        .unwrap();
    let q = jukes_cantor(&mut g);
    observed_ctmc(&mut g, "D", &names, &[("tree", tree), ("Q", q)]);
    g
}

struct MascotModel {
    demes: Vec<&'static str>,
    rates: Vec<f64>,
    sort: bool,
}

impl Default for MascotModel {
    fn default() -> Self {
        MascotModel {
            demes: vec!["b", "a", "b", "a"],
            rates: vec![0.1, 0.2],
            sort: true,
        }
    }
}

impl MascotModel {
    fn build(&self) -> ModelGraph {
        let names = taxa(4);
        let mut g = ModelGraph::new();
        let theta = log_normal(&mut g, "Theta", 0.0, 1.0, Payload::RealArray(vec![1.0, 2.0]));
        let mean = g.add_constant("mean", Payload::Real(1.0)).unwrap();
        let exp = g
            .add_generator(Generator::distribution(kinds::EXP).with_param("mean", mean))
            .unwrap();
        let m = g
            .add_random("m", Payload::RealArray(self.rates.clone()), exp)
            .unwrap();
        let mm = g
            .add_generator(
                Generator::function(kinds::MIGRATION_MATRIX)
                    .with_param("theta", theta)
                    .with_param("m", m),
            )
            .unwrap();
        let matrix = g
            .add_derived(Some("M"), Payload::RealMatrix(vec![vec![0.0; 2]; 2]), mm)
            .unwrap();
        let demes = g
            .add_constant(
                "demes",
                Payload::TextArray(self.demes.iter().map(|d| d.to_string()).collect()),
            )
            .unwrap();
        let sort = g.add_constant("sort", Payload::Boolean(self.sort)).unwrap();
        let sc = g
            .add_generator(
                Generator::distribution(kinds::STRUCTURED_COALESCENT)
                    .with_param("M", matrix)
                    .with_param("demes", demes)
                    .with_param("sort", sort),
            )
            .unwrap();
        let psi = g
            .add_random("psi", Payload::Tree(ladder_tree(&names, 2.0)), sc)
            .unwrap();
        let q = jukes_cantor(&mut g);
        observed_ctmc(&mut g, "D", &names, &[("tree", psi), ("Q", q)]);
        g
    }
}

fn keys_of(config: &tobeast_core::RunConfiguration, id: &str) -> Option<Vec<String>> {
    let t = config.store.find(id)?;
    match &config.object(t).kind {
        TargetKind::RealParameter(p) => p.keys.clone(),
        _ => None,
    }
}

#[test]
fn test_sim_fbd_age_adds_origin_state() {
    let config = lower_full(&fossil_model(kinds::SIM_FBD_AGE, 6)).unwrap();

    assert_eq!(config.state_ids(), vec!["tree", "tree.origin"]);
    assert_eq!(
        config.operator_ids(),
        vec![
            "tree.leafToSA",
            "tree.narrowExchange",
            "tree.origin.scale",
            "tree.rootAgeScale",
            "tree.scale",
            "tree.uniform",
            "tree.wideExchange",
            "tree.wilsonBalding",
        ]
    );
    // five internal nodes plus the origin
    assert_eq!(config.pre_burnin, 60);

    let origin = config.store.find(&sa::origin_id("tree")).unwrap();
    assert_eq!(config.object(origin).real_values(), Some(vec![6.0 + 6.0]));
}

#[test]
fn test_sim_fbd_age_model_conditions_on_origin() {
    let config = lower_full(&fossil_model(kinds::SIM_FBD_AGE, 6)).unwrap();
    assert_eq!(
        compound_ids(&config, config.posterior.prior),
        vec!["tree.saBirthDeath"]
    );
    let model = config.store.find("tree.saBirthDeath").unwrap();
    let origin = config.store.find("tree.origin").unwrap();
    let obj = config.object(model);
    assert_eq!(obj.spec, sa::SA_BIRTH_DEATH);
    assert_eq!(obj.get_input("origin"), Some(&Input::Ref(origin)));
    assert_eq!(obj.get_input("removalProbability"), Some(&Input::Real(0.0)));
    assert_eq!(obj.get_input("conditionOnRoot"), None);
}

#[test]
fn test_fossil_birth_death_tree_conditions_on_root() {
    let config = lower_full(&fossil_model(kinds::FOSSIL_BIRTH_DEATH_TREE, 5)).unwrap();
    assert_eq!(config.state_ids(), vec!["tree"]);
    assert!(config.store.find("tree.origin").is_none());

    let model = config.store.find("tree.saBirthDeath").unwrap();
    let obj = config.object(model);
    assert_eq!(obj.get_input("conditionOnRoot"), Some(&Input::Boolean(true)));
    assert_eq!(obj.get_input("conditionOnSampling"), Some(&Input::Boolean(true)));
}

#[test]
fn test_sampled_ancestor_trees_never_get_subtree_slide() {
    let config = lower_full(&fossil_model(kinds::FOSSIL_BIRTH_DEATH_TREE, 5)).unwrap();
    assert!(config.operator_ids().contains(&"tree.leafToSA"));
    assert!(!config.operator_ids().contains(&"tree.subtreeSlide"));
}

#[test]
fn test_ordinary_trees_keep_the_default_strategy_with_extensions_loaded() {
    let config = lower_full(&coalescent_jc(5)).unwrap();
    assert!(config.operator_ids().contains(&"psi.subtreeSlide"));
    assert!(!config.operator_ids().contains(&"psi.leafToSA"));
}

#[test]
fn test_mascot_keys_parameters_by_deme() {
    let config = lower_full(&MascotModel::default().build()).unwrap();

    assert_eq!(config.state_ids(), vec!["Theta", "m", "psi"]);
    assert_eq!(keys_of(&config, "Theta"), Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(
        keys_of(&config, "m"),
        Some(vec!["a_b".to_string(), "b_a".to_string()])
    );
}

#[test]
fn test_mascot_distribution_and_loggers() {
    let config = lower_full(&MascotModel::default().build()).unwrap();

    assert_eq!(
        compound_ids(&config, config.posterior.prior),
        vec!["Theta.prior", "m.prior", "psi.mascot"]
    );
    assert_eq!(
        config.logger_ids(),
        vec![
            "ScreenLogger",
            "ParameterLogger",
            "psi.treeLogger",
            "StructuredTreeLoggerpsi"
        ]
    );

    let (file, entries) = logger_of(&config, "StructuredTreeLoggerpsi").unwrap();
    assert_eq!(file.as_deref(), Some("model.mascot.trees"));
    assert_eq!(config.object(entries[0]).spec, mascot::STRUCTURED_TREE_LOGGER);

    // branch metadata is logged through a metadata logger
    let (_, entries) = logger_of(&config, "psi.treeLogger").unwrap();
    assert_eq!(config.id_of(entries[0]), "psi.metadataLogger");

    let (_, entries) = logger_of(&config, "ParameterLogger").unwrap();
    assert!(entries.iter().any(|e| config.id_of(*e) == "psi.mascot"));
}

#[test]
fn test_mascot_rejects_unsorted_demes() {
    let model = MascotModel {
        sort: false,
        ..Default::default()
    };
    assert!(matches!(
        lower_full(&model.build()),
        Err(LoweringError::Unsupported { .. })
    ));
}

#[test]
fn test_mascot_rejects_demes_not_matching_taxa() {
    let model = MascotModel {
        demes: vec!["a", "b", "a"],
        ..Default::default()
    };
    assert!(matches!(
        lower_full(&model.build()),
        Err(LoweringError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_mascot_rejects_migration_rates_of_the_wrong_size() {
    let model = MascotModel {
        rates: vec![0.1, 0.2, 0.3],
        ..Default::default()
    };
    assert!(matches!(
        lower_full(&model.build()),
        Err(LoweringError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_structured_coalescent_needs_its_bundle() {
    assert_eq!(
        lower_default(&MascotModel::default().build()).unwrap_err(),
        LoweringError::UnhandledGenerator(kinds::STRUCTURED_COALESCENT.to_string())
    );
}
