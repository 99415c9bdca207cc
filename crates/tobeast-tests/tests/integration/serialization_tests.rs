use serde_json::{json, Value};
use tobeast_core::{lower_replicates, LoweringOptions, Registry};
use tobeast_model::ModelGraph;
use tobeast_tests::*;

fn rendered(graph: &ModelGraph) -> Value {
    let config = lower_default(graph).unwrap();
    serde_json::from_str(&config.to_json().unwrap()).unwrap()
}

#[test]
fn test_run_document_layout() {
    let doc = rendered(&coalescent_jc(10));
    let run = &doc["run"];

    assert_eq!(run["id"], json!("mcmc"));
    assert_eq!(run["chainLength"], json!(1_000_000));
    assert_eq!(run["preBurnin"], json!(100));
    assert_eq!(run["state"]["id"], json!("state"));
    assert_eq!(run["state"]["stateNode"][0]["id"], json!("theta"));
    assert_eq!(run["state"]["stateNode"][1]["id"], json!("psi"));
    assert_eq!(run["distribution"]["id"], json!("posterior"));
    assert_eq!(run["distribution"]["distribution"][0]["id"], json!("prior"));
    assert_eq!(run["distribution"]["distribution"][1]["id"], json!("likelihood"));
    assert_eq!(run["operator"].as_array().unwrap().len(), 8);
    assert_eq!(run["logger"].as_array().unwrap().len(), 3);
}

#[test]
fn test_state_nodes_are_referenced_after_first_use() {
    let doc = rendered(&coalescent_jc(10));
    let ops = doc["run"]["operator"].as_array().unwrap();
    let theta_scale = ops
        .iter()
        .find(|o| o["id"] == json!("theta.scale"))
        .unwrap();
    assert_eq!(theta_scale["parameter"], json!({ "idref": "theta" }));
    assert_eq!(theta_scale["scaleFactor"], json!(0.75));
}

#[test]
fn test_tree_logger_rendering() {
    let doc = rendered(&coalescent_jc(10));
    let tree_logger = &doc["run"]["logger"][2];
    assert_eq!(tree_logger["id"], json!("psi.treeLogger"));
    assert_eq!(tree_logger["fileName"], json!("model.trees"));
    assert_eq!(tree_logger["mode"], json!("tree"));
    assert_eq!(tree_logger["logEvery"], json!(500));
    assert_eq!(tree_logger["log"][0], json!({ "idref": "psi" }));
}

#[test]
fn test_output_is_deterministic() {
    let graph = coalescent_jc(8);
    let a = lower_default(&graph).unwrap().to_json().unwrap();
    let b = lower_default(&graph).unwrap().to_json().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_model_graph_survives_json() {
    let graph = dirichlet_hky(5);
    let text = serde_json::to_string(&graph).unwrap();
    let back: ModelGraph = serde_json::from_str(&text).unwrap();
    assert_eq!(back, graph);
    assert_eq!(
        lower_default(&back).unwrap().to_json().unwrap(),
        lower_default(&graph).unwrap().to_json().unwrap()
    );
}

#[test]
fn test_replicates_differ_only_in_file_names() {
    let options = LoweringOptions {
        replicates: 3,
        ..Default::default()
    };
    let runs = lower_replicates(&coalescent_jc(5), &Registry::with_defaults(), &options).unwrap();
    assert_eq!(runs.len(), 3);
    for (i, run) in runs.iter().enumerate() {
        assert_eq!(run.file_stem, format!("model_{}", i));
        let (file, _) = logger_of(run, "ParameterLogger").unwrap();
        assert_eq!(file, Some(format!("model_{}.log", i)));
        assert_eq!(run.operator_ids(), runs[0].operator_ids());
        assert_eq!(run.state_ids(), runs[0].state_ids());
    }
}

#[test]
fn test_rendered_ids_are_unique() {
    for graph in [
        poisson_count(),
        coalescent_jc(6),
        dirichlet_hky(5),
        hierarchical(&[true, false]),
        indicator_count(),
        relaxed_clock(5),
        local_clock(5),
        skyline_jc(5),
    ] {
        let doc = rendered(&graph);
        let ids = rendered_ids(&doc);
        let mut seen = rustc_hash::FxHashSet::default();
        for id in &ids {
            assert!(seen.insert(id.as_str()), "id {} rendered twice", id);
        }
    }
}

#[test]
fn test_coerced_count_keeps_its_prior() {
    let config = lower_default(&poisson_count()).unwrap();
    assert_eq!(config.state_ids(), vec!["k"]);
    let prior = compound_ids(&config, config.posterior.prior);
    assert_eq!(prior, vec!["k.prior"]);

    let k_prior = config
        .store
        .find("k.prior")
        .map(|t| config.object(t))
        .unwrap();
    let Some(tobeast_core::Input::Ref(x)) = k_prior.get_input("x") else {
        panic!("prior without x");
    };
    assert!(config.state.contains(x));
    assert_eq!(config.object(*x).spec, tobeast_core::specs::REAL_PARAMETER);

    let doc = rendered(&poisson_count());
    let state_k = &doc["run"]["state"]["stateNode"][0];
    assert_eq!(state_k["id"], json!("k"));
    assert_eq!(state_k["value"], json!([4.0]));
}
