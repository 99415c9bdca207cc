//! # JSON Rendering
//!
//! Renders a [`RunConfiguration`] as a JSON document. Objects are emitted
//! depth-first from the run root: inline with their `id` the first time they
//! are reached, as `{"idref": id}` afterwards. Anonymous objects reached more
//! than once receive a generated `{SimpleName}.{n}` identifier first, so the
//! output is byte-identical for identical inputs.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Map, Value};

use crate::engine::run::RunConfiguration;
use crate::engine::target::{Input, LogMode, Parameter, TargetId, TargetKind, TargetStore};
use crate::specs;

struct Renderer<'a> {
    store: &'a TargetStore,
    names: FxHashMap<TargetId, String>,
    emitted: FxHashSet<TargetId>,
}

impl<'a> Renderer<'a> {
    fn new(store: &'a TargetStore, roots: &[TargetId]) -> Self {
        let mut renderer = Renderer {
            store,
            names: FxHashMap::default(),
            emitted: FxHashSet::default(),
        };
        renderer.assign_names(roots);
        renderer
    }

    /// Names every object: its own id, or a generated one when an anonymous
    /// object is referenced more than once.
    fn assign_names(&mut self, roots: &[TargetId]) {
        let mut order = Vec::new();
        let mut refs: FxHashMap<TargetId, usize> = FxHashMap::default();
        let mut seen = FxHashSet::default();
        let mut stack: Vec<TargetId> = roots.iter().rev().copied().collect();
        for r in roots {
            *refs.entry(*r).or_default() += 1;
        }
        while let Some(t) = stack.pop() {
            if !seen.insert(t) {
                continue;
            }
            order.push(t);
            let children = self.store.get(t).references();
            for c in &children {
                *refs.entry(*c).or_default() += 1;
            }
            stack.extend(children.into_iter().rev());
        }
        let mut counters: FxHashMap<String, usize> = FxHashMap::default();
        for t in order {
            let obj = self.store.get(t);
            match obj.id() {
                Some(id) => {
                    self.names.insert(t, id.to_string());
                }
                None if refs.get(&t).copied().unwrap_or(0) > 1 => {
                    let simple = specs::simple_name(&obj.spec).to_string();
                    let n = counters.entry(simple.clone()).or_default();
                    *n += 1;
                    self.names.insert(t, format!("{}.{}", simple, n));
                }
                None => {}
            }
        }
    }

    fn render(&mut self, t: TargetId) -> Value {
        let name = self.names.get(&t).cloned();
        if let Some(name) = &name {
            if self.emitted.contains(&t) {
                return json!({ "idref": name });
            }
        }
        self.emitted.insert(t);
        let obj = self.store.get(t);
        let mut map = Map::new();
        if let Some(name) = name {
            map.insert("id".into(), Value::String(name));
        }
        map.insert("spec".into(), Value::String(obj.spec.clone()));
        match &obj.kind {
            TargetKind::RealParameter(p) => render_parameter(&mut map, p),
            TargetKind::IntegerParameter(p) => render_parameter(&mut map, p),
            TargetKind::BooleanParameter(p) => render_parameter(&mut map, p),
            TargetKind::Tree(tree) => {
                map.insert("newick".into(), json!(tree.newick));
                map.insert("taxa".into(), json!(tree.taxa));
                map.insert("internalNodeCount".into(), json!(tree.internal_nodes));
            }
            TargetKind::Alignment(data) => {
                map.insert("dataType".into(), json!(data.datatype));
                if let Some(n) = data.state_count {
                    map.insert("stateCount".into(), json!(n));
                }
                let seqs: Vec<Value> = data
                    .sequences
                    .iter()
                    .map(|(taxon, seq)| json!({ "taxon": taxon, "value": seq }))
                    .collect();
                map.insert("sequence".into(), Value::Array(seqs));
            }
            TargetKind::Concatenate(parts) | TargetKind::Vector(parts) => {
                let items = self.render_all(parts);
                map.insert("arg".into(), items);
            }
            TargetKind::Slice {
                source,
                index,
                count,
            } => {
                let source = self.render(*source);
                map.insert("arg".into(), source);
                map.insert("index".into(), json!(index));
                map.insert("count".into(), json!(count));
            }
            TargetKind::CompoundDistribution(items) => {
                let items = self.render_all(items);
                map.insert("distribution".into(), items);
            }
            TargetKind::Operator { weight } => {
                map.insert("weight".into(), json!(weight));
            }
            TargetKind::Logger(data) => {
                if let Some(file) = &data.file_name {
                    map.insert("fileName".into(), json!(file));
                }
                map.insert("logEvery".into(), json!(data.log_every));
                if data.mode == LogMode::Tree {
                    map.insert("mode".into(), json!("tree"));
                }
                let entries = self.render_all(&data.entries);
                map.insert("log".into(), entries);
            }
            TargetKind::Distribution | TargetKind::Object => {}
        }
        for (key, input) in &obj.inputs {
            let value = match input {
                Input::Ref(r) => self.render(*r),
                Input::Refs(rs) => self.render_all(rs),
                Input::Real(x) => json!(x),
                Input::Integer(x) => json!(x),
                Input::Boolean(x) => json!(x),
                Input::Text(x) => json!(x),
                Input::Reals(xs) => json!(xs),
            };
            map.insert(key.clone(), value);
        }
        Value::Object(map)
    }

    fn render_all(&mut self, items: &[TargetId]) -> Value {
        Value::Array(items.iter().map(|i| self.render(*i)).collect())
    }
}

fn render_parameter<T: serde::Serialize>(map: &mut Map<String, Value>, p: &Parameter<T>) {
    map.insert("value".into(), json!(p.values));
    if let Some(l) = &p.lower {
        map.insert("lower".into(), json!(l));
    }
    if let Some(u) = &p.upper {
        map.insert("upper".into(), json!(u));
    }
    if let Some(keys) = &p.keys {
        map.insert("keys".into(), json!(keys));
    }
    if let Some(m) = p.minor_dimension {
        map.insert("minordimension".into(), json!(m));
    }
    map.insert("estimate".into(), json!(p.estimate));
}

/// JSON document for a run configuration.
pub fn to_json_value(config: &RunConfiguration) -> Value {
    let mut roots = config.state.clone();
    roots.push(config.posterior.posterior);
    roots.extend(config.operators.iter().copied());
    roots.extend(config.loggers.iter().copied());
    let mut r = Renderer::new(&config.store, &roots);

    let state: Vec<Value> = config.state.iter().map(|s| r.render(*s)).collect();
    let posterior = r.render(config.posterior.posterior);
    let operators: Vec<Value> = config.operators.iter().map(|o| r.render(*o)).collect();
    let loggers: Vec<Value> = config.loggers.iter().map(|l| r.render(*l)).collect();
    json!({
        "run": {
            "id": "mcmc",
            "spec": specs::MCMC,
            "chainLength": config.chain_length,
            "preBurnin": config.pre_burnin,
            "state": {
                "id": "state",
                "spec": specs::STATE,
                "stateNode": state,
            },
            "distribution": posterior,
            "operator": operators,
            "logger": loggers,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::posterior::Posterior;
    use crate::engine::target::TargetObject;

    #[test]
    fn shared_anonymous_objects_get_generated_ids() {
        let mut store = TargetStore::new();
        let shared = store.add(TargetObject::new(
            specs::REAL_PARAMETER,
            TargetKind::RealParameter(Parameter::new(vec![1.0], false)),
        ));
        let a = store.add(
            TargetObject::new(specs::PRIOR, TargetKind::Distribution)
                .with_id("a")
                .input("x", Input::Ref(shared)),
        );
        let b = store.add(
            TargetObject::new(specs::PRIOR, TargetKind::Distribution)
                .with_id("b")
                .input("x", Input::Ref(shared)),
        );
        let prior = store.add(
            TargetObject::new(specs::COMPOUND_DISTRIBUTION, TargetKind::CompoundDistribution(vec![a, b]))
                .with_id("prior"),
        );
        let likelihood = store.add(
            TargetObject::new(specs::COMPOUND_DISTRIBUTION, TargetKind::CompoundDistribution(vec![]))
                .with_id("likelihood"),
        );
        let posterior = store.add(
            TargetObject::new(
                specs::COMPOUND_DISTRIBUTION,
                TargetKind::CompoundDistribution(vec![prior, likelihood]),
            )
            .with_id("posterior"),
        );
        let config = RunConfiguration {
            store,
            chain_length: 10,
            pre_burnin: 0,
            file_stem: "t".into(),
            state: vec![],
            posterior: Posterior {
                posterior,
                prior,
                likelihood,
            },
            operators: vec![],
            loggers: vec![],
        };
        let v = to_json_value(&config);
        let dists = &v["run"]["distribution"]["distribution"][0]["distribution"];
        assert_eq!(dists[0]["x"]["id"], json!("RealParameter.1"));
        assert_eq!(dists[1]["x"], json!({ "idref": "RealParameter.1" }));
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            serde_json::to_string(&to_json_value(&config)).unwrap()
        );
    }
}
