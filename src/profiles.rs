use serde_json::{Map, Value};
use tracing::debug;

use crate::jsonl::{json_objects, object_field, str_field};
use crate::model::Cluster;

/// Collects every cluster listed under a `valid` array, in encounter order.
///
/// Lines without `valid` contribute nothing. Entries without a non-empty `Name`
/// are dropped. Duplicates are kept here; the inventory decides which one wins.
pub fn parse_clusters(raw: &str) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    for object in json_objects(raw) {
        let Some(valid) = object.get("valid").and_then(Value::as_array) else {
            continue;
        };
        clusters.extend(
            valid
                .iter()
                .filter_map(Value::as_object)
                .filter_map(cluster_from_entry),
        );
    }
    clusters
}

fn cluster_from_entry(entry: &Map<String, Value>) -> Option<Cluster> {
    let name = str_field(entry, "Name").filter(|name| !name.is_empty());
    let Some(name) = name else {
        debug!("profile entry without a usable Name skipped");
        return None;
    };

    let mut cluster = Cluster::new(name);
    if let Some(status) = str_field(entry, "Status") {
        cluster.status = status.to_string();
    }

    let Some(config) = object_field(entry, "Config") else {
        return Some(cluster);
    };
    cluster.cpus = int_field(config, "CPUs");
    cluster.memory_mb = int_field(config, "Memory");
    cluster.driver = str_field(config, "Driver").map(str::to_string);

    cluster.container_runtime = object_field(config, "KubernetesConfig")
        .and_then(|kubernetes| str_field(kubernetes, "ContainerRuntime"))
        .map(str::to_string);

    Some(cluster)
}

fn int_field(object: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = object.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|number| number as i64))
}
