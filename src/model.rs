use std::collections::HashMap;

pub const RUNNING_STATUS: &str = "Running";

/// One profile as reported by `profile list`. Rebuilt on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub status: String,
    pub cpus: Option<i64>,
    pub memory_mb: Option<i64>,
    pub driver: Option<String>,
    pub container_runtime: Option<String>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RUNNING_STATUS
    }

    pub fn table_cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.status.clone(),
            self.driver.clone().unwrap_or_default(),
            self.container_runtime.clone().unwrap_or_default(),
            self.cpus.map(|cpus| cpus.to_string()).unwrap_or_default(),
            self.memory_mb
                .map(|memory| memory.to_string())
                .unwrap_or_default(),
        ]
    }
}

pub const CLUSTER_HEADERS: [&str; 6] = [
    "Name",
    "Status",
    "Driver",
    "Container Runtime",
    "CPUs",
    "Memory",
];

/// Snapshot of every known cluster, in the order the tool reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    clusters: Vec<Cluster>,
    by_name: HashMap<String, usize>,
}

impl Inventory {
    /// Later entries win when the same name appears twice.
    pub fn from_clusters(clusters: Vec<Cluster>) -> Self {
        let by_name = clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| (cluster.name.clone(), index))
            .collect::<HashMap<_, _>>();
        Self { clusters, by_name }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn get(&self, name: &str) -> Option<&Cluster> {
        self.by_name
            .get(name)
            .and_then(|index| self.clusters.get(*index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// First table row showing `name`.
    pub fn row_of(&self, name: &str) -> Option<usize> {
        self.clusters
            .iter()
            .position(|cluster| cluster.name == name)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.by_name
            .values()
            .filter_map(|index| self.clusters.get(*index))
            .filter(|cluster| cluster.is_running())
            .count()
    }
}

/// Structured advice from one error event of a failed `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureAdvice {
    pub exit_code: Option<i64>,
    pub error_code: String,
    pub advice: String,
    pub message: String,
    pub docs_url: String,
    pub issues_url: String,
}

impl FailureAdvice {
    /// Dialog rows, leaving out the ones with nothing to say.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        [
            ("Error Code", self.error_code.as_str()),
            ("Advice", self.advice.as_str()),
            ("Error Message", self.message.as_str()),
            ("Link to documentation", self.docs_url.as_str()),
            ("Link to related issue", self.issues_url.as_str()),
        ]
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .collect()
    }
}

pub const DEFAULT_PROFILE: &str = "minikube";
pub const DEFAULT_CPUS: i64 = 2;
pub const DEFAULT_MEMORY_MB: i64 = 2400;

/// Values offered by the create workflow; the workflow hands back the edited copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub profile: String,
    pub cpus: i64,
    pub memory_mb: i64,
    pub driver: String,
    pub container_runtime: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            cpus: DEFAULT_CPUS,
            memory_mb: DEFAULT_MEMORY_MB,
            driver: String::new(),
            container_runtime: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cluster, FailureAdvice, Inventory};

    fn cluster(name: &str, status: &str) -> Cluster {
        Cluster {
            status: status.to_string(),
            ..Cluster::new(name)
        }
    }

    #[test]
    fn duplicate_names_resolve_to_last_seen() {
        let inventory = Inventory::from_clusters(vec![
            cluster("dev", "Stopped"),
            cluster("ci", "Running"),
            cluster("dev", "Running"),
        ]);

        assert_eq!(inventory.len(), 3);
        assert_eq!(
            inventory.get("dev").map(|cluster| cluster.status.as_str()),
            Some("Running")
        );
        assert_eq!(inventory.row_of("dev"), Some(0));
        assert_eq!(inventory.running_count(), 2);
        assert!(inventory.get("missing").is_none());
    }

    #[test]
    fn unset_numbers_render_as_empty_cells() {
        let cells = cluster("dev", "Stopped").table_cells();
        assert_eq!(cells, vec!["dev", "Stopped", "", "", "", ""]);
    }

    #[test]
    fn advice_rows_skip_empty_text() {
        let advice = FailureAdvice {
            error_code: "E1".to_string(),
            message: "no driver".to_string(),
            ..FailureAdvice::default()
        };
        assert_eq!(
            advice.rows(),
            vec![("Error Code", "E1"), ("Error Message", "no driver")]
        );
    }
}
