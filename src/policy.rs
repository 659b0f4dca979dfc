use crate::model::Inventory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnabledActions {
    pub start: bool,
    pub stop: bool,
    pub delete: bool,
    pub ssh: bool,
    pub dashboard: bool,
}

impl EnabledActions {
    pub const NONE: Self = Self {
        start: false,
        stop: false,
        delete: false,
        ssh: false,
        dashboard: false,
    };
}

/// Which cluster actions make sense for `selection`.
///
/// `console_available` gates ssh on platforms without a usable console. Any
/// status other than exactly `Running` disables ssh and dashboard.
pub fn compute_enabled(
    selection: Option<&str>,
    inventory: &Inventory,
    console_available: bool,
) -> EnabledActions {
    let Some(cluster) = selection
        .filter(|name| !name.is_empty())
        .and_then(|name| inventory.get(name))
    else {
        return EnabledActions::NONE;
    };

    if cluster.is_running() {
        EnabledActions {
            start: false,
            stop: true,
            delete: true,
            ssh: console_available,
            dashboard: true,
        }
    } else {
        EnabledActions {
            start: true,
            stop: false,
            delete: true,
            ssh: false,
            dashboard: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EnabledActions, compute_enabled};
    use crate::model::{Cluster, Inventory};

    fn inventory() -> Inventory {
        Inventory::from_clusters(vec![
            Cluster {
                status: "Running".to_string(),
                ..Cluster::new("up")
            },
            Cluster {
                status: "Stopped".to_string(),
                ..Cluster::new("down")
            },
            Cluster::new("blank"),
            Cluster {
                status: "running".to_string(),
                ..Cluster::new("lowercase")
            },
        ])
    }

    #[test]
    fn empty_or_unknown_selection_disables_everything() {
        let inventory = inventory();
        assert_eq!(
            compute_enabled(Some(""), &inventory, true),
            EnabledActions::NONE
        );
        assert_eq!(
            compute_enabled(Some("missing-name"), &inventory, true),
            EnabledActions::NONE
        );
        assert_eq!(compute_enabled(None, &inventory, true), EnabledActions::NONE);
        assert_eq!(
            compute_enabled(Some("up"), &Inventory::default(), true),
            EnabledActions::NONE
        );
    }

    #[test]
    fn running_cluster_can_stop_ssh_and_open_dashboard() {
        assert_eq!(
            compute_enabled(Some("up"), &inventory(), true),
            EnabledActions {
                start: false,
                stop: true,
                delete: true,
                ssh: true,
                dashboard: true,
            }
        );
    }

    #[test]
    fn ssh_follows_console_availability() {
        let enabled = compute_enabled(Some("up"), &inventory(), false);
        assert!(!enabled.ssh);
        assert!(enabled.dashboard);
    }

    #[test]
    fn any_other_status_can_only_start_or_delete() {
        let inventory = inventory();
        for name in ["down", "blank", "lowercase"] {
            assert_eq!(
                compute_enabled(Some(name), &inventory, true),
                EnabledActions {
                    start: true,
                    stop: false,
                    delete: true,
                    ssh: false,
                    dashboard: false,
                },
                "status of {name}"
            );
        }
    }
}
