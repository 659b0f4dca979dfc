use tracing::{info, warn};

use crate::advice::extract_failure_advice;
use crate::error::ToolError;
use crate::model::{ClusterSettings, FailureAdvice, Inventory};
use crate::profiles::parse_clusters;
use crate::runner::{CommandResult, CommandRunner};

pub fn list_args() -> Vec<String> {
    to_args(&["profile", "list", "-o", "json"])
}

/// `custom` adds the driver, runtime and resource flags of the create workflow.
pub fn start_args(profile: &str, custom: Option<&ClusterSettings>) -> Vec<String> {
    let mut args = to_args(&["start", "-o", "json", "-p", profile]);
    if let Some(settings) = custom {
        args.extend([
            "--driver".to_string(),
            settings.driver.clone(),
            "--container-runtime".to_string(),
            settings.container_runtime.clone(),
            "--cpus".to_string(),
            settings.cpus.to_string(),
            "--memory".to_string(),
            settings.memory_mb.to_string(),
        ]);
    }
    args
}

pub fn stop_args(profile: &str) -> Vec<String> {
    to_args(&["stop", "-p", profile])
}

pub fn delete_args(profile: &str) -> Vec<String> {
    to_args(&["delete", "-p", profile])
}

pub fn dashboard_args(profile: &str) -> Vec<String> {
    to_args(&["dashboard", "-p", profile])
}

pub fn ssh_args(profile: &str) -> Vec<String> {
    to_args(&["ssh", "-p", profile])
}

fn to_args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

/// A blocking tool operation. Every variant is followed by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOp {
    Refresh,
    Start {
        profile: String,
        custom: Option<ClusterSettings>,
    },
    Stop {
        profile: String,
    },
    Delete {
        profile: String,
    },
}

impl ClusterOp {
    pub fn label(&self) -> String {
        match self {
            Self::Refresh => "refresh".to_string(),
            Self::Start { profile, .. } => format!("start {profile}"),
            Self::Stop { profile } => format!("stop {profile}"),
            Self::Delete { profile } => format!("delete {profile}"),
        }
    }
}

#[derive(Debug)]
pub struct OpReport {
    pub op: ClusterOp,
    /// `None` for a plain refresh.
    pub result: Option<CommandResult>,
    /// Filled only for a failed start.
    pub advice: Vec<FailureAdvice>,
    pub inventory: Inventory,
}

impl OpReport {
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_none_or(|result| result.success)
    }
}

#[derive(Clone)]
pub struct MinikubeGateway {
    runner: CommandRunner,
}

impl MinikubeGateway {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Never fails: an unsuccessful listing is an empty inventory.
    pub async fn refresh(&self) -> Inventory {
        let result = self.runner.run(&list_args()).await;
        if !result.success {
            warn!(
                "profile list failed: {}",
                result.failure_summary().unwrap_or_default()
            );
            return Inventory::default();
        }
        Inventory::from_clusters(parse_clusters(&result.text))
    }

    pub async fn start(
        &self,
        profile: &str,
        custom: Option<&ClusterSettings>,
    ) -> (CommandResult, Vec<FailureAdvice>) {
        let result = self.runner.run(&start_args(profile, custom)).await;
        if result.success {
            info!("profile {profile} started");
            return (result, Vec::new());
        }
        let advice = extract_failure_advice(&result.text);
        (result, advice)
    }

    pub async fn stop(&self, profile: &str) -> CommandResult {
        self.runner.run(&stop_args(profile)).await
    }

    pub async fn delete(&self, profile: &str) -> CommandResult {
        self.runner.run(&delete_args(profile)).await
    }

    /// Runs `op`, then refreshes before reporting back.
    pub async fn perform(&self, op: ClusterOp) -> OpReport {
        let (result, advice) = match &op {
            ClusterOp::Refresh => (None, Vec::new()),
            ClusterOp::Start { profile, custom } => {
                let (result, advice) = self.start(profile, custom.as_ref()).await;
                (Some(result), advice)
            }
            ClusterOp::Stop { profile } => (Some(self.stop(profile).await), Vec::new()),
            ClusterOp::Delete { profile } => (Some(self.delete(profile).await), Vec::new()),
        };

        if let Some(result) = result.as_ref().filter(|result| !result.success) {
            if result.error.as_ref().is_some_and(ToolError::is_timeout) {
                warn!("{} timed out, refreshing anyway", op.label());
            } else {
                warn!(
                    "{} failed: {}",
                    op.label(),
                    result.failure_summary().unwrap_or_default()
                );
            }
        }

        let inventory = self.refresh().await;
        OpReport {
            op,
            result,
            advice,
            inventory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterOp, MinikubeGateway, start_args};
    use crate::model::ClusterSettings;
    use crate::runner::CommandRunner;

    #[test]
    fn plain_start_targets_profile_only() {
        assert_eq!(
            start_args("dev", None),
            vec!["start", "-o", "json", "-p", "dev"]
        );
    }

    #[test]
    fn custom_start_appends_every_setting() {
        let settings = ClusterSettings {
            profile: "lab".to_string(),
            cpus: 4,
            memory_mb: 8192,
            driver: "kvm2".to_string(),
            container_runtime: "containerd".to_string(),
        };
        assert_eq!(
            start_args("lab", Some(&settings)),
            vec![
                "start",
                "-o",
                "json",
                "-p",
                "lab",
                "--driver",
                "kvm2",
                "--container-runtime",
                "containerd",
                "--cpus",
                "4",
                "--memory",
                "8192",
            ]
        );
    }

    #[tokio::test]
    async fn missing_tool_refreshes_to_empty_inventory() {
        let gateway = MinikubeGateway::new(CommandRunner::new(None));
        assert!(gateway.refresh().await.is_empty());

        let report = gateway
            .perform(ClusterOp::Stop {
                profile: "dev".to_string(),
            })
            .await;
        assert!(!report.succeeded());
        assert!(report.inventory.is_empty());
    }

    #[cfg(unix)]
    mod unix {
        use super::super::{ClusterOp, MinikubeGateway};
        use crate::runner::CommandRunner;
        use crate::runner::testing::fake_tool;

        const LIST_SCRIPT: &str = r#"
case "$1" in
  profile)
    echo 'progress line'
    echo '{"invalid":[]}'
    echo '{"valid":[{"Name":"default","Status":"Running","Config":{"CPUs":2,"Memory":2400,"Driver":"docker","KubernetesConfig":{"ContainerRuntime":"docker"}}},{"Name":"lab","Status":"Stopped"}]}'
    ;;
  start)
    echo "$*" >> "$(dirname "$0")/calls"
    echo '{"data":{"currentstep":"1","message":"starting"}}'
    echo '{"data":{"exitcode":"80","name":"GUEST_DRIVER","advice":"try docker","message":"kvm2 missing","url":"https://docs","issues":"https://issues"}}'
    exit 80
    ;;
  *)
    echo "$*" >> "$(dirname "$0")/calls"
    ;;
esac
"#;

        fn gateway(dir: &std::path::Path, script: &str) -> MinikubeGateway {
            let tool = fake_tool(dir, "minikube", script);
            MinikubeGateway::new(CommandRunner::new(Some(tool)))
        }

        #[tokio::test]
        async fn refresh_builds_inventory_from_valid_line() {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = gateway(dir.path(), LIST_SCRIPT);

            let inventory = gateway.refresh().await;
            assert_eq!(inventory.len(), 2);
            assert!(inventory.get("default").is_some_and(|c| c.is_running()));
            assert_eq!(
                inventory.get("lab").map(|c| c.status.as_str()),
                Some("Stopped")
            );
        }

        #[tokio::test]
        async fn refresh_twice_yields_identical_inventories() {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = gateway(dir.path(), LIST_SCRIPT);

            let first = gateway.refresh().await;
            let second = gateway.refresh().await;
            assert_eq!(first, second);
            assert_eq!(first.clusters(), second.clusters());
        }

        #[tokio::test]
        async fn failing_list_returns_empty_inventory() {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = gateway(
                dir.path(),
                "echo '{\"valid\":[{\"Name\":\"stale\"}]}'\nexit 1",
            );
            assert!(gateway.refresh().await.is_empty());
        }

        #[tokio::test]
        async fn failed_start_reports_advice_and_refreshes() {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = gateway(dir.path(), LIST_SCRIPT);

            let report = gateway
                .perform(ClusterOp::Start {
                    profile: "lab".to_string(),
                    custom: None,
                })
                .await;

            assert!(!report.succeeded());
            assert_eq!(report.advice.len(), 1);
            assert_eq!(report.advice[0].error_code, "GUEST_DRIVER");
            assert_eq!(report.advice[0].advice, "try docker");
            assert_eq!(report.inventory.len(), 2);

            let calls = std::fs::read_to_string(dir.path().join("calls")).expect("calls log");
            assert_eq!(calls, "start -o json -p lab\n");
        }

        #[tokio::test]
        async fn stop_and_delete_target_selected_profile() {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = gateway(dir.path(), LIST_SCRIPT);

            let stop = gateway
                .perform(ClusterOp::Stop {
                    profile: "default".to_string(),
                })
                .await;
            let delete = gateway
                .perform(ClusterOp::Delete {
                    profile: "lab".to_string(),
                })
                .await;

            assert!(stop.succeeded());
            assert!(delete.succeeded());
            assert!(stop.advice.is_empty());
            let calls = std::fs::read_to_string(dir.path().join("calls")).expect("calls log");
            assert_eq!(calls, "stop -p default\ndelete -p lab\n");
        }
    }
}
