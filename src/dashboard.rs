use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::gateway::dashboard_args;

const TERMINATE_GRACE: Duration = Duration::from_secs(10);

struct DashboardProcess {
    profile: String,
    pid: Option<u32>,
    child: Child,
}

/// Owns the single background `dashboard` process, if any.
#[derive(Default)]
pub struct DashboardSupervisor {
    active: Option<DashboardProcess>,
}

impl DashboardSupervisor {
    pub fn profile(&self) -> Option<&str> {
        self.active.as_ref().map(|process| process.profile.as_str())
    }

    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().and_then(|process| process.pid)
    }

    /// Replaces any running dashboard with one for `profile`.
    pub async fn open(&mut self, program: &Path, profile: &str) -> Result<Option<u32>> {
        self.close().await?;

        let child = TokioCommand::new(program)
            .args(dashboard_args(profile))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn dashboard for profile {profile}"))?;
        let pid = child.id();
        info!("dashboard for {profile} started pid={pid:?}");

        self.active = Some(DashboardProcess {
            profile: profile.to_string(),
            pid,
            child,
        });
        Ok(pid)
    }

    /// Terminates the running dashboard and waits for it. Returns its profile.
    pub async fn close(&mut self) -> Result<Option<String>> {
        let Some(mut process) = self.active.take() else {
            return Ok(None);
        };

        terminate(&mut process.child, process.pid);
        match timeout(TERMINATE_GRACE, process.child.wait()).await {
            Ok(status) => {
                let status = status.context("failed waiting for dashboard to exit")?;
                info!("dashboard for {} exited with {status}", process.profile);
            }
            Err(_) => {
                warn!(
                    "dashboard for {} ignored termination, killing",
                    process.profile
                );
                process
                    .child
                    .kill()
                    .await
                    .context("failed to kill dashboard")?;
            }
        }
        Ok(Some(process.profile))
    }

    /// Reports a dashboard that exited on its own and forgets it.
    pub fn poll_exit(&mut self) -> Option<(String, std::io::Result<ExitStatus>)> {
        let process = self.active.as_mut()?;
        let outcome = match process.child.try_wait() {
            Ok(None) => return None,
            Ok(Some(status)) => Ok(status),
            Err(error) => Err(error),
        };
        let profile = self.active.take().map(|process| process.profile)?;
        Some((profile, outcome))
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child, pid: Option<u32>) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        let _ = child.start_kill();
        return;
    };
    if let Err(error) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!("SIGTERM to dashboard pid={raw} failed: {error}");
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}
