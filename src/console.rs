use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

use crate::gateway::ssh_args;

/// Where `ssh` sessions are shown.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SshMode {
    /// Hand this terminal over to the session until it ends.
    #[default]
    Embedded,
    /// Open a separate terminal emulator window.
    External,
}

pub const FALLBACK_TERMINALS: [&str; 2] = ["x-terminal-emulator", "xterm"];

/// `configured` (from `$TERMINAL` or config) wins; otherwise the first fallback
/// that exists, else the last one.
pub fn pick_terminal_name(configured: Option<&str>, exists: impl Fn(&str) -> bool) -> String {
    if let Some(name) = configured.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    FALLBACK_TERMINALS
        .into_iter()
        .find(|name| exists(*name))
        .unwrap_or(FALLBACK_TERMINALS[FALLBACK_TERMINALS.len() - 1])
        .to_string()
}

pub fn resolve_terminal(configured: Option<&str>) -> Option<PathBuf> {
    let name = pick_terminal_name(configured, |name| which::which(name).is_ok());
    which::which(&name).ok()
}

pub fn console_available(mode: SshMode, terminal: Option<&str>) -> bool {
    match mode {
        SshMode::Embedded => cfg!(unix),
        SshMode::External => resolve_terminal(terminal).is_some(),
    }
}

/// Arguments handed to the terminal emulator: `-e "<tool> ssh -p <profile>"`.
pub fn external_terminal_args(program: &Path, profile: &str) -> Vec<String> {
    let command = std::iter::once(program.display().to_string())
        .chain(ssh_args(profile))
        .collect::<Vec<_>>()
        .join(" ");
    vec!["-e".to_string(), command]
}

pub async fn run_embedded(program: &Path, profile: &str) -> Result<ExitStatus> {
    debug!("embedded ssh into {profile}");
    TokioCommand::new(program)
        .args(ssh_args(profile))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("failed to run ssh for profile {profile}"))
}

/// Launches the session in its own window and returns its pid.
pub fn spawn_external(terminal: &Path, program: &Path, profile: &str) -> Result<Option<u32>> {
    let mut child = TokioCommand::new(terminal)
        .args(external_terminal_args(program, profile))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to launch {}", terminal.display()))?;
    let pid = child.id();
    info!("external ssh console for {profile} pid={pid:?}");

    tokio::spawn(async move {
        let _ = child.wait().await;
    });
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::{external_terminal_args, pick_terminal_name};
    use std::path::Path;

    #[test]
    fn configured_terminal_wins() {
        assert_eq!(
            pick_terminal_name(Some("alacritty"), |_| true),
            "alacritty".to_string()
        );
    }

    #[test]
    fn blank_configuration_falls_back_in_order() {
        assert_eq!(
            pick_terminal_name(Some("  "), |_| true),
            "x-terminal-emulator".to_string()
        );
        assert_eq!(
            pick_terminal_name(None, |name| name == "xterm"),
            "xterm".to_string()
        );
        assert_eq!(pick_terminal_name(None, |_| false), "xterm".to_string());
    }

    #[test]
    fn terminal_runs_tool_ssh_for_profile() {
        assert_eq!(
            external_terminal_args(Path::new("/usr/local/bin/minikube"), "dev"),
            vec![
                "-e".to_string(),
                "/usr/local/bin/minikube ssh -p dev".to_string()
            ]
        );
    }
}
