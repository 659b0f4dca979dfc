use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::console::SshMode;
use crate::model::ClusterSettings;
use crate::runner::{DEFAULT_TIMEOUT, default_fallback_dirs};

/// Effective settings after merging CLI flags over the config file.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub source: Option<String>,
    pub minikube: Option<PathBuf>,
    pub fallback_dirs: Vec<PathBuf>,
    pub ssh_mode: SshMode,
    pub terminal: Option<String>,
    pub timeout: Duration,
    pub log_file: Option<PathBuf>,
    pub preferred_profile: String,
    pub create_defaults: ClusterSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct DeckConfigFile {
    #[serde(default, alias = "tool")]
    minikube: Option<PathBuf>,
    #[serde(default)]
    fallback_dirs: Option<Vec<PathBuf>>,
    #[serde(default)]
    ssh: Option<SshMode>,
    #[serde(default)]
    terminal: Option<String>,
    #[serde(default, alias = "timeout")]
    timeout_secs: Option<u64>,
    #[serde(default)]
    log_file: Option<PathBuf>,
    #[serde(default)]
    create: CreateSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct CreateSpec {
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    cpus: Option<i64>,
    #[serde(default, alias = "memory_mb")]
    memory: Option<i64>,
    #[serde(default)]
    driver: Option<String>,
    #[serde(default, alias = "runtime")]
    container_runtime: Option<String>,
}

impl CreateSpec {
    fn apply(self, mut settings: ClusterSettings) -> ClusterSettings {
        if let Some(profile) = self.profile.filter(|profile| !profile.trim().is_empty()) {
            settings.profile = profile;
        }
        if let Some(cpus) = self.cpus {
            settings.cpus = cpus;
        }
        if let Some(memory) = self.memory {
            settings.memory_mb = memory;
        }
        if let Some(driver) = self.driver {
            settings.driver = driver;
        }
        if let Some(runtime) = self.container_runtime {
            settings.container_runtime = runtime;
        }
        settings
    }
}

pub fn load(args: &CliArgs) -> Result<RuntimeSettings> {
    let path = args.config.clone().or_else(discover_config_path);
    let (file, source) = match path {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read runtime config {}", path.display()))?;
            let parsed = parse_config(&raw)
                .with_context(|| format!("failed to parse runtime config {}", path.display()))?;
            (parsed, Some(path.display().to_string()))
        }
        None => (DeckConfigFile::default(), None),
    };

    let env_terminal = std::env::var("TERMINAL").ok();
    Ok(merge(args, file, source, env_terminal))
}

fn parse_config(raw: &str) -> Result<DeckConfigFile> {
    if raw.trim().is_empty() {
        return Ok(DeckConfigFile::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

fn merge(
    args: &CliArgs,
    file: DeckConfigFile,
    source: Option<String>,
    env_terminal: Option<String>,
) -> RuntimeSettings {
    let terminal = args
        .terminal
        .clone()
        .or(env_terminal)
        .or(file.terminal)
        .filter(|terminal| !terminal.trim().is_empty());
    let timeout = args
        .timeout_secs
        .or(file.timeout_secs)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);

    RuntimeSettings {
        source,
        minikube: args.minikube.clone().or(file.minikube),
        fallback_dirs: file.fallback_dirs.unwrap_or_else(default_fallback_dirs),
        ssh_mode: args.ssh.or(file.ssh).unwrap_or_default(),
        terminal,
        timeout,
        log_file: args.log_file.clone().or(file.log_file),
        preferred_profile: args.profile.clone(),
        create_defaults: file.create.apply(ClusterSettings::default()),
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MINIDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("minideck.yaml"),
        PathBuf::from("minideck.yml"),
        PathBuf::from(".minideck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/minideck/config.yaml"),
            PathBuf::from(&home).join(".config/minideck/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{merge, parse_config};
    use crate::cli::CliArgs;
    use crate::console::SshMode;
    use crate::model::ClusterSettings;
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_config_keeps_builtin_defaults() {
        let args = CliArgs::parse_from(["minideck"]);
        let settings = merge(&args, parse_config("").expect("parse"), None, None);

        assert_eq!(settings.create_defaults, ClusterSettings::default());
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.fallback_dirs, vec![PathBuf::from("/usr/local/bin")]);
        assert_eq!(settings.ssh_mode, SshMode::Embedded);
        assert_eq!(settings.preferred_profile, "default");
        assert!(settings.terminal.is_none());
    }

    #[test]
    fn config_file_fills_create_defaults() {
        let raw = r#"
ssh: external
terminal: kitty
timeout: 60
create:
  profile: lab
  cpus: 4
  memory_mb: 8192
  driver: kvm2
  runtime: containerd
"#;
        let args = CliArgs::parse_from(["minideck"]);
        let settings = merge(&args, parse_config(raw).expect("parse"), None, None);

        assert_eq!(settings.ssh_mode, SshMode::External);
        assert_eq!(settings.terminal.as_deref(), Some("kitty"));
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(
            settings.create_defaults,
            ClusterSettings {
                profile: "lab".to_string(),
                cpus: 4,
                memory_mb: 8192,
                driver: "kvm2".to_string(),
                container_runtime: "containerd".to_string(),
            }
        );
    }

    #[test]
    fn cli_flags_win_over_environment_and_file() {
        let raw = "ssh: external\nterminal: kitty\ntimeout_secs: 60\nminikube: /opt/minikube\n";
        let args = CliArgs::parse_from([
            "minideck",
            "--ssh",
            "embedded",
            "--terminal",
            "foot",
            "--timeout-secs",
            "5",
            "--minikube",
            "/tmp/minikube",
            "-p",
            "lab",
        ]);
        let settings = merge(
            &args,
            parse_config(raw).expect("parse"),
            Some("minideck.yaml".to_string()),
            Some("wezterm".to_string()),
        );

        assert_eq!(settings.ssh_mode, SshMode::Embedded);
        assert_eq!(settings.terminal.as_deref(), Some("foot"));
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.minikube, Some(PathBuf::from("/tmp/minikube")));
        assert_eq!(settings.preferred_profile, "lab");
        assert_eq!(settings.source.as_deref(), Some("minideck.yaml"));
    }

    #[test]
    fn environment_terminal_beats_file_and_zero_timeout_is_ignored() {
        let args = CliArgs::parse_from(["minideck", "--timeout-secs", "0"]);
        let settings = merge(
            &args,
            parse_config("terminal: kitty").expect("parse"),
            None,
            Some("wezterm".to_string()),
        );
        assert_eq!(settings.terminal.as_deref(), Some("wezterm"));
        assert_eq!(settings.timeout, Duration::from_secs(300));
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("create: [1, 2").is_err());
        assert!(parse_config("ssh: sideways").is_err());
    }
}
