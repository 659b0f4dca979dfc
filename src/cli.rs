use clap::Parser;
use std::path::PathBuf;

use crate::console::SshMode;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "minideck",
    version,
    about = "A terminal cockpit for local minikube clusters."
)]
pub struct CliArgs {
    /// Path to the minikube executable (skips the search path lookup)
    #[arg(long)]
    pub minikube: Option<PathBuf>,

    /// Profile to select on startup when it exists
    #[arg(short, long, default_value = "default")]
    pub profile: String,

    /// How ssh sessions are opened
    #[arg(long, value_enum)]
    pub ssh: Option<SshMode>,

    /// Terminal emulator for external ssh sessions (defaults to $TERMINAL)
    #[arg(long)]
    pub terminal: Option<String>,

    /// Ceiling for a single minikube invocation, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Runtime config file (defaults to minideck.yaml discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append log lines to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
