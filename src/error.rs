use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Why a single tool invocation did not succeed.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{name} was not found on the search path")]
    NotFound { name: String },

    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {}: {source}", program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} did not finish within {seconds}s", program.display())]
    Timeout { program: PathBuf, seconds: u64 },

    #[error("{} exited with {status}", program.display())]
    Exit { program: PathBuf, status: ExitStatus },
}

impl ToolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
