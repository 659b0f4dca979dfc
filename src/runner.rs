use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ToolError;

pub const TOOL_NAME: &str = "minikube";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DRAIN_GRACE: Duration = Duration::from_secs(2);

pub fn default_fallback_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("/usr/local/bin")]
}

/// Resolves `name` on `PATH`, then in each of `fallback_dirs`.
pub fn locate_tool(name: &str, fallback_dirs: &[PathBuf]) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }
    if fallback_dirs.is_empty() {
        return None;
    }

    let joined = std::env::join_paths(fallback_dirs).ok()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    which::which_in(name, Some(joined), cwd).ok()
}

/// Outcome of one invocation. `text` is standard output, kept even on failure.
#[derive(Debug, Default)]
pub struct CommandResult {
    pub success: bool,
    pub text: String,
    pub error: Option<ToolError>,
}

impl CommandResult {
    fn succeeded(text: String) -> Self {
        Self {
            success: true,
            text,
            error: None,
        }
    }

    fn failed(text: String, error: ToolError) -> Self {
        Self {
            success: false,
            text,
            error: Some(error),
        }
    }

    pub fn failure_summary(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Bracketing hooks around every spawned invocation.
pub trait InvocationObserver: Send + Sync {
    fn started(&self, args: &[String]);
    fn finished(&self, args: &[String], result: &CommandResult);
}

#[derive(Clone)]
pub struct CommandRunner {
    program: Option<PathBuf>,
    timeout: Duration,
    observer: Option<Arc<dyn InvocationObserver>>,
}

impl CommandRunner {
    pub fn new(program: Option<PathBuf>) -> Self {
        Self {
            program,
            timeout: DEFAULT_TIMEOUT,
            observer: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn run<S: AsRef<str>>(&self, args: &[S]) -> CommandResult {
        let args = args
            .iter()
            .map(|arg| arg.as_ref().to_string())
            .collect::<Vec<_>>();

        let Some(program) = self.program.as_deref() else {
            return CommandResult::failed(
                String::new(),
                ToolError::NotFound {
                    name: TOOL_NAME.to_string(),
                },
            );
        };

        if let Some(observer) = &self.observer {
            observer.started(&args);
        }
        let result = self.invoke(program, &args).await;
        if let Some(observer) = &self.observer {
            observer.finished(&args, &result);
        }
        result
    }

    async fn invoke(&self, program: &Path, args: &[String]) -> CommandResult {
        debug!("invoking {} {}", program.display(), args.join(" "));

        let mut child = match TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                let error = ToolError::Spawn {
                    program: program.to_path_buf(),
                    source,
                };
                warn!("{error}");
                return CommandResult::failed(String::new(), error);
            }
        };

        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let status = match timeout(self.timeout, child.wait()).await {
            Err(_) => {
                if let Err(err) = child.kill().await {
                    debug!("kill after timeout failed: {err}");
                }
                let error = ToolError::Timeout {
                    program: program.to_path_buf(),
                    seconds: self.timeout.as_secs(),
                };
                warn!("{error}: {}", args.join(" "));
                stderr.finish().await;
                return CommandResult::failed(stdout.finish().await, error);
            }
            Ok(Err(source)) => {
                let error = ToolError::Wait {
                    program: program.to_path_buf(),
                    source,
                };
                warn!("{error}");
                stderr.finish().await;
                return CommandResult::failed(stdout.finish().await, error);
            }
            Ok(Ok(status)) => status,
        };

        let text = stdout.finish().await;
        let stderr = stderr.finish().await;
        if status.success() {
            return CommandResult::succeeded(text);
        }

        warn!(
            "{} {} exited with {}: {}",
            program.display(),
            args.join(" "),
            status,
            stderr.trim()
        );
        CommandResult::failed(
            text,
            ToolError::Exit {
                program: program.to_path_buf(),
                status,
            },
        )
    }
}

/// Drains one child pipe on its own task so a timed-out invocation still
/// returns whatever was written before it was killed.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let reader = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(read) => sink.lock().await.extend_from_slice(&chunk[..read]),
                    Err(err) => {
                        debug!("pipe read failed: {err}");
                        break;
                    }
                }
            }
        });
        Self { buffer, reader }
    }

    /// Waits for end of stream, bounded because a grandchild can keep the pipe open.
    async fn finish(mut self) -> String {
        if timeout(DRAIN_GRACE, &mut self.reader).await.is_err() {
            debug!("pipe still open after exit, keeping what was read");
            self.reader.abort();
        }
        let bytes = self.buffer.lock().await;
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable `/bin/sh` script named `name` into `dir`.
    pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
        let mut permissions = std::fs::metadata(&path)
            .expect("fake tool metadata")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("chmod fake tool");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandRunner, TOOL_NAME};

    #[tokio::test]
    async fn missing_program_fails_without_spawning() {
        let runner = CommandRunner::new(None);
        let result = runner.run(&["profile", "list", "-o", "json"]).await;
        assert!(!result.success);
        assert!(result.text.is_empty());
        assert_eq!(
            result.failure_summary().as_deref(),
            Some(format!("{TOOL_NAME} was not found on the search path").as_str())
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::super::testing::fake_tool;
        use super::super::{CommandResult, CommandRunner, InvocationObserver, locate_tool};
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        #[derive(Default)]
        struct RecordingObserver {
            events: Mutex<Vec<String>>,
        }

        impl InvocationObserver for RecordingObserver {
            fn started(&self, args: &[String]) {
                self.events
                    .lock()
                    .expect("observer lock")
                    .push(format!("start {}", args.join(" ")));
            }

            fn finished(&self, args: &[String], result: &CommandResult) {
                self.events
                    .lock()
                    .expect("observer lock")
                    .push(format!("finish {} ok={}", args.join(" "), result.success));
            }
        }

        #[tokio::test]
        async fn zero_exit_is_success_and_captures_stdout() {
            let dir = tempfile::tempdir().expect("tempdir");
            let tool = fake_tool(dir.path(), "minikube", r#"echo "args:$*""#);
            let runner = CommandRunner::new(Some(tool));

            let result = runner.run(&["stop", "-p", "dev"]).await;
            assert!(result.success);
            assert_eq!(result.text, "args:stop -p dev\n");
            assert!(result.error.is_none());
        }

        #[tokio::test]
        async fn non_zero_exit_keeps_stdout_and_drops_stderr() {
            let dir = tempfile::tempdir().expect("tempdir");
            let tool = fake_tool(
                dir.path(),
                "minikube",
                "echo '{\"data\":{}}'\necho 'boom' >&2\nexit 4",
            );
            let runner = CommandRunner::new(Some(tool));

            let result = runner.run(&["start"]).await;
            assert!(!result.success);
            assert_eq!(result.text, "{\"data\":{}}\n");
            assert!(!result.text.contains("boom"));
            assert!(result.failure_summary().unwrap_or_default().contains("exited"));
        }

        #[tokio::test]
        async fn slow_invocation_times_out() {
            let dir = tempfile::tempdir().expect("tempdir");
            let tool = fake_tool(dir.path(), "minikube", "sleep 5");
            let runner = CommandRunner::new(Some(tool)).with_timeout(Duration::from_millis(200));

            let result = runner.run(&["start"]).await;
            assert!(!result.success);
            assert!(result.error.as_ref().is_some_and(|error| error.is_timeout()));
        }

        #[tokio::test]
        async fn timed_out_start_keeps_output_written_so_far() {
            let dir = tempfile::tempdir().expect("tempdir");
            let tool = fake_tool(
                dir.path(),
                "minikube",
                "echo '{\"data\":{\"exitcode\":\"80\",\"name\":\"GUEST_DRIVER\"}}'\nsleep 5",
            );
            let runner = CommandRunner::new(Some(tool)).with_timeout(Duration::from_millis(500));

            let result = runner.run(&["start", "-p", "dev", "-o", "json"]).await;
            assert!(!result.success);
            assert!(result.error.as_ref().is_some_and(|error| error.is_timeout()));
            assert!(result.text.contains("\"exitcode\":\"80\""));

            let advice = crate::advice::extract_failure_advice(&result.text);
            assert_eq!(advice.len(), 1);
        }

        #[tokio::test]
        async fn observer_brackets_each_invocation() {
            let dir = tempfile::tempdir().expect("tempdir");
            let tool = fake_tool(dir.path(), "minikube", "exit 0");
            let observer = Arc::new(RecordingObserver::default());
            let runner = CommandRunner::new(Some(tool)).with_observer(observer.clone());

            let _ = runner.run(&["delete", "-p", "a"]).await;
            let events = observer.events.lock().expect("observer lock").clone();
            assert_eq!(
                events,
                vec![
                    "start delete -p a".to_string(),
                    "finish delete -p a ok=true".to_string()
                ]
            );
        }

        #[test]
        fn locate_tool_uses_fallback_directory() {
            let dir = tempfile::tempdir().expect("tempdir");
            let name = "minideck-fallback-tool";
            let tool = fake_tool(dir.path(), name, "exit 0");

            let found = locate_tool(name, &[dir.path().to_path_buf()]);
            assert_eq!(
                found.as_deref().and_then(|path| path.file_name()),
                tool.file_name()
            );
            assert!(locate_tool(name, &[]).is_none());
        }
    }
}
