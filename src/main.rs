mod advice;
mod app;
mod cli;
mod config;
mod console;
mod create;
mod dashboard;
mod error;
mod gateway;
mod input;
mod jsonl;
mod model;
mod policy;
mod profiles;
mod runner;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use clap::Parser;
use cli::CliArgs;
use config::RuntimeSettings;
use console::SshMode;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use dashboard::DashboardSupervisor;
use futures::StreamExt;
use gateway::{ClusterOp, MinikubeGateway, OpReport};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use runner::{CommandResult, CommandRunner, InvocationObserver, TOOL_NAME, locate_tool};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const EXIT_TOOL_NOT_FOUND: i32 = 3;
const INSTALL_URL: &str = "https://minikube.sigs.k8s.io/docs/start/";
const TICK: Duration = Duration::from_millis(120);

enum ToolEvent {
    Started(String),
    Finished,
}

/// Forwards runner start/finish notifications to the UI loop.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<ToolEvent>,
}

impl InvocationObserver for ChannelObserver {
    fn started(&self, args: &[String]) {
        let line = std::iter::once(TOOL_NAME.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let _ = self.tx.send(ToolEvent::Started(line));
    }

    fn finished(&self, _args: &[String], _result: &CommandResult) {
        let _ = self.tx.send(ToolEvent::Finished);
    }
}

struct Deck {
    program: PathBuf,
    gateway: MinikubeGateway,
    dashboard: DashboardSupervisor,
    ssh_mode: SshMode,
    terminal: Option<String>,
    report_tx: mpsc::UnboundedSender<OpReport>,
    worker: Option<JoinHandle<()>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = config::load(&args)?;
    init_tracing(&args.log_filter, settings.log_file.as_deref())?;
    if let Some(source) = &settings.source {
        info!("runtime config loaded from {source}");
    }

    let Some(program) = resolve_program(&settings) else {
        eprintln!("Unable to find the {TOOL_NAME} executable.");
        eprintln!("Install it from {INSTALL_URL} or pass --minikube <path>.");
        std::process::exit(EXIT_TOOL_NOT_FOUND);
    };
    info!("using {}", program.display());

    let (tool_tx, tool_rx) = mpsc::unbounded_channel::<ToolEvent>();
    let runner = CommandRunner::new(Some(program.clone()))
        .with_timeout(settings.timeout)
        .with_observer(Arc::new(ChannelObserver { tx: tool_tx }));
    let (report_tx, report_rx) = mpsc::unbounded_channel::<OpReport>();

    let console_available =
        console::console_available(settings.ssh_mode, settings.terminal.as_deref());
    if !console_available {
        warn!("no console available, ssh disabled");
    }

    let mut app = App::new(
        program.display().to_string(),
        Some(settings.preferred_profile.clone()),
        settings.create_defaults.clone(),
        console_available,
    );
    let mut deck = Deck {
        program,
        gateway: MinikubeGateway::new(runner),
        dashboard: DashboardSupervisor::default(),
        ssh_mode: settings.ssh_mode,
        terminal: settings.terminal.clone(),
        report_tx,
        worker: None,
    };

    run(&mut app, &mut deck, report_rx, tool_rx).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .compact()
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .compact()
                .with_writer(std::io::sink)
                .try_init();
        }
    }

    Ok(())
}

fn resolve_program(settings: &RuntimeSettings) -> Option<PathBuf> {
    match &settings.minikube {
        Some(path) if path.is_file() => Some(path.clone()),
        Some(path) => {
            warn!("configured minikube {} does not exist", path.display());
            None
        }
        None => locate_tool(TOOL_NAME, &settings.fallback_dirs),
    }
}

async fn run(
    app: &mut App,
    deck: &mut Deck,
    report_rx: mpsc::UnboundedReceiver<OpReport>,
    tool_rx: mpsc::UnboundedReceiver<ToolEvent>,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, deck, report_rx, tool_rx).await;
    // Dropping the worker would kill its child mid-operation.
    if let Some(worker) = deck.worker.take()
        && !worker.is_finished()
    {
        info!("waiting for {} to finish before exit", app.busy().unwrap_or("operation"));
        if let Err(error) = worker.await {
            warn!("operation task failed: {error}");
        }
    }
    if let Some(profile) = deck.dashboard.profile() {
        info!(
            "closing dashboard for {profile} pid={:?} on exit",
            deck.dashboard.pid()
        );
    }
    if let Err(error) = deck.dashboard.close().await {
        warn!("failed to close dashboard on exit: {error:#}");
    }
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    deck: &mut Deck,
    mut report_rx: mpsc::UnboundedReceiver<OpReport>,
    mut tool_rx: mpsc::UnboundedReceiver<ToolEvent>,
) -> Result<()> {
    let initial = app.dispatch(ClusterOp::Refresh);
    execute_app_command(terminal, app, deck, initial).await;

    let mut reader = EventStream::new();
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            terminal
                                .draw(|frame| ui::render(frame, app))
                                .context("failed to render terminal frame")?;
                            execute_app_command(terminal, app, deck, command).await;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            Some(report) = report_rx.recv() => {
                debug!("{} finished success={}", report.op.label(), report.succeeded());
                app.finish_op(report);
            }
            Some(event) = tool_rx.recv() => {
                match event {
                    ToolEvent::Started(line) => app.tool_started(line),
                    ToolEvent::Finished => app.tool_finished(),
                }
            }
            _ = ticker.tick() => {
                app.tick();
                if let Some((profile, outcome)) = deck.dashboard.poll_exit() {
                    let message = match outcome {
                        Ok(status) => format!("Dashboard for {profile} exited ({status})"),
                        Err(error) => format!("Dashboard for {profile} failed: {error}"),
                    };
                    info!("{message}");
                    app.dashboard_closed(message);
                }
            }
        }
    }

    Ok(())
}

async fn execute_app_command(
    terminal: &mut TuiTerminal,
    app: &mut App,
    deck: &mut Deck,
    command: AppCommand,
) {
    match command {
        AppCommand::None => {}
        AppCommand::Run(op) => {
            let gateway = deck.gateway.clone();
            let report_tx = deck.report_tx.clone();
            deck.worker = Some(tokio::spawn(async move {
                let report = gateway.perform(op).await;
                if report_tx.send(report).is_err() {
                    debug!("operation finished after the UI loop stopped");
                }
            }));
        }
        AppCommand::OpenSsh { profile } => match deck.ssh_mode {
            SshMode::Embedded => match run_embedded_ssh(terminal, &deck.program, &profile).await {
                Ok(()) => app.set_status(format!("ssh session for {profile} ended")),
                Err(error) => {
                    error!("ssh into {profile} failed: {error:#}");
                    app.set_status(compact_error(&error));
                }
            },
            SshMode::External => {
                let Some(terminal_path) = console::resolve_terminal(deck.terminal.as_deref())
                else {
                    app.set_status("No terminal emulator found for ssh");
                    return;
                };
                match console::spawn_external(&terminal_path, &deck.program, &profile) {
                    Ok(_) => app.set_status(format!(
                        "ssh for {profile} opened in {}",
                        terminal_path.display()
                    )),
                    Err(error) => app.set_status(compact_error(&error)),
                }
            }
        },
        AppCommand::OpenDashboard { profile } => {
            match deck.dashboard.open(&deck.program, &profile).await {
                Ok(pid) => app.dashboard_opened(profile, pid),
                Err(error) => {
                    error!("dashboard for {profile} failed: {error:#}");
                    app.dashboard_closed(compact_error(&error));
                }
            }
        }
        AppCommand::CloseDashboard => match deck.dashboard.close().await {
            Ok(Some(profile)) => app.dashboard_closed(format!("Dashboard for {profile} closed")),
            Ok(None) => app.dashboard_closed("No dashboard is running"),
            Err(error) => app.dashboard_closed(compact_error(&error)),
        },
    }
}

async fn run_embedded_ssh(terminal: &mut TuiTerminal, program: &Path, profile: &str) -> Result<()> {
    suspend_terminal_for_subprocess(terminal)?;
    let run_result = console::run_embedded(program, profile).await;
    let restore_result = resume_terminal_after_subprocess(terminal);

    let status = match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => {
            return Err(anyhow::anyhow!(
                "{run_error:#}\nterminal resume error: {restore_error:#}"
            ));
        }
        (Err(error), _) => return Err(error),
        (_, Err(error)) => return Err(error),
        (Ok(status), Ok(())) => status,
    };

    if status.success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{TOOL_NAME} ssh exited with {status}"))
    }
}

fn suspend_terminal_for_subprocess(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode for subprocess")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen for subprocess")?;
    terminal
        .show_cursor()
        .context("failed to show cursor for subprocess")?;
    Ok(())
}

fn resume_terminal_after_subprocess(terminal: &mut TuiTerminal) -> Result<()> {
    enable_raw_mode().context("failed to re-enable raw mode after subprocess")?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)
        .context("failed to re-enter alternate screen after subprocess")?;
    terminal
        .clear()
        .context("failed to clear terminal after subprocess")?;
    Ok(())
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join(": ")
}
