use crate::create::{CreateForm, CreateOutcome};
use crate::gateway::{ClusterOp, OpReport};
use crate::input::Action;
use crate::model::{Cluster, ClusterSettings, FailureAdvice, Inventory};
use crate::policy::{EnabledActions, compute_enabled};
use chrono::{DateTime, Local};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Confirm,
    Create,
    Advice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Run(ClusterOp),
    OpenSsh { profile: String },
    OpenDashboard { profile: String },
    CloseDashboard,
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

pub struct App {
    running: bool,
    inventory: Inventory,
    selection: Option<String>,
    selected_index: Option<usize>,
    preferred_selection: Option<String>,
    enabled: EnabledActions,
    console_available: bool,
    busy: Option<String>,
    running_command: Option<String>,
    status: String,
    show_help: bool,
    pending_confirmation: Option<PendingConfirmation>,
    create_form: Option<CreateForm>,
    create_defaults: ClusterSettings,
    advice_queue: VecDeque<FailureAdvice>,
    last_refreshed: Option<DateTime<Local>>,
    dashboard_profile: Option<String>,
    tool: String,
    spinner: usize,
}

impl App {
    pub fn new(
        tool: String,
        preferred_selection: Option<String>,
        create_defaults: ClusterSettings,
        console_available: bool,
    ) -> Self {
        Self {
            running: true,
            inventory: Inventory::default(),
            selection: None,
            selected_index: None,
            preferred_selection: preferred_selection.filter(|name| !name.is_empty()),
            enabled: EnabledActions::NONE,
            console_available,
            busy: None,
            running_command: None,
            status: "Ready".to_string(),
            show_help: false,
            pending_confirmation: None,
            create_form: None,
            create_defaults,
            advice_queue: VecDeque::new(),
            last_refreshed: None,
            dashboard_profile: None,
            tool,
            spinner: 0,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        if !self.advice_queue.is_empty() {
            InputMode::Advice
        } else if self.create_form.is_some() {
            InputMode::Create
        } else if self.pending_confirmation.is_some() {
            InputMode::Confirm
        } else {
            InputMode::Normal
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn selected_cluster(&self) -> Option<&Cluster> {
        self.selection
            .as_deref()
            .and_then(|name| self.inventory.get(name))
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn enabled(&self) -> EnabledActions {
        self.enabled
    }

    pub fn busy(&self) -> Option<&str> {
        self.busy.as_deref()
    }

    pub fn running_command(&self) -> Option<&str> {
        self.running_command.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn create_form(&self) -> Option<&CreateForm> {
        self.create_form.as_ref()
    }

    pub fn create_defaults(&self) -> &ClusterSettings {
        &self.create_defaults
    }

    pub fn current_advice(&self) -> Option<&FailureAdvice> {
        self.advice_queue.front()
    }

    pub fn pending_advice_count(&self) -> usize {
        self.advice_queue.len()
    }

    pub fn last_refreshed(&self) -> Option<String> {
        self.last_refreshed
            .map(|time| time.format("%H:%M:%S").to_string())
    }

    pub fn dashboard_profile(&self) -> Option<&str> {
        self.dashboard_profile.as_deref()
    }

    pub fn spinner_frame(&self) -> usize {
        self.spinner
    }

    pub fn tick(&mut self) {
        if self.busy.is_some() {
            self.spinner = self.spinner.wrapping_add(1);
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        match self.mode() {
            InputMode::Advice => return self.apply_advice_action(action),
            InputMode::Create => return self.apply_form_action(action),
            InputMode::Confirm => return self.apply_confirm_action(action),
            InputMode::Normal => {}
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
            if matches!(action, Action::Dismiss) {
                return AppCommand::None;
            }
        }

        match action {
            Action::Quit => {
                self.request_quit();
                AppCommand::None
            }
            Action::Down => {
                self.move_selection(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_selection(-1);
                AppCommand::None
            }
            Action::Top => {
                self.select_row(0);
                AppCommand::None
            }
            Action::Bottom => {
                self.select_row(self.inventory.len().saturating_sub(1));
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::Refresh => self.dispatch(ClusterOp::Refresh),
            Action::StartCluster => self.start_selected(),
            Action::StopCluster => self.stop_selected(),
            Action::DeleteCluster => self.confirm_delete_selected(),
            Action::OpenSsh => self.ssh_selected(),
            Action::OpenDashboard => self.dashboard_selected(),
            Action::CloseDashboard => {
                if self.dashboard_profile.is_none() {
                    self.status = "No dashboard is running".to_string();
                    return AppCommand::None;
                }
                AppCommand::CloseDashboard
            }
            Action::CreateCluster => {
                if self.refuse_while_busy() {
                    return AppCommand::None;
                }
                self.create_form = Some(CreateForm::new(self.create_defaults.clone()));
                self.status = "Create cluster: Enter to continue, Esc to cancel".to_string();
                AppCommand::None
            }
            Action::Dismiss
            | Action::Submit
            | Action::NextField
            | Action::PrevField
            | Action::CycleLeft
            | Action::CycleRight
            | Action::Backspace
            | Action::InputChar(_)
            | Action::ConfirmYes
            | Action::ConfirmNo => AppCommand::None,
        }
    }

    fn apply_advice_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => {
                self.request_quit();
                AppCommand::None
            }
            Action::Dismiss | Action::Submit => {
                self.advice_queue.pop_front();
                AppCommand::None
            }
            _ => AppCommand::None,
        }
    }

    fn apply_confirm_action(&mut self, action: Action) -> AppCommand {
        let Some(pending) = self.pending_confirmation.take() else {
            return AppCommand::None;
        };
        match action {
            Action::ConfirmYes => {
                self.status = format!("Confirmed: {}", pending.prompt);
                match pending.command {
                    AppCommand::Run(op) => self.dispatch(op),
                    other => other,
                }
            }
            Action::ConfirmNo | Action::Dismiss => {
                self.status = "Action cancelled".to_string();
                AppCommand::None
            }
            Action::Quit => {
                self.pending_confirmation = Some(pending);
                self.request_quit();
                AppCommand::None
            }
            _ => {
                self.pending_confirmation = Some(pending);
                self.status = "Pending confirmation: press y to confirm or n to cancel".to_string();
                AppCommand::None
            }
        }
    }

    fn apply_form_action(&mut self, action: Action) -> AppCommand {
        let Some(mut form) = self.create_form.take() else {
            return AppCommand::None;
        };
        match action {
            Action::Quit => {
                self.create_form = Some(form);
                self.request_quit();
                AppCommand::None
            }
            Action::Dismiss => {
                if let CreateOutcome::Cancelled(settings) = form.cancel() {
                    self.create_defaults = settings;
                }
                self.status = "Create cancelled".to_string();
                AppCommand::None
            }
            Action::Submit => match form.submit() {
                CreateOutcome::Submit { settings, custom } => {
                    self.create_defaults = settings.clone();
                    let profile = settings.profile.clone();
                    let custom = custom.then_some(settings);
                    self.dispatch(ClusterOp::Start { profile, custom })
                }
                CreateOutcome::Pending => {
                    self.create_form = Some(form);
                    AppCommand::None
                }
                CreateOutcome::Cancelled(settings) => {
                    self.create_defaults = settings;
                    AppCommand::None
                }
            },
            other => {
                match other {
                    Action::NextField => form.move_focus(1),
                    Action::PrevField => form.move_focus(-1),
                    Action::CycleLeft => form.cycle(-1),
                    Action::CycleRight => form.cycle(1),
                    Action::Backspace => form.backspace(),
                    Action::InputChar(c) => form.input_char(c),
                    _ => {}
                }
                self.create_form = Some(form);
                AppCommand::None
            }
        }
    }

    fn start_selected(&mut self) -> AppCommand {
        let Some(profile) = self.require_enabled("Start", |enabled| enabled.start) else {
            return AppCommand::None;
        };
        self.dispatch(ClusterOp::Start {
            profile,
            custom: None,
        })
    }

    fn stop_selected(&mut self) -> AppCommand {
        let Some(profile) = self.require_enabled("Stop", |enabled| enabled.stop) else {
            return AppCommand::None;
        };
        self.dispatch(ClusterOp::Stop { profile })
    }

    fn confirm_delete_selected(&mut self) -> AppCommand {
        let Some(profile) = self.require_enabled("Delete", |enabled| enabled.delete) else {
            return AppCommand::None;
        };
        let prompt = format!("Delete cluster '{profile}'? (y/n)");
        self.status = prompt.clone();
        self.pending_confirmation = Some(PendingConfirmation {
            prompt,
            command: AppCommand::Run(ClusterOp::Delete { profile }),
        });
        AppCommand::None
    }

    fn ssh_selected(&mut self) -> AppCommand {
        let Some(profile) = self.require_enabled("SSH", |enabled| enabled.ssh) else {
            return AppCommand::None;
        };
        self.status = format!("Opening ssh session for {profile}");
        AppCommand::OpenSsh { profile }
    }

    fn dashboard_selected(&mut self) -> AppCommand {
        let Some(profile) = self.require_enabled("Dashboard", |enabled| enabled.dashboard) else {
            return AppCommand::None;
        };
        self.status = format!("Opening dashboard for {profile}");
        AppCommand::OpenDashboard { profile }
    }

    /// The selected profile, when the action is currently allowed for it.
    fn require_enabled(
        &mut self,
        label: &str,
        allowed: impl Fn(&EnabledActions) -> bool,
    ) -> Option<String> {
        if self.refuse_while_busy() {
            return None;
        }
        let Some(profile) = self.selection.clone() else {
            self.status = format!("{label}: select a cluster first");
            return None;
        };
        if !allowed(&self.enabled) {
            self.status = format!("{label} is not available for {profile}");
            return None;
        }
        Some(profile)
    }

    /// A tool invocation is never cut short, so quitting waits for it.
    fn request_quit(&mut self) {
        if let Some(label) = &self.busy {
            self.status = format!("Waiting for {label} to finish before exiting");
            return;
        }
        self.running = false;
        self.status = "Exit requested".to_string();
    }

    fn refuse_while_busy(&mut self) -> bool {
        let Some(label) = &self.busy else {
            return false;
        };
        self.status = format!("Busy: {label} is still running");
        true
    }

    /// Marks a tool operation as in flight. At most one is dispatched at a time.
    pub fn dispatch(&mut self, op: ClusterOp) -> AppCommand {
        if self.refuse_while_busy() {
            return AppCommand::None;
        }
        self.busy = Some(op.label());
        self.status = match &op {
            ClusterOp::Refresh => "Refreshing clusters".to_string(),
            ClusterOp::Start { profile, .. } => format!("Starting {profile}"),
            ClusterOp::Stop { profile } => format!("Stopping {profile}"),
            ClusterOp::Delete { profile } => format!("Deleting {profile}"),
        };
        AppCommand::Run(op)
    }

    /// Applies a finished operation: new inventory first, then the outcome.
    pub fn finish_op(&mut self, report: OpReport) {
        self.busy = None;
        self.running_command = None;
        let succeeded = report.succeeded();
        let failure = report
            .result
            .as_ref()
            .and_then(|result| result.failure_summary());
        self.set_inventory(report.inventory);

        self.status = match (&report.op, succeeded) {
            (ClusterOp::Refresh, _) => format!("Loaded {} cluster(s)", self.inventory.len()),
            (op, true) => format!("Finished {}", op.label()),
            (ClusterOp::Start { profile, .. }, false) if !report.advice.is_empty() => {
                format!("Start failed for {profile}")
            }
            (op, false) => format!(
                "{} failed: {}",
                op.label(),
                failure.unwrap_or_else(|| "unknown error".to_string())
            ),
        };

        if matches!(report.op, ClusterOp::Start { .. }) && !succeeded {
            self.advice_queue.extend(report.advice);
        }
    }

    /// Swaps in a new snapshot, keeping the selection only if it still exists.
    pub fn set_inventory(&mut self, inventory: Inventory) {
        self.inventory = inventory;
        self.last_refreshed = Some(Local::now());

        let keep = self
            .selection
            .as_deref()
            .is_some_and(|name| self.inventory.contains(name));
        if !keep {
            self.selection = None;
        }
        if self.selection.is_none()
            && let Some(preferred) = self.preferred_selection.take()
            && self.inventory.contains(&preferred)
        {
            self.selection = Some(preferred);
        }
        self.selected_index = self.resolve_row();
        self.recompute_enabled();
    }

    pub fn select(&mut self, name: &str) {
        self.selection = self
            .inventory
            .contains(name)
            .then(|| name.to_string());
        self.selected_index = self
            .selection
            .as_deref()
            .and_then(|name| self.inventory.row_of(name));
        self.recompute_enabled();
    }

    /// Rows can share a name, so the row is tracked alongside it.
    fn select_row(&mut self, row: usize) {
        let Some(name) = self
            .inventory
            .clusters()
            .get(row)
            .map(|cluster| cluster.name.clone())
        else {
            return;
        };
        self.selection = Some(name);
        self.selected_index = Some(row);
        self.recompute_enabled();
    }

    /// Keeps the previous row when it still holds the selected name.
    fn resolve_row(&self) -> Option<usize> {
        let name = self.selection.as_deref()?;
        self.selected_index
            .filter(|&row| {
                self.inventory
                    .clusters()
                    .get(row)
                    .is_some_and(|cluster| cluster.name == name)
            })
            .or_else(|| self.inventory.row_of(name))
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.inventory.len();
        if len == 0 {
            return;
        }
        let next = match self.selected_row() {
            Some(current) => (current as isize + delta).clamp(0, len as isize - 1) as usize,
            None => 0,
        };
        self.select_row(next);
    }

    fn recompute_enabled(&mut self) {
        self.enabled = compute_enabled(
            self.selection.as_deref(),
            &self.inventory,
            self.console_available,
        );
    }

    pub fn tool_started(&mut self, command_line: String) {
        self.running_command = Some(command_line);
    }

    pub fn tool_finished(&mut self) {
        self.running_command = None;
    }

    pub fn dashboard_opened(&mut self, profile: String, pid: Option<u32>) {
        self.status = match pid {
            Some(pid) => format!("Dashboard for {profile} running (pid {pid})"),
            None => format!("Dashboard for {profile} running"),
        };
        self.dashboard_profile = Some(profile);
    }

    pub fn dashboard_closed(&mut self, message: impl Into<String>) {
        self.dashboard_profile = None;
        self.status = message.into();
    }
}
