use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Down,
    Up,
    Top,
    Bottom,
    Refresh,
    StartCluster,
    StopCluster,
    DeleteCluster,
    OpenSsh,
    OpenDashboard,
    CloseDashboard,
    CreateCluster,
    ToggleHelp,
    Dismiss,
    Submit,
    NextField,
    PrevField,
    CycleLeft,
    CycleRight,
    Backspace,
    InputChar(char),
    ConfirmYes,
    ConfirmNo,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Confirm => map_confirm_key(key),
        InputMode::Create => map_form_key(key),
        InputMode::Advice => map_advice_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('s') => Some(Action::StartCluster),
        KeyCode::Char('x') => Some(Action::StopCluster),
        KeyCode::Char('D') | KeyCode::Delete => Some(Action::DeleteCluster),
        KeyCode::Char('h') => Some(Action::OpenSsh),
        KeyCode::Char('b') => Some(Action::OpenDashboard),
        KeyCode::Char('B') => Some(Action::CloseDashboard),
        KeyCode::Char('c') | KeyCode::Char('n') => Some(Action::CreateCluster),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Esc => Some(Action::Dismiss),
        _ => None,
    }
}

fn map_confirm_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(Action::ConfirmYes),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Action::ConfirmNo),
        _ => None,
    }
}

fn map_form_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::Dismiss),
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(Action::PrevField),
        KeyCode::Left => Some(Action::CycleLeft),
        KeyCode::Right => Some(Action::CycleRight),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c)
            if !key.modifiers.contains(KeyModifiers::CONTROL)
                && !key.modifiers.contains(KeyModifiers::ALT) =>
        {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

fn map_advice_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') | KeyCode::Char('q') => {
            Some(Action::Dismiss)
        }
        _ => None,
    }
}
