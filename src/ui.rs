use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, InputMode};
use crate::create::{CreateField, CreateForm, CreateStage, ProfileChoice};
use crate::model::CLUSTER_HEADERS;

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_clusters(frame, root[1], app);
    render_action_bar(frame, root[2], app);
    render_footer(frame, root[3], app);

    if app.show_help() {
        render_help_modal(frame, app);
    }
    if let Some(form) = app.create_form() {
        render_create_modal(frame, form);
    }
    if app.current_advice().is_some() {
        render_advice_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut left = Vec::new();
    push_powerline_segment(&mut left, " ⎈ minideck ", Color::Black, ACCENT, PL_A);
    let tool = if app.tool().is_empty() {
        "minikube not found".to_string()
    } else {
        compact_text(app.tool(), 48)
    };
    push_powerline_segment(&mut left, format!(" {tool} "), Color::White, PL_A, BG);

    let right = build_right_header_line(app);
    let right_width = spans_width(&right.spans) as u16;
    if area.width < 42 || right_width == 0 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(left)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right).style(Style::default().bg(BG)),
        chunks[1],
    );
}

fn build_right_header_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    let mut next_bg = BG;
    let inventory = app.inventory();

    let mut segments = vec![(
        format!(" {} clusters  {} running ", inventory.len(), inventory.running_count()),
        PL_B,
    )];
    if let Some(time) = app.last_refreshed() {
        segments.push((format!(" 󰑓 {time} "), PL_C));
    }
    if let Some(profile) = app.dashboard_profile() {
        segments.push((format!(" 󰕮 {} ", compact_text(profile, 16)), PL_A));
    }

    for (content, bg) in segments.into_iter().rev() {
        push_powerline_segment_rtl(&mut spans, content, Color::White, bg, next_bg);
        next_bg = bg;
    }
    Line::from(spans)
}

fn render_clusters(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.selected_cluster() {
        Some(cluster) if !cluster.status.is_empty() => format!(
            "Clusters ({})  {} {}",
            app.inventory().len(),
            cluster.name,
            cluster.status
        ),
        _ => format!("Clusters ({})", app.inventory().len()),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));

    if app.inventory().is_empty() {
        let message = if app.busy().is_some() {
            "Loading clusters…"
        } else {
            "No clusters. Press c to create one or r to refresh."
        };
        let panel = Paragraph::new(Text::from(message))
            .alignment(Alignment::Center)
            .block(block)
            .style(Style::default().fg(MUTED));
        frame.render_widget(panel, area);
        return;
    }

    let header_row = Row::new(CLUSTER_HEADERS.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = app.inventory().clusters().iter().map(|cluster| {
        let status_color = if cluster.is_running() {
            ACCENT
        } else if cluster.status.is_empty() {
            MUTED
        } else {
            WARN
        };
        let cells = cluster
            .table_cells()
            .into_iter()
            .enumerate()
            .map(move |(index, value)| {
                let fg = if index == 1 { status_color } else { Color::White };
                Cell::from(value).style(Style::default().fg(fg))
            });
        Row::new(cells)
    });

    let table = Table::new(rows, column_constraints(CLUSTER_HEADERS.len()))
        .header(header_row)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(app.selected_row());
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_action_bar(frame: &mut Frame, area: Rect, app: &App) {
    let idle = app.busy().is_none();
    let mut spans = Vec::new();
    for (key, label, enabled) in action_bar_entries(app) {
        let enabled = enabled && idle;
        let (key_style, label_style) = if enabled {
            (
                Style::default().fg(Color::Black).bg(ACCENT),
                Style::default().fg(Color::White),
            )
        } else {
            (
                Style::default().fg(MUTED).bg(PANEL),
                Style::default().fg(MUTED).add_modifier(Modifier::DIM),
            )
        };
        spans.push(Span::styled(format!(" {key} "), key_style));
        spans.push(Span::styled(format!(" {label}  "), label_style));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn action_bar_entries(app: &App) -> Vec<(&'static str, &'static str, bool)> {
    let enabled = app.enabled();
    vec![
        ("s", "start", enabled.start),
        ("x", "stop", enabled.stop),
        ("D", "delete", enabled.delete),
        ("h", "ssh", enabled.ssh),
        ("b", "dashboard", enabled.dashboard),
        ("c", "create", true),
        ("r", "refresh", true),
    ]
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let confirming = matches!(app.mode(), InputMode::Confirm);
    let status_text = app
        .pending_confirmation_prompt()
        .unwrap_or_else(|| app.status())
        .to_string();

    let (mode_label, mode_bg) = match app.mode() {
        InputMode::Normal => (" 󰘳 nrm ", PL_A),
        InputMode::Confirm => (" 󰀦 cfm ", WARN),
        InputMode::Create => (" 󰐕 new ", PL_C),
        InputMode::Advice => (" 󰅚 err ", ERROR),
    };
    let mode_fg = if mode_bg == WARN || mode_bg == ERROR {
        Color::Black
    } else {
        Color::White
    };
    let (status_fg, status_bg) = if confirming {
        (Color::Black, WARN)
    } else {
        (Color::White, PL_B)
    };

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, mode_label, mode_fg, mode_bg, status_bg);
    let width_hint = area.width.saturating_sub(24).max(24) as usize;
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(&status_text, width_hint)),
        status_fg,
        status_bg,
        BG,
    );

    let right = busy_spans(app);
    let right_width = (spans_width(&right) as u16).min(area.width.saturating_sub(28));
    if right_width == 0 {
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(right))
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn busy_spans(app: &App) -> Vec<Span<'static>> {
    let Some(label) = app.busy() else {
        return Vec::new();
    };
    let frame = SPINNER[app.spinner_frame() % SPINNER.len()];
    let detail = app
        .running_command()
        .map(|command| compact_text(command, 48))
        .unwrap_or_else(|| label.to_string());
    vec![
        Span::styled(format!("{frame} "), Style::default().fg(WARN)),
        Span::styled(format!("{detail} "), Style::default().fg(MUTED)),
    ]
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let selected = app.selection().unwrap_or("none");
    let mut lines = vec![
        Line::from(format!("minideck help  selected:{selected}")),
        Line::from(""),
    ];
    for line in help_lines() {
        lines.push(Line::from(line));
    }
    let defaults = app.create_defaults();
    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "Create defaults: profile {}  {} CPUs  {} MB",
        defaults.profile, defaults.cpus, defaults.memory_mb
    )));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(modal, area);
}

fn help_lines() -> Vec<&'static str> {
    vec![
        "Move: j/k or arrows  g/G first/last",
        "Refresh: r or F5",
        "Start: s (stopped clusters)  Stop: x (running clusters)",
        "Delete: D or Delete, then y to confirm",
        "SSH: h (running clusters)",
        "Dashboard: b open for selection  B close",
        "Create: c or n, Enter to continue, Tab to switch fields, ←/→ to choose",
        "Help: ?  Quit: q or Ctrl+C",
        "",
        "Only one minikube command runs at a time. Keys are refused while it is busy.",
    ]
}

fn render_create_modal(frame: &mut Frame, form: &CreateForm) {
    let area = centered_rect(60, 50, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = match form.stage() {
        CreateStage::Profile => profile_stage_lines(form),
        CreateStage::Custom => custom_stage_lines(form),
    };
    if let Some(error) = form.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(ERROR),
        )));
    }

    let title = match form.stage() {
        CreateStage::Profile => "Create Cluster",
        CreateStage::Custom => "Custom Values",
    };
    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

fn profile_stage_lines(form: &CreateForm) -> Vec<Line<'static>> {
    let button = |label: &'static str, active: bool| {
        let style = if active {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        Span::styled(format!(" {label} "), style)
    };

    vec![
        Line::from("Profile name"),
        Line::from(vec![
            Span::styled(
                format!(" {}", form.profile_input()),
                Style::default().fg(Color::White).bg(BG),
            ),
            Span::styled("▏", Style::default().fg(ACCENT).bg(BG)),
        ]),
        Line::from(""),
        Line::from(vec![
            button(
                "Use Default Values",
                form.choice() == ProfileChoice::UseDefaults,
            ),
            Span::raw("  "),
            button("Set Custom Values", form.choice() == ProfileChoice::SetCustom),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Tab switch  Enter continue  Esc cancel",
            Style::default().fg(MUTED),
        )),
    ]
}

fn custom_stage_lines(form: &CreateForm) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(format!("Profile: {}", form.profile_input().trim())),
        Line::from(""),
    ];
    for field in CreateField::ALL {
        let focused = form.focused_field() == field;
        let value = form.field_value(field);
        let value = match field {
            CreateField::Driver | CreateField::ContainerRuntime => format!("◂ {value} ▸"),
            CreateField::Cpus | CreateField::Memory => format!("{value}▏"),
        };
        let value_style = if focused {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<18}", field.label()),
                Style::default().fg(if focused { ACCENT } else { MUTED }),
            ),
            Span::styled(value, value_style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab next field  ←/→ choose  Enter create  Esc cancel",
        Style::default().fg(MUTED),
    )));
    lines
}

fn render_advice_modal(frame: &mut Frame, app: &App) {
    let Some(advice) = app.current_advice() else {
        return;
    };
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    for (label, text) in advice.rows() {
        lines.push(Line::from(Span::styled(
            format!("{label}:"),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(text.to_string()));
        lines.push(Line::from(""));
    }
    if lines.is_empty() {
        lines.push(Line::from("minikube reported an error without details."));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "Enter to dismiss",
        Style::default().fg(MUTED),
    )));

    let remaining = app.pending_advice_count().saturating_sub(1);
    let title = if remaining > 0 {
        format!("minikube start failed ({remaining} more)")
    } else {
        "minikube start failed".to_string()
    };
    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ERROR))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn column_constraints(columns: usize) -> Vec<Constraint> {
    let width = (100 / columns.max(1) as u16).max(1);
    (0..columns.max(1))
        .map(|_| Constraint::Percentage(width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{compact_text, render};
    use crate::app::App;
    use crate::input::Action;
    use crate::gateway::{ClusterOp, OpReport};
    use crate::model::{Cluster, ClusterSettings, FailureAdvice, Inventory};
    use crate::runner::CommandResult;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).expect("terminal");
        terminal.draw(|frame| render(frame, app)).expect("draw");
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app_with(clusters: Vec<Cluster>) -> App {
        let mut app = App::new(
            "/usr/local/bin/minikube".to_string(),
            Some("default".to_string()),
            ClusterSettings::default(),
            true,
        );
        app.set_inventory(Inventory::from_clusters(clusters));
        app
    }

    #[test]
    fn table_shows_headers_and_cluster_values() {
        let app = app_with(vec![Cluster {
            status: "Running".to_string(),
            cpus: Some(2),
            memory_mb: Some(2400),
            driver: Some("docker".to_string()),
            ..Cluster::new("default")
        }]);
        let text = screen(&app);

        assert!(text.contains("Driver"));
        assert!(text.contains("Memory"));
        assert!(text.contains("default"));
        assert!(text.contains("Running"));
        assert!(text.contains("2400"));
    }

    #[test]
    fn empty_inventory_hints_at_create() {
        let app = app_with(Vec::new());
        assert!(screen(&app).contains("No clusters"));
    }

    #[test]
    fn advice_modal_lists_non_empty_rows_only() {
        let mut app = app_with(vec![Cluster::new("default")]);
        let _ = app.apply_action(Action::StartCluster);
        app.finish_op(OpReport {
            op: ClusterOp::Start {
                profile: "default".to_string(),
                custom: None,
            },
            result: Some(CommandResult::default()),
            advice: vec![
                FailureAdvice {
                    error_code: "GUEST_DRIVER".to_string(),
                    advice: "install docker".to_string(),
                    ..FailureAdvice::default()
                },
                FailureAdvice::default(),
            ],
            inventory: Inventory::from_clusters(vec![Cluster::new("default")]),
        });
        let text = screen(&app);

        assert!(text.contains("minikube start failed (1 more)"));
        assert!(text.contains("GUEST_DRIVER"));
        assert!(text.contains("install docker"));
        assert!(!text.contains("Link to documentation"));
    }

    #[test]
    fn compact_text_truncates_with_ellipsis() {
        assert_eq!(compact_text("minikube", 20), "minikube");
        assert_eq!(compact_text("minikube", 5), "mini…");
        assert_eq!(compact_text("minikube", 1), "…");
    }
}
