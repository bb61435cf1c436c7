//! Rendering: header, the active collection table, footer and popups.
//!
//! Presentation only. Everything shown is read from the app; nothing here
//! mutates navigation state.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use rpglot_client_core::VERSION;
use rpglot_client_core::controller::SelectionController;
use rpglot_client_core::model::{CollectionKey, RowRef};
use rpglot_client_core::tui::InputMode;
use rpglot_client_core::util::format_timestamp;

use crate::app::{App, Connection, Transport};

// ============================================================
// Styles
// ============================================================

struct Styles;

impl Styles {
    fn header() -> Style {
        Style::default()
            .fg(Color::White)
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD)
    }

    fn tab_active() -> Style {
        Style::default()
            .fg(Color::Cyan)
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }

    fn dim() -> Style {
        Style::default().fg(Color::DarkGray)
    }

    fn table_header() -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn selected() -> Style {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    fn flash() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    fn key() -> Style {
        Style::default().fg(Color::Yellow)
    }

    fn error() -> Style {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    }
}

// ============================================================
// Frame
// ============================================================

pub fn render<T: Transport>(frame: &mut Frame, app: &App<T>) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Min(3),    // Table
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, chunks[0], app);
    render_table(frame, chunks[1], app.controller());
    render_footer(frame, chunks[2], app);

    if app.controller().is_detail_open() {
        render_detail(frame, area, app.controller());
    }
    if app.input().mode == InputMode::TimeJump {
        render_time_jump(
            frame,
            area,
            &app.input().time_jump_input,
            app.input().time_jump_error.as_deref(),
        );
    }
    if app.input().show_help {
        render_help(frame, area, app.is_live());
    }
}

fn render_header<T: Transport>(frame: &mut Frame, area: Rect, app: &App<T>) {
    let chunks = Layout::horizontal([
        Constraint::Length(21), // Time
        Constraint::Length(10), // Mode
        Constraint::Min(20),    // Tabs
        Constraint::Length(30), // Connection
    ])
    .split(area);

    let time = app
        .store()
        .current()
        .map(|s| format_timestamp(s.timestamp))
        .unwrap_or_else(|| "----".to_string());
    frame.render_widget(Paragraph::new(format!(" {time}")).style(Styles::header()), chunks[0]);

    let mode = if !app.is_live() {
        " HISTORY "
    } else if app.is_paused() {
        " PAUSED "
    } else {
        " LIVE "
    };
    frame.render_widget(Paragraph::new(mode).style(Styles::header()), chunks[1]);

    let active = app.controller().active_tab();
    let tabs: Vec<Span> = CollectionKey::all()
        .iter()
        .enumerate()
        .flat_map(|(i, tab)| {
            let style = if *tab == active {
                Styles::tab_active()
            } else {
                Styles::header()
            };
            [
                Span::styled(format!(" {}:", i + 1), Styles::header()),
                Span::styled(tab.label(), style),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(tabs)).style(Styles::header()), chunks[2]);

    let connection = match app.connection() {
        Connection::Connecting => "connecting...".to_string(),
        Connection::Connected => match app.session().username() {
            Some(user) => format!("{user}@{}", app.session().base_url()),
            None => app.session().base_url().to_string(),
        },
        Connection::Reconnecting => "reconnecting...".to_string(),
        Connection::ReauthRequired => "auth required".to_string(),
    };
    frame.render_widget(
        Paragraph::new(connection)
            .alignment(Alignment::Right)
            .style(Styles::header()),
        chunks[3],
    );
}

/// Column keys for the active tab: the view's columns, else the fields of
/// the first visible row.
fn table_columns(c: &SelectionController, rows: &[RowRef<'_>]) -> Vec<String> {
    let columns = c.catalog().columns_for(c.active_tab(), c.effective_view());
    if !columns.is_empty() {
        return columns.into_iter().map(str::to_string).collect();
    }
    rows.first()
        .map(|r| r.entries().into_iter().map(|(k, _)| k.to_string()).collect())
        .unwrap_or_default()
}

fn render_table(frame: &mut Frame, area: Rect, c: &SelectionController) {
    let tab = c.active_tab();
    let title = match c.effective_view() {
        Some(view) => format!(" {} [{}] ", tab.label(), view),
        None => format!(" {} ", tab.label()),
    };
    let block = Block::default().title(title).borders(Borders::ALL);

    if c.current().is_none() {
        frame.render_widget(Paragraph::new("Waiting for data...").block(block), area);
        return;
    }

    let rows = c.visible_rows();
    let columns = table_columns(c, &rows);
    let header = Row::new(
        columns
            .iter()
            .map(|col| Cell::from(c.catalog().column_label(tab, col).to_string())),
    )
    .style(Styles::table_header());

    let flash = c.flash();
    let mut selected_index = None;
    let body: Vec<Row> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let id = row.entity_id();
            if c.selected() == Some(&id) {
                selected_index = Some(i);
            }
            let cells = columns.iter().map(|col| {
                Cell::from(row.field(col).map(|v| v.to_string()).unwrap_or_default())
            });
            let style = if flash == Some(&id) {
                Styles::flash()
            } else {
                Style::default()
            };
            Row::new(cells).style(style)
        })
        .collect();

    let widths = vec![Constraint::Fill(1); columns.len().max(1)];
    let table = Table::new(body, widths)
        .header(header)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(Styles::selected());

    let mut state = TableState::default().with_selected(selected_index);
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_footer<T: Transport>(frame: &mut Frame, area: Rect, app: &App<T>) {
    let c = app.controller();
    let input = app.input();

    let line = if input.mode == InputMode::Filter {
        Line::from(vec![
            Span::styled("Filter: ", Styles::key()),
            Span::raw(format!("{}█", input.filter_input)),
        ])
    } else if let Some(msg) = &input.status_message {
        Line::from(Span::styled(msg.clone(), Styles::key()))
    } else if let Some(err) = app.store().error() {
        Line::from(Span::styled(err.to_string(), Styles::error()))
    } else {
        let mut spans = Vec::new();
        if let Some(pending) = c.pending() {
            spans.push(Span::styled(
                format!(
                    "Looking for {}={} in {} ",
                    pending.target_field,
                    pending.value,
                    pending.target_tab.label()
                ),
                Styles::key(),
            ));
        }
        if !c.state().filter_text.is_empty() {
            spans.push(Span::raw(format!("/{} ", c.state().filter_text)));
        }
        if let Some(filter) = &c.state().column_filter {
            spans.push(Span::raw(format!("[{filter}] ")));
        }
        spans.push(Span::styled(
            format!("{} rows  ?: help", c.visible_rows().len()),
            Styles::dim(),
        ));
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(line), area);
}

// ============================================================
// Popups
// ============================================================

/// Centered rectangle of `percent` of `area`, clamped to `min`.
fn popup_area(area: Rect, percent: u16, min: (u16, u16)) -> Rect {
    let scale = |v: u16| (u32::from(v) * u32::from(percent) / 100) as u16;
    let width = scale(area.width).max(min.0).min(area.width);
    let height = scale(area.height).max(min.1).min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

fn render_detail(frame: &mut Frame, area: Rect, c: &SelectionController) {
    let popup = popup_area(area, 70, (40, 10));
    frame.render_widget(Clear, popup);

    let tab = c.active_tab();
    let (title, lines) = match c.selected_row() {
        Some(row) => {
            let title = format!(" {} {} ", tab.label(), row.entity_id());
            let lines: Vec<Line> = row
                .entries()
                .into_iter()
                .map(|(key, value)| {
                    Line::from(vec![
                        Span::styled(
                            format!("{:<24}", c.catalog().column_label(tab, key)),
                            Styles::key(),
                        ),
                        Span::raw(value.to_string()),
                    ])
                })
                .collect();
            (title, lines)
        }
        None => (
            format!(" {} ", tab.label()),
            vec![Line::from(Span::styled("Row is no longer present", Styles::dim()))],
        ),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup,
    );
}

fn render_time_jump(frame: &mut Frame, area: Rect, input: &str, error: Option<&str>) {
    let popup = popup_area(area, 50, (50, 11));
    frame.render_widget(Clear, popup);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Input: ", Styles::key()),
            Span::styled(
                format!("{input}█"),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("Examples:", Styles::dim())),
        Line::from(Span::styled("  -1h        (relative to shown snapshot)", Styles::dim())),
        Line::from(Span::styled("  16:00      (time on shown day)", Styles::dim())),
        Line::from(Span::styled("  2026-02-07T17:00:00", Styles::dim())),
        Line::from(Span::styled("  1738944000 (unix timestamp)", Styles::dim())),
    ];
    if let Some(err) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("Error: {err}"), Styles::error())));
    }

    let block = Block::default()
        .title(" Jump to time (UTC) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}

fn render_help(frame: &mut Frame, area: Rect, is_live: bool) {
    let popup = popup_area(area, 60, (50, 20));
    frame.render_widget(Clear, popup);

    let mut bindings = vec![
        ("1-8, Tab", "switch tab"),
        ("j/k, ↑/↓", "move selection"),
        ("PgUp/PgDn", "move by page"),
        ("Home/End", "first / last row"),
        ("Enter", "toggle detail"),
        (">", "drill down"),
        ("Esc", "close detail, clear selection, clear column filter"),
        ("/", "filter"),
        ("v", "next view"),
    ];
    if is_live {
        bindings.push(("Space", "pause / resume"));
    } else {
        bindings.extend([
            ("←/→", "previous / next snapshot"),
            ("Shift+←/→", "one hour back / forward"),
            ("b", "jump to time"),
        ]);
    }
    bindings.extend([("?", "close help"), ("q, Ctrl+C", "quit")]);

    let lines: Vec<Line> = bindings
        .into_iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(format!("  {keys:<12}"), Styles::key()),
                Span::raw(what),
            ])
        })
        .collect();

    let block = Block::default()
        .title(format!(" rpglot-client {VERSION} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}
