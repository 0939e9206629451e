//! UI rendering for the TUI.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use unrelative_core::TimeFormat;

use crate::app::{App, SettingsField, ViewMode};

/// Border color for the page list block
const BORDER_PAGES: Color = Color::Rgb(0, 150, 150);
/// Border color for the detail block
const BORDER_DETAIL: Color = Color::Rgb(80, 160, 80);
/// Border color for the settings panel
const BORDER_SETTINGS: Color = Color::Rgb(180, 100, 180);
/// Label color for form fields and metadata
const LABEL_COLOR: Color = Color::Rgb(100, 180, 180);
/// Dim gray for secondary text
const DIM: Color = Color::Rgb(128, 128, 128);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    match app.view_mode {
        ViewMode::PageList => render_page_list(frame, app),
        ViewMode::PageDetail => render_page_detail(frame, app),
        ViewMode::Settings => render_settings(frame, app),
    }
}

fn render_page_list(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Min(5),    // Table
        Constraint::Length(1), // Status
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "unrelative", chunks[0]);

    let rows: Vec<Row> = app
        .sessions
        .iter()
        .map(|session| {
            let state = if session.excluded {
                Span::styled("excluded", Style::default().fg(DIM))
            } else {
                Span::raw(format!("{}/{}", session.converted, session.page.len()))
            };
            Row::new(vec![
                Cell::from(session.path.display().to_string()),
                Cell::from(session.page.url().to_string()),
                Cell::from(state),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(35),
            Constraint::Percentage(50),
            Constraint::Percentage(15),
        ],
    )
    .header(
        Row::new(vec!["Snapshot", "URL", "Converted"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(BORDER_PAGES))
            .title(" Pages "),
    );

    frame.render_stateful_widget(table, chunks[1], &mut app.table_state);
    render_status(frame, app, chunks[2]);
    render_footer(
        frame,
        "j/k: move  Enter: detail  r: reload  s: settings  q: quit",
        chunks[3],
    );
}

fn render_page_detail(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Min(5),    // Elements
        Constraint::Length(1), // Footer
    ])
    .split(area);

    let Some(session) = app.selected_session() else {
        render_header(frame, "unrelative", chunks[0]);
        return;
    };

    render_header(frame, &format!("Page: {}", session.page.url()), chunks[0]);

    let rows: Vec<Row> = session
        .page
        .keys()
        .into_iter()
        .skip(app.detail_scroll)
        .filter_map(|key| session.page.element(key))
        .map(|el| {
            let raw = el.title().unwrap_or("(no title)").to_string();
            let mut region_style = Style::default();
            if let Some(color) = el.color {
                region_style = region_style.fg(Color::Rgb(color.rgb.0, color.rgb.1, color.rgb.2));
            }
            Row::new(vec![
                Cell::from(raw),
                Cell::from(Span::styled(el.region.clone(), region_style)),
            ])
        })
        .collect();

    let table = Table::new(rows, [Constraint::Percentage(50), Constraint::Percentage(50)])
        .header(
            Row::new(vec!["Raw timestamp", "Displayed"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_DETAIL))
                .title(format!(" Elements ({}) ", session.page.len())),
        );

    frame.render_widget(table, chunks[1]);
    render_footer(frame, "j/k: scroll  Esc: back  q: back", chunks[2]);
}

fn render_settings(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Length(8), // Form
        Constraint::Length(1), // Status
        Constraint::Min(0),
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "Settings", chunks[0]);

    let focused = |field: SettingsField| {
        if app.form.focus == field {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(LABEL_COLOR)
        }
    };

    let radio = |value: TimeFormat, label: &str| {
        if app.form.time_format == value {
            format!("(•) {label}")
        } else {
            format!("( ) {label}")
        }
    };

    let checkbox = if app.form.color_by_day { "[x]" } else { "[ ]" };
    let date_format = if app.form.date_format.is_empty() {
        Span::styled("auto", Style::default().fg(DIM))
    } else {
        Span::raw(app.form.date_format.clone())
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Time format   ", focused(SettingsField::TimeFormat)),
            Span::raw(format!(
                "{}  {}  {}",
                radio(TimeFormat::Auto, "auto"),
                radio(TimeFormat::Hour12, "12h"),
                radio(TimeFormat::Hour24, "24h"),
            )),
        ]),
        Line::from(vec![
            Span::styled("Color by day  ", focused(SettingsField::ColorByDay)),
            Span::raw(checkbox),
        ]),
        Line::from(vec![
            Span::styled("Date format   ", focused(SettingsField::DateFormat)),
            date_format,
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Tokens: YY M MM D DD (use YY, not YYYY)",
            Style::default().fg(DIM),
        )),
    ];

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(BORDER_SETTINGS))
            .title(" Display Settings "),
    );
    frame.render_widget(form, chunks[1]);

    render_status(frame, app, chunks[2]);
    render_footer(
        frame,
        "Tab: next field  Space/←→: change  Enter: save  Esc: back",
        chunks[4],
    );
}

fn render_header(frame: &mut Frame, title: &str, area: Rect) {
    let header = Paragraph::new(title)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let Some((message, is_error, _)) = &app.status else {
        return;
    };
    let color = if *is_error { Color::Red } else { Color::Green };
    let status = Paragraph::new(message.as_str()).style(Style::default().fg(color));
    frame.render_widget(status, area);
}

fn render_footer(frame: &mut Frame, hints: &str, area: Rect) {
    let footer = Paragraph::new(hints).style(Style::default().fg(DIM));
    frame.render_widget(footer, area);
}
