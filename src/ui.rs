use chrono::{DateTime, Utc};
use ratatui::{
    prelude::*,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, CUSTOM_ROW_LABEL, Focus, InputMode};

const TIMESTAMP_WIDTH: u16 = 23;

pub fn render(f: &mut Frame, app: &mut App) {
    let full_area = f.size();
    f.render_widget(Clear, full_area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(full_area);

    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[0]);

    render_table(f, panes[0], app);
    render_detail(f, panes[1], app);
    render_status(f, vertical[1], app);

    if app.show_help {
        render_help(f, full_area);
        return;
    }

    match app.input_mode {
        InputMode::RangeSelect => render_range_select(f, full_area, app),
        InputMode::FieldSelect => render_field_select(f, full_area, app),
        InputMode::ViewSelect => render_view_select(f, full_area, app),
        _ => {}
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    // Borders plus the header row.
    app.last_table_height = area.height.saturating_sub(3) as usize;

    let columns = app.table.columns().to_vec();
    let mut widths: Vec<u16> = columns
        .iter()
        .map(|c| UnicodeWidthStr::width(c.as_str()) as u16)
        .collect();

    let mut rows: Vec<Row> = Vec::with_capacity(app.table.row_count());
    for row in 0..app.table.row_count() {
        let timestamp = app
            .table
            .row_timestamp(row)
            .map(format_timestamp)
            .unwrap_or_default();
        let mut cells =
            vec![Cell::from(timestamp).style(Style::default().fg(Color::DarkGray))];
        for (index, column) in columns.iter().enumerate() {
            let value = app.table.cell_value(row, column).unwrap_or("");
            widths[index] = widths[index].max(UnicodeWidthStr::width(value) as u16);
            cells.push(Cell::from(value.to_string()));
        }
        rows.push(Row::new(cells));
    }

    let mut constraints = vec![Constraint::Length(TIMESTAMP_WIDTH)];
    constraints.extend(widths.iter().map(|w| Constraint::Length((*w).clamp(4, 48))));

    let header: Vec<Cell> = std::iter::once(Cell::from(""))
        .chain(columns.iter().map(|column| {
            Cell::from(column.clone()).style(Style::default().add_modifier(Modifier::BOLD))
        }))
        .collect();

    let title = format!("Events ({})", app.table.row_count());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(match app.focus {
            Focus::Table => Style::default().fg(Color::Cyan),
            Focus::Detail => Style::default(),
        });

    let table = Table::new(rows, constraints)
        .header(Row::new(header))
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_detail(f: &mut Frame, area: Rect, app: &mut App) {
    app.last_detail_height = area.height.saturating_sub(2) as usize;

    let detail_text = match app.current_record() {
        Some(record) => {
            let mut lines: Vec<Line<'static>> = Vec::new();
            lines.push(Line::from(vec![
                Span::styled("timestamp: ", Style::default().fg(Color::Cyan)),
                Span::raw(format_timestamp(record.timestamp)),
            ]));
            for (key, value) in &record.fields {
                lines.push(Line::from(vec![
                    Span::styled(format!("{key}: "), Style::default().fg(Color::Cyan)),
                    Span::raw(value.clone()),
                ]));
            }
            Text::from(lines)
        }
        None => Text::from("No event selected"),
    };

    let inner_width = area.width.saturating_sub(2) as usize;
    app.detail_total_lines = wrapped_height(&detail_text, inner_width);
    let max_offset = app
        .detail_total_lines
        .saturating_sub(app.last_detail_height.max(1));
    if app.detail_scroll as usize > max_offset {
        app.detail_scroll = max_offset as u16;
    }

    let block = Block::default()
        .title("Details")
        .borders(Borders::ALL)
        .border_style(match app.focus {
            Focus::Detail => Style::default().fg(Color::Cyan),
            Focus::Table => Style::default(),
        });

    let detail = Paragraph::new(detail_text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    f.render_widget(detail, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &mut App) {
    let lines = match app.input_mode {
        InputMode::QueryInput => prompt_lines("query", &app.input_buffer, &app.input_error),
        InputMode::CustomRange => prompt_lines(
            "custom range (<start>..<end>, e.g. 2h..now)",
            &app.input_buffer,
            &app.input_error,
        ),
        InputMode::SaveView => prompt_lines("save view as", &app.input_buffer, &app.input_error),
        _ => {
            let range_label = app
                .ranges
                .label(app.selected_range)
                .unwrap_or_else(|| CUSTOM_ROW_LABEL.to_string());
            let mut first = format!(
                "range: {range_label}  |  {}/{} events",
                app.table.row_count(),
                app.all_events.len()
            );
            if !app.query.is_empty() {
                first.push_str(&format!("  |  /{}", app.query));
            }
            let second = match (&app.status, app.search_request()) {
                (Some(status), _) => status.clone(),
                (None, Some(request)) => request.param_line(Utc::now()),
                (None, None) => String::new(),
            };
            vec![Line::from(first), Line::from(second)]
        }
    };
    f.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn prompt_lines(label: &str, buffer: &str, error: &Option<String>) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(buffer.to_string()),
        Span::styled("█", Style::default().fg(Color::Cyan)),
    ])];
    match error {
        Some(error) => lines.push(Line::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )),
        None => lines.push(Line::from("Enter to accept, Esc to cancel")),
    }
    lines
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4)).max(20);
    let height = height.min(area.height.saturating_sub(2)).max(5);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_range_select(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = (0..app.ranges.row_count())
        .filter_map(|row| app.ranges.label(row))
        .enumerate()
        .map(|(row, label)| {
            if row == app.ranges.len() {
                ListItem::new(label).style(Style::default().fg(Color::Yellow))
            } else {
                ListItem::new(label)
            }
        })
        .collect();

    let height = (items.len() as u16).saturating_add(2);
    let popup = centered_popup(area, 44, height);
    let list = List::new(items)
        .block(Block::default().title("Time Range").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");

    f.render_widget(Clear, popup);
    f.render_stateful_widget(list, popup, &mut app.range_select_state);
}

fn render_field_select(f: &mut Frame, area: Rect, app: &mut App) {
    let entries = app.field_panel_entries();
    let items: Vec<ListItem> = entries
        .iter()
        .map(|(name, count, visible)| {
            let marker = if *visible { "[x]" } else { "[ ]" };
            let label = if *count > 0 {
                format!("{marker} {name} ({count})")
            } else {
                format!("{marker} {name}")
            };
            ListItem::new(label)
        })
        .collect();

    let height = (items.len() as u16).saturating_add(2).min(20);
    let popup = centered_popup(area, 44, height);
    let list = List::new(items)
        .block(
            Block::default()
                .title("Columns (Space toggles)")
                .borders(Borders::ALL),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");

    f.render_widget(Clear, popup);
    f.render_stateful_widget(list, popup, &mut app.field_select_state);
}

fn render_view_select(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .view_names
        .iter()
        .map(|name| ListItem::new(name.clone()))
        .collect();

    let height = (items.len() as u16).saturating_add(2).min(20);
    let popup = centered_popup(area, 44, height);
    let list = List::new(items)
        .block(Block::default().title("Load View").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");

    f.render_widget(Clear, popup);
    f.render_stateful_widget(list, popup, &mut app.view_select_state);
}

#[derive(Clone, Copy)]
struct Shortcut {
    context: &'static str,
    keys: &'static str,
    description: &'static str,
}

fn all_shortcuts() -> Vec<Shortcut> {
    vec![
        Shortcut {
            context: "Global",
            keys: "q, Ctrl+C",
            description: "Quit",
        },
        Shortcut {
            context: "Global",
            keys: "?",
            description: "Toggle help",
        },
        Shortcut {
            context: "Events",
            keys: "j/k, Up/Down",
            description: "Move selection",
        },
        Shortcut {
            context: "Events",
            keys: "Ctrl+d / Ctrl+u",
            description: "Half-page down/up",
        },
        Shortcut {
            context: "Events",
            keys: "g / G",
            description: "Jump to top/bottom",
        },
        Shortcut {
            context: "Events",
            keys: "/",
            description: "Edit query",
        },
        Shortcut {
            context: "Events",
            keys: "t",
            description: "Pick time range",
        },
        Shortcut {
            context: "Events",
            keys: "f",
            description: "Toggle columns",
        },
        Shortcut {
            context: "Events",
            keys: "v / S",
            description: "Load / save view",
        },
        Shortcut {
            context: "Events",
            keys: "R",
            description: "Reset columns",
        },
        Shortcut {
            context: "Events",
            keys: "e",
            description: "Open record in $EDITOR",
        },
        Shortcut {
            context: "Events",
            keys: "Enter, Tab, Right",
            description: "Focus details",
        },
        Shortcut {
            context: "Details",
            keys: "j/k, Ctrl+d/u, g/G",
            description: "Scroll details",
        },
        Shortcut {
            context: "Details",
            keys: "Tab, Left, Esc",
            description: "Back to events",
        },
    ]
}

fn render_help(f: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    let mut entries = all_shortcuts();
    entries.sort_by(|a, b| a.context.cmp(b.context));
    let mut current_context: Option<&str> = None;
    for sc in entries {
        if current_context != Some(sc.context) {
            if current_context.is_some() {
                lines.push(Line::from(""));
            }
            current_context = Some(sc.context);
            lines.push(Line::styled(
                sc.context,
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:20}", sc.keys),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(sc.description),
        ]));
    }

    let width = (area.width.saturating_sub(10)).min(90).max(50);
    let needed_height = (lines.len() as u16).saturating_add(2);
    let max_allowed = area.height.saturating_sub(2);
    let height = needed_height.min(max_allowed).max(8);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup = Rect::new(x, y, width, height);

    let block = Block::default().title("Shortcuts").borders(Borders::ALL);
    let help = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup);
    f.render_widget(help, popup);
}

fn wrapped_height(text: &Text<'_>, width: usize) -> usize {
    let effective_width = width.max(1);
    let mut total = 0usize;
    for line in &text.lines {
        let line_width: usize = line
            .spans
            .iter()
            .map(|s| UnicodeWidthStr::width(s.content.as_ref()))
            .sum();
        let wrapped = if line_width == 0 {
            1
        } else {
            line_width.div_ceil(effective_width)
        };
        total += wrapped.max(1);
    }
    total
}
