use std::{sync::mpsc, time::Duration};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::Backend, widgets::ListState};

use crate::editor::open_record_in_editor;
use crate::input::Ingest;
use crate::ui;
use crate::views::ViewStore;

mod ranges;
mod state;
mod table;
mod timespec;

pub use ranges::{CUSTOM_ROW_LABEL, RangeChoices, TimeRange, default_choices};
pub use state::{App, DEFAULT_COLUMNS, Focus, InputMode};
pub use table::{IndexError, LogTable, StructuralChange};
pub use timespec::{FormatError, TimeSpec, Unit};

fn move_selection(state: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0).min(len - 1);
    let next = (current as isize + delta).clamp(0, len as isize - 1) as usize;
    state.select(Some(next));
}

fn enter_range_select(app: &mut App) {
    app.range_select_state.select(Some(app.selected_range));
    app.input_error = None;
    app.input_mode = InputMode::RangeSelect;
}

fn enter_field_select(app: &mut App) {
    if app.field_panel_entries().is_empty() {
        app.status = Some("no fields to toggle yet".to_string());
        return;
    }
    if app.field_select_state.selected().is_none() {
        app.field_select_state.select(Some(0));
    }
    app.input_mode = InputMode::FieldSelect;
}

fn enter_view_select(app: &mut App, store: &ViewStore) {
    match store.names() {
        Ok(names) if names.is_empty() => {
            app.status = Some("no saved views".to_string());
        }
        Ok(names) => {
            app.view_names = names;
            app.view_select_state.select(Some(0));
            app.input_mode = InputMode::ViewSelect;
        }
        Err(err) => {
            app.status = Some(format!("failed to list views: {err}"));
        }
    }
}

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &ViewStore,
    rx: mpsc::Receiver<Ingest>,
) -> Result<()> {
    loop {
        for ingest in rx.try_iter() {
            match ingest {
                Ingest::Results(results) => app.apply_results(results),
                Ingest::Failed(message) => app.status = Some(message),
            }
        }

        if app.force_redraw {
            terminal.clear().ok();
            app.force_redraw = false;
        }

        terminal
            .draw(|f| ui::render(f, app))
            .context("drawing frame")?;

        if event::poll(Duration::from_millis(100)).context("polling for events")? {
            match event::read().context("reading event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break;
                    }

                    if app.show_help {
                        match key.code {
                            KeyCode::Esc | KeyCode::Char('?') => app.show_help = false,
                            KeyCode::Char('q') => break,
                            _ => {}
                        }
                        continue;
                    }

                    match app.input_mode {
                        InputMode::Normal => {
                            if !handle_normal_key(terminal, app, store, key)? {
                                break;
                            }
                        }
                        InputMode::QueryInput => handle_query_key(app, key),
                        InputMode::RangeSelect => handle_range_select_key(app, key),
                        InputMode::CustomRange => handle_custom_range_key(app, key),
                        InputMode::FieldSelect => handle_field_select_key(app, key),
                        InputMode::ViewSelect => handle_view_select_key(app, store, key),
                        InputMode::SaveView => handle_save_view_key(app, store, key),
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    Ok(())
}

fn handle_normal_key<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &ViewStore,
    key: KeyEvent,
) -> Result<bool> {
    if key.code == KeyCode::Char('?') {
        app.show_help = true;
        return Ok(true);
    }
    if key.code == KeyCode::Char('q') {
        return Ok(false);
    }

    match app.focus {
        Focus::Table => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.next(),
            KeyCode::Char('k') | KeyCode::Up => app.previous(),
            KeyCode::Char('g') => app.select_first(),
            KeyCode::Char('G') => app.select_last(),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.page_down();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.page_up();
            }
            KeyCode::Char('/') => {
                app.input_buffer = app.query.clone();
                app.input_error = None;
                app.input_mode = InputMode::QueryInput;
            }
            KeyCode::Char('t') => enter_range_select(app),
            KeyCode::Char('f') => enter_field_select(app),
            KeyCode::Char('v') => enter_view_select(app, store),
            KeyCode::Char('S') => {
                app.input_buffer.clear();
                app.input_error = None;
                app.input_mode = InputMode::SaveView;
            }
            KeyCode::Char('R') => app.reset_columns(),
            KeyCode::Char('e') => {
                if let Some(record) = app.current_record().cloned() {
                    open_record_in_editor(terminal, &record)?;
                    app.force_redraw = true;
                }
            }
            KeyCode::Enter | KeyCode::Tab | KeyCode::Right => {
                app.focus = Focus::Detail;
            }
            _ => {}
        },
        Focus::Detail => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.detail_down(1),
            KeyCode::Char('k') | KeyCode::Up => app.detail_up(1),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let half = (app.last_detail_height.max(1) / 2).max(1);
                app.detail_down(half);
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let half = (app.last_detail_height.max(1) / 2).max(1);
                app.detail_up(half);
            }
            KeyCode::Char('g') => app.reset_detail_position(),
            KeyCode::Char('G') => {
                let max = app
                    .detail_total_lines
                    .saturating_sub(app.last_detail_height.max(1));
                app.detail_scroll = max as u16;
            }
            KeyCode::Char('e') => {
                if let Some(record) = app.current_record().cloned() {
                    open_record_in_editor(terminal, &record)?;
                    app.force_redraw = true;
                }
            }
            KeyCode::Tab | KeyCode::Esc | KeyCode::Left => {
                app.focus = Focus::Table;
            }
            _ => {}
        },
    }
    Ok(true)
}

fn handle_query_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.input_buffer.clear();
            app.input_error = None;
        }
        KeyCode::Enter => {
            let pattern = app.input_buffer.clone();
            if app.apply_query(&pattern) {
                app.input_mode = InputMode::Normal;
                app.input_buffer.clear();
            }
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input_buffer.clear();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input_buffer.push(c);
        }
        _ => {}
    }
}

fn handle_range_select_key(app: &mut App, key: KeyEvent) {
    let rows = app.ranges.row_count();
    match key.code {
        KeyCode::Esc | KeyCode::Char('t') => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Down | KeyCode::Char('j') => move_selection(&mut app.range_select_state, rows, 1),
        KeyCode::Up | KeyCode::Char('k') => move_selection(&mut app.range_select_state, rows, -1),
        KeyCode::Char('g') => app.range_select_state.select(Some(0)),
        KeyCode::Char('G') => app.range_select_state.select(Some(rows - 1)),
        KeyCode::Enter => {
            let row = app.range_select_state.selected().unwrap_or(0);
            if app.select_range(row) {
                app.input_mode = InputMode::Normal;
            } else {
                // The synthetic row: ask for a custom range instead.
                app.input_buffer.clear();
                app.input_error = None;
                app.input_mode = InputMode::CustomRange;
            }
        }
        _ => {}
    }
}

fn handle_custom_range_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_buffer.clear();
            app.input_error = None;
            enter_range_select(app);
        }
        KeyCode::Enter => {
            let input = app.input_buffer.clone();
            match app.add_custom_range(&input) {
                Ok(()) => {
                    app.input_mode = InputMode::Normal;
                    app.input_buffer.clear();
                    app.input_error = None;
                }
                Err(err) => {
                    app.input_error = Some(err.to_string());
                }
            }
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input_buffer.clear();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input_buffer.push(c);
        }
        _ => {}
    }
}

fn handle_field_select_key(app: &mut App, key: KeyEvent) {
    let entries = app.field_panel_entries();
    match key.code {
        KeyCode::Esc | KeyCode::Char('f') => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            move_selection(&mut app.field_select_state, entries.len(), 1);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            move_selection(&mut app.field_select_state, entries.len(), -1);
        }
        KeyCode::Char('g') => app.field_select_state.select(Some(0)),
        KeyCode::Char('G') => {
            if !entries.is_empty() {
                app.field_select_state.select(Some(entries.len() - 1));
            }
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            if let Some(index) = app.field_select_state.selected() {
                if let Some((name, _, _)) = entries.get(index) {
                    let name = name.clone();
                    app.toggle_field(&name);
                }
            }
        }
        _ => {}
    }
}

fn handle_view_select_key(app: &mut App, store: &ViewStore, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('v') => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            move_selection(&mut app.view_select_state, app.view_names.len(), 1);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            move_selection(&mut app.view_select_state, app.view_names.len(), -1);
        }
        KeyCode::Enter => {
            let Some(name) = app
                .view_select_state
                .selected()
                .and_then(|index| app.view_names.get(index))
                .cloned()
            else {
                return;
            };
            match store.load(&name) {
                Ok(snapshot) => {
                    app.apply_view(&snapshot);
                    app.status = Some(format!("view {name:?} loaded"));
                }
                Err(err) => {
                    app.status = Some(format!("failed to load view {name:?}: {err}"));
                }
            }
            app.input_mode = InputMode::Normal;
        }
        _ => {}
    }
}

fn handle_save_view_key(app: &mut App, store: &ViewStore, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.input_buffer.clear();
            app.input_error = None;
        }
        KeyCode::Enter => {
            let name = app.input_buffer.trim().to_string();
            match store.save(&name, &app.snapshot()) {
                Ok(()) => {
                    app.status = Some(format!("view {name:?} saved"));
                    app.input_mode = InputMode::Normal;
                    app.input_buffer.clear();
                    app.input_error = None;
                }
                Err(err) => {
                    app.input_error = Some(err.to_string());
                }
            }
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input_buffer.clear();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.input_buffer.push(c);
        }
        _ => {}
    }
}
