mod app;
mod args;
mod editor;
mod input;
mod model;
mod query;
mod ui;
mod views;

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use crate::app::App;
use crate::args::Args;
use crate::input::{resolve_input_source, spawn_reader};
use crate::views::ViewStore;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let store = ViewStore::new(args.views.clone().unwrap_or_else(default_views_path));

    let mut app = App::new();
    if let Some(query) = &args.query {
        app.set_query_text(query);
    }
    if let Some(name) = &args.view {
        match store.load(name) {
            Ok(snapshot) => app.apply_view(&snapshot),
            Err(err) => app.status = Some(format!("failed to load view {name:?}: {err}")),
        }
    }

    let input_source = resolve_input_source(&args)?;
    let (tx, rx) = mpsc::channel();
    spawn_reader(input_source, tx);

    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal")?;

    let res = app::run_app(&mut terminal, &mut app, &store, rx);

    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("leaving alternate screen")?;
    terminal.show_cursor().ok();

    if let Err(err) = res {
        eprintln!("error: {err:?}");
    }

    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {path:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn default_views_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".config")
            .join("logsieve")
            .join("views.json"),
        None => PathBuf::from("logsieve-views.json"),
    }
}
