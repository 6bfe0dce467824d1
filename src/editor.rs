use std::{env, fs, process::Command};

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::Backend};

use crate::model::LogEvent;

pub fn open_record_in_editor<B: Backend>(
    terminal: &mut Terminal<B>,
    record: &LogEvent,
) -> Result<()> {
    // Leave the TUI cleanly.
    disable_raw_mode().ok();
    let mut stdout = std::io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    let result = (|| -> Result<()> {
        let mut path = env::temp_dir();
        let sanitized_ts: String = record
            .timestamp
            .to_rfc3339()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        path.push(format!("logsieve-{sanitized_ts}.json"));

        let contents = serde_json::to_string_pretty(&record.to_json())?;
        fs::write(&path, contents)?;

        let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
        let status = Command::new(editor).arg(&path).status();
        match status {
            Ok(s) if !s.success() => {
                eprintln!("Editor exited with status: {s}");
            }
            Err(err) => {
                eprintln!("Failed to launch editor: {err}");
            }
            _ => {}
        }
        Ok(())
    })();

    // Restore the TUI.
    execute!(stdout, EnterAlternateScreen).ok();
    enable_raw_mode().ok();
    terminal.clear()?;

    result
}
