use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal viewer for log search results")]
pub struct Args {
    /// Results document to load (defaults to stdin)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Saved-views file (defaults to ~/.config/logsieve/views.json)
    #[arg(long)]
    pub views: Option<PathBuf>,

    /// Load this saved view on startup
    #[arg(long)]
    pub view: Option<String>,

    /// Initial query text
    #[arg(short, long)]
    pub query: Option<String>,

    /// Append diagnostics to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
