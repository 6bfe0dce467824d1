use std::{
    fs::File,
    io::{self, IsTerminal, Read},
    path::PathBuf,
    sync::mpsc,
    thread,
};

use anyhow::{Context, Result};

use crate::{args::Args, model::SearchResults};

pub enum InputSource {
    Stdin,
    File(PathBuf),
    StdinPipe(File),
}

pub fn resolve_input_source(args: &Args) -> Result<InputSource> {
    if let Some(path) = args.file.clone() {
        Ok(InputSource::File(path))
    } else if io::stdin().is_terminal() {
        Ok(InputSource::Stdin)
    } else {
        let file = File::open("/dev/stdin").context("opening /dev/stdin")?;
        Ok(InputSource::StdinPipe(file))
    }
}

/// What the reader thread delivers to the UI thread. Decoding happens off
/// the UI thread; only the finished result crosses the channel.
pub enum Ingest {
    Results(SearchResults),
    Failed(String),
}

pub fn spawn_reader(input: InputSource, tx: mpsc::Sender<Ingest>) {
    thread::spawn(move || {
        let text = match read_document(input) {
            Ok(text) => text,
            Err(err) => {
                let _ = tx.send(Ingest::Failed(format!("failed to read input: {err:#}")));
                return;
            }
        };
        match SearchResults::parse(&text) {
            Ok(results) => {
                let _ = tx.send(Ingest::Results(results));
            }
            Err(err) => {
                let _ = tx.send(Ingest::Failed(format!("failed to decode results: {err:#}")));
            }
        }
    });
}

fn read_document(input: InputSource) -> Result<String> {
    match input {
        InputSource::Stdin => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
        InputSource::File(path) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading {path:?}"))
        }
        InputSource::StdinPipe(mut file) => {
            let mut text = String::new();
            file.read_to_string(&mut text)
                .context("reading piped stdin")?;
            Ok(text)
        }
    }
}
