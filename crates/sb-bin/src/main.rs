//! Scrollback entrypoint: feed text through a per-window history store and
//! replay the tail of it, styled, onto the terminal.

use anyhow::{Context, Result};
use clap::Parser;
use core_history::{
    HistoryCursor, HistoryStore, Rewind, StyleFlags, TextAttributes, Validation,
};
use core_target::TerminalTarget;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "scrollback", version, about = "Replay the tail of a styled output history")]
struct Args {
    /// Input file (UTF-8 text); stdin when omitted.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `scrollback.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// How many paragraphs to replay from the end.
    #[arg(long, short = 'n', default_value_t = 10)]
    pub paragraphs: usize,
    /// Replay text only, suppressing style and colour changes.
    #[arg(long)]
    pub plain: bool,
    /// Window number carried into log output.
    #[arg(long, default_value_t = 0)]
    pub window: u8,
}

fn init_logging() {
    // Logging is opt-in through RUST_LOG; stay quiet otherwise.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) => {
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
        }
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading stdin")?;
            Ok(input)
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let config = core_config::load_from(args.config.clone())?;

    let seed = TextAttributes::new(
        1,
        StyleFlags::ROMAN,
        config.file.colours.foreground,
        config.file.colours.background,
    );
    let mut store = HistoryStore::new(
        args.window,
        config.file.history.max_size,
        config.file.history.increment,
        seed,
    );
    store.set_removal_hook(Box::new(|a1: i16, a2: i16| {
        debug!(target: "scrollback", a1, a2, "paragraph dropped");
    }));

    let input = read_input(args.path.as_ref())?;
    store.store_text(&input)?;
    info!(
        target: "scrollback",
        window = store.window(),
        stored = store.space_used(),
        allocated = store.allocated_size(),
        "input stored"
    );

    let mut cursor = HistoryCursor::from_front(&store, Validation::Enforced);
    let mut rewound = 0usize;
    while rewound < args.paragraphs {
        match cursor.rewind_paragraph(&store)? {
            Rewind::Paragraph { .. } => rewound += 1,
            Rewind::Start => break,
        }
    }
    debug!(target: "scrollback", rewound, "replaying");

    if rewound > 0 {
        let mut target = TerminalTarget::to_stdout();
        cursor.repeat_paragraphs(&store, &mut target, rewound, !args.plain, true)?;
        target.flush()?;
    }
    Ok(())
}
