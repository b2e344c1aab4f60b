use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wpy_runtime::config::parse_size;
use wpy_runtime::{fatal, ExitStatus, InputKind, ReplEvent, RuntimeConfig};
use wpy_wasi::host;

#[derive(Parser, Debug)]
#[command(name = "wpy", version, about = "Run wpy scripts, or an interactive session")]
struct Cli {
    /// Managed heap size in bytes (accepts k/M suffixes)
    #[arg(long, value_name = "N", value_parser = heap_size)]
    heap_size: Option<usize>,

    /// Program passed in as a string
    #[arg(short = 'c', value_name = "CMD", conflicts_with = "file")]
    command: Option<String>,

    /// Script file to run
    file: Option<PathBuf>,
}

fn heap_size(raw: &str) -> Result<usize, String> {
    parse_size(raw).ok_or_else(|| format!("invalid size '{}'", raw))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WPY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Feed stdin to the event REPL byte by byte until it exits or input ends.
fn repl_stdin() -> ExitStatus {
    host::init_repl();
    for byte in std::io::stdin().lock().bytes() {
        let Ok(c) = byte else { break };
        if let ReplEvent::Exit(status) = host::repl_char(c) {
            return status;
        }
    }
    ExitStatus::SUCCESS
}

fn main() -> ExitCode {
    init_tracing();
    fatal::install_panic_hook();
    let cli = Cli::parse();

    let mut config = RuntimeConfig::from_env();
    if let Some(n) = cli.heap_size {
        config = config.with_heap_size(n);
    }

    let script = match (&cli.command, &cli.file) {
        (Some(cmd), _) => Some(cmd.clone()),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(src) => {
                config.source_name = path.display().to_string();
                Some(src)
            }
            Err(e) => {
                eprintln!("wpy: can't open file '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) => None,
    };

    host::boot(config);
    let status = match script {
        Some(src) => host::run(&src, InputKind::Statements),
        None => repl_stdin(),
    };
    ExitCode::from(status.0)
}
