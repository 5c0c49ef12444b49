mod api;
mod cli;
mod config;
mod logs;

use std::{io, process};

use tracing_subscriber::EnvFilter;

use cli::CliError;
use config::Config;

fn main() {
    init_tracing();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            process::exit(1);
        }
    };

    match runtime.block_on(cli::run(&config)) {
        Ok(()) => {}
        Err(CliError::Reported) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Diagnostics go to stderr, filtered by `CHEC_LOG` (e.g. `CHEC_LOG=chec=debug`).
/// Off unless asked for.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CHEC_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
