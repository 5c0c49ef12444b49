//! CLI interface for Chec.
//!
//! Two commands work with API request logs:
//!
//! - `chec logs` streams logs as they happen and lets you browse back through
//!   recent ones.
//! - `chec log <id>` prints one log in full.
//!
//! Both need a stored API key; run `chec login` first.

mod format;

use std::io;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::event::EventStream;
use serde_json::json;

use crate::api::{ApiClient, DEFAULT_DOMAIN, Requester};
use crate::config::Config;
use crate::logs::{
    KeypressReader, LogEntry, LogFeed, LogsSession, Screen, SessionOptions, SystemClipboard,
    Terminal,
};

use format::format_log_detail;

/// How long to wait for the log feed to say goodbye before exiting anyway.
const FEED_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

const NOT_LOGGED_IN: &str =
    "You must be logged in to use this command. Please run chec login then try again.";

/// Work with the Chec API from your terminal.
#[derive(Debug, Parser)]
#[command(name = "chec", version, after_long_help = LOGS_HELP)]
pub struct Cli {
    /// API host to talk to.
    #[arg(long, global = true, hide = true, default_value = DEFAULT_DOMAIN)]
    domain: String,

    #[command(subcommand)]
    pub command: Command,
}

const LOGS_HELP: &str = r#"Examples:
  chec logs                  stream logs as they happen
  chec logs -n 20            show the last 20 logs, then keep streaming
  chec logs -n 20 --no-follow
  chec log log_Kvg9l6Apq51bB7 --raw"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream API request logs.
    ///
    /// While streaming, press "up" to choose an earlier log and see it in
    /// full. Press ctrl+c to quit.
    Logs {
        /// Show this many recent logs first.
        #[arg(short = 'n', long, default_value_t = 0)]
        tail: usize,

        /// Keep listening for new logs (the default).
        #[arg(short, long, overrides_with = "no_follow")]
        follow: bool,

        /// Stop after showing the recent logs.
        #[arg(long, overrides_with = "follow")]
        no_follow: bool,

        /// How many logs to keep for browsing back.
        #[arg(long, default_value_t = 100)]
        history: usize,

        /// Show timestamps in UTC.
        #[arg(long)]
        utc: bool,
    },

    /// Print one API request log in full.
    Log {
        /// The log ID, e.g. `log_Kvg9l6Apq51bB7`.
        log_id: String,

        /// Print the log as compact JSON with no summary.
        #[arg(long)]
        raw: bool,

        /// Show timestamps in UTC.
        #[arg(long)]
        utc: bool,
    },
}

/// Ways a command can fail.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Message(String),

    #[error("terminal error: {0}")]
    Io(#[from] io::Error),

    /// Already shown on screen; nothing more to print.
    #[error("command failed")]
    Reported,
}

/// Run the CLI.
pub async fn run(config: &Config) -> Result<(), CliError> {
    let cli = Cli::parse();
    dispatch(cli, config).await
}

async fn dispatch(cli: Cli, config: &Config) -> Result<(), CliError> {
    if !config.is_logged_in() {
        return Err(CliError::Message(NOT_LOGGED_IN.to_string()));
    }
    let client = ApiClient::new(config.api_key(false).map(String::from));

    match cli.command {
        Command::Logs {
            tail,
            follow: _,
            no_follow,
            history,
            utc,
        } => {
            let options = SessionOptions {
                tail,
                follow: !no_follow,
                history_limit: history,
                utc,
                domain: cli.domain,
                ..SessionOptions::default()
            };
            cmd_logs(config, &client, options).await
        }
        Command::Log { log_id, raw, utc } => {
            let mut screen = Terminal::new();
            cmd_log(&client, &mut screen, &cli.domain, &log_id, raw, utc).await
        }
    }
}

async fn cmd_logs(
    config: &Config,
    client: &ApiClient,
    options: SessionOptions,
) -> Result<(), CliError> {
    let mut screen = Terminal::new();
    if options.follow {
        screen.enable_raw_mode()?;
    }
    let mut clipboard = SystemClipboard::new();
    let mut feed = LogFeed::new(config.notifications.clone());
    let mut keys = KeypressReader::new(EventStream::new());

    let result = LogsSession::new(options, client, &mut screen, &mut clipboard)
        .run(&mut feed, &mut keys)
        .await;
    if tokio::time::timeout(FEED_CLOSE_TIMEOUT, feed.closed())
        .await
        .is_err()
    {
        tracing::debug!("log feed did not close in time");
    }

    result.map_err(|_| CliError::Reported)
}

async fn cmd_log(
    requester: &dyn Requester,
    screen: &mut dyn Screen,
    domain: &str,
    log_id: &str,
    raw: bool,
    utc: bool,
) -> Result<(), CliError> {
    let mut entry = LogEntry::new(json!({ "id": log_id }), domain)
        .map_err(|e| CliError::Message(e.to_string()))?;

    screen.status(Some("Fetching log from Chec..."))?;

    if let Err(e) = entry.full_log(requester).await {
        tracing::debug!(id = log_id, error = %e, "log fetch failed");
        let message =
            e.describe(|detail| format!("Could not fetch the log \"{log_id}\". Error: {detail}"));
        screen.fail(&message)?;
        return Err(CliError::Reported);
    }

    screen.status(None)?;
    let detail = format_log_detail(&entry, raw, utc)
        .map_err(|e| CliError::Message(format!("failed to serialize log: {e}")))?;
    screen.print(&detail)?;
    Ok(())
}
