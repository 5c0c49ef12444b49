//! The interactive `logs` session.
//!
//! A session optionally tails recent logs, then listens to the feed while
//! waiting for the navigate key. Navigating pauses live output, lets the user
//! pick an entry from history and shows its full detail. Ctrl+C or Ctrl+Z
//! stops the session from any state.
//!
//! Everything runs on one task: feed events and key presses are multiplexed
//! with `select!`, so the history is never touched from two places at once.

use std::io;
use std::time::Duration;

use colored::Colorize;
use crossterm::event::{Event, KeyCode, KeyEvent};
use futures::Stream;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::api::{DEFAULT_DOMAIN, RequestError, Requester};

use super::clipboard::Clipboard;
use super::entry::{InvalidEntry, LogEntry};
use super::feed::{Feed, FeedError};
use super::history::{DEFAULT_HISTORY_LIMIT, History};
use super::keypress::{Cancelled, KeyMatcher, KeypressReader};
use super::prompt::{Choice, DEFAULT_PAGE_SIZE, HistoryPrompt, page_choices};
use super::screen::Screen;

const LISTENING: &str = "Listening for logs from Chec.";
const NAVIGATION_HINT: &str = "Press \"up\" to navigate through the existing logs";
const DETAIL_HINT: &str =
    "Press \"enter\" to return to streaming logs or \"c\" to copy to clipboard";
const SPINNER_INTERVAL: Duration = Duration::from_millis(80);

/// How a session behaves.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How many recent logs to fetch before listening.
    pub tail: usize,
    /// Whether to listen for new logs at all.
    pub follow: bool,
    /// How many logs to keep for browsing back.
    pub history_limit: usize,
    /// Show timestamps in UTC instead of local time.
    pub utc: bool,
    /// The API host.
    pub domain: String,
    /// How many entries one page of the navigation prompt offers.
    pub page_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tail: 0,
            follow: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
            utc: false,
            domain: DEFAULT_DOMAIN.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Where the session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Printing new logs as they arrive.
    Listening,
    /// Choosing an entry from history.
    AwaitingNavigationChoice,
    /// Looking at one entry's full detail.
    ViewingDetail,
    /// Done.
    Stopped,
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{}", initial_fetch_message(.0))]
    InitialFetch(RequestError),

    #[error("{}", detail_fetch_message(.0))]
    DetailFetch(RequestError),

    #[error("unexpected response from Chec: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidEntry(#[from] InvalidEntry),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("terminal error: {0}")]
    Io(#[from] io::Error),

    /// The user quit. Not a failure.
    #[error("cancelled")]
    Cancelled(#[from] Cancelled),
}

fn initial_fetch_message(e: &RequestError) -> String {
    e.describe(|detail| format!("Failed to fetch initial logs from Chec. ({detail})"))
}

fn detail_fetch_message(e: &RequestError) -> String {
    e.describe(|detail| format!("Failed to fetch full log detail from Chec. ({detail})"))
}

/// The response of `GET /v1/developer/logs`.
#[derive(Deserialize)]
struct LogPage {
    data: Vec<Value>,
}

pub struct LogsSession<'a> {
    options: SessionOptions,
    requester: &'a dyn Requester,
    screen: &'a mut dyn Screen,
    clipboard: &'a mut dyn Clipboard,
    history: History,
    can_emit: bool,
    mode: Mode,
}

impl<'a> LogsSession<'a> {
    pub fn new(
        options: SessionOptions,
        requester: &'a dyn Requester,
        screen: &'a mut dyn Screen,
        clipboard: &'a mut dyn Clipboard,
    ) -> Self {
        let history = History::new(options.history_limit);
        Self {
            options,
            requester,
            screen,
            clipboard,
            history,
            can_emit: true,
            mode: Mode::Listening,
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[cfg(test)]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run until the user quits or something fails.
    ///
    /// Quitting is a normal end and returns `Ok`. Failures are shown on the
    /// screen before they are returned. The feed is always disconnected.
    pub async fn run<K>(
        &mut self,
        feed: &mut dyn Feed,
        keys: &mut KeypressReader<K>,
    ) -> Result<(), SessionError>
    where
        K: Stream<Item = io::Result<Event>> + Unpin,
    {
        let result = self.drive(feed, keys).await;

        tracing::debug!(mode = ?self.mode, "logs session stopping");
        self.mode = Mode::Stopped;
        feed.disconnect();

        match result {
            Ok(()) | Err(SessionError::Cancelled(_)) => {
                self.screen.status(None)?;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "logs session failed");
                if let Err(io) = self.screen.fail(&e.to_string()) {
                    tracing::warn!(error = %io, "could not report failure");
                }
                Err(e)
            }
        }
    }

    async fn drive<K>(
        &mut self,
        feed: &mut dyn Feed,
        keys: &mut KeypressReader<K>,
    ) -> Result<(), SessionError>
    where
        K: Stream<Item = io::Result<Event>> + Unpin,
    {
        if self.options.follow {
            self.clear_screen()?;
        }

        if self.options.tail > 0 {
            self.tail().await?;
        }

        if !self.options.follow {
            return Ok(());
        }

        let mut logs = feed.on_log()?;
        let mut ticker = time::interval(SPINNER_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            self.listen(&mut logs, keys, &mut ticker).await?;
            if self.history.is_empty() {
                continue;
            }
            self.navigate(&mut logs, keys, &mut ticker).await?;
            self.history.prune();
            self.print_pending()?;
        }
    }

    /// Fill history with the most recent logs.
    async fn tail(&mut self) -> Result<(), SessionError> {
        self.screen.status(Some("Fetching logs from Chec..."))?;

        let payload = json!({ "limit": self.options.tail });
        let response = self
            .requester
            .request(
                Method::GET,
                "/v1/developer/logs",
                Some(&payload),
                &self.options.domain,
            )
            .await
            .map_err(SessionError::InitialFetch)?;

        let page: LogPage = serde_json::from_str(&response.body)?;
        tracing::debug!(count = page.data.len(), "fetched recent logs");
        for raw in page.data {
            self.history
                .push(LogEntry::new(raw, self.options.domain.clone())?);
        }

        self.screen.status(None)?;
        self.print_pending()?;
        self.history.prune();
        Ok(())
    }

    /// Print feed events until the navigate key is pressed.
    async fn listen<K>(
        &mut self,
        logs: &mut mpsc::UnboundedReceiver<Value>,
        keys: &mut KeypressReader<K>,
        ticker: &mut Interval,
    ) -> Result<(), SessionError>
    where
        K: Stream<Item = io::Result<Event>> + Unpin,
    {
        self.mode = Mode::Listening;
        self.can_emit = true;
        self.show_listening_status()?;

        let navigate = KeyMatcher::from(KeyCode::Up);
        loop {
            tokio::select! {
                Some(raw) = logs.recv() => self.receive(raw)?,
                pressed = keys.wait_for_key(&navigate) => return Ok(pressed?),
                _ = ticker.tick() => self.screen.tick()?,
            }
        }
    }

    /// Let the user pick an entry and show it, or cancel back to listening.
    async fn navigate<K>(
        &mut self,
        logs: &mut mpsc::UnboundedReceiver<Value>,
        keys: &mut KeypressReader<K>,
        ticker: &mut Interval,
    ) -> Result<(), SessionError>
    where
        K: Stream<Item = io::Result<Event>> + Unpin,
    {
        self.mode = Mode::AwaitingNavigationChoice;
        self.can_emit = false;
        self.screen.status(None)?;

        // Logs arriving while the prompt is open are not offered until next time.
        let end = self.history.len();
        let page_size = self.options.page_size.max(1);
        let mut offset = 0;

        let index = loop {
            let prompt = HistoryPrompt::new(page_choices(end, offset, page_size));
            match self.choose(prompt, logs, keys).await? {
                Choice::ViewMore => offset += page_size,
                Choice::Cancel => {
                    self.clear_screen()?;
                    self.print_pending()?;
                    self.can_emit = true;
                    return Ok(());
                }
                Choice::Entry(index) => break index,
            }
        };

        self.view(index, logs, keys, ticker).await
    }

    async fn choose<K>(
        &mut self,
        mut prompt: HistoryPrompt,
        logs: &mut mpsc::UnboundedReceiver<Value>,
        keys: &mut KeypressReader<K>,
    ) -> Result<Choice, SessionError>
    where
        K: Stream<Item = io::Result<Event>> + Unpin,
    {
        loop {
            self.render_prompt(&prompt)?;

            let key = loop {
                tokio::select! {
                    Some(raw) = logs.recv() => self.receive(raw)?,
                    key = keys.next_key() => break key?,
                }
            };

            match key.code {
                KeyCode::Up | KeyCode::Char('k') => prompt.move_up(),
                KeyCode::Down | KeyCode::Char('j') => prompt.move_down(),
                KeyCode::Enter => return Ok(prompt.selected()),
                KeyCode::Esc => return Ok(Choice::Cancel),
                _ => {}
            }
        }
    }

    /// Fetch and show one entry until the user goes back.
    async fn view<K>(
        &mut self,
        index: usize,
        logs: &mut mpsc::UnboundedReceiver<Value>,
        keys: &mut KeypressReader<K>,
        ticker: &mut Interval,
    ) -> Result<(), SessionError>
    where
        K: Stream<Item = io::Result<Event>> + Unpin,
    {
        let Some(entry) = self.history.get_mut(index) else {
            tracing::warn!(index, "chosen log is no longer in history");
            return Ok(());
        };

        tracing::debug!(id = %entry.id(), cached = entry.is_full(), "showing log detail");
        self.screen.status(Some("Fetching log from Chec..."))?;
        let formatted = {
            let fetch = entry.formatted_log(self.requester);
            tokio::pin!(fetch);
            loop {
                tokio::select! {
                    fetched = &mut fetch => break fetched.map_err(SessionError::DetailFetch)?,
                    _ = ticker.tick() => self.screen.tick()?,
                }
            }
        };
        let summary = entry.formatted_summary(self.options.utc);
        let copy_text = serde_json::to_string_pretty(entry.raw())?;
        self.screen.status(None)?;

        self.mode = Mode::ViewingDetail;
        self.clear_screen()?;
        self.screen.print(&summary.dimmed().to_string())?;
        self.screen.print(&formatted)?;
        self.screen.print("")?;
        self.screen.print(DETAIL_HINT)?;

        let copy = KeyMatcher::Predicate(Box::new(|key: &KeyEvent| {
            matches!(key.code, KeyCode::Char('c' | 'C'))
        }));
        let back = KeyMatcher::from(KeyCode::Enter);
        let matchers = [&copy, &back];
        loop {
            tokio::select! {
                Some(raw) = logs.recv() => self.receive(raw)?,
                pressed = keys.wait_for_any(&matchers) => {
                    if pressed? == 0 {
                        self.copy(&copy_text);
                    } else {
                        break;
                    }
                }
            }
        }

        self.clear_screen()?;
        Ok(())
    }

    /// Take in one feed event.
    ///
    /// Printed straight away while listening; otherwise kept for the next redraw.
    fn receive(&mut self, raw: Value) -> Result<(), SessionError> {
        let mut entry = match LogEntry::new(raw, self.options.domain.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed feed event");
                return Ok(());
            }
        };
        tracing::debug!(id = %entry.id(), emit = self.can_emit, "log received");

        if self.can_emit {
            self.screen
                .print(&entry.formatted_summary(self.options.utc))?;
            entry.set_printed(true);
            self.history.push(entry);
            self.history.prune();
            self.show_listening_status()?;
        } else {
            self.history.push(entry);
        }
        Ok(())
    }

    fn copy(&mut self, text: &str) {
        match self.clipboard.write(text) {
            Ok(()) => tracing::debug!("copied log to clipboard"),
            Err(e) => tracing::debug!(error = %e, "could not copy log"),
        }
    }

    fn render_prompt(&mut self, prompt: &HistoryPrompt) -> io::Result<()> {
        self.clear_screen()?;
        let utc = self.options.utc;
        let text = prompt.render(|index| {
            self.history
                .get(index)
                .map(|entry| entry.formatted_summary(utc))
                .unwrap_or_default()
        });
        self.screen.print(&text)
    }

    fn show_listening_status(&mut self) -> io::Result<()> {
        let text = if self.history.is_empty() {
            LISTENING.to_string()
        } else {
            format!("{LISTENING} {NAVIGATION_HINT}")
        };
        self.screen.status(Some(&text))
    }

    /// Print every entry not on screen yet, oldest first.
    fn print_pending(&mut self) -> io::Result<()> {
        let utc = self.options.utc;
        while let Some(start) = self.history.first_unprinted() {
            for index in start..self.history.len() {
                if let Some(entry) = self.history.get_mut(index) {
                    self.screen.print(&entry.formatted_summary(utc))?;
                    entry.set_printed(true);
                }
            }
        }
        Ok(())
    }

    /// Clear the terminal and mark whatever was visible for redrawing.
    fn clear_screen(&mut self) -> io::Result<()> {
        self.screen.clear()?;
        let visible = self.screen.rows().unwrap_or(self.history.len());
        self.history.mark_unprinted(visible);
        Ok(())
    }
}
