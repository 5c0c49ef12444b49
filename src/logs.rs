//! Real-time API logs.
//!
//! The pieces behind `chec logs`: log entries and their formatting, the live
//! feed, keyboard input, and the session that ties them together.

mod clipboard;
mod entry;
mod feed;
mod history;
mod keypress;
mod pretty;
mod prompt;
mod screen;
mod session;

pub use clipboard::SystemClipboard;
pub use entry::LogEntry;
pub use feed::LogFeed;
pub use keypress::KeypressReader;
pub use pretty::colorize;
pub use screen::{Screen, Terminal};
pub use session::{LogsSession, SessionOptions};

#[cfg(test)]
pub(crate) use entry::tests::StubRequester;
#[cfg(test)]
pub(crate) use screen::tests::RecordingScreen;
