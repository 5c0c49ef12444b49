//! Output formatting for CLI display.

use colored::Colorize;

use crate::logs::{LogEntry, colorize};

/// A fetched log as `chec log` prints it.
///
/// Raw output is the compact JSON record. Otherwise a dimmed summary line
/// precedes the highlighted record.
pub(super) fn format_log_detail(
    entry: &LogEntry,
    raw: bool,
    utc: bool,
) -> Result<String, serde_json::Error> {
    if raw {
        return serde_json::to_string(entry.raw());
    }

    let summary = entry.formatted_summary(utc).dimmed();
    Ok(format!("{summary}\n{}", colorize(entry.raw())))
}
