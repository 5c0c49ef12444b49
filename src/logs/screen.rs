//! Output for the logs commands.
//!
//! [`Screen`] is what the session draws on: lines of text, a single status
//! line with a spinner, and a full clear. [`Terminal`] implements it on
//! stdout with crossterm.

use std::io::{self, IsTerminal, Stdout, Write};

use colored::Colorize;
use crossterm::cursor::{MoveTo, MoveToColumn};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub trait Screen {
    /// Print text above the status line. Embedded newlines are honoured.
    fn print(&mut self, text: &str) -> io::Result<()>;

    /// Wipe everything that is visible.
    fn clear(&mut self) -> io::Result<()>;

    /// How many lines fit on screen, when known.
    fn rows(&self) -> Option<usize>;

    /// Show a status line with a spinner, or remove it with `None`.
    fn status(&mut self, text: Option<&str>) -> io::Result<()>;

    /// Replace the status line with a failure message.
    fn fail(&mut self, message: &str) -> io::Result<()>;

    /// Advance the spinner animation.
    fn tick(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The real terminal.
pub struct Terminal {
    out: Stdout,
    interactive: bool,
    raw: bool,
    status: Option<String>,
    frame: usize,
}

impl Terminal {
    pub fn new() -> Self {
        let out = io::stdout();
        let interactive = out.is_terminal();
        Self {
            out,
            interactive,
            raw: false,
            status: None,
            frame: 0,
        }
    }

    /// Switch to raw mode so single key presses can be read.
    ///
    /// Restored when the terminal is dropped.
    pub fn enable_raw_mode(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.raw = true;
        Ok(())
    }

    fn line_ending(&self) -> &'static str {
        // Raw mode turns off the newline-to-CRLF translation.
        if self.raw { "\r\n" } else { "\n" }
    }

    fn erase_status(&mut self) -> io::Result<()> {
        if self.interactive && self.status.is_some() {
            queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }

    fn draw_status(&mut self) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        if let Some(text) = &self.status {
            let spinner = SPINNER[self.frame % SPINNER.len()].cyan();
            queue!(
                self.out,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(format!("{spinner} {text}"))
            )?;
        }
        Ok(())
    }

    fn write_lines(&mut self, text: &str) -> io::Result<()> {
        let eol = self.line_ending();
        for line in text.split('\n') {
            queue!(self.out, Print(line), Print(eol))?;
        }
        Ok(())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for Terminal {
    fn print(&mut self, text: &str) -> io::Result<()> {
        self.erase_status()?;
        self.write_lines(text)?;
        self.draw_status()?;
        self.out.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        if self.interactive {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.draw_status()?;
        self.out.flush()
    }

    fn rows(&self) -> Option<usize> {
        terminal::size().ok().map(|(_, rows)| usize::from(rows))
    }

    fn status(&mut self, text: Option<&str>) -> io::Result<()> {
        self.erase_status()?;
        self.status = text.map(String::from);
        self.draw_status()?;
        self.out.flush()
    }

    fn fail(&mut self, message: &str) -> io::Result<()> {
        self.erase_status()?;
        self.status = None;
        let line = format!("{} {message}", "✖".red());
        self.write_lines(&line)?;
        self.out.flush()
    }

    fn tick(&mut self) -> io::Result<()> {
        if self.status.is_none() {
            return Ok(());
        }
        self.frame = self.frame.wrapping_add(1);
        self.draw_status()?;
        self.out.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.erase_status();
        let _ = self.out.flush();
        if self.raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}
