//! ui::progress
//!
//! Terminal rendering of workflow progress.

use std::io::{self, Write};

use crate::engine::ProgressSink;

const BAR_WIDTH: usize = 24;

/// Render `[#####-----]  42% message` for one progress event.
pub fn render_line(message: &str, percent: u8) -> String {
    let percent = percent.min(100);
    let filled = BAR_WIDTH * percent as usize / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent,
        message
    )
}

/// Progress bar on stderr, redrawn in place.
///
/// When stderr is not a terminal each event is written on its own line.
pub struct TerminalProgress {
    out: Box<dyn Write + Send>,
    in_place: bool,
    last_len: usize,
    dirty: bool,
}

impl TerminalProgress {
    pub fn stderr() -> Self {
        use std::io::IsTerminal;
        let in_place = io::stderr().is_terminal();
        Self::new(Box::new(io::stderr()), in_place)
    }

    pub fn new(out: Box<dyn Write + Send>, in_place: bool) -> Self {
        Self {
            out,
            in_place,
            last_len: 0,
            dirty: false,
        }
    }

    /// End the current bar line, if any.
    pub fn finish(&mut self) {
        if self.dirty {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.dirty = false;
            self.last_len = 0;
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn progress(&mut self, message: &str, percent: u8) {
        let line = render_line(message, percent);
        if self.in_place {
            let pad = self.last_len.saturating_sub(line.chars().count());
            let _ = write!(self.out, "\r{line}{}", " ".repeat(pad));
            self.last_len = line.chars().count();
            self.dirty = true;
        } else {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = self.out.flush();
    }

    fn error(&mut self, _message: &str) {
        // The caller prints the error; just end the bar line.
        self.finish();
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
