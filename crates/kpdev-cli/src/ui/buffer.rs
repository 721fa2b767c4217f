//! Output Buffer - line-atomic terminal rendering
//!
//! Concurrent deploys report from several tasks at once. Every line is queued
//! whole and flushed before the lock is released, so lines never interleave.

use crossterm::{
    QueueableCommand, cursor,
    style::{Color, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{Stdout, Write};

/// A buffer that accumulates terminal commands before flushing
#[derive(Debug)]
pub struct OutputBuffer<W: Write = Stdout> {
    out: W,
}

impl<W: Write> OutputBuffer<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write text on a new line with color
    pub fn write_line(&mut self, text: &str, color: Color) {
        let _ = self.out.queue(SetForegroundColor(color));
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.queue(SetForegroundColor(Color::Reset));
    }

    /// Write text without newline
    pub fn write(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
    }

    /// Return to the start of the current line and clear it
    pub fn rewind_line(&mut self) {
        let _ = self.out.queue(cursor::MoveToColumn(0));
        let _ = self.out.queue(Clear(ClearType::CurrentLine));
    }

    /// Flush all queued commands
    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }

    /// The underlying writer
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(std::io::stdout())
    }
}
