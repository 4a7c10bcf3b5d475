//! Console output for prompts and outcomes

use crossterm::style::Stylize;
use std::io::{self, Write};

/// Where trial prompts and outcomes are shown
pub trait TrialDisplay {
    /// Show the character the user must react to
    fn show_prompt(&mut self, character: char);

    /// Show whether the pressed shift was the expected one
    fn show_outcome(&mut self, correct: bool);
}

/// Line-oriented display with green/red outcome markers
pub struct ConsoleDisplay<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: impl std::fmt::Display) {
        // A closed stdout is not worth aborting a session over
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            log::warn!("failed to write to console: {}", e);
        }
    }
}

impl<W: Write> TrialDisplay for ConsoleDisplay<W> {
    fn show_prompt(&mut self, character: char) {
        self.write_line(character);
    }

    fn show_outcome(&mut self, correct: bool) {
        match (correct, self.color) {
            (true, true) => self.write_line("OK".green()),
            (false, true) => self.write_line("False".red()),
            (true, false) => self.write_line("OK"),
            (false, false) => self.write_line("False"),
        }
    }
}
