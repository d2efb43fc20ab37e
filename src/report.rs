//! Step-by-step progress output.
//!
//! Each deployment step prints a label followed by a badge, and failing
//! steps add indented detail lines:
//!
//! ```text
//! Mounting DMG File ................................ [SUCCESS]
//! Checking DMG for File ............................ [NOT FOUND]
//!   No installable artifact for 'Foo.app' on /Volumes/Foo
//! ```

use std::io::Write;

use strum::Display;

/// Outcome marker printed after a step label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING-KEBAB-CASE")]
pub enum Badge {
    Success,
    Error,
    Found,
    #[strum(serialize = "NOT FOUND")]
    NotFound,
    #[strum(serialize = "NO MATCH")]
    NoMatch,
    Yes,
    No,
}

/// Receives step progress from the orchestrator.
pub trait Reporter {
    /// A step is starting.
    fn step(&mut self, label: &str);

    /// The current step finished.
    fn badge(&mut self, badge: Badge);

    /// Extra information about the current step, one line per call.
    fn detail(&mut self, line: &str);
}

/// Label column width, including the dot leader.
const LABEL_WIDTH: usize = 50;

/// Writes the report to any `Write`, normally stdout.
pub struct ConsoleReporter<W: Write> {
    out: W,
    open_step: bool,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            open_step: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn finish_line(&mut self) {
        if self.open_step {
            let _ = writeln!(self.out);
            self.open_step = false;
        }
    }
}

// Write errors on the report stream are ignored; the exit code still
// carries the result.
impl<W: Write> Reporter for ConsoleReporter<W> {
    fn step(&mut self, label: &str) {
        self.finish_line();
        let dots = LABEL_WIDTH.saturating_sub(label.chars().count() + 1).max(3);
        let _ = write!(self.out, "{} {}", label, ".".repeat(dots));
        let _ = self.out.flush();
        self.open_step = true;
    }

    fn badge(&mut self, badge: Badge) {
        let _ = writeln!(self.out, " [{}]", badge);
        self.open_step = false;
    }

    fn detail(&mut self, line: &str) {
        self.finish_line();
        let _ = writeln!(self.out, "  {}", line);
    }
}
