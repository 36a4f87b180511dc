//! Output rendering for the chat loop.
//!
//! This module provides the [`Renderer`] trait the session and driver write through, and a
//! plain-text implementation with optional ANSI styling.

use std::io::{self, Stdout, Write};

use crate::types::Role;

/// ANSI escape code for bold text.
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text.
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text.
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text.
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text.
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text.
const ANSI_MAGENTA: &str = "\x1b[35m";

/// ANSI escape code for dim text.
const ANSI_DIM: &str = "\x1b[2m";

/// Colors used for each speaker's label and for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    /// Style of the `System:` prompt.
    pub system: &'static str,
    /// Style of the `User:` prompt.
    pub user: &'static str,
    /// Style of the `Assistant:` label.
    pub assistant: &'static str,
    /// Style of informational lines.
    pub info: &'static str,
    /// Style of warnings.
    pub warning: &'static str,
    /// Style of errors.
    pub error: &'static str,
}

impl Palette {
    fn for_role(&self, role: Role) -> &'static str {
        match role {
            Role::System => self.system,
            Role::User => self.user,
            Role::Assistant => self.assistant,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            system: ANSI_MAGENTA,
            user: ANSI_CYAN,
            assistant: ANSI_GREEN,
            info: ANSI_DIM,
            warning: ANSI_YELLOW,
            error: ANSI_RED,
        }
    }
}

/// The text shown before a speaker's turn.
pub fn label_for(role: Role) -> &'static str {
    match role {
        Role::System => "System: ",
        Role::User => "User: ",
        Role::Assistant => "Assistant: ",
    }
}

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// The prompt to show when reading a turn from `role`.
    fn prompt(&self, role: Role) -> String {
        label_for(role).to_string()
    }

    /// Announce the start of the assistant's reply.
    fn start_response(&mut self) {}

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as fragments are streamed from the service.
    fn print_text(&mut self, text: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines after streaming.
    fn finish_response(&mut self);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a non-fatal warning.
    fn print_warning(&mut self, warning: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    palette: Palette,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            palette: Palette::default(),
            line_start: true,
        }
    }

    /// Replaces the color palette.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    /// Ends a partially written line so diagnostics start on their own line.
    fn break_line(&mut self) {
        if !self.line_start {
            println!();
            self.line_start = true;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn prompt(&self, role: Role) -> String {
        let style = format!("{ANSI_BOLD}{}", self.palette.for_role(role));
        self.styled(&style, label_for(role))
    }

    fn start_response(&mut self) {
        let label = self.prompt(Role::Assistant);
        print!("{label}");
        self.line_start = false;
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn finish_response(&mut self) {
        println!();
        self.line_start = true;
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.break_line();
        println!("{}", self.styled(self.palette.info, info));
        self.flush();
    }

    fn print_warning(&mut self, warning: &str) {
        self.break_line();
        eprintln!("{}", self.styled(self.palette.warning, &format!("Warning: {warning}")));
    }

    fn print_error(&mut self, error: &str) {
        self.break_line();
        eprintln!("{}", self.styled(self.palette.error, &format!("Error: {error}")));
    }
}
