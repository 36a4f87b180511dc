//! Clipboard placeholders in message lines.
//!
//! - a line that is exactly [`WHOLE_LINE`] becomes the clipboard text;
//! - [`SPLICE`] is replaced by the clipboard text;
//! - [`FENCED`] is replaced by the clipboard text inside a fenced code block.
//!
//! The clipboard is read at most once per line, and only if a placeholder is present.

use crate::{Error, Result};

/// A line consisting only of this is replaced by the clipboard.
pub const WHOLE_LINE: &str = "@clip";

/// Replaced in place by the clipboard text.
pub const SPLICE: &str = "{{clip}}";

/// Replaced in place by the clipboard text wrapped in a code fence.
pub const FENCED: &str = "{{code}}";

/// Somewhere to read text from.
pub trait ClipboardSource {
    /// The current clipboard text.
    fn text(&mut self) -> Result<String>;
}

/// The operating system clipboard.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    /// The clipboard is opened on first use.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSource for SystemClipboard {
    fn text(&mut self) -> Result<String> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| Error::clipboard(format!("failed to access clipboard: {e}")))?;
            self.inner = Some(clipboard);
        }
        match self.inner.as_mut() {
            Some(clipboard) => clipboard
                .get_text()
                .map_err(|e| Error::clipboard(format!("failed to read clipboard: {e}"))),
            None => Err(Error::clipboard("clipboard unavailable")),
        }
    }
}

/// True if the line contains any placeholder.
pub fn has_placeholder(line: &str) -> bool {
    line.trim() == WHOLE_LINE || line.contains(SPLICE) || line.contains(FENCED)
}

/// Replaces every placeholder in `line` with text from `clipboard`.
pub fn expand_placeholders(line: &str, clipboard: &mut dyn ClipboardSource) -> Result<String> {
    if !has_placeholder(line) {
        return Ok(line.to_string());
    }
    let text = clipboard.text()?;
    if line.trim() == WHOLE_LINE {
        return Ok(text);
    }
    let fenced = format!("```\n{text}\n```");

    // Single pass, so placeholders inside the clipboard text stay as they are.
    let mut expanded = String::with_capacity(line.len() + fenced.len());
    let mut rest = line;
    loop {
        let next = [(SPLICE, text.as_str()), (FENCED, fenced.as_str())]
            .into_iter()
            .filter_map(|(marker, with)| rest.find(marker).map(|at| (at, marker, with)))
            .min_by_key(|(at, _, _)| *at);
        match next {
            Some((at, marker, with)) => {
                expanded.push_str(&rest[..at]);
                expanded.push_str(with);
                rest = &rest[at + marker.len()..];
            }
            None => {
                expanded.push_str(rest);
                return Ok(expanded);
            }
        }
    }
}
