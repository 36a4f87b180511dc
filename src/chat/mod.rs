//! Interactive chat against a streaming completion service.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`settings`]: validated generation settings
//! - [`session`]: one round's history, settings and token usage
//! - [`commands`]: command parsing
//! - [`clipboard`]: clipboard placeholders in messages
//! - [`driver`]: the round loop tying the pieces together

pub mod clipboard;
mod commands;
mod config;
mod driver;
mod session;
mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use clipboard::{ClipboardSource, SystemClipboard, expand_placeholders};
pub use commands::{COMMAND_SIGIL, ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use driver::{Driver, Exit, Fault, Flow, Input, LineReader, Stage};
pub use session::{ChatSession, SessionStatus};
pub use settings::{
    Applied, Assigned, Continuing, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MaxTokens, Setting,
    SettingName, Settings, Temperature, ValidationWarning,
};
