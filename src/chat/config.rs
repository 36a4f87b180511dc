//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the configuration value handed to
//! the driver at startup.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::chat::settings::{SettingName, Settings, ValidationWarning};
use crate::render::Palette;

/// Command-line arguments for the parley tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to start with.
    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// Initial sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-1.0 (default: 0.5)", "TEMP")]
    pub temperature: Option<String>,

    /// Initial token ceiling per round.
    #[arrrg(optional, "Token ceiling per conversation (default: 1000)", "TOKENS")]
    pub max_tokens: Option<String>,

    /// Start with continuation enabled.
    #[arrrg(flag, "Keep the conversation going after each reply")]
    pub continuing: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Base URL of the completion service.
    #[arrrg(optional, "Base URL (default: https://api.openai.com/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 120)", "SECS")]
    pub timeout_secs: Option<u64>,
}

/// Configuration for the chat driver.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Settings every new round starts from.
    pub settings: Settings,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Colors for prompts and diagnostics.
    pub palette: Palette,

    /// Base URL override for the completion service.
    pub base_url: Option<String>,

    /// Request timeout override.
    pub timeout: Option<Duration>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-3.5-turbo
    /// - Temperature: 0.5
    /// - Max tokens: 1000
    /// - Continue: off
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            use_color: true,
            palette: Palette::default(),
            base_url: None,
            timeout: None,
        }
    }

    /// Resolves command-line arguments.
    ///
    /// Setting values go through the same validators as the interactive commands; rejected
    /// values are returned as warnings and the defaults are kept.
    pub fn from_args(args: ChatArgs) -> (Self, Vec<ValidationWarning>) {
        let mut config = ChatConfig::new();
        let mut warnings = Vec::new();

        let raw_settings = [
            (SettingName::Model, args.model),
            (SettingName::Temperature, args.temperature),
            (SettingName::MaxTokens, args.max_tokens),
        ];
        for (name, raw) in raw_settings {
            if let Some(raw) = raw
                && let Err(warning) = config.settings.try_set(name, &raw)
            {
                warnings.push(warning);
            }
        }
        if args.continuing {
            config.settings.toggle_continuing();
        }

        config.use_color = !args.no_color;
        config.base_url = args.base_url;
        config.timeout = args.timeout_secs.map(Duration::from_secs);
        (config, warnings)
    }

    /// Sets the starting settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the color palette.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Model;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.settings, Settings::default());
        assert!(config.use_color);
        assert!(config.base_url.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let (config, warnings) = ChatConfig::from_args(ChatArgs::default());
        assert!(warnings.is_empty());
        assert_eq!(config.settings.model, Model::Gpt35Turbo);
        assert!(!config.settings.continuing.get());
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("gpt-4o".to_string()),
            temperature: Some("0.9".to_string()),
            max_tokens: Some("4096".to_string()),
            continuing: true,
            no_color: true,
            base_url: Some("http://localhost:11434/v1".to_string()),
            timeout_secs: Some(30),
        };
        let (config, warnings) = ChatConfig::from_args(args);
        assert!(warnings.is_empty());
        assert_eq!(config.settings.model, Model::Gpt4o);
        assert_eq!(config.settings.temperature.get(), 0.9);
        assert_eq!(config.settings.max_tokens.get(), 4096);
        assert!(config.settings.continuing.get());
        assert!(!config.use_color);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn invalid_args_warn_and_keep_defaults() {
        let args = ChatArgs {
            model: Some("gpt-9".to_string()),
            max_tokens: Some("plenty".to_string()),
            ..ChatArgs::default()
        };
        let (config, warnings) = ChatConfig::from_args(args);
        assert_eq!(warnings.len(), 2);
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .without_color()
            .with_base_url(Some("http://example.test/".to_string()))
            .with_timeout(Some(Duration::from_secs(5)));
        assert!(!config.use_color);
        assert_eq!(config.base_url.as_deref(), Some("http://example.test/"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }
}
