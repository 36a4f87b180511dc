//! Command parsing for the chat loop.
//!
//! A line whose first character is [`COMMAND_SIGIL`] is a command; every other line is
//! conversation content.  Commands never validate their arguments: setting values are handed to
//! the session's validators untouched.

use crate::chat::settings::SettingName;

/// The leading character that marks a command.
pub const COMMAND_SIGIL: char = ':';

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Assign a raw value to a setting.
    Set(SettingName, String),

    /// Flip the continue flag.
    ToggleContinue,

    /// Display help information.
    Help,

    /// Show the current settings and token usage.
    Status,

    /// Exit the chat application.
    Quit,

    /// End the round and start a fresh one.
    New,

    /// The command word was not recognized.
    Unknown(String),

    /// A recognized command was missing its argument.
    Invalid(String),
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the line starts with the sigil, or `None` if it should be
/// treated as a regular message.
///
/// # Examples
///
/// ```
/// # use parley::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command(":quit"), Some(ChatCommand::Quit));
/// assert!(parse_command(":model gpt-4").is_some());
/// assert!(parse_command("Hello :quit").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let rest = input.strip_prefix(COMMAND_SIGIL)?;

    let mut words = rest.split_whitespace();
    let command = words.next().unwrap_or_default().to_lowercase();
    let argument = words.next();

    let result = match command.as_str() {
        "temperature" | "temp" | "t" => set_command(SettingName::Temperature, argument),
        "max_tokens" => set_command(SettingName::MaxTokens, argument),
        "model" | "m" | "mod" => set_command(SettingName::Model, argument),
        "continue" => match argument {
            Some(arg) => ChatCommand::Set(SettingName::Continuing, arg.to_string()),
            None => ChatCommand::ToggleContinue,
        },
        "help" => ChatCommand::Help,
        "status" | "s" => ChatCommand::Status,
        "quit" | "exit" | "stop" | "end" => ChatCommand::Quit,
        "new" | "n" => ChatCommand::New,
        "" => ChatCommand::Unknown(COMMAND_SIGIL.to_string()),
        _ => ChatCommand::Unknown(format!("{COMMAND_SIGIL}{command}")),
    };

    Some(result)
}

fn set_command(setting: SettingName, argument: Option<&str>) -> ChatCommand {
    match argument {
        Some(arg) => ChatCommand::Set(setting, arg.to_string()),
        None => ChatCommand::Invalid(format!("{COMMAND_SIGIL}{setting} requires a value")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  :temperature <v>   Set temperature 0.0-1.0 (aliases :temp, :t)
  :max_tokens <n>    Set the token ceiling for this round
  :model <name>      Change the model (aliases :m, :mod)
  :continue [on|off] Toggle whether the conversation continues after each reply
  :status            Show settings and token usage (alias :s)
  :new               Start a fresh conversation with the same system message;
                     model, temperature, max_tokens and continue are kept (alias :n)
  :help              Show this help message
  :quit              Exit (aliases :exit, :stop, :end)

Clipboard placeholders in messages:
  @clip              A line of just @clip is replaced by the clipboard
  {{clip}}           Replaced by the clipboard text
  {{code}}           Replaced by the clipboard text in a fenced code block"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_aliases() {
        for line in [":quit", ":exit", ":stop", ":end", ":QUIT", ":Exit"] {
            assert_eq!(parse_command(line), Some(ChatCommand::Quit), "{line}");
        }
    }

    #[test]
    fn parse_temperature_aliases() {
        for line in [":temperature 0.3", ":temp 0.3", ":t 0.3", ":TEMP 0.3"] {
            assert_eq!(
                parse_command(line),
                Some(ChatCommand::Set(SettingName::Temperature, "0.3".to_string())),
                "{line}"
            );
        }
    }

    #[test]
    fn parse_model_aliases() {
        for line in [":model gpt-4", ":m gpt-4", ":mod gpt-4", ":Model   gpt-4  "] {
            assert_eq!(
                parse_command(line),
                Some(ChatCommand::Set(SettingName::Model, "gpt-4".to_string())),
                "{line}"
            );
        }
    }

    #[test]
    fn parse_max_tokens() {
        assert_eq!(
            parse_command(":max_tokens 12.5"),
            Some(ChatCommand::Set(SettingName::MaxTokens, "12.5".to_string()))
        );
    }

    #[test]
    fn only_the_second_word_is_the_argument() {
        assert_eq!(
            parse_command(":model gpt-4 please"),
            Some(ChatCommand::Set(SettingName::Model, "gpt-4".to_string()))
        );
    }

    #[test]
    fn missing_argument_is_invalid() {
        assert_eq!(
            parse_command(":model"),
            Some(ChatCommand::Invalid(":model requires a value".to_string()))
        );
        assert!(matches!(
            parse_command(":t"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("temperature")
        ));
        assert!(matches!(
            parse_command(":max_tokens   "),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_continue() {
        assert_eq!(parse_command(":continue"), Some(ChatCommand::ToggleContinue));
        assert_eq!(
            parse_command(":continue off"),
            Some(ChatCommand::Set(SettingName::Continuing, "off".to_string()))
        );
    }

    #[test]
    fn parse_control_commands() {
        assert_eq!(parse_command(":help"), Some(ChatCommand::Help));
        assert_eq!(parse_command(":new"), Some(ChatCommand::New));
        assert_eq!(parse_command(":N"), Some(ChatCommand::New));
        assert_eq!(parse_command(":status"), Some(ChatCommand::Status));
        assert_eq!(parse_command(":s"), Some(ChatCommand::Status));
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(
            parse_command(":frobnicate"),
            Some(ChatCommand::Unknown(":frobnicate".to_string()))
        );
        assert_eq!(parse_command(":"), Some(ChatCommand::Unknown(":".to_string())));
        assert_eq!(
            parse_command(": quit"),
            Some(ChatCommand::Quit),
            "whitespace after the sigil is skipped"
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there"), None);
        assert_eq!(parse_command("what does :quit do?"), None);
        assert_eq!(parse_command(" :quit"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        for command in [
            ":temperature",
            ":max_tokens",
            ":model",
            ":continue",
            ":status",
            ":new",
            ":help",
            ":quit",
        ] {
            assert!(help.contains(command), "{command}");
        }
        assert!(help.contains("max_tokens and continue are kept"));
    }
}
