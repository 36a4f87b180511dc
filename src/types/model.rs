use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The chat models a session may be configured with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Model {
    /// GPT-3.5 Turbo
    #[default]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,

    /// GPT-3.5 Turbo with the 16k context window
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Gpt35Turbo16k,

    /// GPT-4
    #[serde(rename = "gpt-4")]
    Gpt4,

    /// GPT-4 with the 32k context window
    #[serde(rename = "gpt-4-32k")]
    Gpt432k,

    /// GPT-4 Turbo
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,

    /// GPT-4o
    #[serde(rename = "gpt-4o")]
    Gpt4o,

    /// GPT-4o mini
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl Model {
    /// Every supported model, in the order they are listed to the user.
    pub const ALL: [Model; 7] = [
        Model::Gpt35Turbo,
        Model::Gpt35Turbo16k,
        Model::Gpt4,
        Model::Gpt432k,
        Model::Gpt4Turbo,
        Model::Gpt4o,
        Model::Gpt4oMini,
    ];

    /// The identifier sent to the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Gpt35Turbo => "gpt-3.5-turbo",
            Model::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
            Model::Gpt4 => "gpt-4",
            Model::Gpt432k => "gpt-4-32k",
            Model::Gpt4Turbo => "gpt-4-turbo",
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4oMini => "gpt-4o-mini",
        }
    }

    /// A comma-separated list of every supported identifier.
    pub fn supported_list() -> String {
        Model::ALL
            .iter()
            .map(Model::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelParseError {
    /// The identifier that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for ModelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported model '{}' (supported: {})",
            self.invalid_value,
            Model::supported_list()
        )
    }
}

impl std::error::Error for ModelParseError {}

impl FromStr for Model {
    type Err = ModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Model::ALL
            .into_iter()
            .find(|model| model.as_str() == wanted)
            .ok_or_else(|| ModelParseError {
                invalid_value: s.trim().to_string(),
            })
    }
}
