use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Model};

/// Body of a `chat/completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// The model that will complete the conversation.
    pub model: Model,

    /// The ordered conversation history.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature.
    pub temperature: f64,

    /// The most tokens the completion may use.
    pub max_tokens: u32,

    /// Whether the response is streamed as server-sent events.
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a new non-streaming request.
    pub fn new(
        model: Model,
        messages: Vec<ChatMessage>,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            messages,
            temperature,
            max_tokens,
            stream: false,
        }
    }

    /// Request a streamed response.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn streaming_request_serialization() {
        let request = ChatCompletionRequest::new(
            Model::Gpt4,
            vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")],
            0.5,
            900,
        )
        .streaming();

        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"}
                ],
                "temperature": 0.5,
                "max_tokens": 900,
                "stream": true
            })
        );
    }
}
