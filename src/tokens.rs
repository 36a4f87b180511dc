//! Token counting with the encoding each model uses.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::types::{ChatMessage, Model};
use crate::{Error, Result};

/// Counts tokens for one model.
#[derive(Clone)]
pub struct TokenCounter {
    model: Model,
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    /// Load the encoding for `model`.
    pub fn for_model(model: Model) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model.as_str()).map_err(|err| {
            Error::tokenizer(format!("no tokenizer for model {model}: {err}"))
        })?;
        Ok(Self {
            model,
            bpe: Arc::new(bpe),
        })
    }

    /// The model this counter was built for.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Number of tokens in the JSON serialization of `messages`, as sent on the wire.
    pub fn count_history(&self, messages: &[ChatMessage]) -> Result<usize> {
        let serialized = serde_json::to_string(messages)?;
        Ok(self.count(&serialized))
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
