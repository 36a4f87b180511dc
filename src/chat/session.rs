//! Core chat session management.
//!
//! This module provides the [`ChatSession`] struct which holds one round's conversation state
//! and issues the streaming requests for it.

use std::time::Instant;

use futures::StreamExt;

use crate::chat::settings::{Applied, SettingName, Settings, ValidationWarning};
use crate::client::CompletionService;
use crate::error::{Error, Result};
use crate::observability::{SESSION_EXCHANGES, SESSION_TOKENS, STREAM_DURATION};
use crate::render::Renderer;
use crate::tokens::TokenCounter;
use crate::types::{ChatCompletionRequest, ChatMessage, Model};

/// A chat session: the history, settings and token usage of one round.
pub struct ChatSession<C: CompletionService> {
    client: C,
    history: Vec<ChatMessage>,
    settings: Settings,
    token_count: u64,
    counter: Option<TokenCounter>,
}

/// A snapshot of a session for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    /// The configured model.
    pub model: Model,
    /// The sampling temperature.
    pub temperature: f64,
    /// The token ceiling for the round.
    pub max_tokens: u32,
    /// Whether the round continues after each exchange.
    pub continuing: bool,
    /// Tokens consumed so far this round.
    pub token_count: u64,
    /// `max_tokens - token_count`; may be negative after an overdraft.
    pub remaining: i64,
    /// The number of turns in the history, including the system instruction.
    pub message_count: usize,
}

impl<C: CompletionService> ChatSession<C> {
    /// Creates a session whose history is the system instruction alone.
    pub fn new(client: C, system_instruction: impl Into<String>, settings: Settings) -> Self {
        Self {
            client,
            history: vec![ChatMessage::system(system_instruction)],
            settings,
            token_count: 0,
            counter: None,
        }
    }

    /// The ordered conversation history.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// The current generation settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tokens consumed so far this round.
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    /// The budget the next request may use.
    pub fn remaining_budget(&self) -> i64 {
        i64::from(self.settings.max_tokens.get()) - self.token_count as i64
    }

    /// True once the round has used its whole budget.
    pub fn budget_exhausted(&self) -> bool {
        self.token_count >= u64::from(self.settings.max_tokens.get())
    }

    /// True if the round goes on after the exchange that just finished.
    pub fn should_continue(&self) -> bool {
        self.settings.continuing.get() && !self.budget_exhausted()
    }

    /// Validate and store a setting by name.
    pub fn try_set(&mut self, name: SettingName, raw: &str) -> Result<Applied, ValidationWarning> {
        self.settings.try_set(name, raw)
    }

    /// Changes the model; only supported models are accepted.
    pub fn set_model(&mut self, raw: &str) -> Result<Applied, ValidationWarning> {
        self.try_set(SettingName::Model, raw)
    }

    /// Sets the temperature, clamping into `[0, 1]`.
    pub fn set_temperature(&mut self, raw: &str) -> Result<Applied, ValidationWarning> {
        self.try_set(SettingName::Temperature, raw)
    }

    /// Sets the token ceiling, rounding non-integers.
    pub fn set_max_tokens(&mut self, raw: &str) -> Result<Applied, ValidationWarning> {
        self.try_set(SettingName::MaxTokens, raw)
    }

    /// Sets whether the round continues after each exchange.
    pub fn set_continuing(&mut self, raw: &str) -> Result<Applied, ValidationWarning> {
        self.try_set(SettingName::Continuing, raw)
    }

    /// Flips `continuing` and returns the new value.
    pub fn toggle_continuing(&mut self) -> bool {
        self.settings.toggle_continuing()
    }

    /// Appends a user turn.
    pub fn append_user_message(&mut self, text: impl Into<String>) {
        self.history.push(ChatMessage::user(text));
    }

    /// Appends an assistant turn.
    pub fn append_assistant_message(&mut self, text: impl Into<String>) {
        self.history.push(ChatMessage::assistant(text));
    }

    /// Returns the current session status snapshot.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            model: self.settings.model,
            temperature: self.settings.temperature.get(),
            max_tokens: self.settings.max_tokens.get(),
            continuing: self.settings.continuing.get(),
            token_count: self.token_count,
            remaining: self.remaining_budget(),
            message_count: self.history.len(),
        }
    }

    /// Sends the history and streams the reply.
    ///
    /// Each fragment is passed to `renderer` as it arrives.  Once the stream ends, the tokens
    /// of the reply plus the tokens of the serialized history are added to the running count.
    /// The history itself is left alone; the caller decides whether to append the reply.
    ///
    /// # Errors
    ///
    /// Returns a configuration error without sending anything if the remaining budget is not
    /// positive, and a transport error if the service fails.
    pub async fn request_completion(&mut self, renderer: &mut dyn Renderer) -> Result<String> {
        let remaining = self.remaining_budget();
        if remaining <= 0 {
            return Err(Error::budget_exhausted(remaining));
        }
        let max_tokens = u32::try_from(remaining).unwrap_or(u32::MAX);

        let counter = self.counter()?.clone();
        let history_tokens = counter.count_history(&self.history)?;

        let request = ChatCompletionRequest::new(
            self.settings.model,
            self.history.clone(),
            self.settings.temperature.get(),
            max_tokens,
        )
        .streaming();

        let start = Instant::now();
        let mut stream = self.client.stream_completion(request).await?;
        renderer.start_response();

        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(text) = chunk.content() {
                renderer.print_text(text);
                reply.push_str(text);
            }
        }
        renderer.finish_response();
        STREAM_DURATION.add(start.elapsed().as_secs_f64());

        let used = (counter.count(&reply) + history_tokens) as u64;
        self.token_count = self.token_count.saturating_add(used);
        SESSION_TOKENS.count(used);
        SESSION_EXCHANGES.click();
        tracing::debug!(
            model = %self.settings.model,
            history_tokens,
            used,
            token_count = self.token_count,
            "completion finished"
        );

        Ok(reply)
    }

    /// Into the settings, to seed the next round.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Ends this round and starts the next one.
    ///
    /// The history is reset to the new instruction and the token count to zero.  Settings, the
    /// client and the loaded tokenizer carry over.
    pub fn next_round(self, system_instruction: impl Into<String>) -> Self {
        Self {
            client: self.client,
            history: vec![ChatMessage::system(system_instruction)],
            settings: self.settings,
            token_count: 0,
            counter: self.counter,
        }
    }

    fn counter(&mut self) -> Result<&TokenCounter> {
        let model = self.settings.model;
        let stale = self.counter.as_ref().is_none_or(|c| c.model() != model);
        if stale {
            self.counter = Some(TokenCounter::for_model(model)?);
        }
        self.counter
            .as_ref()
            .ok_or_else(|| Error::tokenizer(format!("no tokenizer loaded for {model}")))
    }
}
