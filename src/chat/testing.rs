//! Fakes shared by the chat unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::stream;

use crate::chat::clipboard::ClipboardSource;
use crate::chat::driver::{Input, LineReader};
use crate::client::{ChunkStream, CompletionService};
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::types::{ChatCompletionChunk, ChatCompletionRequest};

/// Replies with scripted fragments and records every request.  Once the script runs out every
/// reply is `"ok"`.
#[derive(Clone, Default)]
pub struct ScriptedService {
    replies: Arc<Mutex<VecDeque<Result<Vec<&'static str>>>>>,
    requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
}

impl ScriptedService {
    pub fn replying(replies: Vec<Result<Vec<&'static str>>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionService for ScriptedService {
    async fn stream_completion(&self, request: ChatCompletionRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(request);
        let fragments = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec!["ok"]))?;
        let chunks: Vec<Result<ChatCompletionChunk>> = fragments
            .into_iter()
            .map(|f| Ok(ChatCompletionChunk::text(f)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Records everything written to it.
#[derive(Debug, Default)]
pub struct CaptureRenderer {
    pub text: String,
    pub responses: usize,
    pub infos: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Renderer for CaptureRenderer {
    fn print_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn finish_response(&mut self) {
        self.responses += 1;
    }

    fn print_info(&mut self, info: &str) {
        self.infos.push(info.to_string());
    }

    fn print_warning(&mut self, warning: &str) {
        self.warnings.push(warning.to_string());
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }
}

/// Hands out scripted input, then end-of-input (or read errors, once told to keep failing).
#[derive(Debug, Default)]
pub struct ScriptedReader {
    inputs: VecDeque<Result<Input>>,
    fail_forever: bool,
    pub prompts: Vec<String>,
}

impl ScriptedReader {
    pub fn lines(lines: &[&str]) -> Self {
        Self {
            inputs: lines.iter().map(|l| Ok(Input::Line(l.to_string()))).collect(),
            fail_forever: false,
            prompts: Vec::new(),
        }
    }

    pub fn then(mut self, input: Input) -> Self {
        self.inputs.push_back(Ok(input));
        self
    }

    pub fn then_fail(mut self, message: &str) -> Self {
        self.inputs.push_back(Err(Error::input(message)));
        self
    }

    /// Once the script runs out every read fails, like a terminal after a hangup.
    pub fn failing_forever(mut self) -> Self {
        self.fail_forever = true;
        self
    }

    pub fn unread(&self) -> usize {
        self.inputs.len()
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> Result<Input> {
        self.prompts.push(prompt.to_string());
        match self.inputs.pop_front() {
            Some(input) => input,
            None if self.fail_forever => Err(Error::input("Input/output error (os error 5)")),
            None => Ok(Input::Eof),
        }
    }
}

/// A clipboard holding fixed text, or failing when empty.
#[derive(Debug, Default)]
pub struct FixedClipboard {
    pub text: Option<&'static str>,
    pub reads: usize,
}

impl FixedClipboard {
    pub fn with(text: &'static str) -> Self {
        Self {
            text: Some(text),
            reads: 0,
        }
    }
}

impl ClipboardSource for FixedClipboard {
    fn text(&mut self) -> Result<String> {
        self.reads += 1;
        self.text
            .map(str::to_string)
            .ok_or_else(|| Error::clipboard("clipboard is empty"))
    }
}
