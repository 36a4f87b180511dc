//! The round loop.
//!
//! [`Driver::run`] reads the system instruction once, then plays rounds until the user quits.
//! Within a round every line is either a command, which is executed immediately, or content,
//! which is sent to the service.  A round ends after an exchange unless `continuing` is on and
//! budget remains, on `:new`, or on a fault.  Restarts are iterations of the outer loop.

use std::fmt;

use crate::chat::clipboard::{ClipboardSource, SystemClipboard, expand_placeholders};
use crate::chat::commands::{ChatCommand, help_text, parse_command};
use crate::chat::config::ChatConfig;
use crate::chat::session::{ChatSession, SessionStatus};
use crate::client::CompletionService;
use crate::error::{Error, Result};
use crate::observability::{ROUND_FAULTS, ROUNDS_STARTED};
use crate::render::Renderer;
use crate::types::Role;

/// Read failures in a row after which the driver gives up on its input.
pub const MAX_READ_FAILURES: u32 = 3;

/// One read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line of text, without its terminator.
    Line(String),
    /// The input was closed (Ctrl-D).
    Eof,
    /// The user interrupted at the prompt (Ctrl-C).
    Interrupted,
}

/// Source of user input.
pub trait LineReader {
    /// Show `prompt` and read one line.
    fn read_line(&mut self, prompt: &str) -> Result<Input>;
}

/// How the driver stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exit {
    /// The user asked to quit.
    Quit,
    /// Input ran out.
    EndOfInput,
    /// The user interrupted.
    Interrupted,
}

impl Exit {
    /// The process exit status for this outcome.
    pub fn code(self) -> i32 {
        match self {
            Exit::Quit | Exit::EndOfInput => 0,
            Exit::Interrupted => 130,
        }
    }
}

/// What the loop does after a line has been handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Stay in the round and read another line.
    AwaitInput,
    /// End the round; the next one starts fresh.
    EndRound,
    /// Stop the driver.
    Exit(Exit),
}

/// The step of a round that failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Reading a line.
    ReadInput,
    /// Requesting or streaming a completion.
    Completion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ReadInput => write!(f, "read_input"),
            Stage::Completion => write!(f, "completion"),
        }
    }
}

/// An error that ended a round, tagged with the step it came from.
#[derive(Debug, Clone)]
pub struct Fault {
    /// Where it happened.
    pub stage: Stage,
    /// What happened.
    pub error: Error,
}

impl Fault {
    fn at(stage: Stage) -> impl FnOnce(Error) -> Fault {
        move |error| Fault { stage, error }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs rounds of conversation against a completion service.
pub struct Driver<C: CompletionService, R: Renderer, L: LineReader> {
    client: Option<C>,
    config: ChatConfig,
    renderer: R,
    reader: L,
    clipboard: Box<dyn ClipboardSource>,
    read_failures: u32,
}

impl<C: CompletionService, R: Renderer, L: LineReader> Driver<C, R, L> {
    /// Creates a driver reading from the system clipboard.
    pub fn new(client: C, config: ChatConfig, renderer: R, reader: L) -> Self {
        Self {
            client: Some(client),
            config,
            renderer,
            reader,
            clipboard: Box::new(SystemClipboard::new()),
            read_failures: 0,
        }
    }

    /// Replaces the clipboard placeholders read from.
    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardSource>) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// The renderer output goes to.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The reader input comes from.
    pub fn reader(&self) -> &L {
        &self.reader
    }

    /// Plays rounds until the user quits, input ends or a fatal error occurs.
    ///
    /// # Errors
    ///
    /// A missing credential, a failure to read the system instruction, or
    /// [`MAX_READ_FAILURES`] read failures in a row end the driver.  Every other fault ends only
    /// the current round.
    pub async fn run(&mut self) -> Result<Exit> {
        let Some(client) = self.client.take() else {
            return Err(Error::configuration("driver has already run", None));
        };
        let prompt = self.renderer.prompt(Role::System);
        let instruction = match self.reader.read_line(&prompt)? {
            Input::Line(line) => line,
            Input::Eof => return Ok(Exit::EndOfInput),
            Input::Interrupted => return Ok(Exit::Interrupted),
        };

        let mut session = ChatSession::new(client, instruction.clone(), self.config.settings);
        let mut round = 1u64;
        loop {
            ROUNDS_STARTED.click();
            tracing::debug!(round, model = %session.settings().model, "round started");
            match self.play_round(&mut session).await {
                Ok(Some(exit)) => {
                    tracing::debug!(round, ?exit, "driver stopped");
                    return Ok(exit);
                }
                Ok(None) => {}
                Err(fault) if fault.error.is_missing_credential() => {
                    tracing::error!(
                        round,
                        stage = %fault.stage,
                        error = %fault.error,
                        "no credential"
                    );
                    self.renderer.print_error(&fault.error.to_string());
                    return Err(fault.error);
                }
                Err(fault)
                    if fault.stage == Stage::ReadInput
                        && self.read_failures >= MAX_READ_FAILURES =>
                {
                    tracing::error!(
                        round,
                        failures = self.read_failures,
                        error = %fault.error,
                        "giving up on input"
                    );
                    self.renderer.print_error(&fault.to_string());
                    return Err(fault.error);
                }
                Err(fault) if fault.error.is_configuration() => {
                    tracing::warn!(
                        round,
                        stage = %fault.stage,
                        error = %fault.error,
                        "round ended"
                    );
                    self.renderer.print_error(&fault.error.to_string());
                }
                Err(fault) => {
                    ROUND_FAULTS.click();
                    tracing::error!(
                        round,
                        stage = %fault.stage,
                        error = %fault.error,
                        status = ?fault.error.status_code(),
                        request_id = ?fault.error.request_id(),
                        "round failed"
                    );
                    self.renderer.print_error(&fault.to_string());
                }
            }
            session = session.next_round(instruction.clone());
            round += 1;
        }
    }

    /// Reads and handles lines until the round ends.  `Some` means the driver should stop.
    async fn play_round(&mut self, session: &mut ChatSession<C>) -> Result<Option<Exit>, Fault> {
        loop {
            let prompt = self.renderer.prompt(Role::User);
            let input = match self.reader.read_line(&prompt) {
                Ok(input) => {
                    self.read_failures = 0;
                    input
                }
                Err(err) => {
                    self.read_failures += 1;
                    return Err(Fault::at(Stage::ReadInput)(err));
                }
            };
            let line = match input {
                Input::Line(line) => line,
                Input::Eof => return Ok(Some(Exit::EndOfInput)),
                Input::Interrupted => return Ok(Some(Exit::Interrupted)),
            };
            match self.handle_line(session, &line).await? {
                Flow::AwaitInput => {}
                Flow::EndRound => return Ok(None),
                Flow::Exit(exit) => return Ok(Some(exit)),
            }
        }
    }

    /// Handles one line of input within a round.
    ///
    /// Blank lines are ignored.  Commands run against `session`.  Anything else has its
    /// clipboard placeholders expanded, is appended as a user turn and sent.  The reply is kept
    /// in the history only when the round goes on.
    pub async fn handle_line(
        &mut self,
        session: &mut ChatSession<C>,
        line: &str,
    ) -> Result<Flow, Fault> {
        if line.trim().is_empty() {
            return Ok(Flow::AwaitInput);
        }
        if let Some(command) = parse_command(line) {
            return Ok(self.execute(session, command));
        }

        let content = match expand_placeholders(line, self.clipboard.as_mut()) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(error = %err, "clipboard expansion failed");
                self.renderer
                    .print_warning(&format!("{err}; the message was not sent"));
                return Ok(Flow::AwaitInput);
            }
        };
        session.append_user_message(content);

        let reply = session
            .request_completion(&mut self.renderer)
            .await
            .map_err(Fault::at(Stage::Completion))?;

        if session.should_continue() {
            session.append_assistant_message(reply);
            return Ok(Flow::AwaitInput);
        }
        if session.budget_exhausted() {
            self.renderer.print_info(&format!(
                "token budget reached ({}/{}); starting a new conversation",
                session.token_count(),
                session.settings().max_tokens
            ));
        }
        Ok(Flow::EndRound)
    }

    fn execute(&mut self, session: &mut ChatSession<C>, command: ChatCommand) -> Flow {
        match command {
            ChatCommand::Set(name, raw) => match session.try_set(name, &raw) {
                Ok(applied) => {
                    if let Some(adjustment) = &applied.adjustment {
                        self.renderer.print_warning(adjustment);
                    }
                    self.renderer.print_info(&applied.to_string());
                }
                Err(warning) => {
                    tracing::debug!(
                        setting = %warning.setting,
                        input = %warning.input,
                        "setting rejected"
                    );
                    self.renderer.print_warning(&warning.to_string());
                }
            },
            ChatCommand::ToggleContinue => {
                session.toggle_continuing();
                let value = session.settings().continuing;
                self.renderer.print_info(&format!("continue set to {value}"));
            }
            ChatCommand::Help => {
                self.renderer.print_info(help_text());
            }
            ChatCommand::Status => {
                self.renderer.print_info(&describe_status(&session.status()));
            }
            ChatCommand::Quit => return Flow::Exit(Exit::Quit),
            ChatCommand::New => {
                self.renderer.print_info("starting a new conversation");
                return Flow::EndRound;
            }
            ChatCommand::Unknown(command) => {
                self.renderer.print_warning(&format!(
                    "unknown command {command}; type :help for a list of commands"
                ));
            }
            ChatCommand::Invalid(message) => {
                self.renderer.print_error(&message);
            }
        }
        Flow::AwaitInput
    }
}

fn describe_status(status: &SessionStatus) -> String {
    format!(
        "Session:\n  Model: {}\n  Temperature: {}\n  Max tokens: {}\n  Continue: {}\n  \
         Tokens used: {} ({} remaining)\n  Messages: {}",
        status.model,
        status.temperature,
        status.max_tokens,
        if status.continuing { "on" } else { "off" },
        status.token_count,
        status.remaining,
        status.message_count,
    )
}
