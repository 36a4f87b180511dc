//! Interactive chat with an OpenAI-compatible completion service.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! parley
//!
//! # Start with a different model and keep the conversation going
//! parley --model gpt-4o --continuing
//!
//! # Disable colors (useful for piping output)
//! parley --no-color
//! ```
//!
//! The first prompt asks for the system instruction.  After that every line is a message,
//! unless it starts with `:`:
//! - `:help` - Show available commands
//! - `:model <name>` - Change the model
//! - `:temperature <value>` - Set the sampling temperature
//! - `:max_tokens <n>` - Set the token ceiling for the conversation
//! - `:continue` - Toggle whether the conversation continues after each reply
//! - `:status` - Show settings and token usage
//! - `:new` - Start over with the same system instruction
//! - `:quit` - Exit the application

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use parley::chat::{ChatArgs, ChatConfig, Driver, Input, LineReader, PlainTextRenderer, Renderer};
use parley::{Error, OpenAi};

/// The rustyline editor as a source of lines.
struct Terminal {
    editor: DefaultEditor,
}

impl LineReader for Terminal {
    fn read_line(&mut self, prompt: &str) -> parley::Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(Error::input(err.to_string())),
        }
    }
}

/// Main entry point for the parley application.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("parley [OPTIONS]");
    let (config, warnings) = ChatConfig::from_args(args);
    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_palette(config.palette.clone());
    for warning in &warnings {
        renderer.print_warning(&warning.to_string());
    }

    // Ctrl-C while a reply is streaming ends the process at once.
    if let Err(err) = ctrlc::set_handler(|| std::process::exit(130)) {
        tracing::warn!(error = %err, "could not install the interrupt handler");
    }

    let client = match OpenAi::with_options(None, config.base_url.clone(), config.timeout) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "failed to create the client");
            renderer.print_error(&err.to_string());
            std::process::exit(1);
        }
    };
    if !client.has_credential() {
        tracing::debug!("no API key found; the first request will fail");
    }
    let editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            renderer.print_error(&format!("cannot open the terminal: {err}"));
            std::process::exit(1);
        }
    };

    println!(
        "parley (model: {}). Enter the system instruction, then chat; :help lists commands.",
        config.settings.model
    );
    let mut driver = Driver::new(client, config, renderer, Terminal { editor });
    match driver.run().await {
        Ok(exit) => std::process::exit(exit.code()),
        Err(err) => {
            tracing::error!(error = %err, "parley stopped");
            std::process::exit(1);
        }
    }
}
