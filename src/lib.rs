// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod render;
pub mod sse;
pub mod tokens;
pub mod types;

mod observability;

// Re-exports
pub use client::{ChunkStream, CompletionService, OpenAi};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use tokens::TokenCounter;
pub use types::*;
