pub mod client;
pub mod corrector;
pub mod prompt;
pub mod validate;

pub use client::*;
pub use corrector::*;
pub use prompt::*;
pub use validate::*;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum CorrectionError {
    #[error("Ollama is not reachable at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed correction response: {0}")]
    MalformedResponse(String),

    #[error("Batch count mismatch: sent {sent}, received {received}")]
    BatchCountMismatch { sent: usize, received: usize },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
