//! Completion capability: the single abstract boundary to an external
//! language-model service that returns a structured result conforming to a
//! requested JSON schema.

pub mod client;

pub use client::{
    Completion, CompletionClient, CompletionOptions, MockCompletionClient, OllamaCompletionClient,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion service is not reachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("completion service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("response parsing error: {0}")]
    ResponseParsing(String),

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("mock client has no queued response")]
    Exhausted,
}
