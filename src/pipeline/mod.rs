//! The evidence pipeline: per-paper extraction, cross-paper aggregation, and
//! PDF annotation, all grounded in validated box-id citations.

pub mod aggregate;
pub mod annotate;
pub mod extract;
pub mod prompt;
pub mod schema;
pub mod types;
pub mod validate;

pub use aggregate::{AggregateOutcome, AggregationEngine};
pub use annotate::{AnnotationEngine, AnnotationSummary};
pub use extract::{ExtractionEngine, ExtractionOutcome};
pub use schema::PromptSet;
pub use types::*;
pub use validate::{validate_citations, CitationRef, CitationViolation};

use thiserror::Error;

use crate::llm::CompletionError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The model kept producing invalid output until the attempt budget ran
    /// out. Nothing was persisted for this unit of work.
    #[error("model output still invalid after {attempts} attempts: {feedback}")]
    AttemptsExhausted { attempts: u32, feedback: String },
}
