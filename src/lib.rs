//! varcite — citation-grounded literature evidence pipeline for genetic
//! variant assessment.
//!
//! Given a corpus of parsed papers, the pipeline extracts factual evidence
//! about one variant per paper, aggregates it into a classified assessment
//! with box-level citations, and overlays those citations onto the original
//! PDFs as highlights. Every model response is validated against a
//! closed-world index of citable boxes before anything is persisted, and
//! every persisted artifact doubles as the resumability signal for safe
//! re-runs after partial failure.
//!
//! Out-of-process collaborators (paper acquisition, PDF conversion, task
//! scheduling) interact with the pipeline purely through the object store
//! layout defined in [`storage::keys`].

pub mod config;
pub mod document;
pub mod identity;
pub mod llm;
pub mod pipeline;
pub mod storage;

pub use config::PipelineConfig;
pub use pipeline::{
    AggregateOutcome, AggregationEngine, AnnotationEngine, AnnotationSummary,
    ExtractionEngine, ExtractionOutcome, PipelineError,
};
