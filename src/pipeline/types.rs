//! Persisted artifact types and their schema versions.
//!
//! Every JSON artifact carries an integer `schema_version`; readers branch on
//! it rather than assume the current shape. Bump a version on any breaking
//! structural change (field removal, rename, retype) — never for additive
//! optional fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{BoundingRect, BoxId, CoordOrigin};

pub const EXTRACTION_SCHEMA_VERSION: u32 = 1;
pub const AGGREGATE_SCHEMA_VERSION: u32 = 1;
pub const PAPER_XREF_SCHEMA_VERSION: u32 = 1;

/// A citation into the paper being extracted; the paper itself is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub box_id: BoxId,
    /// What the cited text states. Surfaces as the highlight note in the
    /// annotated PDF.
    pub commentary: String,
}

/// One factual claim about the variant, backed by at least one citation.
/// The at-least-one rule is enforced by citation validation, not by
/// construction, so a rule-breaking model response can be fed back as a
/// corrective retry instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFinding {
    pub finding: String,
    pub citations: Vec<Citation>,
}

/// Evidence extracted from a single paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub schema_version: u32,
    pub variant_discussed: bool,
    #[serde(default)]
    pub evidence: Vec<EvidenceFinding>,
}

/// A citation into one of the aggregated papers.
///
/// The model emits `paper` as a short id; the persisted artifact carries the
/// durable id with geometry attached, so consumers never re-derive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCitation {
    pub paper: String,
    pub box_id: BoxId,
    pub commentary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingRect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_origin: Option<CoordOrigin>,
}

/// Assessment for one evidence category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub classification: String,
    pub classification_rationale: String,
    pub description: String,
    /// Curator-style synthesis in Markdown.
    pub notes: String,
    pub citations: Vec<AggregateCitation>,
}

/// Cross-paper assessment, keyed by category name. An empty map is the
/// persisted record that aggregation ran and no paper discussed the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub results: BTreeMap<String, CategoryResult>,
}

/// Bibliographic metadata stored by the acquisition step at
/// `papers/{doi}/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(default)]
    pub schema_version: u32,
    pub doi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<u64>,
    pub title: String,
    /// Semicolon-delimited `"Last, First"` entries.
    pub authors: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
}

/// Short-id cross-reference persisted next to the aggregate so a UI can
/// resolve inline prose references like `Smith2020a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperXref {
    #[serde(default)]
    pub schema_version: u32,
    pub papers: BTreeMap<String, PaperXrefEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperXrefEntry {
    pub doi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<u64>,
}

/// One model exchange, kept for audit next to the structured result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub attempt: u32,
    pub prompt: String,
    pub response: String,
}
