//! Per-paper evidence extraction.
//!
//! One engine invocation handles one (variant, paper) pair:
//! already-extracted and missing-document short-circuits, box-id rendering,
//! truncation, the completion call, citation validation with bounded
//! corrective retry, and persistence of the validated result plus the raw
//! transcript. Papers are independent; the external orchestrator may run any
//! number of these concurrently.

use crate::config::PipelineConfig;
use crate::document::{render_with_box_ids, ParsedDocument};
use crate::llm::{CompletionClient, CompletionOptions};
use crate::storage::{assessment_key, encode_doi, paper_key, read_json, write_json, ObjectStore};

use super::prompt::{
    build_extraction_prompt, correction_feedback, shape_feedback, EXTRACTION_SYSTEM_PROMPT,
};
use super::schema::extraction_schema;
use super::types::{ExtractionResult, TranscriptEntry, EXTRACTION_SCHEMA_VERSION};
use super::validate::extraction_violations;
use super::PipelineError;

#[derive(Debug)]
pub enum ExtractionOutcome {
    /// Fresh extraction, validated and persisted.
    Completed(ExtractionResult),
    /// A persisted result already existed; returned unchanged, zero
    /// completion calls made.
    AlreadyExtracted(ExtractionResult),
    /// The paper's parsed document is not in storage (acquisition failed
    /// upstream). Logged, not an error.
    SkippedMissingDocument,
}

pub struct ExtractionEngine<'a> {
    store: &'a dyn ObjectStore,
    client: &'a dyn CompletionClient,
    config: &'a PipelineConfig,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        client: &'a dyn CompletionClient,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Extract evidence for `variant_id` from the paper at `doi`.
    pub fn extract(
        &self,
        variant_id: &str,
        doi: &str,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let _span =
            tracing::info_span!("extract", variant = variant_id, doi = doi).entered();

        let encoded = encode_doi(doi);
        let result_key =
            assessment_key(variant_id, &["extractions", &format!("{encoded}.json")]);
        let raw_key =
            assessment_key(variant_id, &["extractions", &format!("{encoded}_raw.json")]);

        if self.store.exists(&result_key)? {
            tracing::info!(key = %result_key, "Already extracted");
            let result = read_json(self.store, &result_key)?;
            return Ok(ExtractionOutcome::AlreadyExtracted(result));
        }

        let document_key = paper_key(doi, "document.json");
        if !self.store.exists(&document_key)? {
            tracing::info!(key = %document_key, "Parsed document unavailable, skipping paper");
            return Ok(ExtractionOutcome::SkippedMissingDocument);
        }

        let document: ParsedDocument = read_json(self.store, &document_key)?;
        let variant_details: serde_json::Value =
            read_json(self.store, &assessment_key(variant_id, &["variant.json"]))?;

        let rendered = render_with_box_ids(&document);
        let text = truncate_paper_text(rendered.text, self.config.max_paper_chars, doi);
        let base_prompt = build_extraction_prompt(&variant_details.to_string(), &text);

        let schema = extraction_schema(self.config.prompt_set);
        let opts = CompletionOptions {
            max_tokens: self.config.extraction_max_tokens,
        };

        let mut transcript: Vec<TranscriptEntry> = Vec::new();
        let mut prompt = base_prompt.clone();
        let mut last_feedback = String::new();

        for attempt in 1..=self.config.citation_attempts {
            tracing::info!(attempt, "Calling completion service for extraction");
            let completion =
                self.client
                    .complete(EXTRACTION_SYSTEM_PROMPT, &prompt, &schema, &opts)?;
            transcript.push(TranscriptEntry {
                attempt,
                prompt: prompt.clone(),
                response: completion.raw.clone(),
            });

            let mut result: ExtractionResult = match serde_json::from_value(completion.value)
            {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Response did not match extraction shape");
                    last_feedback = shape_feedback(&e.to_string());
                    prompt = format!("{base_prompt}\n\n{last_feedback}");
                    continue;
                }
            };

            let violations = extraction_violations(&result, doi, &rendered.mapping);
            if violations.is_empty() {
                result.schema_version = EXTRACTION_SCHEMA_VERSION;
                write_json(self.store, &result_key, &result)?;
                write_json(self.store, &raw_key, &transcript)?;
                tracing::info!(
                    variant_discussed = result.variant_discussed,
                    findings = result.evidence.len(),
                    "Extraction persisted"
                );
                return Ok(ExtractionOutcome::Completed(result));
            }

            tracing::warn!(
                attempt,
                violations = violations.len(),
                "Extraction cited unknown boxes, retrying with feedback"
            );
            last_feedback = correction_feedback(&violations);
            prompt = format!("{base_prompt}\n\n{last_feedback}");
        }

        // An invalid extraction must never be persisted; fail loudly instead.
        Err(PipelineError::AttemptsExhausted {
            attempts: self.config.citation_attempts,
            feedback: last_feedback,
        })
    }
}

/// Truncate oversize rendered text at the character budget and append a
/// notice; never fails on oversize input.
fn truncate_paper_text(full_text: String, max_chars: usize, doi: &str) -> String {
    if full_text.len() <= max_chars {
        return full_text;
    }

    tracing::warn!(
        doi = doi,
        chars = full_text.len(),
        budget = max_chars,
        "Paper exceeds character budget, truncating"
    );

    let notice = "\n\n[NOTE: This paper was truncated due to length.]";
    let available = max_chars.saturating_sub(notice.len());
    let mut cut = available;
    // Back off to a char boundary.
    while cut > 0 && !full_text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{notice}", &full_text[..cut])
}
