//! Cross-paper evidence aggregation.
//!
//! The fan-in step: collects every persisted extraction that discusses the
//! variant, substitutes durable ids with short ids for prompt legibility,
//! orders evidence most recent first, requests the multi-category assessment,
//! validates citations against the union of all papers' box mappings, and
//! persists the result with geometry already attached to every citation.
//!
//! Aggregation proceeds with whatever extractions exist at invocation time;
//! the external orchestrator is responsible for sequencing it after all
//! extraction attempts have finished.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::PipelineConfig;
use crate::document::{render_with_box_ids, BboxMapping, ParsedDocument};
use crate::identity::{assign, PaperBib, ShortIdTable};
use crate::llm::{CompletionClient, CompletionOptions};
use crate::storage::{assessment_key, encode_doi, paper_key, read_json, write_json, ObjectStore};

use super::prompt::{
    build_aggregate_prompt, correction_feedback, shape_feedback, AGGREGATE_SYSTEM_PROMPT,
};
use super::schema::aggregate_schema;
use super::types::{
    AggregateResult, ExtractionResult, PaperMetadata, PaperXref, PaperXrefEntry,
    TranscriptEntry, AGGREGATE_SCHEMA_VERSION, PAPER_XREF_SCHEMA_VERSION,
};
use super::validate::aggregate_violations;
use super::PipelineError;

#[derive(Debug)]
pub enum AggregateOutcome {
    /// Fresh aggregation, persisted. An empty category map means no paper
    /// discussed the variant (persisted without any completion call).
    Completed(AggregateResult),
    /// A persisted aggregate already existed; returned unchanged.
    AlreadyAggregated(AggregateResult),
}

/// One qualifying paper: extraction said the variant is discussed.
struct QualifyingPaper {
    doi: String,
    metadata: PaperMetadata,
    extraction: ExtractionResult,
}

pub struct AggregationEngine<'a> {
    store: &'a dyn ObjectStore,
    client: &'a dyn CompletionClient,
    config: &'a PipelineConfig,
}

impl<'a> AggregationEngine<'a> {
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

    /// Aggregate evidence for `variant_id` over the given paper set.
    pub fn aggregate(
        &self,
        variant_id: &str,
        dois: &[String],
    ) -> Result<AggregateOutcome, PipelineError> {
        let _span = tracing::info_span!("aggregate", variant = variant_id).entered();

        let result_key = assessment_key(variant_id, &["aggregate.json"]);
        let raw_key = assessment_key(variant_id, &["aggregate_raw.json"]);
        let xref_key = assessment_key(variant_id, &["papers.json"]);

        if self.store.exists(&result_key)? {
            tracing::info!(key = %result_key, "Already aggregated");
            let result = read_json(self.store, &result_key)?;
            return Ok(AggregateOutcome::AlreadyAggregated(result));
        }

        let mut papers = self.collect_qualifying(variant_id, dois)?;

        if papers.is_empty() {
            // Distinguish "ran and found nothing" from "never ran": persist
            // an explicit empty result without calling the model.
            tracing::info!("No paper discussed the variant, persisting empty aggregate");
            let empty = AggregateResult {
                schema_version: AGGREGATE_SCHEMA_VERSION,
                results: BTreeMap::new(),
            };
            write_json(self.store, &result_key, &empty)?;
            write_json(
                self.store,
                &xref_key,
                &PaperXref {
                    schema_version: PAPER_XREF_SCHEMA_VERSION,
                    papers: BTreeMap::new(),
                },
            )?;
            return Ok(AggregateOutcome::Completed(empty));
        }

        // Most recent first; durable id breaks ties so the order is
        // deterministic for a fixed input set.
        papers.sort_by(|a, b| {
            recency_key(&b.metadata.date)
                .cmp(&recency_key(&a.metadata.date))
                .then_with(|| a.doi.cmp(&b.doi))
        });

        let mappings = self.build_mappings(&papers)?;
        let table = assign(
            &papers
                .iter()
                .map(|p| PaperBib {
                    durable_id: p.doi.clone(),
                    authors: p.metadata.authors.clone(),
                    year: year_of(&p.metadata.date),
                })
                .collect::<Vec<_>>(),
        );

        let variant_details: serde_json::Value =
            read_json(self.store, &assessment_key(variant_id, &["variant.json"]))?;
        let payload = evidence_payload(&papers, &table);
        let base_prompt = build_aggregate_prompt(
            &variant_details.to_string(),
            &serde_json::to_string_pretty(&payload)?,
        );

        tracing::info!(papers = papers.len(), "Aggregating evidence");

        let schema = aggregate_schema(self.config.prompt_set);
        let opts = CompletionOptions {
            max_tokens: self.config.aggregation_max_tokens,
        };

        let mut transcript: Vec<TranscriptEntry> = Vec::new();
        let mut prompt = base_prompt.clone();
        let mut last_feedback = String::new();

        for attempt in 1..=self.config.citation_attempts {
            tracing::info!(attempt, "Calling completion service for aggregation");
            let completion =
                self.client
                    .complete(AGGREGATE_SYSTEM_PROMPT, &prompt, &schema, &opts)?;
            transcript.push(TranscriptEntry {
                attempt,
                prompt: prompt.clone(),
                response: completion.raw.clone(),
            });

            let mut result: AggregateResult = match serde_json::from_value(completion.value) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Response did not match aggregate shape");
                    last_feedback = shape_feedback(&e.to_string());
                    prompt = format!("{base_prompt}\n\n{last_feedback}");
                    continue;
                }
            };

            let violations = aggregate_violations(&result, &table, &mappings);
            if violations.is_empty() {
                enrich_citations(&mut result, &table, &mappings);
                result.schema_version = AGGREGATE_SCHEMA_VERSION;
                write_json(self.store, &result_key, &result)?;
                write_json(self.store, &raw_key, &transcript)?;
                write_json(self.store, &xref_key, &build_xref(&table, &papers))?;
                tracing::info!(
                    categories = result.results.len(),
                    citations = result
                        .results
                        .values()
                        .map(|c| c.citations.len())
                        .sum::<usize>(),
                    "Aggregate persisted"
                );
                return Ok(AggregateOutcome::Completed(result));
            }

            tracing::warn!(
                attempt,
                violations = violations.len(),
                "Aggregate cited unknown papers or boxes, retrying with feedback"
            );
            last_feedback = correction_feedback(&violations);
            prompt = format!("{base_prompt}\n\n{last_feedback}");
        }

        Err(PipelineError::AttemptsExhausted {
            attempts: self.config.citation_attempts,
            feedback: last_feedback,
        })
    }

    /// Load extractions for the paper set, skipping papers with no persisted
    /// extraction and papers where the variant was not discussed.
    fn collect_qualifying(
        &self,
        variant_id: &str,
        dois: &[String],
    ) -> Result<Vec<QualifyingPaper>, PipelineError> {
        let mut papers = Vec::new();

        for doi in dois {
            let encoded = encode_doi(doi);
            let extraction_key =
                assessment_key(variant_id, &["extractions", &format!("{encoded}.json")]);

            if !self.store.exists(&extraction_key)? {
                tracing::info!(doi = %doi, "Skipping paper: no extraction");
                continue;
            }

            let extraction: ExtractionResult = read_json(self.store, &extraction_key)?;
            if !extraction.variant_discussed {
                tracing::info!(doi = %doi, "Skipping paper: variant not discussed");
                continue;
            }

            let metadata: PaperMetadata =
                read_json(self.store, &paper_key(doi, "metadata.json"))?;

            papers.push(QualifyingPaper {
                doi: doi.clone(),
                metadata,
                extraction,
            });
        }

        Ok(papers)
    }

    /// Re-derive every qualifying paper's box mapping from its stored
    /// document (mappings are never persisted).
    fn build_mappings(
        &self,
        papers: &[QualifyingPaper],
    ) -> Result<BTreeMap<String, BboxMapping>, PipelineError> {
        let mut mappings = BTreeMap::new();
        for paper in papers {
            let document: ParsedDocument =
                read_json(self.store, &paper_key(&paper.doi, "document.json"))?;
            mappings.insert(paper.doi.clone(), render_with_box_ids(&document).mapping);
        }
        Ok(mappings)
    }
}

/// Prompt payload: per-paper evidence labeled by short id.
fn evidence_payload(papers: &[QualifyingPaper], table: &ShortIdTable) -> Vec<serde_json::Value> {
    papers
        .iter()
        .map(|paper| {
            serde_json::json!({
                "paper": table.short_for(&paper.doi),
                "title": paper.metadata.title,
                "authors": paper.metadata.authors,
                "date": paper.metadata.date,
                "evidence": paper.extraction.evidence,
            })
        })
        .collect()
}

/// Attach durable id and geometry to every citation. Only called on a
/// validated result, so every lookup succeeds.
fn enrich_citations(
    result: &mut AggregateResult,
    table: &ShortIdTable,
    mappings: &BTreeMap<String, BboxMapping>,
) {
    for category in result.results.values_mut() {
        for citation in category.citations.iter_mut() {
            let Some(durable_id) = table.durable_for(&citation.paper) else {
                continue;
            };
            let Some(record) = mappings
                .get(durable_id)
                .and_then(|mapping| mapping.get(&citation.box_id))
            else {
                continue;
            };
            citation.paper = durable_id.to_string();
            citation.page = Some(record.page);
            citation.bbox = Some(record.bbox);
            citation.coord_origin = record.coord_origin;
        }
    }
}

fn build_xref(table: &ShortIdTable, papers: &[QualifyingPaper]) -> PaperXref {
    let pmids: BTreeMap<&str, Option<u64>> = papers
        .iter()
        .map(|p| (p.doi.as_str(), p.metadata.pmid))
        .collect();

    PaperXref {
        schema_version: PAPER_XREF_SCHEMA_VERSION,
        papers: table
            .iter()
            .map(|(short_id, durable_id)| {
                (
                    short_id.to_string(),
                    PaperXrefEntry {
                        doi: durable_id.to_string(),
                        pmid: pmids.get(durable_id).copied().flatten(),
                    },
                )
            })
            .collect(),
    }
}

fn year_of(date: &str) -> Option<i32> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| chrono::Datelike::year(&d))
        .ok()
        .or_else(|| date.get(..4).and_then(|y| y.parse().ok()))
}

/// Sort key: parsed date, unparseable dates sort oldest.
fn recency_key(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}
