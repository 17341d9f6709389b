//! Closed-world citation validation.
//!
//! A citation is valid iff its paper reference resolves to a known
//! [`BboxMapping`] and its box id is a key of that mapping. The validator
//! returns the violations instead of raising; the calling engine owns the
//! retry loop and the attempt counter. The same logic serves the single-paper
//! extraction case (one-entry index) and the cross-paper aggregation case.

use std::collections::BTreeMap;
use std::fmt;

use crate::document::{BboxMapping, BoxId};
use crate::identity::ShortIdTable;

use super::types::{AggregateResult, ExtractionResult};

/// One citation to check: a paper reference plus a box id.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationRef {
    pub paper: String,
    pub box_id: BoxId,
}

/// One human-readable reason a response was rejected. The display strings
/// are fed back to the model verbatim as corrective instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum CitationViolation {
    UnknownPaper { paper: String },
    UnknownBox { paper: String, box_id: BoxId },
    FindingWithoutCitations { finding: String },
}

impl fmt::Display for CitationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationViolation::UnknownPaper { paper } => {
                write!(f, "paper={paper} (paper not found)")
            }
            CitationViolation::UnknownBox { paper, box_id } => {
                write!(f, "paper={paper}, box_id={box_id}")
            }
            CitationViolation::FindingWithoutCitations { finding } => {
                write!(f, "finding without citations: \"{finding}\"")
            }
        }
    }
}

/// Check every citation against the index. Empty result means all valid.
pub fn validate_citations(
    citations: &[CitationRef],
    index: &BTreeMap<String, BboxMapping>,
) -> Vec<CitationViolation> {
    let mut violations = Vec::new();

    for citation in citations {
        match index.get(&citation.paper) {
            None => violations.push(CitationViolation::UnknownPaper {
                paper: citation.paper.clone(),
            }),
            Some(mapping) if !mapping.contains_key(&citation.box_id) => {
                violations.push(CitationViolation::UnknownBox {
                    paper: citation.paper.clone(),
                    box_id: citation.box_id,
                })
            }
            Some(_) => {}
        }
    }

    violations
}

/// Violations for a per-paper extraction result: every citation must hit the
/// paper's own mapping, and every finding must cite something.
pub fn extraction_violations(
    result: &ExtractionResult,
    doi: &str,
    mapping: &BboxMapping,
) -> Vec<CitationViolation> {
    let mut violations = Vec::new();
    let mut refs = Vec::new();

    for finding in &result.evidence {
        if finding.citations.is_empty() {
            violations.push(CitationViolation::FindingWithoutCitations {
                finding: finding.finding.clone(),
            });
        }
        for citation in &finding.citations {
            refs.push(CitationRef {
                paper: doi.to_string(),
                box_id: citation.box_id,
            });
        }
    }

    let index = BTreeMap::from([(doi.to_string(), mapping.clone())]);
    violations.extend(validate_citations(&refs, &index));
    violations
}

/// Violations for an aggregate result: each citation's short id must resolve
/// through the identity table to a paper in the union index, and its box id
/// must exist in that paper's mapping.
pub fn aggregate_violations(
    result: &AggregateResult,
    table: &ShortIdTable,
    mappings: &BTreeMap<String, BboxMapping>,
) -> Vec<CitationViolation> {
    let mut refs = Vec::new();
    let mut violations = Vec::new();

    for category in result.results.values() {
        for citation in &category.citations {
            match table.durable_for(&citation.paper) {
                Some(durable_id) => refs.push(CitationRef {
                    paper: durable_id.to_string(),
                    box_id: citation.box_id,
                }),
                None => violations.push(CitationViolation::UnknownPaper {
                    paper: citation.paper.clone(),
                }),
            }
        }
    }

    violations.extend(validate_citations(&refs, mappings));
    violations
}
