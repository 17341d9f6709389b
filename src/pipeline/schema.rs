//! Compile-time registry of result shapes.
//!
//! Each prompt set pairs an extraction schema and an aggregate schema; the
//! active set is chosen once by a configuration key at startup. The schemas
//! are sent verbatim as the completion capability's `format` constraint, so
//! field descriptions double as model-facing instructions.

use serde_json::{json, Value};

/// Named prompt/schema set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSet {
    /// Generic ACMG-style variant assessment.
    Acmg,
}

impl PromptSet {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "acmg" => Some(PromptSet::Acmg),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            PromptSet::Acmg => "acmg",
        }
    }
}

/// JSON schema for the per-paper extraction result.
pub fn extraction_schema(set: PromptSet) -> Value {
    match set {
        PromptSet::Acmg => json!({
            "type": "object",
            "properties": {
                "variant_discussed": {
                    "type": "boolean",
                    "description": "Whether this specific variant is discussed in the paper"
                },
                "evidence": {
                    "type": "array",
                    "description": "Factual findings about the variant extracted from the paper",
                    "items": {
                        "type": "object",
                        "properties": {
                            "finding": {
                                "type": "string",
                                "description": "A specific factual claim about the variant"
                            },
                            "citations": {
                                "type": "array",
                                "minItems": 1,
                                "items": citation_schema(false),
                                "description": "Citations supporting this finding"
                            }
                        },
                        "required": ["finding", "citations"]
                    }
                }
            },
            "required": ["variant_discussed", "evidence"]
        }),
    }
}

/// JSON schema for the cross-paper aggregate result.
pub fn aggregate_schema(set: PromptSet) -> Value {
    match set {
        PromptSet::Acmg => json!({
            "type": "object",
            "properties": {
                "results": {
                    "type": "object",
                    "description": "One entry per evidence category",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "classification": {
                                "type": "string",
                                "description": "ACMG classification: Pathogenic, Likely Pathogenic, VUS, Likely Benign, or Benign"
                            },
                            "classification_rationale": {
                                "type": "string",
                                "description": "Brief explanation of why this classification was selected"
                            },
                            "description": {
                                "type": "string",
                                "description": "Summary template filled in with specifics from the evidence"
                            },
                            "notes": {
                                "type": "string",
                                "description": "Detailed curator-style synthesis in Markdown"
                            },
                            "citations": {
                                "type": "array",
                                "items": citation_schema(true),
                                "description": "All citations supporting factual claims in the notes"
                            }
                        },
                        "required": [
                            "classification",
                            "classification_rationale",
                            "description",
                            "notes",
                            "citations"
                        ]
                    }
                }
            },
            "required": ["results"]
        }),
    }
}

fn citation_schema(with_paper: bool) -> Value {
    let mut properties = json!({
        "box_id": {
            "type": "integer",
            "description": "The bounding box id from the source text"
        },
        "commentary": {
            "type": "string",
            "description": "What this specific text states; shown as the highlight note in the annotated PDF"
        }
    });
    let mut required = vec!["box_id", "commentary"];

    if with_paper {
        properties["paper"] = json!({
            "type": "string",
            "description": "Short id of the source paper, exactly as given in the evidence list"
        });
        required.insert(0, "paper");
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
