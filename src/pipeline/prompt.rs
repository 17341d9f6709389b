//! Prompt templates for extraction and aggregation.

use super::validate::CitationViolation;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a clinical genetics literature curator. Your ONLY role is to extract
factual statements about one specific genetic variant from one scientific
paper.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Extract ONLY statements explicitly present in the paper text.
2. NEVER add interpretation, classification, or clinical opinion of your own.
3. The paper text tags each block as <b id=N>...</b>. Cite evidence by that
   numeric box id. Only ids that appear in the text are valid.
4. Every finding MUST carry at least one citation.
5. If the paper does not discuss this exact variant, set variant_discussed to
   false and return an empty evidence list.
6. Commentary should state what the cited block demonstrates, in one or two
   sentences.
"#;

pub const AGGREGATE_SYSTEM_PROMPT: &str = r#"
You are a clinical genetics curator synthesizing evidence for one genetic
variant across multiple papers.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Base every claim on the supplied per-paper evidence; never invent findings.
2. Organize the assessment into evidence categories; fill every field of each
   category result.
3. Cite evidence as (paper, box_id) pairs, where paper is the short id given
   in the evidence list (e.g. Smith2020) and box_id is one of that paper's
   cited box ids. Only those pairs are valid.
4. Refer to papers in prose by their short ids so a reader can cross-reference
   the citation list.
5. Weigh more recent papers accordingly; the evidence list is ordered most
   recent first.
"#;

/// Build the per-paper extraction prompt.
pub fn build_extraction_prompt(variant_details: &str, paper_text: &str) -> String {
    format!(
        r#"The variant under assessment:

<variant>
{variant_details}
</variant>

The full text of the paper, with each block tagged by its box id:

<paper>
{paper_text}
</paper>

Extract every factual statement this paper makes about the variant above.
Return variant_discussed, and for each finding the supporting citations by
box id."#
    )
}

/// Build the cross-paper aggregation prompt.
pub fn build_aggregate_prompt(variant_details: &str, evidence_json: &str) -> String {
    format!(
        r#"The variant under assessment:

<variant>
{variant_details}
</variant>

Per-paper evidence, ordered most recent first:

<evidence>
{evidence_json}
</evidence>

Produce the aggregate assessment across all papers. Every factual claim in the
notes must be backed by a citation with the paper's short id and a box id from
that paper's evidence."#
    )
}

/// Corrective feedback appended to the prompt when a response fails citation
/// validation.
pub fn correction_feedback(violations: &[CitationViolation]) -> String {
    let listed: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    format!(
        "Your previous response was rejected. Invalid citations: {}. \
         Cite only box ids that appear in the supplied text, and give every \
         finding at least one citation. Return the full corrected response.",
        listed.join("; ")
    )
}

/// Corrective feedback when a response failed to decode into the requested
/// shape at all.
pub fn shape_feedback(error: &str) -> String {
    format!(
        "Your previous response did not match the required output shape \
         ({error}). Return the full corrected response as valid JSON."
    )
}
