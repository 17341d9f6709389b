//! Storage key layout.
//!
//! Two key families:
//!
//! ```text
//! papers/{encoded_doi}/              # corpus-wide, shared across variants
//!     document.json                  # parsed structured document
//!     source.pdf                     # original PDF bytes
//!     metadata.json                  # bibliographic metadata
//!
//! assessments/{variant_id}/          # variant-specific
//!     variant.json
//!     aggregate.json
//!     aggregate_raw.json
//!     papers.json
//!     extractions/{encoded_doi}.json
//!     extractions/{encoded_doi}_raw.json
//!     annotated/{encoded_doi}.pdf
//! ```
//!
//! DOIs are percent-encoded so separators and brackets inside a DOI (e.g.
//! `10.1002/(SICI)1098-1004...`) cannot interfere with key structure.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Encode everything except unreserved characters (`A-Z a-z 0-9 - _ . ~`).
const DOI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a DOI for safe use as a single key component.
pub fn encode_doi(doi: &str) -> String {
    utf8_percent_encode(doi, DOI_ENCODE_SET).to_string()
}

/// Key for a corpus-wide paper file, e.g.
/// `paper_key("10.1038/s41586-020-2308-7", "source.pdf")`.
pub fn paper_key(doi: &str, filename: &str) -> String {
    format!("papers/{}/{}", encode_doi(doi), filename)
}

/// Key for a variant-specific assessment file, e.g.
/// `assessment_key("var123", &["extractions", "10.1%2Fx.json"])`.
pub fn assessment_key(variant_id: &str, parts: &[&str]) -> String {
    let mut key = format!("assessments/{variant_id}");
    for part in parts {
        key.push('/');
        key.push_str(part);
    }
    key
}
