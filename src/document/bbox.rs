//! Box-id indexing: render a parsed document to markdown in which every
//! content-bearing, position-bearing element is wrapped in an inline
//! `<b id=N>…</b>` marker, and return the id → geometry mapping.
//!
//! The mapping is derived fresh from the stored document every time it is
//! needed and is never persisted on its own; caching it separately could
//! drift from the document if the upstream converter changes its output.

use std::collections::BTreeMap;

use regex::Regex;

use super::model::{BoundingRect, CoordOrigin, DocItem, ParsedDocument};

/// Citable handle of one document element, allocated from 1 in reading order.
pub type BoxId = u32;

/// Geometry recorded for one box id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BboxRecord {
    pub page: u32,
    pub bbox: BoundingRect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_origin: Option<CoordOrigin>,
}

pub type BboxMapping = BTreeMap<BoxId, BboxRecord>;

/// Result of [`render_with_box_ids`].
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub text: String,
    pub mapping: BboxMapping,
}

/// Render `doc` to markdown with inline box-id markers.
///
/// One monotonically increasing counter spans the whole traversal, shared by
/// every element type. Elements whose rendered content is empty after
/// stripping embedded comment placeholders, and elements without positional
/// provenance, receive no id and consume no slot in the mapping. Pure for a
/// fixed document snapshot.
pub fn render_with_box_ids(doc: &ParsedDocument) -> RenderedDocument {
    let comment_pattern = Regex::new(r"(?s)<!--.*?-->").unwrap();

    let mut fragments: Vec<String> = Vec::new();
    let mut mapping = BboxMapping::new();
    let mut next_id: BoxId = 1;

    for item in &doc.items {
        let rendered = render_item(item);
        if rendered.is_empty() {
            continue;
        }

        // Placeholder-only content (e.g. a bare "<!-- image -->") is dropped
        // entirely rather than given an id the model cannot cite meaningfully.
        if comment_pattern.replace_all(&rendered, "").trim().is_empty() {
            continue;
        }

        match item.provenance() {
            Some(prov) => {
                let box_id = next_id;
                next_id += 1;
                mapping.insert(
                    box_id,
                    BboxRecord {
                        page: prov.page_no,
                        bbox: prov.bbox,
                        coord_origin: prov.coord_origin,
                    },
                );
                fragments.push(format!("<b id={box_id}>{rendered}</b>"));
            }
            None => fragments.push(rendered),
        }
    }

    RenderedDocument {
        text: fragments.join("\n\n"),
        mapping,
    }
}

fn render_item(item: &DocItem) -> String {
    match item {
        DocItem::Text { text, .. } => text.trim().to_string(),
        DocItem::SectionHeader { text, level, .. } => {
            let text = text.trim();
            if text.is_empty() {
                String::new()
            } else {
                let depth = (*level).clamp(1, 6) as usize;
                format!("{} {}", "#".repeat(depth), text)
            }
        }
        DocItem::Table { caption, rows, .. } => render_table(caption.as_deref(), rows),
        DocItem::Picture { caption, .. } => match caption.as_deref().map(str::trim) {
            Some(caption) if !caption.is_empty() => caption.to_string(),
            _ => "<!-- image -->".to_string(),
        },
    }
}

/// Pipe-table rendering; the first row is treated as the header.
fn render_table(caption: Option<&str>, rows: &[Vec<String>]) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(caption) = caption.map(str::trim) {
        if !caption.is_empty() {
            lines.push(caption.to_string());
        }
    }

    for (i, row) in rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let cells: Vec<String> = row.iter().map(|c| c.trim().replace('|', "\\|")).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 && rows.len() > 1 {
            lines.push(format!("|{}|", vec!["---"; row.len()].join("|")));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::Provenance;

    fn prov(page: u32) -> Vec<Provenance> {
        vec![Provenance {
            page_no: page,
            bbox: BoundingRect {
                l: 50.0,
                t: 700.0,
                r: 550.0,
                b: 650.0,
            },
            coord_origin: Some(CoordOrigin::TopLeft),
        }]
    }

    fn text(content: &str, prov: Vec<Provenance>) -> DocItem {
        DocItem::Text {
            text: content.into(),
            prov,
        }
    }

    #[test]
    fn ids_count_content_and_provenance_bearing_items_only() {
        let doc = ParsedDocument {
            name: String::new(),
            items: vec![
                text("First paragraph.", prov(1)),
                text("", prov(1)),                       // empty: no id
                text("Unpositioned note.", vec![]),      // no provenance: no id
                DocItem::Picture {
                    caption: None,                       // placeholder-only: no id
                    prov: prov(2),
                },
                text("Second paragraph.", prov(2)),
            ],
        };

        let rendered = render_with_box_ids(&doc);
        assert_eq!(rendered.mapping.len(), 2);
        assert!(rendered.text.contains("<b id=1>First paragraph.</b>"));
        assert!(rendered.text.contains("<b id=2>Second paragraph.</b>"));
        assert!(rendered.text.contains("Unpositioned note."));
        assert!(!rendered.text.contains("<!-- image -->"));
    }

    #[test]
    fn counter_is_shared_across_element_types() {
        let doc = ParsedDocument {
            name: String::new(),
            items: vec![
                DocItem::SectionHeader {
                    text: "Results".into(),
                    level: 2,
                    prov: prov(1),
                },
                DocItem::Table {
                    caption: Some("Table 1. Cohort.".into()),
                    rows: vec![
                        vec!["Patient".into(), "Genotype".into()],
                        vec!["P1".into(), "c.2238G>C hom".into()],
                    ],
                    prov: prov(1),
                },
                DocItem::Picture {
                    caption: Some("Figure 2. Enzyme activity.".into()),
                    prov: prov(2),
                },
            ],
        };

        let rendered = render_with_box_ids(&doc);
        assert_eq!(
            rendered.mapping.keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(rendered.text.contains("<b id=1>## Results</b>"));
        assert!(rendered.text.contains("| Patient | Genotype |"));
        assert!(rendered.text.contains("<b id=3>Figure 2. Enzyme activity.</b>"));
    }

    #[test]
    fn mapping_records_geometry() {
        let doc = ParsedDocument {
            name: String::new(),
            items: vec![text("One block.", prov(3))],
        };

        let rendered = render_with_box_ids(&doc);
        let record = &rendered.mapping[&1];
        assert_eq!(record.page, 3);
        assert_eq!(record.bbox.l, 50.0);
        assert_eq!(record.coord_origin, Some(CoordOrigin::TopLeft));
    }

    #[test]
    fn rendering_is_deterministic() {
        let doc = ParsedDocument {
            name: String::new(),
            items: vec![
                text("Alpha.", prov(1)),
                text("Beta.", prov(1)),
                text("Gamma.", prov(2)),
            ],
        };

        let first = render_with_box_ids(&doc);
        let second = render_with_box_ids(&doc);
        assert_eq!(first.text, second.text);
        assert_eq!(first.mapping, second.mapping);
    }

    #[test]
    fn comment_placeholder_mixed_with_content_is_kept() {
        let doc = ParsedDocument {
            name: String::new(),
            items: vec![text("<!-- image -->\nFigure caption text.", prov(1))],
        };

        let rendered = render_with_box_ids(&doc);
        assert_eq!(rendered.mapping.len(), 1);
        assert!(rendered.text.contains("Figure caption text."));
    }

    #[test]
    fn empty_document_renders_empty() {
        let doc = ParsedDocument {
            name: String::new(),
            items: vec![],
        };
        let rendered = render_with_box_ids(&doc);
        assert!(rendered.text.is_empty());
        assert!(rendered.mapping.is_empty());
    }
}
