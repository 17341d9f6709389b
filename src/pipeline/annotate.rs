//! Highlight annotation of source PDFs from aggregate citations.
//!
//! Citations are flattened across categories, regrouped by paper, and drawn
//! onto each paper's original PDF as one Highlight annotation per citation,
//! with the commentary as the annotation note. Geometry is re-derived from
//! the stored document rather than trusted from the persisted aggregate, so
//! annotation stays correct even against an older aggregate artifact.

use std::collections::BTreeMap;

use lopdf::{dictionary, Object};

use crate::document::{
    render_with_box_ids, BboxMapping, BoundingRect, CoordOrigin, ParsedDocument,
};
use crate::storage::{assessment_key, encode_doi, paper_key, read_json, ObjectStore};

use super::types::{AggregateResult, PaperXref};
use super::PipelineError;

/// Highlight color, ffeb3b.
const HIGHLIGHT_RGB: [f32; 3] = [1.0, 0.922, 0.231];

/// Fallback page height when a PDF page carries no resolvable MediaBox
/// (US Letter).
const DEFAULT_PAGE_HEIGHT: f64 = 792.0;

#[derive(Debug, Default, PartialEq)]
pub struct AnnotationSummary {
    /// Papers for which an annotated PDF was written.
    pub annotated: u32,
    /// Papers with citations whose source PDF was missing or unreadable.
    pub failed: u32,
}

/// A citation resolved to concrete page geometry, ready to draw.
struct PlacedCitation {
    box_id: u32,
    commentary: String,
    category: String,
    page: u32,
    bbox: BoundingRect,
    coord_origin: Option<CoordOrigin>,
}

pub struct AnnotationEngine<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> AnnotationEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Write one annotated PDF per cited paper for `variant_id`.
    pub fn annotate(&self, variant_id: &str) -> Result<AnnotationSummary, PipelineError> {
        let _span = tracing::info_span!("annotate", variant = variant_id).entered();

        let aggregate: AggregateResult =
            read_json(self.store, &assessment_key(variant_id, &["aggregate.json"]))?;

        // Citations normally carry durable ids; a citation still holding a
        // short id (older aggregate revisions) is resolved through the
        // persisted cross-reference table.
        let xref: Option<PaperXref> =
            read_json(self.store, &assessment_key(variant_id, &["papers.json"])).ok();

        let multi_category = aggregate.results.len() > 1;
        let mut by_doi: BTreeMap<String, Vec<(String, u32, String)>> = BTreeMap::new();
        for (category, result) in &aggregate.results {
            for citation in &result.citations {
                let doi = xref
                    .as_ref()
                    .and_then(|x| x.papers.get(&citation.paper))
                    .map(|entry| entry.doi.clone())
                    .unwrap_or_else(|| citation.paper.clone());
                by_doi.entry(doi).or_default().push((
                    category.clone(),
                    citation.box_id,
                    citation.commentary.clone(),
                ));
            }
        }

        if by_doi.is_empty() {
            tracing::info!("No citations in aggregate, nothing to annotate");
            return Ok(AnnotationSummary::default());
        }

        let mut summary = AnnotationSummary::default();

        for (doi, raw_citations) in by_doi {
            let mapping = match self.load_mapping(&doi) {
                Some(mapping) => mapping,
                None => {
                    tracing::warn!(doi = %doi, "Parsed document unavailable, skipping annotations for this paper");
                    continue;
                }
            };

            let placed = place_citations(&doi, &raw_citations, &mapping);
            if placed.is_empty() {
                tracing::warn!(doi = %doi, "No citation resolved to geometry, no output for this paper");
                continue;
            }

            let pdf_key = paper_key(&doi, "source.pdf");
            let pdf_bytes = match self.store.read_bytes(&pdf_key) {
                Ok(bytes) => bytes,
                Err(_) => {
                    tracing::warn!(doi = %doi, key = %pdf_key, "Original PDF missing");
                    summary.failed += 1;
                    continue;
                }
            };

            let annotated = match draw_highlights(&pdf_bytes, &placed, variant_id, multi_category)
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(doi = %doi, error = %e, "Failed to annotate PDF");
                    summary.failed += 1;
                    continue;
                }
            };

            let output_key = assessment_key(
                variant_id,
                &["annotated", &format!("{}.pdf", encode_doi(&doi))],
            );
            match self.store.write_bytes(&output_key, &annotated) {
                Ok(()) => {
                    tracing::info!(doi = %doi, highlights = placed.len(), key = %output_key, "Annotated PDF written");
                    summary.annotated += 1;
                }
                Err(e) => {
                    tracing::error!(doi = %doi, error = %e, "Failed to write annotated PDF");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            annotated = summary.annotated,
            failed = summary.failed,
            "Annotation finished"
        );
        Ok(summary)
    }

    fn load_mapping(&self, doi: &str) -> Option<BboxMapping> {
        let document: ParsedDocument =
            read_json(self.store, &paper_key(doi, "document.json")).ok()?;
        Some(render_with_box_ids(&document).mapping)
    }
}

/// Resolve each citation's geometry by box id; unresolvable citations are
/// dropped with a warning.
fn place_citations(
    doi: &str,
    citations: &[(String, u32, String)],
    mapping: &BboxMapping,
) -> Vec<PlacedCitation> {
    citations
        .iter()
        .filter_map(|(category, box_id, commentary)| match mapping.get(box_id) {
            Some(record) => Some(PlacedCitation {
                box_id: *box_id,
                commentary: commentary.clone(),
                category: category.clone(),
                page: record.page,
                bbox: record.bbox,
                coord_origin: record.coord_origin,
            }),
            None => {
                tracing::warn!(doi = %doi, box_id, "Citation box id not found in mapping, skipping");
                None
            }
        })
        .collect()
}

/// Convert to PDF bottom-left coordinates, returning `(x1, y1, x2, y2)` with
/// `y1 <= y2`.
fn to_pdf_coordinates(
    bbox: &BoundingRect,
    page_height: f64,
    coord_origin: Option<CoordOrigin>,
) -> (f64, f64, f64, f64) {
    let (x1, x2) = (bbox.l, bbox.r);
    let (top, bottom) = match coord_origin {
        Some(CoordOrigin::TopLeft) => (page_height - bbox.t, page_height - bbox.b),
        _ => (bbox.t, bbox.b),
    };
    let (y1, y2) = if top <= bottom {
        (top, bottom)
    } else {
        (bottom, top)
    };
    (x1, y1, x2, y2)
}

/// Draw one Highlight annotation per citation onto the PDF.
fn draw_highlights(
    pdf_bytes: &[u8],
    citations: &[PlacedCitation],
    variant_label: &str,
    multi_category: bool,
) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = lopdf::Document::load_mem(pdf_bytes)?;
    let pages = doc.get_pages();

    for (page_no, page_id) in pages {
        let page_citations: Vec<&PlacedCitation> =
            citations.iter().filter(|c| c.page == page_no).collect();
        if page_citations.is_empty() {
            continue;
        }

        let page_height = page_height(&doc, page_id);
        let mut new_annots: Vec<Object> = Vec::new();

        for citation in page_citations {
            let (x1, y1, x2, y2) =
                to_pdf_coordinates(&citation.bbox, page_height, citation.coord_origin);

            let content = if multi_category && !citation.category.is_empty() {
                format!("[{}] {}", citation.category, citation.commentary)
            } else {
                citation.commentary.clone()
            };

            let annotation = dictionary! {
                "Type" => Object::Name(b"Annot".to_vec()),
                "Subtype" => Object::Name(b"Highlight".to_vec()),
                "Rect" => Object::Array(vec![
                    Object::Real(x1 as f32),
                    Object::Real(y1 as f32),
                    Object::Real(x2 as f32),
                    Object::Real(y2 as f32),
                ]),
                "QuadPoints" => Object::Array(vec![
                    Object::Real(x1 as f32),
                    Object::Real(y2 as f32),
                    Object::Real(x2 as f32),
                    Object::Real(y2 as f32),
                    Object::Real(x1 as f32),
                    Object::Real(y1 as f32),
                    Object::Real(x2 as f32),
                    Object::Real(y1 as f32),
                ]),
                "C" => Object::Array(
                    HIGHLIGHT_RGB.iter().map(|&c| Object::Real(c)).collect(),
                ),
                "F" => Object::Integer(4),
                "Contents" => Object::string_literal(content),
                "T" => Object::string_literal(format!("{variant_label} - Variant Evidence")),
                "NM" => Object::string_literal(format!("citation_{}", citation.box_id)),
            };
            let annot_id = doc.add_object(Object::Dictionary(annotation));
            new_annots.push(Object::Reference(annot_id));
        }

        // Merge with any annotations the page already carries.
        let mut annots = existing_annots(&doc, page_id);
        annots.extend(new_annots);
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Annots", Object::Array(annots));
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn existing_annots(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Vec<Object> {
    let Ok(page_dict) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page_dict.get(b"Annots") {
        Ok(Object::Array(array)) => array.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .and_then(Object::as_array)
            .map(|array| array.clone())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// MediaBox height for a page, following the Parent chain for inherited
/// boxes.
fn page_height(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> f64 {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let resolved = match media_box {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
            if let Some(values) = resolved.and_then(|o| o.as_array().ok()) {
                if values.len() == 4 {
                    let y0 = number(&values[1]);
                    let y1 = number(&values[3]);
                    if let (Some(y0), Some(y1)) = (y0, y1) {
                        return (y1 - y0).abs();
                    }
                }
            }
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
    }
    DEFAULT_PAGE_HEIGHT
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocItem, Provenance};
    use crate::pipeline::types::{
        AggregateCitation, CategoryResult, AGGREGATE_SCHEMA_VERSION,
    };
    use crate::storage::{write_json, MemoryObjectStore};

    /// One-page empty PDF with a 612x792 MediaBox.
    fn minimal_pdf() -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Kids" => Object::Array(vec![Object::Reference(page_id)]),
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn placed(box_id: u32, origin: Option<CoordOrigin>) -> PlacedCitation {
        PlacedCitation {
            box_id,
            commentary: "Reduced activity.".into(),
            category: "functional".into(),
            page: 1,
            bbox: BoundingRect {
                l: 50.0,
                t: 100.0,
                r: 550.0,
                b: 120.0,
            },
            coord_origin: origin,
        }
    }

    #[test]
    fn top_left_geometry_reflects_through_page_height() {
        let bbox = BoundingRect {
            l: 10.0,
            t: 100.0,
            r: 200.0,
            b: 120.0,
        };
        let (x1, y1, x2, y2) =
            to_pdf_coordinates(&bbox, 792.0, Some(CoordOrigin::TopLeft));
        assert_eq!((x1, x2), (10.0, 200.0));
        assert_eq!((y1, y2), (672.0, 692.0), "pair reordered so y1 is lower");
    }

    #[test]
    fn bottom_left_geometry_used_as_is() {
        let bbox = BoundingRect {
            l: 10.0,
            t: 700.0,
            r: 200.0,
            b: 680.0,
        };
        let (_, y1, _, y2) = to_pdf_coordinates(&bbox, 792.0, None);
        assert_eq!((y1, y2), (680.0, 700.0));
    }

    #[test]
    fn draws_one_highlight_per_citation() {
        let pdf = minimal_pdf();
        let citations = vec![
            placed(1, Some(CoordOrigin::TopLeft)),
            placed(2, Some(CoordOrigin::TopLeft)),
        ];

        let annotated = draw_highlights(&pdf, &citations, "var1", false).unwrap();
        let doc = lopdf::Document::load_mem(&annotated).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let annots = existing_annots(&doc, page_id);
        assert_eq!(annots.len(), 2);

        let first = match &annots[0] {
            Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
            other => panic!("expected reference, got {other:?}"),
        };
        assert_eq!(
            first.get(b"Subtype").unwrap().as_name().unwrap(),
            &b"Highlight"[..]
        );
        assert!(first.get(b"QuadPoints").unwrap().as_array().unwrap().len() == 8);
    }

    #[test]
    fn category_prefix_only_when_multiple_categories() {
        let pdf = minimal_pdf();
        let citations = vec![placed(1, None)];

        let annotated = draw_highlights(&pdf, &citations, "var1", true).unwrap();
        let doc = lopdf::Document::load_mem(&annotated).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let annots = existing_annots(&doc, page_id);
        let dict = match &annots[0] {
            Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
            other => panic!("expected reference, got {other:?}"),
        };
        let contents = dict.get(b"Contents").unwrap().as_str().unwrap();
        assert!(String::from_utf8_lossy(contents).starts_with("[functional]"));
    }

    fn seed_annotation_fixtures(store: &MemoryObjectStore, doi: &str, with_pdf: bool) {
        let document = ParsedDocument {
            name: doi.to_string(),
            items: vec![DocItem::Text {
                text: "Activity was reduced.".into(),
                prov: vec![Provenance {
                    page_no: 1,
                    bbox: BoundingRect {
                        l: 50.0,
                        t: 100.0,
                        r: 550.0,
                        b: 120.0,
                    },
                    coord_origin: Some(CoordOrigin::TopLeft),
                }],
            }],
        };
        write_json(store, &paper_key(doi, "document.json"), &document).unwrap();
        if with_pdf {
            store
                .write_bytes(&paper_key(doi, "source.pdf"), &minimal_pdf())
                .unwrap();
        }

        let mut results = BTreeMap::new();
        results.insert(
            "functional".to_string(),
            CategoryResult {
                classification: "VUS".into(),
                classification_rationale: "Limited.".into(),
                description: "…".into(),
                notes: "…".into(),
                citations: vec![AggregateCitation {
                    paper: doi.to_string(),
                    box_id: 1,
                    commentary: "Assay.".into(),
                    page: Some(1),
                    bbox: None,
                    coord_origin: None,
                }],
            },
        );
        write_json(
            store,
            "assessments/var1/aggregate.json",
            &AggregateResult {
                schema_version: AGGREGATE_SCHEMA_VERSION,
                results,
            },
        )
        .unwrap();
    }

    #[test]
    fn annotates_cited_paper_end_to_end() {
        let store = MemoryObjectStore::new();
        seed_annotation_fixtures(&store, "10.1/a", true);

        let engine = AnnotationEngine::new(&store);
        let summary = engine.annotate("var1").unwrap();
        assert_eq!(summary, AnnotationSummary { annotated: 1, failed: 0 });
        assert!(store
            .exists("assessments/var1/annotated/10.1%2Fa.pdf")
            .unwrap());
    }

    #[test]
    fn missing_source_pdf_counts_as_failure() {
        let store = MemoryObjectStore::new();
        seed_annotation_fixtures(&store, "10.1/a", false);

        let engine = AnnotationEngine::new(&store);
        let summary = engine.annotate("var1").unwrap();
        assert_eq!(summary, AnnotationSummary { annotated: 0, failed: 1 });
    }

    #[test]
    fn short_id_citation_resolves_through_xref() {
        use crate::pipeline::types::{PaperXrefEntry, PAPER_XREF_SCHEMA_VERSION};
        use std::collections::BTreeMap as Map;

        let store = MemoryObjectStore::new();
        seed_annotation_fixtures(&store, "10.1/a", true);

        // Rewrite the aggregate so its citation still holds a short id.
        let mut aggregate: AggregateResult =
            read_json(&store, "assessments/var1/aggregate.json").unwrap();
        aggregate
            .results
            .get_mut("functional")
            .unwrap()
            .citations[0]
            .paper = "Smith2020".into();
        write_json(&store, "assessments/var1/aggregate.json", &aggregate).unwrap();

        let mut papers = Map::new();
        papers.insert(
            "Smith2020".to_string(),
            PaperXrefEntry {
                doi: "10.1/a".into(),
                pmid: None,
            },
        );
        write_json(
            &store,
            "assessments/var1/papers.json",
            &PaperXref {
                schema_version: PAPER_XREF_SCHEMA_VERSION,
                papers,
            },
        )
        .unwrap();

        let engine = AnnotationEngine::new(&store);
        let summary = engine.annotate("var1").unwrap();
        assert_eq!(summary, AnnotationSummary { annotated: 1, failed: 0 });
        assert!(store
            .exists("assessments/var1/annotated/10.1%2Fa.pdf")
            .unwrap());
    }

    #[test]
    fn empty_aggregate_annotates_nothing() {
        let store = MemoryObjectStore::new();
        write_json(
            &store,
            "assessments/var1/aggregate.json",
            &AggregateResult {
                schema_version: AGGREGATE_SCHEMA_VERSION,
                results: BTreeMap::new(),
            },
        )
        .unwrap();

        let engine = AnnotationEngine::new(&store);
        let summary = engine.annotate("var1").unwrap();
        assert_eq!(summary, AnnotationSummary::default());
    }
}
