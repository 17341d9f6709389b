//! Parsed structured documents and bounding-box indexing.
//!
//! The upstream converter (out of process) writes one `document.json` per
//! paper; this module defines its schema and the renderer that turns it into
//! LLM-citable text.

pub mod bbox;
pub mod model;

pub use bbox::{render_with_box_ids, BboxMapping, BboxRecord, BoxId, RenderedDocument};
pub use model::{BoundingRect, CoordOrigin, DocItem, ParsedDocument, Provenance};
