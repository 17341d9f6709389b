//! Schema of the parsed structured document.
//!
//! Items appear in reading order; that order is the contract every consumer
//! relies on (box-id allocation, rendering, annotation lookup). The converter
//! that produces these files is responsible for emitting a stable order for a
//! given source PDF.

use serde::{Deserialize, Serialize};

/// Where the vertical axis of a bounding box starts.
///
/// `BottomLeft` is native PDF space; `TopLeft` is what layout models emit.
/// Serialized in the converter's upper-case convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordOrigin {
    #[serde(rename = "BOTTOMLEFT")]
    BottomLeft,
    #[serde(rename = "TOPLEFT")]
    TopLeft,
}

/// Axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
}

/// Positional provenance of one document item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// 1-based page number.
    pub page_no: u32,
    pub bbox: BoundingRect,
    /// Absent means bottom-left origin (native PDF space).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_origin: Option<CoordOrigin>,
}

/// One structural element of a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocItem {
    Text {
        text: String,
        #[serde(default)]
        prov: Vec<Provenance>,
    },
    SectionHeader {
        text: String,
        #[serde(default = "default_header_level")]
        level: u8,
        #[serde(default)]
        prov: Vec<Provenance>,
    },
    Table {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        rows: Vec<Vec<String>>,
        #[serde(default)]
        prov: Vec<Provenance>,
    },
    Picture {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(default)]
        prov: Vec<Provenance>,
    },
}

fn default_header_level() -> u8 {
    1
}

impl DocItem {
    /// First provenance entry, if the item carries one.
    pub fn provenance(&self) -> Option<&Provenance> {
        match self {
            DocItem::Text { prov, .. }
            | DocItem::SectionHeader { prov, .. }
            | DocItem::Table { prov, .. }
            | DocItem::Picture { prov, .. } => prov.first(),
        }
    }
}

/// A fully parsed paper, as stored at `papers/{doi}/document.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    #[serde(default)]
    pub name: String,
    pub items: Vec<DocItem>,
}
