//! Worksheet drawing (`xl/drawings/drawingN.xml`) parsing.
//!
//! Only the parts of DrawingML needed to place a picture on a row are read: the anchor kind,
//! the `from` row and the picture's `r:embed` relationship id.

use std::collections::BTreeMap;

use roxmltree::Document;

pub(crate) mod anchor;

pub use anchor::AnchorKind;

/// One cell-anchored drawing object that references an embedded part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRecord {
    pub kind: AnchorKind,
    /// 0-based worksheet row of the anchor's top-left (`from`) cell.
    pub row: u32,
    pub rel_id: String,
}

/// All usable anchor records in document order, including several on the same row.
///
/// Anchor blocks missing a `from` row or an `r:embed` reference are skipped. A part that is not
/// well-formed XML yields no records.
pub fn anchor_records(xml: &str) -> Vec<AnchorRecord> {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(err) => {
            log::warn!("ignoring unparseable drawing part: {err}");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for node in anchor::wsdr_anchor_nodes(doc.root_element()) {
        let Some(kind) = AnchorKind::from_tag(node.tag_name().name()) else {
            continue;
        };
        let Some(row) = anchor::anchor_from_row(node) else {
            log::debug!("skipping {kind:?} anchor without a usable from/row");
            continue;
        };
        let Some(rel_id) = anchor::anchor_embed_rel_id(node) else {
            log::debug!("skipping {kind:?} anchor at row {row} without an embedded picture");
            continue;
        };
        out.push(AnchorRecord {
            kind,
            row,
            rel_id: rel_id.to_string(),
        });
    }
    out
}

/// Parse a drawing part into `row -> relationship id`.
///
/// When several pictures are anchored to the same row only the first one in document order is
/// kept; the rest are discarded.
pub fn parse_drawing_anchors(xml: &str) -> BTreeMap<u32, String> {
    let mut out = BTreeMap::new();
    for record in anchor_records(xml) {
        if out.contains_key(&record.row) {
            log::debug!(
                "discarding {} anchored to row {}: row already has an image",
                record.rel_id,
                record.row
            );
            continue;
        }
        out.insert(record.row, record.rel_id);
    }
    out
}
