//! Floating-image extraction for Bill-of-Quantities (BOQ) workbooks.
//!
//! BOQ spreadsheets carry one product photo per item row as a floating DrawingML picture.
//! This crate recovers the `row -> image` mapping from an XLSX package:
//!
//! - [`Package`]: opens the Open Packaging Convention (OPC) ZIP container and inflates
//!   entries on demand under [`PackageLimits`].
//! - [`parse_image_relationships`]: `xl/drawings/_rels/drawing1.xml.rels` -> `rId -> media path`.
//! - [`parse_drawing_anchors`]: `xl/drawings/drawing1.xml` -> `row -> rId` (first picture per row).
//! - [`resolve_row_images`]: joins both and reads the media bytes into [`RowImage`]s.
//! - [`storage`]: hands [`RowImage`]s to a caller-provided [`BlobStore`] and collects `row -> URL`.
//!
//! Only an unreadable container (no usable central directory) is an error. Missing, damaged or
//! oversized drawing parts, dangling relationship ids and unreadable media entries all degrade
//! to "no image for that row".

pub mod cli;
pub mod drawingml;
mod images;
mod package;
mod path;
mod relationships;
pub mod storage;
mod zip_util;

use std::collections::BTreeMap;

pub use drawingml::{anchor_records, parse_drawing_anchors, AnchorKind, AnchorRecord};
pub use images::{resolve_row_images, ContentType, RowImage};
pub use package::{ExtractError, Package, PackageLimits};
pub use path::{DRAWING_PART, DRAWING_RELS_PART, MEDIA_ROOT};
pub use relationships::parse_image_relationships;
pub use storage::{
    upload_row_images, upload_row_images_cancellable, BlobStore, FsBlobStore, ImageKey,
    MemoryBlobStore, StorageError, UploadContext, UploadReport,
};
pub use zip_util::{DEFAULT_MAX_ENTRY_BYTES, DEFAULT_MAX_TOTAL_BYTES};

/// Extract `row -> image` from the bytes of an XLSX workbook.
///
/// Fails only with [`ExtractError::CorruptArchive`], when the bytes are not a readable ZIP
/// container. Entries are inflated lazily, so a damaged worksheet or image elsewhere in the
/// package never costs the rows that do not need it. A workbook without drawings yields an
/// empty map.
pub fn extract_row_images(bytes: &[u8]) -> Result<BTreeMap<u32, RowImage>, ExtractError> {
    extract_row_images_limited(bytes, PackageLimits::default())
}

pub fn extract_row_images_limited(
    bytes: &[u8],
    limits: PackageLimits,
) -> Result<BTreeMap<u32, RowImage>, ExtractError> {
    let pkg = Package::open_limited(bytes, limits)?;
    Ok(pkg.extract_row_images())
}

impl Package<'_> {
    /// Run the drawing pipeline over an already opened package.
    pub fn extract_row_images(&self) -> BTreeMap<u32, RowImage> {
        let Some(rels_xml) = self.optional_descriptor(DRAWING_RELS_PART) else {
            log::debug!("no drawing relationships found");
            return BTreeMap::new();
        };
        let Some(drawing_xml) = self.optional_descriptor(DRAWING_PART) else {
            log::debug!("no drawing found");
            return BTreeMap::new();
        };

        let relationships = parse_image_relationships(&rels_xml);
        let anchors = parse_drawing_anchors(&drawing_xml);
        let images = resolve_row_images(self, &relationships, &anchors);

        log::info!(
            "extracted {} images from {} anchored pictures",
            images.len(),
            anchors.len()
        );
        images
    }

    /// Text of a well-known descriptor part. Absent, damaged, oversized or non-UTF-8 parts read
    /// as "no drawings".
    fn optional_descriptor(&self, part: &str) -> Option<String> {
        match self.read_entry_text(part) {
            Ok(text) => Some(text),
            Err(ExtractError::EntryNotFound(_)) => None,
            Err(err) => {
                log::warn!("ignoring {part}: {err}");
                None
            }
        }
    }
}
