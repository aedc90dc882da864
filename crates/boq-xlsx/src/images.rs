use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::package::{ExtractError, Package};
use crate::path::{extension, media_part_name};

/// Image content types the extractor emits. Anything not recognized is treated as PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContentType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/gif")]
    Gif,
}

impl ContentType {
    /// Sniff the content type from a media path's file extension (case-insensitive).
    pub fn from_path(path: &str) -> Self {
        match extension(path).as_deref() {
            Some("jpg" | "jpeg") => ContentType::Jpeg,
            Some("gif") => ContentType::Gif,
            _ => ContentType::Png,
        }
    }

    pub fn as_mime(self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Gif => "image/gif",
        }
    }

    /// File extension used when storing an image of this type.
    pub fn extension(self) -> &'static str {
        match self {
            ContentType::Png => "png",
            ContentType::Jpeg => "jpg",
            ContentType::Gif => "gif",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An image resolved for one worksheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowImage {
    /// 0-based worksheet row the picture is anchored to.
    pub row: u32,
    /// Package entry the bytes were read from (e.g. `xl/media/image3.jpg`).
    pub part_name: String,
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
}

/// Join `row -> rId` with `rId -> target` and read each image from the package.
///
/// Dangling relationship ids and missing, damaged, oversized or empty media entries are skipped
/// with a warning; they never fail the whole extraction. A media entry shared by several rows is
/// inflated once.
pub fn resolve_row_images(
    pkg: &Package<'_>,
    relationships: &BTreeMap<String, String>,
    anchors: &BTreeMap<u32, String>,
) -> BTreeMap<u32, RowImage> {
    let mut out = BTreeMap::new();
    let mut media: BTreeMap<String, Option<Vec<u8>>> = BTreeMap::new();

    for (&row, rel_id) in anchors {
        let Some(target) = relationships.get(rel_id) else {
            log::warn!("row {row}: drawing references unknown image relationship {rel_id}");
            continue;
        };

        let part_name = media_part_name(target);
        let bytes = media
            .entry(part_name.clone())
            .or_insert_with(|| match pkg.read_entry(&part_name) {
                Ok(bytes) => Some(bytes),
                Err(ExtractError::EntryNotFound(_)) => {
                    log::warn!("row {row}: {rel_id} targets missing package entry {part_name}");
                    None
                }
                Err(err) => {
                    log::warn!("row {row}: skipping unreadable image entry: {err}");
                    None
                }
            });
        let Some(bytes) = bytes else {
            continue;
        };
        if bytes.is_empty() {
            log::warn!("row {row}: image entry {part_name} is empty");
            continue;
        }

        out.insert(
            row,
            RowImage {
                row,
                content_type: ContentType::from_path(target),
                bytes: bytes.clone(),
                part_name,
            },
        );
    }

    out
}
