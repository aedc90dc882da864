/// Drawing part for the first worksheet drawing in a SpreadsheetML package.
pub const DRAWING_PART: &str = "xl/drawings/drawing1.xml";

/// Relationships part belonging to [`DRAWING_PART`].
pub const DRAWING_RELS_PART: &str = "xl/drawings/_rels/drawing1.xml.rels";

/// Directory that normalized drawing relationship targets (`media/imageN.ext`) live under.
pub const MEDIA_ROOT: &str = "xl";

/// Strip a single leading `../` so a drawing-relative target becomes relative to [`MEDIA_ROOT`].
pub(crate) fn strip_parent_prefix(target: &str) -> &str {
    target.strip_prefix("../").unwrap_or(target)
}

/// Package entry name for a normalized relationship target (`media/image1.png` -> `xl/media/image1.png`).
pub(crate) fn media_part_name(target: &str) -> String {
    format!("{MEDIA_ROOT}/{target}")
}

/// Lower-cased file extension of the last path segment, if any.
pub(crate) fn extension(path: &str) -> Option<String> {
    let file_name = path.rsplit_once('/').map(|(_, f)| f).unwrap_or(path);
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}
