use std::collections::BTreeMap;

use roxmltree::Document;

use crate::path::strip_parent_prefix;

/// Returns `true` for ids of the form `rId<digits>`.
pub(crate) fn is_relationship_id(id: &str) -> bool {
    id.strip_prefix("rId")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse a drawing relationships part into `rId -> media target`.
///
/// Targets are normalized by stripping one leading `../`, so `../media/image1.png` becomes
/// `media/image1.png` (relative to [`crate::path::MEDIA_ROOT`]). Only targets containing
/// `media/image` are kept; hyperlinks, charts and other drawing relationships are dropped.
///
/// A part that is not well-formed XML yields an empty map: a broken descriptor means "no usable
/// images", never a failed extraction.
pub fn parse_image_relationships(xml: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(err) => {
            log::warn!("ignoring unparseable drawing relationships part: {err}");
            return out;
        }
    };

    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().name() != "Relationship" {
            continue;
        }

        let Some(id) = node.attribute("Id").filter(|id| is_relationship_id(id)) else {
            continue;
        };
        let Some(target) = node.attribute("Target") else {
            continue;
        };

        let target = strip_parent_prefix(target);
        if !target.contains("media/image") {
            continue;
        }

        // Ids are unique per the format; if a producer repeats one, the last declaration wins.
        out.insert(id.to_string(), target.to_string());
    }

    out
}
