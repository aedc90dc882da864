use roxmltree::Node;

use crate::relationships::is_relationship_id;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_NS_STRICT: &str = "http://purl.oclc.org/ooxml/officeDocument/relationships";

/// Cell-anchored drawing object kinds that carry a `from` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    TwoCell,
    OneCell,
}

impl AnchorKind {
    pub(crate) fn from_tag(name: &str) -> Option<Self> {
        match name {
            "twoCellAnchor" => Some(Self::TwoCell),
            "oneCellAnchor" => Some(Self::OneCell),
            _ => None,
        }
    }
}

/// Return the `<xdr:twoCellAnchor>` / `<xdr:oneCellAnchor>` nodes inside a worksheet drawing
/// (`<xdr:wsDr>`), handling `mc:AlternateContent` wrappers.
///
/// Some producers wrap anchors in `mc:AlternateContent` (with both `mc:Choice` and
/// `mc:Fallback` branches). A naive `.descendants()` search would see the same picture in
/// *both* branches.
///
/// This helper:
/// - walks only direct children of `<xdr:wsDr>`,
/// - treats `mc:AlternateContent` as transparent, selecting the **first** `mc:Choice`
///   branch that contains any anchor nodes (falling back to `mc:Fallback` when no choice
///   contains anchors),
/// - and returns the matching anchor nodes in document order.
///
/// `xdr:absoluteAnchor` is not returned: it has no cell position and so no row.
pub(crate) fn wsdr_anchor_nodes<'a, 'input>(wsdr: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    fn is_anchor_node(node: Node<'_, '_>) -> bool {
        node.is_element() && AnchorKind::from_tag(node.tag_name().name()).is_some()
    }

    fn first_branch_with_anchors<'a, 'input>(
        wrapper: Node<'a, 'input>,
        branch_name: &str,
    ) -> Option<Vec<Node<'a, 'input>>> {
        wrapper
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == branch_name)
            .map(|branch| {
                branch
                    .descendants()
                    .filter(|n| is_anchor_node(*n))
                    .collect::<Vec<_>>()
            })
            .find(|anchors| !anchors.is_empty())
    }

    let mut out = Vec::new();
    for child in wsdr.children().filter(|n| n.is_element()) {
        if is_anchor_node(child) {
            out.push(child);
            continue;
        }

        if child.tag_name().name() != "AlternateContent" {
            continue;
        }

        let selected = first_branch_with_anchors(child, "Choice")
            .or_else(|| first_branch_with_anchors(child, "Fallback"));
        if let Some(anchors) = selected {
            out.extend(anchors);
        }
    }

    out
}

/// 0-based row of the anchor's `<xdr:from>` position. Whitespace around the number is tolerated.
pub(crate) fn anchor_from_row(anchor: Node<'_, '_>) -> Option<u32> {
    let from = child_element(anchor, "from")?;
    child_element(from, "row")?.text()?.trim().parse().ok()
}

/// The first `r:embed` relationship id referenced anywhere inside the anchor (normally the
/// picture's `<a:blip>`).
pub(crate) fn anchor_embed_rel_id<'a>(anchor: Node<'a, '_>) -> Option<&'a str> {
    anchor
        .descendants()
        .filter(|n| n.is_element())
        .filter_map(|n| {
            n.attribute((REL_NS, "embed"))
                .or_else(|| n.attribute((REL_NS_STRICT, "embed")))
        })
        .find(|id| is_relationship_id(id))
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}
