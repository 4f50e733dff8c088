//! Label resolver: infers the text label of an element the user interacted with.
//!
//! Labels are not reliably grouped with their shape or edge across diagram
//! types, so each lookup escalates through progressively looser strategies and
//! resolves to `None` rather than guessing wildly.

use crate::classify::{Classification, EDGE_CLASS, LABEL_CLASS};
use crate::dom::{bbox, Document, NodeId, SelectorList};
use lazy_static::lazy_static;

/// Candidate text longer than this is treated as unrelated bulk text.
pub const MAX_LABEL_CHARS: usize = 200;

/// Edge labels farther than this from the edge's center are not considered (px).
pub const EDGE_LABEL_CUTOFF: f64 = 200.0;

/// How many siblings on each side of an edge are searched for its label.
const SIBLING_WINDOW: usize = 2;

lazy_static! {
    /// Node label descendants, in priority order.
    static ref NODE_LABEL_SOURCES: [SelectorList; 5] = [
        SelectorList::parse("text").unwrap(),
        SelectorList::parse(".nodeLabel").unwrap(),
        SelectorList::parse(".label").unwrap(),
        SelectorList::parse("tspan").unwrap(),
        SelectorList::parse("foreignObject").unwrap(),
    ];
}

/// Shapes that never contain their own label.
fn is_leaf_shape(name: &str) -> bool {
    matches!(name, "rect" | "circle" | "ellipse" | "polygon" | "path" | "image")
}

/// Trimmed text if it is usable as a label.
fn accept(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty() && trimmed.chars().count() < MAX_LABEL_CHARS).then(|| trimmed.to_string())
}

/// Best-guess label of a node (or any shape inside one).
pub fn resolve_node_label(doc: &Document, element: NodeId) -> Option<String> {
    let container = match doc.parent(element) {
        Some(parent) if is_leaf_shape(doc.name(element)) => parent,
        _ => element,
    };

    for source in NODE_LABEL_SOURCES.iter() {
        for candidate in source.select(doc, container) {
            if let Some(label) = accept(&doc.text_content(candidate)) {
                return Some(label);
            }
        }
    }

    doc.text_content(container)
        .lines()
        .find(|line| !line.trim().is_empty())
        .and_then(accept)
}

fn is_label(doc: &Document, id: NodeId) -> bool {
    doc.has_class(id, LABEL_CLASS)
        || doc.classes(id).any(|c| c.to_ascii_lowercase().contains("label"))
        || doc.has_class(id, "messageText")
}

fn is_connector(doc: &Document, id: NodeId) -> bool {
    doc.has_class(id, EDGE_CLASS) || matches!(doc.name(id), "path" | "line" | "polyline")
}

/// Best-guess label of an edge.
pub fn resolve_edge_label(
    doc: &Document,
    classification: &Classification,
    edge: NodeId,
) -> Option<String> {
    paired_in_parent(doc, edge)
        .or_else(|| nearby_sibling(doc, edge))
        .or_else(|| nearest_by_distance(doc, classification, edge))
}

/// The parent holds exactly one label and exactly one connector: they belong together.
fn paired_in_parent(doc: &Document, edge: NodeId) -> Option<String> {
    let parent = doc.parent(edge)?;
    let children: Vec<NodeId> = doc.element_children(parent).collect();
    let labels: Vec<NodeId> = children.iter().copied().filter(|c| is_label(doc, *c)).collect();
    let connectors = children.iter().filter(|c| is_connector(doc, **c)).count();
    match (labels.as_slice(), connectors) {
        ([label], 1) => accept(&doc.text_content(*label)),
        _ => None,
    }
}

/// A label-classed sibling within two positions of the edge.
fn nearby_sibling(doc: &Document, edge: NodeId) -> Option<String> {
    let parent = doc.parent(edge)?;
    let siblings: Vec<NodeId> = doc.element_children(parent).collect();
    let idx = siblings.iter().position(|s| *s == edge)?;
    let lo = idx.saturating_sub(SIBLING_WINDOW);
    let hi = (idx + SIBLING_WINDOW).min(siblings.len() - 1);
    // Closest positions first.
    let mut order: Vec<usize> = (lo..=hi).filter(|i| *i != idx).collect();
    order.sort_by_key(|i| i.abs_diff(idx));
    order
        .into_iter()
        .map(|i| siblings[i])
        .filter(|s| is_label(doc, *s))
        .find_map(|s| accept(&doc.text_content(s)))
}

/// The classified label whose center is closest to the edge's center, if
/// strictly within [`EDGE_LABEL_CUTOFF`].
fn nearest_by_distance(
    doc: &Document,
    classification: &Classification,
    edge: NodeId,
) -> Option<String> {
    let center = bbox(doc, edge)?.center();
    classification
        .labels
        .iter()
        .filter_map(|label| {
            let text = accept(&doc.text_content(*label))?;
            let distance = bbox(doc, *label)?.center().distance(center);
            (distance < EDGE_LABEL_CUTOFF).then_some((distance, text))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, text)| text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;

    fn first(doc: &Document, name: &str) -> NodeId {
        doc.find_first(doc.root(), name).unwrap()
    }

    #[test]
    fn test_rect_click_resolves_sibling_label() {
        let doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g class="node default">
<rect width="100" height="40"/>
<g class="label"><foreignObject width="90" height="20"><div xmlns="http://www.w3.org/1999/xhtml"><span class="nodeLabel">Start Process</span></div></foreignObject></g>
</g></svg>"#,
        )
        .unwrap();
        let rect = first(&doc, "rect");
        assert_eq!(resolve_node_label(&doc, rect).as_deref(), Some("Start Process"));
    }

    #[test]
    fn test_text_descendant_wins_over_rich_text() {
        let doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><circle r="5"/><foreignObject><div xmlns="http://www.w3.org/1999/xhtml">Rich</div></foreignObject><text>Plain</text></g></svg>"#,
        )
        .unwrap();
        assert_eq!(resolve_node_label(&doc, first(&doc, "circle")).as_deref(), Some("Plain"));
    }

    #[test]
    fn test_oversized_and_empty_text_rejected() {
        let long = "x".repeat(250);
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect/><text> </text><text>{long}</text></g></svg>"#
        );
        let doc = Document::parse(&svg).unwrap();
        assert_eq!(resolve_node_label(&doc, first(&doc, "rect")), None);
    }

    #[test]
    fn test_node_fallback_uses_first_line() {
        let doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect/><a><title>x</title></a></g></svg>"#,
        )
        .unwrap();
        assert_eq!(resolve_node_label(&doc, first(&doc, "rect")).as_deref(), Some("x"));
    }

    #[test]
    fn test_edge_label_paired_in_parent() {
        let mut doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><line class="messageLine0" x1="0" y1="0" x2="10" y2="0"/><text class="messageText">hi</text></g></svg>"#,
        )
        .unwrap();
        let c = Classifier::new().classify(&mut doc);
        assert_eq!(resolve_edge_label(&doc, &c, c.edges[0]).as_deref(), Some("hi"));
    }

    #[test]
    fn test_edge_label_from_nearby_sibling() {
        let mut doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
<line class="messageLine0" x1="0" y1="0" x2="10" y2="0"/>
<rect/>
<text class="messageText">first</text>
<line class="messageLine0" x1="0" y1="900" x2="10" y2="900"/>
<text class="messageText">second</text>
</svg>"#,
        )
        .unwrap();
        let c = Classifier::new().classify(&mut doc);
        assert_eq!(resolve_edge_label(&doc, &c, c.edges[0]).as_deref(), Some("first"));
        assert_eq!(resolve_edge_label(&doc, &c, c.edges[1]).as_deref(), Some("first"));
    }

    #[test]
    fn test_edge_label_by_distance_with_cutoff() {
        let mut doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
<g class="edgePaths"><path class="flowchart-link" d="M0,0L0,100"/><path class="flowchart-link" d="M1000,0L1000,100"/><path/><path/></g>
<g class="edgeLabels"><g class="edgeLabel" transform="translate(0,50)"><text>near</text></g><g class="edgeLabel" transform="translate(0,400)"><text>far</text></g></g>
</svg>"#,
        )
        .unwrap();
        let c = Classifier::new().classify(&mut doc);
        assert_eq!(resolve_edge_label(&doc, &c, c.edges[0]).as_deref(), Some("near"));
        assert_eq!(resolve_edge_label(&doc, &c, c.edges[1]), None);
    }
}
