//! Structural classifier: partitions a rendered diagram into nodes, edges,
//! labels and connector markers, and tags them with stable classes.
//!
//! Tagging lets later passes (theming, export) target elements uniformly no
//! matter which diagram family produced them. Running the classifier again on
//! an already tagged tree changes nothing.

mod recognizers;

pub use recognizers::{default_recognizers, EdgeRecognizer, FallbackRecognizer, SelectorRecognizer};

use crate::dom::{Document, NodeId, SelectorList};
use crate::types::Role;
use lazy_static::lazy_static;
use tracing::debug;

/// Class added to every node shape.
pub const NODE_CLASS: &str = "diagram-node";
/// Class added to every edge.
pub const EDGE_CLASS: &str = "diagram-edge";
/// Class added to every label element.
pub const LABEL_CLASS: &str = "diagram-label";
/// Class added to every connector marker definition.
pub const MARKER_CLASS: &str = "diagram-marker";
/// Class prefix shared by particle layers.
pub const PARTICLE_CLASS: &str = "flow-particle";

/// How far an arrowhead's reference point is pulled back so the connecting
/// stroke ends under the back of the head instead of poking through its tip.
pub const ARROWHEAD_REF_SHIFT: f64 = 2.0;

/// Marks a marker whose reference point was already corrected.
const REF_ADJUSTED_ATTR: &str = "data-ref-adjusted";

lazy_static! {
    static ref NODE_SHAPES: SelectorList =
        SelectorList::parse(".node rect, .node polygon, .node circle, .node ellipse, rect.actor")
            .unwrap();
    static ref LABELS: SelectorList =
        SelectorList::parse(".nodeLabel, .edgeLabel, .label, .messageText, text.actor").unwrap();
    static ref MARKERS: SelectorList = SelectorList::parse("marker").unwrap();
}

/// Role-partitioned elements of one graphic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub nodes: Vec<NodeId>,
    /// Edges in traversal (document) order.
    pub edges: Vec<NodeId>,
    pub labels: Vec<NodeId>,
    pub markers: Vec<NodeId>,
    /// Family of the recognizer that found the edges.
    pub edge_family: String,
}

impl Classification {
    pub fn role_of(&self, doc: &Document, id: NodeId) -> Role {
        if self.nodes.contains(&id) {
            Role::Node
        } else if self.edges.contains(&id) {
            Role::Edge
        } else if self.labels.contains(&id) {
            Role::Label
        } else if self.markers.contains(&id) {
            Role::Marker
        } else if doc.classes(id).any(|c| c.starts_with(PARTICLE_CLASS)) {
            Role::Particle
        } else {
            Role::Unclassified
        }
    }

    /// Interaction containers for node shapes: each shape's parent, or the
    /// shape itself when it sits directly under the root. Deduplicated.
    pub fn node_containers(&self, doc: &Document) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for shape in &self.nodes {
            let container = node_container(doc, *shape);
            if !out.contains(&container) {
                out.push(container);
            }
        }
        out
    }
}

/// The container a node shape belongs to.
pub fn node_container(doc: &Document, shape: NodeId) -> NodeId {
    match doc.parent(shape) {
        Some(parent) if parent != doc.root() => parent,
        _ => shape,
    }
}

/// Classifier with an ordered list of edge recognizers.
pub struct Classifier {
    recognizers: Vec<Box<dyn EdgeRecognizer>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            recognizers: default_recognizers(),
        }
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recognizer ahead of the fallback (after the existing ones).
    pub fn with_recognizer(mut self, recognizer: Box<dyn EdgeRecognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    /// Classify, tag and repair arrowhead markers in place.
    pub fn classify(&self, doc: &mut Document) -> Classification {
        let root = doc.root();
        let nodes = NODE_SHAPES.select(doc, root);

        let (edges, edge_family) = self
            .recognizers
            .iter()
            .map(|r| (r.recognize(doc), r.family().to_string()))
            .find(|(found, _)| !found.is_empty())
            .unwrap_or_else(|| {
                let fallback = FallbackRecognizer;
                (fallback.recognize(doc), fallback.family().to_string())
            });

        let labels = LABELS.select(doc, root);
        let markers = MARKERS.select(doc, root);

        for (ids, class) in [
            (&nodes, NODE_CLASS),
            (&edges, EDGE_CLASS),
            (&labels, LABEL_CLASS),
            (&markers, MARKER_CLASS),
        ] {
            for id in ids {
                doc.add_class(*id, class);
            }
        }

        let repaired = repair_arrowheads(doc, &markers);

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            labels = labels.len(),
            markers = markers.len(),
            repaired,
            family = %edge_family,
            "classified diagram"
        );

        Classification {
            nodes,
            edges,
            labels,
            markers,
            edge_family,
        }
    }
}

/// Whether a marker id names an arrowhead.
fn is_arrowhead(id: &str) -> bool {
    let id = id.to_ascii_lowercase();
    id.contains("arrow") || id.contains("pointend") || id.contains("pointstart")
}

/// Pull each arrowhead marker's `refX` back by [`ARROWHEAD_REF_SHIFT`], once.
/// Returns how many markers were corrected in this call.
fn repair_arrowheads(doc: &mut Document, markers: &[NodeId]) -> usize {
    let mut repaired = 0;
    for marker in markers {
        if doc.attr(*marker, REF_ADJUSTED_ATTR).is_some()
            || !doc.attr(*marker, "id").is_some_and(is_arrowhead)
        {
            continue;
        }
        let ref_x = doc.attr_f64(*marker, "refX").unwrap_or(0.0);
        doc.set_attr(*marker, "refX", format_num(ref_x - ARROWHEAD_REF_SHIFT));
        doc.set_attr(*marker, REF_ADJUSTED_ATTR, "true");
        repaired += 1;
    }
    repaired
}

/// Format a float without a trailing `.0` for whole numbers.
pub(crate) fn format_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.3}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
