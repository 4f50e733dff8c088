//! Edge recognizers, one per diagram family.
//!
//! The layout engine marks edges differently per diagram type and offers no
//! shared schema, so each family contributes its own recognizer. The classifier
//! tries them in order and uses the first that finds anything.

use crate::dom::{Document, NodeId, SelectorList};
use crate::error::DomError;
use lazy_static::lazy_static;

lazy_static! {
    static ref FLOWCHART_EDGES: SelectorList =
        SelectorList::parse("path.flowchart-link, .edgePaths path, .edgePath path").unwrap();
    static ref SEQUENCE_EDGES: SelectorList = SelectorList::parse(
        "line.messageLine0, line.messageLine1, path.messageLine0, path.messageLine1"
    )
    .unwrap();
    static ref CLASS_EDGES: SelectorList = SelectorList::parse("path.relation").unwrap();
    static ref STATE_EDGES: SelectorList = SelectorList::parse("path.transition").unwrap();
}

/// Finds the edge elements of one diagram family.
pub trait EdgeRecognizer: Send + Sync {
    /// Family name, reported in classification results and logs.
    fn family(&self) -> &str;

    /// Edge elements in document order. Empty when the family doesn't apply.
    fn recognize(&self, doc: &Document) -> Vec<NodeId>;
}

/// Recognizer driven by a selector list.
#[derive(Debug, Clone)]
pub struct SelectorRecognizer {
    family: String,
    selectors: SelectorList,
}

impl SelectorRecognizer {
    pub fn new(family: &str, selectors: &str) -> Result<Self, DomError> {
        Ok(Self {
            family: family.to_string(),
            selectors: SelectorList::parse(selectors)?,
        })
    }

    fn from_list(family: &str, selectors: &SelectorList) -> Self {
        Self {
            family: family.to_string(),
            selectors: selectors.clone(),
        }
    }
}

impl EdgeRecognizer for SelectorRecognizer {
    fn family(&self) -> &str {
        &self.family
    }

    fn recognize(&self, doc: &Document) -> Vec<NodeId> {
        self.selectors.select(doc, doc.root())
    }
}

/// Last resort: every `path` that is neither inside a node container nor
/// inside a `<marker>` definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRecognizer;

impl EdgeRecognizer for FallbackRecognizer {
    fn family(&self) -> &str {
        "fallback"
    }

    fn recognize(&self, doc: &Document) -> Vec<NodeId> {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|id| doc.name(*id) == "path")
            .filter(|id| {
                !std::iter::once(*id)
                    .chain(doc.ancestors(*id))
                    .any(|a| doc.has_class(a, "node") || doc.name(a) == "marker")
            })
            .collect()
    }
}

/// Built-in recognizers in priority order. The fallback is not included; the
/// classifier always applies it last.
pub fn default_recognizers() -> Vec<Box<dyn EdgeRecognizer>> {
    vec![
        Box::new(SelectorRecognizer::from_list("flowchart", &FLOWCHART_EDGES)),
        Box::new(SelectorRecognizer::from_list("sequence", &SEQUENCE_EDGES)),
        Box::new(SelectorRecognizer::from_list("class", &CLASS_EDGES)),
        Box::new(SelectorRecognizer::from_list("state", &STATE_EDGES)),
    ]
}
