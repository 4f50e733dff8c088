//! Click and hover wiring for classified nodes and edges.
//!
//! The host reports raw pointer events against whatever element was hit.
//! [`Listeners`] maps that element back to the registered node container or
//! edge, resolves its label and calls the matching handler.

use crate::classify::Classification;
use crate::dom::{bbox, Document, NodeId};
use crate::label::{resolve_edge_label, resolve_node_label};
use crate::theme::CLICKABLE_CLASS;
use crate::types::{EdgeEvent, Hover, NodeEvent};
use tracing::debug;

/// Caller-supplied callbacks. All optional.
#[derive(Default)]
pub struct EventHandlers {
    pub on_node_click: Option<Box<dyn FnMut(NodeEvent)>>,
    pub on_edge_click: Option<Box<dyn FnMut(EdgeEvent)>>,
    pub on_node_hover: Option<Box<dyn FnMut(Hover<NodeEvent>)>>,
    pub on_edge_hover: Option<Box<dyn FnMut(Hover<EdgeEvent>)>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_node_click(mut self, f: impl FnMut(NodeEvent) + 'static) -> Self {
        self.on_node_click = Some(Box::new(f));
        self
    }

    pub fn on_edge_click(mut self, f: impl FnMut(EdgeEvent) + 'static) -> Self {
        self.on_edge_click = Some(Box::new(f));
        self
    }

    pub fn on_node_hover(mut self, f: impl FnMut(Hover<NodeEvent>) + 'static) -> Self {
        self.on_node_hover = Some(Box::new(f));
        self
    }

    pub fn on_edge_hover(mut self, f: impl FnMut(Hover<EdgeEvent>) + 'static) -> Self {
        self.on_edge_hover = Some(Box::new(f));
        self
    }

    fn wants_nodes(&self) -> bool {
        self.on_node_click.is_some() || self.on_node_hover.is_some()
    }

    fn wants_edges(&self) -> bool {
        self.on_edge_click.is_some() || self.on_edge_hover.is_some()
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_node_click", &self.on_node_click.is_some())
            .field("on_edge_click", &self.on_edge_click.is_some())
            .field("on_node_hover", &self.on_node_hover.is_some())
            .field("on_edge_hover", &self.on_edge_hover.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Click,
    Enter,
    Leave,
}

/// A pointer event reported by the host against the element it hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub target: NodeId,
}

impl PointerEvent {
    pub fn click(target: NodeId) -> Self {
        Self { kind: PointerKind::Click, target }
    }

    pub fn enter(target: NodeId) -> Self {
        Self { kind: PointerKind::Enter, target }
    }

    pub fn leave(target: NodeId) -> Self {
        Self { kind: PointerKind::Leave, target }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Node,
    Edge,
}

/// Registered interaction targets of one graphic.
#[derive(Debug, Default)]
pub struct Listeners {
    document: Option<u64>,
    targets: Vec<(NodeId, TargetKind)>,
}

impl Listeners {
    /// Register node containers and edges for the handlers that are present.
    pub fn wire(doc: &mut Document, classification: &Classification, handlers: &EventHandlers) -> Self {
        let mut targets = Vec::new();
        if handlers.wants_nodes() {
            for container in classification.node_containers(doc) {
                targets.push((container, TargetKind::Node));
                if handlers.on_node_click.is_some() {
                    doc.add_class(container, CLICKABLE_CLASS);
                }
            }
        }
        if handlers.wants_edges() {
            for edge in &classification.edges {
                targets.push((*edge, TargetKind::Edge));
                if handlers.on_edge_click.is_some() {
                    doc.add_class(*edge, CLICKABLE_CLASS);
                }
            }
        }
        debug!(targets = targets.len(), "wired interaction listeners");
        Self {
            document: Some(doc.instance_id()),
            targets,
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Deliver a pointer event. Returns whether a handler ran.
    pub fn dispatch(
        &self,
        doc: &Document,
        classification: &Classification,
        handlers: &mut EventHandlers,
        event: PointerEvent,
    ) -> bool {
        if self.document != Some(doc.instance_id()) || !doc.is_attached(event.target) {
            return false;
        }
        let Some((element, kind)) = std::iter::once(event.target)
            .chain(doc.ancestors(event.target))
            .find_map(|n| self.targets.iter().find(|(t, _)| *t == n).copied())
        else {
            return false;
        };

        match (kind, event.kind) {
            (TargetKind::Node, PointerKind::Click) => {
                let Some(handler) = handlers.on_node_click.as_mut() else {
                    return false;
                };
                handler(node_event(doc, element));
            }
            (TargetKind::Node, hover) => {
                let Some(handler) = handlers.on_node_hover.as_mut() else {
                    return false;
                };
                handler(match hover {
                    PointerKind::Leave => Hover::Left,
                    _ => Hover::Over(node_event(doc, element)),
                });
            }
            (TargetKind::Edge, PointerKind::Click) => {
                let Some(handler) = handlers.on_edge_click.as_mut() else {
                    return false;
                };
                handler(edge_event(doc, classification, element));
            }
            (TargetKind::Edge, hover) => {
                let Some(handler) = handlers.on_edge_hover.as_mut() else {
                    return false;
                };
                handler(match hover {
                    PointerKind::Leave => Hover::Left,
                    _ => Hover::Over(edge_event(doc, classification, element)),
                });
            }
        }
        true
    }

    /// Unregister everything. Clickable marks are removed from `doc` when it
    /// is still the graphic these listeners were wired to.
    pub fn clear(&mut self, doc: &mut Document) {
        if self.document == Some(doc.instance_id()) {
            for (target, _) in &self.targets {
                doc.remove_class(*target, CLICKABLE_CLASS);
            }
        }
        self.targets.clear();
        self.document = None;
    }
}

fn node_event(doc: &Document, element: NodeId) -> NodeEvent {
    NodeEvent {
        element,
        label: resolve_node_label(doc, element),
        bbox: bbox(doc, element),
    }
}

fn edge_event(doc: &Document, classification: &Classification, element: NodeId) -> EdgeEvent {
    EdgeEvent {
        element,
        label: resolve_edge_label(doc, classification, element),
    }
}
