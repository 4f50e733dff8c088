//! Arena-backed SVG element tree.
//!
//! Parsed once from the layout engine's output, then annotated in place by the
//! classifier, the decorators and the particle loop.

use crate::error::DomError;
use std::sync::atomic::{AtomicU64, Ordering};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Handle to an element or text node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable SVG document.
///
/// Detached nodes stay in the arena; they are simply unreachable from the root.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    instance: u64,
}

impl Clone for Document {
    /// Deep copy with a fresh instance id, so work bound to the original
    /// never touches the copy.
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Document {
    /// Parse SVG text. The root element must be `<svg>`.
    pub fn parse(text: &str) -> Result<Self, DomError> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };
        let xml = roxmltree::Document::parse_with_options(text, options)?;
        let root_el = xml.root_element();
        if root_el.tag_name().name() != "svg" {
            return Err(DomError::MissingRoot);
        }

        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        };
        doc.root = doc.import(root_el, None);
        Ok(doc)
    }

    fn import(&mut self, node: roxmltree::Node, parent_ns: Option<&str>) -> NodeId {
        let ns = node.tag_name().namespace();
        let mut attrs: Vec<(String, String)> = Vec::new();
        if ns == Some(XHTML_NS) && parent_ns != Some(XHTML_NS) {
            attrs.push(("xmlns".to_string(), XHTML_NS.to_string()));
        }
        for attr in node.attributes() {
            let name = match attr.namespace() {
                Some(XLINK_NS) => format!("xlink:{}", attr.name()),
                Some(XML_NS) => format!("xml:{}", attr.name()),
                _ => attr.name().to_string(),
            };
            attrs.push((name, attr.value().to_string()));
        }

        let id = self.push(NodeKind::Element {
            name: node.tag_name().name().to_string(),
            attrs,
        });

        for child in node.children() {
            if child.is_element() {
                let child_id = self.import(child, ns);
                self.attach(id, child_id, None);
            } else if child.is_text() {
                let text = child.text().unwrap_or_default();
                if text.trim().is_empty() {
                    continue;
                }
                let child_id = self.push(NodeKind::Text(text.to_string()));
                self.attach(id, child_id, None);
            }
        }
        id
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match index {
            Some(i) if i < children.len() => children.insert(i, child),
            _ => children.push(child),
        }
    }

    /// Unique id of this document instance.
    pub fn instance_id(&self) -> u64 {
        self.instance
    }

    /// The `<svg>` root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    /// Element name, or an empty string for text nodes.
    pub fn name(&self, id: NodeId) -> &str {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => name,
            NodeKind::Text(_) => "",
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Numeric attribute value. Accepts a trailing `px` and takes the first
    /// entry of a list (`x="10 20"`).
    pub fn attr_f64(&self, id: NodeId, name: &str) -> Option<f64> {
        let raw = self.attr(id, name)?;
        let first = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .find(|s| !s.is_empty())?;
        first.trim_end_matches("px").parse().ok()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let value = value.into();
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value,
                None => attrs.push((name.to_string(), value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            attrs.retain(|(k, _)| k != name);
        }
    }

    /// Attribute names and values in document order.
    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs,
            NodeKind::Text(_) => &[],
        }
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    /// Add a class unless already present. Returns whether the element changed.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        if !self.is_element(id) || self.has_class(id, class) {
            return false;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", value);
        true
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let value = self
            .classes(id)
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(id, "class", value);
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// All child nodes, text included.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// Descendant elements in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.element_children(id).collect();
        stack.reverse();
        while let Some(next) = stack.pop() {
            out.push(next);
            let before = stack.len();
            stack.extend(self.element_children(next));
            stack[before..].reverse();
        }
        out
    }

    /// First descendant element with the given name.
    pub fn find_first(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|d| self.name(*d) == name)
    }

    /// Position of `id` among its parent's element children.
    pub fn element_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.element_children(parent).position(|c| c == id)
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element {
            name: name.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, None);
    }

    /// Insert `child` at `index` in the parent's child list (all nodes counted).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.attach(parent, child, Some(index));
    }

    /// Insert `child` right after `sibling`. No-op when `sibling` is detached.
    pub fn insert_after(&mut self, sibling: NodeId, child: NodeId) {
        let Some(parent) = self.parent(sibling) else {
            return;
        };
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == sibling)
            .map_or(0, |i| i + 1);
        self.attach(parent, child, Some(index));
    }

    /// Remove a node from its parent. The subtree stays valid but unreachable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        if id.0 >= self.nodes.len() {
            return false;
        }
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in self.nodes[id.0].children.clone() {
            self.detach(child);
        }
        let node = self.create_text(text);
        self.append_child(id, node);
    }

    /// Flattened text. `<br>`, block-level XHTML and `tspan` boundaries become
    /// line breaks; `<style>` content is skipped.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    /// Text held directly by `id`, without descending. Reads `<style>` bodies.
    pub fn own_text(&self, id: NodeId) -> String {
        self.nodes[id.0]
            .children
            .iter()
            .filter_map(|child| match &self.nodes[child.0].kind {
                NodeKind::Text(t) => Some(t.as_str()),
                NodeKind::Element { .. } => None,
            })
            .collect()
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { name, .. } => match name.as_str() {
                "style" | "script" => {}
                "br" => out.push('\n'),
                "tspan" | "div" | "p" | "li" => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    for child in &self.nodes[id.0].children {
                        self.collect_text(*child, out);
                    }
                }
                _ => {
                    for child in &self.nodes[id.0].children {
                        self.collect_text(*child, out);
                    }
                }
            },
        }
    }

    /// Number of elements in the subtree rooted at `id`, itself included.
    pub fn element_count(&self, id: NodeId) -> usize {
        if !self.is_element(id) {
            return 0;
        }
        1 + self.descendants(id).len()
    }

    /// Serialize the whole document as standalone SVG text.
    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out, true);
        out
    }

    /// Serialize one subtree.
    pub fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out, false);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String, is_root: bool) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(&escape_xml(t)),
            NodeKind::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                if is_root {
                    if !attrs.iter().any(|(k, _)| k == "xmlns") {
                        out.push_str(&format!(r#" xmlns="{}""#, SVG_NS));
                    }
                    if !attrs.iter().any(|(k, _)| k == "xmlns:xlink") && self.uses_xlink() {
                        out.push_str(&format!(r#" xmlns:xlink="{}""#, XLINK_NS));
                    }
                }
                for (k, v) in attrs {
                    out.push_str(&format!(r#" {}="{}""#, k, escape_xml(v)));
                }
                let children = &self.nodes[id.0].children;
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in children {
                    self.write_node(*child, out, false);
                }
                out.push_str(&format!("</{}>", name));
            }
        }
    }

    fn uses_xlink(&self) -> bool {
        self.descendants(self.root)
            .iter()
            .any(|id| self.attrs(*id).iter().any(|(k, _)| k.starts_with("xlink:")))
    }
}

/// Escape special XML characters in text content
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" id="d">
  <g class="node default"><rect width="10" height="5"/><text><tspan>One</tspan><tspan>Two</tspan></text></g>
  <image xlink:href="a.png"/>
</svg>"#;

    #[test]
    fn test_parse_and_serialize() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.name(doc.root()), "svg");
        assert_eq!(doc.element_count(doc.root()), 7);

        let out = doc.to_svg_string();
        assert!(out.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(out.contains(r#"xlink:href="a.png""#));
        let reparsed = Document::parse(&out).unwrap();
        assert_eq!(reparsed.element_count(reparsed.root()), 7);
    }

    #[test]
    fn test_rejects_non_svg_root() {
        assert!(matches!(
            Document::parse("<html/>"),
            Err(DomError::MissingRoot)
        ));
        assert!(Document::parse("<svg><g></svg>").is_err());
    }

    #[test]
    fn test_add_class_is_idempotent() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        let g = doc.element_children(doc.root()).next().unwrap();
        assert!(doc.add_class(g, "diagram-node"));
        assert!(!doc.add_class(g, "diagram-node"));
        assert_eq!(doc.attr(g, "class"), Some("node default diagram-node"));
        doc.remove_class(g, "default");
        assert_eq!(doc.attr(g, "class"), Some("node diagram-node"));
    }

    #[test]
    fn test_text_content_breaks_lines_at_tspans() {
        let doc = Document::parse(SAMPLE).unwrap();
        let text = doc.find_first(doc.root(), "text").unwrap();
        assert_eq!(doc.text_content(text), "One\nTwo");
    }

    #[test]
    fn test_own_text_reads_style_body() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        let style = doc.create_element("style");
        doc.set_text(style, ".a { fill: red; }");
        let root = doc.root();
        doc.append_child(root, style);
        assert_eq!(doc.text_content(style), "");
        assert_eq!(doc.own_text(style), ".a { fill: red; }");
        let text = doc.find_first(doc.root(), "text").unwrap();
        assert_eq!(doc.own_text(text), "");
    }

    #[test]
    fn test_detach_and_attachment() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        let rect = doc.find_first(doc.root(), "rect").unwrap();
        assert!(doc.is_attached(rect));
        doc.detach(rect);
        assert!(!doc.is_attached(rect));
        assert_eq!(doc.element_count(doc.root()), 6);
    }

    #[test]
    fn test_insert_after_keeps_order() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        let g = doc.element_children(doc.root()).next().unwrap();
        let rect = doc.find_first(g, "rect").unwrap();
        let circle = doc.create_element("circle");
        doc.insert_after(rect, circle);
        let names: Vec<_> = doc.element_children(g).map(|c| doc.name(c).to_string()).collect();
        assert_eq!(names, vec!["rect", "circle", "text"]);
        assert_eq!(doc.element_index(circle), Some(1));
    }

    #[test]
    fn test_clone_gets_new_instance() {
        let doc = Document::parse(SAMPLE).unwrap();
        let copy = doc.clone();
        assert_ne!(doc.instance_id(), copy.instance_id());
        assert_eq!(copy.to_svg_string(), doc.to_svg_string());
    }
}
