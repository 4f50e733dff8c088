//! Theming and decoration layer - scoped style rules attached to one graphic.
//!
//! Architecture:
//!   - Every rule is prefixed with the graphic's root `#id`, so several diagrams
//!     on one page can carry different themes without interfering
//!   - Theme overrides are sparse: absent fields emit no rule and inherit the
//!     layout engine's defaults
//!   - Re-applying replaces the previous `<style>` block instead of stacking

use crate::classify::{format_num, EDGE_CLASS, LABEL_CLASS, NODE_CLASS, PARTICLE_CLASS};
use crate::dom::{Document, NodeId};
use serde::{Deserialize, Serialize};

/// Class of the `<style>` element holding theme override rules.
pub const THEME_STYLE_CLASS: &str = "m2anim-theme";
/// Class of the `<style>` element holding base decoration rules.
pub const BASE_STYLE_CLASS: &str = "m2anim-base";
/// Class marking elements with registered interaction listeners.
pub const CLICKABLE_CLASS: &str = "diagram-clickable";
/// Class enabling the dashed flow animation on an edge.
pub const EDGE_FLOW_CLASS: &str = "edge-flow";

/// Sparse visual overrides. Pure input data; never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeOverride {
    /// Node, edge and actor stroke color; also tints particles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    /// Node and edge stroke width (px)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Fill of all label text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    /// Font size of all label text (px)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Background of the graphic root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl ThemeOverride {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Particle layer colors
pub struct ParticleColors;

impl ParticleColors {
    pub const CORE: &'static str = "#ffffff";
    pub const GLOW: &'static str = "#7dd3fc";
    pub const OUTER_GLOW: &'static str = "#38bdf8";
}

/// The root `id` used to scope rules, assigning one when the layout engine
/// left it empty.
pub fn ensure_scope_id(doc: &mut Document) -> String {
    let root = doc.root();
    if let Some(id) = doc.attr(root, "id").filter(|id| !id.trim().is_empty()) {
        return id.to_string();
    }
    let id = format!("m2anim-{}", doc.instance_id());
    doc.set_attr(root, "id", id.as_str());
    id
}

/// Build the scoped rules for a theme override. Empty when no field is set.
pub fn build_theme_rules(scope: &str, theme: &ThemeOverride) -> String {
    let s = format!("#{}", scope);
    let shapes = format!("{s} .{NODE_CLASS}, {s} .{EDGE_CLASS}");
    let text = format!("{s} .{LABEL_CLASS}, {s} .{LABEL_CLASS} *, {s} text");
    let mut rules: Vec<String> = Vec::new();

    if let Some(color) = &theme.primary_color {
        rules.push(format!("{shapes}, {s} rect.actor {{ stroke: {color} !important; }}"));
        rules.push(format!(
            "{s} .{p}-glow, {s} .{p}-outer {{ fill: {color}; }}",
            p = PARTICLE_CLASS
        ));
    }
    if let Some(width) = theme.stroke_width {
        rules.push(format!(
            "{shapes} {{ stroke-width: {}px !important; }}",
            format_num(width)
        ));
    }
    if let Some(color) = &theme.text_color {
        rules.push(format!(
            "{text} {{ fill: {color} !important; color: {color} !important; }}"
        ));
    }
    if let Some(size) = theme.font_size {
        rules.push(format!(
            "{text} {{ font-size: {}px !important; }}",
            format_num(size)
        ));
    }
    if let Some(bg) = &theme.background {
        rules.push(format!("{s} {{ background: {bg}; }}"));
    }
    rules.join("\n")
}

/// Build the base decoration rules: particle layers, pointer cursor and the
/// optional edge flow animation.
pub fn build_base_rules(scope: &str) -> String {
    let s = format!("#{}", scope);
    let p = PARTICLE_CLASS;
    format!(
        r#"{s} .{p} {{ fill: {core}; pointer-events: none; }}
{s} .{p}-glow {{ fill: {glow}; pointer-events: none; filter: blur(2px); }}
{s} .{p}-outer {{ fill: {outer}; pointer-events: none; filter: blur(6px); }}
{s} .{CLICKABLE_CLASS} {{ cursor: pointer; }}
{s} .{EDGE_FLOW_CLASS} {{ stroke-dasharray: 6 4; animation: m2anim-flow 1s linear infinite; }}
@keyframes m2anim-flow {{ to {{ stroke-dashoffset: -10; }} }}"#,
        core = ParticleColors::CORE,
        glow = ParticleColors::GLOW,
        outer = ParticleColors::OUTER_GLOW,
    )
}

/// Replace the `<style>` block with the given class. Removes it when `css` is empty.
fn replace_style_block(doc: &mut Document, class: &str, css: &str) -> Option<NodeId> {
    let root = doc.root();
    let stale: Vec<NodeId> = doc
        .element_children(root)
        .filter(|c| doc.name(*c) == "style" && doc.has_class(*c, class))
        .collect();
    for old in stale {
        doc.detach(old);
    }
    if css.is_empty() {
        return None;
    }
    let style = doc.create_element("style");
    doc.set_attr(style, "class", class);
    doc.set_text(style, css);
    doc.append_child(root, style);
    Some(style)
}

/// Apply (or clear) the theme override on this graphic.
pub fn apply_theme(doc: &mut Document, theme: Option<&ThemeOverride>) -> Option<NodeId> {
    let scope = ensure_scope_id(doc);
    let css = theme.map(|t| build_theme_rules(&scope, t)).unwrap_or_default();
    replace_style_block(doc, THEME_STYLE_CLASS, &css)
}

/// Install the base decoration rules and toggle the edge flow animation.
pub fn apply_base_decorations(doc: &mut Document, edges: &[NodeId], animate_edges: bool) {
    let scope = ensure_scope_id(doc);
    replace_style_block(doc, BASE_STYLE_CLASS, &build_base_rules(&scope));
    for edge in edges {
        if animate_edges {
            doc.add_class(*edge, EDGE_FLOW_CLASS);
        } else {
            doc.remove_class(*edge, EDGE_FLOW_CLASS);
        }
    }
}
