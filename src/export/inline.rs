//! Makes a copy of the live graphic self-contained.

use super::fetch::{is_remote, FetchChain};
use crate::dom::{Document, NodeId};
use tracing::{debug, warn};

/// Class of the `<style>` element holding inlined page rules.
pub const EXPORT_STYLE_CLASS: &str = "m2anim-export";

/// A style source from the page surrounding the graphic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSheet {
    /// Rules that can be read.
    Rules(Vec<String>),
    /// A sheet whose rules are not readable from here.
    CrossOrigin { href: String },
}

/// Every readable rule, in sheet order. Unreadable sheets are skipped.
pub fn collect_rules(sheets: &[StyleSheet]) -> Vec<String> {
    let mut rules = Vec::new();
    for sheet in sheets {
        match sheet {
            StyleSheet::Rules(list) => rules.extend(
                list.iter()
                    .map(|r| r.trim())
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
            ),
            StyleSheet::CrossOrigin { href } => {
                warn!(href = %href, "skipping unreadable stylesheet");
            }
        }
    }
    rules
}

/// Insert the rules as one `<style>` block, first child of the root.
pub fn embed_rules(doc: &mut Document, rules: &[String]) -> Option<NodeId> {
    if rules.is_empty() {
        return None;
    }
    let style = doc.create_element("style");
    doc.set_attr(style, "class", EXPORT_STYLE_CLASS);
    doc.set_text(style, &rules.join("\n"));
    let root = doc.root();
    doc.insert_child(root, 0, style);
    Some(style)
}

/// Replace every network image reference with an embedded copy.
/// Returns the number of references rewritten.
pub fn inline_images(doc: &mut Document, fetch: &FetchChain) -> usize {
    let images: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|n| doc.name(*n) == "image")
        .collect();
    let mut inlined = 0;
    for image in images {
        for attr in ["href", "xlink:href"] {
            let Some(url) = doc.attr(image, attr).filter(|u| is_remote(u)).map(str::to_string) else {
                continue;
            };
            let uri = fetch.resolve(&url);
            doc.set_attr(image, attr, uri);
            inlined += 1;
        }
    }
    debug!(inlined, "inlined external images");
    inlined
}

/// A detached, self-contained copy of the live graphic.
pub fn inline_clone(live: &Document, sheets: &[StyleSheet], fetch: &FetchChain) -> Document {
    let mut copy = live.clone();
    embed_rules(&mut copy, &collect_rules(sheets));
    inline_images(&mut copy, fetch);
    copy
}
