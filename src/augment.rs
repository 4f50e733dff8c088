//! Actor image augmenter.
//!
//! Sequence diagram sources may declare `participant img:<locator> <name>`.
//! That token is not valid diagram syntax, so it is stripped before layout and
//! the image is attached to the rendered actor box afterwards, once its
//! geometry exists.

use crate::classify::format_num;
use crate::dom::{Document, NodeId};
use crate::theme::ensure_scope_id;
use crate::types::ImageMapping;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

/// Side of the square actor image (px)
pub const ACTOR_IMAGE_SIZE: f64 = 48.0;
/// Distance from the actor box's left edge to the image (px)
pub const ACTOR_IMAGE_INSET: f64 = 8.0;
/// Gap kept between image and text (px)
pub const ACTOR_IMAGE_GAP: f64 = 4.0;
/// Corner radius of the image clip (px)
pub const ACTOR_IMAGE_RADIUS: f64 = 8.0;
/// Class of attached actor images
pub const ACTOR_IMAGE_CLASS: &str = "actor-image";

lazy_static! {
    static ref RE_IMAGE_PARTICIPANT: Regex =
        Regex::new(r"(?m)^([ \t]*)participant[ \t]+img:(\S+)[ \t]+(.+?)([ \t]*\r?)$").unwrap();
}

/// Diagram source with image tokens stripped, plus the extracted mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    pub source: String,
    pub images: ImageMapping,
}

/// Phase 1: extract image locators and rewrite declarations to plain
/// `participant <name>` form.
///
/// With `participant img:x.png A as Alice` the rendered name is `Alice`, so
/// that is the mapping key; the rewritten line keeps the alias.
pub fn extract_actor_images(source: &str) -> PreparedSource {
    let mut images = ImageMapping::new();
    let cleaned = RE_IMAGE_PARTICIPANT.replace_all(source, |caps: &Captures| {
        let declared = caps[3].to_string();
        let display = declared
            .split_once(" as ")
            .map_or(declared.as_str(), |(_, alias)| alias)
            .trim();
        images.insert(display, &caps[2]);
        format!("{}participant {}{}", &caps[1], declared, &caps[4])
    });
    PreparedSource {
        source: cleaned.into_owned(),
        images,
    }
}

/// Whether a group looks like a rendered actor box: a rectangle and text as
/// direct children, plus either an actor class or a connector line.
fn actor_parts(doc: &Document, group: NodeId) -> Option<(NodeId, NodeId)> {
    if doc.name(group) != "g" {
        return None;
    }
    let rect = doc.element_children(group).find(|c| doc.name(*c) == "rect")?;
    let text = doc.element_children(group).find(|c| doc.name(*c) == "text")?;
    let actor_marked = [group, rect, text]
        .iter()
        .any(|n| doc.classes(*n).any(|c| c.contains("actor")));
    let has_line = doc.find_first(group, "line").is_some();
    (actor_marked || has_line).then_some((rect, text))
}

/// Phase 2: attach each mapped image to its rendered actor box.
///
/// Returns the number of images attached. Boxes that already carry an image
/// are skipped; names without a rendered actor are silently unused.
pub fn attach_actor_images(doc: &mut Document, images: &ImageMapping) -> usize {
    if images.is_empty() {
        return 0;
    }
    let scope = ensure_scope_id(doc);
    let groups: Vec<NodeId> = doc.descendants(doc.root());
    let mut serial = groups
        .iter()
        .filter(|n| doc.has_class(**n, ACTOR_IMAGE_CLASS))
        .count();
    let mut attached = 0;

    for group in groups {
        let Some((rect, text)) = actor_parts(doc, group) else {
            continue;
        };
        if doc
            .element_children(group)
            .any(|c| doc.has_class(c, ACTOR_IMAGE_CLASS))
        {
            continue;
        }
        let name = doc.text_content(text);
        let Some(locator) = images.get(name.trim()) else {
            continue;
        };
        let locator = locator.to_string();

        let x = doc.attr_f64(rect, "x").unwrap_or(0.0);
        let y = doc.attr_f64(rect, "y").unwrap_or(0.0);
        let height = doc.attr_f64(rect, "height").unwrap_or(ACTOR_IMAGE_SIZE);
        let image_x = x + ACTOR_IMAGE_INSET;
        let image_y = y + (height - ACTOR_IMAGE_SIZE) / 2.0;

        let clip_id = format!("{}-actor-clip-{}", scope, serial);
        serial += 1;

        let clip = doc.create_element("clipPath");
        doc.set_attr(clip, "id", clip_id.as_str());
        let clip_rect = doc.create_element("rect");
        for (k, v) in [
            ("x", image_x),
            ("y", image_y),
            ("width", ACTOR_IMAGE_SIZE),
            ("height", ACTOR_IMAGE_SIZE),
            ("rx", ACTOR_IMAGE_RADIUS),
            ("ry", ACTOR_IMAGE_RADIUS),
        ] {
            doc.set_attr(clip_rect, k, format_num(v));
        }
        doc.append_child(clip, clip_rect);
        doc.append_child(group, clip);

        let image = doc.create_element("image");
        doc.set_attr(image, "class", ACTOR_IMAGE_CLASS);
        doc.set_attr(image, "href", locator.as_str());
        for (k, v) in [
            ("x", image_x),
            ("y", image_y),
            ("width", ACTOR_IMAGE_SIZE),
            ("height", ACTOR_IMAGE_SIZE),
        ] {
            doc.set_attr(image, k, format_num(v));
        }
        doc.set_attr(image, "clip-path", format!("url(#{})", clip_id));
        doc.set_attr(image, "preserveAspectRatio", "xMidYMid slice");
        doc.append_child(group, image);

        shift_text(doc, text, ACTOR_IMAGE_SIZE / 2.0 + ACTOR_IMAGE_GAP);
        debug!(actor = %name.trim(), locator = %locator, "attached actor image");
        attached += 1;
    }
    attached
}

/// Move a text element (and any positioned tspans) right by `dx`.
fn shift_text(doc: &mut Document, text: NodeId, dx: f64) {
    let targets: Vec<NodeId> = std::iter::once(text)
        .chain(doc.descendants(text).into_iter().filter(|d| doc.name(*d) == "tspan"))
        .collect();
    for node in targets {
        if let Some(x) = doc.attr_f64(node, "x") {
            doc.set_attr(node, "x", format_num(x + dx));
        }
    }
}
