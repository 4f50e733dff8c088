//! Screen-space geometry: transforms and bounding boxes.

use super::path::PathGeometry;
use super::tree::{Document, NodeId};
use serde::{Deserialize, Serialize};

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BBox {
            x,
            y,
            width: (self.x + self.width).max(other.x + other.width) - x,
            height: (self.y + self.height).max(other.y + other.height) - y,
        }
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x, self.y + self.height),
            Point::new(self.x + self.width, self.y + self.height),
        ]
    }
}

/// 2D affine matrix `[a c e; b d f; 0 0 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self { e: tx, f: ty, ..Self::identity() }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self { a: sx, d: sy, ..Self::identity() }
    }

    pub fn rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self { a: cos, b: sin, c: -sin, d: cos, e: 0.0, f: 0.0 }
    }

    /// `self × inner`: apply `inner` first, then `self`.
    pub fn then(&self, inner: &Transform) -> Transform {
        Transform {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Parse an SVG `transform` attribute. Unknown functions are ignored.
    pub fn parse(value: &str) -> Transform {
        let mut result = Transform::identity();
        let mut rest = value;
        while let Some(open) = rest.find('(') {
            let Some(close) = rest[open..].find(')').map(|c| c + open) else {
                break;
            };
            let name = rest[..open].trim_matches(|c: char| c.is_whitespace() || c == ',');
            let args: Vec<f64> = rest[open + 1..close]
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter_map(|s| s.parse().ok())
                .collect();
            let arg = |i: usize, default: f64| args.get(i).copied().unwrap_or(default);
            let step = match name {
                "translate" => Transform::translate(arg(0, 0.0), arg(1, 0.0)),
                "scale" => {
                    let sx = arg(0, 1.0);
                    Transform::scale(sx, arg(1, sx))
                }
                "rotate" => {
                    let (cx, cy) = (arg(1, 0.0), arg(2, 0.0));
                    Transform::translate(cx, cy)
                        .then(&Transform::rotate(arg(0, 0.0)))
                        .then(&Transform::translate(-cx, -cy))
                }
                "matrix" if args.len() == 6 => Transform {
                    a: args[0],
                    b: args[1],
                    c: args[2],
                    d: args[3],
                    e: args[4],
                    f: args[5],
                },
                _ => Transform::identity(),
            };
            result = result.then(&step);
            rest = &rest[close + 1..];
        }
        result
    }
}

/// The element's own `transform` attribute.
pub fn local_transform(doc: &Document, id: NodeId) -> Transform {
    doc.attr(id, "transform").map(Transform::parse).unwrap_or_default()
}

/// Current transformation matrix: root user space from the element's own
/// coordinate system (its `transform` included).
pub fn ctm(doc: &Document, id: NodeId) -> Transform {
    let mut chain: Vec<NodeId> = doc.ancestors(id).collect();
    chain.reverse();
    chain.push(id);
    chain
        .into_iter()
        .fold(Transform::identity(), |acc, n| acc.then(&local_transform(doc, n)))
}

/// Transform from the element's parent coordinate system to screen space.
pub fn parent_ctm(doc: &Document, id: NodeId) -> Transform {
    doc.parent(id).map_or_else(Transform::identity, |p| ctm(doc, p))
}

/// Screen-space bounding box of an element and everything it draws.
///
/// Non-rendered containers (`defs`, `marker`, `clipPath`, ...) contribute nothing.
pub fn bbox(doc: &Document, id: NodeId) -> Option<BBox> {
    let mut acc = None;
    collect_bbox(doc, id, &ctm(doc, id), &mut acc);
    acc
}

fn collect_bbox(doc: &Document, id: NodeId, ctm: &Transform, acc: &mut Option<BBox>) {
    let local = match doc.name(id) {
        "defs" | "marker" | "clipPath" | "mask" | "pattern" | "symbol" | "style" | "title"
        | "desc" | "linearGradient" | "radialGradient" | "filter" | "script" => return,
        "text" => text_bbox(doc, id),
        "rect" | "image" | "foreignObject" | "use" => box_attrs(doc, id),
        "circle" => {
            let r = doc.attr_f64(id, "r").unwrap_or(0.0);
            ellipse_box(doc, id, r, r)
        }
        "ellipse" => ellipse_box(
            doc,
            id,
            doc.attr_f64(id, "rx").unwrap_or(0.0),
            doc.attr_f64(id, "ry").unwrap_or(0.0),
        ),
        "line" | "polyline" | "polygon" | "path" => PathGeometry::from_element(doc, id)
            .and_then(|g| BBox::from_points(&g.vertices())),
        _ => {
            for child in doc.element_children(id) {
                let child_ctm = ctm.then(&local_transform(doc, child));
                collect_bbox(doc, child, &child_ctm, acc);
            }
            return;
        }
    };
    if let Some(local) = local {
        let mapped: Vec<Point> = local.corners().iter().map(|p| ctm.apply(*p)).collect();
        if let Some(screen) = BBox::from_points(&mapped) {
            *acc = Some(match acc {
                Some(prev) => prev.union(&screen),
                None => screen,
            });
        }
    }
}

fn box_attrs(doc: &Document, id: NodeId) -> Option<BBox> {
    let width = doc.attr_f64(id, "width")?;
    let height = doc.attr_f64(id, "height")?;
    Some(BBox {
        x: doc.attr_f64(id, "x").unwrap_or(0.0),
        y: doc.attr_f64(id, "y").unwrap_or(0.0),
        width,
        height,
    })
}

fn ellipse_box(doc: &Document, id: NodeId, rx: f64, ry: f64) -> Option<BBox> {
    let cx = doc.attr_f64(id, "cx").unwrap_or(0.0);
    let cy = doc.attr_f64(id, "cy").unwrap_or(0.0);
    Some(BBox {
        x: cx - rx,
        y: cy - ry,
        width: rx * 2.0,
        height: ry * 2.0,
    })
}

/// Default font size for text without an explicit size (in px)
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Average character width in px at the given font size and weight
pub fn estimate_text_width(text: &str, font_size: f64, font_weight: u32) -> f64 {
    // Heavier weights are slightly wider.
    let width_ratio = if font_weight >= 600 {
        0.58
    } else if font_weight >= 500 {
        0.55
    } else {
        0.52
    };
    text.chars().count() as f64 * font_size * width_ratio
}

/// Font size from the `font-size` attribute or inline style, inherited from
/// the nearest ancestor that sets one.
pub fn font_size(doc: &Document, id: NodeId) -> f64 {
    std::iter::once(id)
        .chain(doc.ancestors(id))
        .find_map(|n| {
            doc.attr_f64(n, "font-size")
                .or_else(|| style_value(doc, n, "font-size").and_then(|v| v.trim_end_matches("px").parse().ok()))
        })
        .unwrap_or(DEFAULT_FONT_SIZE)
}

/// Value of one property in an element's inline `style` attribute.
pub fn style_value<'a>(doc: &'a Document, id: NodeId, property: &str) -> Option<&'a str> {
    doc.attr(id, "style")?
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(k, _)| k.trim() == property)
        .map(|(_, v)| v.trim())
}

fn text_bbox(doc: &Document, id: NodeId) -> Option<BBox> {
    let content = doc.text_content(id);
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let size = font_size(doc, id);
    let weight = doc
        .attr(id, "font-weight")
        .and_then(|w| w.parse().ok())
        .unwrap_or(400);
    let width = lines
        .iter()
        .map(|l| estimate_text_width(l.trim(), size, weight))
        .fold(0.0, f64::max);
    let height = size * 1.2 * lines.len() as f64;

    let first_tspan = doc.find_first(id, "tspan");
    let pick = |name: &str| {
        doc.attr_f64(id, name)
            .or_else(|| first_tspan.and_then(|t| doc.attr_f64(t, name)))
            .unwrap_or(0.0)
    };
    let (x, y) = (pick("x"), pick("y"));

    let left = match doc.attr(id, "text-anchor").or_else(|| style_value(doc, id, "text-anchor")) {
        Some("middle") => x - width / 2.0,
        Some("end") => x - width,
        _ => x,
    };
    let top = match doc.attr(id, "dominant-baseline").or_else(|| doc.attr(id, "alignment-baseline")) {
        Some("middle" | "central") => y - size / 2.0,
        _ => y - size * 0.8,
    };
    Some(BBox {
        x: left,
        y: top,
        width,
        height,
    })
}
