//! The graphic tree: a mutable SVG document plus selector matching and geometry.

mod tree;
mod selector;
mod geometry;
mod path;

pub use tree::{escape_xml, Document, NodeId};
pub use selector::SelectorList;
pub use geometry::{
    bbox, ctm, estimate_text_width, font_size, local_transform, parent_ctm, style_value, BBox,
    Point, Transform,
};
pub use path::{parse_points, PathGeometry};
