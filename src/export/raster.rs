//! Rasterization of an inlined graphic into PNG or JPEG.

use crate::classify::format_num;
use crate::dom::{bbox, font_size, style_value, Document, NodeId};
use crate::error::ExportError;
use image::codecs::jpeg::JpegEncoder;
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;

/// Linear supersampling factor
pub const SUPERSAMPLE: f32 = 2.0;
/// Margin around the graphic on every side, before supersampling (px)
pub const PADDING: f64 = 100.0;

/// Rendered size of the graphic: its `viewBox`, else numeric `width`/`height`,
/// else the bounding box of its content.
pub fn graphic_size(doc: &Document) -> Option<(f64, f64)> {
    let root = doc.root();
    let from_view_box = doc.attr(root, "viewBox").and_then(|vb| {
        let nums: Vec<f64> = vb
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        (nums.len() == 4).then(|| (nums[2], nums[3]))
    });
    let from_attrs = || {
        let dimension = |name| doc.attr(root, name).filter(|v| !v.ends_with('%')).and_then(|_| doc.attr_f64(root, name));
        Some((dimension("width")?, dimension("height")?))
    };
    from_view_box
        .or_else(from_attrs)
        .or_else(|| bbox(doc, root).map(|b| (b.width, b.height)))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0 && w.is_finite() && h.is_finite())
}

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` or a few color keywords.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "white" => return Some(Color::WHITE),
        "black" => return Some(Color::BLACK),
        "transparent" | "none" => return Some(Color::TRANSPARENT),
        _ => {}
    }
    let hex = value.strip_prefix('#')?;
    let digit = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
    let (r, g, b, a) = match hex.len() {
        3 => {
            let d = |i| digit(i, 1).map(|v| v * 17);
            (d(0)?, d(1)?, d(2)?, 255)
        }
        6 => (digit(0, 2)?, digit(2, 2)?, digit(4, 2)?, 255),
        8 => (digit(0, 2)?, digit(2, 2)?, digit(4, 2)?, digit(6, 2)?),
        _ => return None,
    };
    Some(Color::from_rgba8(r, g, b, a))
}

/// Line height of flattened HTML labels, in em
const LABEL_LINE_HEIGHT: f64 = 1.2;

/// Replace every `foreignObject` with a `<text>` centered in its box.
/// usvg does not render HTML, so labels would otherwise be lost. Returns the
/// number of replaced elements.
pub fn flatten_foreign_objects(doc: &mut Document) -> usize {
    let targets: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|n| doc.name(*n) == "foreignObject")
        .collect();
    let mut replaced = 0;
    for object in targets {
        if !doc.is_attached(object) {
            continue;
        }
        let content = doc.text_content(object);
        let lines: Vec<&str> = content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let x = doc.attr_f64(object, "x").unwrap_or(0.0) + doc.attr_f64(object, "width").unwrap_or(0.0) / 2.0;
        let y = doc.attr_f64(object, "y").unwrap_or(0.0) + doc.attr_f64(object, "height").unwrap_or(0.0) / 2.0;
        let size = font_size(doc, object);
        let color = std::iter::once(object)
            .chain(doc.descendants(object))
            .find_map(|n| style_value(doc, n, "color"))
            .map(str::to_string);

        let text = doc.create_element("text");
        doc.set_attr(text, "x", format_num(x));
        doc.set_attr(text, "y", format_num(y));
        doc.set_attr(text, "text-anchor", "middle");
        doc.set_attr(text, "dominant-baseline", "central");
        doc.set_attr(text, "font-size", format_num(size));
        if let Some(color) = color {
            doc.set_attr(text, "fill", color);
        }
        if let Some(transform) = doc.attr(object, "transform").map(str::to_string) {
            doc.set_attr(text, "transform", transform);
        }
        match lines.as_slice() {
            [] => {}
            [line] => doc.set_text(text, line),
            _ => {
                let first_dy = -(lines.len() as f64 - 1.0) / 2.0 * LABEL_LINE_HEIGHT;
                for (i, line) in lines.iter().enumerate() {
                    let tspan = doc.create_element("tspan");
                    doc.set_attr(tspan, "x", format_num(x));
                    let dy = if i == 0 { first_dy } else { LABEL_LINE_HEIGHT };
                    doc.set_attr(tspan, "dy", format!("{}em", format_num(dy)));
                    doc.set_text(tspan, line);
                    doc.append_child(text, tspan);
                }
            }
        }
        doc.insert_after(object, text);
        doc.detach(object);
        replaced += 1;
    }
    replaced
}

/// The SVG text handed to the rasterizer: sized explicitly, with HTML labels
/// flattened to SVG text.
pub fn raster_svg(inlined: &Document, size: (f64, f64)) -> String {
    let (width, height) = size;
    let mut sized = inlined.clone();
    let root = sized.root();
    sized.set_attr(root, "width", format_num(width));
    sized.set_attr(root, "height", format_num(height));
    flatten_foreign_objects(&mut sized);
    sized.to_svg_string()
}

/// Rasterize at [`SUPERSAMPLE`]× with [`PADDING`] on every side, on top of
/// `background`.
pub fn rasterize(inlined: &Document, size: (f64, f64), background: Color) -> Result<Pixmap, ExportError> {
    let (width, height) = size;
    let svg = raster_svg(inlined, size);

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(&svg, &options).map_err(|e| ExportError::Rasterize(e.to_string()))?;

    let canvas_w = ((width + 2.0 * PADDING) * SUPERSAMPLE as f64).ceil() as u32;
    let canvas_h = ((height + 2.0 * PADDING) * SUPERSAMPLE as f64).ceil() as u32;
    let mut pixmap = Pixmap::new(canvas_w, canvas_h).ok_or(ExportError::Surface {
        width: canvas_w,
        height: canvas_h,
    })?;
    pixmap.fill(background);

    let transform = Transform::from_scale(SUPERSAMPLE, SUPERSAMPLE)
        .pre_translate(PADDING as f32, PADDING as f32);
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Ok(pixmap)
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, ExportError> {
    pixmap.encode_png().map_err(|e| ExportError::Encode {
        format: "png",
        reason: e.to_string(),
    })
}

/// JPEG has no alpha channel: pixels are flattened to RGB.
pub fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>, ExportError> {
    let rgb: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue()]
        })
        .collect();
    let buffer = image::RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb).ok_or(ExportError::Encode {
        format: "jpeg",
        reason: "pixel buffer size mismatch".to_string(),
    })?;
    let mut out = Vec::new();
    buffer
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)))
        .map_err(|e| ExportError::Encode {
            format: "jpeg",
            reason: e.to_string(),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#fff"), Some(Color::WHITE));
        assert_eq!(parse_color("#000000"), Some(Color::BLACK));
        assert_eq!(parse_color("#ff000080"), Some(Color::from_rgba8(255, 0, 0, 128)));
        assert_eq!(parse_color("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("rebeccapurple"), None);
    }

    #[test]
    fn test_graphic_size_sources() {
        let vb = Document::parse(r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="-8 -8 200 120"/>"#).unwrap();
        assert_eq!(graphic_size(&vb), Some((200.0, 120.0)));
        let attrs = Document::parse(r#"<svg xmlns="http://www.w3.org/2000/svg" width="50px" height="40"/>"#).unwrap();
        assert_eq!(graphic_size(&attrs), Some((50.0, 40.0)));
        let content = Document::parse(r#"<svg xmlns="http://www.w3.org/2000/svg"><rect x="5" y="5" width="30" height="20"/></svg>"#).unwrap();
        assert_eq!(graphic_size(&content), Some((30.0, 20.0)));
        let empty = Document::parse(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap();
        assert_eq!(graphic_size(&empty), None);
    }

    #[test]
    fn test_canvas_is_padded_and_supersampled() {
        let doc = Document::parse(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 50 30"><rect width="50" height="30" fill="#ff0000"/></svg>"##,
        )
        .unwrap();
        let pixmap = rasterize(&doc, (50.0, 30.0), Color::WHITE).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (500, 460));
        let corner = pixmap.pixel(0, 0).unwrap();
        assert_eq!((corner.red(), corner.green(), corner.blue(), corner.alpha()), (255, 255, 255, 255));
        let inside = pixmap.pixel(250, 230).unwrap();
        assert_eq!((inside.red(), inside.green(), inside.blue()), (255, 0, 0));
    }

    const LABELS: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 100" font-size="14">
<g class="label" transform="translate(10, 20)"><foreignObject width="100" height="40"><div xmlns="http://www.w3.org/1999/xhtml" style="color: rgb(51, 51, 51);"><span class="nodeLabel">Start Process</span></div></foreignObject></g>
<g class="label"><foreignObject x="0" y="50" width="80" height="40"><div xmlns="http://www.w3.org/1999/xhtml">Two<br/>lines</div></foreignObject></g>
</svg>"#;

    #[test]
    fn test_foreign_objects_become_centered_text() {
        let mut doc = Document::parse(LABELS).unwrap();
        assert_eq!(flatten_foreign_objects(&mut doc), 2);
        assert!(doc.find_first(doc.root(), "foreignObject").is_none());

        let texts: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| doc.name(*n) == "text")
            .collect();
        assert_eq!(texts.len(), 2);
        let first = texts[0];
        assert_eq!(doc.attr(first, "x"), Some("50"));
        assert_eq!(doc.attr(first, "y"), Some("20"));
        assert_eq!(doc.attr(first, "text-anchor"), Some("middle"));
        assert_eq!(doc.attr(first, "dominant-baseline"), Some("central"));
        assert_eq!(doc.attr(first, "font-size"), Some("14"));
        assert_eq!(doc.attr(first, "fill"), Some("rgb(51, 51, 51)"));
        assert_eq!(doc.text_content(first), "Start Process");
        let label_group = doc.parent(first).unwrap();
        assert_eq!(doc.attr(label_group, "transform"), Some("translate(10, 20)"));

        let second = texts[1];
        assert_eq!(doc.attr(second, "y"), Some("70"));
        let spans: Vec<NodeId> = doc.element_children(second).collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(doc.attr(spans[0], "dy"), Some("-0.6em"));
        assert_eq!(doc.attr(spans[1], "dy"), Some("1.2em"));
        assert_eq!(doc.text_content(second), "Two\nlines");
    }

    #[test]
    fn test_raster_svg_keeps_labels_for_usvg() {
        let doc = Document::parse(LABELS).unwrap();
        let before = doc.to_svg_string();
        let svg = raster_svg(&doc, (200.0, 100.0));
        assert_eq!(doc.to_svg_string(), before);
        assert!(!svg.contains("foreignObject"));
        assert!(svg.contains("Start Process"));

        let mut options = usvg::Options::default();
        options.fontdb_mut().load_system_fonts();
        let has_fonts = !options.fontdb.is_empty();
        let tree = usvg::Tree::from_str(&svg, &options).unwrap();
        fn count_text(group: &usvg::Group) -> usize {
            group
                .children()
                .iter()
                .map(|node| match node {
                    usvg::Node::Text(_) => 1,
                    usvg::Node::Group(g) => count_text(g),
                    _ => 0,
                })
                .sum()
        }
        // Text that no installed font can shape is dropped by usvg.
        if has_fonts {
            assert_eq!(count_text(tree.root()), 2);
        }
    }

    #[test]
    fn test_transparent_background_survives_png_only() {
        let doc = Document::parse(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"/>"#).unwrap();
        let pixmap = rasterize(&doc, (10.0, 10.0), Color::TRANSPARENT).unwrap();
        assert_eq!(pixmap.pixel(0, 0).unwrap().alpha(), 0);
        let png = encode_png(&pixmap).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
