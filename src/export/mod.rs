//! Export pipeline: standalone SVG, PNG and JPEG files from a live graphic.
//!
//! Every export works on an inlined clone; the live graphic is never touched.

mod fetch;
mod inline;
mod raster;

pub use fetch::{data_uri, is_remote, reencode_png, FetchChain, HttpFetcher, ImageFetcher, TRANSPARENT_PIXEL_URI};
pub use inline::{collect_rules, embed_rules, inline_clone, inline_images, StyleSheet, EXPORT_STYLE_CLASS};
pub use raster::{
    encode_jpeg, encode_png, flatten_foreign_objects, graphic_size, parse_color, raster_svg, rasterize, PADDING,
    SUPERSAMPLE,
};

use crate::dom::Document;
use crate::engine::{ExportConfig, RenderConfig, DEFAULT_BACKGROUND};
use crate::error::ExportError;
use resvg::tiny_skia::Color;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Svg,
    Png,
    Jpg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }

    /// File name used when the caller does not give one.
    pub fn default_file_name(self) -> String {
        format!("diagram.{}", self.extension())
    }
}

/// Export settings plus the page context the graphic lives in.
pub struct Exporter {
    styles: Vec<StyleSheet>,
    fetch: FetchChain,
    background: String,
    jpeg_quality: u8,
}

impl Exporter {
    pub fn new(config: &ExportConfig, fetch: FetchChain) -> Self {
        Self {
            styles: Vec::new(),
            fetch,
            background: config.background.clone(),
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Exporter fetching images over HTTP, with the decode-and-re-encode
    /// fallback on a second request.
    pub fn from_config(config: &RenderConfig) -> Self {
        let fetch = FetchChain::new(HttpFetcher::new(config.timeout()))
            .with_secondary(HttpFetcher::new(config.timeout()));
        Self::new(&config.export, fetch)
    }

    pub fn with_styles(mut self, styles: Vec<StyleSheet>) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    /// A self-contained copy of the graphic.
    pub fn inline(&self, live: &Document) -> Document {
        inline_clone(live, &self.styles, &self.fetch)
    }

    pub fn svg_bytes(&self, live: &Document) -> Result<Vec<u8>, ExportError> {
        let copy = self.inline(live);
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&copy.to_svg_string());
        Ok(out.into_bytes())
    }

    /// PNG or JPEG bytes. JPEG always gets a white background.
    pub fn raster_bytes(&self, live: &Document, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        let size = graphic_size(live).ok_or(ExportError::EmptyGraphic)?;
        let background = match format {
            ExportFormat::Jpg => Color::WHITE,
            _ => parse_color(&self.background).unwrap_or_else(|| {
                warn!(background = %self.background, "unrecognized background color, using {}", DEFAULT_BACKGROUND);
                Color::WHITE
            }),
        };
        let pixmap = rasterize(&self.inline(live), size, background)?;
        match format {
            ExportFormat::Jpg => encode_jpeg(&pixmap, self.jpeg_quality),
            _ => encode_png(&pixmap),
        }
    }

    pub fn bytes(&self, live: &Document, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        match format {
            ExportFormat::Svg => self.svg_bytes(live),
            raster => self.raster_bytes(live, raster),
        }
    }

    /// Write the export to `path`, or to the format's default file name.
    pub fn export(&self, live: &Document, format: ExportFormat, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        let path = path.map_or_else(|| PathBuf::from(format.default_file_name()), Path::to_path_buf);
        let bytes = self.bytes(live, format)?;
        std::fs::write(&path, &bytes).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "exported diagram");
        Ok(path)
    }

    pub fn export_svg(&self, live: &Document, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        self.export(live, ExportFormat::Svg, path)
    }

    pub fn export_png(&self, live: &Document, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        self.export(live, ExportFormat::Png, path)
    }

    pub fn export_jpg(&self, live: &Document, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        self.export(live, ExportFormat::Jpg, path)
    }
}
