//! Error types shared across the pipeline.

use std::path::PathBuf;

/// Failure to parse or query the graphic tree.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("invalid SVG: {0}")]
    Parse(String),
    #[error("document has no <svg> root element")]
    MissingRoot,
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl From<roxmltree::Error> for DomError {
    fn from(e: roxmltree::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Failure to turn diagram source into a live graphic.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The layout engine rejected the source (malformed diagram syntax, HTTP error).
    #[error("layout engine error: {0}")]
    Layout(String),
    /// The layout engine returned something that is not usable SVG.
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Failure to retrieve an external resource during export.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Http { url: String, reason: String },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode image from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Failure of a single export attempt. The live diagram is never affected.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no diagram has been rendered")]
    NothingRendered,
    #[error("diagram has an empty bounding box")]
    EmptyGraphic,
    #[error("could not allocate a {width}x{height} drawing surface")]
    Surface { width: u32, height: u32 },
    #[error("could not rasterize SVG: {0}")]
    Rasterize(String),
    #[error("could not encode {format}: {reason}")]
    Encode { format: &'static str, reason: String },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
