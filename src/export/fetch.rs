//! External image retrieval for inlining.
//!
//! Fetching degrades in three steps: the primary fetcher's bytes as-is, then
//! the secondary fetcher's bytes decoded and re-encoded as PNG, then a
//! transparent placeholder pixel. Export never fails on an image.

use crate::engine::create_agent;
use crate::error::FetchError;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use std::io::Cursor;
use std::time::Duration;
use tracing::warn;
use ureq::Agent;

/// 1×1 fully transparent PNG, substituted when an image cannot be retrieved.
pub const TRANSPARENT_PIXEL_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAAC0lEQVR4nGNgAAIAAAUAAXpeqz8AAAAASUVORK5CYII=";

/// Retrieves the raw bytes behind an image locator.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError>,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self(url)
    }
}

/// Plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: create_agent(timeout),
        }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .agent
            .get(url)
            .header("Accept", "image/*")
            .call()
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        response
            .into_body()
            .read_to_vec()
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Whether a locator points at the network.
pub fn is_remote(locator: &str) -> bool {
    let lower = locator.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// MIME type sniffed from the bytes.
fn sniff_mime(bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    if head.contains("<svg") {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes))
}

/// Decode any supported raster format and re-encode it as PNG.
pub fn reencode_png(url: &str, bytes: &[u8]) -> Result<Vec<u8>, FetchError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(out.into_inner())
}

/// The ordered fallback chain used while inlining.
pub struct FetchChain {
    primary: Box<dyn ImageFetcher>,
    secondary: Option<Box<dyn ImageFetcher>>,
}

impl FetchChain {
    pub fn new(primary: impl ImageFetcher + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: impl ImageFetcher + 'static) -> Self {
        self.secondary = Some(Box::new(secondary));
        self
    }

    /// A `data:` URI for the locator. Always succeeds.
    pub fn resolve(&self, url: &str) -> String {
        match self.primary.fetch(url) {
            Ok(bytes) => return data_uri(sniff_mime(&bytes), &bytes),
            Err(e) => warn!(url = %url, error = %e, "image fetch failed"),
        }
        if let Some(secondary) = &self.secondary {
            match secondary.fetch(url).and_then(|bytes| reencode_png(url, &bytes)) {
                Ok(png) => return data_uri("image/png", &png),
                Err(e) => warn!(url = %url, error = %e, "image re-encode fallback failed"),
            }
        }
        warn!(url = %url, "substituting transparent placeholder");
        TRANSPARENT_PIXEL_URI.to_string()
    }
}
