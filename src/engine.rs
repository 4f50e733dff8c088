//! Layout engine adapters and render configuration.
//!
//! Diagram layout itself happens outside this crate. A [`LayoutEngine`] turns
//! diagram source into SVG text; everything after that is ours.

use crate::error::{ConfigError, RenderError};
use crate::theme::ThemeOverride;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Default Kroki server
pub const DEFAULT_SERVER_URL: &str = "https://kroki.io";
/// Default request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default JPEG quality (1-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
/// Default background of non-JPEG raster exports
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Turns diagram source into rendered SVG text.
pub trait LayoutEngine {
    fn render(&self, source: &str) -> Result<String, RenderError>;
}

impl<F> LayoutEngine for F
where
    F: Fn(&str) -> Result<String, RenderError>,
{
    fn render(&self, source: &str) -> Result<String, RenderError> {
        self(source)
    }
}

/// Export defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    /// Background of PNG exports. JPEG always uses white.
    pub background: String,
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Caller-owned configuration: built once, shared by every render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub server_url: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeOverride>,
    pub export: ExportConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            theme: None,
            export: ExportConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Create an HTTP agent with the given timeout. HTTP error statuses are
/// returned as responses so their bodies can be reported.
pub fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Renders Mermaid source through a Kroki server.
#[derive(Debug, Clone)]
pub struct KrokiEngine {
    agent: Agent,
    server_url: String,
}

impl KrokiEngine {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            agent: create_agent(config.timeout()),
            server_url: config.server_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/mermaid/svg", self.server_url)
    }
}

impl LayoutEngine for KrokiEngine {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        let url = self.endpoint();
        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(source.as_bytes())
            .map_err(|e| RenderError::Layout(e.to_string()))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(RenderError::Layout(format!("HTTP {status}: {}", error_body.trim())));
        }

        let svg = body
            .read_to_string()
            .map_err(|e| RenderError::Layout(e.to_string()))?;
        debug!(url = %url, bytes = svg.len(), "layout engine responded");
        Ok(svg)
    }
}
