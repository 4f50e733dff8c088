//! m2anim - Animated, interactive, exportable Mermaid diagrams
//!
//! This library takes the SVG a Mermaid layout engine produced and turns it
//! into a live graphic: elements are classified into nodes, edges, labels and
//! markers, themed, wired for click and hover, and animated with a light that
//! travels each edge in turn. The live graphic can be exported to standalone
//! SVG, PNG or JPEG.
//!
//! # Example
//!
//! ```rust
//! use m2anim::{DiagramInstance, InstanceOptions, RenderError};
//!
//! let engine = |_source: &str| -> Result<String, RenderError> {
//!     Ok(r#"<svg xmlns="http://www.w3.org/2000/svg">
//!         <g class="edgePaths"><path class="flowchart-link" d="M0,0L0,100"/></g>
//!     </svg>"#.to_string())
//! };
//! let mut diagram = DiagramInstance::new(engine, InstanceOptions::default());
//! diagram.render("graph TD\n  A --> B", 0.0).unwrap();
//! diagram.tick(1000.0);
//! let svg = diagram.document().unwrap().to_svg_string();
//! assert!(svg.contains("flow-particle"));
//! ```
//!
//! # Supported Diagram Types
//!
//! Edges are recognized for flowcharts, sequence, class and state diagrams;
//! anything else falls back to "every path outside nodes and markers".

pub mod animation;
pub mod augment;
pub mod classify;
pub mod dom;
pub mod engine;
pub mod error;
pub mod export;
pub mod instance;
pub mod interact;
pub mod label;
pub mod theme;
pub mod types;

pub use animation::{FrameRequest, ParticleLoop};
pub use classify::{Classification, Classifier};
pub use dom::{Document, NodeId};
pub use engine::{KrokiEngine, LayoutEngine, RenderConfig};
pub use error::{ConfigError, DomError, ExportError, FetchError, RenderError};
pub use export::{ExportFormat, Exporter, StyleSheet};
pub use instance::{DiagramInstance, InstanceOptions};
pub use interact::{EventHandlers, PointerEvent};
pub use theme::ThemeOverride;
pub use types::*;

/// Decorate already-rendered SVG and return it with particles placed as they
/// would be `at_ms` milliseconds into the loop.
///
/// # Example
/// ```rust
/// let svg = m2anim::enhance_svg(
///     r#"<svg xmlns="http://www.w3.org/2000/svg"><path class="flowchart-link" d="M0,0L50,0"/></svg>"#,
///     &m2anim::InstanceOptions::default(),
///     1000.0,
/// )
/// .unwrap();
/// assert!(svg.contains("diagram-edge"));
/// ```
pub fn enhance_svg(svg: &str, options: &InstanceOptions, at_ms: f64) -> Result<String, RenderError> {
    let no_layout = |_: &str| -> Result<String, RenderError> {
        Err(RenderError::Layout("no layout engine".to_string()))
    };
    let mut diagram = DiagramInstance::new(no_layout, options.clone());
    diagram.load_svg(svg, &ImageMapping::new(), 0.0)?;
    diagram.tick(at_ms);
    Ok(diagram
        .document()
        .map(Document::to_svg_string)
        .unwrap_or_default())
}
