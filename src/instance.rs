//! One live diagram: render, decorate, animate, interact, export.
//!
//! Each successful render runs the full decoration sequence in a fixed order:
//!
//! 1. strip actor image tokens from the source
//! 2. layout (external engine) and parse
//! 3. classify, including arrowhead marker repair
//! 4. attach actor images
//! 5. theme, then base decoration styles
//! 6. wire interaction listeners
//! 7. start the particle loop
//!
//! The previous graphic's loop and listeners are torn down only once the new
//! graphic is ready, so a failed render leaves the old diagram fully working.

use crate::animation::{FrameRequest, ParticleLoop};
use crate::augment::{attach_actor_images, extract_actor_images};
use crate::classify::{Classification, Classifier};
use crate::dom::Document;
use crate::engine::LayoutEngine;
use crate::error::{ExportError, RenderError};
use crate::export::{ExportFormat, Exporter};
use crate::interact::{EventHandlers, Listeners, PointerEvent};
use crate::theme::{apply_base_decorations, apply_theme, ThemeOverride};
use crate::types::ImageMapping;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Caller options for a diagram instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeOverride>,
    /// No particle loop.
    pub disable_particles: bool,
    /// No particle loop and no edge flow animation.
    pub disable_animations: bool,
}

impl InstanceOptions {
    fn particles_wanted(&self) -> bool {
        !self.disable_particles && !self.disable_animations
    }
}

#[derive(Debug)]
struct LiveDiagram {
    doc: Document,
    classification: Classification,
    listeners: Listeners,
    particles: Option<ParticleLoop>,
}

impl LiveDiagram {
    fn stop_particles(&mut self) {
        if let Some(mut particles) = self.particles.take() {
            particles.stop(&mut self.doc);
        }
    }

    fn teardown(&mut self) {
        self.stop_particles();
        self.listeners.clear(&mut self.doc);
    }
}

pub struct DiagramInstance<E: LayoutEngine> {
    engine: E,
    options: InstanceOptions,
    classifier: Classifier,
    handlers: EventHandlers,
    live: Option<LiveDiagram>,
}

impl<E: LayoutEngine> DiagramInstance<E> {
    pub fn new(engine: E, options: InstanceOptions) -> Self {
        Self {
            engine,
            options,
            classifier: Classifier::new(),
            handlers: EventHandlers::new(),
            live: None,
        }
    }

    /// Handlers take effect from the next render.
    pub fn with_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn options(&self) -> &InstanceOptions {
        &self.options
    }

    /// Render diagram source and make it the live graphic.
    ///
    /// On error the previous graphic, its particle loop and its listeners
    /// stay in place.
    pub fn render(&mut self, source: &str, now: f64) -> Result<&Document, RenderError> {
        let prepared = extract_actor_images(source);
        let svg = self.engine.render(&prepared.source)?;
        let doc = Document::parse(&svg)?;
        Ok(self.install(doc, &prepared.images, now))
    }

    /// Make already-rendered SVG the live graphic, skipping layout.
    pub fn load_svg(&mut self, svg: &str, images: &ImageMapping, now: f64) -> Result<&Document, RenderError> {
        let doc = Document::parse(svg)?;
        Ok(self.install(doc, images, now))
    }

    fn install(&mut self, mut doc: Document, images: &ImageMapping, now: f64) -> &Document {
        if let Some(mut previous) = self.live.take() {
            previous.teardown();
        }

        let classification = self.classifier.classify(&mut doc);
        let attached = attach_actor_images(&mut doc, images);
        apply_theme(&mut doc, self.options.theme.as_ref());
        apply_base_decorations(&mut doc, &classification.edges, !self.options.disable_animations);
        let listeners = Listeners::wire(&mut doc, &classification, &self.handlers);
        let particles = self
            .options
            .particles_wanted()
            .then(|| ParticleLoop::install(&mut doc, &classification.edges, now));

        info!(
            family = %classification.edge_family,
            edges = classification.edges.len(),
            actor_images = attached,
            particles = particles.is_some(),
            "diagram ready"
        );

        let live = self.live.insert(LiveDiagram {
            doc,
            classification,
            listeners,
            particles,
        });
        &live.doc
    }

    pub fn document(&self) -> Option<&Document> {
        self.live.as_ref().map(|l| &l.doc)
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.live.as_ref().map(|l| &l.classification)
    }

    pub fn particles(&self) -> Option<&ParticleLoop> {
        self.live.as_ref().and_then(|l| l.particles.as_ref())
    }

    /// Frame callback from the host's refresh scheduler.
    pub fn tick(&mut self, now: f64) -> FrameRequest {
        let Some(live) = self.live.as_mut() else {
            return FrameRequest::Stop;
        };
        match live.particles.as_mut() {
            Some(particles) => particles.tick(&mut live.doc, now),
            None => FrameRequest::Stop,
        }
    }

    /// Replace the theme override. Previous theme rules are superseded.
    pub fn set_theme(&mut self, theme: Option<ThemeOverride>) {
        self.options.theme = theme;
        if let Some(live) = self.live.as_mut() {
            apply_theme(&mut live.doc, self.options.theme.as_ref());
        }
    }

    pub fn set_particles_enabled(&mut self, enabled: bool, now: f64) {
        self.options.disable_particles = !enabled;
        self.sync_particles(now);
    }

    /// Disabling stops the particle loop and the edge flow animation.
    /// Classification classes stay.
    pub fn set_animations_enabled(&mut self, enabled: bool, now: f64) {
        self.options.disable_animations = !enabled;
        if let Some(live) = self.live.as_mut() {
            apply_base_decorations(&mut live.doc, &live.classification.edges, enabled);
        }
        self.sync_particles(now);
    }

    fn sync_particles(&mut self, now: f64) {
        let wanted = self.options.particles_wanted();
        let Some(live) = self.live.as_mut() else {
            return;
        };
        match (wanted, live.particles.is_some()) {
            (false, true) => {
                live.stop_particles();
                debug!("particle loop stopped");
            }
            (true, false) => {
                live.particles = Some(ParticleLoop::install(&mut live.doc, &live.classification.edges, now));
            }
            _ => {}
        }
    }

    /// Deliver a pointer event from the host. Returns whether a handler ran.
    pub fn dispatch(&mut self, event: PointerEvent) -> bool {
        let Some(live) = self.live.as_ref() else {
            return false;
        };
        live.listeners
            .dispatch(&live.doc, &live.classification, &mut self.handlers, event)
    }

    /// Stop the loop, detach listeners and drop the graphic.
    pub fn teardown(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.teardown();
            debug!("diagram torn down");
        }
    }

    fn live_doc(&self) -> Result<&Document, ExportError> {
        self.document().ok_or(ExportError::NothingRendered)
    }

    pub fn export_bytes(&self, exporter: &Exporter, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        exporter.bytes(self.live_doc()?, format)
    }

    pub fn export_svg(&self, exporter: &Exporter, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        exporter.export_svg(self.live_doc()?, path)
    }

    pub fn export_png(&self, exporter: &Exporter, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        exporter.export_png(self.live_doc()?, path)
    }

    pub fn export_jpg(&self, exporter: &Exporter, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        exporter.export_jpg(self.live_doc()?, path)
    }
}
