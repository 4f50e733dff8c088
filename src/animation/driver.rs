//! Per-frame particle driver.
//!
//! Position and opacity are a pure function of the frame timestamp, so frames
//! can be skipped, repeated or replayed at any rate. [`ParticleLoop`] only
//! writes the sampled state into the graphic.

use super::schedule::{schedule, ParticleWindow, Timeline};
use crate::classify::PARTICLE_CLASS;
use crate::dom::{local_transform, Document, NodeId, PathGeometry, Point, Transform};
use tracing::debug;

/// Fraction of a window spent fading in, and again fading out.
pub const FADE_FRACTION: f64 = 0.15;

/// Particle layer radii (px)
pub struct ParticleRadius;

impl ParticleRadius {
    pub const CORE: f64 = 3.0;
    pub const GLOW: f64 = 6.0;
    pub const OUTER_GLOW: f64 = 10.0;
}

/// The outer glow is drawn fainter than the particle it follows.
const OUTER_GLOW_OPACITY: f64 = 0.45;

/// Cubic ease-in-out over `[0, 1]`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Trapezoid fade: ramps up over the first [`FADE_FRACTION`], holds, then
/// ramps down over the last [`FADE_FRACTION`].
pub fn particle_opacity(progress: f64) -> f64 {
    if progress <= 0.0 || progress >= 1.0 {
        0.0
    } else if progress < FADE_FRACTION {
        progress / FADE_FRACTION
    } else if progress <= 1.0 - FADE_FRACTION {
        1.0
    } else {
        (1.0 - progress) / FADE_FRACTION
    }
}

/// What one particle looks like at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticleState {
    Hidden,
    Visible { position: Point, opacity: f64 },
}

/// Sample a particle at loop position `elapsed`.
///
/// Easing shapes the position only; opacity follows raw progress.
pub fn sample(timeline: &Timeline, index: usize, elapsed: f64, path: &PathGeometry) -> ParticleState {
    let Some(progress) = timeline.progress(index, elapsed) else {
        return ParticleState::Hidden;
    };
    let eased = ease_in_out_cubic(progress);
    match path.point_at(eased * path.length()) {
        Some(position) => ParticleState::Visible {
            position,
            opacity: particle_opacity(progress),
        },
        None => ParticleState::Hidden,
    }
}

/// Whether the host should schedule another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    Continue,
    Stop,
}

/// One edge's particle.
#[derive(Debug, Clone)]
pub struct ParticleRecord {
    /// Moving element
    pub core: NodeId,
    /// Glow companion, mirrors the core every frame
    pub glow: NodeId,
    /// The edge being travelled
    pub edge: NodeId,
    pub geometry: PathGeometry,
    pub length: f64,
    pub window: ParticleWindow,
    /// Edge-local to layer coordinates
    to_layer: Transform,
    /// Group holding this particle's layers
    layer: NodeId,
}

/// Outer glow tracked on its own, sharing a record's path and window.
#[derive(Debug, Clone)]
struct OuterGlow {
    element: NodeId,
    record: usize,
}

/// The running particle animation of one graphic.
#[derive(Debug)]
pub struct ParticleLoop {
    document: u64,
    timeline: Timeline,
    records: Vec<ParticleRecord>,
    outer: Vec<OuterGlow>,
    running: bool,
}

impl ParticleLoop {
    /// Insert particle layers for every edge and schedule them from `now`.
    pub fn install(doc: &mut Document, edges: &[NodeId], now: f64) -> Self {
        let mut records = Vec::with_capacity(edges.len());
        let mut outer = Vec::with_capacity(edges.len());

        for edge in edges {
            let Some(parent) = doc.parent(*edge) else {
                continue;
            };
            let geometry = PathGeometry::from_element(doc, *edge).unwrap_or_default();
            let length = geometry.length();

            let layer = doc.create_element("g");
            doc.set_attr(layer, "class", format!("{}-layer", PARTICLE_CLASS));
            doc.append_child(parent, layer);

            let outer_glow = particle_circle(doc, layer, "outer", ParticleRadius::OUTER_GLOW);
            let glow = particle_circle(doc, layer, "glow", ParticleRadius::GLOW);
            let core = particle_circle(doc, layer, "", ParticleRadius::CORE);

            outer.push(OuterGlow {
                element: outer_glow,
                record: records.len(),
            });
            records.push(ParticleRecord {
                core,
                glow,
                edge: *edge,
                geometry,
                length,
                window: ParticleWindow {
                    start: now,
                    duration: 0.0,
                },
                to_layer: local_transform(doc, *edge),
                layer,
            });
        }

        let lengths: Vec<f64> = records.iter().map(|r| r.length).collect();
        let timeline = schedule(&lengths, now);
        for (record, window) in records.iter_mut().zip(&timeline.windows) {
            record.window = *window;
        }

        debug!(
            particles = records.len(),
            loop_ms = timeline.total,
            "particle loop installed"
        );

        Self {
            document: doc.instance_id(),
            timeline,
            records,
            outer,
            running: true,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn records(&self) -> &[ParticleRecord] {
        &self.records
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The frame callback. Writes every particle's state for time `now`.
    ///
    /// A loop bound to another document stops itself without touching `doc`.
    pub fn tick(&mut self, doc: &mut Document, now: f64) -> FrameRequest {
        if !self.running {
            return FrameRequest::Stop;
        }
        if doc.instance_id() != self.document {
            self.running = false;
            return FrameRequest::Stop;
        }
        let Some(elapsed) = self.timeline.elapsed(now) else {
            return FrameRequest::Continue;
        };

        let mut states = Vec::with_capacity(self.records.len());
        for (index, record) in self.records.iter().enumerate() {
            // Edge removed under us: skip this particle for this frame.
            if !doc.is_attached(record.edge) || !doc.is_attached(record.core) {
                states.push(None);
                continue;
            }
            let state = sample(&self.timeline, index, elapsed, &record.geometry);
            write_state(doc, record.core, state, &record.to_layer, 1.0);
            write_state(doc, record.glow, state, &record.to_layer, 1.0);
            states.push(Some(state));
        }

        for glow in &self.outer {
            if let Some(Some(state)) = states.get(glow.record) {
                let to_layer = &self.records[glow.record].to_layer;
                write_state(doc, glow.element, *state, to_layer, OUTER_GLOW_OPACITY);
            }
        }
        FrameRequest::Continue
    }

    /// Stop scheduling and remove the particle layers. Later ticks are no-ops.
    pub fn stop(&mut self, doc: &mut Document) {
        self.running = false;
        if doc.instance_id() == self.document {
            for record in &self.records {
                doc.detach(record.layer);
            }
        }
        self.records.clear();
        self.outer.clear();
    }
}

fn particle_circle(doc: &mut Document, layer: NodeId, suffix: &str, radius: f64) -> NodeId {
    let circle = doc.create_element("circle");
    let class = if suffix.is_empty() {
        PARTICLE_CLASS.to_string()
    } else {
        format!("{}-{}", PARTICLE_CLASS, suffix)
    };
    doc.set_attr(circle, "class", class);
    doc.set_attr(circle, "r", radius.to_string());
    doc.set_attr(circle, "cx", "0");
    doc.set_attr(circle, "cy", "0");
    doc.set_attr(circle, "opacity", "0");
    doc.append_child(layer, circle);
    circle
}

fn write_state(doc: &mut Document, element: NodeId, state: ParticleState, to_layer: &Transform, scale: f64) {
    match state {
        ParticleState::Hidden => doc.set_attr(element, "opacity", "0"),
        ParticleState::Visible { position, opacity } => {
            let p = to_layer.apply(position);
            doc.set_attr(element, "cx", format!("{:.2}", p.x));
            doc.set_attr(element, "cy", format!("{:.2}", p.y));
            doc.set_attr(element, "opacity", format!("{:.3}", opacity * scale));
        }
    }
}
