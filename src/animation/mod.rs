//! Particle animation: a sequential scheduler and a frame driver.
//!
//! One light travels one edge at a time, in edge order, then the loop repeats.

mod driver;
mod schedule;

pub use driver::{
    ease_in_out_cubic, particle_opacity, sample, FrameRequest, ParticleLoop, ParticleRadius,
    ParticleRecord, ParticleState, FADE_FRACTION,
};
pub use schedule::{
    duration_for_length, schedule, ParticleWindow, Timeline, MAX_DURATION_MS, MIN_DURATION_MS,
    MS_PER_LENGTH,
};
