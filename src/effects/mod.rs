//! Visual and audio feedback around the companion
//!
//! - `particles`: pooled one-shot bursts
//! - `ambient`: mood-tinted drifting field
//! - `floating_icon`: rising, fading action icons
//! - `cues`: named sound cues behind a host-supplied player

mod ambient;
mod cues;
mod floating_icon;
mod particles;

pub use ambient::{AmbientField, EVOLUTION_BURST_SECONDS};
pub use cues::{CuePlayer, SilentPlayer, SoundCues, DEFAULT_VOLUME};
pub use floating_icon::{FloatingIcons, Icon};
pub use particles::{Particle, ParticlePool, PARTICLE_SIZE};
