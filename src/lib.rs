//! companion3d: a real-time 3D view of a virtual companion
//!
//! A low-poly creature rendered by a small software rasterizer, animated by
//! mood and action clips, reacting to clicks, and evolving between stages
//! with a glow / fade / swap / celebrate sequence.
//!
//! # Module Organization
//!
//! - `rasterizer` - framebuffer, camera, shading, rays
//! - `scene` - scene graph, frame loop, render surfaces
//! - `resource` - model loading, caching, placeholders
//! - `anim` - clips, mixer, tweens, the animation controller
//! - `effects` - particles, ambient field, floating icons, sound cues
//! - `camera_rig` - dolly and shake on top of the scene camera
//! - `interaction` - hover and click picking
//! - `evolution` - stage checks and the evolution sequences
//! - `companion` - the manager tying everything to one view

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod anim;
pub mod camera_rig;
pub mod companion;
pub mod config;
pub mod effects;
pub mod error;
pub mod event;
pub mod evolution;
pub mod interaction;
pub mod rasterizer;
pub mod resource;
pub mod scene;
pub mod task;

pub use companion::{CompanionManager, CompanionSnapshot};
pub use config::{CompanionConfig, Level, StageId};
pub use error::{CompanionError, CompanionResult};
pub use event::CompanionEvent;
pub use scene::{HeadlessSurface, RenderSurface};
