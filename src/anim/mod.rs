//! Animation
//!
//! - `ease`: easing curves
//! - `tween`: property tweens on named parts
//! - `clip`: keyframed clips
//! - `mixer`: weighted, cross-fading clip playback
//! - `controller`: logical names, moods, placeholder motions

mod clip;
mod controller;
mod ease;
mod mixer;
mod tween;

pub use clip::{AnimationClip, Keyframe, Target, Track};
pub use controller::{AnimationController, PlayOutcome};
pub use ease::Ease;
pub use mixer::{ActionId, LoopMode, Mixer};
pub use tween::{apply as apply_property, read as read_property, Tween, TweenHandle, TweenManager, REPEAT_FOREVER};
