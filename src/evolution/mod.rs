//! Evolution
//!
//! - `timeline` - glow, fade out, swap, fade in, celebrate (primary path)
//! - `legacy` - in-place scale/fade sequence, used when the timeline fails
//! - `controller` - current stage, stage checks, the `is_evolving` guard
//!
//! Both sequences are state machines ticked once per frame. A tick never
//! blocks: loads run in the background and are polled, fades advance by
//! the frame delta, so the scene keeps rendering in between.

pub mod controller;
pub mod legacy;
pub mod timeline;

pub use controller::{stage_transition, EvolutionController, EvolutionOutcome, EvolutionPath, EvolutionReady};
pub use legacy::{LegacyPhase, LegacySequence};
pub use timeline::{EvolutionTimeline, TimelinePhase};

use crate::anim::AnimationClip;
use crate::camera_rig::CameraRig;
use crate::effects::ParticlePool;
use crate::error::{CompanionError, CompanionResult};
use crate::scene::{Model, NodeId, SceneContext};

/// What a sequence tick produced
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Running,
    /// The incoming model replaced the outgoing one; rebind animation to it
    Swapped { node: NodeId, clips: Vec<AnimationClip> },
    /// Sequence over; `node` is the model now on screen
    Finished(NodeId),
}

/// Scene and effect handles a sequence drives
pub struct EvolutionEffects<'a> {
    pub scene: &'a mut SceneContext,
    pub rig: &'a mut CameraRig,
    pub particles: &'a mut ParticlePool,
}

/// The model behind `id`, or a sequence failure if it left the scene
pub(crate) fn live_model(scene: &mut SceneContext, id: NodeId) -> CompanionResult<&mut Model> {
    scene
        .graph
        .model_mut(id)
        .ok_or_else(|| CompanionError::sequence("model left the scene mid-sequence"))
}

/// Fraction of `duration` covered by `elapsed`, clamped to 1
pub(crate) fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).min(1.0)
    }
}

/// Put `incoming` in place of `outgoing`: same position and heading,
/// and it becomes the scene's companion
pub(crate) fn swap_models(scene: &mut SceneContext, outgoing: NodeId, mut incoming: Model) -> CompanionResult<NodeId> {
    let old = live_model(scene, outgoing)?;
    incoming.transform.position = old.transform.position;
    incoming.transform.rotation = old.transform.rotation;
    scene.graph.remove(outgoing);
    let node = scene.graph.insert_model(incoming);
    scene.companion = Some(node);
    Ok(node)
}
