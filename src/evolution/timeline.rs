//! Evolution Timeline
//!
//! PRE → GLOWING → FADING_OUT → SWAPPING → FADING_IN → CELEBRATING → DONE
//!
//! - Pre: rim-lit white glow on every part of the outgoing model
//! - Glowing: one frame so the glow is shown before the fade
//! - FadingOut: opacity 1 → 0; on the last frame the camera dolly and
//!   shake start (not waited on) and the next stage starts loading
//! - Swapping: polls the load, then puts the new model where the old one
//!   stood and reports `Step::Swapped`
//! - FadingIn: opacity 0 → 1 on the new model
//! - Celebrating: one particle burst above the new model
//!
//! The next stage is loaded with `LoadPolicy::Strict`, so a broken asset
//! comes back as an error instead of a placeholder. The caller then
//! `restore`s the outgoing model and falls back to the legacy sequence.

use std::fmt;

use tracing::debug;

use crate::config::{EvolutionConfig, StageId};
use crate::error::{CompanionError, CompanionResult};
use crate::rasterizer::{Color, Material, RimLight};
use crate::resource::{LoadPolicy, PendingModel, ResourceLoader};
use crate::scene::NodeId;

use super::{live_model, progress, swap_models, EvolutionEffects, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelinePhase {
    Pre,
    Glowing,
    FadingOut,
    Swapping,
    FadingIn,
    Celebrating,
    Done,
}

impl fmt::Display for TimelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimelinePhase::Pre => "pre",
            TimelinePhase::Glowing => "glowing",
            TimelinePhase::FadingOut => "fading-out",
            TimelinePhase::Swapping => "swapping",
            TimelinePhase::FadingIn => "fading-in",
            TimelinePhase::Celebrating => "celebrating",
            TimelinePhase::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct EvolutionTimeline {
    config: EvolutionConfig,
    phase: TimelinePhase,
    outgoing: NodeId,
    incoming: Option<NodeId>,
    next_stage: StageId,
    pending: Option<PendingModel>,
    /// Outgoing materials from before the glow, for `restore`
    saved: Vec<Material>,
    elapsed: f32,
}

impl EvolutionTimeline {
    pub fn new(outgoing: NodeId, next_stage: StageId, config: EvolutionConfig) -> Self {
        Self {
            config,
            phase: TimelinePhase::Pre,
            outgoing,
            incoming: None,
            next_stage,
            pending: None,
            saved: Vec::new(),
            elapsed: 0.0,
        }
    }

    pub fn phase(&self) -> TimelinePhase {
        self.phase
    }

    pub fn next_stage(&self) -> &StageId {
        &self.next_stage
    }

    fn enter(&mut self, phase: TimelinePhase) {
        debug!(phase = %phase, stage = %self.next_stage, "evolution timeline");
        self.phase = phase;
        self.elapsed = 0.0;
    }

    /// Advance by `dt`. An error means the sequence cannot go on.
    pub fn tick(
        &mut self,
        dt: f32,
        fx: &mut EvolutionEffects<'_>,
        loader: &mut ResourceLoader,
    ) -> CompanionResult<Step> {
        match self.phase {
            TimelinePhase::Pre => {
                let model = live_model(fx.scene, self.outgoing)?;
                self.saved = model.parts.iter().map(|p| p.material.clone()).collect();
                let rim = RimLight {
                    color: self.config.glow_rim_color,
                    strength: self.config.glow_rim_strength,
                    ..RimLight::default()
                };
                for part in &mut model.parts {
                    part.material.color = Color::WHITE;
                    part.material.rim = Some(rim);
                }
                self.enter(TimelinePhase::Glowing);
            }

            TimelinePhase::Glowing => {
                live_model(fx.scene, self.outgoing)?.set_opacity(1.0);
                self.enter(TimelinePhase::FadingOut);
            }

            TimelinePhase::FadingOut => {
                self.elapsed += dt;
                let k = progress(self.elapsed, self.config.fade_out);
                let model = live_model(fx.scene, self.outgoing)?;
                model.set_opacity(1.0 - k);
                if k >= 1.0 {
                    let focus = model.transform.position + self.config.dolly_offset;
                    fx.rig.dolly_to(focus, self.config.dolly_duration);
                    fx.rig.shake(self.config.shake_intensity, self.config.shake_duration);
                    self.pending = Some(loader.begin_load(&self.next_stage, LoadPolicy::Strict));
                    self.enter(TimelinePhase::Swapping);
                }
            }

            TimelinePhase::Swapping => {
                let Some(pending) = self.pending.as_mut() else {
                    return Err(CompanionError::sequence("no load in flight"));
                };
                let Some(result) = loader.poll(pending) else {
                    return Ok(Step::Running);
                };
                self.pending = None;

                let mut model = result?;
                model.set_opacity(0.0);
                let clips = model.clips.clone();
                let node = swap_models(fx.scene, self.outgoing, model)?;
                self.incoming = Some(node);
                self.enter(TimelinePhase::FadingIn);
                return Ok(Step::Swapped { node, clips });
            }

            TimelinePhase::FadingIn => {
                self.elapsed += dt;
                let k = progress(self.elapsed, self.config.fade_in);
                live_model(fx.scene, self.incoming()?)?.set_opacity(k);
                if k >= 1.0 {
                    self.enter(TimelinePhase::Celebrating);
                }
            }

            TimelinePhase::Celebrating => {
                let node = self.incoming()?;
                let at = live_model(fx.scene, node)?.transform.position + self.config.burst_offset;
                fx.particles.burst(at, self.config.burst_color);
                self.enter(TimelinePhase::Done);
                return Ok(Step::Finished(node));
            }

            TimelinePhase::Done => return Ok(Step::Finished(self.incoming()?)),
        }
        Ok(Step::Running)
    }

    fn incoming(&self) -> CompanionResult<NodeId> {
        self.incoming.ok_or_else(|| CompanionError::sequence("no incoming model"))
    }

    /// Undo the glow and fade on the outgoing model, if it is still shown.
    /// Returns false if there was nothing to restore.
    pub fn restore(&mut self, fx: &mut EvolutionEffects<'_>) -> bool {
        if self.incoming.is_some() {
            return false;
        }
        let Some(model) = fx.scene.graph.model_mut(self.outgoing) else {
            return false;
        };
        for (part, material) in model.parts.iter_mut().zip(self.saved.drain(..)) {
            part.material = material;
        }
        model.set_opacity(1.0);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_rig::CameraRig;
    use crate::config::CompanionConfig;
    use crate::effects::ParticlePool;
    use crate::rasterizer::Vec3;
    use crate::scene::SceneContext;
    use std::fs;

    struct Harness {
        scene: SceneContext,
        camera_rig: CameraRig,
        particles: ParticlePool,
        loader: ResourceLoader,
        config: CompanionConfig,
    }

    impl Harness {
        fn new(config: CompanionConfig) -> (Self, NodeId) {
            let mut scene = SceneContext::new(&config.scene, 4.0 / 3.0);
            let mut particles = ParticlePool::with_seed(64, 1);
            particles.attach_to(&mut scene.graph);
            let mut loader = ResourceLoader::new(&config);
            let mut model = loader.load_model(&StageId::from("baby")).expect("baby");
            model.transform.position = Vec3::new(0.5, 0.0, -0.25);
            let id = scene.graph.insert_model(model);
            scene.companion = Some(id);
            let harness = Self {
                scene,
                camera_rig: CameraRig::with_seed(1),
                particles,
                loader,
                config,
            };
            (harness, id)
        }

        fn tick(&mut self, timeline: &mut EvolutionTimeline) -> CompanionResult<Step> {
            let mut fx = EvolutionEffects {
                scene: &mut self.scene,
                rig: &mut self.camera_rig,
                particles: &mut self.particles,
            };
            timeline.tick(0.05, &mut fx, &mut self.loader)
        }
    }

    fn run(h: &mut Harness, timeline: &mut EvolutionTimeline) -> CompanionResult<Vec<Step>> {
        let mut steps = Vec::new();
        for _ in 0..2000 {
            let step = h.tick(timeline)?;
            let done = matches!(step, Step::Finished(_));
            if step != Step::Running {
                steps.push(step);
            }
            if done {
                return Ok(steps);
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        panic!("timeline never finished");
    }

    #[test]
    fn test_timeline_swaps_in_place() {
        let (mut h, baby) = Harness::new(CompanionConfig::default());
        let mut timeline = EvolutionTimeline::new(baby, StageId::from("teen"), h.config.evolution.clone());

        let steps = run(&mut h, &mut timeline).expect("timeline");
        assert_eq!(timeline.phase(), TimelinePhase::Done);
        assert_eq!(steps.len(), 2);
        let Step::Finished(teen) = steps[1] else {
            panic!("last step should finish");
        };
        assert!(matches!(&steps[0], Step::Swapped { node, .. } if *node == teen));

        assert!(!h.scene.graph.contains(baby));
        assert_eq!(h.scene.companion, Some(teen));
        let model = h.scene.graph.model(teen).expect("teen");
        assert_eq!(model.stage, StageId::from("teen"));
        assert_eq!(model.transform.position, Vec3::new(0.5, 0.0, -0.25));
        assert_eq!(model.opacity(), 1.0);
        assert!(h.particles.alive_count() >= 10);
        assert!(h.camera_rig.is_dollying() && h.camera_rig.is_shaking());
    }

    #[test]
    fn test_glow_then_fade_out() {
        let (mut h, baby) = Harness::new(CompanionConfig::default());
        let mut timeline = EvolutionTimeline::new(baby, StageId::from("teen"), h.config.evolution.clone());

        h.tick(&mut timeline).expect("pre");
        let model = h.scene.graph.model(baby).expect("baby");
        assert!(model.parts.iter().all(|p| p.material.color == Color::WHITE));
        assert!(model.parts.iter().all(|p| p.material.rim.map(|r| r.color) == Some(Color::from_hex(0x88b7ff))));

        h.tick(&mut timeline).expect("glowing");
        h.tick(&mut timeline).expect("fading");
        assert_eq!(timeline.phase(), TimelinePhase::FadingOut);
        let opacity = h.scene.graph.model(baby).map(|m| m.opacity()).unwrap_or(0.0);
        assert!((opacity - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_broken_asset_fails_and_restores() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("models")).expect("mkdir");
        fs::write(dir.path().join("models/companion_teen.ron"), "(parts: [oops").expect("write");
        let mut config = CompanionConfig::default();
        config.asset_root = dir.path().to_path_buf();

        let (mut h, baby) = Harness::new(config);
        let before = h.scene.graph.model(baby).cloned().expect("baby");
        let mut timeline = EvolutionTimeline::new(baby, StageId::from("teen"), h.config.evolution.clone());

        assert!(run(&mut h, &mut timeline).is_err());
        assert_eq!(timeline.phase(), TimelinePhase::Swapping);

        let mut fx = EvolutionEffects {
            scene: &mut h.scene,
            rig: &mut h.camera_rig,
            particles: &mut h.particles,
        };
        assert!(timeline.restore(&mut fx));
        assert_eq!(h.scene.graph.model(baby), Some(&before));
    }

    #[test]
    fn test_removed_model_fails_the_sequence() {
        let (mut h, baby) = Harness::new(CompanionConfig::default());
        let mut timeline = EvolutionTimeline::new(baby, StageId::from("teen"), h.config.evolution.clone());
        h.tick(&mut timeline).expect("pre");
        h.scene.graph.remove(baby);
        assert!(matches!(h.tick(&mut timeline), Err(CompanionError::SequenceFailure(_))));
    }
}
