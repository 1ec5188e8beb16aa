//! Legacy evolution sequence
//!
//! The in-place version used when the timeline cannot run:
//! 1. Glow: scale pulse up to `glow_scale` and back (sine in-out)
//! 2. FadeOut: opacity to 0 (power2-in) while shrinking (back-in)
//! 3. Swap: load the next stage (degrading to a placeholder) and swap
//! 4. FadeIn: opacity to 1 (power2-out) while growing back (back-out)
//! 5. Celebrate: two bounces, the second lower
//!
//! Scale and height go through a `TweenManager` on the model root; the
//! animation controller only poses parts, so the two never fight.

use std::fmt;

use tracing::debug;

use crate::anim::{Ease, Target, Tween, TweenHandle, TweenManager};
use crate::config::{EvolutionConfig, StageId};
use crate::error::{CompanionError, CompanionResult};
use crate::rasterizer::Vec3;
use crate::resource::{LoadPolicy, PendingModel, ResourceLoader};
use crate::scene::{NodeId, Property};

use super::{live_model, progress, swap_models, EvolutionEffects, Step};

/// Height fraction and seconds of each celebration segment
const BOUNCES: [(f32, f32, Ease); 4] = [
    (1.0, 0.3, Ease::Power2Out),
    (0.0, 0.3, Ease::BounceOut),
    (0.6, 0.2, Ease::Power2Out),
    (0.0, 0.2, Ease::BounceOut),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyPhase {
    Glow,
    FadeOut,
    Swap,
    FadeIn,
    Celebrate,
    Done,
}

impl fmt::Display for LegacyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LegacyPhase::Glow => "glow",
            LegacyPhase::FadeOut => "fade-out",
            LegacyPhase::Swap => "swap",
            LegacyPhase::FadeIn => "fade-in",
            LegacyPhase::Celebrate => "celebrate",
            LegacyPhase::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct LegacySequence {
    config: EvolutionConfig,
    phase: LegacyPhase,
    /// Model being animated; the incoming one after the swap
    node: NodeId,
    next_stage: StageId,
    tweens: TweenManager,
    active: Option<TweenHandle>,
    pending: Option<PendingModel>,
    /// Next celebration segment
    bounce: usize,
    ground: Vec3,
    elapsed: f32,
    started: bool,
}

impl LegacySequence {
    pub fn new(node: NodeId, next_stage: StageId, config: EvolutionConfig) -> Self {
        Self {
            config,
            phase: LegacyPhase::Glow,
            node,
            next_stage,
            tweens: TweenManager::new(),
            active: None,
            pending: None,
            bounce: 0,
            ground: Vec3::ZERO,
            elapsed: 0.0,
            started: false,
        }
    }

    pub fn phase(&self) -> LegacyPhase {
        self.phase
    }

    pub fn next_stage(&self) -> &StageId {
        &self.next_stage
    }

    fn enter(&mut self, phase: LegacyPhase) {
        debug!(phase = %phase, stage = %self.next_stage, "legacy evolution");
        self.phase = phase;
        self.elapsed = 0.0;
        self.started = false;
        self.active = None;
    }

    fn run_tween(&mut self, tween: Tween) {
        self.active = Some(self.tweens.add(tween));
        self.started = true;
    }

    fn tween_done(&self) -> bool {
        self.active.as_ref().map_or(true, TweenHandle::is_finished)
    }

    pub fn tick(
        &mut self,
        dt: f32,
        fx: &mut EvolutionEffects<'_>,
        loader: &mut ResourceLoader,
    ) -> CompanionResult<Step> {
        let root = Target::Root;
        match self.phase {
            LegacyPhase::Glow => {
                if !self.started {
                    let half = self.config.glow_duration / 2.0;
                    let up = Vec3::splat(self.config.glow_scale);
                    self.run_tween(
                        Tween::new(root, Property::Scale, Vec3::ONE, up, half)
                            .ease(Ease::SineInOut)
                            .repeat(1)
                            .yoyo(true),
                    );
                }
                let model = live_model(fx.scene, self.node)?;
                self.tweens.update(dt, model);
                if self.tween_done() {
                    self.enter(LegacyPhase::FadeOut);
                }
            }

            LegacyPhase::FadeOut => {
                let model = live_model(fx.scene, self.node)?;
                if !self.started {
                    let from = model.transform.scale;
                    let to = Vec3::splat(self.config.shrink_scale);
                    let tween = Tween::new(root, Property::Scale, from, to, self.config.fade_duration).ease(Ease::BackIn);
                    self.run_tween(tween);
                }
                self.elapsed += dt;
                let k = progress(self.elapsed, self.config.fade_duration);
                model.set_opacity(1.0 - Ease::Power2In.apply(k));
                self.tweens.update(dt, model);
                if k >= 1.0 && self.tween_done() {
                    self.pending = Some(loader.begin_load(&self.next_stage, LoadPolicy::Degrade));
                    self.enter(LegacyPhase::Swap);
                }
            }

            LegacyPhase::Swap => {
                let Some(pending) = self.pending.as_mut() else {
                    return Err(CompanionError::sequence("no load in flight"));
                };
                let Some(result) = loader.poll(pending) else {
                    return Ok(Step::Running);
                };
                self.pending = None;

                let mut model = result?;
                model.set_opacity(0.0);
                model.transform.scale = Vec3::splat(self.config.shrink_scale);
                let clips = model.clips.clone();
                self.node = swap_models(fx.scene, self.node, model)?;
                self.enter(LegacyPhase::FadeIn);
                return Ok(Step::Swapped { node: self.node, clips });
            }

            LegacyPhase::FadeIn => {
                if !self.started {
                    let from = Vec3::splat(self.config.shrink_scale);
                    let tween = Tween::new(root, Property::Scale, from, Vec3::ONE, self.config.fade_duration).ease(Ease::BackOut);
                    self.run_tween(tween);
                }
                let model = live_model(fx.scene, self.node)?;
                self.elapsed += dt;
                let k = progress(self.elapsed, self.config.fade_duration);
                model.set_opacity(Ease::Power2Out.apply(k));
                self.tweens.update(dt, model);
                if k >= 1.0 && self.tween_done() {
                    model.set_opacity(1.0);
                    self.ground = model.transform.position;
                    self.bounce = 0;
                    self.enter(LegacyPhase::Celebrate);
                }
            }

            LegacyPhase::Celebrate => {
                let model = live_model(fx.scene, self.node)?;
                if self.tween_done() {
                    let Some(&(height, seconds, ease)) = BOUNCES.get(self.bounce) else {
                        model.transform.position = self.ground;
                        self.enter(LegacyPhase::Done);
                        return Ok(Step::Finished(self.node));
                    };
                    let from = model.transform.position;
                    let to = self.ground + Vec3::new(0.0, height * self.config.celebration_height, 0.0);
                    self.active = Some(self.tweens.add(Tween::new(root, Property::Position, from, to, seconds).ease(ease)));
                    self.bounce += 1;
                }
                self.tweens.update(dt, model);
            }

            LegacyPhase::Done => return Ok(Step::Finished(self.node)),
        }
        Ok(Step::Running)
    }
}
