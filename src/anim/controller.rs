//! Animation Controller
//!
//! Drives the companion's animation on top of the mixer and tween engine:
//! - logical names ("idle", "tailWag") resolve through the clip name table
//! - names without a clip fall back to placeholder motions on named parts
//! - each mood has an animation set; a cancellable idle-variation timer
//!   plays a random entry from it every few seconds
//! - one-shot actions return a `Completion` and fall back to the mood idle
//!
//! The controller never holds the model. The frame loop passes it to
//! `update`, so swapping models is just calling `setup` with the new one.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{AnimationConfig, DEFAULT_MOOD};
use crate::rasterizer::Vec3;
use crate::scene::node::part_names::{BODY, LEFT_EAR, RIGHT_EAR, TAIL};
use crate::scene::{Model, Property};
use crate::task::{Completion, ScheduledTask};

use super::clip::{AnimationClip, Target};
use super::ease::Ease;
use super::mixer::{ActionId, LoopMode, Mixer};
use super::tween::{self, Tween, TweenHandle, TweenManager, REPEAT_FOREVER};

/// What `play_clip` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Clip(ActionId),
    /// No clip; `true` if a placeholder motion was started
    Placeholder(bool),
}

enum Waiting {
    Clip(ActionId),
    Timer(ScheduledTask),
}

struct PendingAction {
    waiting: Waiting,
    done: Completion,
}

struct QueuedAction {
    name: String,
    /// Resolved when this entry finishes (last entry of a batch)
    batch: Option<Completion>,
}

pub struct AnimationController {
    config: AnimationConfig,
    mixer: Mixer,
    tweens: TweenManager,
    clips: HashMap<String, AnimationClip>,
    /// Pose of the placeholder hooks at setup time
    rest: HashMap<(Target, Property), Vec3>,
    bound: bool,
    current: Option<ActionId>,
    mood: Option<String>,
    idle_timer: ScheduledTask,
    breathing: Option<TweenHandle>,
    pending: Vec<PendingAction>,
    queue: VecDeque<QueuedAction>,
    queue_current: Option<(Completion, Option<Completion>)>,
    rng: StdRng,
}

impl AnimationController {
    pub fn new(config: AnimationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic idle variation, for tests
    pub fn with_seed(config: AnimationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: AnimationConfig, rng: StdRng) -> Self {
        Self {
            config,
            mixer: Mixer::new(),
            tweens: TweenManager::new(),
            clips: HashMap::new(),
            rest: HashMap::new(),
            bound: false,
            current: None,
            mood: None,
            idle_timer: ScheduledTask::idle(),
            breathing: None,
            pending: Vec::new(),
            queue: VecDeque::new(),
            queue_current: None,
            rng,
        }
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Bind to a (new) model. Prior clips, actions and tweens are dropped;
    /// the mood and its idle timer carry over.
    pub fn setup(&mut self, model: &Model, clips: &[AnimationClip]) {
        self.tweens.kill_all();
        self.breathing = None;
        self.mixer.unbind();
        self.current = None;
        self.cancel_pending();
        self.clips = clips.iter().map(|c| (c.name.clone(), c.clone())).collect();

        self.rest.clear();
        for name in [BODY, LEFT_EAR, RIGHT_EAR, TAIL] {
            let target = Target::part(name);
            for property in [Property::Position, Property::Rotation, Property::Scale] {
                if let Some(value) = tween::read(model, &target, property) {
                    self.rest.insert((target.clone(), property), value);
                }
            }
        }
        self.bound = true;

        if self.clips.is_empty() {
            self.start_breathing();
            debug!(model = %model.name, "placeholder motions enabled");
        } else {
            debug!(model = %model.name, clips = self.clips.len(), "clips loaded");
        }

        let fade = self.config.crossfade;
        self.play_clip("idle", true, fade);
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    fn rest_of(&self, part: &str, property: Property) -> Option<(Target, Vec3)> {
        let target = Target::part(part);
        self.rest.get(&(target.clone(), property)).map(|v| (target, *v))
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Cross-fade to a clip by logical name. Names without a clip try a
    /// placeholder motion instead; neither case is an error.
    pub fn play_clip(&mut self, name: &str, looping: bool, fade: f32) -> PlayOutcome {
        let clip_name = self.config.clip_name(name).unwrap_or(name).to_string();
        let Some(clip) = self.clips.get(&clip_name).cloned() else {
            return PlayOutcome::Placeholder(self.play_placeholder(name));
        };

        let mode = if looping { LoopMode::Repeat } else { LoopMode::Once };
        let id = self.mixer.play(clip, mode, fade);
        self.mixer.fade_out_others(id, fade);
        self.current = Some(id);
        debug!(name, clip = %clip_name, "playing clip");
        PlayOutcome::Clip(id)
    }

    fn play_placeholder(&mut self, name: &str) -> bool {
        if !self.bound {
            return false;
        }
        match name {
            "earTwitch" => {
                let (Some(left), Some(right)) =
                    (self.rest_of(LEFT_EAR, Property::Rotation), self.rest_of(RIGHT_EAR, Property::Rotation))
                else {
                    return false;
                };
                for ((target, rest), dir) in [(left, 1.0), (right, -1.0)] {
                    self.tweens.kill_property(&target, Property::Rotation);
                    let to = rest + Vec3::new(0.0, 0.0, 0.3 * dir);
                    self.tweens
                        .add(Tween::new(target, Property::Rotation, rest, to, 0.2).repeat(1).yoyo(true));
                }
                true
            }
            "tailWag" => {
                let Some((target, rest)) = self.rest_of(TAIL, Property::Rotation) else {
                    return false;
                };
                self.tweens.kill_property(&target, Property::Rotation);
                let to = rest + Vec3::new(0.0, 0.5, 0.0);
                self.tweens.add(
                    Tween::new(target, Property::Rotation, rest, to, 0.4)
                        .repeat(3)
                        .yoyo(true)
                        .ease(Ease::SineInOut),
                );
                true
            }
            "play" => {
                let Some((target, rest)) = self.rest_of(BODY, Property::Position) else {
                    return false;
                };
                self.tweens.kill_property(&target, Property::Position);
                let to = rest + Vec3::new(0.0, 0.3, 0.0);
                self.tweens.add(
                    Tween::new(target, Property::Position, rest, to, 0.3)
                        .repeat(5)
                        .yoyo(true)
                        .ease(Ease::Power1InOut),
                );
                true
            }
            _ => false,
        }
    }

    fn start_breathing(&mut self) {
        let Some((target, rest)) = self.rest_of(BODY, Property::Scale) else {
            return;
        };
        let to = Vec3::new(rest.x, rest.y * 1.05, rest.z);
        self.breathing = Some(
            self.tweens.add(
                Tween::new(target, Property::Scale, rest, to, 1.5)
                    .repeat(REPEAT_FOREVER)
                    .yoyo(true)
                    .ease(Ease::SineInOut),
            ),
        );
    }

    fn mood_idle(&self) -> Option<String> {
        let mood = self.mood.as_deref().unwrap_or(DEFAULT_MOOD);
        self.config.mood_set(mood).first().cloned()
    }

    fn return_to_idle(&mut self) {
        if let Some(idle) = self.mood_idle() {
            let fade = self.config.crossfade;
            self.play_clip(&idle, true, fade);
        }
    }

    // =========================================================================
    // Mood
    // =========================================================================

    /// Switch mood. Setting the current mood again changes nothing.
    pub fn set_mood(&mut self, mood: &str) -> bool {
        if self.mood.as_deref() == Some(mood) {
            return false;
        }
        self.mood = Some(mood.to_string());
        debug!(mood, "mood changed");

        self.return_to_idle();
        self.schedule_idle_variation();
        true
    }

    pub fn mood(&self) -> Option<&str> {
        self.mood.as_deref()
    }

    fn schedule_idle_variation(&mut self) {
        let (min, max) = (self.config.idle_delay_min, self.config.idle_delay_max);
        let delay = if max > min { self.rng.gen_range(min..max) } else { min };
        self.idle_timer.schedule(delay);
    }

    pub fn idle_timer_active(&self) -> bool {
        self.idle_timer.is_active()
    }

    /// Seconds until the next idle variation, if one is scheduled
    pub fn idle_timer_remaining(&self) -> Option<f32> {
        self.idle_timer.is_active().then(|| self.idle_timer.remaining())
    }

    // =========================================================================
    // One-shot actions
    // =========================================================================

    /// Play a clip once; the completion resolves when it ends (or after the
    /// placeholder delay when there is no clip), then the mood idle resumes.
    pub fn play_action(&mut self, name: &str) -> Completion {
        let done = Completion::new();
        if !self.bound {
            done.resolve();
            return done;
        }

        let clip_name = self.config.clip_name(name).unwrap_or(name).to_string();
        let waiting = match self.clips.get(&clip_name).cloned() {
            Some(clip) => {
                let fade = self.config.action_fade;
                let id = self.mixer.play(clip, LoopMode::Once, fade);
                self.mixer.fade_out_others(id, fade);
                self.current = Some(id);
                Waiting::Clip(id)
            }
            None => {
                self.play_placeholder(name);
                Waiting::Timer(ScheduledTask::new(self.config.placeholder_action_delay))
            }
        };
        debug!(name, "action started");

        self.pending.push(PendingAction { waiting, done: done.clone() });
        done
    }

    /// Run actions one after another. The completion resolves after the last.
    pub fn queue_actions<S: AsRef<str>>(&mut self, names: &[S]) -> Completion {
        let batch = Completion::new();
        if names.is_empty() {
            batch.resolve();
            return batch;
        }
        let last = names.len() - 1;
        for (i, name) in names.iter().enumerate() {
            self.queue.push_back(QueuedAction {
                name: name.as_ref().to_string(),
                batch: (i == last).then(|| batch.clone()),
            });
        }
        self.advance_queue();
        batch
    }

    fn advance_queue(&mut self) {
        if let Some((current, _)) = &self.queue_current {
            if current.is_pending() {
                return;
            }
        }
        if let Some((_, Some(batch))) = self.queue_current.take() {
            batch.resolve();
        }
        if let Some(next) = self.queue.pop_front() {
            let done = self.play_action(&next.name);
            self.queue_current = Some((done, next.batch));
        }
    }

    pub fn pending_actions(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_actions(&self) -> usize {
        self.queue.len() + usize::from(self.queue_current.is_some())
    }

    // =========================================================================
    // Frame update
    // =========================================================================

    /// Advance timers, mixer and tweens and pose `model`
    pub fn update(&mut self, dt: f32, model: &mut Model) {
        if !self.bound {
            return;
        }

        let finished = self.mixer.update(dt, model);
        self.tweens.update(dt, model);

        let mut back_to_idle = false;
        let mixer = &self.mixer;
        self.pending.retain_mut(|p| {
            let over = match &mut p.waiting {
                Waiting::Clip(id) => finished.contains(id) || !mixer.is_active(*id),
                Waiting::Timer(t) => t.tick(dt),
            };
            if over {
                p.done.resolve();
                back_to_idle = true;
            }
            !over
        });
        if back_to_idle {
            self.return_to_idle();
        }

        // Actions started from here on wait from the next frame
        if self.idle_timer.tick(dt) {
            let set = self.config.mood_set(self.mood.as_deref().unwrap_or(DEFAULT_MOOD)).to_vec();
            if !set.is_empty() {
                let pick = set[self.rng.gen_range(0..set.len())].clone();
                debug!(animation = %pick, "idle variation");
                self.play_action(&pick);
            }
            self.schedule_idle_variation();
        }

        self.advance_queue();
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    fn cancel_pending(&mut self) {
        for p in self.pending.drain(..) {
            p.done.cancel();
        }
        for q in self.queue.drain(..) {
            if let Some(batch) = q.batch {
                batch.cancel();
            }
        }
        if let Some((current, batch)) = self.queue_current.take() {
            current.cancel();
            if let Some(batch) = batch {
                batch.cancel();
            }
        }
    }

    /// Cancel the idle timer, every tween and every action
    pub fn stop_all(&mut self) {
        self.idle_timer.cancel();
        self.tweens.kill_all();
        self.breathing = None;
        self.mixer.stop_all();
        self.current = None;
        self.cancel_pending();
    }

    /// `stop_all`, then forget the model and its clips
    pub fn dispose(&mut self) {
        self.stop_all();
        self.mixer.unbind();
        self.clips.clear();
        self.rest.clear();
        self.mood = None;
        self.bound = false;
    }

    pub fn tween_count(&self) -> usize {
        self.tweens.len()
    }

    pub fn has_clip(&self, name: &str) -> bool {
        let clip_name = self.config.clip_name(name).unwrap_or(name);
        self.clips.contains_key(clip_name)
    }

    pub fn is_playing(&self, name: &str) -> bool {
        let clip_name = self.config.clip_name(name).unwrap_or(name);
        self.mixer.is_playing(clip_name)
    }
}
