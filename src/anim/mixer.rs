//! Clip mixer
//!
//! Plays clips as weighted actions on one bound model. Each action has its
//! own time, weight and optional fade; every update the tracked properties
//! are set to the weight-blended sample of all actions, falling back toward
//! the rest pose while total weight is below one.

use std::collections::HashMap;

use crate::rasterizer::Vec3;
use crate::scene::{Model, Property};

use super::clip::{AnimationClip, Target};
use super::tween;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Wrap around at the end
    Repeat,
    /// Play once and hold the last frame
    Once,
}

/// Handle to a mixer action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
}

struct Action {
    id: ActionId,
    clip: AnimationClip,
    time: f32,
    weight: f32,
    fade: Option<Fade>,
    loop_mode: LoopMode,
    finished: bool,
}

impl Action {
    fn fade_to(&mut self, to: f32, duration: f32) {
        if duration <= 0.0 {
            self.weight = to;
            self.fade = None;
        } else {
            self.fade = Some(Fade {
                from: self.weight,
                to,
                duration,
                elapsed: 0.0,
            });
        }
    }

    fn fading_out(&self) -> bool {
        matches!(self.fade, Some(f) if f.to <= 0.0)
    }
}

#[derive(Default)]
pub struct Mixer {
    actions: Vec<Action>,
    /// Property values before any clip touched them
    rest: HashMap<(Target, Property), Vec3>,
    next_id: u64,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a clip, fading its weight in from zero
    pub fn play(&mut self, clip: AnimationClip, loop_mode: LoopMode, fade_in: f32) -> ActionId {
        let id = ActionId(self.next_id);
        self.next_id += 1;
        let mut action = Action {
            id,
            clip,
            time: 0.0,
            weight: 0.0,
            fade: None,
            loop_mode,
            finished: false,
        };
        action.fade_to(1.0, fade_in);
        self.actions.push(action);
        id
    }

    pub fn fade_out(&mut self, id: ActionId, duration: f32) {
        if let Some(a) = self.actions.iter_mut().find(|a| a.id == id) {
            a.fade_to(0.0, duration);
        }
    }

    /// Fade out everything except `keep`
    pub fn fade_out_others(&mut self, keep: ActionId, duration: f32) {
        for a in self.actions.iter_mut().filter(|a| a.id != keep && !a.fading_out()) {
            a.fade_to(0.0, duration);
        }
    }

    pub fn stop_all(&mut self) {
        self.actions.clear();
    }

    /// Forget the rest pose (the model is being replaced)
    pub fn unbind(&mut self) {
        self.actions.clear();
        self.rest.clear();
    }

    pub fn is_active(&self, id: ActionId) -> bool {
        self.actions.iter().any(|a| a.id == id)
    }

    pub fn is_playing(&self, clip_name: &str) -> bool {
        self.actions.iter().any(|a| a.clip.name == clip_name && !a.fading_out())
    }

    pub fn weight(&self, id: ActionId) -> Option<f32> {
        self.actions.iter().find(|a| a.id == id).map(|a| a.weight)
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Advance all actions, write the blended pose and return the one-shot
    /// actions that finished during this step.
    pub fn update(&mut self, dt: f32, model: &mut Model) -> Vec<ActionId> {
        let mut finished = Vec::new();

        for a in self.actions.iter_mut() {
            if let Some(mut f) = a.fade {
                f.elapsed += dt;
                let t = (f.elapsed / f.duration).min(1.0);
                a.weight = f.from + (f.to - f.from) * t;
                a.fade = if t >= 1.0 { None } else { Some(f) };
            }

            let duration = a.clip.effective_duration();
            if a.finished {
                continue;
            }
            a.time += dt;
            match a.loop_mode {
                LoopMode::Repeat => {
                    if duration > 0.0 {
                        a.time %= duration;
                    }
                }
                LoopMode::Once => {
                    if a.time >= duration {
                        a.time = duration;
                        a.finished = true;
                        finished.push(a.id);
                    }
                }
            }
        }

        // Fully faded out actions are dropped
        self.actions.retain(|a| !(a.weight <= 0.0 && a.fade.is_none()));

        self.write_pose(model);
        finished
    }

    fn write_pose(&mut self, model: &mut Model) {
        let mut blended: HashMap<(Target, Property), (Vec3, f32)> = HashMap::new();

        for a in &self.actions {
            if a.weight <= 0.0 {
                continue;
            }
            for track in &a.clip.tracks {
                let Some(value) = track.sample(a.time) else {
                    continue;
                };
                let key = (track.target.clone(), track.property);
                if !self.rest.contains_key(&key) {
                    if let Some(current) = tween::read(model, &track.target, track.property) {
                        self.rest.insert(key.clone(), current);
                    }
                }
                let entry = blended.entry(key).or_insert((Vec3::ZERO, 0.0));
                entry.0 += value * a.weight;
                entry.1 += a.weight;
            }
        }

        for ((target, property), rest) in &self.rest {
            let value = match blended.get(&(target.clone(), *property)) {
                Some((sum, w)) if *w >= 1.0 => *sum * (1.0 / *w),
                Some((sum, w)) if *w > 0.0 => rest.lerp(*sum * (1.0 / *w), *w),
                _ => *rest,
            };
            tween::apply(model, target, *property, value);
        }
    }
}
