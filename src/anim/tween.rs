//! Property tweens
//!
//! A tween drives one transform property of one target from a start value
//! to an end value over a duration, with easing, repeats and yoyo. Values
//! are written onto a `Model` every `update`. Handles carry a `Completion`
//! that resolves when the tween plays out and is cancelled when killed.

use crate::rasterizer::Vec3;
use crate::scene::{Model, Property};
use crate::task::Completion;

use super::clip::Target;
use super::ease::Ease;

/// Repeat forever
pub const REPEAT_FOREVER: i32 = -1;

#[derive(Debug, Clone)]
pub struct Tween {
    pub target: Target,
    pub property: Property,
    pub from: Vec3,
    pub to: Vec3,
    pub duration: f32,
    pub ease: Ease,
    /// Extra plays after the first; -1 = forever
    pub repeat: i32,
    /// Every other play runs backwards
    pub yoyo: bool,
}

impl Tween {
    pub fn new(target: Target, property: Property, from: Vec3, to: Vec3, duration: f32) -> Self {
        Self {
            target,
            property,
            from,
            to,
            duration,
            ease: Ease::Linear,
            repeat: 0,
            yoyo: false,
        }
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    pub fn repeat(mut self, repeat: i32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    fn value_at(&self, iteration: i32, progress: f32) -> Vec3 {
        let reversed = self.yoyo && iteration % 2 == 1;
        let p = if reversed { 1.0 - progress } else { progress };
        self.from.lerp(self.to, self.ease.apply(p))
    }

    fn final_value(&self) -> Vec3 {
        if self.yoyo && self.repeat % 2 == 1 {
            self.from
        } else {
            self.to
        }
    }
}

/// Handle to a running tween
#[derive(Debug, Clone)]
pub struct TweenHandle {
    id: u64,
    done: Completion,
}

impl TweenHandle {
    pub fn completion(&self) -> &Completion {
        &self.done
    }

    pub fn is_finished(&self) -> bool {
        !self.done.is_pending()
    }
}

struct Running {
    id: u64,
    tween: Tween,
    elapsed: f32,
    iteration: i32,
    done: Completion,
}

/// Set of running tweens
#[derive(Default)]
pub struct TweenManager {
    running: Vec<Running>,
    next_id: u64,
}

impl TweenManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tween: Tween) -> TweenHandle {
        let id = self.next_id;
        self.next_id += 1;
        let done = Completion::new();
        self.running.push(Running {
            id,
            tween,
            elapsed: 0.0,
            iteration: 0,
            done: done.clone(),
        });
        TweenHandle { id, done }
    }

    /// Stop one tween where it is. Returns false if it already ended.
    pub fn kill(&mut self, handle: &TweenHandle) -> bool {
        let Some(pos) = self.running.iter().position(|r| r.id == handle.id) else {
            return false;
        };
        let r = self.running.remove(pos);
        r.done.cancel();
        true
    }

    /// Stop every tween on one target property
    pub fn kill_property(&mut self, target: &Target, property: Property) {
        self.running.retain(|r| {
            let hit = &r.tween.target == target && r.tween.property == property;
            if hit {
                r.done.cancel();
            }
            !hit
        });
    }

    pub fn kill_all(&mut self) {
        for r in self.running.drain(..) {
            r.done.cancel();
        }
    }

    pub fn is_active(&self, handle: &TweenHandle) -> bool {
        self.running.iter().any(|r| r.id == handle.id)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Advance every tween and write the values onto `model`
    pub fn update(&mut self, dt: f32, model: &mut Model) {
        for r in self.running.iter_mut() {
            r.elapsed += dt;
            let t = &r.tween;

            let value = if t.duration <= 0.0 {
                r.iteration = t.repeat.max(0) + 1;
                t.final_value()
            } else {
                while r.elapsed >= t.duration && (t.repeat < 0 || r.iteration <= t.repeat) {
                    r.elapsed -= t.duration;
                    r.iteration += 1;
                }
                if t.repeat >= 0 && r.iteration > t.repeat {
                    t.final_value()
                } else {
                    t.value_at(r.iteration, r.elapsed / t.duration)
                }
            };

            apply(model, &t.target, t.property, value);
        }

        self.running.retain(|r| {
            let finished = r.tween.repeat >= 0 && r.iteration > r.tween.repeat;
            if finished {
                r.done.resolve();
            }
            !finished
        });
    }
}

/// Write one property onto a model; unknown parts are ignored
pub fn apply(model: &mut Model, target: &Target, property: Property, value: Vec3) {
    match target {
        Target::Root => model.transform.set(property, value),
        Target::Part(name) => {
            if let Some(part) = model.part_mut(name) {
                part.transform.set(property, value);
            }
        }
    }
}

/// Read one property from a model
pub fn read(model: &Model, target: &Target, property: Property) -> Option<Vec3> {
    match target {
        Target::Root => Some(model.transform.get(property)),
        Target::Part(name) => model.part(name).map(|p| p.transform.get(property)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageId;
    use crate::scene::{Mesh, MeshPart};
    use crate::rasterizer::Material;

    fn model() -> Model {
        let mut m = Model::new("m", StageId::from("baby"));
        m.parts.push(MeshPart::new("tail", Mesh::default(), Material::default()));
        m
    }

    fn tail_y(m: &Model) -> f32 {
        m.part("tail").map(|p| p.transform.rotation.y).unwrap_or(f32::NAN)
    }

    #[test]
    fn test_single_play_ends_at_target() {
        let mut m = model();
        let mut tweens = TweenManager::new();
        let h = tweens.add(Tween::new(Target::part("tail"), Property::Rotation, Vec3::ZERO, Vec3::new(0.0, 0.5, 0.0), 0.4));

        tweens.update(0.2, &mut m);
        assert!((tail_y(&m) - 0.25).abs() < 1e-4);
        tweens.update(0.3, &mut m);
        assert!((tail_y(&m) - 0.5).abs() < 1e-4);
        assert!(h.completion().is_done());
        assert!(tweens.is_empty());
    }

    #[test]
    fn test_yoyo_odd_repeat_returns_to_start() {
        let mut m = model();
        let mut tweens = TweenManager::new();
        let h = tweens.add(
            Tween::new(Target::part("tail"), Property::Rotation, Vec3::ZERO, Vec3::new(0.0, 0.5, 0.0), 0.4)
                .repeat(3)
                .yoyo(true)
                .ease(Ease::SineInOut),
        );

        tweens.update(0.6, &mut m); // second play, running backwards
        assert!(tail_y(&m) > 0.0 && tail_y(&m) < 0.5);
        tweens.update(1.2, &mut m);
        assert!(tail_y(&m).abs() < 1e-4);
        assert!(h.is_finished());
    }

    #[test]
    fn test_forever_never_completes() {
        let mut m = model();
        let mut tweens = TweenManager::new();
        let h = tweens.add(
            Tween::new(Target::part("tail"), Property::Scale, Vec3::ONE, Vec3::new(1.0, 1.05, 1.0), 1.5)
                .repeat(REPEAT_FOREVER)
                .yoyo(true),
        );
        for _ in 0..100 {
            tweens.update(0.1, &mut m);
        }
        assert!(tweens.is_active(&h));
        assert!(tweens.kill(&h));
        assert!(!h.completion().is_done());
        assert!(h.is_finished());
    }

    #[test]
    fn test_kill_all_cancels() {
        let mut tweens = TweenManager::new();
        let a = tweens.add(Tween::new(Target::Root, Property::Position, Vec3::ZERO, Vec3::ONE, 1.0));
        let b = tweens.add(Tween::new(Target::Root, Property::Scale, Vec3::ZERO, Vec3::ONE, 1.0));
        tweens.kill_property(&Target::Root, Property::Scale);
        assert!(tweens.is_active(&a));
        assert!(!tweens.is_active(&b));
        tweens.kill_all();
        assert!(tweens.is_empty());
    }
}
