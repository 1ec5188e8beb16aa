//! Animation clips
//!
//! A clip is a set of tracks; each track moves one transform property of
//! one target (a named part, or the model root) through time-sorted
//! keyframes. Sampling interpolates linearly between the surrounding pair
//! and holds the first/last value outside the keyed range.

use serde::{Deserialize, Serialize};

use crate::rasterizer::Vec3;
use crate::scene::Property;

/// What a track or tween moves
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Root,
    Part(String),
}

impl Target {
    pub fn part(name: &str) -> Self {
        Target::Part(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: Vec3,
}

impl Keyframe {
    pub fn new(time: f32, value: Vec3) -> Self {
        Self { time, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub target: Target,
    pub property: Property,
    pub keyframes: Vec<Keyframe>,
}

impl Track {
    pub fn new(target: Target, property: Property, mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { target, property, keyframes }
    }

    /// Value at `time`, None if the track has no keys
    pub fn sample(&self, time: f32) -> Option<Vec3> {
        let first = self.keyframes.first()?;
        if time <= first.time {
            return Some(first.value);
        }
        for pair in self.keyframes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if time <= b.time {
                let span = b.time - a.time;
                let t = if span > 0.0 { (time - a.time) / span } else { 1.0 };
                return Some(a.value.lerp(b.value, t));
            }
        }
        self.keyframes.last().map(|k| k.value)
    }

    pub fn end_time(&self) -> f32 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }
}

/// Named animation clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds; 0 means "derive from the last keyframe"
    #[serde(default)]
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let mut clip = Self {
            name: name.into(),
            duration: 0.0,
            tracks,
        };
        clip.duration = clip.effective_duration();
        clip
    }

    pub fn effective_duration(&self) -> f32 {
        if self.duration > 0.0 {
            self.duration
        } else {
            self.tracks.iter().map(Track::end_time).fold(0.0, f32::max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wag() -> Track {
        Track::new(
            Target::part("tail"),
            Property::Rotation,
            vec![
                Keyframe::new(1.0, Vec3::new(0.0, 0.5, 0.0)),
                Keyframe::new(0.0, Vec3::ZERO),
                Keyframe::new(2.0, Vec3::ZERO),
            ],
        )
    }

    #[test]
    fn test_keyframes_are_sorted() {
        let track = wag();
        assert_eq!(track.keyframes[0].time, 0.0);
        assert_eq!(track.end_time(), 2.0);
    }

    #[test]
    fn test_sample_interpolates_and_holds() {
        let track = wag();
        let mid = track.sample(0.5).expect("value");
        assert!((mid.y - 0.25).abs() < 1e-5);
        assert_eq!(track.sample(-1.0), Some(Vec3::ZERO));
        assert_eq!(track.sample(5.0), Some(Vec3::ZERO));
    }

    #[test]
    fn test_clip_duration_from_tracks() {
        let clip = AnimationClip::new("tail_wag", vec![wag()]);
        assert_eq!(clip.duration, 2.0);
        let empty = Track::new(Target::Root, Property::Scale, Vec::new());
        assert_eq!(empty.sample(0.0), None);
    }
}
