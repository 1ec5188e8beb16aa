//! Camera Rig
//!
//! Smooth dolly moves and short shakes on the scene camera. Requests only
//! record intent; `update` applies them once per frame. The camera is
//! translated together with its look-at target, so a dolly never turns it.
//!
//! Shake is an offset layered on the un-shaken position: each frame the
//! previous jitter is taken back out before a new one is applied, so the
//! camera cannot drift.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::rasterizer::{Camera, Vec3};

pub const DEFAULT_DOLLY_SECONDS: f32 = 0.8;

#[derive(Debug, Clone, Copy)]
struct Dolly {
    /// Filled in from the camera on the first update after the request
    from: Option<Vec3>,
    to: Vec3,
    duration: f32,
    elapsed: f32,
}

pub struct CameraRig {
    dolly: Option<Dolly>,
    shake_remaining: f32,
    shake_intensity: f32,
    /// Jitter currently applied on top of the base position
    offset: Vec3,
    rng: StdRng,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraRig {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            dolly: None,
            shake_remaining: 0.0,
            shake_intensity: 0.0,
            offset: Vec3::ZERO,
            rng,
        }
    }

    /// Move to `target` over `duration` seconds, starting from wherever the
    /// camera is at the next update. Replaces any dolly in progress.
    pub fn dolly_to(&mut self, target: Vec3, duration: f32) {
        self.dolly = Some(Dolly {
            from: None,
            to: target,
            duration,
            elapsed: 0.0,
        });
    }

    /// Jitter for `time` seconds. A new shake replaces the old one.
    pub fn shake(&mut self, intensity: f32, time: f32) {
        self.shake_intensity = intensity;
        self.shake_remaining = time;
    }

    pub fn is_dollying(&self) -> bool {
        self.dolly.is_some()
    }

    pub fn is_shaking(&self) -> bool {
        self.shake_remaining > 0.0
    }

    /// Current jitter offset
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Drop any move and shake; the camera keeps its un-shaken position
    pub fn reset(&mut self, camera: &mut Camera) {
        let base = camera.position - self.offset;
        self.offset = Vec3::ZERO;
        self.dolly = None;
        self.shake_remaining = 0.0;
        move_camera(camera, base);
    }

    pub fn update(&mut self, dt: f32, camera: &mut Camera) {
        let mut base = camera.position - self.offset;

        if let Some(d) = self.dolly.as_mut() {
            let from = *d.from.get_or_insert(base);
            d.elapsed += dt;
            let k = if d.duration > 0.0 { (d.elapsed / d.duration).min(1.0) } else { 1.0 };
            base = from.lerp(d.to, k);
            if k >= 1.0 {
                self.dolly = None;
            }
        }

        self.offset = if self.shake_remaining > 0.0 {
            self.shake_remaining -= dt;
            let i = self.shake_intensity;
            Vec3::new((self.rng.gen::<f32>() - 0.5) * i, (self.rng.gen::<f32>() - 0.5) * i, 0.0)
        } else {
            Vec3::ZERO
        };

        move_camera(camera, base + self.offset);
    }
}

/// Translate camera and target together
fn move_camera(camera: &mut Camera, position: Vec3) {
    let delta = position - camera.position;
    camera.target += delta;
    camera.set_position(position);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(50.0, 1.0, Vec3::new(0.0, 2.0, 5.0), Vec3::new(0.0, 1.0, 0.0))
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    #[test]
    fn test_dolly_reaches_target() {
        let mut cam = camera();
        let mut rig = CameraRig::with_seed(1);
        rig.dolly_to(Vec3::new(0.0, 2.0, 3.0), 1.0);
        rig.update(0.5, &mut cam);
        assert!(close(cam.position, Vec3::new(0.0, 2.0, 4.0)));
        rig.update(0.6, &mut cam);
        assert!(close(cam.position, Vec3::new(0.0, 2.0, 3.0)));
        assert!(!rig.is_dollying());
        // Orientation kept
        assert!(close(cam.target, Vec3::new(0.0, 1.0, -2.0)));
    }

    #[test]
    fn test_new_dolly_starts_from_current_position() {
        let mut cam = camera();
        let mut rig = CameraRig::with_seed(2);
        rig.dolly_to(Vec3::new(0.0, 2.0, 1.0), 1.0);
        rig.update(0.5, &mut cam);
        let mid = cam.position;

        rig.dolly_to(Vec3::new(4.0, 2.0, 3.0), 1.0);
        rig.update(0.0, &mut cam);
        assert!(close(cam.position, mid));
        rig.update(0.5, &mut cam);
        assert!(close(cam.position, mid.lerp(Vec3::new(4.0, 2.0, 3.0), 0.5)));
    }

    #[test]
    fn test_shake_is_bounded_and_settles() {
        let mut cam = camera();
        let start = cam.position;
        let mut rig = CameraRig::with_seed(3);
        rig.shake(0.1, 0.4);
        for _ in 0..10 {
            rig.update(0.016, &mut cam);
            let d = cam.position - start;
            assert!(d.x.abs() <= 0.05 && d.y.abs() <= 0.05 && d.z == 0.0);
        }
        rig.update(1.0, &mut cam);
        rig.update(0.016, &mut cam);
        assert!(close(cam.position, start));
        assert!(!rig.is_shaking());
    }

    #[test]
    fn test_shake_restarts_instead_of_stacking() {
        let mut rig = CameraRig::with_seed(4);
        rig.shake(0.05, 0.5);
        rig.shake(0.02, 0.3);
        assert_eq!(rig.shake_intensity, 0.02);
        assert_eq!(rig.shake_remaining, 0.3);
    }
}
