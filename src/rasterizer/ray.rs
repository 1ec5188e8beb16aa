//! Ray casting utilities for 3D picking
//!
//! Inverse of the camera projection: turns a normalized device coordinate
//! (or a framebuffer pixel) back into a world-space ray.

use super::camera::Camera;
use super::math::Vec3;

/// A 3D ray with origin and direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3, // Normalized
}

impl Ray {
    /// Create a new ray, normalizing the direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Get point at distance t along ray
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Generate a ray from normalized device coordinates (-1..1, +y up).
pub fn ndc_to_ray(ndc_x: f32, ndc_y: f32, camera: &Camera) -> Ray {
    let tan = camera.tan_half_fov();
    let dir = camera.basis_x * (ndc_x * tan * camera.aspect)
        + camera.basis_y * (ndc_y * tan)
        + camera.basis_z;
    Ray::new(camera.position, dir)
}

/// Framebuffer pixel to normalized device coordinates
pub fn screen_to_ndc(screen_x: f32, screen_y: f32, width: usize, height: usize) -> (f32, f32) {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    ((screen_x / w) * 2.0 - 1.0, 1.0 - (screen_y / h) * 2.0)
}

/// Generate a ray from framebuffer coordinates through the camera.
pub fn screen_to_ray(
    screen_x: f32,
    screen_y: f32,
    screen_width: usize,
    screen_height: usize,
    camera: &Camera,
) -> Ray {
    let (nx, ny) = screen_to_ndc(screen_x, screen_y, screen_width, screen_height);
    ndc_to_ray(nx, ny, camera)
}
