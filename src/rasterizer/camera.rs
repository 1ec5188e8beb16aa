//! Camera for 3D rendering
//!
//! Perspective camera defined by a position and a look-at target.
//! The basis vectors are recomputed whenever either changes.

use super::math::{perspective_transform, project, Vec3, NEAR_PLANE};

/// Camera state for 3D rendering
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub aspect: f32,

    // Computed basis vectors (right, up, forward)
    pub basis_x: Vec3,
    pub basis_y: Vec3,
    pub basis_z: Vec3,
}

impl Camera {
    pub fn new(fov_y: f32, aspect: f32, position: Vec3, target: Vec3) -> Self {
        let mut cam = Self {
            position,
            target,
            fov_y,
            aspect,
            basis_x: Vec3::new(1.0, 0.0, 0.0),
            basis_y: Vec3::new(0.0, 1.0, 0.0),
            basis_z: Vec3::new(0.0, 0.0, 1.0),
        };
        cam.update_basis();
        cam
    }

    pub fn update_basis(&mut self) {
        let mut forward = (self.target - self.position).normalize();
        if forward == Vec3::ZERO {
            forward = Vec3::new(0.0, 0.0, -1.0);
        }

        // Straight up/down would make the cross product vanish
        let world_up = if forward.cross(Vec3::UP).len() < 1e-4 {
            Vec3::new(0.0, 0.0, -1.0)
        } else {
            Vec3::UP
        };

        self.basis_z = forward;
        self.basis_x = forward.cross(world_up).normalize();
        self.basis_y = self.basis_x.cross(forward);
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
        self.update_basis();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_basis();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn tan_half_fov(&self) -> f32 {
        (self.fov_y.to_radians() * 0.5).tan()
    }

    /// World point into camera space (x right, y up, z depth)
    pub fn to_camera_space(&self, p: Vec3) -> Vec3 {
        perspective_transform(p - self.position, self.basis_x, self.basis_y, self.basis_z)
    }

    /// World point to framebuffer coordinates, None when behind the near plane
    pub fn world_to_screen(&self, p: Vec3, width: usize, height: usize) -> Option<Vec3> {
        let cam = self.to_camera_space(p);
        if cam.z < NEAR_PLANE {
            return None;
        }
        Some(project(cam, self.tan_half_fov(), self.aspect, width, height))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(50.0, 1.0, Vec3::new(0.0, 2.0, 5.0), Vec3::new(0.0, 1.0, 0.0))
    }
}
