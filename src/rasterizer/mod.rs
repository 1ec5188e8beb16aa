//! Software rasterizer for the companion view
//!
//! Features:
//! - Perspective projection with a look-at camera
//! - Flat, toon (banded) and unlit shading
//! - Rim light and emissive terms per material
//! - Z-buffer with alpha-blended transparent surfaces
//! - Billboard sprites for particles and icons
//!
//! # Module Organization
//!
//! - `types` - Color, Material, Light, Vertex, Face, RasterSettings
//! - `math` - Vec3, projection functions, matrices, ray/triangle tests
//! - `camera` - Camera struct for 3D rendering
//! - `render` - Framebuffer and mesh rendering functions
//! - `constants` - Framebuffer resolution constants
//! - `ray` - Ray casting utilities

// Sub-modules (exposed for namespaced access)
pub mod camera;
pub mod constants;
pub mod math;
pub mod ray;
pub mod render;
pub mod types;

// =============================================================================
// Convenience re-exports for commonly used items
// =============================================================================

pub use types::{Color, Face, Light, Material, RasterSettings, RasterStats, RimLight, ShadingMode, Vertex};

pub use math::{
    Vec3, Mat4, NEAR_PLANE,
    mat4_identity, mat4_from_trs, mat4_mul, mat4_transform_point, mat4_transform_vector, mat4_translation,
    ray_triangle_intersect,
};

pub use camera::Camera;

pub use render::{render_mesh, Framebuffer};

pub use constants::{WIDTH, HEIGHT};

pub use ray::{ndc_to_ray, screen_to_ndc, screen_to_ray, Ray};
