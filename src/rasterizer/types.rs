//! Core types for the rasterizer

use super::math::Vec3;
use serde::{Deserialize, Serialize};

// =============================================================================
// Color
// =============================================================================

/// 24-bit RGB color.
///
/// Serialized as a single `0xRRGGBB` integer so config files can use the
/// hex literals artists already pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<u32> for Color {
    fn from(hex: u32) -> Self {
        Color::from_hex(hex)
    }
}

impl From<Color> for u32 {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    pub fn to_hex(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Parse `#rrggbb` (leading `#` optional)
    pub fn parse_hex(s: &str) -> Option<Self> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Color::from_hex)
    }

    /// Interpolate between two colors
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let inv_t = 1.0 - t;
        Self {
            r: (self.r as f32 * inv_t + other.r as f32 * t) as u8,
            g: (self.g as f32 * inv_t + other.g as f32 * t) as u8,
            b: (self.b as f32 * inv_t + other.b as f32 * t) as u8,
        }
    }

    /// Channels as 0.0-1.0 floats
    pub fn to_linear(self) -> Vec3 {
        Vec3::new(self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }

    /// Back from 0.0-1.0 floats, saturating
    pub fn from_linear(v: Vec3) -> Self {
        let c = |x: f32| (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        Self::new(c(v.x), c(v.y), c(v.z))
    }

    /// Convert to [u8; 4] for framebuffer (RGBA, always opaque)
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub pos: Vec3,
    #[serde(default)]
    pub normal: Vec3,
}

impl Vertex {
    pub fn new(pos: Vec3, normal: Vec3) -> Self {
        Self { pos, normal }
    }
}

/// Triangle face (counter-clockwise when seen from the front)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub v0: usize,
    pub v1: usize,
    pub v2: usize,
}

impl Face {
    pub fn new(v0: usize, v1: usize, v2: usize) -> Self {
        Self { v0, v1, v2 }
    }
}

// =============================================================================
// Materials and lighting
// =============================================================================

/// How lit color is computed for a face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShadingMode {
    /// No lighting, base color only
    Unlit,
    /// Ambient plus directional lights
    Flat,
    /// Quantized diffuse: `0.15 + 0.85 * floor(n_dot_l * bands) / bands`
    Toon { bands: u8 },
}

impl Default for ShadingMode {
    fn default() -> Self {
        ShadingMode::Flat
    }
}

/// View-dependent edge highlight: `(1 - n_dot_v)^power * strength`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RimLight {
    pub color: Color,
    pub strength: f32,
    pub power: f32,
}

impl Default for RimLight {
    fn default() -> Self {
        Self {
            color: Color::from_hex(0xb3d9ff),
            strength: 0.6,
            power: 2.0,
        }
    }
}

/// Surface description for one mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Color,
    #[serde(default)]
    pub emissive: Color,
    #[serde(default)]
    pub emissive_intensity: f32,
    #[serde(default)]
    pub shading: ShadingMode,
    #[serde(default)]
    pub rim: Option<RimLight>,
    /// 1.0 = opaque; anything lower is alpha-blended without depth writes
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_opacity() -> f32 {
    1.0
}

impl Material {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            emissive: Color::BLACK,
            emissive_intensity: 0.0,
            shading: ShadingMode::Flat,
            rim: None,
            opacity: 1.0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}

/// Directional light
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Direction the light comes FROM (normalized on use)
    pub direction: Vec3,
    pub color: Color,
    pub intensity: f32,
}

impl Light {
    pub fn directional(direction: Vec3, color: Color, intensity: f32) -> Self {
        Self { direction, color, intensity }
    }
}

/// Rasterizer settings
#[derive(Debug, Clone)]
pub struct RasterSettings {
    pub ambient_color: Color,
    pub ambient: f32,
    pub lights: Vec<Light>,
    /// Key light direction used by toon shading
    pub toon_light_dir: Vec3,
    pub backface_cull: bool,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            ambient_color: Color::WHITE,
            ambient: 0.6,
            lights: vec![
                Light::directional(Vec3::new(5.0, 5.0, 5.0), Color::WHITE, 0.8),
                Light::directional(Vec3::new(-5.0, 3.0, -5.0), Color::from_hex(0xb3d9ff), 0.5),
            ],
            toon_light_dir: Vec3::new(0.5, 1.0, 0.3),
            backface_cull: true,
        }
    }
}

/// Per-call rasterizer counters
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterStats {
    pub triangles_in: usize,
    pub triangles_drawn: usize,
    pub pixels_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        let c = Color::from_hex(0xff69b4);
        assert_eq!((c.r, c.g, c.b), (0xff, 0x69, 0xb4));
        assert_eq!(Color::parse_hex("#ffd54f"), Some(Color::from_hex(0xffd54f)));
        assert_eq!(Color::parse_hex("ffd54"), None);
        assert_eq!(Color::parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_color_deserializes_from_hex_literal() {
        let c: Color = ron::from_str("0xffb3d9").expect("parse");
        assert_eq!(c, Color::new(0xff, 0xb3, 0xd9));
    }

    #[test]
    fn test_material_defaults() {
        let m: Material = ron::from_str("(color: 0xffffff)").expect("parse");
        assert_eq!(m.opacity, 1.0);
        assert_eq!(m.shading, ShadingMode::Flat);
        assert!(m.rim.is_none());
    }
}
