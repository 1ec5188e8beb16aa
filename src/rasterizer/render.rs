//! Core rendering functions
//! Triangle rasterization with flat/toon shading, rim light and alpha

use super::camera::Camera;
use super::math::{barycentric, Vec3, NEAR_PLANE};
use super::types::{Color, Face, Material, RasterSettings, RasterStats, ShadingMode, Vertex};

/// Framebuffer for software rendering
pub struct Framebuffer {
    pub pixels: Vec<u8>,   // RGBA, 4 bytes per pixel
    pub zbuffer: Vec<f32>, // Depth buffer
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            zbuffer: vec![f32::MAX; width * height],
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.pixels = vec![0; width * height * 4];
            self.zbuffer = vec![f32::MAX; width * height];
        }
    }

    pub fn clear(&mut self, color: Color) {
        let bytes = color.to_bytes();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
        self.zbuffer.fill(f32::MAX);
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) * 4;
        Some(Color::new(self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]))
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            self.pixels[idx..idx + 4].copy_from_slice(&color.to_bytes());
        }
    }

    /// Set pixel with depth test, returns true if pixel was written
    pub fn set_pixel_with_depth(&mut self, x: usize, y: usize, z: f32, color: Color) -> bool {
        if x < self.width && y < self.height {
            let idx = y * self.width + x;
            if z < self.zbuffer[idx] {
                self.zbuffer[idx] = z;
                self.set_pixel(x, y, color);
                return true;
            }
        }
        false
    }

    /// Depth-tested alpha blend; the depth buffer is left untouched
    pub fn blend_pixel_with_depth(&mut self, x: usize, y: usize, z: f32, color: Color, alpha: f32) -> bool {
        if x >= self.width || y >= self.height || alpha <= 0.0 {
            return false;
        }
        let idx = y * self.width + x;
        if z >= self.zbuffer[idx] {
            return false;
        }
        let p = idx * 4;
        let dst = Color::new(self.pixels[p], self.pixels[p + 1], self.pixels[p + 2]);
        let out = dst.lerp(color, alpha);
        self.pixels[p] = out.r;
        self.pixels[p + 1] = out.g;
        self.pixels[p + 2] = out.b;
        true
    }

    /// Draw a camera-facing square (billboard) centered at (cx, cy)
    pub fn draw_sprite(&mut self, cx: f32, cy: f32, half_size: f32, z: f32, color: Color, alpha: f32) -> usize {
        let half = half_size.max(0.5);
        let x0 = (cx - half).floor().max(0.0) as usize;
        let y0 = (cy - half).floor().max(0.0) as usize;
        let x1 = ((cx + half).ceil().max(0.0) as usize).min(self.width);
        let y1 = ((cy + half).ceil().max(0.0) as usize).min(self.height);

        let mut written = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                if self.blend_pixel_with_depth(x, y, z, color, alpha.clamp(0.0, 1.0)) {
                    written += 1;
                }
            }
        }
        written
    }
}

/// Lit color of one face
fn shade_face(
    normal: Vec3,
    view_dir: Vec3,
    material: &Material,
    settings: &RasterSettings,
) -> Color {
    let base = material.color.to_linear();

    let lit = match material.shading {
        ShadingMode::Unlit => base,
        ShadingMode::Flat => {
            let mut light = settings.ambient_color.to_linear() * settings.ambient;
            for l in &settings.lights {
                let n_dot_l = normal.dot(l.direction.normalize()).max(0.0);
                light += l.color.to_linear() * (n_dot_l * l.intensity);
            }
            base.mul_elem(light)
        }
        ShadingMode::Toon { bands } => {
            let bands = bands.max(1) as f32;
            let n_dot_l = normal.dot(settings.toon_light_dir.normalize()).max(0.0);
            let toon = 0.15 + 0.85 * (n_dot_l * bands).floor() / bands;
            base * toon
        }
    };

    let mut out = lit;
    if let Some(rim) = material.rim {
        let n_dot_v = normal.dot(view_dir).max(0.0);
        let rim_term = (1.0 - n_dot_v).powf(rim.power) * rim.strength;
        out += rim.color.to_linear() * rim_term;
    }
    if material.emissive_intensity > 0.0 {
        out += material.emissive.to_linear() * material.emissive_intensity;
    }

    Color::from_linear(out)
}

/// Render a mesh (world-space vertices) to the framebuffer
pub fn render_mesh(
    fb: &mut Framebuffer,
    vertices: &[Vertex],
    faces: &[Face],
    material: &Material,
    camera: &Camera,
    settings: &RasterSettings,
) -> RasterStats {
    let mut stats = RasterStats {
        triangles_in: faces.len(),
        ..Default::default()
    };

    if material.opacity <= 0.0 || fb.width == 0 || fb.height == 0 {
        return stats;
    }

    let tan = camera.tan_half_fov();
    let cam_space: Vec<Vec3> = vertices.iter().map(|v| camera.to_camera_space(v.pos)).collect();
    let projected: Vec<Vec3> = cam_space
        .iter()
        .map(|c| super::math::project(*c, tan, camera.aspect, fb.width, fb.height))
        .collect();

    for face in faces {
        let (Some(w0), Some(w1), Some(w2)) = (
            vertices.get(face.v0),
            vertices.get(face.v1),
            vertices.get(face.v2),
        ) else {
            continue;
        };

        // Skip triangles that have ANY vertex behind the near plane
        if cam_space[face.v0].z <= NEAR_PLANE
            || cam_space[face.v1].z <= NEAR_PLANE
            || cam_space[face.v2].z <= NEAR_PLANE
        {
            continue;
        }

        let normal = (w1.pos - w0.pos).cross(w2.pos - w0.pos).normalize();
        let center = (w0.pos + w1.pos + w2.pos) * (1.0 / 3.0);
        let view_dir = (camera.position - center).normalize();

        if settings.backface_cull && normal.dot(view_dir) <= 0.0 {
            continue;
        }

        let color = shade_face(normal, view_dir, material, settings);
        let written = rasterize_triangle(
            fb,
            projected[face.v0],
            projected[face.v1],
            projected[face.v2],
            color,
            material.opacity,
        );
        if written > 0 {
            stats.triangles_drawn += 1;
            stats.pixels_written += written;
        }
    }

    stats
}

/// Fill one screen-space triangle; z is camera-space depth
fn rasterize_triangle(fb: &mut Framebuffer, v1: Vec3, v2: Vec3, v3: Vec3, color: Color, opacity: f32) -> usize {
    let min_x = v1.x.min(v2.x).min(v3.x).floor().max(0.0) as usize;
    let min_y = v1.y.min(v2.y).min(v3.y).floor().max(0.0) as usize;
    let max_x = (v1.x.max(v2.x).max(v3.x).ceil().max(0.0) as usize).min(fb.width);
    let max_y = (v1.y.max(v2.y).max(v3.y).ceil().max(0.0) as usize).min(fb.height);

    let opaque = opacity >= 1.0;
    let mut written = 0;

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
            let bc = barycentric(p, v1, v2, v3);
            if bc.x < 0.0 || bc.y < 0.0 || bc.z < 0.0 {
                continue;
            }

            // Perspective-correct depth
            let inv_z = bc.x / v1.z + bc.y / v2.z + bc.z / v3.z;
            if inv_z <= 0.0 {
                continue;
            }
            let z = 1.0 / inv_z;

            let hit = if opaque {
                fb.set_pixel_with_depth(x, y, z, color)
            } else {
                fb.blend_pixel_with_depth(x, y, z, color, opacity)
            };
            if hit {
                written += 1;
            }
        }
    }

    written
}
