//! Scene graph node types
//!
//! A companion `Model` is a root transform plus named mesh parts. The part
//! names double as animation hooks: tweens and clip tracks address parts
//! by name (`body`, `left_ear`, `tail`, ...), never by index.

use serde::{Deserialize, Serialize};

use crate::anim::AnimationClip;
use crate::config::StageId;
use crate::rasterizer::{
    mat4_from_trs, mat4_mul, mat4_transform_point, mat4_transform_vector, mat4_translation, Color, Face, Mat4,
    Material, Vec3, Vertex,
};

/// Part names the placeholder motions and effects look for
pub mod part_names {
    pub const BODY: &str = "body";
    pub const LEFT_EAR: &str = "left_ear";
    pub const RIGHT_EAR: &str = "right_ear";
    pub const LEFT_EYE: &str = "left_eye";
    pub const RIGHT_EYE: &str = "right_eye";
    pub const TAIL: &str = "tail";
}

// =============================================================================
// Transform
// =============================================================================

/// Position, Euler rotation (radians) and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn matrix(&self) -> Mat4 {
        mat4_from_trs(self.position, self.rotation, self.scale)
    }

    /// Read one property
    pub fn get(&self, prop: Property) -> Vec3 {
        match prop {
            Property::Position => self.position,
            Property::Rotation => self.rotation,
            Property::Scale => self.scale,
        }
    }

    /// Write one property
    pub fn set(&mut self, prop: Property, value: Vec3) {
        match prop {
            Property::Position => self.position = value,
            Property::Rotation => self.rotation = value,
            Property::Scale => self.scale = value,
        }
    }
}

/// Animatable transform property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Position,
    Rotation,
    Scale,
}

// =============================================================================
// Mesh
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, faces: Vec<Face>) -> Self {
        Self { vertices, faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Axis-aligned bounds of the vertices transformed by `m`
    pub fn bounds_with(&self, m: &Mat4) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| mat4_transform_point(m, v.pos));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Replace vertex normals with area-weighted face normals
    pub fn recompute_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = Vec3::ZERO;
        }
        for f in &self.faces {
            let (Some(a), Some(b), Some(c)) = (
                self.vertices.get(f.v0).map(|v| v.pos),
                self.vertices.get(f.v1).map(|v| v.pos),
                self.vertices.get(f.v2).map(|v| v.pos),
            ) else {
                continue;
            };
            let n = (b - a).cross(c - a);
            for idx in [f.v0, f.v1, f.v2] {
                self.vertices[idx].normal += n;
            }
        }
        for v in &mut self.vertices {
            v.normal = v.normal.normalize();
        }
    }
}

// =============================================================================
// Model
// =============================================================================

/// One named, separately transformable piece of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPart {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
    pub mesh: Mesh,
    pub material: Material,
    #[serde(default = "visible_default")]
    pub visible: bool,
}

fn visible_default() -> bool {
    true
}

impl MeshPart {
    pub fn new(name: impl Into<String>, mesh: Mesh, material: Material) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh,
            material,
            visible: true,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// A companion model. Plain data: clones are fully independent.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub stage: StageId,
    pub transform: Transform,
    /// Model-space offset applied under the root transform (ground centering)
    pub ground_offset: Vec3,
    pub parts: Vec<MeshPart>,
    pub clips: Vec<AnimationClip>,
    pub visible: bool,
}

impl Model {
    pub fn new(name: impl Into<String>, stage: StageId) -> Self {
        Self {
            name: name.into(),
            stage,
            transform: Transform::default(),
            ground_offset: Vec3::ZERO,
            parts: Vec::new(),
            clips: Vec::new(),
            visible: true,
        }
    }

    pub fn part(&self, name: &str) -> Option<&MeshPart> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn part_mut(&mut self, name: &str) -> Option<&mut MeshPart> {
        self.parts.iter_mut().find(|p| p.name == name)
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.iter().find(|c| c.name == name)
    }

    /// Model space (ground offset applied, root transform not)
    pub fn part_model_matrix(&self, part: &MeshPart) -> Mat4 {
        mat4_mul(&mat4_translation(self.ground_offset), &part.transform.matrix())
    }

    pub fn part_world_matrix(&self, part: &MeshPart) -> Mat4 {
        mat4_mul(&self.transform.matrix(), &self.part_model_matrix(part))
    }

    /// World-space vertices of one part, ready for the rasterizer
    pub fn world_vertices(&self, part: &MeshPart) -> Vec<Vertex> {
        let m = self.part_world_matrix(part);
        part.mesh
            .vertices
            .iter()
            .map(|v| Vertex::new(mat4_transform_point(&m, v.pos), mat4_transform_vector(&m, v.normal).normalize()))
            .collect()
    }

    /// Bounds in model space over every part
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.parts
            .iter()
            .filter_map(|p| p.mesh.bounds_with(&self.part_model_matrix(p)))
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }

    /// Bounds in world space over every part
    pub fn world_bounds(&self) -> Option<(Vec3, Vec3)> {
        self.parts
            .iter()
            .filter_map(|p| p.mesh.bounds_with(&self.part_world_matrix(p)))
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }

    /// Shift so the XZ center sits on the origin and the lowest point on y = 0
    pub fn ground_center(&mut self) {
        if let Some((lo, hi)) = self.bounds() {
            let center_x = (lo.x + hi.x) * 0.5;
            let center_z = (lo.z + hi.z) * 0.5;
            self.ground_offset -= Vec3::new(center_x, lo.y, center_z);
        }
    }

    /// Same opacity on every part
    pub fn set_opacity(&mut self, opacity: f32) {
        let o = opacity.clamp(0.0, 1.0);
        for p in &mut self.parts {
            p.material.opacity = o;
        }
    }

    pub fn opacity(&self) -> f32 {
        self.parts.first().map(|p| p.material.opacity).unwrap_or(1.0)
    }

    /// Every part, every mesh, every material
    pub fn resource_count(&self) -> usize {
        self.parts.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangle_count()).sum()
    }
}

// =============================================================================
// Sprite
// =============================================================================

/// Camera-facing square, used for particles and icons
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub position: Vec3,
    pub color: Color,
    pub opacity: f32,
    /// Edge length in world units
    pub size: f32,
    pub visible: bool,
    pub pickable: bool,
}

impl Sprite {
    pub fn new(position: Vec3, color: Color, size: f32) -> Self {
        Self {
            position,
            color,
            opacity: 1.0,
            size,
            visible: true,
            pickable: false,
        }
    }
}

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Model(Model),
    Sprite(Sprite),
}

impl Node {
    pub fn is_visible(&self) -> bool {
        match self {
            Node::Model(m) => m.visible,
            Node::Sprite(s) => s.visible,
        }
    }

    /// Geometry and material allocations held by this node
    pub fn resource_count(&self) -> (usize, usize) {
        match self {
            Node::Model(m) => (m.resource_count(), m.resource_count()),
            Node::Sprite(_) => (0, 1),
        }
    }
}
