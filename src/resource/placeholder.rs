//! Placeholder companion geometry
//!
//! Builds the stand-in model used when a stage has no asset or the asset
//! fails to load: capsule body, two stretched sphere ears, two black eyes
//! and, past the first stage, a cone tail. Part names are the animation
//! hooks the placeholder motions drive.
//!
//! Every primitive is a surface of revolution around +Y, wound
//! counter-clockwise seen from outside.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::config::{ShadingConfig, StageDef};
use crate::rasterizer::{Color, Face, Material, ShadingMode, Vec3, Vertex};
use crate::scene::node::part_names::{BODY, LEFT_EAR, LEFT_EYE, RIGHT_EAR, RIGHT_EYE, TAIL};
use crate::scene::{Mesh, MeshPart, Model, Transform};

use super::loader::apply_shading;

const EYE_RADIUS: f32 = 0.08;

/// Build the placeholder for one stage. `stage_index` 0 is the first stage
/// (no tail). Shading is applied; ground centering is left to the caller.
pub fn build_placeholder(stage: &StageDef, stage_index: usize, shading: &ShadingConfig) -> Model {
    let p = stage.placeholder;
    let (r, h, ear) = (p.body_radius, p.body_height, p.ear_size);

    let mut model = Model::new(format!("placeholder-{}", stage.id), stage.id.clone());
    let skin = Material::new(stage.color);

    model.parts.push(
        MeshPart::new(BODY, capsule(r, h, 8, 16), skin.clone())
            .with_transform(Transform::from_position(Vec3::new(0.0, h / 2.0, 0.0))),
    );

    let ear_mesh = sphere(ear, 16, 16);
    for (name, side) in [(LEFT_EAR, -1.0), (RIGHT_EAR, 1.0)] {
        let transform = Transform {
            position: Vec3::new(side * r * 0.6, h + ear, 0.0),
            rotation: Vec3::ZERO,
            scale: Vec3::new(1.0, 1.5, 1.0),
        };
        model.parts.push(MeshPart::new(name, ear_mesh.clone(), skin.clone()).with_transform(transform));
    }

    let eye_mesh = sphere(EYE_RADIUS, 8, 8);
    let mut eye = Material::new(Color::BLACK);
    eye.shading = ShadingMode::Unlit;
    for (name, side) in [(LEFT_EYE, -1.0), (RIGHT_EYE, 1.0)] {
        let at = Vec3::new(side * r * 0.3, h * 0.8, r * 0.9);
        model
            .parts
            .push(MeshPart::new(name, eye_mesh.clone(), eye.clone()).with_transform(Transform::from_position(at)));
    }

    if stage_index > 0 {
        let transform = Transform {
            position: Vec3::new(0.0, h * 0.3, -r),
            rotation: Vec3::new(FRAC_PI_2, 0.0, 0.0),
            scale: Vec3::ONE,
        };
        model
            .parts
            .push(MeshPart::new(TAIL, cone(r * 0.3, h * 0.5, 8), skin).with_transform(transform));
    }

    apply_shading(&mut model, shading);
    model
}

// =============================================================================
// Primitives
// =============================================================================

/// Sweep a top-to-bottom profile of (radius, y) around the Y axis
fn lathe(profile: &[(f32, f32)], segments: usize) -> Mesh {
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity(profile.len() * segments);
    for &(radius, y) in profile {
        for j in 0..segments {
            let phi = TAU * j as f32 / segments as f32;
            vertices.push(Vertex::new(Vec3::new(radius * phi.sin(), y, radius * phi.cos()), Vec3::ZERO));
        }
    }

    let mut faces = Vec::with_capacity(profile.len().saturating_sub(1) * segments * 2);
    for i in 0..profile.len().saturating_sub(1) {
        for j in 0..segments {
            let jn = (j + 1) % segments;
            let a = i * segments + j;
            let b = (i + 1) * segments + j;
            let c = (i + 1) * segments + jn;
            let d = i * segments + jn;
            faces.push(Face::new(a, b, c));
            faces.push(Face::new(a, c, d));
        }
    }

    let mut mesh = Mesh::new(vertices, faces);
    mesh.recompute_normals();
    mesh
}

pub fn sphere(radius: f32, segments: usize, rings: usize) -> Mesh {
    let rings = rings.max(2);
    let profile: Vec<(f32, f32)> = (0..=rings)
        .map(|i| {
            let theta = PI * i as f32 / rings as f32;
            (radius * theta.sin(), radius * theta.cos())
        })
        .collect();
    lathe(&profile, segments)
}

/// Capsule whose straight section is `length` tall; total height is
/// `length + 2 * radius`, centered on the origin.
pub fn capsule(radius: f32, length: f32, cap_rings: usize, segments: usize) -> Mesh {
    let cap_rings = cap_rings.max(1);
    let half = length / 2.0;
    let mut profile = Vec::with_capacity(cap_rings * 2 + 2);
    for i in 0..=cap_rings {
        let theta = FRAC_PI_2 * i as f32 / cap_rings as f32;
        profile.push((radius * theta.sin(), half + radius * theta.cos()));
    }
    for i in 0..=cap_rings {
        let theta = FRAC_PI_2 + FRAC_PI_2 * i as f32 / cap_rings as f32;
        profile.push((radius * theta.sin(), -half + radius * theta.cos()));
    }
    lathe(&profile, segments)
}

/// Cone with its apex up, centered on the origin, base closed
pub fn cone(radius: f32, height: f32, segments: usize) -> Mesh {
    let half = height / 2.0;
    lathe(&[(0.0, half), (radius, -half), (0.0, -half)], segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompanionConfig, StageId};

    fn stage(id: &str) -> (StageDef, usize) {
        let config = CompanionConfig::default();
        let index = config.stage_index(&StageId::from(id)).expect("stage");
        (config.stages[index].clone(), index)
    }

    /// Every face normal points away from the mesh center
    fn assert_outward(mesh: &Mesh) {
        for f in &mesh.faces {
            let (a, b, c) = (mesh.vertices[f.v0].pos, mesh.vertices[f.v1].pos, mesh.vertices[f.v2].pos);
            let n = (b - a).cross(c - a);
            if n.len() < 1e-6 {
                continue;
            }
            let centroid = (a + b + c) * (1.0 / 3.0);
            assert!(n.dot(centroid) > 0.0, "inward face {:?}", f);
        }
    }

    #[test]
    fn test_primitives_wind_outward() {
        assert_outward(&sphere(1.0, 12, 8));
        assert_outward(&capsule(0.5, 0.8, 4, 12));
        assert_outward(&cone(0.3, 0.6, 8));
    }

    #[test]
    fn test_capsule_height() {
        let mesh = capsule(0.5, 0.8, 4, 12);
        let (lo, hi) = mesh.bounds_with(&crate::rasterizer::mat4_identity()).expect("bounds");
        assert!((hi.y - lo.y - 1.8).abs() < 1e-5);
        assert!((hi.x - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_baby_has_no_tail() {
        let (def, index) = stage("baby");
        let model = build_placeholder(&def, index, &ShadingConfig::default());
        assert!(model.has_part(BODY));
        assert!(model.has_part(LEFT_EAR) && model.has_part(RIGHT_EAR));
        assert!(model.has_part(LEFT_EYE) && model.has_part(RIGHT_EYE));
        assert!(!model.has_part(TAIL));
        assert!(model.clips.is_empty());
    }

    #[test]
    fn test_later_stages_have_tail() {
        let (def, index) = stage("adult");
        let model = build_placeholder(&def, index, &ShadingConfig::default());
        let tail = model.part(TAIL).expect("tail");
        assert_eq!(tail.transform.rotation.x, FRAC_PI_2);
    }

    #[test]
    fn test_eyes_stay_unlit() {
        let (def, index) = stage("teen");
        let model = build_placeholder(&def, index, &ShadingConfig::default());
        let eye = model.part(LEFT_EYE).expect("eye");
        assert_eq!(eye.material.shading, ShadingMode::Unlit);
        assert_eq!(eye.material.rim, None);
        let body = model.part(BODY).expect("body");
        assert_eq!(body.material.shading, ShadingMode::Toon { bands: 4 });
        assert!(body.material.rim.is_some());
    }
}
