//! OBJ import for companion models
//!
//! Supports positions (v), normals (vn) and faces (f). Texture coordinates
//! and grouping commands are accepted and ignored. Polygons are fan
//! triangulated, keeping OBJ's counter-clockwise winding.

use std::collections::HashMap;
use std::path::Path;

use crate::rasterizer::{Face, Vec3, Vertex};
use crate::scene::Mesh;

#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Parse(String),
}

/// OBJ file importer
pub struct ObjImporter;

impl ObjImporter {
    pub fn load_from_file(path: &Path) -> Result<Mesh, ObjError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Mesh, ObjError> {
        let mut positions: Vec<Vec3> = Vec::new();
        let mut normals: Vec<Vec3> = Vec::new();

        let mut vertices: Vec<Vertex> = Vec::new();
        let mut faces: Vec<Face> = Vec::new();
        let mut missing_normals = false;

        // (pos_idx, norm_idx) -> vertex_idx
        let mut vertex_cache: HashMap<(usize, Option<usize>), usize> = HashMap::new();

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" => positions.push(Self::parse_vec3(&parts, line_num, "vertex position")?),
                "vn" => normals.push(Self::parse_vec3(&parts, line_num, "normal")?),
                "f" => {
                    if parts.len() < 4 {
                        return Err(ObjError::Parse(format!(
                            "Line {}: Face must have at least 3 vertices",
                            line_num + 1
                        )));
                    }

                    let mut face_verts = Vec::with_capacity(parts.len() - 1);
                    for spec in &parts[1..] {
                        let (pos_idx, norm_idx) = Self::parse_face_vertex(spec, line_num, &positions, &normals)?;
                        missing_normals |= norm_idx.is_none();
                        let idx = *vertex_cache.entry((pos_idx, norm_idx)).or_insert_with(|| {
                            let normal = norm_idx.map(|n| normals[n]).unwrap_or(Vec3::ZERO);
                            vertices.push(Vertex::new(positions[pos_idx], normal));
                            vertices.len() - 1
                        });
                        face_verts.push(idx);
                    }

                    // Fan from the first vertex
                    for i in 1..(face_verts.len() - 1) {
                        faces.push(Face::new(face_verts[0], face_verts[i], face_verts[i + 1]));
                    }
                }
                _ => {}
            }
        }

        if vertices.is_empty() {
            return Err(ObjError::Parse("No vertices found in OBJ file".to_string()));
        }
        if faces.is_empty() {
            return Err(ObjError::Parse("No faces found in OBJ file".to_string()));
        }

        let mut mesh = Mesh::new(vertices, faces);
        if missing_normals {
            mesh.recompute_normals();
        }
        Ok(mesh)
    }

    fn parse_vec3(parts: &[&str], line_num: usize, what: &str) -> Result<Vec3, ObjError> {
        if parts.len() < 4 {
            return Err(ObjError::Parse(format!(
                "Line {}: Invalid {} (expected 3 values)",
                line_num + 1,
                what
            )));
        }
        Ok(Vec3::new(
            Self::parse_float(parts[1], line_num)?,
            Self::parse_float(parts[2], line_num)?,
            Self::parse_float(parts[3], line_num)?,
        ))
    }

    /// "1", "1/2", "1//3" or "1/2/3"; returns position and normal indices
    fn parse_face_vertex(
        spec: &str,
        line_num: usize,
        positions: &[Vec3],
        normals: &[Vec3],
    ) -> Result<(usize, Option<usize>), ObjError> {
        let mut fields = spec.split('/');
        let pos = match fields.next() {
            Some(p) if !p.is_empty() => Self::parse_index(p, positions.len(), line_num)?,
            _ => {
                return Err(ObjError::Parse(format!(
                    "Line {}: Missing position index in face",
                    line_num + 1
                )))
            }
        };
        let _tex = fields.next();
        let norm = match fields.next() {
            Some(n) if !n.is_empty() => Some(Self::parse_index(n, normals.len(), line_num)?),
            _ => None,
        };
        Ok((pos, norm))
    }

    fn parse_float(s: &str, line_num: usize) -> Result<f32, ObjError> {
        s.parse()
            .map_err(|_| ObjError::Parse(format!("Line {}: Invalid float value '{}'", line_num + 1, s)))
    }

    /// 1-based index; negative values count back from the end
    fn parse_index(s: &str, count: usize, line_num: usize) -> Result<usize, ObjError> {
        let idx: i64 = s
            .parse()
            .map_err(|_| ObjError::Parse(format!("Line {}: Invalid index '{}'", line_num + 1, s)))?;

        let resolved = match idx {
            0 => {
                return Err(ObjError::Parse(format!("Line {}: Index cannot be 0", line_num + 1)));
            }
            i if i > 0 => i - 1,
            i => count as i64 + i,
        };

        if resolved < 0 || resolved as usize >= count {
            return Err(ObjError::Parse(format!(
                "Line {}: Index {} out of range (have {} elements)",
                line_num + 1,
                idx,
                count
            )));
        }
        Ok(resolved as usize)
    }
}
