use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Interleaved vertex as uploaded to the GPU: position followed by normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Indexed triangle mesh produced from a Wavefront OBJ file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    /// Reads and parses an OBJ file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse OBJ mesh {}", path.display()))
    }

    /// Parses OBJ text. Only `v`, `vn` and `f` records are used; polygons are
    /// fan-triangulated and missing normals are reconstructed from faces.
    pub fn parse(data: &str) -> Result<Self> {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut triangles: Vec<[Corner; 3]> = Vec::new();

        for (line_no, line) in data.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };
            match tag {
                "v" => positions.push(
                    parse_vec3(parts)
                        .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
                ),
                "vn" => normals.push(
                    parse_vec3(parts)
                        .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
                ),
                "f" => {
                    let polygon = parse_face(parts)
                        .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                    for i in 1..polygon.len() - 1 {
                        triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        if positions.is_empty() {
            return Err(anyhow!("OBJ file does not define any vertices"));
        }

        let mut mesh = weld(&positions, &normals, &triangles)?;
        mesh.fill_missing_normals();
        Ok(mesh)
    }

    /// Axis-aligned unit cube centred on the origin with per-face normals.
    pub fn unit_cube() -> Self {
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        ];
        let mut mesh = Self::default();
        for (normal, u, v) in FACES {
            let base = mesh.vertices.len() as u32;
            let centre = normal * 0.5;
            for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                mesh.vertices
                    .push(MeshVertex::new(centre + u * su + v * sv, normal));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Minimum and maximum corner of the mesh bounds.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.vertices.iter().map(|v| Vec3::from(v.position));
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Gives every vertex without an authored normal the average of its
    /// adjacent face normals. Authored normals are left alone.
    fn fill_missing_normals(&mut self) {
        let missing: Vec<bool> = self
            .vertices
            .iter()
            .map(|vertex| vertex.normal == [0.0; 3])
            .collect();
        if !missing.contains(&true) {
            return;
        }
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let p0 = Vec3::from(self.vertices[a].position);
            let p1 = Vec3::from(self.vertices[b].position);
            let p2 = Vec3::from(self.vertices[c].position);
            if let Some(normal) = (p1 - p0).cross(p2 - p0).try_normalize() {
                accum[a] += normal;
                accum[b] += normal;
                accum[c] += normal;
            }
        }
        for ((vertex, normal), missing) in self.vertices.iter_mut().zip(accum).zip(missing) {
            if missing {
                vertex.normal = normal.normalize_or_zero().to_array();
            }
        }
    }
}

/// Raw OBJ indices of one face corner; a zero normal index means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    position: i64,
    normal: i64,
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<Corner>> {
    let corners = parts
        .map(|part| -> Result<Corner> {
            // v, v/vt, v//vn or v/vt/vn
            let mut segments = part.split('/');
            let position = segments
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow!("missing vertex index"))?
                .parse::<i64>()?;
            let normal = match segments.nth(1) {
                Some(s) if !s.is_empty() => s.parse::<i64>()?,
                _ => 0,
            };
            Ok(Corner { position, normal })
        })
        .collect::<Result<Vec<_>>>()?;
    if corners.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(corners)
}

fn weld(positions: &[Vec3], normals: &[Vec3], triangles: &[[Corner; 3]]) -> Result<ObjMesh> {
    let mut lookup: HashMap<(usize, Option<usize>), u32> = HashMap::new();
    let mut mesh = ObjMesh::default();

    for corner in triangles.iter().flatten() {
        let position = resolve_index(corner.position, positions.len())
            .ok_or_else(|| anyhow!("vertex index {} is out of range", corner.position))?;
        let normal = resolve_index(corner.normal, normals.len());
        let next = mesh.vertices.len() as u32;
        let index = *lookup.entry((position, normal)).or_insert_with(|| {
            let n = normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
            mesh.vertices.push(MeshVertex::new(positions[position], n));
            next
        });
        mesh.indices.push(index);
    }

    Ok(mesh)
}

/// Converts a one-based (or negative, relative) OBJ index to a zero-based one.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    match index {
        0 => None,
        i if i > 0 => usize::try_from(i - 1).ok().filter(|&i| i < len),
        i => len.checked_sub(usize::try_from(-i).ok()?),
    }
}
