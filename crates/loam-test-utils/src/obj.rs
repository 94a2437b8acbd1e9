//! A small Wavefront OBJ/MTL reader and writer.
//!
//! Enough of the format to stand in for a real importer in tests: positions,
//! texture coordinates, normals, polygonal faces with negative indices,
//! object groups, and MTL materials. Like the real OBJ importer, faces are
//! expanded so every face corner gets its own vertex, and a default
//! material always sits at index 0.

use std::fmt;
use std::io::{self, Write};

use loam_core::limits::{DEFAULT_MATERIAL_NAME, MAX_FACE_INDICES};
use loam_core::{
    Color4D, Face, Material, Matrix4x4, Mesh, Node, PrimitiveType, Scene, SceneFlags, TextureType,
    Vector3D,
};

/// Object name used for faces that appear before any `o`/`g` statement.
pub const DEFAULT_OBJECT_NAME: &str = "defaultobject";

/// A parse failure, with the one-based line it occurred on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjError {
    /// Line number, one-based. Zero when not tied to a line.
    pub line: usize,
    /// What went wrong.
    pub reason: String,
}

impl ObjError {
    fn at(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ObjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "OBJ: {}", self.reason)
        } else {
            write!(f, "OBJ: line {}: {}", self.line, self.reason)
        }
    }
}

impl std::error::Error for ObjError {}

/// Result of [`read_obj`]: the scene plus non-fatal diagnostics.
#[derive(Clone, Debug, Default)]
pub struct ObjImport {
    pub scene: Scene,
    pub warnings: Vec<String>,
}

// ── Reader ──────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Corner {
    position: Vector3D,
    uv: Option<(Vector3D, u32)>,
    normal: Option<Vector3D>,
}

struct PendingMesh {
    name: String,
    material: usize,
    corners: Vec<Corner>,
    faces: Vec<Face>,
}

impl PendingMesh {
    fn new(name: &str, material: usize) -> Self {
        Self {
            name: name.to_string(),
            material,
            corners: Vec::new(),
            faces: Vec::new(),
        }
    }

    fn finish(self) -> Mesh {
        let mut mesh = Mesh::new(self.name, PrimitiveType::empty());
        mesh.material_index = self.material;
        mesh.vertices = self.corners.iter().map(|c| c.position).collect();
        if self.corners.iter().any(|c| c.normal.is_some()) {
            mesh.normals = self
                .corners
                .iter()
                .map(|c| c.normal.unwrap_or(Vector3D::ZERO))
                .collect();
        }
        if self.corners.iter().any(|c| c.uv.is_some()) {
            mesh.texture_coordinate_channels[0] = self
                .corners
                .iter()
                .map(|c| c.uv.map_or(Vector3D::ZERO, |(uv, _)| uv))
                .collect();
            mesh.uv_component_count[0] = self
                .corners
                .iter()
                .filter_map(|c| c.uv.map(|(_, n)| n))
                .max()
                .unwrap_or(2);
        }
        mesh.faces = self.faces;
        mesh.update_primitive_types();
        mesh
    }
}

/// The material every OBJ import starts with.
pub fn default_material() -> Material {
    let mut material = Material::named(DEFAULT_MATERIAL_NAME);
    material.set_color_diffuse(Color4D::new(0.6, 0.6, 0.6, 1.0));
    material
}

/// Parse an OBJ document into a scene.
///
/// `root_name` names the root node; each mesh gets a child node of its own.
/// `load_mtl` resolves `mtllib` references to MTL text; returning `None`
/// records a warning and leaves the default material in place.
pub fn read_obj(
    text: &str,
    root_name: &str,
    load_mtl: &mut dyn FnMut(&str) -> Option<String>,
) -> Result<ObjImport, ObjError> {
    let mut positions: Vec<Vector3D> = Vec::new();
    let mut normals: Vec<Vector3D> = Vec::new();
    let mut uvs: Vec<(Vector3D, u32)> = Vec::new();
    let mut materials = vec![default_material()];
    let mut warnings = Vec::new();
    let mut done: Vec<PendingMesh> = Vec::new();
    let mut current = PendingMesh::new(DEFAULT_OBJECT_NAME, 0);

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        let mut parts = content.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();
        match keyword {
            "v" => positions.push(vector(&args, line)?),
            "vn" => normals.push(vector(&args, line)?),
            "vt" => {
                let values = floats(&args, 1, 3, line)?;
                let uv = Vector3D::new(
                    values[0],
                    values.get(1).copied().unwrap_or(0.0),
                    values.get(2).copied().unwrap_or(0.0),
                );
                uvs.push((uv, values.len() as u32));
            }
            "f" => {
                if args.is_empty() {
                    return Err(ObjError::at(line, "face without indices"));
                }
                if args.len() > MAX_FACE_INDICES {
                    return Err(ObjError::at(line, "face has too many indices"));
                }
                let base = current.corners.len() as u32;
                for corner in &args {
                    current
                        .corners
                        .push(parse_corner(corner, &positions, &uvs, &normals, line)?);
                }
                current
                    .faces
                    .push(Face::new(base..base + args.len() as u32));
            }
            "o" | "g" => {
                let name = if args.is_empty() {
                    DEFAULT_OBJECT_NAME.to_string()
                } else {
                    args.join(" ")
                };
                let material = current.material;
                let previous = std::mem::replace(&mut current, PendingMesh::new(&name, material));
                if !previous.faces.is_empty() {
                    done.push(previous);
                }
            }
            "usemtl" => {
                let name = args.join(" ");
                let index = match materials.iter().position(|m| m.name() == name) {
                    Some(index) => index,
                    None => {
                        warnings
                            .push(format!("OBJ: failed to locate material {name}, using default"));
                        0
                    }
                };
                if index != current.material && !current.faces.is_empty() {
                    let next = PendingMesh::new(&current.name, index);
                    done.push(std::mem::replace(&mut current, next));
                } else {
                    current.material = index;
                }
            }
            "mtllib" => {
                let name = args.join(" ");
                match load_mtl(&name) {
                    Some(mtl) => read_mtl(&mtl, &mut materials)?,
                    None => warnings.push(format!("OBJ: unable to locate material file {name}")),
                }
            }
            _ => {}
        }
    }
    if !current.faces.is_empty() {
        done.push(current);
    }

    let mut scene = Scene::new();
    let mut root = Node::new(root_name);
    for (index, pending) in done.into_iter().enumerate() {
        root.add_child(Node::new(pending.name.clone())).mesh_indices = vec![index];
        scene.meshes.push(pending.finish());
    }
    if scene.meshes.is_empty() {
        scene.flags |= SceneFlags::INCOMPLETE;
        warnings.push("OBJ: file contains no faces".to_string());
    }
    scene.root_node = Some(root);
    scene.materials = materials;
    Ok(ObjImport { scene, warnings })
}

/// Parse an MTL document, merging into `materials` by name.
pub fn read_mtl(text: &str, materials: &mut Vec<Material>) -> Result<(), ObjError> {
    let mut current: Option<usize> = None;
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        let mut parts = content.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();
        if keyword == "newmtl" {
            let name = args.join(" ");
            let index = match materials.iter().position(|m| m.name() == name) {
                Some(index) => index,
                None => {
                    materials.push(Material::named(&name));
                    materials.len() - 1
                }
            };
            current = Some(index);
            continue;
        }
        let Some(index) = current else {
            return Err(ObjError::at(line, format!("{keyword} before newmtl")));
        };
        let material = &mut materials[index];
        match keyword {
            "Kd" => material.set_color_diffuse(color(&args, line)?),
            "Ka" => material.set_color_ambient(color(&args, line)?),
            "Ks" => material.set_color_specular(color(&args, line)?),
            "Ke" => material.set_color_emissive(color(&args, line)?),
            "Ns" => material.set_shininess(floats(&args, 1, 1, line)?[0]),
            "d" => material.set_opacity(floats(&args, 1, 1, line)?[0]),
            "Tr" => material.set_opacity(1.0 - floats(&args, 1, 1, line)?[0]),
            "map_Kd" => material.set_texture_file(TextureType::Diffuse, 0, &args.join(" ")),
            _ => {}
        }
    }
    Ok(())
}

fn floats(args: &[&str], min: usize, max: usize, line: usize) -> Result<Vec<f32>, ObjError> {
    if args.len() < min {
        return Err(ObjError::at(line, format!("expected at least {min} values")));
    }
    args.iter()
        .take(max)
        .map(|a| {
            a.parse::<f32>()
                .map_err(|_| ObjError::at(line, format!("invalid number {a:?}")))
        })
        .collect()
}

fn vector(args: &[&str], line: usize) -> Result<Vector3D, ObjError> {
    let v = floats(args, 3, 3, line)?;
    Ok(Vector3D::new(v[0], v[1], v[2]))
}

fn color(args: &[&str], line: usize) -> Result<Color4D, ObjError> {
    let v = floats(args, 3, 3, line)?;
    Ok(Color4D::new(v[0], v[1], v[2], 1.0))
}

/// Resolve a one-based (or negative, relative) OBJ index into `len` items.
fn resolve(raw: &str, len: usize, what: &str, line: usize) -> Result<usize, ObjError> {
    let index: i64 = raw
        .parse()
        .map_err(|_| ObjError::at(line, format!("invalid {what} index {raw:?}")))?;
    let resolved = match index {
        0 => None,
        i if i > 0 => usize::try_from(i - 1).ok(),
        i => usize::try_from(len as i64 + i).ok(),
    };
    resolved
        .filter(|&r| r < len)
        .ok_or_else(|| ObjError::at(line, format!("{what} index {index} out of range")))
}

fn parse_corner(
    corner: &str,
    positions: &[Vector3D],
    uvs: &[(Vector3D, u32)],
    normals: &[Vector3D],
    line: usize,
) -> Result<Corner, ObjError> {
    let mut fields = corner.split('/');
    let v = fields.next().unwrap_or_default();
    let position = positions[resolve(v, positions.len(), "vertex", line)?];
    let uv = match fields.next() {
        Some(t) if !t.is_empty() => Some(uvs[resolve(t, uvs.len(), "texture", line)?]),
        _ => None,
    };
    let normal = match fields.next() {
        Some(n) if !n.is_empty() => Some(normals[resolve(n, normals.len(), "normal", line)?]),
        _ => None,
    };
    Ok(Corner {
        position,
        uv,
        normal,
    })
}

// ── Writer ──────────────────────────────────────────────────────

/// The name a material is written under. Unnamed materials get a
/// positional name so `usemtl` can still refer to them.
pub fn material_label(scene: &Scene, index: usize) -> String {
    let name = scene
        .materials
        .get(index)
        .map(Material::name)
        .unwrap_or_default();
    if name.is_empty() {
        format!("material_{index}")
    } else {
        name
    }
}

/// Meshes to write, with their world transforms. Meshes not reachable
/// from the root node are skipped; a scene without a root writes every
/// mesh untransformed.
fn placements(scene: &Scene) -> Vec<(usize, Matrix4x4)> {
    fn visit(node: &Node, parent: Matrix4x4, out: &mut Vec<(usize, Matrix4x4)>) {
        let world = if node.transform.is_identity() {
            parent
        } else {
            parent * node.transform
        };
        out.extend(node.mesh_indices.iter().map(|&m| (m, world)));
        for child in &node.children {
            visit(child, world, out);
        }
    }

    let mut out = Vec::new();
    match &scene.root_node {
        Some(root) => visit(root, Matrix4x4::IDENTITY, &mut out),
        None => out.extend((0..scene.meshes.len()).map(|m| (m, Matrix4x4::IDENTITY))),
    }
    out
}

fn transform(m: &Matrix4x4, v: Vector3D, w: f32) -> Vector3D {
    if m.is_identity() {
        return v;
    }
    let r = |row: usize| {
        m.get(row, 0) * v.x + m.get(row, 1) * v.y + m.get(row, 2) * v.z + m.get(row, 3) * w
    };
    Vector3D::new(r(0), r(1), r(2))
}

/// Write `scene` as OBJ. `mtl_name` is the companion file referenced by
/// `mtllib`, if materials are written alongside.
pub fn write_obj(scene: &Scene, mtl_name: Option<&str>, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "# File produced by the loam mock exporter")?;
    if let Some(mtl) = mtl_name.filter(|_| !scene.materials.is_empty()) {
        writeln!(out, "mtllib {mtl}")?;
    }

    let (mut v_base, mut t_base, mut n_base) = (1usize, 1usize, 1usize);
    for (index, world) in placements(scene) {
        let Some(mesh) = scene.meshes.get(index) else {
            continue;
        };
        let name = if mesh.name.is_empty() {
            DEFAULT_OBJECT_NAME
        } else {
            mesh.name.as_str()
        };
        writeln!(out)?;
        writeln!(out, "o {name}")?;
        if mesh.material_index < scene.materials.len() {
            writeln!(out, "usemtl {}", material_label(scene, mesh.material_index))?;
        }
        for v in &mesh.vertices {
            let p = transform(&world, *v, 1.0);
            writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
        }
        let has_uv = mesh.has_texture_coords(0);
        if has_uv {
            for t in &mesh.texture_coordinate_channels[0] {
                match mesh.uv_component_count[0] {
                    1 => writeln!(out, "vt {}", t.x)?,
                    3 => writeln!(out, "vt {} {} {}", t.x, t.y, t.z)?,
                    _ => writeln!(out, "vt {} {}", t.x, t.y)?,
                }
            }
        }
        let has_normals = mesh.has_normals();
        if has_normals {
            for n in &mesh.normals {
                let d = transform(&world, *n, 0.0);
                writeln!(out, "vn {} {} {}", d.x, d.y, d.z)?;
            }
        }
        for face in mesh.faces.iter().filter(|f| f.index_count() > 0) {
            write!(out, "f")?;
            for &i in &face.indices {
                let i = i as usize;
                match (has_uv, has_normals) {
                    (false, false) => write!(out, " {}", v_base + i)?,
                    (true, false) => write!(out, " {}/{}", v_base + i, t_base + i)?,
                    (false, true) => write!(out, " {}//{}", v_base + i, n_base + i)?,
                    (true, true) => write!(out, " {}/{}/{}", v_base + i, t_base + i, n_base + i)?,
                }
            }
            writeln!(out)?;
        }
        v_base += mesh.vertices.len();
        if has_uv {
            t_base += mesh.vertices.len();
        }
        if has_normals {
            n_base += mesh.vertices.len();
        }
    }
    Ok(())
}

/// Write the materials of `scene` as MTL.
pub fn write_mtl(scene: &Scene, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "# File produced by the loam mock exporter")?;
    for (index, material) in scene.materials.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "newmtl {}", material_label(scene, index))?;
        let colors = [
            ("Ka", material.color_ambient()),
            ("Kd", material.color_diffuse()),
            ("Ks", material.color_specular()),
            ("Ke", material.color_emissive()),
        ];
        for (key, c) in colors {
            if let Some(c) = c {
                writeln!(out, "{key} {} {} {}", c.r, c.g, c.b)?;
            }
        }
        if let Some(ns) = material.shininess() {
            writeln!(out, "Ns {ns}")?;
        }
        if let Some(d) = material.opacity() {
            writeln!(out, "d {d}")?;
        }
        if let Some(map) = material.texture_file(TextureType::Diffuse, 0) {
            writeln!(out, "map_Kd {map}")?;
        }
    }
    Ok(())
}
