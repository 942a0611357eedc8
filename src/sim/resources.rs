//! Shared geometry and cached materials
//!
//! Every mesh is built once when the pool is created and shared by every
//! entity of that shape. Materials are created lazily, one per
//! `(color, kind)` key, and never change after creation.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::config::Rgb;

/// Mesh shapes used by targets, bombs and debris
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    Cube,
    Pyramid,
    Sphere,
    ShardBox,
    ShardTetra,
    BombBody,
    BombCap,
    BombFuse,
}

impl Shape {
    pub const ALL: [Shape; 8] = [
        Shape::Cube,
        Shape::Pyramid,
        Shape::Sphere,
        Shape::ShardBox,
        Shape::ShardTetra,
        Shape::BombBody,
        Shape::BombCap,
        Shape::BombFuse,
    ];

    /// Shapes a thrown target can take
    pub const TARGETS: [Shape; 3] = [Shape::Cube, Shape::Pyramid, Shape::Sphere];

    /// Shapes a debris shard can take
    pub const SHARDS: [Shape; 2] = [Shape::ShardBox, Shape::ShardTetra];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Surface finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Plastic,
    Glass,
    BombMatte,
    BombCap,
    BombFuse,
    Emissive,
}

/// Cache key for materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub color: Rgb,
    pub kind: MaterialKind,
}

/// Handle to a cached material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(u32);

/// Surface appearance
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub key: MaterialKey,
    /// RGBA, alpha < 1 for translucent finishes
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub emissive: f32,
    pub transparent: bool,
}

impl Material {
    fn from_key(key: MaterialKey) -> Self {
        let (alpha, roughness, metalness, emissive) = match key.kind {
            MaterialKind::Plastic => (1.0, 0.4, 0.1, 0.0),
            MaterialKind::Glass => (0.45, 0.05, 0.0, 0.1),
            MaterialKind::BombMatte => (1.0, 0.9, 0.0, 0.0),
            MaterialKind::BombCap => (1.0, 0.3, 0.8, 0.0),
            MaterialKind::BombFuse => (1.0, 1.0, 0.0, 0.0),
            MaterialKind::Emissive => (1.0, 1.0, 0.0, 1.0),
        };
        Self {
            key,
            base_color: key.color.with_alpha(alpha),
            roughness,
            metalness,
            emissive,
            transparent: alpha < 1.0,
        }
    }
}

/// Triangle mesh in local space
#[derive(Debug, Clone)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u16>,
    /// Radius of the bounding sphere around the origin
    pub bounding_radius: f32,
}

impl Mesh {
    fn from_vertices(positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u16>) -> Self {
        let bounding_radius = positions.iter().map(|p| p.length()).fold(0.0, f32::max);
        Self {
            positions,
            normals,
            indices,
            bounding_radius,
        }
    }

    /// Flat-shaded mesh from a triangle soup (counter-clockwise winding)
    fn flat(triangles: &[[Vec3; 3]]) -> Self {
        let mut positions = Vec::with_capacity(triangles.len() * 3);
        let mut normals = Vec::with_capacity(triangles.len() * 3);
        for [a, b, c] in triangles {
            let n = (*b - *a).cross(*c - *a).normalize_or_zero();
            positions.extend([*a, *b, *c]);
            normals.extend([n, n, n]);
        }
        let indices = (0..positions.len() as u16).collect();
        Self::from_vertices(positions, normals, indices)
    }

    /// Iterate triangles as vertex positions
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.positions[tri[0] as usize],
                self.positions[tri[1] as usize],
                self.positions[tri[2] as usize],
            ]
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Axis-aligned box centered at the origin
fn box_mesh(half: Vec3) -> Mesh {
    let corner = |x: f32, y: f32, z: f32| Vec3::new(x * half.x, y * half.y, z * half.z);
    let quad = |a: Vec3, b: Vec3, c: Vec3, d: Vec3| [[a, b, c], [a, c, d]];
    let faces = [
        // +X, -X
        quad(corner(1., -1., 1.), corner(1., -1., -1.), corner(1., 1., -1.), corner(1., 1., 1.)),
        quad(corner(-1., -1., -1.), corner(-1., -1., 1.), corner(-1., 1., 1.), corner(-1., 1., -1.)),
        // +Y, -Y
        quad(corner(-1., 1., 1.), corner(1., 1., 1.), corner(1., 1., -1.), corner(-1., 1., -1.)),
        quad(corner(-1., -1., -1.), corner(1., -1., -1.), corner(1., -1., 1.), corner(-1., -1., 1.)),
        // +Z, -Z
        quad(corner(-1., -1., 1.), corner(1., -1., 1.), corner(1., 1., 1.), corner(-1., 1., 1.)),
        quad(corner(1., -1., -1.), corner(-1., -1., -1.), corner(-1., 1., -1.), corner(1., 1., -1.)),
    ];
    let tris: Vec<[Vec3; 3]> = faces.iter().flatten().copied().collect();
    Mesh::flat(&tris)
}

/// Square pyramid, unit base, apex up
fn pyramid_mesh() -> Mesh {
    let apex = Vec3::new(0.0, 0.5, 0.0);
    let a = Vec3::new(-0.5, -0.5, 0.5);
    let b = Vec3::new(0.5, -0.5, 0.5);
    let c = Vec3::new(0.5, -0.5, -0.5);
    let d = Vec3::new(-0.5, -0.5, -0.5);
    Mesh::flat(&[
        [a, b, apex],
        [b, c, apex],
        [c, d, apex],
        [d, a, apex],
        [a, d, c],
        [a, c, b],
    ])
}

/// Regular tetrahedron inscribed in a sphere of radius 0.5
fn tetra_mesh() -> Mesh {
    let s = 0.5 / 3f32.sqrt();
    let p0 = Vec3::new(s, s, s);
    let p1 = Vec3::new(-s, -s, s);
    let p2 = Vec3::new(-s, s, -s);
    let p3 = Vec3::new(s, -s, -s);
    Mesh::flat(&[[p0, p2, p1], [p0, p1, p3], [p0, p3, p2], [p1, p2, p3]])
}

/// Smooth UV sphere
fn sphere_mesh(radius: f32, segments: u16, rings: u16) -> Mesh {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        for seg in 0..=segments {
            let theta = TAU * seg as f32 / segments as f32;
            let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            positions.push(n * radius);
            normals.push(n);
        }
    }
    let stride = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend([a, a + 1, b, b, a + 1, b + 1]);
        }
    }
    Mesh::from_vertices(positions, normals, indices)
}

/// Capped cylinder along +Y, centered at the origin
fn cylinder_mesh(radius: f32, height: f32, segments: u16) -> Mesh {
    let half = height / 2.0;
    let rim = |i: u16, y: f32| {
        let theta = TAU * i as f32 / segments as f32;
        Vec3::new(radius * theta.cos(), y, -radius * theta.sin())
    };
    let top = Vec3::new(0.0, half, 0.0);
    let bottom = Vec3::new(0.0, -half, 0.0);
    let mut tris = Vec::with_capacity(segments as usize * 4);
    for i in 0..segments {
        let (b0, b1) = (rim(i, -half), rim(i + 1, -half));
        let (t0, t1) = (rim(i, half), rim(i + 1, half));
        tris.push([b0, b1, t1]);
        tris.push([b0, t1, t0]);
        tris.push([top, t0, t1]);
        tris.push([bottom, b1, b0]);
    }
    Mesh::flat(&tris)
}

fn build_mesh(shape: Shape) -> Mesh {
    match shape {
        Shape::Cube => box_mesh(Vec3::splat(0.5)),
        Shape::Pyramid => pyramid_mesh(),
        Shape::Sphere => sphere_mesh(0.5, 16, 12),
        Shape::ShardBox => box_mesh(Vec3::new(0.5, 0.3, 0.4)),
        Shape::ShardTetra => tetra_mesh(),
        Shape::BombBody => sphere_mesh(0.5, 20, 14),
        Shape::BombCap => cylinder_mesh(0.18, 0.14, 12),
        Shape::BombFuse => cylinder_mesh(0.04, 0.3, 6),
    }
}

/// Geometry and material cache for one engine instance
#[derive(Debug)]
pub struct ResourcePool {
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    material_index: HashMap<MaterialKey, MaterialHandle>,
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourcePool {
    /// Build every shared mesh up front
    pub fn new() -> Self {
        Self {
            meshes: Shape::ALL.iter().map(|&s| build_mesh(s)).collect(),
            materials: Vec::new(),
            material_index: HashMap::new(),
        }
    }

    /// Shared mesh for a shape
    #[inline]
    pub fn mesh(&self, shape: Shape) -> &Mesh {
        &self.meshes[shape.index()]
    }

    /// Cached material for `(color, kind)`, created on first request
    pub fn material(&mut self, color: Rgb, kind: MaterialKind) -> MaterialHandle {
        let key = MaterialKey { color, kind };
        if let Some(&handle) = self.material_index.get(&key) {
            return handle;
        }
        let handle = MaterialHandle(self.materials.len() as u32);
        self.materials.push(Material::from_key(key));
        self.material_index.insert(key, handle);
        log::debug!("Created material {:?} ({} cached)", key, self.materials.len());
        handle
    }

    /// Look up a material by handle
    #[inline]
    pub fn get_material(&self, handle: MaterialHandle) -> &Material {
        &self.materials[handle.0 as usize]
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_cached_per_key() {
        let mut pool = ResourcePool::new();
        let a = pool.material(Rgb(0xff0055), MaterialKind::Plastic);
        let b = pool.material(Rgb(0xff0055), MaterialKind::Plastic);
        let c = pool.material(Rgb(0xff0055), MaterialKind::Glass);
        let d = pool.material(Rgb(0x00ffcc), MaterialKind::Plastic);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(pool.material_count(), 3);

        for _ in 0..100 {
            pool.material(Rgb(0xff0055), MaterialKind::Glass);
        }
        assert_eq!(pool.material_count(), 3);
    }

    #[test]
    fn test_glass_is_translucent() {
        let mut pool = ResourcePool::new();
        let glass = pool.material(Rgb::WHITE, MaterialKind::Glass);
        let plastic = pool.material(Rgb::WHITE, MaterialKind::Plastic);
        assert!(pool.get_material(glass).transparent);
        assert!(pool.get_material(glass).base_color[3] < 1.0);
        assert!(!pool.get_material(plastic).transparent);
    }

    #[test]
    fn test_emissive_is_opaque_and_glows() {
        let mut pool = ResourcePool::new();
        let ember = pool.material(Rgb(0xffaa33), MaterialKind::Emissive);
        let material = pool.get_material(ember);
        assert_eq!(material.key.kind, MaterialKind::Emissive);
        assert_eq!(material.emissive, 1.0);
        assert!(!material.transparent);
    }

    #[test]
    fn test_all_meshes_built() {
        let pool = ResourcePool::new();
        for shape in Shape::ALL {
            let mesh = pool.mesh(shape);
            assert!(mesh.triangle_count() > 0, "{shape:?} has no triangles");
            assert_eq!(mesh.positions.len(), mesh.normals.len());
            assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
            assert!(mesh.bounding_radius > 0.0);
        }
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let pool = ResourcePool::new();
        let cube = pool.mesh(Shape::Cube);
        for (tri, chunk) in cube.triangles().zip(cube.indices.chunks_exact(3)) {
            let centroid = (tri[0] + tri[1] + tri[2]) / 3.0;
            let normal = cube.normals[chunk[0] as usize];
            assert!(normal.dot(centroid) > 0.0);
        }
        assert_eq!(cube.triangle_count(), 12);
    }
}
