//! Scene graph and ray picking
//!
//! Root nodes are entities; composite visuals (bombs) hang their parts as
//! children. Nodes never move on their own: the entity registry writes
//! their transforms from physics every frame.

use glam::{Mat4, Quat, Vec3};

use super::resources::{MaterialHandle, ResourcePool, Shape};

/// Node identifier, unique for the lifetime of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A drawable (or grouping) node
#[derive(Debug, Clone)]
pub struct SceneNode {
    id: NodeId,
    pub transform: Transform,
    /// `None` for pure groups
    pub mesh: Option<(Shape, MaterialHandle)>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(transform: Transform) -> Self {
        Self {
            id: NodeId(0),
            transform,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(shape: Shape, material: MaterialHandle, transform: Transform) -> Self {
        Self {
            id: NodeId(0),
            transform,
            mesh: Some((shape, material)),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Visit this node and all descendants with their world matrices
    pub fn walk<'a>(&'a self, parent: Mat4, visit: &mut impl FnMut(&'a SceneNode, Mat4)) {
        let world = parent * self.transform.matrix();
        visit(self, world);
        for child in &self.children {
            child.walk(world, visit);
        }
    }
}

/// A world-space ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Intersection with the plane z = `z`
    pub fn intersect_z_plane(&self, z: f32) -> Option<Vec3> {
        if self.dir.z.abs() < 1e-6 {
            return None;
        }
        let t = (z - self.origin.z) / self.dir.z;
        (t >= 0.0).then(|| self.at(t))
    }
}

/// Nearest ray hit against the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Root node (entity) that owns the struck mesh
    pub root: NodeId,
    /// Node whose mesh was struck (a child for composite visuals)
    pub node: NodeId,
    pub material: MaterialHandle,
    pub distance: f32,
    pub point: Vec3,
}

/// Möller–Trumbore ray/triangle test, returns ray parameter `t`
fn ray_triangle(origin: Vec3, dir: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f32> {
    const EPS: f32 = 1e-7;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > EPS).then_some(t)
}

/// Ray against a mesh placed by `world`. Returns the world-space hit point.
fn ray_mesh(ray: &Ray, world: Mat4, shape: Shape, pool: &ResourcePool) -> Option<Vec3> {
    let mesh = pool.mesh(shape);

    // Bounding sphere early-out in world space
    let center = world.transform_point3(Vec3::ZERO);
    let max_scale = world
        .x_axis
        .truncate()
        .length()
        .max(world.y_axis.truncate().length())
        .max(world.z_axis.truncate().length());
    let radius = mesh.bounding_radius * max_scale;
    let to_center = center - ray.origin;
    let along = to_center.dot(ray.dir);
    if to_center.length_squared() - along * along > radius * radius {
        return None;
    }

    // Exact test in local space; `t` is shared because the local direction
    // is not renormalized.
    let inv = world.inverse();
    let local_origin = inv.transform_point3(ray.origin);
    let local_dir = inv.transform_vector3(ray.dir);
    let t = mesh
        .triangles()
        .filter_map(|tri| ray_triangle(local_origin, local_dir, tri))
        .fold(f32::INFINITY, f32::min);
    t.is_finite().then(|| ray.at(t))
}

/// Flattened drawable for the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshInstance {
    pub shape: Shape,
    pub material: MaterialHandle,
    pub model: Mat4,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    roots: Vec<SceneNode>,
    next_id: u32,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            next_id: 1,
        }
    }

    fn assign_ids(&mut self, node: &mut SceneNode) {
        node.id = NodeId(self.next_id);
        self.next_id += 1;
        for child in &mut node.children {
            self.assign_ids(child);
        }
    }

    /// Attach a node tree as a new root
    pub(crate) fn add(&mut self, mut node: SceneNode) -> NodeId {
        self.assign_ids(&mut node);
        let id = node.id;
        self.roots.push(node);
        id
    }

    /// Detach a root and its children
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        let idx = self.roots.iter().position(|n| n.id == id)?;
        Some(self.roots.remove(idx))
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.roots.iter().find(|n| n.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.roots.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn roots(&self) -> &[SceneNode] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.roots.clear();
    }

    /// Nearest hit among roots accepted by `filter`, testing every mesh in
    /// each accepted subtree
    pub fn raycast(
        &self,
        ray: &Ray,
        pool: &ResourcePool,
        filter: impl Fn(NodeId) -> bool,
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for root in self.roots.iter().filter(|n| filter(n.id)) {
            root.walk(Mat4::IDENTITY, &mut |node, world| {
                let Some((shape, material)) = node.mesh else {
                    return;
                };
                if let Some(point) = ray_mesh(ray, world, shape, pool) {
                    let distance = (point - ray.origin).length();
                    if best.is_none_or(|b| distance < b.distance) {
                        best = Some(RayHit {
                            root: root.id,
                            node: node.id,
                            material,
                            distance,
                            point,
                        });
                    }
                }
            });
        }
        best
    }

    /// Every drawable mesh with its world matrix
    pub fn collect_instances(&self) -> Vec<MeshInstance> {
        let mut out = Vec::with_capacity(self.roots.len() * 2);
        for root in &self.roots {
            root.walk(Mat4::IDENTITY, &mut |node, model| {
                if let Some((shape, material)) = node.mesh {
                    out.push(MeshInstance {
                        shape,
                        material,
                        model,
                    });
                }
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rgb;
    use crate::sim::resources::MaterialKind;

    fn cube_at(pool: &mut ResourcePool, pos: Vec3) -> SceneNode {
        let mat = pool.material(Rgb::WHITE, MaterialKind::Plastic);
        SceneNode::mesh(Shape::Cube, mat, Transform::from_translation(pos))
    }

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let tri = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let t = ray_triangle(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, tri).unwrap();
        assert!((t - 5.0).abs() < 1e-5);
        assert!(ray_triangle(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z, tri).is_none());
        // Pointing away
        assert!(ray_triangle(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, tri).is_none());
    }

    #[test]
    fn test_raycast_picks_nearest() {
        let mut pool = ResourcePool::new();
        let mut scene = SceneGraph::new();
        let far = scene.add(cube_at(&mut pool, Vec3::new(0.0, 0.0, -3.0)));
        let near = scene.add(cube_at(&mut pool, Vec3::new(0.0, 0.0, 0.0)));

        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let hit = scene.raycast(&ray, &pool, |_| true).unwrap();
        assert_eq!(hit.root, near);
        assert!((hit.distance - 9.5).abs() < 1e-4);
        assert!((hit.point.z - 0.5).abs() < 1e-4);

        // Filtering out the near one exposes the far one
        let hit = scene.raycast(&ray, &pool, |id| id != near).unwrap();
        assert_eq!(hit.root, far);
    }

    #[test]
    fn test_raycast_respects_rotation_and_scale() {
        let mut pool = ResourcePool::new();
        let mut scene = SceneGraph::new();
        let mut node = cube_at(&mut pool, Vec3::ZERO);
        node.transform.scale = Vec3::splat(4.0);
        node.transform.rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let id = scene.add(node);

        // Rotated 4m cube reaches ~2.83m along the diagonal axes
        let ray = Ray::new(Vec3::new(0.0, 2.6, 10.0), Vec3::NEG_Z);
        assert_eq!(scene.raycast(&ray, &pool, |_| true).map(|h| h.root), Some(id));
        let ray = Ray::new(Vec3::new(0.0, 3.0, 10.0), Vec3::NEG_Z);
        assert!(scene.raycast(&ray, &pool, |_| true).is_none());
    }

    #[test]
    fn test_raycast_hits_child_of_group() {
        let mut pool = ResourcePool::new();
        let mut scene = SceneGraph::new();
        let mat = pool.material(Rgb::BLACK, MaterialKind::BombCap);
        let group = SceneNode::group(Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)))
            .with_child(SceneNode::mesh(
                Shape::BombBody,
                mat,
                Transform::from_translation(Vec3::new(0.0, 2.0, 0.0)),
            ));
        let root = scene.add(group);
        let child = scene.get(root).unwrap().children[0].id();

        let hit = scene
            .raycast(&Ray::new(Vec3::new(5.0, 2.0, 10.0), Vec3::NEG_Z), &pool, |_| true)
            .unwrap();
        assert_eq!(hit.root, root);
        assert_eq!(hit.node, child);
        // The group origin itself has no mesh
        assert!(scene
            .raycast(&Ray::new(Vec3::new(5.0, 0.0, 10.0), Vec3::NEG_Z), &pool, |_| true)
            .is_none());
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut pool = ResourcePool::new();
        let mut scene = SceneGraph::new();
        let a = scene.add(cube_at(&mut pool, Vec3::ZERO));
        assert_eq!(scene.collect_instances().len(), 1);
        assert!(scene.remove(a).is_some());
        assert!(!scene.contains(a));
        assert!(scene.collect_instances().is_empty());
        assert!(scene.remove(a).is_none());
    }

    #[test]
    fn test_ray_plane_intersection() {
        let ray = Ray::new(Vec3::new(1.0, 2.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(ray.intersect_z_plane(0.0), Some(Vec3::new(1.0, 2.0, 0.0)));
        let parallel = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(parallel.intersect_z_plane(0.0).is_none());
    }
}
