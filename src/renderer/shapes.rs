//! CPU-side geometry for the trail ribbon

use glam::{Vec2, Vec3};

use super::vertex::{Vertex, colors};
use crate::sim::TrailNode;

/// Ribbon half-width at the head of the trail
pub const TRAIL_WIDTH: f32 = 0.25;

/// Triangle list for a fading ribbon through the trail nodes (newest
/// first). Width tapers and alpha fades along the ribbon and with each
/// node's remaining life.
pub fn trail_ribbon<'a>(nodes: impl ExactSizeIterator<Item = &'a TrailNode>, width: f32) -> Vec<Vertex> {
    let count = nodes.len();
    if count < 2 {
        return Vec::new();
    }
    let nodes: Vec<&TrailNode> = nodes.collect();
    let mut vertices = Vec::with_capacity((count - 1) * 6);
    let len = count as f32;

    for (i, pair) in nodes.windows(2).enumerate() {
        let (p1, p2) = (pair[0], pair[1]);

        let t1 = i as f32 / len;
        let t2 = (i + 1) as f32 / len;
        let color = |t: f32, life: f32| {
            let [r, g, b] = colors::TRAIL;
            [r, g, b, (1.0 - t) * life.clamp(0.0, 1.0)]
        };
        let c1 = color(t1, p1.life);
        let c2 = color(t2, p2.life);
        let w1 = width * (1.0 - t1 * 0.8);
        let w2 = width * (1.0 - t2 * 0.8);

        // Perpendicular in the gameplay plane
        let dir = (p2.position - p1.position).truncate().normalize_or_zero();
        let perp = Vec2::new(-dir.y, dir.x).extend(0.0);

        let v1a = p1.position + perp * w1;
        let v1b = p1.position - perp * w1;
        let v2a = p2.position + perp * w2;
        let v2b = p2.position - perp * w2;

        let vertex = |p: Vec3, c: [f32; 4]| Vertex::new(p.x, p.y, p.z, c);
        vertices.push(vertex(v1a, c1));
        vertices.push(vertex(v1b, c1));
        vertices.push(vertex(v2a, c2));

        vertices.push(vertex(v2a, c2));
        vertices.push(vertex(v1b, c1));
        vertices.push(vertex(v2b, c2));
    }

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Trail;

    #[test]
    fn test_ribbon_needs_two_nodes() {
        let mut trail = Trail::new(30);
        assert!(trail_ribbon(trail.nodes(), TRAIL_WIDTH).is_empty());
        trail.push(Vec3::ZERO);
        assert!(trail_ribbon(trail.nodes(), TRAIL_WIDTH).is_empty());
        trail.push(Vec3::X);
        trail.push(Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(trail_ribbon(trail.nodes(), TRAIL_WIDTH).len(), 12);
    }

    #[test]
    fn test_ribbon_fades_toward_tail() {
        let mut trail = Trail::new(30);
        for i in 0..5 {
            trail.push(Vec3::new(i as f32, 0.0, 0.0));
        }
        let verts = trail_ribbon(trail.nodes(), TRAIL_WIDTH);
        let head = verts.first().unwrap();
        let tail = verts.last().unwrap();
        assert!(head.color[3] > tail.color[3]);
        // Horizontal segment widens vertically
        assert!((head.position[1].abs() - TRAIL_WIDTH).abs() < 1e-6);
    }
}
