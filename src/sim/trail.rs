//! Slash trail: recent input positions on the gameplay plane

use std::collections::VecDeque;

use glam::Vec3;

/// Life lost per second (a fresh node lasts a quarter second)
pub const TRAIL_DECAY: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailNode {
    pub position: Vec3,
    /// 1.0 when fresh
    pub life: f32,
}

/// Newest node first, capped at `capacity`
#[derive(Debug, Clone)]
pub struct Trail {
    nodes: VecDeque<TrailNode>,
    capacity: usize,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, position: Vec3) {
        self.nodes.push_front(TrailNode {
            position,
            life: 1.0,
        });
        self.nodes.truncate(self.capacity);
    }

    pub fn update(&mut self, dt: f32) {
        for node in &mut self.nodes {
            node.life -= dt * TRAIL_DECAY;
        }
        self.nodes.retain(|n| n.life > 0.0);
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &TrailNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_drops_oldest() {
        let mut trail = Trail::new(30);
        for i in 0..40 {
            trail.push(Vec3::new(i as f32, 0.0, 0.0));
        }
        assert_eq!(trail.len(), 30);
        let xs: Vec<f32> = trail.nodes().map(|n| n.position.x).collect();
        assert_eq!(xs[0], 39.0);
        assert_eq!(xs[29], 10.0);
    }

    #[test]
    fn test_nodes_expire_faster_than_particles() {
        let mut trail = Trail::new(30);
        trail.push(Vec3::ZERO);
        trail.update(0.1);
        assert_eq!(trail.len(), 1);
        trail.push(Vec3::X);
        trail.update(0.2);
        // First node is past its quarter second, second isn't
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.nodes().next().map(|n| n.position), Some(Vec3::X));
        trail.update(0.1);
        assert!(trail.is_empty());
    }
}
