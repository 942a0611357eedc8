//! Fixed-capacity particle pool with a compacted instance buffer

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

use crate::config::Rgb;
use crate::random_unit_vec3;

/// Warm colors for explosions and fuse sparks
const WARM_PALETTE: [Rgb; 4] = [Rgb(0xff2200), Rgb(0xff6a00), Rgb(0xffaa00), Rgb(0xffee88)];

/// Particles per bomb explosion
const EXPLOSION_COUNT: f32 = 100.0;
/// Particles per shattered target
const SHATTER_COUNT: f32 = 15.0;
/// Particles fall at this fraction of world gravity
const GRAVITY_FACTOR: f32 = 0.5;

/// A single spark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Remaining life in seconds
    pub life: f32,
    /// Initial life, for fading
    pub max_life: f32,
    pub size: f32,
    pub color: [f32; 3],
}

impl Particle {
    /// 1.0 when fresh, 0.0 when dead
    #[inline]
    pub fn fade(&self) -> f32 {
        if self.max_life > 0.0 {
            (self.life / self.max_life).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Per-instance GPU data
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

#[derive(Debug)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    instances: Vec<ParticleInstance>,
    capacity: usize,
    /// Multiplier on burst counts
    burst_scale: f32,
}

impl ParticleSystem {
    pub fn new(capacity: usize, burst_scale: f32) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            instances: Vec::with_capacity(capacity),
            capacity,
            burst_scale,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live particle count (equals the instance count after `update`)
    #[inline]
    pub fn active_count(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Compacted instance data from the last `update`
    pub fn instances(&self) -> &[ParticleInstance] {
        &self.instances
    }

    /// Add a particle, dropping it when the pool is full
    pub fn spawn(&mut self, particle: Particle) -> bool {
        if self.particles.len() >= self.capacity {
            return false;
        }
        self.particles.push(particle);
        true
    }

    /// Age, cull, fall, move, then rebuild the instance buffer
    pub fn update(&mut self, dt: f32, gravity: Vec3) {
        for p in &mut self.particles {
            p.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);

        let pull = gravity * GRAVITY_FACTOR * dt;
        for p in &mut self.particles {
            p.velocity += pull;
            p.position += p.velocity * dt;
        }

        self.instances.clear();
        self.instances.extend(self.particles.iter().map(|p| {
            let fade = p.fade();
            ParticleInstance {
                position: p.position.to_array(),
                size: p.size * (0.5 + 0.5 * fade),
                color: [p.color[0], p.color[1], p.color[2], fade],
            }
        }));
    }

    fn burst_count(&self, base: f32) -> usize {
        (base * self.burst_scale).round().max(1.0) as usize
    }

    /// Bomb explosion: fast warm sparks in every direction
    pub fn emit_explosion<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Vec3) -> usize {
        let count = self.burst_count(EXPLOSION_COUNT);
        let mut emitted = 0;
        for _ in 0..count {
            let life = rng.random_range(0.5..1.0);
            let color = WARM_PALETTE[rng.random_range(0..WARM_PALETTE.len())];
            let spawned = self.spawn(Particle {
                position: origin,
                velocity: random_unit_vec3(rng) * rng.random_range(8.0..20.0),
                life,
                max_life: life,
                size: rng.random_range(0.2..0.5),
                color: color.to_f32(),
            });
            if !spawned {
                break;
            }
            emitted += 1;
        }
        emitted
    }

    /// Target shatter: a puff in the target's own color
    pub fn emit_shatter<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Vec3, color: Rgb) -> usize {
        let count = self.burst_count(SHATTER_COUNT);
        let mut emitted = 0;
        for _ in 0..count {
            let life = rng.random_range(0.5..1.0);
            let spawned = self.spawn(Particle {
                position: origin,
                velocity: random_unit_vec3(rng) * rng.random_range(3.0..10.0),
                life,
                max_life: life,
                size: rng.random_range(0.1..0.3),
                color: color.to_f32(),
            });
            if !spawned {
                break;
            }
            emitted += 1;
        }
        emitted
    }

    /// A few upward sparks from a burning fuse
    pub fn emit_fuse<R: Rng + ?Sized>(&mut self, rng: &mut R, origin: Vec3) -> usize {
        let count = rng.random_range(3..=5);
        let mut emitted = 0;
        for _ in 0..count {
            let life = rng.random_range(0.2..0.4);
            let color = WARM_PALETTE[rng.random_range(1..WARM_PALETTE.len())];
            let spawned = self.spawn(Particle {
                position: origin,
                velocity: Vec3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(1.0..3.0),
                    rng.random_range(-1.0..1.0),
                ),
                life,
                max_life: life,
                size: rng.random_range(0.05..0.15),
                color: color.to_f32(),
            });
            if !spawned {
                break;
            }
            emitted += 1;
        }
        emitted
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 32);
    }

    #[test]
    fn test_burst_sizes() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ps = ParticleSystem::new(1000, 1.0);
        assert_eq!(ps.emit_explosion(&mut rng, Vec3::ZERO), 100);
        assert_eq!(ps.emit_shatter(&mut rng, Vec3::ZERO, Rgb::WHITE), 15);
        let fuse = ps.emit_fuse(&mut rng, Vec3::ZERO);
        assert!((3..=5).contains(&fuse));
        assert_eq!(ps.active_count(), 115 + fuse);

        let mut low = ParticleSystem::new(250, 0.5);
        assert_eq!(low.emit_explosion(&mut rng, Vec3::ZERO), 50);
    }

    #[test]
    fn test_instances_are_compacted() {
        let mut ps = ParticleSystem::new(10, 1.0);
        for life in [0.05, 1.0, 0.05, 1.0] {
            ps.spawn(Particle {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                life,
                max_life: 1.0,
                size: 1.0,
                color: [1.0; 3],
            });
        }
        ps.update(0.1, GRAVITY);
        assert_eq!(ps.active_count(), 2);
        assert_eq!(ps.instances().len(), 2);
        assert!(ps.instances().iter().all(|i| (i.color[3] - 0.9).abs() < 1e-5));
    }

    #[test]
    fn test_half_gravity() {
        let mut ps = ParticleSystem::new(1, 1.0);
        ps.spawn(Particle {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            life: 5.0,
            max_life: 5.0,
            size: 1.0,
            color: [1.0; 3],
        });
        ps.update(1.0, GRAVITY);
        assert!((ps.particles()[0].velocity.y + 4.9).abs() < 1e-5);
    }

    #[test]
    fn test_pool_is_capped() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut ps = ParticleSystem::new(150, 1.0);
        ps.emit_explosion(&mut rng, Vec3::ZERO);
        assert_eq!(ps.emit_explosion(&mut rng, Vec3::ZERO), 50);
        assert_eq!(ps.active_count(), 150);
        assert_eq!(ps.emit_fuse(&mut rng, Vec3::ZERO), 0);
    }

    proptest! {
        #[test]
        fn prop_render_count_matches_survivors(
            seed in any::<u64>(),
            bursts in 1usize..20,
            dt in 0.0f32..0.5,
        ) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut ps = ParticleSystem::new(1000, 1.0);
            for _ in 0..bursts {
                ps.emit_explosion(&mut rng, Vec3::ZERO);
                ps.emit_fuse(&mut rng, Vec3::ONE);
                ps.update(dt, GRAVITY);
                prop_assert!(ps.active_count() <= ps.capacity());
                prop_assert_eq!(ps.instances().len(), ps.active_count());
                prop_assert!(ps.particles().iter().all(|p| p.life > 0.0));
            }
        }
    }
}
