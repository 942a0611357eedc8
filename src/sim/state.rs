//! Simulation state
//!
//! Everything the frame tick mutates lives in one struct, threaded by
//! reference through each subsystem.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::camera::{Camera, CameraShake};
use super::entity::EntityRegistry;
use super::particles::ParticleSystem;
use super::resources::ResourcePool;
use super::slash::{InputMode, SlashResolver};
use super::trail::Trail;
use crate::config::{EngineSettings, GameConfig};
use crate::session::SessionEvent;

/// Complete per-session simulation state
#[derive(Debug)]
pub struct SimState {
    /// Seed the RNG was created from
    pub seed: u64,
    pub rng: Pcg32,
    pub resources: ResourcePool,
    pub entities: EntityRegistry,
    pub particles: ParticleSystem,
    pub trail: Trail,
    pub camera: Camera,
    pub shake: CameraShake,
    pub slash: SlashResolver,
    /// Remaining hit-stop, in unscaled seconds
    pub hit_stop: f32,
    /// Full-frame flash intensity, 1.0 right after a bomb hit
    pub flash: f32,
    /// Milliseconds since the last throw
    pub spawn_timer_ms: f32,
    /// Simulation delta consumed by the last tick
    pub last_sim_dt: f32,
    /// Frames ticked since creation or restart
    pub frame: u64,
    /// Events waiting for the host listener
    pub events: Vec<SessionEvent>,
}

impl SimState {
    pub fn new(settings: &EngineSettings, config: &GameConfig) -> Self {
        Self {
            seed: settings.seed,
            rng: Pcg32::seed_from_u64(settings.seed),
            resources: ResourcePool::new(),
            entities: EntityRegistry::new(config.gravity),
            particles: ParticleSystem::new(settings.max_particles(), settings.quality.burst_scale()),
            trail: Trail::new(settings.trail_capacity),
            camera: Camera::new(&settings.camera),
            shake: CameraShake::default(),
            slash: SlashResolver::new(InputMode::from_config(config)),
            hit_stop: 0.0,
            flash: 0.0,
            spawn_timer_ms: 0.0,
            last_sim_dt: 0.0,
            frame: 0,
            events: Vec::new(),
        }
    }

    /// Back to an empty scene with fresh timers. The RNG keeps its stream
    /// and cached materials survive.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.particles.clear();
        self.trail.clear();
        self.shake.reset(&mut self.camera);
        self.slash.release();
        self.hit_stop = 0.0;
        self.flash = 0.0;
        self.spawn_timer_ms = 0.0;
        self.last_sim_dt = 0.0;
        self.frame = 0;
        self.events.clear();
    }
}
