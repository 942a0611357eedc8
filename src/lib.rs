//! Shard Slash - a 3D slicing arcade game
//!
//! Core modules:
//! - `sim`: Real-time simulation (physics, entities, slashing, effects)
//! - `renderer`: WebGPU instanced rendering pipeline
//! - `platform`: Hand-landmark input and the browser frame loop
//! - `session`: Score/miss/bomb events delivered to the host UI
//! - `config`: Live game config and engine settings

pub mod config;
pub mod error;
pub mod platform;
pub mod renderer;
pub mod session;
pub mod sim;

pub use config::{EngineSettings, GameConfig, QualityPreset, Rgb};
pub use error::{EngineError, HandTrackingError};
pub use session::{Scoreboard, SessionEvent, SessionEvents};
pub use sim::{Engine, FrameInput, InputMode};

/// Game configuration constants
pub mod consts {
    /// Fixed physics substep (60 Hz)
    pub const FIXED_DT: f32 = 1.0 / 60.0;
    /// Maximum physics substeps per frame
    pub const MAX_SUBSTEPS: u32 = 3;
    /// Largest frame delta fed to the simulation, in seconds
    pub const MAX_FRAME_DELTA: f32 = 0.1;

    /// Throw spawn line (below the visible area)
    pub const SPAWN_Y: f32 = -14.0;
    /// Horizontal spawn range (x uniform in ±SPAWN_X_RANGE)
    pub const SPAWN_X_RANGE: f32 = 5.0;
    /// Horizontal apex range (targetX uniform in ±APEX_X_RANGE)
    pub const APEX_X_RANGE: f32 = 3.0;
    /// Apex height range
    pub const APEX_Y_MIN: f32 = 2.0;
    pub const APEX_Y_MAX: f32 = 8.0;
    /// Entities below this height are culled
    pub const CULL_Y: f32 = -20.0;
    /// Smallest gravity magnitude used to solve a throw
    pub const MIN_LAUNCH_GRAVITY: f32 = 0.1;

    /// Chance a throw is a bomb
    pub const BOMB_CHANCE: f64 = 0.15;
    /// Chance a target gets a glass finish
    pub const GLASS_CHANCE: f64 = 0.4;

    /// Points for a regular target
    pub const BASE_POINTS: u32 = 10;
    /// Points for a glass target
    pub const GLASS_POINTS: u32 = 50;

    /// Target visual/collider edge length per unit of `object_size`
    pub const TARGET_BASE_SCALE: f32 = 0.6;
    /// Reference edge length for debris shards
    pub const DEBRIS_REFERENCE_SIZE: f32 = 1.0;
    /// Debris body mass
    pub const DEBRIS_MASS: f32 = 0.5;
    /// Per-axis debris velocity spread
    pub const DEBRIS_SPREAD: f32 = 8.0;

    /// Hit-stop duration after a target hit, in seconds
    pub const HIT_STOP_DURATION: f32 = 0.05;
    /// Time scale applied while hit-stop is active
    pub const HIT_STOP_TIME_SCALE: f32 = 0.1;
    /// Camera shake after a target hit
    pub const SHAKE_TARGET_HIT: f32 = 0.1;
    /// Camera shake after a bomb hit
    pub const SHAKE_BOMB_HIT: f32 = 1.2;
    /// Per-frame shake decay factor
    pub const SHAKE_DECAY: f32 = 0.9;
    /// Shake magnitude below which the camera snaps back to rest
    pub const SHAKE_EPSILON: f32 = 0.01;
    /// Full-frame flash fade time after a bomb hit, in seconds
    pub const FLASH_DURATION: f32 = 0.3;

    /// Default particle pool capacity
    pub const MAX_PARTICLES: usize = 1000;
    /// Default trail node cap
    pub const TRAIL_LENGTH: usize = 30;
}

/// Uniform random vector with each component in [-1, 1)
#[inline]
pub fn random_signed_vec3<R: rand::Rng + ?Sized>(rng: &mut R) -> glam::Vec3 {
    glam::Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    )
}

/// Random unit vector, uniformly distributed on the sphere
pub fn random_unit_vec3<R: rand::Rng + ?Sized>(rng: &mut R) -> glam::Vec3 {
    let z: f32 = rng.random_range(-1.0..1.0);
    let theta: f32 = rng.random_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    glam::Vec3::new(r * theta.cos(), r * theta.sin(), z)
}
