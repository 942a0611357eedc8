//! Real-time simulation
//!
//! Everything that advances a game session lives here:
//! - Single-threaded, one tick per rendered frame
//! - Seeded RNG only, so sessions replay exactly
//! - Stable iteration order (by id)
//! - No platform dependencies; rendering goes through the `Renderer` trait

pub mod camera;
pub mod engine;
pub mod entity;
pub mod particles;
pub mod physics;
pub mod resources;
pub mod scene;
pub mod slash;
pub mod state;
pub mod tick;
pub mod trail;

pub use camera::{Camera, CameraShake};
pub use engine::{Engine, FrameStatus, FrameView, NullRenderer, Renderer};
pub use entity::{Entity, EntityId, EntityKind, EntityRegistry, solve_launch};
pub use particles::{Particle, ParticleInstance, ParticleSystem};
pub use physics::{BodyHandle, Collider, PhysicsWorld, RigidBody, clamp_frame_delta};
pub use resources::{Material, MaterialHandle, MaterialKind, Mesh, ResourcePool, Shape};
pub use scene::{MeshInstance, NodeId, Ray, RayHit, SceneGraph, SceneNode, Transform};
pub use slash::{HitOutcome, InputMode, SlashResolver, hand_to_ndc, pointer_to_ndc};
pub use state::SimState;
pub use tick::{FrameInput, tick};
pub use trail::{Trail, TrailNode};
