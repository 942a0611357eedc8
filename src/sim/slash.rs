//! Input sampling and slash hit resolution
//!
//! Pointer and hand samples are normalized to NDC and fed through the same
//! resolver, one sample per frame at most.

use glam::{Vec2, Vec3};
use rand::Rng;

use super::entity::{EntityId, EntityKind};
use super::resources::MaterialKind;
use super::scene::RayHit;
use super::state::SimState;
use crate::config::GameConfig;
use crate::consts::*;
use crate::session::SessionEvent;

/// Which device drives the slash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputMode {
    #[default]
    Pointer,
    Hand,
}

impl InputMode {
    pub fn from_config(config: &GameConfig) -> Self {
        if config.use_hand_tracking {
            InputMode::Hand
        } else {
            InputMode::Pointer
        }
    }
}

/// Client-space pointer position to NDC given the canvas rect
pub fn pointer_to_ndc(client: Vec2, rect_origin: Vec2, rect_size: Vec2) -> Vec2 {
    let size = rect_size.max(Vec2::ONE);
    let uv = (client - rect_origin) / size;
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

/// Normalized image coordinates (origin top-left) to NDC, mirrored
/// horizontally for a front-facing camera
pub fn hand_to_ndc(landmark: Vec2) -> Vec2 {
    Vec2::new(1.0 - landmark.x * 2.0, 1.0 - landmark.y * 2.0)
}

/// What a confirmed hit did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    Bomb { entity: EntityId, position: Vec3 },
    Target { entity: EntityId, points: u32, glass: bool },
}

/// Gesture baseline for the active input mode
#[derive(Debug, Clone, Default)]
pub struct SlashResolver {
    mode: InputMode,
    last_sample: Option<Vec2>,
}

impl SlashResolver {
    pub fn new(mode: InputMode) -> Self {
        Self {
            mode,
            last_sample: None,
        }
    }

    #[inline]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switch modes, dropping the baseline. Returns whether the mode changed.
    pub fn set_mode(&mut self, mode: InputMode) -> bool {
        if self.mode == mode {
            return false;
        }
        log::debug!("Input mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.last_sample = None;
        true
    }

    /// Pointer left the surface or the hand was lost
    pub fn release(&mut self) {
        self.last_sample = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.last_sample.is_some()
    }

    /// Record a sample, returning whether a baseline already existed
    fn advance(&mut self, ndc: Vec2) -> bool {
        self.last_sample.replace(ndc).is_some()
    }
}

/// Feed one NDC sample: extend the trail, then hit-test once a baseline
/// exists and the game is live
pub fn process_sample(state: &mut SimState, config: &GameConfig, ndc: Vec2) -> Option<HitOutcome> {
    if let Some(point) = state.camera.point_on_z_plane(ndc) {
        state.trail.push(point);
    }
    if !state.slash.advance(ndc) || !config.is_live() {
        return None;
    }

    let ray = state.camera.ray_from_ndc(ndc);
    let (entity, hit) = state.entities.raycast(&ray, &state.resources)?;
    apply_hit(state, entity, &hit)
}

/// Shatter a struck entity and queue its consequences. Inert if the entity
/// is already gone.
pub fn apply_hit(state: &mut SimState, id: EntityId, hit: &RayHit) -> Option<HitOutcome> {
    let entity = state.entities.shatter(id)?;
    let position = entity.position();

    match entity.kind() {
        EntityKind::Bomb => {
            state.events.push(SessionEvent::Bomb);
            state.flash = 1.0;
            state.shake.kick(SHAKE_BOMB_HIT);
            state.particles.emit_explosion(&mut state.rng, position);
            log::debug!("Bomb hit at {position}");
            Some(HitOutcome::Bomb {
                entity: id,
                position,
            })
        }
        EntityKind::Target => {
            let glass = state.resources.get_material(hit.material).key.kind == MaterialKind::Glass;
            let points = if glass { GLASS_POINTS } else { BASE_POINTS };
            let screen_pos = state.camera.project_to_screen(position);
            state.events.push(SessionEvent::Score { points, screen_pos });

            state.hit_stop = HIT_STOP_DURATION;
            state.shake.kick(SHAKE_TARGET_HIT);

            let shards = state.rng.random_range(4..=6);
            for _ in 0..shards {
                state
                    .entities
                    .spawn_debris(&mut state.rng, &mut state.resources, &entity);
            }
            state
                .particles
                .emit_shatter(&mut state.rng, position, entity.color());
            log::debug!(
                "{:?} target hit for {points} ({shards} shards)",
                entity.shape()
            );
            Some(HitOutcome::Target {
                entity: id,
                points,
                glass,
            })
        }
        // Debris is filtered out of hit tests
        EntityKind::Debris => None,
    }
}
