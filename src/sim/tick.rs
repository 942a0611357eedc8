//! Per-frame simulation tick
//!
//! Advances one rendered frame: timing, physics, camera shake, spawning,
//! sync/cull, effects, then input.

use glam::{Vec2, Vec3};

use super::physics::clamp_frame_delta;
use super::slash::{HitOutcome, InputMode, process_sample};
use super::state::SimState;
use crate::config::GameConfig;
use crate::consts::*;

/// Input gathered since the last frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Device that produced `sample`
    pub source: InputMode,
    /// Latest sample in NDC, if any arrived
    pub sample: Option<Vec2>,
    /// Pointer lifted or hand lost since the last frame
    pub released: bool,
}

impl FrameInput {
    pub fn pointer(ndc: Vec2) -> Self {
        Self {
            source: InputMode::Pointer,
            sample: Some(ndc),
            released: false,
        }
    }

    pub fn hand(ndc: Vec2) -> Self {
        Self {
            source: InputMode::Hand,
            sample: Some(ndc),
            released: false,
        }
    }

    pub fn release(source: InputMode) -> Self {
        Self {
            source,
            sample: None,
            released: true,
        }
    }
}

/// Simulation delta for this frame, plus the hit-stop countdown
fn frame_delta(state: &mut SimState, config: &GameConfig, clamped: f32) -> f32 {
    let mut dt = clamped * config.time_scale.max(0.0);
    if state.hit_stop > 0.0 {
        // Countdown runs in real time
        state.hit_stop = (state.hit_stop - clamped).max(0.0);
        dt *= HIT_STOP_TIME_SCALE;
    }
    dt
}

/// Advance the simulation by one frame of `raw_dt` seconds
pub fn tick(
    state: &mut SimState,
    config: &GameConfig,
    input: &FrameInput,
    raw_dt: f32,
) -> Option<HitOutcome> {
    let clamped = clamp_frame_delta(raw_dt);

    // Stale baseline and trail never carry over a mode switch
    if state.slash.set_mode(InputMode::from_config(config)) {
        state.trail.clear();
    }

    let dt = frame_delta(state, config, clamped);
    state.last_sim_dt = dt;
    state.frame += 1;

    // Physics
    state.entities.set_gravity(config.gravity);
    state.entities.step_physics(dt);

    state.shake.apply(&mut state.camera, &mut state.rng);

    // Spawning
    if config.is_live() {
        state.spawn_timer_ms += dt * 1000.0;
        if state.spawn_timer_ms > config.spawn_rate {
            state
                .entities
                .spawn_thrown(&mut state.rng, config, &mut state.resources);
            state.spawn_timer_ms = 0.0;
        }
    }

    state.entities.sync();
    state.entities.cull(config, &mut state.events);

    // Effects
    let fuses: Vec<Vec3> = state.entities.fuse_points().collect();
    for fuse in fuses {
        state.particles.emit_fuse(&mut state.rng, fuse);
    }
    state
        .particles
        .update(dt, Vec3::new(0.0, config.gravity, 0.0));
    state.trail.update(clamped);
    state.flash = (state.flash - clamped / FLASH_DURATION).max(0.0);

    // Input
    let mode = state.slash.mode();
    if input.source != mode {
        return None;
    }
    if input.released {
        state.slash.release();
    }
    let ndc = input.sample?;
    process_sample(state, config, ndc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::sim::entity::EntityKind;
    use proptest::prelude::*;

    fn setup(config: &GameConfig) -> SimState {
        SimState::new(&EngineSettings::default(), config)
    }

    #[test]
    fn test_spawn_cadence() {
        let config = GameConfig {
            spawn_rate: 850.0,
            ..Default::default()
        };
        let mut state = setup(&config);
        for _ in 0..8 {
            tick(&mut state, &config, &FrameInput::default(), 0.1);
        }
        assert!(state.entities.is_empty());
        tick(&mut state, &config, &FrameInput::default(), 0.1);
        assert_eq!(state.entities.len(), 1);
        assert_eq!(state.spawn_timer_ms, 0.0);
    }

    #[test]
    fn test_no_spawns_when_not_live() {
        let mut config = GameConfig {
            spawn_rate: 10.0,
            is_playing: false,
            ..Default::default()
        };
        let mut state = setup(&config);
        for _ in 0..20 {
            tick(&mut state, &config, &FrameInput::default(), 0.05);
        }
        config.is_playing = true;
        config.game_over = true;
        for _ in 0..20 {
            tick(&mut state, &config, &FrameInput::default(), 0.05);
        }
        assert!(state.entities.is_empty());
        assert_eq!(state.spawn_timer_ms, 0.0);
    }

    #[test]
    fn test_hit_stop_slows_time() {
        let config = GameConfig::default();
        let mut state = setup(&config);
        state.hit_stop = HIT_STOP_DURATION;
        tick(&mut state, &config, &FrameInput::default(), 0.02);
        assert!((state.last_sim_dt - 0.002).abs() < 1e-6);
        assert!((state.hit_stop - 0.03).abs() < 1e-6);

        tick(&mut state, &config, &FrameInput::default(), 0.04);
        assert_eq!(state.hit_stop, 0.0);
        tick(&mut state, &config, &FrameInput::default(), 0.02);
        assert!((state.last_sim_dt - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_time_scale() {
        let config = GameConfig {
            time_scale: 0.5,
            ..Default::default()
        };
        let mut state = setup(&config);
        tick(&mut state, &config, &FrameInput::default(), 0.05);
        assert!((state.last_sim_dt - 0.025).abs() < 1e-6);
    }

    #[test]
    fn test_flash_fades() {
        let config = GameConfig::default();
        let mut state = setup(&config);
        state.flash = 1.0;
        tick(&mut state, &config, &FrameInput::default(), 0.1);
        assert!(state.flash > 0.0 && state.flash < 1.0);
        for _ in 0..3 {
            tick(&mut state, &config, &FrameInput::default(), 0.1);
        }
        assert_eq!(state.flash, 0.0);
    }

    #[test]
    fn test_fuse_sparks_follow_bombs() {
        let config = GameConfig {
            is_playing: false,
            ..Default::default()
        };
        let mut state = setup(&config);
        state.entities.spawn_bomb(
            &config,
            &mut state.resources,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
        );
        tick(&mut state, &config, &FrameInput::default(), 1.0 / 60.0);
        let sparks = state.particles.active_count();
        assert!((3..=5).contains(&sparks), "{sparks} sparks");
    }

    #[test]
    fn test_mode_toggle_clears_trail_and_baseline() {
        let mut config = GameConfig::default();
        let mut state = setup(&config);
        tick(&mut state, &config, &FrameInput::pointer(Vec2::ZERO), 0.016);
        assert_eq!(state.trail.len(), 1);
        assert!(state.slash.has_baseline());

        config.use_hand_tracking = true;
        // Stale pointer sample from the previous mode is ignored
        tick(&mut state, &config, &FrameInput::pointer(Vec2::ZERO), 0.016);
        assert!(state.trail.is_empty());
        assert!(!state.slash.has_baseline());

        tick(&mut state, &config, &FrameInput::hand(Vec2::ZERO), 0.016);
        assert_eq!(state.trail.len(), 1);
        assert_eq!(state.slash.mode(), InputMode::Hand);
    }

    #[test]
    fn test_release_requires_new_baseline() {
        let config = GameConfig::default();
        let mut state = setup(&config);
        let target = state.entities.spawn_target(
            &config,
            &mut state.resources,
            crate::sim::resources::Shape::Cube,
            crate::config::Rgb::WHITE,
            false,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
        );
        tick(&mut state, &config, &FrameInput::pointer(Vec2::new(0.5, 0.5)), 0.0);
        tick(&mut state, &config, &FrameInput::release(InputMode::Pointer), 0.0);
        // First touch after lifting only sets the baseline
        assert!(tick(&mut state, &config, &FrameInput::pointer(Vec2::ZERO), 0.0).is_none());
        assert!(state.entities.get(target).is_some());
        assert!(tick(&mut state, &config, &FrameInput::pointer(Vec2::ZERO), 0.0).is_some());
        assert_eq!(state.entities.count(EntityKind::Target), 0);
    }

    proptest! {
        #[test]
        fn prop_sim_delta_clamped(raw in 0.0f32..10.0) {
            let config = GameConfig::default();
            let mut state = setup(&config);
            tick(&mut state, &config, &FrameInput::default(), raw);
            prop_assert!(state.last_sim_dt <= MAX_FRAME_DELTA);
            if raw > MAX_FRAME_DELTA {
                prop_assert_eq!(state.last_sim_dt, MAX_FRAME_DELTA);
            }
        }
    }
}
