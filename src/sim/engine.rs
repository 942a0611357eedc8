//! Engine: owns the simulation state and drives one frame per display refresh

use glam::{Mat4, Vec2};

use super::particles::ParticleInstance;
use super::resources::ResourcePool;
use super::scene::MeshInstance;
use super::slash::HitOutcome;
use super::state::SimState;
use super::tick::{FrameInput, tick};
use super::trail::Trail;
use crate::config::{EngineSettings, GameConfig};
use crate::consts::FIXED_DT;
use crate::error::EngineError;
use crate::session::{SessionEvents, dispatch};

/// Everything a renderer needs for one frame
#[derive(Debug)]
pub struct FrameView<'a> {
    pub view_proj: Mat4,
    pub meshes: Vec<MeshInstance>,
    pub resources: &'a ResourcePool,
    pub particles: &'a [ParticleInstance],
    pub trail: &'a Trail,
    /// Full-frame flash intensity in [0, 1]
    pub flash: f32,
    pub viewport: Vec2,
}

/// Draws frames. The engine skips rendering entirely while none is attached.
pub trait Renderer {
    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), EngineError>;

    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Give up the drawing surface
    fn release(&mut self) {}
}

/// Renderer that draws nothing, for headless runs
#[derive(Debug, Default, Clone)]
pub struct NullRenderer {
    pub frames: u64,
    pub last_mesh_count: usize,
    pub last_particle_count: usize,
}

impl Renderer for NullRenderer {
    fn render(&mut self, frame: &FrameView<'_>) -> Result<(), EngineError> {
        self.frames += 1;
        self.last_mesh_count = frame.meshes.len();
        self.last_particle_count = frame.particles.len();
        Ok(())
    }
}

/// What happened to a requested frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameStatus {
    /// Simulated and drawn
    Rendered(Option<HitOutcome>),
    /// Simulated but the renderer reported an error
    RenderFailed(Option<HitOutcome>),
    /// No renderer attached or torn down; nothing advanced
    Skipped,
}

pub struct Engine {
    state: SimState,
    renderer: Option<Box<dyn Renderer>>,
    last_frame_ms: Option<f64>,
    torn_down: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("has_renderer", &self.renderer.is_some())
            .field("last_frame_ms", &self.last_frame_ms)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl Engine {
    pub fn new(settings: &EngineSettings, config: &GameConfig) -> Self {
        log::info!(
            "Engine created (seed {:#x}, {} quality, {} particles)",
            settings.seed,
            settings.quality.as_str(),
            settings.max_particles()
        );
        Self {
            state: SimState::new(settings, config),
            renderer: None,
            last_frame_ms: None,
            torn_down: false,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn attach_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
        self.torn_down = false;
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimState {
        &mut self.state
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.state.camera.resize(width as f32, height as f32);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(width, height);
        }
    }

    /// Run one frame at timestamp `now_ms`, then hand queued events to
    /// `listener`
    pub fn frame(
        &mut self,
        now_ms: f64,
        config: &GameConfig,
        input: &FrameInput,
        listener: &mut dyn SessionEvents,
    ) -> FrameStatus {
        if self.torn_down {
            return FrameStatus::Skipped;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return FrameStatus::Skipped;
        };

        let raw_dt = match self.last_frame_ms {
            Some(last) => ((now_ms - last) / 1000.0) as f32,
            None => FIXED_DT,
        };
        self.last_frame_ms = Some(now_ms);

        let outcome = tick(&mut self.state, config, input, raw_dt);
        dispatch(&mut self.state.events, listener);

        let view = FrameView {
            view_proj: self.state.camera.view_projection(),
            meshes: self.state.entities.scene().collect_instances(),
            resources: &self.state.resources,
            particles: self.state.particles.instances(),
            trail: &self.state.trail,
            flash: self.state.flash,
            viewport: self.state.camera.viewport,
        };
        match renderer.render(&view) {
            Ok(()) => FrameStatus::Rendered(outcome),
            Err(e) => {
                log::warn!("Render error: {e}");
                FrameStatus::RenderFailed(outcome)
            }
        }
    }

    /// Empty the scene and reset timers. Score and lives belong to the host.
    pub fn restart(&mut self) {
        self.state.reset();
        self.last_frame_ms = None;
        log::info!("Engine restarted");
    }

    /// Release the renderer and drop all entities. Later frames are skipped
    /// until a renderer is attached again.
    pub fn teardown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release();
        }
        self.state.reset();
        self.last_frame_ms = None;
        self.torn_down = true;
        log::info!("Engine torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
