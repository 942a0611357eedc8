//! Shard Slash entry point
//!
//! Handles platform-specific initialization and runs the frame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, MouseEvent, TouchEvent};

    use shard_slash::platform::web::{FrameLoop, canvas_pixel_size};
    use shard_slash::renderer::GpuRenderer;
    use shard_slash::sim::{FrameInput, InputMode, pointer_to_ndc};
    use shard_slash::{Engine, EngineSettings, GameConfig, Scoreboard, SessionEvents};

    /// Game instance holding all state
    struct Game {
        engine: Engine,
        settings: EngineSettings,
        board: Scoreboard,
        /// Latest input event, consumed by the next frame
        pending: FrameInput,
        canvas: HtmlCanvasElement,
        popups: Vec<(u32, Vec2)>,
    }

    /// Forwards events to the scoreboard and queues score popups
    struct HudEvents<'a> {
        board: &'a mut Scoreboard,
        popups: &'a mut Vec<(u32, Vec2)>,
    }

    impl SessionEvents for HudEvents<'_> {
        fn on_score(&mut self, points: u32, screen_pos: Vec2) {
            self.board.on_score(points, screen_pos);
            self.popups.push((points, screen_pos));
        }

        fn on_miss(&mut self) {
            self.board.on_miss();
        }

        fn on_bomb(&mut self) {
            self.board.on_bomb();
        }
    }

    impl Game {
        fn new(config: GameConfig, canvas: HtmlCanvasElement) -> Self {
            let seed = js_sys::Date::now() as u64;
            let (width, height) = canvas_pixel_size(&canvas);
            let mut settings = EngineSettings::default().with_seed(seed);
            settings.camera.viewport = (width as f32, height as f32);
            log::info!("Game initialized with seed: {}", seed);
            Self {
                engine: Engine::new(&settings, &config),
                settings,
                board: Scoreboard::new(config),
                pending: FrameInput::default(),
                canvas,
                popups: Vec::new(),
            }
        }

        fn pointer_sample(&mut self, client_x: f32, client_y: f32) {
            let rect = self.canvas.get_bounding_client_rect();
            let ndc = pointer_to_ndc(
                Vec2::new(client_x, client_y),
                Vec2::new(rect.left() as f32, rect.top() as f32),
                Vec2::new(rect.width() as f32, rect.height() as f32),
            );
            self.pending = FrameInput::pointer(ndc);
        }

        fn frame(&mut self, time: f64) {
            let input = std::mem::take(&mut self.pending);
            let config = self.board.config.clone();
            let mut events = HudEvents {
                board: &mut self.board,
                popups: &mut self.popups,
            };
            self.engine.frame(time, &config, &input, &mut events);
        }

        fn restart(&mut self) {
            self.board.restart();
            self.engine.restart();
            self.pending = FrameInput::release(InputMode::Pointer);
            self.popups.clear();
        }

        fn resize(&mut self) {
            let (width, height) = canvas_pixel_size(&self.canvas);
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            self.engine.resize(width, height);
        }

        /// Update HUD elements in DOM
        fn update_hud(&mut self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let config = &self.board.config;

            if let Some(el) = document.query_selector("#hud-score .hud-value").ok().flatten() {
                el.set_text_content(Some(&config.score.to_string()));
            }
            if let Some(el) = document.query_selector("#hud-lives .hud-value").ok().flatten() {
                el.set_text_content(Some(&config.lives.to_string()));
            }
            if let Some(el) = document.get_element_by_id("game-over") {
                let class = if config.game_over { "" } else { "hidden" };
                let _ = el.set_attribute("class", class);
            }

            // Only the latest popup is shown
            if let Some((points, pos)) = self.popups.drain(..).last()
                && let Some(el) = document.get_element_by_id("score-popup")
            {
                el.set_text_content(Some(&format!("+{points}")));
                let _ = el.set_attribute(
                    "style",
                    &format!("left: {:.0}px; top: {:.0}px", pos.x, pos.y),
                );
                let _ = el.set_attribute("class", "pop");
            }
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::error_1(&format!("Logger init failed: {e}").into());
        }

        log::info!("Shard Slash starting...");

        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            log::error!("No document");
            return;
        };
        let Some(canvas) = document
            .get_element_by_id("canvas")
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        else {
            log::error!("No canvas element");
            return;
        };

        // Host-supplied config is optional
        let config = match canvas.get_attribute("data-config") {
            Some(json) => GameConfig::from_json(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring config: {e}");
                GameConfig::default()
            }),
            None => GameConfig::default(),
        };

        let (width, height) = canvas_pixel_size(&canvas);
        canvas.set_width(width);
        canvas.set_height(height);

        let game = Rc::new(RefCell::new(Game::new(config, canvas.clone())));

        // Initialize WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });
        match instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone())) {
            Ok(surface) => {
                let adapter = instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: Some(&surface),
                        force_fallback_adapter: false,
                    })
                    .await;
                match adapter {
                    Ok(adapter) => {
                        log::info!("Using adapter: {:?}", adapter.get_info().name);
                        let renderer = {
                            let g = game.borrow();
                            GpuRenderer::new(
                                surface,
                                &adapter,
                                width,
                                height,
                                &g.engine.state().resources,
                                &g.settings,
                            )
                            .await
                        };
                        match renderer {
                            Ok(renderer) => {
                                game.borrow_mut().engine.attach_renderer(Box::new(renderer))
                            }
                            Err(e) => log::error!("Renderer init failed: {e}"),
                        }
                    }
                    Err(e) => log::error!("No GPU adapter: {e}"),
                }
            }
            Err(e) => log::error!("Failed to create surface: {e}"),
        }

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        setup_input_handlers(&canvas, game.clone());
        setup_restart_button(game.clone());
        setup_resize(game.clone());

        // Start frame loop
        let frame_game = game.clone();
        let frame_loop = Rc::new(FrameLoop::start(move |time| {
            let mut g = frame_game.borrow_mut();
            g.frame(time);
            g.update_hud();
        }));

        setup_teardown(game, frame_loop);

        log::info!("Shard Slash running!");
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        // Pointer movement is a slash
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                game.borrow_mut()
                    .pointer_sample(event.client_x() as f32, event.client_y() as f32);
            });
            let _ = canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Leaving the surface ends the gesture
        for name in ["mouseleave", "mouseup"] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().pending = FrameInput::release(InputMode::Pointer);
            });
            let _ =
                canvas.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch
        for name in ["touchstart", "touchmove"] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                if let Some(touch) = event.touches().get(0) {
                    game.borrow_mut()
                        .pointer_sample(touch.client_x() as f32, touch.client_y() as f32);
                }
            });
            let _ =
                canvas.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: TouchEvent| {
                game.borrow_mut().pending = FrameInput::release(InputMode::Pointer);
            });
            let _ = canvas
                .add_event_listener_with_callback("touchend", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_restart_button(game: Rc<RefCell<Game>>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        if let Some(btn) = document.get_element_by_id("restart-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().restart();
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            game.borrow_mut().resize();
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Cancel the pending frame and release the GPU when the page goes away
    fn setup_teardown(game: Rc<RefCell<Game>>, frame_loop: Rc<FrameLoop>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            frame_loop.cancel();
            game.borrow_mut().engine.teardown();
        });
        let _ =
            window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Shard Slash (native) starting...");
    log::info!("Native mode runs a headless session - run with `trunk serve` for the web version");

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0x5eed);
    headless::run(seed, 60 * 60);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Scripted session: pointer sweeps for the first half, then a replayed
/// hand for the rest
#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use glam::Vec2;

    use shard_slash::consts::FIXED_DT;
    use shard_slash::error::HandTrackingError;
    use shard_slash::platform::{HandLandmarkSource, HandTracker};
    use shard_slash::sim::{FrameStatus, HitOutcome, NullRenderer};
    use shard_slash::{Engine, EngineSettings, FrameInput, GameConfig, Scoreboard};

    /// Fingertip moving on a figure-eight, one video frame every other tick
    struct ReplayedHand {
        frame: u32,
    }

    impl HandLandmarkSource for ReplayedHand {
        fn init(&mut self) -> Result<(), HandTrackingError> {
            Ok(())
        }

        fn video_timestamp(&self) -> Option<f64> {
            Some(f64::from(self.frame / 2) * 33.3)
        }

        fn detect(&mut self, timestamp_ms: f64) -> Option<Vec<Vec2>> {
            let t = (timestamp_ms / 1000.0) as f32;
            let tip = Vec2::new(0.5 + 0.4 * (t * 2.0).sin(), 0.5 + 0.3 * (t * 4.0).sin());
            Some(vec![tip; 21])
        }

        fn shutdown(&mut self) {}
    }

    /// Pointer sweeping left and right across the middle of the screen
    fn pointer_at(frame: u32) -> Vec2 {
        let t = frame as f32 * FIXED_DT;
        Vec2::new((t * 3.0).sin() * 0.9, (t * 1.3).cos() * 0.5)
    }

    pub fn run(seed: u64, frames: u32) {
        let settings = EngineSettings::default().with_seed(seed);
        let mut board = Scoreboard::new(GameConfig::default());
        let mut engine = Engine::new(&settings, &board.config)
            .with_renderer(Box::new(NullRenderer::default()));
        let mut hand = HandTracker::new(ReplayedHand { frame: 0 });

        let (mut bombs, mut targets, mut glass) = (0u32, 0u32, 0u32);
        for frame in 0..frames {
            if frame == frames / 2 {
                board.config.use_hand_tracking = true;
            }
            hand.sync_with_config(&mut board.config);

            let input = if board.config.use_hand_tracking {
                hand.frame_input().unwrap_or_default()
            } else {
                FrameInput::pointer(pointer_at(frame))
            };

            let now_ms = f64::from(frame) * f64::from(FIXED_DT) * 1000.0;
            let config = board.config.clone();
            match engine.frame(now_ms, &config, &input, &mut board) {
                FrameStatus::Rendered(Some(HitOutcome::Bomb { .. })) => bombs += 1,
                FrameStatus::Rendered(Some(HitOutcome::Target { glass: g, .. })) => {
                    targets += 1;
                    glass += u32::from(g);
                }
                FrameStatus::Skipped => log::warn!("Frame {frame} skipped"),
                _ => {}
            }
            hand.source_mut().frame += 1;

            if board.config.game_over {
                log::info!("Game over on frame {frame}");
                break;
            }
        }

        engine.teardown();
        hand.disable();

        println!(
            "seed {seed}: score {} | lives {} | targets {targets} ({glass} glass) | bombs {bombs} | misses {}",
            board.config.score, board.config.lives, board.misses
        );
    }
}
