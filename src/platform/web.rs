//! Browser helpers

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

type FrameCallback = Closure<dyn FnMut(f64)>;

/// requestAnimationFrame loop that can be cancelled.
///
/// The callback only holds a weak reference to itself, so dropping the
/// loop frees it. `cancel` must not drop the closure while it is running;
/// it is kept until the loop itself is dropped.
pub struct FrameLoop {
    callback: Rc<RefCell<Option<FrameCallback>>>,
    pending: Rc<Cell<Option<i32>>>,
    stopped: Rc<Cell<bool>>,
}

impl FrameLoop {
    /// Start calling `on_frame` with the rAF timestamp every frame
    pub fn start(mut on_frame: impl FnMut(f64) + 'static) -> Self {
        let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));
        let pending = Rc::new(Cell::new(None));
        let stopped = Rc::new(Cell::new(false));

        let weak = Rc::downgrade(&callback);
        let (frame_pending, frame_stopped) = (pending.clone(), stopped.clone());
        *callback.borrow_mut() = Some(Closure::new(move |time: f64| {
            frame_pending.set(None);
            if frame_stopped.get() {
                return;
            }
            on_frame(time);
            if frame_stopped.get() {
                return;
            }
            if let Some(callback) = weak.upgrade()
                && let Some(closure) = callback.borrow().as_ref()
            {
                frame_pending.set(request_frame(closure));
            }
        }));

        if let Some(closure) = callback.borrow().as_ref() {
            pending.set(request_frame(closure));
        }

        Self {
            callback,
            pending,
            stopped,
        }
    }

    /// Stop scheduling frames and cancel the one already requested
    pub fn cancel(&self) {
        self.stopped.set(true);
        if let Some(id) = self.pending.take()
            && let Some(window) = web_sys::window()
        {
            let _ = window.cancel_animation_frame(id);
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancel();
        self.callback.borrow_mut().take();
    }
}

fn request_frame(closure: &FrameCallback) -> Option<i32> {
    let window = web_sys::window()?;
    match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("requestAnimationFrame failed: {e:?}");
            None
        }
    }
}

/// Canvas backing-store size for the current device pixel ratio
pub fn canvas_pixel_size(canvas: &web_sys::HtmlCanvasElement) -> (u32, u32) {
    let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
    let width = (canvas.client_width() as f64 * dpr) as u32;
    let height = (canvas.client_height() as f64 * dpr) as u32;
    (width.max(1), height.max(1))
}
