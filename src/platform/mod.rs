//! Platform abstraction layer
//!
//! - `hand`: external hand-landmark input, polled once per frame
//! - `web`: browser frame loop and canvas sizing (wasm only)

pub mod hand;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use hand::{HandLandmarkSource, HandPoll, HandTracker};
