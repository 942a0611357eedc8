//! Engine error types
//!
//! Nothing here is fatal to the host: every variant degrades a visual or
//! input feature and the frame loop keeps running.

use thiserror::Error;

/// Failure to bring up the external hand-landmark input
#[derive(Debug, Error)]
pub enum HandTrackingError {
    #[error("hand landmark model failed to load: {0}")]
    ModelLoad(String),
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera available")]
    NoCamera,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// No drawing surface (expected during teardown races)
    #[error("no render surface available")]
    SurfaceUnavailable,
    #[error("render surface lost")]
    SurfaceLost,
    #[error("GPU device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("hand tracking unavailable: {0}")]
    HandTracking(#[from] HandTrackingError),
    #[error("invalid config payload: {0}")]
    Config(#[from] serde_json::Error),
}
