//! Hand-landmark input
//!
//! The landmark detector itself is external. It runs on its own cadence
//! and is sampled at most once per frame; a new sample is recognised by
//! its video timestamp rather than by blocking on the detector.

use glam::Vec2;

use crate::config::GameConfig;
use crate::error::{EngineError, HandTrackingError};
use crate::sim::{FrameInput, InputMode, hand_to_ndc};

/// Landmark index of the index fingertip
pub const INDEX_FINGERTIP: usize = 8;

/// An external hand-landmark detector fed by a camera
pub trait HandLandmarkSource {
    /// Load the model and open the camera
    fn init(&mut self) -> Result<(), HandTrackingError>;

    /// Timestamp of the newest video frame, if any has arrived
    fn video_timestamp(&self) -> Option<f64>;

    /// Landmarks of the first detected hand in normalized image
    /// coordinates (origin top-left), or `None` when no hand is visible
    fn detect(&mut self, timestamp_ms: f64) -> Option<Vec<Vec2>>;

    /// Stop the camera stream
    fn shutdown(&mut self);
}

/// Result of polling the tracker once
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandPoll {
    Disabled,
    /// Same video frame as last poll
    NoNewFrame,
    /// New frame without a hand
    Lost,
    /// Fingertip in NDC
    Sample(Vec2),
}

#[derive(Debug)]
pub struct HandTracker<S> {
    source: S,
    enabled: bool,
    /// Set after a failed init so we don't retry every frame
    failed: bool,
    last_timestamp: Option<f64>,
}

impl<S: HandLandmarkSource> HandTracker<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            enabled: false,
            failed: false,
            last_timestamp: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn enable(&mut self) -> Result<(), EngineError> {
        if self.enabled {
            return Ok(());
        }
        match self.source.init() {
            Ok(()) => {
                self.enabled = true;
                self.failed = false;
                self.last_timestamp = None;
                log::info!("Hand tracking enabled");
                Ok(())
            }
            Err(e) => {
                log::warn!("Hand tracking init failed: {e}");
                self.failed = true;
                Err(e.into())
            }
        }
    }

    pub fn disable(&mut self) {
        if self.enabled {
            self.source.shutdown();
            self.enabled = false;
            self.last_timestamp = None;
            log::info!("Hand tracking disabled");
        }
    }

    /// Follow the host's `use_hand_tracking` flag. An init failure clears
    /// the flag so input falls back to the pointer.
    pub fn sync_with_config(&mut self, config: &mut GameConfig) {
        if config.use_hand_tracking && !self.enabled {
            if self.failed || self.enable().is_err() {
                config.use_hand_tracking = false;
            }
        } else if !config.use_hand_tracking && self.enabled {
            self.disable();
        }
    }

    /// Check for a new video frame and read the fingertip from it
    pub fn poll(&mut self) -> HandPoll {
        if !self.enabled {
            return HandPoll::Disabled;
        }
        let Some(timestamp) = self.source.video_timestamp() else {
            return HandPoll::NoNewFrame;
        };
        if self.last_timestamp == Some(timestamp) {
            return HandPoll::NoNewFrame;
        }
        self.last_timestamp = Some(timestamp);

        match self.source.detect(timestamp) {
            Some(landmarks) => match landmarks.get(INDEX_FINGERTIP) {
                Some(&tip) => HandPoll::Sample(hand_to_ndc(tip)),
                None => HandPoll::Lost,
            },
            None => HandPoll::Lost,
        }
    }

    /// Poll and translate into frame input
    pub fn frame_input(&mut self) -> Option<FrameInput> {
        match self.poll() {
            HandPoll::Sample(ndc) => Some(FrameInput::hand(ndc)),
            HandPoll::Lost => Some(FrameInput::release(InputMode::Hand)),
            HandPoll::Disabled | HandPoll::NoNewFrame => None,
        }
    }
}
