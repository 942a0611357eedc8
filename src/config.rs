//! Game config and engine settings
//!
//! `GameConfig` is owned by the host UI and handed to the engine as a
//! read-only snapshot every frame. `EngineSettings` is fixed at construction.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_PARTICLES, TRAIL_LENGTH};
use crate::error::EngineError;

/// Packed 0xRRGGBB color, serialized as a `#rrggbb` hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u32);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xffffff);
    pub const BLACK: Rgb = Rgb(0x000000);

    /// Linear-ish RGB components in [0, 1]
    pub fn to_f32(self) -> [f32; 3] {
        [
            ((self.0 >> 16) & 0xff) as f32 / 255.0,
            ((self.0 >> 8) & 0xff) as f32 / 255.0,
            (self.0 & 0xff) as f32 / 255.0,
        ]
    }

    pub fn with_alpha(self, alpha: f32) -> [f32; 4] {
        let [r, g, b] = self.to_f32();
        [r, g, b, alpha]
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return Err(format!("expected #rrggbb, got {s:?}"));
        }
        u32::from_str_radix(hex, 16)
            .map(Rgb)
            .map_err(|e| format!("bad color {s:?}: {e}"))
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        format!("#{:06x}", c.0)
    }
}

/// Neon palette used when the host doesn't supply one
pub const DEFAULT_PALETTE: [Rgb; 6] = [
    Rgb(0xff0055),
    Rgb(0x00ffcc),
    Rgb(0xffcc00),
    Rgb(0x9d4edd),
    Rgb(0x00b4d8),
    Rgb(0xff6d00),
];

/// Live game config, written by the host and read by the engine each frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    /// Vertical gravity (negative = down)
    pub gravity: f32,
    /// Milliseconds between throws
    pub spawn_rate: f32,
    /// Simulation speed multiplier
    pub time_scale: f32,
    /// Target size multiplier
    pub object_size: f32,
    /// Target palette
    pub colors: Vec<Rgb>,
    pub is_playing: bool,
    pub score: u64,
    pub lives: u8,
    pub game_over: bool,
    pub use_hand_tracking: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            gravity: -9.8,
            spawn_rate: 800.0,
            time_scale: 1.0,
            object_size: 2.0,
            colors: DEFAULT_PALETTE.to_vec(),
            is_playing: true,
            score: 0,
            lives: 3,
            game_over: false,
            use_hand_tracking: false,
        }
    }
}

impl GameConfig {
    /// Parse a host-supplied JSON payload. Missing fields take defaults;
    /// numeric ranges are the caller's responsibility.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether throws and hits are live this frame
    #[inline]
    pub fn is_live(&self) -> bool {
        self.is_playing && !self.game_over
    }

    /// Palette to draw target colors from (never empty)
    pub fn palette(&self) -> &[Rgb] {
        if self.colors.is_empty() {
            &DEFAULT_PALETTE
        } else {
            &self.colors
        }
    }
}

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Particle pool capacity for this preset
    pub fn max_particles(&self) -> usize {
        match self {
            QualityPreset::Low => MAX_PARTICLES / 4,
            QualityPreset::Medium => MAX_PARTICLES,
            QualityPreset::High => MAX_PARTICLES * 2,
        }
    }

    /// Multiplier on burst particle counts
    pub fn burst_scale(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium | QualityPreset::High => 1.0,
        }
    }
}

/// Camera placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub fov_y_deg: f32,
    /// Rest position the shake returns to
    pub position: Vec3,
    pub target: Vec3,
    /// Viewport size in pixels
    pub viewport: (f32, f32),
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y_deg: 50.0,
            position: Vec3::new(0.0, 0.0, 20.0),
            target: Vec3::ZERO,
            viewport: (1280.0, 720.0),
        }
    }
}

/// Engine construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// RNG seed for reproducible sessions
    pub seed: u64,
    pub quality: QualityPreset,
    /// Maximum live trail nodes
    pub trail_capacity: usize,
    pub camera: CameraSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            quality: QualityPreset::Medium,
            trail_capacity: TRAIL_LENGTH,
            camera: CameraSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Effective particle capacity
    pub fn max_particles(&self) -> usize {
        self.quality.max_particles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_hex_round_trip() {
        let c = Rgb::try_from("#ff0055".to_string()).unwrap();
        assert_eq!(c, Rgb(0xff0055));
        assert_eq!(String::from(c), "#ff0055");
        assert!(Rgb::try_from("ff00".to_string()).is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let cfg = GameConfig::from_json(
            r##"{"gravity": -4.5, "spawnRate": 500, "colors": ["#112233"], "useHandTracking": true}"##,
        )
        .unwrap();
        assert_eq!(cfg.gravity, -4.5);
        assert_eq!(cfg.spawn_rate, 500.0);
        assert_eq!(cfg.colors, vec![Rgb(0x112233)]);
        assert!(cfg.use_hand_tracking);
        // Unspecified fields fall back to defaults
        assert_eq!(cfg.lives, 3);
        assert_eq!(cfg.object_size, 2.0);
    }

    #[test]
    fn test_config_rejects_bad_json() {
        let err = GameConfig::from_json("{ gravity: nope").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_empty_palette_falls_back() {
        let cfg = GameConfig {
            colors: Vec::new(),
            ..Default::default()
        };
        assert_eq!(cfg.palette().len(), DEFAULT_PALETTE.len());
    }

    #[test]
    fn test_quality_presets() {
        assert_eq!(QualityPreset::Medium.max_particles(), MAX_PARTICLES);
        assert!(QualityPreset::Low.max_particles() < QualityPreset::High.max_particles());
        assert_eq!(QualityPreset::parse("MED"), Some(QualityPreset::Medium));
        assert_eq!(EngineSettings::from_preset(QualityPreset::High).max_particles(), 2000);
    }
}
