//! Settings for Gesture Tree
//!
//! Loaded from an optional JSON file. Every field has a default so partial
//! files are accepted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing at a settings file
pub const CONFIG_ENV: &str = "GESTURE_TREE_CONFIG";

/// Settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "gesture-tree.json";

/// Errors raised while loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Scene population settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Number of particles forming the tree spiral
    #[serde(rename = "treeParticles")]
    pub tree_particles: usize,
    /// Number of dust particles around the tree
    #[serde(rename = "dustParticles")]
    pub dust_particles: usize,
    /// Fraction of the remaining distance closed per frame
    #[serde(rename = "easingFactor")]
    pub easing_factor: f32,
    /// Fixed RNG seed for reproducible scenes
    #[serde(rename = "seed")]
    pub seed: Option<u64>,
    /// Caption printed on the default photo card
    #[serde(rename = "defaultCaption")]
    pub default_caption: String,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            tree_particles: 1500,
            dust_particles: 2500,
            easing_factor: 0.05,
            seed: None,
            default_caption: "JOYEUX NOEL".to_string(),
        }
    }
}

/// Gesture thresholds (normalized landmark space)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    /// Thumb tip to index tip distance below which the hand is pinching
    #[serde(rename = "pinchThreshold")]
    pub pinch_threshold: f32,
    /// Mean wrist to fingertip distance below which the hand is a fist
    #[serde(rename = "fistThreshold")]
    pub fist_threshold: f32,
    /// Mean wrist to fingertip distance above which the hand is open
    #[serde(rename = "openThreshold")]
    pub open_threshold: f32,
    /// Orientation lerp factor while a hand is visible
    #[serde(rename = "steerFactor")]
    pub steer_factor: f32,
    /// Yaw added per frame while no hand is visible (radians)
    #[serde(rename = "idleSpin")]
    pub idle_spin: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.05,
            fist_threshold: 0.25,
            open_threshold: 0.4,
            steer_factor: 0.1,
            idle_spin: 0.005,
        }
    }
}

/// Webcam and hand tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionSettings {
    /// Disable to run without a webcam
    #[serde(rename = "enabled")]
    pub enabled: bool,
    #[serde(rename = "cameraIndex")]
    pub camera_index: u32,
    #[serde(rename = "captureWidth")]
    pub capture_width: u32,
    #[serde(rename = "captureHeight")]
    pub capture_height: u32,
    /// Directory holding `palm_detection.onnx` and `hand_landmark.onnx`;
    /// searched for when unset
    #[serde(rename = "modelDir")]
    pub model_dir: Option<PathBuf>,
    /// Square input size of the landmark model
    #[serde(rename = "inferenceSize")]
    pub inference_size: u32,
    /// Minimum palm detector score before landmarks are run
    #[serde(rename = "minDetection")]
    pub min_detection: f32,
    /// Minimum hand presence score to report a hand
    #[serde(rename = "minPresence")]
    pub min_presence: f32,
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            camera_index: 0,
            capture_width: 160,
            capture_height: 120,
            model_dir: None,
            inference_size: 224,
            min_detection: 0.5,
            min_presence: 0.5,
        }
    }
}

/// Renderer settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    #[serde(rename = "targetFps")]
    pub target_fps: u32,
    /// Reinhard tone mapping exposure
    #[serde(rename = "exposure")]
    pub exposure: f32,
    #[serde(rename = "bloomStrength")]
    pub bloom_strength: f32,
    #[serde(rename = "bloomRadius")]
    pub bloom_radius: f32,
    /// Luminance above which pixels glow
    #[serde(rename = "bloomThreshold")]
    pub bloom_threshold: f32,
    /// Vertical field of view in degrees
    #[serde(rename = "fovDegrees")]
    pub fov_degrees: f32,
    #[serde(rename = "cameraPosition")]
    pub camera_position: [f32; 3],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            target_fps: 60,
            exposure: 2.2,
            bloom_strength: 0.45,
            bloom_radius: 0.4,
            bloom_threshold: 0.7,
            fov_degrees: 50.0,
            camera_position: [0.0, 2.0, 50.0],
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scene: SceneSettings,
    pub gestures: GestureSettings,
    pub perception: PerceptionSettings,
    pub render: RenderSettings,
}

impl Settings {
    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from a file
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the settings file: explicit path, then `GESTURE_TREE_CONFIG`,
    /// then `gesture-tree.json` in the working directory.
    pub fn locate(explicit: Option<PathBuf>) -> Option<PathBuf> {
        if explicit.is_some() {
            return explicit;
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Load settings, falling back to defaults when no file is found or the
    /// file can't be used.
    pub fn load_or_default(explicit: Option<PathBuf>) -> Self {
        let Some(path) = Self::locate(explicit) else {
            log::info!("No settings file found, using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("{}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
