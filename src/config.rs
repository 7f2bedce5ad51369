//! Configuration parsing and management for veilfit

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, VeilfitError};
use crate::render::compositor::CompositeMode;
use crate::render::style::{builtin_styles, GarmentStyle};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub camera: CameraConfig,
    pub segmentation: SegmentationConfig,
    pub landmarks: LandmarksConfig,
    pub render: RenderConfig,
    /// Style catalog; replaces the built-in catalog when set
    pub styles: Vec<GarmentStyle>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            camera: CameraConfig::default(),
            segmentation: SegmentationConfig::default(),
            landmarks: LandmarksConfig::default(),
            render: RenderConfig::default(),
            styles: builtin_styles(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VeilfitError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e)))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, VeilfitError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, VeilfitError> {
        // Try config paths in order
        let paths = [
            PathBuf::from("veilfit.toml"),
            PathBuf::from("config/veilfit.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), VeilfitError> {
        if self.session.target_fps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.target_fps".to_string(),
                message: "Target FPS must be greater than 0".to_string(),
            }
            .into());
        }

        if self.session.still_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.still_timeout_ms".to_string(),
                message: "Still-image timeout must be greater than 0".to_string(),
            }
            .into());
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "camera.width/height".to_string(),
                message: "Capture dimensions must be greater than 0".to_string(),
            }
            .into());
        }

        if self.segmentation.input_width == 0 || self.segmentation.input_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "segmentation.input_width/input_height".to_string(),
                message: "Model input dimensions must be greater than 0".to_string(),
            }
            .into());
        }

        if self.landmarks.input_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "landmarks.input_size".to_string(),
                message: "Model input size must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.landmarks.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "landmarks.min_confidence".to_string(),
                message: "Confidence must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.render.mask_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "render.mask_threshold".to_string(),
                message: "Threshold must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.render.texture_alpha) {
            return Err(ConfigError::InvalidValue {
                field: "render.texture_alpha".to_string(),
                message: "Alpha must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.render.drape_darken) {
            return Err(ConfigError::InvalidValue {
                field: "render.drape_darken".to_string(),
                message: "Darken amount must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if self.styles.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "styles".to_string(),
                message: "Style catalog must not be empty".to_string(),
            }
            .into());
        }

        for (i, style) in self.styles.iter().enumerate() {
            if self.styles[..i].iter().any(|other| other.id == style.id) {
                return Err(ConfigError::InvalidValue {
                    field: "styles".to_string(),
                    message: format!("Duplicate style id {}", style.id),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Session scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target processing rate in frames per second
    pub target_fps: u32,
    /// How long a still image may go without a detection before the
    /// session gives up, in milliseconds
    pub still_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            still_timeout_ms: 3000,
        }
    }
}

/// Camera capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index
    pub device_index: u32,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Requested capture rate
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Segmentation model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Path to the selfie segmentation ONNX model
    pub model_path: PathBuf,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Input tensor name
    pub input_name: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/selfie_segmentation.onnx"),
            input_width: 256,
            input_height: 256,
            input_name: "input".to_string(),
        }
    }
}

/// Landmark model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarksConfig {
    /// Path to the refined face-landmark ONNX model
    pub model_path: PathBuf,
    /// Square model input edge length
    pub input_size: u32,
    /// Input tensor name
    pub input_name: String,
    /// Minimum face presence score to accept a detection (0.0 - 1.0)
    pub min_confidence: f32,
}

impl Default for LandmarksConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/face_landmarks.onnx"),
            input_size: 192,
            input_name: "input".to_string(),
            min_confidence: 0.5,
        }
    }
}

/// Compositing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Occlusion mode: "behind_person" or "over_person"
    pub mode: CompositeMode,
    /// Mask confidence at or above which a pixel counts as the person
    pub mask_threshold: f32,
    /// Global alpha of the fabric texture overlay (0.0 - 1.0)
    pub texture_alpha: f32,
    /// Darkening amount for the drape strokes (0.0 - 1.0)
    pub drape_darken: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: CompositeMode::default(),
            mask_threshold: 0.5,
            texture_alpha: 0.3,
            drape_darken: 0.2,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("veilfit");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/veilfit");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/veilfit");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("veilfit");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::style::Color;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.target_fps, 30);
        assert_eq!(config.session.still_timeout_ms, 3000);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.styles.len(), 5);
        assert_eq!(config.render.mode, CompositeMode::BehindPerson);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut bad = Config::default();
        bad.render.mask_threshold = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.session.target_fps = 0;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.styles.clear();
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        let dup = bad.styles[0].clone();
        bad.styles.push(dup);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [session]
            target_fps = 15

            [render]
            mode = "over_person"
            texture_alpha = 0.5

            [segmentation]
            model_path = "weights/seg.onnx"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.session.target_fps, 15);
        assert_eq!(config.render.mode, CompositeMode::OverPerson);
        assert_eq!(config.render.texture_alpha, 0.5);
        assert_eq!(config.segmentation.model_path, PathBuf::from("weights/seg.onnx"));
        // untouched sections keep defaults
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.styles.len(), 5);
    }

    #[test]
    fn test_parse_style_catalog() {
        let toml = r##"
            [[styles]]
            id = "1"
            name = "Night"
            color = "#101320"
            fabric = "jersey"
            texture = "jersey"

            [[styles]]
            id = "2"
            name = "Sand"
            color = "#C2B280"
            fabric = "cotton"
        "##;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.styles.len(), 2);
        assert_eq!(config.styles[0].color, Color::rgb(0x10, 0x13, 0x20));
        assert!(config.styles[1].texture.is_none());
        assert!(config.validate().is_ok());
    }
}
