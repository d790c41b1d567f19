//! Editor and export configuration.
//!
//! Configuration can be loaded from a JSON file, overridden from environment
//! variables, or created programmatically. Missing keys take their defaults.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StamperConfig {
    pub editor: EditorConfig,
    pub export: ExportConfig,
}

/// Interaction and default-geometry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Degrees applied by one rotate step
    pub rotation_step_deg: f32,
    /// Minimum box edge during handle resize, in surface pixels
    pub min_resize_px: f32,
    /// Upper bound for a clamped top-left coordinate, in percent
    pub max_position_percent: f32,
    /// Hit radius of a resize handle, in surface pixels
    pub handle_radius_px: f32,
    /// Line-height multiplier for the estimated text box height
    pub line_height: f32,
    /// Length of one em for image dimensions laid out on the surface
    pub em_size: f32,
    pub default_text_width_percent: f32,
    /// Advisory only; text boxes flow to their content
    pub default_text_height_percent: f32,
    pub default_font_size: f32,
    pub default_font_family: String,
    pub default_color: String,
    pub default_image_width: String,
    pub default_image_height: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            rotation_step_deg: 15.0,
            min_resize_px: 20.0,
            max_position_percent: 99.9,
            handle_radius_px: 6.0,
            line_height: 1.2,
            em_size: 12.0,
            default_text_width_percent: 20.0,
            default_text_height_percent: 5.0,
            default_font_size: 12.0,
            default_font_family: "Helvetica".to_string(),
            default_color: "#000000".to_string(),
            default_image_width: "25%".to_string(),
            default_image_height: "15%".to_string(),
        }
    }
}

/// Settings for the export transform and payload resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Line-height multiplier used to estimate a text box height from its font size
    pub line_height: f32,
    /// Length of one em in output units
    pub em_size: f32,
    /// Width used when an image width cannot be parsed, in percent of page width
    pub fallback_width_percent: f32,
    /// Height used when an image height cannot be parsed, in percent of page height
    pub fallback_height_percent: f32,
    /// Timeout for fetching remote image payloads
    pub fetch_timeout_secs: u64,
    /// Average glyph advance relative to font size, for wrapping text runs
    pub glyph_width_ratio: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            line_height: 1.2,
            em_size: 12.0,
            fallback_width_percent: 25.0,
            fallback_height_percent: 15.0,
            fetch_timeout_secs: 30,
            glyph_width_ratio: 0.5,
        }
    }
}

impl StamperConfig {
    /// Loads configuration from a JSON file.
    ///
    /// Expected file format (all keys optional):
    /// ```json
    /// { "editor": { "rotation_step_deg": 15.0 }, "export": { "em_size": 12.0 } }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads defaults overridden by environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overrides values from environment variables.
    ///
    /// Environment variables:
    /// - `STAMPER_ROTATION_STEP_DEG`
    /// - `STAMPER_MIN_RESIZE_PX`
    /// - `STAMPER_LINE_HEIGHT` (applies to both editor and export)
    /// - `STAMPER_EM_SIZE` (applies to both editor and export)
    /// - `STAMPER_FETCH_TIMEOUT_SECS`
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_value::<f32>("STAMPER_ROTATION_STEP_DEG")? {
            self.editor.rotation_step_deg = value;
        }
        if let Some(value) = env_value::<f32>("STAMPER_MIN_RESIZE_PX")? {
            self.editor.min_resize_px = value;
        }
        if let Some(value) = env_value::<f32>("STAMPER_LINE_HEIGHT")? {
            self.editor.line_height = value;
            self.export.line_height = value;
        }
        if let Some(value) = env_value::<f32>("STAMPER_EM_SIZE")? {
            self.editor.em_size = value;
            self.export.em_size = value;
        }
        if let Some(value) = env_value::<u64>("STAMPER_FETCH_TIMEOUT_SECS")? {
            self.export.fetch_timeout_secs = value;
        }
        self.validate()
    }

    /// Sets the rotation step in degrees.
    pub fn with_rotation_step(mut self, degrees: f32) -> Self {
        self.editor.rotation_step_deg = degrees;
        self
    }

    /// Sets the text line-height multiplier for both layout and export.
    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.editor.line_height = line_height;
        self.export.line_height = line_height;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("editor.rotation_step_deg", self.editor.rotation_step_deg),
            ("editor.min_resize_px", self.editor.min_resize_px),
            ("editor.max_position_percent", self.editor.max_position_percent),
            ("editor.line_height", self.editor.line_height),
            ("editor.em_size", self.editor.em_size),
            ("editor.default_font_size", self.editor.default_font_size),
            ("export.line_height", self.export.line_height),
            ("export.em_size", self.export.em_size),
            ("export.glyph_width_ratio", self.export.glyph_width_ratio),
        ];
        for (key, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }
        if self.editor.max_position_percent > 100.0 {
            return Err(ConfigError::InvalidValue(
                "editor.max_position_percent".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_interaction_contract() {
        let config = StamperConfig::default();
        assert_eq!(config.editor.rotation_step_deg, 15.0);
        assert_eq!(config.editor.min_resize_px, 20.0);
        assert_eq!(config.editor.max_position_percent, 99.9);
        assert_eq!(config.export.em_size, 12.0);
        assert_eq!(config.export.fallback_width_percent, 25.0);
        assert_eq!(config.export.fallback_height_percent, 15.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamper.json");
        fs::write(&path, r#"{ "editor": { "rotation_step_deg": 45.0 } }"#).unwrap();

        let config = StamperConfig::from_file(&path).unwrap();
        assert_eq!(config.editor.rotation_step_deg, 45.0);
        assert_eq!(config.editor.min_resize_px, 20.0);
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamper.json");
        fs::write(&path, r#"{ "export": { "line_height": 0 } }"#).unwrap();

        let err = StamperConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "export.line_height"));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamper.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            StamperConfig::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_builder_methods() {
        let config = StamperConfig::default()
            .with_rotation_step(90.0)
            .with_line_height(1.5);
        assert_eq!(config.editor.rotation_step_deg, 90.0);
        assert_eq!(config.editor.line_height, 1.5);
        assert_eq!(config.export.line_height, 1.5);
    }
}
