use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::error::Error;
use crate::matting::RemovalProfile;
use crate::processing::color::parse_hex_color;
use crate::processing::normalize::DEFAULT_MAX_DIMENSION;
use crate::render::camera::CameraConfig;
use crate::render::compositor::DEFAULT_SMOOTH_TIME;
use crate::render::lighting::LightingConfig;
use crate::render::texture::TextureSettings;
use crate::tasks::removal::RemovalSettings;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BackgroundRemovalConfig {
    /// Engine model label.
    pub model: String,
    /// Colour distance (0..1) treated as background.
    pub tolerance: f32,
    /// Soft ramp above `tolerance`.
    pub softness: f32,
    /// Optional limit after which a job is reported as failed.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for BackgroundRemovalConfig {
    fn default() -> Self {
        let profile = RemovalProfile::default();
        Self {
            model: profile.model,
            tolerance: profile.tolerance,
            softness: profile.softness,
            timeout: None,
        }
    }
}

impl BackgroundRemovalConfig {
    pub fn settings(&self) -> RemovalSettings {
        RemovalSettings {
            profile: RemovalProfile {
                model: self.model.clone(),
                tolerance: self.tolerance,
                softness: self.softness,
            },
            timeout: self.timeout,
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.model.trim().is_empty(),
            "background-removal.model must not be empty"
        );
        ensure!(
            (0.0..=1.0).contains(&self.tolerance),
            "background-removal.tolerance must be within 0..=1"
        );
        ensure!(
            self.softness.is_finite() && self.softness >= 0.0,
            "background-removal.softness must be non-negative"
        );
        if let Some(timeout) = self.timeout {
            ensure!(
                !timeout.is_zero(),
                "background-removal.timeout must be positive when set"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TextureConfig {
    pub max_anisotropy: u16,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            max_anisotropy: TextureSettings::default().max_anisotropy,
        }
    }
}

impl TextureConfig {
    pub fn settings(&self) -> TextureSettings {
        TextureSettings {
            max_anisotropy: self.max_anisotropy,
            ..TextureSettings::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Longest edge, in pixels, an upload is scaled down to.
    pub max_dimension: u32,
    /// Garment colour shown before the user picks one.
    pub initial_color: String,
    /// Seconds the base colour takes to settle after a change.
    pub color_smooth_time: f32,
    pub background_removal: BackgroundRemovalConfig,
    pub texture: TextureConfig,
    pub lighting: LightingConfig,
    pub camera: CameraConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            initial_color: "#f5f5f5".into(),
            color_smooth_time: DEFAULT_SMOOTH_TIME,
            background_removal: BackgroundRemovalConfig::default(),
            texture: TextureConfig::default(),
            lighting: LightingConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml_str(&s)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(self.max_dimension > 0, "max-dimension must be greater than zero");
        ensure!(
            parse_hex_color(&self.initial_color).is_some(),
            "initial-color must be a #rrggbb hex colour"
        );
        ensure!(
            self.color_smooth_time.is_finite() && self.color_smooth_time > 0.0,
            "color-smooth-time must be positive"
        );
        self.background_removal
            .validate()
            .context("invalid background-removal configuration")?;
        ensure!(
            (1..=16).contains(&self.texture.max_anisotropy),
            "texture.max-anisotropy must be within 1..=16"
        );
        for (name, color) in [
            ("key", &self.lighting.key.color),
            ("fill", &self.lighting.fill.color),
            ("rim", &self.lighting.rim.color),
        ] {
            ensure!(
                parse_hex_color(color).is_some(),
                "lighting.{name}.color must be a #rrggbb hex colour"
            );
        }
        ensure!(
            self.lighting.ambient_intensity >= 0.0,
            "lighting.ambient-intensity must be non-negative"
        );
        let cam = &self.camera;
        ensure!(
            cam.min_distance > 0.0 && cam.min_distance <= cam.max_distance,
            "camera.min-distance must be positive and not exceed camera.max-distance"
        );
        ensure!(
            cam.fov_degrees > 0.0 && cam.fov_degrees < 180.0,
            "camera.fov-degrees must be within (0, 180)"
        );
        Ok(self)
    }
}
