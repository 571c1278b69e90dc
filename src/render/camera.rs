use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CameraConfig {
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub fov_degrees: f32,
    /// Turntable speed; 1.0 is one revolution per minute.
    pub auto_rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 2.8,
            min_distance: 1.5,
            max_distance: 4.0,
            fov_degrees: 30.0,
            auto_rotate_speed: 0.5,
        }
    }
}

/// Pose handed to the rendering surface each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub fov_degrees: f32,
}

/// Orbit around the garment at the origin. Polar angle is measured from +Y,
/// azimuth from +Z toward +X.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    radius: f32,
    azimuth: f32,
    polar: f32,
    min_distance: f32,
    max_distance: f32,
    min_polar: f32,
    max_polar: f32,
    fov_degrees: f32,
    auto_rotate_speed: f32,
}

impl OrbitCamera {
    pub fn new(cfg: &CameraConfig) -> Self {
        Self {
            radius: cfg.distance.clamp(cfg.min_distance, cfg.max_distance),
            azimuth: 0.0,
            polar: FRAC_PI_2,
            min_distance: cfg.min_distance,
            max_distance: cfg.max_distance,
            min_polar: FRAC_PI_4,
            max_polar: 3.0 * FRAC_PI_4,
            fov_degrees: cfg.fov_degrees,
            auto_rotate_speed: cfg.auto_rotate_speed,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        Vector3::new(
            self.radius * sin_p * sin_a,
            self.radius * cos_p,
            self.radius * sin_p * cos_a,
        )
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position().into(),
            fov_degrees: self.fov_degrees,
        }
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    pub fn orbit(&mut self, d_azimuth: f32, d_polar: f32) {
        self.azimuth = (self.azimuth + d_azimuth).rem_euclid(TAU);
        self.polar = (self.polar + d_polar).clamp(self.min_polar, self.max_polar);
    }

    /// `factor > 1` moves away from the garment.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.radius = (self.radius * factor).clamp(self.min_distance, self.max_distance);
        }
    }

    /// Applies auto-rotation for `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let angle = TAU / 60.0 * self.auto_rotate_speed * dt.max(0.0);
        self.orbit(-angle, 0.0);
    }
}
