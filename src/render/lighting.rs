//! Studio lights that travel with the camera so the side of the garment
//! facing the viewer is always lit.

use bytemuck::{Pod, Zeroable};
use cgmath::Vector3;
use palette::LinSrgb;
use serde::{Deserialize, Serialize};

use crate::processing::color::parse_hex_color;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionalLight {
    pub position: [f32; 3],
    pub intensity: f32,
    /// Linear RGB.
    pub color: [f32; 3],
}

/// GPU-side copy of the rig, laid out for a uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniforms {
    /// xyz = position, w = intensity; key, fill, rim.
    pub lights: [[f32; 4]; 3],
    /// rgb = colour, a unused.
    pub colors: [[f32; 4]; 3],
    /// x = ambient intensity.
    pub ambient: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OffsetLightConfig {
    /// Added to the camera position.
    pub offset: [f32; 3],
    pub intensity: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RimLightConfig {
    /// Scale applied to the negated horizontal camera coordinates.
    pub distance_scale: f32,
    /// Added to the camera height.
    pub height: f32,
    pub intensity: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LightingConfig {
    pub ambient_intensity: f32,
    pub key: OffsetLightConfig,
    pub fill: OffsetLightConfig,
    pub rim: RimLightConfig,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.6,
            key: OffsetLightConfig {
                offset: [0.8, 1.5, 0.0],
                intensity: 1.3,
                color: "#ffffff".into(),
            },
            fill: OffsetLightConfig {
                offset: [-1.2, 0.5, 0.0],
                intensity: 0.5,
                color: "#b0c4de".into(),
            },
            rim: RimLightConfig {
                distance_scale: 0.5,
                height: 1.0,
                intensity: 0.4,
                color: "#ffffff".into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct LightingRig {
    key_offset: Vector3<f32>,
    fill_offset: Vector3<f32>,
    rim_scale: f32,
    rim_height: f32,
    ambient: f32,
    key: DirectionalLight,
    fill: DirectionalLight,
    rim: DirectionalLight,
}

impl LightingRig {
    /// Colours are validated with the configuration; unparsable ones fall back to white.
    pub fn new(cfg: &LightingConfig) -> Self {
        let light = |intensity: f32, color: &str| DirectionalLight {
            position: [0.0; 3],
            intensity,
            color: rgb(color),
        };
        Self {
            key_offset: cfg.key.offset.into(),
            fill_offset: cfg.fill.offset.into(),
            rim_scale: cfg.rim.distance_scale,
            rim_height: cfg.rim.height,
            ambient: cfg.ambient_intensity,
            key: light(cfg.key.intensity, &cfg.key.color),
            fill: light(cfg.fill.intensity, &cfg.fill.color),
            rim: light(cfg.rim.intensity, &cfg.rim.color),
        }
    }

    /// Repositions all three lights for the current camera position.
    pub fn update(&mut self, camera: Vector3<f32>) {
        self.key.position = (camera + self.key_offset).into();
        self.fill.position = (camera + self.fill_offset).into();
        self.rim.position = [
            -camera.x * self.rim_scale,
            camera.y + self.rim_height,
            -camera.z * self.rim_scale,
        ];
    }

    pub fn key(&self) -> &DirectionalLight {
        &self.key
    }

    pub fn fill(&self) -> &DirectionalLight {
        &self.fill
    }

    pub fn rim(&self) -> &DirectionalLight {
        &self.rim
    }

    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    pub fn uniforms(&self) -> LightingUniforms {
        let pack = |l: &DirectionalLight| {
            (
                [l.position[0], l.position[1], l.position[2], l.intensity],
                [l.color[0], l.color[1], l.color[2], 1.0],
            )
        };
        let (k, kc) = pack(&self.key);
        let (f, fc) = pack(&self.fill);
        let (r, rc) = pack(&self.rim);
        LightingUniforms {
            lights: [k, f, r],
            colors: [kc, fc, rc],
            ambient: [self.ambient, 0.0, 0.0, 0.0],
        }
    }
}

fn rgb(hex: &str) -> [f32; 3] {
    parse_hex_color(hex)
        .unwrap_or(LinSrgb::new(1.0, 1.0, 1.0))
        .into_components()
        .into()
}
