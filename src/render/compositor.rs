//! Garment state and decal placement.

use cgmath::{Euler, Matrix4, Rad, Vector3};
use palette::LinSrgb;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::events::Side;
use crate::processing::color::parse_hex_color;
use crate::render::zones::{PrintLocation, PrintZone};

/// Channel distance at which the damped colour snaps onto its target.
pub const COLOR_EPSILON: f32 = 0.001;
pub const DEFAULT_SMOOTH_TIME: f32 = 0.25;

/// A decal projected onto the garment mesh for one side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecalPlacement {
    pub side: Side,
    pub location: PrintLocation,
    pub zone: PrintZone,
    pub position: [f32; 3],
    /// XYZ Euler angles in radians.
    pub rotation: [f32; 3],
    pub scale: f32,
}

impl DecalPlacement {
    fn for_location(side: Side, location: PrintLocation) -> Option<Self> {
        let zone = *location.zone()?;
        let (position, rotation, scale) = match location {
            PrintLocation::None => return None,
            PrintLocation::LeftChest => ([-0.08, 0.06, 0.13], [0.0, 0.0, 0.0], 0.08),
            PrintLocation::FullFront => ([0.0, 0.02, 0.14], [0.0, 0.0, 0.0], 0.18),
            // Faces the rear surface, so it is turned half way round.
            PrintLocation::FullBack => (
                [0.0, 0.02, -0.12],
                [0.0, std::f32::consts::PI, 0.0],
                0.18,
            ),
        };
        Some(Self {
            side,
            location,
            zone,
            position,
            rotation,
            scale,
        })
    }

    /// Model matrix of the decal's projection box.
    pub fn projector(&self) -> Matrix4<f32> {
        let [px, py, pz] = self.position;
        let [rx, ry, rz] = self.rotation;
        Matrix4::from_translation(Vector3::new(px, py, pz))
            * Matrix4::from(Euler::new(Rad(rx), Rad(ry), Rad(rz)))
            * Matrix4::from_scale(self.scale)
    }

    /// Direction the projector faces (its local +Z axis).
    pub fn facing(&self) -> Vector3<f32> {
        let m = self.projector();
        let z = m.z.truncate();
        z / self.scale
    }
}

/// Critically damped approach toward a target, per channel.
#[derive(Debug, Clone, Copy)]
struct ColorDamper {
    velocity: [f32; 3],
}

impl ColorDamper {
    fn step(&mut self, current: &mut [f32; 3], target: [f32; 3], smooth_time: f32, dt: f32) -> bool {
        let mut moved = false;
        for c in 0..3 {
            moved |= damp(
                &mut current[c],
                &mut self.velocity[c],
                target[c],
                smooth_time,
                dt,
            );
        }
        moved
    }
}

fn damp(current: &mut f32, velocity: &mut f32, target: f32, smooth_time: f32, dt: f32) -> bool {
    if (*current - target).abs() <= COLOR_EPSILON {
        *current = target;
        *velocity = 0.0;
        return false;
    }
    if dt <= 0.0 {
        return false;
    }
    let omega = 2.0 / smooth_time.max(1e-4);
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = *current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = target + (change + temp) * decay;
    // Never overshoot.
    if (target - *current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    *current = output;
    true
}

#[derive(Debug, Clone)]
pub struct GarmentState {
    target_hex: String,
    target: LinSrgb<f32>,
    displayed: [f32; 3],
    damper: ColorDamper,
    smooth_time: f32,
    front_print: PrintLocation,
    back_print: PrintLocation,
    use_same_design: bool,
}

impl GarmentState {
    pub fn new(initial_hex: &str, smooth_time: f32) -> Result<Self, Error> {
        let target = parse_hex_color(initial_hex)
            .ok_or_else(|| Error::InvalidColor(initial_hex.to_owned()))?;
        Ok(Self {
            target_hex: initial_hex.trim().to_owned(),
            target,
            displayed: target.into_components().into(),
            damper: ColorDamper {
                velocity: [0.0; 3],
            },
            smooth_time,
            front_print: PrintLocation::None,
            back_print: PrintLocation::None,
            use_same_design: false,
        })
    }

    pub fn target_hex(&self) -> &str {
        &self.target_hex
    }

    pub fn target_color(&self) -> [f32; 3] {
        self.target.into_components().into()
    }

    /// Linear RGB currently shown on the mesh.
    pub fn displayed_color(&self) -> [f32; 3] {
        self.displayed
    }

    pub fn print(&self, side: Side) -> PrintLocation {
        match side {
            Side::Front => self.front_print,
            Side::Back => self.back_print,
        }
    }

    pub fn use_same_design(&self) -> bool {
        self.use_same_design
    }

    /// Sets the colour the mesh eases toward. The displayed colour is not
    /// touched until the next [`advance`](Self::advance).
    pub fn select_color(&mut self, hex: &str) -> Result<(), Error> {
        let target = parse_hex_color(hex).ok_or_else(|| Error::InvalidColor(hex.to_owned()))?;
        self.target = target;
        self.target_hex = hex.trim().to_owned();
        debug!(color = %self.target_hex, "garment colour selected");
        Ok(())
    }

    /// Choosing any back location turns "same design" off.
    pub fn select_print(&mut self, side: Side, location: PrintLocation) -> Result<(), Error> {
        if !location.allowed_on(side) {
            return Err(Error::InvalidPrintLocation { side, location });
        }
        match side {
            Side::Front => self.front_print = location,
            Side::Back => {
                self.back_print = location;
                self.use_same_design = false;
            }
        }
        Ok(())
    }

    pub fn set_use_same_design(&mut self, enabled: bool) {
        self.use_same_design = enabled;
    }

    /// A fresh upload makes its side visible if nothing was selected yet.
    pub fn note_upload(&mut self, side: Side) {
        match side {
            Side::Front if self.front_print == PrintLocation::None => {
                self.front_print = PrintLocation::LeftChest;
            }
            Side::Back if self.back_print == PrintLocation::None => {
                self.back_print = PrintLocation::FullBack;
            }
            _ => {}
        }
    }

    /// The slot whose image `side` presents. The back aliases the front
    /// while "same design" is on.
    pub fn source_side(&self, side: Side) -> Side {
        if side == Side::Back && self.use_same_design {
            Side::Front
        } else {
            side
        }
    }

    /// Advances the colour animation by `dt` seconds. Returns whether the
    /// displayed colour moved.
    pub fn advance(&mut self, dt: f32) -> bool {
        let target = self.target_color();
        self.damper
            .step(&mut self.displayed, target, self.smooth_time, dt.max(0.0))
    }

    /// Decals for sides with a location selected and a texture available.
    pub fn decals(&self, has_texture: impl Fn(Side) -> bool) -> Vec<DecalPlacement> {
        Side::ALL
            .into_iter()
            .filter(|&side| has_texture(side))
            .filter_map(|side| DecalPlacement::for_location(side, self.print(side)))
            .collect()
    }
}
