//! Background-removal engines.
//!
//! The job manager treats an engine as a black box that turns an image into a
//! matted RGBA image. [`BorderKeyRemover`] is the built-in engine: it samples
//! the colour along the image border and keys it out with a soft edge, which
//! works well for logos and artwork shot or exported on a flat background.

use image::RgbaImage;

use crate::error::EngineError;
use crate::processing::color::border_average;
use crate::processing::normalize::NormalizedImage;

/// Fraction of the shorter edge sampled as "background" by the border key.
const BORDER_FRACTION: f32 = 0.02;
/// Progress is reported roughly this many times per image.
const PROGRESS_STEPS: u32 = 20;

/// Model/quality profile handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalProfile {
    /// Engine model label, logged with every job.
    pub model: String,
    /// Colour distance (0..1) under which a pixel counts as background.
    pub tolerance: f32,
    /// Width of the soft ramp above `tolerance`.
    pub softness: f32,
}

impl Default for RemovalProfile {
    fn default() -> Self {
        Self {
            model: "border-key".into(),
            tolerance: 0.12,
            softness: 0.08,
        }
    }
}

/// A background-removal engine. Calls are synchronous and may take seconds;
/// the job manager runs them on the blocking pool.
pub trait BackgroundRemover: Send + Sync + 'static {
    /// `progress` receives `(current, total)` pairs; it is informational only.
    fn remove_background(
        &self,
        image: &NormalizedImage,
        profile: &RemovalProfile,
        progress: &dyn Fn(u32, u32),
    ) -> Result<RgbaImage, EngineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BorderKeyRemover;

impl BackgroundRemover for BorderKeyRemover {
    fn remove_background(
        &self,
        image: &NormalizedImage,
        profile: &RemovalProfile,
        progress: &dyn Fn(u32, u32),
    ) -> Result<RgbaImage, EngineError> {
        let src = image.pixels();
        let (w, h) = src.dimensions();
        if w == 0 || h == 0 {
            return Err(EngineError::Failed("image has no pixels".into()));
        }
        let band = ((w.min(h) as f32) * BORDER_FRACTION).round().max(1.0) as u32;
        let Some(background) = border_average(src, band) else {
            // Border already transparent: nothing left to key.
            progress(h, h);
            return Ok(src.clone());
        };

        let lo = profile.tolerance.max(0.0);
        let hi = lo + profile.softness.max(0.0);
        let step = (h / PROGRESS_STEPS).max(1);
        let mut out = src.clone();
        for y in 0..h {
            for x in 0..w {
                let px = out.get_pixel_mut(x, y);
                let dist = color_distance(&px.0, &background);
                let keep = smoothstep(lo, hi, dist);
                px[3] = ((px[3] as f32) * keep).round() as u8;
            }
            if (y + 1) % step == 0 || y + 1 == h {
                progress(y + 1, h);
            }
        }
        Ok(out)
    }
}

fn color_distance(px: &[u8; 4], background: &[f32; 3]) -> f32 {
    let mut sum = 0.0;
    for c in 0..3 {
        let d = (px[c] as f32) / 255.0 - background[c];
        sum += d * d;
    }
    (sum / 3.0).sqrt()
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
