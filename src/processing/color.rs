use std::str::FromStr;

use image::RgbaImage;
use palette::{LinSrgb, Srgb};

/// Parses `#rrggbb` (or `rrggbb`) into linear RGB.
pub fn parse_hex_color(input: &str) -> Option<LinSrgb<f32>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let rgb = Srgb::<u8>::from_str(trimmed).ok()?;
    Some(rgb.into_format::<f32>().into_linear())
}

/// Alpha-weighted average colour of the pixels within `band` of the image edge,
/// normalised to 0..1. Returns `None` when the band is fully transparent.
pub fn border_average(img: &RgbaImage, band: u32) -> Option<[f32; 3]> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let band = band.clamp(1, w.min(h).div_ceil(2));
    let mut accum = [0f64; 3];
    let mut total = 0f64;
    for (x, y, pixel) in img.enumerate_pixels() {
        let on_border = x < band || y < band || x >= w - band || y >= h - band;
        if !on_border {
            continue;
        }
        let alpha = (pixel[3] as f64) / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        total += alpha;
        for c in 0..3 {
            accum[c] += (pixel[c] as f64) * alpha;
        }
    }
    if total <= f64::EPSILON {
        return None;
    }
    Some([
        (accum[0] / (255.0 * total)) as f32,
        (accum[1] / (255.0 * total)) as f32,
        (accum[2] / (255.0 * total)) as f32,
    ])
}
