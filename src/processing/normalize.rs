//! Upload normalization: decode any supported raster, bound its size, and
//! re-encode it as PNG so everything downstream sees one canonical format.

use std::io::Cursor;
use std::sync::Arc;

use fast_image_resize as fir;
use image::{ImageFormat, ImageReader, RgbaImage};
use tracing::debug;

use crate::error::DecodeError;
use crate::processing::layout::fit_within;

pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Shared, immutable design image. Identity (`Arc::ptr_eq`) is what the
/// job manager and texture manager compare.
pub type DesignImage = Arc<NormalizedImage>;

#[derive(Debug)]
pub struct NormalizedImage {
    name: String,
    png: Vec<u8>,
    pixels: RgbaImage,
}

impl NormalizedImage {
    /// Wraps already-decoded pixels, producing the canonical PNG encoding.
    pub fn from_rgba(name: impl Into<String>, pixels: RgbaImage) -> Result<Self, DecodeError> {
        let mut png = Vec::new();
        pixels.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(Self {
            name: name.into(),
            png,
            pixels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Canonical PNG bytes.
    pub fn encoded(&self) -> &[u8] {
        &self.png
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_dimension: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl Normalizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn normalize(&self, bytes: &[u8], name: &str) -> Result<NormalizedImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?
            .to_rgba8();
        let (src_w, src_h) = decoded.dimensions();
        let (dst_w, dst_h) = fit_within(src_w, src_h, self.max_dimension);
        let pixels = if (dst_w, dst_h) == (src_w, src_h) {
            decoded
        } else {
            resize_rgba(&decoded, dst_w, dst_h)?
        };
        debug!(
            name,
            src_w, src_h, dst_w, dst_h, "normalized upload"
        );
        NormalizedImage::from_rgba(name, pixels)
    }
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage, DecodeError> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| DecodeError::Resize(err.to_string()))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| DecodeError::Resize(err.to_string()))?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| DecodeError::Resize("resized buffer has wrong length".into()))
}
