use garment_preview::error::DecodeError;
use garment_preview::processing::layout::aspect_ratio;
use garment_preview::processing::normalize::{DEFAULT_MAX_DIMENSION, Normalizer};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn encode(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([90, 140, 30])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

#[test]
fn longest_edge_is_bounded_and_aspect_kept() {
    let normalizer = Normalizer::default();
    for (w, h) in [(2000, 1000), (900, 2700), (1025, 1025), (1600, 37), (640, 480)] {
        let out = normalizer
            .normalize(&encode(w, h, ImageFormat::Png), "design.png")
            .unwrap();
        let (ow, oh) = (out.width(), out.height());
        assert!(ow.max(oh) <= DEFAULT_MAX_DIMENSION, "{w}x{h} -> {ow}x{oh}");

        // One pixel of rounding on the shorter edge is allowed.
        let scale = ow.max(oh) as f64 / w.max(h) as f64;
        let expected_short = w.min(h) as f64 * scale;
        assert!((ow.min(oh) as f64 - expected_short).abs() <= 1.0);
        assert_eq!(ow >= oh, w >= h);
        if w.max(h) <= DEFAULT_MAX_DIMENSION {
            assert_eq!((ow, oh), (w, h));
            assert_eq!(aspect_ratio(ow, oh), aspect_ratio(w, h));
        }
    }
}

#[test]
fn output_is_png_with_original_name() {
    let out = Normalizer::default()
        .normalize(&encode(300, 200, ImageFormat::Jpeg), "photo.jpg")
        .unwrap();
    assert_eq!(out.name(), "photo.jpg");
    assert_eq!(
        image::guess_format(out.encoded()).unwrap(),
        ImageFormat::Png
    );
    let decoded = image::load_from_memory(out.encoded()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (300, 200));
}

#[test]
fn custom_bound_is_honoured() {
    let out = Normalizer::new(256)
        .normalize(&encode(1000, 500, ImageFormat::Png), "wide.png")
        .unwrap();
    assert_eq!((out.width(), out.height()), (256, 128));
}

#[test]
fn undecodable_input_is_rejected() {
    let normalizer = Normalizer::default();
    assert!(matches!(
        normalizer.normalize(&[], "empty.png"),
        Err(DecodeError::Empty)
    ));
    assert!(matches!(
        normalizer.normalize(b"GIF89a-not-really", "broken.gif"),
        Err(DecodeError::Unsupported(_))
    ));
}
