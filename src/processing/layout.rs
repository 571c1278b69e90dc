/// Uniformly shrinks `(src_w, src_h)` so the longer edge is at most `max_dim`.
/// Images already within bounds pass through unchanged.
pub fn fit_within(src_w: u32, src_h: u32, max_dim: u32) -> (u32, u32) {
    let longest = src_w.max(src_h);
    if longest <= max_dim || longest == 0 {
        return (src_w, src_h);
    }
    let ratio = max_dim as f64 / longest as f64;
    let w = (src_w as f64 * ratio).round().clamp(1.0, max_dim as f64);
    let h = (src_h as f64 * ratio).round().clamp(1.0, max_dim as f64);
    (w as u32, h as u32)
}

/// Width over height, guarding degenerate sizes.
pub fn aspect_ratio(w: u32, h: u32) -> f64 {
    w.max(1) as f64 / h.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_is_bounded_by_width() {
        assert_eq!(fit_within(2000, 1000, 1024), (1024, 512));
    }

    #[test]
    fn tall_image_is_bounded_by_height() {
        assert_eq!(fit_within(1500, 3000, 1024), (512, 1024));
    }

    #[test]
    fn small_image_passes_through() {
        assert_eq!(fit_within(640, 480, 1024), (640, 480));
        assert_eq!(fit_within(1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn extreme_strip_keeps_one_pixel() {
        assert_eq!(fit_within(10_000, 3, 1024), (1024, 1));
    }

    #[test]
    fn aspect_is_preserved_within_rounding() {
        for &(w, h) in &[(4032, 3024), (1025, 7), (3000, 1999), (1200, 1200)] {
            let (nw, nh) = fit_within(w, h, 1024);
            assert!(nw.max(nh) <= 1024);
            let expected = aspect_ratio(w, h);
            let got = aspect_ratio(nw, nh);
            let tolerance = expected / nh as f64 + 1.0 / nh as f64;
            assert!(
                (expected - got).abs() <= tolerance,
                "{w}x{h} -> {nw}x{nh}: {expected} vs {got}"
            );
        }
    }
}
