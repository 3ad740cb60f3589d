//! Chroma keyer - fixed-range HSV color key and frame compositing.
//!
//! Pixels of the source frame whose color falls inside the key range are
//! replaced with the background image; everything else passes through.
//!
//! # Algorithm
//!
//! 1. Resize background to the frame's dimensions (bilinear)
//! 2. Convert each frame pixel RGB -> HSV
//! 3. Pixel inside the key range -> background pixel, else frame pixel
//! 4. Blend result with the background using `opacity`
//!    (`out = opacity * combined + (1 - opacity) * background`)

use image::RgbImage;

use crate::entities::frame::Frame;

/// Inclusive HSV band treated as removable background.
///
/// Hue is in degrees (0-360), saturation and value are normalized 0-1.
/// The range is fixed for the process lifetime; `Default` is the classic
/// green screen band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorKeyRange {
    pub hue_min: f32,
    pub hue_max: f32,
    pub sat_min: f32,
    pub sat_max: f32,
    pub val_min: f32,
    pub val_max: f32,
}

impl Default for ColorKeyRange {
    fn default() -> Self {
        // Green band: hue 70..170 degrees, saturation/value at least 50/255.
        Self {
            hue_min: 70.0,
            hue_max: 170.0,
            sat_min: 50.0 / 255.0,
            sat_max: 1.0,
            val_min: 50.0 / 255.0,
            val_max: 1.0,
        }
    }
}

impl ColorKeyRange {
    /// Inclusive membership test in HSV space.
    pub fn contains(&self, h: f32, s: f32, v: f32) -> bool {
        h >= self.hue_min
            && h <= self.hue_max
            && s >= self.sat_min
            && s <= self.sat_max
            && v >= self.val_min
            && v <= self.val_max
    }

    /// Membership test for an 8-bit RGB pixel.
    pub fn matches_rgb(&self, r: u8, g: u8, b: u8) -> bool {
        let (h, s, v) = rgb_to_hsv(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        self.contains(h, s, v)
    }

    /// Composite `frame` over `background`, replacing keyed pixels.
    ///
    /// The background is resized to the frame's dimensions, so the output
    /// always matches the input frame's resolution. `opacity` weighs the
    /// keyed composite against the plain background; every current caller
    /// passes 1.0, the parameter is kept as an extension point.
    pub fn composite(&self, frame: &Frame, background: &Frame, opacity: f32) -> Frame {
        let (width, height) = frame.resolution();
        let background = background.resize_to(width, height);

        let mut out = RgbImage::new(width, height);
        for ((src_px, bg_px), out_px) in frame
            .as_image()
            .pixels()
            .zip(background.as_image().pixels())
            .zip(out.pixels_mut())
        {
            let keyed = self.matches_rgb(src_px[0], src_px[1], src_px[2]);
            let combined = if keyed { bg_px } else { src_px };

            if opacity >= 1.0 {
                *out_px = *combined;
            } else {
                let inv = 1.0 - opacity;
                for c in 0..3 {
                    let blended = combined[c] as f32 * opacity + bg_px[c] as f32 * inv;
                    out_px[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }

        Frame::from_image(out)
    }
}

/// Convert RGB to HSV.
///
/// - R, G, B: 0.0 to 1.0
/// - H: 0 to 360 degrees
/// - S: 0 to 1
/// - V: 0 to 1
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    // Value = max component
    let v = max;

    // Saturation
    let s = if max > 0.0 { delta / max } else { 0.0 };

    // Hue
    let h = if delta.abs() < 0.0001 {
        0.0 // Achromatic (gray)
    } else if (max - r).abs() < 0.0001 {
        // Red is max
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < 0.0001 {
        // Green is max
        60.0 * ((b - r) / delta + 2.0)
    } else {
        // Blue is max
        60.0 * ((r - g) / delta + 4.0)
    };

    // Normalize hue to 0-360
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: [u8; 3] = [0, 255, 0];
    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    #[test]
    fn test_rgb_to_hsv_primaries() {
        let (h, s, v) = rgb_to_hsv(1.0, 0.0, 0.0);
        assert!(h.abs() < 1.0);
        assert!((s - 1.0).abs() < 0.01);
        assert!((v - 1.0).abs() < 0.01);

        let (h, _, _) = rgb_to_hsv(0.0, 1.0, 0.0);
        assert!((h - 120.0).abs() < 1.0);

        let (h, _, _) = rgb_to_hsv(0.0, 0.0, 1.0);
        assert!((h - 240.0).abs() < 1.0);
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let (_, s, _) = rgb_to_hsv(0.5, 0.5, 0.5);
        assert!(s < 0.01);
    }

    #[test]
    fn test_key_range_membership() {
        let key = ColorKeyRange::default();
        assert!(key.matches_rgb(0, 255, 0)); // pure green
        assert!(key.matches_rgb(40, 200, 60)); // dull green
        assert!(!key.matches_rgb(255, 0, 0)); // red
        assert!(!key.matches_rgb(255, 255, 255)); // white (no saturation)
        assert!(!key.matches_rgb(0, 0, 0)); // black (no value)
        assert!(!key.matches_rgb(0, 0, 255)); // blue (hue past the band)
    }

    #[test]
    fn test_key_range_bounds_inclusive() {
        let key = ColorKeyRange::default();
        assert!(key.contains(70.0, 0.5, 0.5));
        assert!(key.contains(170.0, 0.5, 0.5));
        assert!(key.contains(120.0, 50.0 / 255.0, 50.0 / 255.0));
        assert!(key.contains(120.0, 1.0, 1.0));
        assert!(!key.contains(69.9, 0.5, 0.5));
        assert!(!key.contains(170.1, 0.5, 0.5));
        assert!(!key.contains(120.0, 0.1, 0.5));
    }

    #[test]
    fn test_frame_without_key_colors_passes_through() {
        let key = ColorKeyRange::default();
        let frame = Frame::solid(16, 12, BLUE);
        let bg = Frame::solid(16, 12, RED);
        let out = key.composite(&frame, &bg, 1.0);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_fully_keyed_frame_becomes_background() {
        // 640x480 solid green against a smaller solid red background:
        // the background is scaled up and replaces every pixel.
        let key = ColorKeyRange::default();
        let frame = Frame::solid(640, 480, GREEN);
        let bg = Frame::solid(320, 240, RED);
        let out = key.composite(&frame, &bg, 1.0);
        assert_eq!(out.resolution(), (640, 480));
        for px in out.data().chunks_exact(3) {
            assert_eq!(px, &RED);
        }
    }

    #[test]
    fn test_output_dims_follow_frame() {
        let key = ColorKeyRange::default();
        let frame = Frame::solid(64, 48, BLUE);
        let bg = Frame::solid(128, 128, RED);
        assert_eq!(key.composite(&frame, &bg, 1.0).resolution(), (64, 48));
    }

    #[test]
    fn test_composite_is_idempotent_once_keyed() {
        let key = ColorKeyRange::default();
        let frame = Frame::solid(32, 32, GREEN);
        let bg = Frame::solid(32, 32, RED);
        let once = key.composite(&frame, &bg, 1.0);
        let twice = key.composite(&once, &bg, 1.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mixed_frame_keys_only_green_pixels() {
        let key = ColorKeyRange::default();
        let mut img = image::RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb(GREEN));
        img.put_pixel(1, 0, image::Rgb(BLUE));
        let frame = Frame::from_image(img);
        let bg = Frame::solid(2, 1, RED);
        let out = key.composite(&frame, &bg, 1.0);
        assert_eq!(out.as_image().get_pixel(0, 0).0, RED);
        assert_eq!(out.as_image().get_pixel(1, 0).0, BLUE);
    }

    #[test]
    fn test_opacity_zero_returns_background() {
        let key = ColorKeyRange::default();
        let frame = Frame::solid(8, 8, BLUE);
        let bg = Frame::solid(8, 8, RED);
        let out = key.composite(&frame, &bg, 0.0);
        for px in out.data().chunks_exact(3) {
            assert_eq!(px, &RED);
        }
    }

    #[test]
    fn test_opacity_half_blends_midway() {
        let key = ColorKeyRange::default();
        let frame = Frame::solid(4, 4, BLUE);
        let bg = Frame::solid(4, 4, RED);
        let out = key.composite(&frame, &bg, 0.5);
        for px in out.data().chunks_exact(3) {
            assert_eq!(px, &[128, 0, 128]);
        }
    }
}
