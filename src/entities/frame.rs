//! Decoded raster frame (RGB, 8-bit per channel)
//!
//! Every frame that crosses a module boundary is RGB24: the video decoder
//! scales whatever the codec produced to RGB24, the keyer works on RGB24,
//! and the encoder converts back to the codec's pixel format. Frames are
//! transient: produced, composited, written or displayed, then dropped.

use image::{RgbImage, imageops};

/// Single video frame or still image, tightly packed RGB24.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap a decoded image buffer.
    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from a raw RGB24 buffer.
    ///
    /// Returns `None` when the buffer length does not match
    /// `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self { image })
    }

    /// Solid-color frame (placeholders and tests).
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// (width, height) pair
    pub fn resolution(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Tightly packed RGB24 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Bilinear resize to exact target dimensions.
    pub fn resize_to(&self, width: u32, height: u32) -> Frame {
        if self.resolution() == (width, height) {
            return self.clone();
        }
        Frame {
            image: imageops::resize(&self.image, width, height, imageops::FilterType::Triangle),
        }
    }

    /// Downscale so neither dimension exceeds `max_dim`, keeping aspect.
    /// Frames already within the bound are returned unchanged.
    pub fn fit_within(&self, max_dim: u32) -> Frame {
        let (width, height) = self.resolution();
        let longest = width.max(height);
        if longest <= max_dim {
            return self.clone();
        }
        let ratio = max_dim as f64 / longest as f64;
        let new_w = ((width as f64 * ratio).round() as u32).clamp(1, max_dim);
        let new_h = ((height as f64 * ratio).round() as u32).clamp(1, max_dim);
        self.resize_to(new_w, new_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_checks_length() {
        assert!(Frame::from_rgb(vec![0u8; 2 * 2 * 3], 2, 2).is_some());
        assert!(Frame::from_rgb(vec![0u8; 5], 2, 2).is_none());
    }

    #[test]
    fn test_solid_fill() {
        let f = Frame::solid(3, 2, [10, 20, 30]);
        assert_eq!(f.resolution(), (3, 2));
        for px in f.data().chunks_exact(3) {
            assert_eq!(px, &[10, 20, 30]);
        }
    }

    #[test]
    fn test_resize_to_exact_dims() {
        let f = Frame::solid(320, 240, [200, 0, 0]);
        let r = f.resize_to(640, 480);
        assert_eq!(r.resolution(), (640, 480));
        // Solid color survives interpolation
        assert_eq!(&r.data()[..3], &[200, 0, 0]);
    }

    #[test]
    fn test_fit_within_downscales_long_side() {
        let f = Frame::solid(800, 600, [0, 0, 0]);
        let r = f.fit_within(400);
        assert_eq!(r.resolution(), (400, 300));
    }

    #[test]
    fn test_fit_within_leaves_small_frames() {
        let f = Frame::solid(320, 240, [0, 0, 0]);
        let r = f.fit_within(400);
        assert_eq!(r.resolution(), (320, 240));
    }

    #[test]
    fn test_fit_within_portrait() {
        let f = Frame::solid(300, 900, [0, 0, 0]);
        let r = f.fit_within(400);
        assert_eq!(r.resolution(), (133, 400));
    }
}
