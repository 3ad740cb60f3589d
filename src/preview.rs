//! Preview rendering
//!
//! Composites a single frame at the playhead for display in the GUI.

use std::path::Path;

use log::debug;

use crate::entities::frame::Frame;
use crate::entities::keyer::ColorKeyRange;
use crate::entities::loader_video;

/// Longest preview edge in pixels; larger composites are downscaled.
pub const PREVIEW_MAX_DIM: u32 = 400;

/// Decode the frame at `frame_index`, composite it over `background` and
/// shrink it for display.
///
/// Returns `None` when the frame cannot be read (index past end of
/// stream, corrupt file); the caller keeps showing the previous preview.
pub fn render_preview(
    video_path: &Path,
    background: &Frame,
    keyer: &ColorKeyRange,
    frame_index: usize,
) -> Option<Frame> {
    let frame = match loader_video::decode_frame(video_path, frame_index) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Preview skipped: {}", e);
            return None;
        }
    };
    let composited = keyer.composite(&frame, background, 1.0);
    Some(composited.fit_within(PREVIEW_MAX_DIM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_video_yields_no_preview() {
        let background = Frame::solid(4, 4, [255, 0, 0]);
        let keyer = ColorKeyRange::default();
        assert!(render_preview(Path::new("/nonexistent/clip.mp4"), &background, &keyer, 0).is_none());
    }
}
