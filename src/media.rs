//! Media loading facade: video metadata, audio track probing, still images.
//!
//! `load_video` and `load_image` fail hard (the GUI raises a blocking error
//! dialog); `load_audio` is best-effort and returns `None` on any failure,
//! export then proceeds without sound.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use log::{info, warn};

use crate::entities::frame::Frame;
use crate::entities::loader_video::{self, VideoMetadata};

/// Media loading errors
#[derive(Debug)]
pub enum MediaError {
    UnreadableMedia { path: PathBuf, reason: String },
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::UnreadableMedia { path, reason } => {
                write!(f, "could not read {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for MediaError {}

/// Audio stream captured at video-upload time.
///
/// Holds what the export muxer needs to map the stream into the output:
/// the source stream index and its codec.
#[derive(Debug, Clone, Copy)]
pub struct AudioTrack {
    pub stream_index: usize,
    pub codec: ffmpeg::codec::Id,
}

impl AudioTrack {
    /// Whether the codec can be carried into an MP4 container by packet
    /// copy. Anything else is dropped with a warning.
    pub fn is_mp4_compatible(&self) -> bool {
        use ffmpeg::codec::Id;
        matches!(
            self.codec,
            Id::AAC | Id::MP3 | Id::AC3 | Id::EAC3 | Id::ALAC | Id::OPUS | Id::FLAC
        )
    }
}

/// Read frame count, dimensions and frame rate of a video file.
pub fn load_video(path: &Path) -> Result<VideoMetadata, MediaError> {
    let meta = VideoMetadata::from_file(path)?;
    info!(
        "Video loaded: {} ({}x{} @ {:.2} fps, ~{} frames)",
        path.display(),
        meta.width,
        meta.height,
        meta.fps,
        meta.frame_count
    );
    Ok(meta)
}

/// Probe the audio track of a video container.
///
/// Returns `None` when the file has no audio stream or cannot be opened;
/// the caller surfaces a non-fatal warning and continues without audio.
pub fn load_audio(path: &Path) -> Option<AudioTrack> {
    loader_video::init_ffmpeg_logging();

    let ictx = match ffmpeg::format::input(path) {
        Ok(ictx) => ictx,
        Err(e) => {
            warn!("Audio probe failed for {}: {}", path.display(), e);
            return None;
        }
    };

    let stream = ictx.streams().best(ffmpeg::media::Type::Audio)?;
    let track = AudioTrack {
        stream_index: stream.index(),
        codec: stream.parameters().id(),
    };
    info!(
        "Audio track found: stream {} ({:?})",
        track.stream_index, track.codec
    );
    Some(track)
}

/// Decode a still image to an RGB24 frame.
pub fn load_image(path: &Path) -> Result<Frame, MediaError> {
    let image = image::open(path).map_err(|e| MediaError::UnreadableMedia {
        path: path.to_path_buf(),
        reason: format!("failed to decode image: {}", e),
    })?;
    Ok(Frame::from_image(image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("/nonexistent/background.png")).unwrap_err();
        let MediaError::UnreadableMedia { path, .. } = err;
        assert_eq!(path, Path::new("/nonexistent/background.png"));
    }

    #[test]
    fn test_load_audio_missing_file_is_none() {
        assert!(load_audio(Path::new("/nonexistent/clip.mp4")).is_none());
    }

    #[test]
    fn test_media_error_display_mentions_path() {
        let err = MediaError::UnreadableMedia {
            path: PathBuf::from("clip.mp4"),
            reason: "boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("clip.mp4"));
        assert!(msg.contains("boom"));
    }
}
