//! Export pipeline
//!
//! Runs the full composite-and-encode pass over the source video: decode
//! each frame in order, key it against the background, encode to the
//! destination MP4 and carry the source audio stream alongside. The job is
//! driven cooperatively: the GUI calls [`ExportJob::step`] between redraws,
//! headless callers use [`ExportJob::run`] with a progress callback.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use log::{info, warn};

use crate::encode::{EncodeError, Mp4Writer};
use crate::entities::frame::Frame;
use crate::entities::keyer::ColorKeyRange;
use crate::entities::loader_video::{copy_rgb_frame, init_ffmpeg_logging};
use crate::media::MediaError;
use crate::session::SessionState;

/// Export failures
#[derive(Debug)]
pub enum ExportError {
    /// Export requested before both inputs were supplied
    MissingInput,
    Media(MediaError),
    Encode(EncodeError),
    Decode(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::MissingInput => {
                write!(f, "export needs both a video and a background image")
            }
            ExportError::Media(e) => write!(f, "{}", e),
            ExportError::Encode(e) => write!(f, "{}", e),
            ExportError::Decode(msg) => write!(f, "video decoding failed: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<MediaError> for ExportError {
    fn from(e: MediaError) -> Self {
        ExportError::Media(e)
    }
}

impl From<EncodeError> for ExportError {
    fn from(e: EncodeError) -> Self {
        ExportError::Encode(e)
    }
}

/// Completed fraction in 0..=1. An unknown total (0) reads as no
/// progress rather than dividing by zero.
pub fn progress_fraction(frames_done: usize, frames_total: usize) -> f32 {
    if frames_total == 0 {
        0.0
    } else {
        (frames_done as f32 / frames_total as f32).min(1.0)
    }
}

/// Result of a single cooperative step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One more frame was composited and written
    Wrote,
    /// The pass is complete and the container is finalized
    Finished,
}

/// One running export: `Idle -> Exporting -> {Done, Failed}`.
///
/// Constructing the job is the `Idle -> Exporting` transition (it fails
/// with [`ExportError::MissingInput`] while inputs are incomplete and
/// leaves the session untouched). A job that returned
/// [`StepOutcome::Finished`] is `Done`; a job whose `step` errored is
/// `Failed` and the partially written destination stays on disk.
pub struct ExportJob {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    writer: Mp4Writer,
    background: Frame,
    keyer: ColorKeyRange,
    video_stream: usize,
    /// (source stream index, source time base) of the mapped audio
    audio_stream: Option<(usize, ffmpeg::Rational)>,
    width: u32,
    height: u32,
    frames_total: usize,
    frames_done: usize,
    dest: PathBuf,
    draining: bool,
    finished: bool,
}

impl ExportJob {
    /// Validate the session and open decoder and encoder for a full pass.
    pub fn start(
        session: &SessionState,
        keyer: ColorKeyRange,
        dest: PathBuf,
    ) -> Result<Self, ExportError> {
        let (Some(video_path), Some(background)) = (&session.video_path, &session.background)
        else {
            return Err(ExportError::MissingInput);
        };
        let meta = session.video.as_ref().ok_or(ExportError::MissingInput)?;

        init_ffmpeg_logging();

        let unreadable = |reason: String| {
            ExportError::Media(MediaError::UnreadableMedia {
                path: video_path.clone(),
                reason,
            })
        };

        let ictx = ffmpeg::format::input(video_path)
            .map_err(|e| unreadable(format!("failed to open video: {}", e)))?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unreadable("no video stream found".to_string()))?;
        let video_stream = stream.index();
        let frame_rate = stream.avg_frame_rate();

        let mut decoder_ctx =
            ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| unreadable(format!("failed to create decoder context: {}", e)))?;
        unsafe {
            (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
            (*decoder_ctx.as_mut_ptr()).thread_count = 0;
        }
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| unreadable(format!("failed to create video decoder: {}", e)))?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| unreadable(format!("failed to create scaler: {}", e)))?;

        // Audio rides along as a packet copy when the codec fits MP4
        let mut audio_stream = None;
        let mut audio_params = None;
        if let Some(track) = &session.audio {
            if track.is_mp4_compatible() {
                if let Some(ast) = ictx.stream(track.stream_index) {
                    audio_stream = Some((ast.index(), ast.time_base()));
                    audio_params = Some(ast.parameters());
                }
            } else {
                warn!(
                    "Audio codec {:?} cannot be carried into MP4, exporting without audio",
                    track.codec
                );
            }
        }

        let writer = Mp4Writer::create(&dest, width, height, frame_rate, audio_params)?;

        info!(
            "Export started: {} frames to {} (audio: {})",
            meta.frame_count,
            dest.display(),
            if writer.audio_mapped() { "yes" } else { "no" }
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            writer,
            background: background.clone(),
            keyer,
            video_stream,
            audio_stream,
            width,
            height,
            frames_total: meta.frame_count,
            frames_done: 0,
            dest,
            draining: false,
            finished: false,
        })
    }

    /// (frames_done, frames_total)
    pub fn progress(&self) -> (usize, usize) {
        (self.frames_done, self.frames_total)
    }

    /// Completed fraction in 0..=1 for the progress bar.
    pub fn fraction(&self) -> f32 {
        progress_fraction(self.frames_done, self.frames_total)
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance by one composited frame (or finalize the container).
    ///
    /// Demuxed audio packets encountered on the way are copied through
    /// immediately, so output interleaving follows the source.
    pub fn step(&mut self) -> Result<StepOutcome, ExportError> {
        if self.finished {
            return Ok(StepOutcome::Finished);
        }
        if self.frames_total > 0 && self.frames_done >= self.frames_total {
            return self.finalize();
        }

        loop {
            // Drain the decoder before feeding more packets
            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.write_composited(&decoded);
            }

            if self.draining {
                // Decoder exhausted before frame_count: normal when the
                // container's frame count was an estimate
                if self.frames_done < self.frames_total {
                    info!(
                        "End of stream after {}/{} frames",
                        self.frames_done, self.frames_total
                    );
                }
                return self.finalize();
            }

            let next = self
                .ictx
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));

            match next {
                Some((index, packet)) if index == self.video_stream => {
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| ExportError::Decode(format!("failed to send packet: {}", e)))?;
                }
                Some((index, packet)) => {
                    if let Some((audio_index, audio_tb)) = self.audio_stream
                        && index == audio_index
                    {
                        self.writer.copy_audio_packet(packet, audio_tb)?;
                    }
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| ExportError::Decode(format!("failed to flush decoder: {}", e)))?;
                    self.draining = true;
                }
            }
        }
    }

    /// Drive the job to completion, reporting `(frames_done, frames_total)`
    /// after every written frame.
    pub fn run(mut self, mut progress: impl FnMut(usize, usize)) -> Result<PathBuf, ExportError> {
        loop {
            match self.step()? {
                StepOutcome::Wrote => progress(self.frames_done, self.frames_total),
                StepOutcome::Finished => {
                    progress(self.frames_done, self.frames_total);
                    return Ok(self.dest);
                }
            }
        }
    }

    fn write_composited(
        &mut self,
        decoded: &ffmpeg::util::frame::video::Video,
    ) -> Result<StepOutcome, ExportError> {
        let mut rgb_frame = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| ExportError::Decode(format!("failed to scale frame: {}", e)))?;
        let frame = copy_rgb_frame(&rgb_frame, self.width, self.height)
            .ok_or_else(|| ExportError::Decode("scaled frame has wrong size".to_string()))?;

        let composited = self.keyer.composite(&frame, &self.background, 1.0);
        self.writer.write_frame(&composited)?;
        self.frames_done += 1;
        Ok(StepOutcome::Wrote)
    }

    fn finalize(&mut self) -> Result<StepOutcome, ExportError> {
        self.writer.finish()?;
        self.finished = true;
        info!(
            "Export complete: {} frames written to {}",
            self.frames_done,
            self.dest.display()
        );
        Ok(StepOutcome::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::loader_video::VideoMetadata;

    fn meta() -> VideoMetadata {
        VideoMetadata {
            frame_count: 10,
            width: 640,
            height: 480,
            fps: 25.0,
        }
    }

    #[test]
    fn test_start_without_inputs_is_missing_input() {
        let session = SessionState::new();
        let err = ExportJob::start(
            &session,
            ColorKeyRange::default(),
            PathBuf::from("/tmp/out.mp4"),
        )
        .err();
        assert!(matches!(err, Some(ExportError::MissingInput)));
        // Session untouched
        assert!(session.video_path.is_none());
        assert!(session.background.is_none());
    }

    #[test]
    fn test_start_with_only_video_is_missing_input() {
        let mut session = SessionState::new();
        session.set_video(PathBuf::from("clip.mp4"), meta(), None);
        let err = ExportJob::start(
            &session,
            ColorKeyRange::default(),
            PathBuf::from("/tmp/out.mp4"),
        )
        .err();
        assert!(matches!(err, Some(ExportError::MissingInput)));
        assert_eq!(
            session.video_path.as_deref(),
            Some(Path::new("clip.mp4"))
        );
    }

    #[test]
    fn test_start_with_only_background_is_missing_input() {
        let mut session = SessionState::new();
        session.set_background(PathBuf::from("bg.png"), Frame::solid(2, 2, [0, 0, 0]));
        let err = ExportJob::start(
            &session,
            ColorKeyRange::default(),
            PathBuf::from("/tmp/out.mp4"),
        )
        .err();
        assert!(matches!(err, Some(ExportError::MissingInput)));
    }

    #[test]
    fn test_missing_input_message() {
        let msg = ExportError::MissingInput.to_string();
        assert!(msg.contains("video"));
        assert!(msg.contains("background"));
    }

    #[test]
    fn test_progress_fraction_is_monotonic_and_caps_at_one() {
        let total = 10;
        let mut last = 0.0;
        for done in 1..=total {
            let f = progress_fraction(done, total);
            assert!(f >= last);
            last = f;
        }
        assert_eq!(progress_fraction(total, total), 1.0);
        assert_eq!(progress_fraction(total + 5, total), 1.0);
    }

    #[test]
    fn test_progress_fraction_with_unknown_total() {
        assert_eq!(progress_fraction(3, 0), 0.0);
    }
}
