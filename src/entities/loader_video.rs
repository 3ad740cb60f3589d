//! Video decoder - FFmpeg-based video frame decoding
//!
//! Provides video metadata reading and single-frame decoding with seek
//! (used by the preview). Decoded frames are scaled to RGB24.

use ffmpeg_next as ffmpeg;
use log::warn;
use std::path::Path;
use std::sync::Once;

use crate::entities::frame::Frame;
use crate::media::MediaError;

static FFMPEG_LOG_INIT: Once = Once::new();

pub(crate) fn init_ffmpeg_logging() {
    FFMPEG_LOG_INIT.call_once(|| {
        unsafe {
            // Silence all FFmpeg output including stderr
            // AV_LOG_QUIET = -8
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
        }
    });
}

/// Source video properties captured once at upload time.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoMetadata {
    pub fn from_file(path: &Path) -> Result<Self, MediaError> {
        init_ffmpeg_logging();

        let unreadable = |reason: String| MediaError::UnreadableMedia {
            path: path.to_path_buf(),
            reason,
        };

        let ictx = ffmpeg::format::input(path)
            .map_err(|e| unreadable(format!("failed to open video: {}", e)))?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unreadable("no video stream found".to_string()))?;

        let fps_rational = stream.avg_frame_rate();
        let fps = if fps_rational.denominator() != 0 {
            fps_rational.numerator() as f64 / fps_rational.denominator() as f64
        } else {
            0.0
        };

        // Container frame count when present; estimate from duration otherwise.
        // The estimate can drift, the export loop tolerates early end-of-stream.
        let frame_count = if stream.frames() > 0 {
            stream.frames() as usize
        } else {
            let time_base = stream.time_base();
            let duration = stream.duration();
            if duration > 0 && fps > 0.0 {
                let duration_secs = duration as f64 * time_base.numerator() as f64
                    / time_base.denominator() as f64;
                (duration_secs * fps) as usize
            } else {
                0
            }
        };

        let codec_params = stream.parameters();
        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(codec_params)
            .map_err(|e| unreadable(format!("failed to create decoder context: {}", e)))?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| unreadable(format!("failed to create video decoder: {}", e)))?;

        Ok(VideoMetadata {
            frame_count,
            width: decoder.width(),
            height: decoder.height(),
            fps,
        })
    }
}

/// Copy a scaled RGB24 FFmpeg frame into a tightly packed [`Frame`],
/// dropping any row padding the scaler left in its stride.
pub(crate) fn copy_rgb_frame(
    rgb: &ffmpeg::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Option<Frame> {
    let data = rgb.data(0);
    let stride = rgb.stride(0);
    let row_bytes = (width * 3) as usize;
    let mut output = vec![0u8; row_bytes * height as usize];
    for y in 0..height as usize {
        let src = y * stride;
        let dst = y * row_bytes;
        output[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
    }
    Frame::from_rgb(output, width, height)
}

/// Decode the frame at `frame_num`, seeking to the nearest prior keyframe
/// and decoding forward to the target pts.
pub fn decode_frame(path: &Path, frame_num: usize) -> Result<Frame, MediaError> {
    init_ffmpeg_logging();

    let unreadable = |reason: String| MediaError::UnreadableMedia {
        path: path.to_path_buf(),
        reason,
    };

    let mut ictx = ffmpeg::format::input(path)
        .map_err(|e| unreadable(format!("failed to open video: {}", e)))?;

    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| unreadable("no video stream found".to_string()))?;
    let stream_idx = stream.index();

    let codec_params = stream.parameters();
    let mut decoder_ctx = ffmpeg::codec::context::Context::from_parameters(codec_params)
        .map_err(|e| unreadable(format!("failed to create decoder context: {}", e)))?;

    // Enable multi-threaded frame decoding
    unsafe {
        (*decoder_ctx.as_mut_ptr()).thread_type = ffmpeg::ffi::FF_THREAD_FRAME;
        (*decoder_ctx.as_mut_ptr()).thread_count = 0; // Auto-detect CPU cores
    }

    let mut decoder = decoder_ctx
        .decoder()
        .video()
        .map_err(|e| unreadable(format!("failed to create video decoder: {}", e)))?;

    let width = decoder.width();
    let height = decoder.height();

    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg::format::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| unreadable(format!("failed to create scaler: {}", e)))?;

    let fps = stream.avg_frame_rate();
    let fps_num = fps.numerator();
    let fps_den = fps.denominator();
    let time_base = stream.time_base();
    let target_ts = if fps_num > 0 && fps_den > 0 {
        let frame_tb = ffmpeg::ffi::AVRational {
            num: fps_den,
            den: fps_num,
        };
        let stream_tb = ffmpeg::ffi::AVRational {
            num: time_base.numerator(),
            den: time_base.denominator(),
        };
        Some(unsafe { ffmpeg::ffi::av_rescale_q(frame_num as i64, frame_tb, stream_tb) })
    } else {
        None
    };

    if let Some(target_ts) = target_ts {
        let seek_ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                ictx.as_mut_ptr(),
                stream_idx as i32,
                target_ts,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if seek_ret < 0 {
            warn!(
                "Video seek failed (ret={}), falling back to decode-from-start",
                seek_ret
            );
        }
    }

    let mut current_frame = 0usize;

    for (stream, packet) in ictx.packets() {
        if stream.index() == stream_idx {
            decoder
                .send_packet(&packet)
                .map_err(|e| unreadable(format!("failed to send packet: {}", e)))?;

            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                let reached_target = if let Some(target_ts) = target_ts {
                    decoded
                        .pts()
                        .map(|pts| pts >= target_ts)
                        .unwrap_or(current_frame >= frame_num)
                } else {
                    current_frame >= frame_num
                };

                if reached_target {
                    let mut rgb_frame = ffmpeg::util::frame::video::Video::empty();
                    scaler
                        .run(&decoded, &mut rgb_frame)
                        .map_err(|e| unreadable(format!("failed to scale frame: {}", e)))?;

                    return copy_rgb_frame(&rgb_frame, width, height)
                        .ok_or_else(|| unreadable("scaled frame has wrong size".to_string()));
                }
                current_frame += 1;
            }
        }
    }

    Err(unreadable(format!("frame {} not found in video", frame_num)))
}
