//! Video encoding module
//!
//! MP4 muxer with a single encoded video stream and, when the source
//! carries one, a packet-copied audio stream. Prefers libx264 and falls
//! back to the mp4v-family encoder when x264 is not compiled in.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use log::info;

use crate::entities::frame::Frame;
use crate::entities::loader_video::init_ffmpeg_logging;

/// Encoding errors
#[derive(Debug)]
pub enum EncodeError {
    EncoderNotFound,
    OutputCreateFailed(String),
    EncodeFrameFailed(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::EncoderNotFound => write!(f, "no MP4 video encoder available"),
            EncodeError::OutputCreateFailed(msg) => {
                write!(f, "failed to create output file: {}", msg)
            }
            EncodeError::EncodeFrameFailed(msg) => write!(f, "frame encoding failed: {}", msg),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Output mapping for the packet-copied audio stream.
struct AudioCopy {
    out_index: usize,
    out_time_base: ffmpeg::Rational,
}

/// Sequential MP4 writer. Frames must arrive in presentation order;
/// `finish` flushes the encoder and writes the container trailer.
pub struct Mp4Writer {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    encoder_tb: ffmpeg::Rational,
    stream_tb: ffmpeg::Rational,
    video_index: usize,
    audio: Option<AudioCopy>,
    width: u32,
    height: u32,
    pts: i64,
}

/// Encoder preference: libx264, then the mp4v family.
fn find_encoder() -> Result<(ffmpeg::Codec, &'static str), EncodeError> {
    for name in ["libx264", "mpeg4"] {
        if let Some(codec) = ffmpeg::encoder::find_by_name(name) {
            return Ok((codec, name));
        }
    }
    Err(EncodeError::EncoderNotFound)
}

impl Mp4Writer {
    /// Open the destination container and an encoder matching the source
    /// video's dimensions and frame rate. `audio_params` maps the source
    /// audio stream into the output via packet copy.
    pub fn create(
        dest: &Path,
        width: u32,
        height: u32,
        frame_rate: ffmpeg::Rational,
        audio_params: Option<ffmpeg::codec::Parameters>,
    ) -> Result<Self, EncodeError> {
        init_ffmpeg_logging();

        let mut octx = ffmpeg::format::output(&dest)
            .map_err(|e| EncodeError::OutputCreateFailed(e.to_string()))?;

        let (codec, encoder_name) = find_encoder()?;
        info!("Using encoder: {}", encoder_name);

        let frame_rate = if frame_rate.numerator() > 0 && frame_rate.denominator() > 0 {
            frame_rate
        } else {
            ffmpeg::Rational::new(25, 1)
        };
        let encoder_tb =
            ffmpeg::Rational::new(frame_rate.denominator(), frame_rate.numerator());

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| {
                EncodeError::OutputCreateFailed(format!("failed to create encoder: {}", e))
            })?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(ffmpeg::format::Pixel::YUV420P);
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_time_base(encoder_tb);

        // Keyframe interval of ~10 seconds for timeline scrubbing
        let fps_int = (frame_rate.numerator() as f64 / frame_rate.denominator() as f64)
            .round()
            .max(1.0) as i32;
        let gop_size = (fps_int * 10).max(1);
        encoder.set_gop(gop_size as u32);

        let mut opts = ffmpeg::Dictionary::new();
        if encoder_name == "libx264" {
            opts.set("crf", "23");
            opts.set("preset", "medium");
            opts.set("keyint", &gop_size.to_string());
            opts.set("sc_threshold", "0");
        } else {
            // mpeg4 has no CRF mode; pick a bitrate scaled to the frame area
            let bit_rate = (width as usize * height as usize * 8).max(1_000_000);
            encoder.set_bit_rate(bit_rate);
        }

        let encoder = encoder.open_with(opts).map_err(|e| {
            EncodeError::OutputCreateFailed(format!(
                "failed to open encoder '{}': {}",
                encoder_name, e
            ))
        })?;

        let mut ost = octx
            .add_stream(codec)
            .map_err(|e| EncodeError::OutputCreateFailed(format!("failed to add stream: {}", e)))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(encoder_tb);
        let video_index = ost.index();

        // Map the audio stream by copying codec parameters (no re-encode)
        let audio_out_index = match audio_params {
            Some(params) => {
                let mut ast = octx
                    .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                    .map_err(|e| {
                        EncodeError::OutputCreateFailed(format!(
                            "failed to add audio stream: {}",
                            e
                        ))
                    })?;
                ast.set_parameters(params);
                unsafe {
                    (*ast.parameters().as_mut_ptr()).codec_tag = 0;
                }
                Some(ast.index())
            }
            None => None,
        };

        // MP4: move the moov atom to the front for seekability
        let mut container_opts = ffmpeg::Dictionary::new();
        container_opts.set("movflags", "faststart");
        octx.write_header_with(container_opts)
            .map_err(|e| EncodeError::OutputCreateFailed(format!("failed to write header: {}", e)))?;

        // The muxer may adjust stream time bases during write_header
        let stream_tb = octx
            .stream(video_index)
            .map(|s| s.time_base())
            .unwrap_or(encoder_tb);
        let audio = audio_out_index.map(|out_index| AudioCopy {
            out_index,
            out_time_base: octx
                .stream(out_index)
                .map(|s| s.time_base())
                .unwrap_or(encoder_tb),
        });

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| {
            EncodeError::OutputCreateFailed(format!("failed to create swscale context: {}", e))
        })?;

        info!(
            "Encoder initialized: {}x{} @ {}/{} fps, time_base: encoder={:?} stream={:?}",
            width,
            height,
            frame_rate.numerator(),
            frame_rate.denominator(),
            encoder_tb,
            stream_tb
        );

        Ok(Self {
            octx,
            encoder,
            scaler,
            encoder_tb,
            stream_tb,
            video_index,
            audio,
            width,
            height,
            pts: 0,
        })
    }

    pub fn audio_mapped(&self) -> bool {
        self.audio.is_some()
    }

    /// Encode one composited frame and write the resulting packets.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodeError> {
        if frame.resolution() != (self.width, self.height) {
            return Err(EncodeError::EncodeFrameFailed(format!(
                "frame is {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        // Tight RGB24 rows into the (possibly padded) FFmpeg frame
        let mut rgb_frame = ffmpeg::util::frame::video::Video::new(
            ffmpeg::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let dst_stride = rgb_frame.stride(0);
        let src_stride = (self.width * 3) as usize;
        {
            let dst_data = rgb_frame.data_mut(0);
            for y in 0..self.height as usize {
                let src_offset = y * src_stride;
                let dst_offset = y * dst_stride;
                dst_data[dst_offset..dst_offset + src_stride]
                    .copy_from_slice(&frame.data()[src_offset..src_offset + src_stride]);
            }
        }

        let mut yuv_frame = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(&rgb_frame, &mut yuv_frame)
            .map_err(|e| EncodeError::EncodeFrameFailed(format!("RGB24->YUV failed: {}", e)))?;

        yuv_frame.set_pts(Some(self.pts));
        self.pts += 1;

        self.encoder
            .send_frame(&yuv_frame)
            .map_err(|e| EncodeError::EncodeFrameFailed(format!("failed to send frame: {}", e)))?;

        self.drain_packets()
    }

    /// Re-stamp and write one demuxed audio packet.
    pub fn copy_audio_packet(
        &mut self,
        mut packet: ffmpeg::Packet,
        source_tb: ffmpeg::Rational,
    ) -> Result<(), EncodeError> {
        let Some(audio) = &self.audio else {
            return Ok(());
        };
        packet.rescale_ts(source_tb, audio.out_time_base);
        packet.set_position(-1);
        packet.set_stream(audio.out_index);
        packet
            .write_interleaved(&mut self.octx)
            .map_err(|e| EncodeError::EncodeFrameFailed(format!("failed to write audio: {}", e)))
    }

    /// Flush the encoder and finalize the container.
    pub fn finish(&mut self) -> Result<(), EncodeError> {
        self.encoder
            .send_eof()
            .map_err(|e| EncodeError::EncodeFrameFailed(format!("failed to flush encoder: {}", e)))?;
        self.drain_packets()?;

        self.octx
            .write_trailer()
            .map_err(|e| EncodeError::OutputCreateFailed(format!("failed to write trailer: {}", e)))
    }

    fn drain_packets(&mut self) -> Result<(), EncodeError> {
        let mut encoded = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.video_index);
            encoded.rescale_ts(self.encoder_tb, self.stream_tb);

            // Some encoders leave DTS unset
            if encoded.dts().is_none()
                && let Some(pts) = encoded.pts()
            {
                encoded.set_dts(Some(pts));
            }

            encoded
                .write_interleaved(&mut self.octx)
                .map_err(|e| EncodeError::EncodeFrameFailed(format!("failed to write packet: {}", e)))?;
        }
        Ok(())
    }
}
