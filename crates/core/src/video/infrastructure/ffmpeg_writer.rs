use std::path::Path;

use ffmpeg_next::format::Pixel;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Rate used when the metadata carries none (e.g. a still image).
const FALLBACK_FPS: i32 = 30;

/// An open output file with its encoder and RGB to YUV converter.
struct Session {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    input_size: (u32, u32),
    time_base: ffmpeg_next::Rational,
    written: usize,
}

impl Session {
    fn start(path: &Path, metadata: &VideoMetadata) -> Result<Self, Box<dyn std::error::Error>> {
        let (out_w, out_h) = (metadata.width & !1, metadata.height & !1);
        if out_w == 0 || out_h == 0 {
            return Err(format!(
                "cannot encode {}x{} frames",
                metadata.width, metadata.height
            )
            .into());
        }
        let fps = match metadata.fps.round() as i32 {
            fps if fps > 0 => fps,
            _ => FALLBACK_FPS,
        };
        let time_base = ffmpeg_next::Rational(1, fps);

        let mut octx = ffmpeg_next::format::output(path)?;
        let needs_global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG-4 encoder is not available")?;
        let mut stream = octx.add_stream(Some(codec))?;

        let mut config = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        config.set_width(out_w);
        config.set_height(out_h);
        config.set_format(Pixel::YUV420P);
        config.set_time_base(time_base);
        config.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if needs_global_header {
            config.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = config.open_with(ffmpeg_next::Dictionary::new())?;
        stream.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            Pixel::YUV420P,
            out_w,
            out_h,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!("Recording {out_w}x{out_h} @ {fps} fps to {}", path.display());
        Ok(Self {
            octx,
            encoder,
            scaler,
            input_size: (metadata.width, metadata.height),
            time_base,
            written: 0,
        })
    }

    fn encode(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = self.input_size;
        if (frame.width(), frame.height()) != self.input_size {
            return Err(format!(
                "frame size {}x{} does not match recording size {width}x{height}",
                frame.width(),
                frame.height(),
            )
            .into());
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let row_bytes = width as usize * Frame::CHANNELS;
        for (dst, src) in rgb
            .data_mut(0)
            .chunks_mut(stride)
            .zip(frame.data().chunks_exact(row_bytes))
        {
            dst[..row_bytes].copy_from_slice(src);
        }

        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.written as i64));
        self.encoder.send_frame(&yuv)?;
        self.drain()?;
        self.written += 1;
        Ok(())
    }

    /// Moves every packet the encoder has ready into the container.
    fn drain(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stream_time_base = self
            .octx
            .stream(0)
            .ok_or("output stream missing")?
            .time_base();
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.time_base, stream_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<usize, Box<dyn std::error::Error>> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.octx.write_trailer()?;
        Ok(self.written)
    }
}

/// Encodes annotated frames to MPEG-4 through ffmpeg-next.
///
/// The container follows the file extension. YUV 4:2:0 needs even
/// dimensions, so odd-sized frames lose their last row or column.
#[derive(Default)]
pub struct FfmpegWriter {
    session: Option<Session>,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.session = Some(Session::start(path, metadata)?);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.session
            .as_mut()
            .ok_or("recording is not open")?
            .encode(frame)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(session) = self.session.take() {
            let written = session.finish()?;
            log::debug!("Recording closed after {written} frames");
        }
        Ok(())
    }
}
