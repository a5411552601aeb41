use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::input_source::{InputSource, SourceError};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Capture backend and device URL for a local webcam.
#[cfg(target_os = "linux")]
fn webcam_device(index: u32) -> (&'static str, String) {
    ("v4l2", format!("/dev/video{index}"))
}

#[cfg(target_os = "macos")]
fn webcam_device(index: u32) -> (&'static str, String) {
    ("avfoundation", index.to_string())
}

#[cfg(target_os = "windows")]
fn webcam_device(index: u32) -> (&'static str, String) {
    ("vfwcap", index.to_string())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn webcam_device(index: u32) -> (&'static str, String) {
    ("video4linux2", format!("/dev/video{index}"))
}

/// libavdevice names some demuxers with aliases, e.g. `video4linux2,v4l2`.
fn backend_matches(format_name: &str, backend: &str) -> bool {
    format_name.split(',').any(|name| name == backend)
}

/// Socket timeout for network cameras, in microseconds. A stalled source
/// then fails its read instead of blocking the run forever.
const STREAM_TIMEOUT_MICROS: &str = "5000000";

/// Demuxer options for a network camera URL.
fn stream_options(url: &str) -> ffmpeg_next::Dictionary<'static> {
    let mut options = ffmpeg_next::Dictionary::new();
    options.set("rw_timeout", STREAM_TIMEOUT_MICROS);
    if url.to_ascii_lowercase().starts_with("rtsp") {
        options.set("rtsp_transport", "tcp");
        options.set("timeout", STREAM_TIMEOUT_MICROS);
    }
    options
}

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec and,
/// for webcams, libavdevice).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
        }
    }

    fn open_input(
        source: &InputSource,
    ) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        match source {
            InputSource::VideoFile(path) => Ok(ffmpeg_next::format::input(path)?),
            InputSource::Webcam(index) => {
                ffmpeg_next::device::register_all();
                let (backend, url) = webcam_device(*index);
                let format = ffmpeg_next::device::input::video()
                    .find(|f| backend_matches(f.name(), backend))
                    .ok_or_else(|| format!("capture backend '{backend}' is not available"))?;
                log::debug!("Opening webcam {url} via {backend}");
                let ctx =
                    ffmpeg_next::format::open_with(&url, &format, ffmpeg_next::Dictionary::new())?;
                Ok(ctx.input())
            }
            InputSource::IpCamera(url) => {
                log::debug!("Opening network stream {url}");
                Ok(ffmpeg_next::format::input_with_dictionary(
                    url,
                    stream_options(url),
                )?)
            }
            InputSource::ImageFile(_) => Err(Box::new(SourceError::Unsupported("image"))),
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, source: &InputSource) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = Self::open_input(source)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = if stream.rate().denominator() != 0 {
            stream.rate()
        } else {
            stream.avg_frame_rate()
        };
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: if source.is_live() {
                0
            } else {
                stream.frames().max(0) as usize
            },
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: source.path().map(Path::to_path_buf),
        };
        log::info!(
            "Opened {} {source}: {}x{} @ {:.1} fps",
            source.kind(),
            metadata.width,
            metadata.height,
            metadata.fps
        );

        self.video_stream_index = video_stream_index;
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        match FfmpegFrameIter::new(ictx, self.video_stream_index) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

/// Where the decoder is in the packet stream.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Draining,
    Done,
}

type Decoded = Result<Frame, Box<dyn std::error::Error>>;

/// Pulls one frame per `next()`: live cameras and long files are never
/// buffered beyond what the decoder itself holds.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    next_index: usize,
    phase: Phase,
}

impl<'a> FfmpegFrameIter<'a> {
    fn new(
        ictx: &'a mut ffmpeg_next::format::context::Input,
        stream_index: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let parameters = ictx
            .stream(stream_index)
            .ok_or("video stream disappeared")?
            .parameters();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)?
            .decoder()
            .video()?;
        let scaler = decoder.converter(ffmpeg_next::format::Pixel::RGB24)?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            next_index: 0,
            phase: Phase::Reading,
        })
    }

    /// Returns the next decoded frame the codec has ready, if any.
    fn receive(&mut self) -> Option<Decoded> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let frame = Frame::new(
            packed_rgb(&rgb),
            rgb.width(),
            rgb.height(),
            self.next_index,
        );
        self.next_index += 1;
        Some(Ok(frame))
    }

    /// Feeds packets until the decoder yields a frame or the input ends.
    fn read_until_frame(&mut self) -> Option<Decoded> {
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(self.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.phase = Phase::Draining;
                    return None;
                }
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                    continue
                }
                Err(e) => {
                    self.phase = Phase::Done;
                    return Some(Err(Box::new(e)));
                }
            }
            if packet.stream() != self.stream_index {
                continue;
            }
            // A corrupt packet only costs its own frame.
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            if let Some(frame) = self.receive() {
                return Some(frame);
            }
        }
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Decoded;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Done {
            return None;
        }
        if let Some(frame) = self.receive() {
            return Some(frame);
        }
        if self.phase == Phase::Reading {
            if let Some(frame) = self.read_until_frame() {
                return Some(frame);
            }
        }
        if self.phase == Phase::Draining {
            if let Some(frame) = self.receive() {
                return Some(frame);
            }
            self.phase = Phase::Done;
        }
        None
    }
}

/// Strips row padding from an RGB24 frame (ffmpeg aligns each row's stride).
fn packed_rgb(rgb: &ffmpeg_next::util::frame::video::Video) -> Vec<u8> {
    let row_bytes = rgb.width() as usize * Frame::CHANNELS;
    rgb.data(0)
        .chunks(rgb.stride(0))
        .take(rgb.height() as usize)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}
