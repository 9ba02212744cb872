//! FFmpeg-backed media engine.
//!
//! [`FfmpegEngine`] implements [`MediaEngine`] with the `ffmpeg-next`
//! bindings. Source bytes are staged into a private temporary directory (the
//! engine's input namespace) so the demuxer can read them as a file; the
//! directory is removed when the decoder or trim that created it finishes.
//!
//! FFmpeg has its own console logging, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade. [`FfmpegOptions`] sets its
//! verbosity when the engine initialises.

use std::fs;
use std::path::PathBuf;

use ffmpeg_next::{
    Rational,
    codec::{Id, context::Context as CodecContext},
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::{DynamicImage, RgbImage};
use tempfile::TempDir;

use crate::{
    engine::{FrameDecoder, MediaEngine, SourceMedia},
    error::FrametrimError,
    metadata::MediaInfo,
};

const INPUT_FILE_NAME: &str = "input.mp4";
const OUTPUT_FILE_NAME: &str = "output.mp4";

/// Frames this close before the target still count as "at" the target.
const FRAME_TOLERANCE_SECONDS: f64 = 1e-3;

/// FFmpeg internal log verbosity.
///
/// Maps to FFmpeg's `AV_LOG_*` levels. Messages below the chosen severity are
/// suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FfmpegLogLevel {
    /// No output at all.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    #[default]
    Error,
    /// Warnings (FFmpeg's own default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

/// Settings applied when the FFmpeg engine initialises.
#[derive(Debug, Clone, Default)]
pub struct FfmpegOptions {
    pub(crate) log_level: FfmpegLogLevel,
}

impl FfmpegOptions {
    /// Defaults: FFmpeg logs errors only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set FFmpeg's console verbosity.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// [`MediaEngine`] backed by the system FFmpeg libraries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    options: FfmpegOptions,
}

impl FfmpegEngine {
    /// An engine with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with explicit options.
    pub fn with_options(options: FfmpegOptions) -> Self {
        Self { options }
    }
}

impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn initialize(&self) -> Result<(), FrametrimError> {
        ffmpeg_next::init().map_err(|error| {
            FrametrimError::EngineInitialization(format!("FFmpeg initialisation failed: {error}"))
        })?;
        ffmpeg_next::util::log::set_level(self.options.log_level.to_ffmpeg_level());
        log::debug!("FFmpeg initialised (log level {:?})", self.options.log_level);
        Ok(())
    }

    fn open(&self, source: &SourceMedia) -> Result<Box<dyn FrameDecoder>, FrametrimError> {
        let unreadable = |reason: String| FrametrimError::UnreadableMedia {
            name: source.name().map(str::to_owned),
            reason,
        };

        let staging = StagingArea::new()?;
        let path = staging.write(INPUT_FILE_NAME, source.bytes())?;
        let input = ffmpeg_next::format::input(&path).map_err(|error| unreadable(error.to_string()))?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unreadable("no video stream found".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| unreadable(format!("cannot create video decoder: {error}")))?;

        let duration_seconds = if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
        } else {
            pts_to_seconds(stream.duration(), time_base)
        };

        let info = MediaInfo::new(duration_seconds, decoder.width(), decoder.height())
            .with_format(input.format().name());
        log::debug!(
            "Probed stream {stream_index}: {}x{}, {:.3}s, time base {}/{}",
            info.width,
            info.height,
            info.duration_seconds,
            time_base.numerator(),
            time_base.denominator(),
        );

        Ok(Box::new(FfmpegDecoder {
            input,
            stream_index,
            time_base,
            info,
            fresh: true,
            _staging: staging,
        }))
    }

    fn copy_transcode(
        &self,
        source: &SourceMedia,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Vec<u8>, FrametrimError> {
        let staging = StagingArea::new()
            .map_err(|error| FrametrimError::TrimFailed(format!("staging: {error}")))?;
        let input_path = staging
            .write(INPUT_FILE_NAME, source.bytes())
            .map_err(|error| FrametrimError::TrimFailed(format!("staging: {error}")))?;
        let output_path = staging.path(OUTPUT_FILE_NAME);

        remux_range(&input_path, &output_path, start_seconds, end_seconds)?;

        let data = fs::read(&output_path)
            .map_err(|error| FrametrimError::TrimFailed(format!("reading output: {error}")))?;
        log::debug!(
            "Stream copy of {start_seconds:.3}s..{end_seconds:.3}s produced {} bytes",
            data.len()
        );
        Ok(data)
    }
}

/// A private temporary directory holding staged media files.
struct StagingArea {
    directory: TempDir,
}

impl StagingArea {
    fn new() -> Result<Self, FrametrimError> {
        let directory = tempfile::Builder::new().prefix("frametrim-").tempdir()?;
        Ok(Self { directory })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.directory.path().join(name)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, FrametrimError> {
        let path = self.path(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// An opened source; owns the demuxer and its staged input file.
struct FfmpegDecoder {
    input: Input,
    stream_index: usize,
    time_base: Rational,
    info: MediaInfo,
    /// No packets have been read since opening.
    fresh: bool,
    _staging: StagingArea,
}

impl FrameDecoder for FfmpegDecoder {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn decode_frame_at(&mut self, seconds: f64) -> Result<DynamicImage, FrametrimError> {
        let failure = |reason: String| FrametrimError::DecodeFailure {
            timestamp: seconds,
            reason,
        };

        let stream_index = self.stream_index;
        let time_base = self.time_base;

        let stream = self
            .input
            .stream(stream_index)
            .ok_or_else(|| failure("video stream disappeared".to_string()))?;
        let mut decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| failure(error.to_string()))?;
        let (width, height) = (decoder.width(), decoder.height());
        let mut scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| failure(error.to_string()))?;

        // A freshly opened demuxer already sits at the start; seeking to 0
        // there fails on some platforms.
        if !(self.fresh && seconds <= 0.0) {
            let target = (seconds * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
            self.input
                .seek(target, ..=target)
                .map_err(|error| failure(format!("seek failed: {error}")))?;
        }
        self.fresh = false;

        let mut decoded = VideoFrame::empty();
        let mut previous = VideoFrame::empty();
        let mut have_previous = false;
        let mut rgb = VideoFrame::empty();

        let reached = |frame: &VideoFrame| {
            let pts = frame.timestamp().or(frame.pts()).unwrap_or(0);
            pts_to_seconds(pts, time_base) + FRAME_TOLERANCE_SECONDS >= seconds
        };

        for (stream, packet) in self.input.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder
                .send_packet(&packet)
                .map_err(|error| failure(error.to_string()))?;

            while decoder.receive_frame(&mut decoded).is_ok() {
                if reached(&decoded) {
                    scaler
                        .run(&decoded, &mut rgb)
                        .map_err(|error| failure(error.to_string()))?;
                    return rgb_frame_to_image(&rgb, width, height).map_err(failure);
                }
                std::mem::swap(&mut decoded, &mut previous);
                have_previous = true;
            }
        }

        decoder
            .send_eof()
            .map_err(|error| failure(error.to_string()))?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            if reached(&decoded) {
                scaler
                    .run(&decoded, &mut rgb)
                    .map_err(|error| failure(error.to_string()))?;
                return rgb_frame_to_image(&rgb, width, height).map_err(failure);
            }
            std::mem::swap(&mut decoded, &mut previous);
            have_previous = true;
        }

        // The target lies within the display time of the final frame.
        if have_previous {
            scaler
                .run(&previous, &mut rgb)
                .map_err(|error| failure(error.to_string()))?;
            return rgb_frame_to_image(&rgb, width, height).map_err(failure);
        }

        Err(failure("no frame decoded at or after the target".to_string()))
    }
}

/// Stream-copy the video and audio packets of `[start, end)` into `output`.
///
/// The cut begins at the keyframe at or before `start`; output timestamps are
/// rebased so that keyframe lands at zero.
fn remux_range(
    input_path: &std::path::Path,
    output_path: &std::path::Path,
    start_seconds: f64,
    end_seconds: f64,
) -> Result<(), FrametrimError> {
    let failed = |stage: &str, error: ffmpeg_next::Error| {
        FrametrimError::TrimFailed(format!("{stage}: {error}"))
    };

    let mut input_context =
        ffmpeg_next::format::input(&input_path).map_err(|error| failed("opening input", error))?;
    let mut output_context = ffmpeg_next::format::output(&output_path)
        .map_err(|error| failed("creating output", error))?;

    let video_index = input_context
        .streams()
        .best(Type::Video)
        .map(|stream| stream.index());

    // input stream index -> output stream index; subtitles and data are dropped.
    let mut stream_map: Vec<Option<usize>> = Vec::new();
    let mut output_stream_count = 0;
    for stream in input_context.streams() {
        if !matches!(stream.parameters().medium(), Type::Video | Type::Audio) {
            stream_map.push(None);
            continue;
        }
        let mut out_stream = output_context
            .add_stream(ffmpeg_next::encoder::find(Id::None))
            .map_err(|error| failed("adding output stream", error))?;
        out_stream.set_parameters(stream.parameters());
        // Let the muxer pick a codec tag valid for the output container.
        unsafe {
            (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
        }
        stream_map.push(Some(output_stream_count));
        output_stream_count += 1;
    }
    if output_stream_count == 0 {
        return Err(FrametrimError::TrimFailed(
            "source has no audio or video streams".to_string(),
        ));
    }

    output_context
        .write_header()
        .map_err(|error| failed("codec copy is not supported by the output container", error))?;

    if start_seconds > 0.0 {
        let target = (start_seconds * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
        input_context
            .seek(target, ..=target)
            .map_err(|error| failed("seeking to start", error))?;
    }

    let mut origin: Option<f64> = None;
    let mut finished = vec![false; stream_map.len()];
    let mut written: u64 = 0;

    for (stream, mut packet) in input_context.packets() {
        let input_index = stream.index();
        let Some(output_index) = stream_map.get(input_index).copied().flatten() else {
            continue;
        };
        let time_base = stream.time_base();
        let Some(pts) = packet.pts().or(packet.dts()) else {
            continue;
        };
        let pts_seconds = pts_to_seconds(pts, time_base);
        let dts_seconds = packet
            .dts()
            .map_or(pts_seconds, |dts| pts_to_seconds(dts, time_base));

        if dts_seconds >= end_seconds {
            finished[input_index] = true;
            let all_done = stream_map
                .iter()
                .zip(&finished)
                .all(|(mapped, done)| mapped.is_none() || *done);
            if all_done {
                break;
            }
            continue;
        }

        let origin_seconds = match origin {
            Some(origin_seconds) => origin_seconds,
            None => {
                // Anchor the cut on the first video keyframe.
                let is_anchor = match video_index {
                    Some(video_index) => input_index == video_index && packet.is_key(),
                    None => true,
                };
                if !is_anchor {
                    continue;
                }
                log::debug!(
                    "Requested start {start_seconds:.3}s snapped to keyframe at {pts_seconds:.3}s"
                );
                origin = Some(pts_seconds);
                pts_seconds
            }
        };
        if pts_seconds < origin_seconds || pts_seconds >= end_seconds {
            continue;
        }

        let offset = seconds_to_ts(origin_seconds, time_base);
        packet.set_pts(packet.pts().map(|value| value - offset));
        packet.set_dts(packet.dts().map(|value| value - offset));

        let output_time_base = output_context
            .stream(output_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| {
                FrametrimError::TrimFailed(format!("output stream {output_index} missing"))
            })?;
        packet.set_stream(output_index);
        packet.rescale_ts(time_base, output_time_base);
        packet.set_position(-1);
        packet
            .write_interleaved(&mut output_context)
            .map_err(|error| failed("writing packet", error))?;
        written += 1;
    }

    if origin.is_none() || written == 0 {
        return Err(FrametrimError::TrimFailed(format!(
            "no keyframe found for {start_seconds:.3}s..{end_seconds:.3}s"
        )));
    }

    output_context
        .write_trailer()
        .map_err(|error| failed("finalising output", error))?;
    log::debug!("Copied {written} packets");
    Ok(())
}

fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}

fn seconds_to_ts(seconds: f64, time_base: Rational) -> i64 {
    (seconds * f64::from(time_base.denominator()) / f64::from(time_base.numerator())).round()
        as i64
}

/// Copy a packed RGB24 frame into an [`image::DynamicImage`], dropping row
/// padding.
fn rgb_frame_to_image(frame: &VideoFrame, width: u32, height: u32) -> Result<DynamicImage, String> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let data = frame.data(0);

    let buffer = if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    };

    RgbImage::from_raw(width, height, buffer)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| "decoded frame has unexpected size".to_string())
}
