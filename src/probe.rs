//! Opening sources and decoding single frames.
//!
//! [`MediaProbe`] owns the engine-side handle for one source. It validates
//! the probed metadata up front and enforces the timeline bounds on every
//! decode: timestamps outside `[0, duration)` are rejected rather than
//! clamped, leaving boundary policy to the caller.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use image::DynamicImage;

use crate::{
    engine::{FrameDecoder, MediaEngine, SourceMedia},
    error::FrametrimError,
    metadata::MediaInfo,
};

/// An opened media source.
///
/// Dropping the probe releases the engine-side handle.
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "ffmpeg")]
/// # fn run() -> Result<(), frametrim::FrametrimError> {
/// use frametrim::{FfmpegEngine, MediaEngine, MediaProbe, SourceMedia};
///
/// let engine = FfmpegEngine::new();
/// engine.initialize()?;
/// let source = SourceMedia::from_path("input.mp4")?;
/// let mut probe = MediaProbe::open(&engine, &source)?;
/// println!("{}s, {}x{}", probe.duration_seconds(), probe.info().width, probe.info().height);
/// let first = probe.decode_frame_at(0.0)?;
/// # let _ = first;
/// # Ok(())
/// # }
/// ```
pub struct MediaProbe {
    decoder: Box<dyn FrameDecoder>,
    info: MediaInfo,
}

impl Debug for MediaProbe {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaProbe")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl MediaProbe {
    /// Open `source` with `engine` and cache its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::UnreadableMedia`] if the source is empty,
    /// the engine cannot open it, or it reports a non-positive duration.
    pub fn open(engine: &dyn MediaEngine, source: &SourceMedia) -> Result<Self, FrametrimError> {
        let unreadable = |reason: String| FrametrimError::UnreadableMedia {
            name: source.name().map(str::to_owned),
            reason,
        };

        if source.is_empty() {
            return Err(unreadable("source contains no data".to_string()));
        }

        log::debug!(
            "Opening {} bytes with engine {}",
            source.len(),
            engine.name()
        );

        let decoder = engine.open(source).map_err(|error| match error {
            FrametrimError::UnreadableMedia { .. } => error,
            other => unreadable(other.to_string()),
        })?;

        let info = decoder.info().clone();
        if !info.duration_seconds.is_finite() || info.duration_seconds <= 0.0 {
            return Err(unreadable(format!(
                "media reports unusable duration {}",
                info.duration_seconds
            )));
        }

        log::info!(
            "Opened media{} (duration={:.3}s, {}x{})",
            source
                .name()
                .map(|name| format!(" {name}"))
                .unwrap_or_default(),
            info.duration_seconds,
            info.width,
            info.height,
        );

        Ok(Self { decoder, info })
    }

    /// Cached metadata.
    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.info.duration_seconds
    }

    /// Decode the frame at `seconds`.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::SeekOutOfRange`] if `seconds` is negative,
    ///   non-finite, or not strictly before the duration.
    /// - [`FrametrimError::DecodeFailure`] if the engine fails.
    pub fn decode_frame_at(&mut self, seconds: f64) -> Result<DynamicImage, FrametrimError> {
        if !self.info.contains(seconds) {
            return Err(FrametrimError::SeekOutOfRange {
                timestamp: seconds,
                duration: self.info.duration_seconds,
            });
        }

        self.decoder
            .decode_frame_at(seconds)
            .map_err(|error| match error {
                FrametrimError::SeekOutOfRange { .. } | FrametrimError::DecodeFailure { .. } => {
                    error
                }
                other => FrametrimError::DecodeFailure {
                    timestamp: seconds,
                    reason: other.to_string(),
                },
            })
    }
}
