//! Lossless range extraction.
//!
//! [`TrimPipeline`] turns a [`TrimRequest`] into a [`TrimmedMedia`] artifact
//! by asking the engine to stream-copy the requested range. Nothing is
//! re-encoded, which keeps the original quality and makes trimming fast, but
//! cut points are limited to what the codec allows: the output may begin at
//! the keyframe at or before the requested start. That snap is expected
//! behaviour.
//!
//! Only one trim runs at a time. A second call while one is in flight fails
//! immediately with [`FrametrimError::Busy`]. The flag stays set until the
//! engine call returns, even if the `trim()` future is dropped first.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # async fn run() -> Result<(), frametrim::FrametrimError> {
//! use std::sync::Arc;
//!
//! use frametrim::{EngineService, FfmpegEngine, SourceMedia, TrimPipeline, TrimRequest};
//!
//! let service = Arc::new(EngineService::new(Arc::new(FfmpegEngine::new())));
//! service.load().await?;
//!
//! let pipeline = TrimPipeline::new(Arc::clone(&service));
//! let request = TrimRequest::new(SourceMedia::from_path("input.mp4")?, 2.0, 5.0);
//! let output = pipeline.trim(&request).await?;
//! output.save("trimmed-video.mp4")?;
//! # Ok(())
//! # }
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use crate::{
    engine::SourceMedia,
    error::FrametrimError,
    processing::ProcessingState,
    progress::OperationType,
    service::EngineService,
};

/// MIME type of trimmed output.
pub const OUTPUT_MIME_TYPE: &str = "video/mp4";

/// Suggested download name for trimmed output.
pub const OUTPUT_FILE_NAME: &str = "trimmed-video.mp4";

/// An immutable snapshot of what to cut.
#[derive(Debug, Clone)]
pub struct TrimRequest {
    source: SourceMedia,
    start_time: f64,
    end_time: f64,
}

impl TrimRequest {
    /// Describe a cut of `[start_time, end_time)` seconds from `source`.
    ///
    /// The range is not validated here; [`TrimPipeline::trim`] rejects
    /// invalid ranges before touching the engine.
    pub fn new(source: SourceMedia, start_time: f64, end_time: f64) -> Self {
        Self {
            source,
            start_time,
            end_time,
        }
    }

    /// The source to cut from.
    pub fn source(&self) -> &SourceMedia {
        &self.source
    }

    /// Requested start, in seconds.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Requested end, in seconds.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Check that the range is finite, non-negative, and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::InvalidRange`] otherwise.
    pub fn validate(&self) -> Result<(), FrametrimError> {
        let valid = self.start_time.is_finite()
            && self.end_time.is_finite()
            && self.start_time >= 0.0
            && self.start_time < self.end_time;
        if valid {
            Ok(())
        } else {
            Err(FrametrimError::InvalidRange {
                start: self.start_time,
                end: self.end_time,
            })
        }
    }
}

/// A playable, self-contained media file produced by a trim.
#[derive(Clone, PartialEq)]
pub struct TrimmedMedia {
    data: Vec<u8>,
    start_time: f64,
    end_time: f64,
}

impl Debug for TrimmedMedia {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TrimmedMedia")
            .field("len", &self.data.len())
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .finish()
    }
}

impl TrimmedMedia {
    /// The encoded output.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the encoded output.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Always [`OUTPUT_MIME_TYPE`].
    pub fn mime_type(&self) -> &'static str {
        OUTPUT_MIME_TYPE
    }

    /// Suggested file name for saving.
    pub fn file_name(&self) -> &'static str {
        OUTPUT_FILE_NAME
    }

    /// Start and end that were requested (before keyframe snapping).
    pub fn requested_range(&self) -> (f64, f64) {
        (self.start_time, self.end_time)
    }

    /// Length of the requested range in seconds.
    pub fn requested_duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Write the output to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::IoError`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FrametrimError> {
        std::fs::write(path.as_ref(), &self.data)?;
        log::debug!(
            "Saved {} bytes of trimmed media to {}",
            self.data.len(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// Single-flight trim runner.
#[derive(Debug, Clone)]
pub struct TrimPipeline {
    service: Arc<EngineService>,
}

impl TrimPipeline {
    /// Build a pipeline over `service`. The service's gate provides the
    /// `Trimming` flag.
    pub fn new(service: Arc<EngineService>) -> Self {
        Self { service }
    }

    /// Cut `request` out of its source.
    ///
    /// Checks run in this order, and nothing reaches the engine unless all
    /// pass: range validity, engine readiness, the processing gate.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::InvalidRange`] if `start >= end` (or either is
    ///   non-finite or negative).
    /// - [`FrametrimError::EngineNotReady`] before the engine has loaded.
    /// - [`FrametrimError::Busy`] if another trim, an extraction, or engine
    ///   loading is running.
    /// - [`FrametrimError::TrimFailed`] if staging, transcoding, or reading
    ///   back fails, or the engine returns no data.
    pub async fn trim(&self, request: &TrimRequest) -> Result<TrimmedMedia, FrametrimError> {
        request.validate()?;
        let engine = self.service.engine()?;
        let guard = self.service.gate().try_enter(ProcessingState::Trimming)?;

        let (start_time, end_time) = (request.start_time, request.end_time);
        log::info!("Trimming {start_time:.3}s..{end_time:.3}s (stream copy)");
        let mut tracker = self.service.tracker(OperationType::Trimming);
        tracker.begin();

        // The guard lives with the engine call: dropping this future must not
        // free the flag while the copy is still running.
        let source = request.source.clone();
        let data = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            engine.copy_transcode(&source, start_time, end_time)
        })
        .await
        .map_err(|error| FrametrimError::TrimFailed(format!("transcode task failed: {error}")))?
        .map_err(|error| match error {
            FrametrimError::TrimFailed(_) => error,
            other => FrametrimError::TrimFailed(other.to_string()),
        })
        .inspect_err(|error| log::warn!("{error}"))?;

        if data.is_empty() {
            log::warn!("Engine produced an empty output for {start_time:.3}s..{end_time:.3}s");
            return Err(FrametrimError::TrimFailed(
                "engine produced an empty output".to_string(),
            ));
        }

        tracker.advance(Some(end_time));
        log::info!("Trim complete: {} bytes", data.len());
        Ok(TrimmedMedia {
            data,
            start_time,
            end_time,
        })
    }
}
