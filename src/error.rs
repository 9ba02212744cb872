//! Error types for the `frametrim` crate.
//!
//! This module defines [`FrametrimError`], the unified error type returned by
//! all fallible operations in the crate, and [`ErrorKind`], the coarse
//! taxonomy callers can match on when they only care about the category of a
//! failure (for example to decide between "retry" and "re-upload").

use std::io::Error as IoError;

use image::ImageError;
use thiserror::Error;

use crate::processing::ProcessingState;

/// Coarse classification of a [`FrametrimError`].
///
/// Obtained via [`FrametrimError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An operation was attempted before the engine finished initialising.
    EngineNotReady,
    /// The source could not be opened or probed.
    UnreadableMedia,
    /// A single-frame seek or decode failed.
    Decode,
    /// At least one sample frame failed; the whole batch was discarded.
    FrameExtractionFailed,
    /// A trim was requested with missing or non-ordered endpoints.
    InvalidRange,
    /// The engine failed while staging, transcoding, or reading back output.
    TrimFailed,
    /// Another exclusive operation is already running.
    Busy,
    /// The operation was cancelled or its result belongs to a replaced source.
    Cancelled,
    /// The caller passed an argument the crate cannot work with.
    InvalidInput,
    /// Local I/O or image encoding failure.
    Io,
}

/// The unified error type for all `frametrim` operations.
///
/// Every public method that can fail returns `Result<T, FrametrimError>`.
/// Variants carry enough context to diagnose the problem without additional
/// logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrametrimError {
    /// The media engine has not been loaded yet.
    #[error("Media engine is not ready")]
    EngineNotReady,

    /// The media engine failed to initialise.
    #[error("Media engine failed to initialise: {0}")]
    EngineInitialization(String),

    /// The source could not be opened or probed.
    #[error("Failed to open media {}: {reason}", display_name(.name))]
    UnreadableMedia {
        /// Display name of the source, if one was supplied.
        name: Option<String>,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A decode was requested outside `[0, duration)`.
    #[error("Timestamp {timestamp}s is outside the media timeline (duration {duration}s)")]
    SeekOutOfRange {
        /// The requested timestamp in seconds.
        timestamp: f64,
        /// The media duration in seconds.
        duration: f64,
    },

    /// A frame could not be decoded at the requested timestamp.
    #[error("Failed to decode frame at {timestamp}s: {reason}")]
    DecodeFailure {
        /// The requested timestamp in seconds.
        timestamp: f64,
        /// Underlying decoder message.
        reason: String,
    },

    /// Sampling failed part-way; no frames were returned.
    #[error("Frame extraction failed at sample {index} ({timestamp}s): {reason}")]
    FrameExtractionFailed {
        /// Index of the sample that failed.
        index: usize,
        /// Timestamp of the sample that failed.
        timestamp: f64,
        /// Description of the underlying failure.
        reason: String,
    },

    /// Fewer than two samples were requested.
    #[error("Sample count must be at least 2 (got {0})")]
    InvalidSampleCount(usize),

    /// A trim range whose start is not strictly before its end.
    #[error("Invalid range: start ({start}s) must be less than end ({end}s)")]
    InvalidRange {
        /// Requested start time in seconds.
        start: f64,
        /// Requested end time in seconds.
        end: f64,
    },

    /// A trim was requested without both endpoints selected.
    #[error("Trim needs both a start and an end frame selected")]
    IncompleteSelection,

    /// A pick referred to a frame that does not exist.
    #[error("Frame index {index} is out of range ({frame_count} frames available)")]
    FrameIndexOutOfRange {
        /// The index that was picked.
        index: usize,
        /// Number of sample frames currently loaded.
        frame_count: usize,
    },

    /// The engine failed while producing trimmed output.
    #[error("Trim failed: {0}")]
    TrimFailed(String),

    /// Another exclusive operation holds the processing flag.
    #[error("Busy: {active:?} is already in progress")]
    Busy {
        /// The operation currently holding the flag.
        active: ProcessingState,
    },

    /// No source media is loaded.
    #[error("No source media loaded")]
    NoSource,

    /// The source was replaced while the operation was running; its result
    /// was discarded.
    #[error("Source media was replaced; result discarded")]
    SourceReplaced,

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while staging or saving media.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a thumbnail.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl FrametrimError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrametrimError::EngineNotReady | FrametrimError::EngineInitialization(_) => {
                ErrorKind::EngineNotReady
            }
            FrametrimError::UnreadableMedia { .. } => ErrorKind::UnreadableMedia,
            FrametrimError::SeekOutOfRange { .. }
            | FrametrimError::DecodeFailure { .. }
            | FrametrimError::FfmpegError(_) => ErrorKind::Decode,
            FrametrimError::FrameExtractionFailed { .. } => ErrorKind::FrameExtractionFailed,
            FrametrimError::InvalidRange { .. } | FrametrimError::IncompleteSelection => {
                ErrorKind::InvalidRange
            }
            FrametrimError::TrimFailed(_) => ErrorKind::TrimFailed,
            FrametrimError::Busy { .. } => ErrorKind::Busy,
            FrametrimError::SourceReplaced | FrametrimError::Cancelled => ErrorKind::Cancelled,
            FrametrimError::InvalidSampleCount(_)
            | FrametrimError::FrameIndexOutOfRange { .. }
            | FrametrimError::NoSource => ErrorKind::InvalidInput,
            FrametrimError::IoError(_) | FrametrimError::ImageError(_) => ErrorKind::Io,
        }
    }
}

fn display_name(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("<unnamed>")
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for FrametrimError {
    fn from(error: ffmpeg_next::Error) -> Self {
        FrametrimError::FfmpegError(error.to_string())
    }
}
