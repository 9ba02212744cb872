//! Operation configuration.
//!
//! [`SamplerOptions`] threads the sample count, thumbnail settings, progress
//! callbacks, and cancellation tokens through frame sampling.
//! [`PlaybackOptions`] tunes how the playback synchronizer watches the
//! player clock.
//!
//! # Example
//!
//! ```no_run
//! use frametrim::{CancellationToken, SamplerOptions};
//!
//! let token = CancellationToken::new();
//! let options = SamplerOptions::new()
//!     .with_count(16)
//!     .with_thumbnail_max_dimension(240)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Number of sample frames generated when no count is configured.
pub const DEFAULT_SAMPLE_COUNT: usize = 10;

/// Upper bound on the playback poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for one frame-sampling run.
///
/// `count` trades selection granularity against extraction latency: every
/// sample costs one seek and one decode.
#[derive(Clone)]
pub struct SamplerOptions {
    /// Number of sample frames to produce. Must be at least 2.
    pub(crate) count: usize,
    /// Longest edge of each encoded thumbnail, in pixels.
    pub(crate) thumbnail_max_dimension: u32,
    /// JPEG quality (1–100) used for thumbnails.
    pub(crate) jpeg_quality: u8,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for SamplerOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SamplerOptions")
            .field("count", &self.count)
            .field("thumbnail_max_dimension", &self.thumbnail_max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplerOptions {
    /// Defaults: 10 samples, 320px thumbnails at JPEG quality 80, no progress
    /// callback, no cancellation.
    pub fn new() -> Self {
        Self {
            count: DEFAULT_SAMPLE_COUNT,
            thumbnail_max_dimension: 320,
            jpeg_quality: 80,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set the number of sample frames.
    ///
    /// Values below 2 are rejected when sampling starts with
    /// [`FrametrimError::InvalidSampleCount`](crate::FrametrimError::InvalidSampleCount).
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the longest thumbnail edge. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_thumbnail_max_dimension(mut self, max_dimension: u32) -> Self {
        self.thumbnail_max_dimension = max_dimension.max(1);
        self
    }

    /// Set the JPEG quality for thumbnails. Clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Attach a progress callback, invoked once per sampled frame.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the sampler stops before its next decode
    /// and fails with [`FrametrimError::Cancelled`](crate::FrametrimError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured sample count.
    pub fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Settings for the playback synchronizer.
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// How often the player clock is polled when native time updates are
    /// not used.
    pub(crate) poll_interval: Duration,
    /// Use the player's time-update events when it reports support for them.
    pub(crate) prefer_time_updates: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackOptions {
    /// Defaults: 100ms polling, native time updates preferred.
    pub fn new() -> Self {
        Self {
            poll_interval: MAX_POLL_INTERVAL,
            prefer_time_updates: true,
        }
    }

    /// Set the poll interval. Clamped to `1ms..=100ms`.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.clamp(Duration::from_millis(1), MAX_POLL_INTERVAL);
        self
    }

    /// Choose whether native time-update events are used when available.
    #[must_use]
    pub fn with_prefer_time_updates(mut self, prefer: bool) -> Self {
        self.prefer_time_updates = prefer;
        self
    }

    /// The effective poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
