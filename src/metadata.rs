//! Media metadata types.

/// Timeline and picture information for an opened source.
///
/// Extracted once when the source is opened and cached for the lifetime of
/// the [`MediaProbe`](crate::MediaProbe).
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct MediaInfo {
    /// Total duration in seconds. Always finite and positive.
    pub duration_seconds: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`), if known.
    pub format: Option<String>,
}

impl MediaInfo {
    /// Build metadata with no format name.
    pub fn new(duration_seconds: f64, width: u32, height: u32) -> Self {
        Self {
            duration_seconds,
            width,
            height,
            format: None,
        }
    }

    /// Attach the container format name.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Whether the timestamp lies on the decodable timeline `[0, duration)`.
    pub fn contains(&self, seconds: f64) -> bool {
        seconds.is_finite() && seconds >= 0.0 && seconds < self.duration_seconds
    }
}
