//! Evenly spaced frame sampling.
//!
//! [`FrameSampler`] turns an opened [`MediaProbe`] into `count` sample frames
//! spread across the whole timeline. The first sample sits at `t = 0`; the
//! last sits just before the end of the stream, because decoding the exact
//! end-of-stream timestamp fails on many engines.
//!
//! Sampling is exposed two ways:
//!
//! - [`FrameSampler::sample`] returns a lazy [`FrameSequence`] that decodes
//!   one frame per `next()` call.
//! - [`FrameSampler::sample_all`] drives the sequence to completion and
//!   returns either the complete [`FrameSet`] or an error. Partial batches
//!   are never returned.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # fn run() -> Result<(), frametrim::FrametrimError> {
//! use frametrim::{FfmpegEngine, FrameSampler, MediaEngine, MediaProbe, SamplerOptions, SourceMedia};
//!
//! let engine = FfmpegEngine::new();
//! engine.initialize()?;
//! let mut probe = MediaProbe::open(&engine, &SourceMedia::from_path("input.mp4")?)?;
//! let frames = FrameSampler::sample_all(&mut probe, &SamplerOptions::new().with_count(12))?;
//! for frame in &frames {
//!     println!("#{} at {:.2}s ({} bytes)", frame.index, frame.timestamp, frame.image.data.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::iter::FusedIterator;
use std::ops::Index;
use std::slice::Iter;

use crate::{
    configuration::SamplerOptions,
    error::FrametrimError,
    probe::MediaProbe,
    progress::{OperationType, ProgressTracker},
    thumbnail::{ImageBytes, encode_thumbnail},
};

/// Largest gap kept between the last sample and the end of the stream.
pub const END_EPSILON: f64 = 0.001;

/// One decoded sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    /// Position in sampling order, starting at 0.
    pub index: usize,
    /// Timestamp in seconds.
    pub timestamp: f64,
    /// Encoded thumbnail.
    pub image: ImageBytes,
}

/// A complete, ordered batch of sample frames.
///
/// Indices are contiguous from 0 and timestamps strictly increase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSet {
    frames: Vec<SampleFrame>,
}

impl FrameSet {
    pub(crate) fn new(frames: Vec<SampleFrame>) -> Self {
        Self { frames }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the set holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`.
    pub fn get(&self, index: usize) -> Option<&SampleFrame> {
        self.frames.get(index)
    }

    /// Timestamp of the frame at `index`.
    pub fn timestamp(&self, index: usize) -> Option<f64> {
        self.frames.get(index).map(|frame| frame.timestamp)
    }

    /// Iterate frames in index order.
    pub fn iter(&self) -> Iter<'_, SampleFrame> {
        self.frames.iter()
    }

    /// Borrow the frames as a slice.
    pub fn as_slice(&self) -> &[SampleFrame] {
        &self.frames
    }

    /// Take ownership of the frames.
    pub fn into_vec(self) -> Vec<SampleFrame> {
        self.frames
    }
}

impl Index<usize> for FrameSet {
    type Output = SampleFrame;

    fn index(&self, index: usize) -> &SampleFrame {
        &self.frames[index]
    }
}

impl<'a> IntoIterator for &'a FrameSet {
    type Item = &'a SampleFrame;
    type IntoIter = Iter<'a, SampleFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Compute `count` evenly spaced sample timestamps over `duration` seconds.
///
/// Sample `i` is at `min(i * duration / (count - 1), duration - epsilon)`,
/// where `epsilon` is [`END_EPSILON`] shrunk to half an interval for very
/// short media so the last two samples never collide.
///
/// # Errors
///
/// - [`FrametrimError::InvalidSampleCount`] if `count < 2`.
/// - [`FrametrimError::InvalidRange`] if `duration` is not a positive,
///   finite number.
pub fn sample_timestamps(duration: f64, count: usize) -> Result<Vec<f64>, FrametrimError> {
    if count < 2 {
        return Err(FrametrimError::InvalidSampleCount(count));
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(FrametrimError::InvalidRange {
            start: 0.0,
            end: duration,
        });
    }

    let interval = duration / (count - 1) as f64;
    let epsilon = END_EPSILON.min(interval / 2.0);
    let last = duration - epsilon;

    Ok((0..count)
        .map(|index| (index as f64 * interval).min(last))
        .collect())
}

/// Entry points for frame sampling.
pub struct FrameSampler;

impl FrameSampler {
    /// Start a lazy sampling run over `probe`.
    ///
    /// Nothing is decoded until the returned sequence is advanced.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::InvalidSampleCount`] if the configured count
    /// is below 2.
    pub fn sample<'a>(
        probe: &'a mut MediaProbe,
        options: &SamplerOptions,
    ) -> Result<FrameSequence<'a>, FrametrimError> {
        let timestamps = sample_timestamps(probe.duration_seconds(), options.count)?;
        log::debug!(
            "Sampling {} frames over {:.3}s",
            timestamps.len(),
            probe.duration_seconds()
        );
        let tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::FrameExtraction,
            Some(timestamps.len() as u64),
        );

        Ok(FrameSequence {
            probe,
            timestamps,
            next_index: 0,
            finished: false,
            options: options.clone(),
            tracker,
        })
    }

    /// Decode every sample and return the complete set.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::InvalidSampleCount`] if the count is below 2.
    /// - [`FrametrimError::FrameExtractionFailed`] if any sample fails; the
    ///   frames decoded so far are dropped.
    /// - [`FrametrimError::Cancelled`] if the options' token is cancelled.
    pub fn sample_all(
        probe: &mut MediaProbe,
        options: &SamplerOptions,
    ) -> Result<FrameSet, FrametrimError> {
        Self::sample(probe, options)?.collect_frames()
    }
}

/// Lazy, finite, non-restartable sequence of sample frames.
///
/// Yields frames in index order. After the first error the sequence is
/// exhausted.
pub struct FrameSequence<'a> {
    probe: &'a mut MediaProbe,
    timestamps: Vec<f64>,
    next_index: usize,
    finished: bool,
    options: SamplerOptions,
    tracker: ProgressTracker,
}

impl FrameSequence<'_> {
    /// The timestamps this run will visit, in order.
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Drive the sequence to the end.
    ///
    /// Returns the complete set, or the first error with every frame
    /// collected so far discarded.
    pub fn collect_frames(self) -> Result<FrameSet, FrametrimError> {
        let expected = self.timestamps.len();
        match self.collect::<Result<Vec<_>, _>>() {
            Ok(frames) => {
                debug_assert_eq!(frames.len(), expected);
                log::debug!("Collected {} sample frames", frames.len());
                Ok(FrameSet::new(frames))
            }
            Err(error) => {
                log::warn!("Discarding partial frame batch: {error}");
                Err(error)
            }
        }
    }

    fn produce(&mut self, index: usize, timestamp: f64) -> Result<SampleFrame, FrametrimError> {
        let failed = |reason: String| FrametrimError::FrameExtractionFailed {
            index,
            timestamp,
            reason,
        };

        let decoded = self
            .probe
            .decode_frame_at(timestamp)
            .map_err(|error| failed(error.to_string()))?;
        let image = encode_thumbnail(
            &decoded,
            self.options.thumbnail_max_dimension,
            self.options.jpeg_quality,
        )
        .map_err(|error| failed(error.to_string()))?;

        Ok(SampleFrame {
            index,
            timestamp,
            image,
        })
    }
}

impl Iterator for FrameSequence<'_> {
    type Item = Result<SampleFrame, FrametrimError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let index = self.next_index;
        let Some(&timestamp) = self.timestamps.get(index) else {
            self.finished = true;
            return None;
        };

        if self.options.is_cancelled() {
            log::debug!("Sampling cancelled before frame {index}");
            self.finished = true;
            return Some(Err(FrametrimError::Cancelled));
        }

        let result = self.produce(index, timestamp);
        match &result {
            Ok(_) => {
                self.next_index += 1;
                self.tracker.advance(Some(timestamp));
            }
            Err(_) => self.finished = true,
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (0, Some(self.timestamps.len() - self.next_index))
        }
    }
}

impl FusedIterator for FrameSequence<'_> {}
