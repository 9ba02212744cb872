//! Click-driven start/end selection over sample frames.
//!
//! [`SelectionModel`] is a three-state machine:
//!
//! | State | `pick(i)` |
//! |-------|-----------|
//! | `Empty` | `HasStart(i)` |
//! | `HasStart(s)` | `HasBoth(s, i)` |
//! | `HasBoth(s, e)` | `HasStart(i)` (previous pair discarded) |
//!
//! Picks are stored in the order they were made. The model does not swap an
//! end that lies before the start, and it accepts the same index twice.
//! Whether a pair can actually be trimmed is a separate predicate,
//! [`SelectionModel::is_trimmable`], which requires the start timestamp to be
//! strictly before the end timestamp.

use crate::{
    engine::SourceMedia, error::FrametrimError, pipeline::TrimRequest, sampler::FrameSet,
};

/// Current selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing selected.
    #[default]
    Empty,
    /// A start frame is selected; the next pick sets the end.
    HasStart {
        /// Index of the start frame.
        start: usize,
    },
    /// Both endpoints are selected.
    HasBoth {
        /// Index of the start frame.
        start: usize,
        /// Index of the end frame.
        end: usize,
    },
}

impl Selection {
    /// Index of the start frame, if set.
    pub fn start(&self) -> Option<usize> {
        match *self {
            Selection::Empty => None,
            Selection::HasStart { start } | Selection::HasBoth { start, .. } => Some(start),
        }
    }

    /// Index of the end frame, if set.
    pub fn end(&self) -> Option<usize> {
        match *self {
            Selection::HasBoth { end, .. } => Some(end),
            _ => None,
        }
    }

    /// Both endpoints, if the selection is complete.
    pub fn pair(&self) -> Option<(usize, usize)> {
        match *self {
            Selection::HasBoth { start, end } => Some((start, end)),
            _ => None,
        }
    }
}

/// The selection state machine.
///
/// # Example
///
/// ```
/// use frametrim::{Selection, SelectionModel};
///
/// let mut model = SelectionModel::new();
/// model.pick(1);
/// model.pick(5);
/// assert_eq!(model.selection(), Selection::HasBoth { start: 1, end: 5 });
///
/// // A third pick starts over.
/// model.pick(3);
/// assert_eq!(model.selection(), Selection::HasStart { start: 3 });
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    state: Selection,
}

impl SelectionModel {
    /// A model in the `Empty` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a pick and return the new state.
    pub fn pick(&mut self, index: usize) -> Selection {
        self.state = match self.state {
            Selection::Empty | Selection::HasBoth { .. } => Selection::HasStart { start: index },
            Selection::HasStart { start } => Selection::HasBoth { start, end: index },
        };
        self.state
    }

    /// Return to `Empty`.
    pub fn reset(&mut self) {
        self.state = Selection::Empty;
    }

    /// Current state.
    pub fn selection(&self) -> Selection {
        self.state
    }

    /// Whether `index` is one of the selected endpoints.
    pub fn is_selected(&self, index: usize) -> bool {
        self.state.start() == Some(index) || self.state.end() == Some(index)
    }

    /// Start and end timestamps of a complete selection, in pick order.
    ///
    /// Returns `None` if the selection is incomplete or refers to frames
    /// missing from `frames`.
    pub fn time_range(&self, frames: &FrameSet) -> Option<(f64, f64)> {
        let (start, end) = self.state.pair()?;
        Some((frames.timestamp(start)?, frames.timestamp(end)?))
    }

    /// Whether the selection describes a non-empty forward range.
    ///
    /// False for incomplete selections, for the same frame picked twice, and
    /// for an end frame that precedes the start frame.
    pub fn is_trimmable(&self, frames: &FrameSet) -> bool {
        self.time_range(frames)
            .is_some_and(|(start, end)| start < end)
    }

    /// Snapshot the selection as a [`TrimRequest`] against `source`.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::IncompleteSelection`] if an endpoint is unset.
    /// - [`FrametrimError::FrameIndexOutOfRange`] if an endpoint is not in
    ///   `frames`.
    /// - [`FrametrimError::InvalidRange`] if the start is not before the end.
    pub fn trim_request(
        &self,
        frames: &FrameSet,
        source: &SourceMedia,
    ) -> Result<TrimRequest, FrametrimError> {
        let (start, end) = self
            .state
            .pair()
            .ok_or(FrametrimError::IncompleteSelection)?;
        let timestamp = |index: usize| {
            frames
                .timestamp(index)
                .ok_or(FrametrimError::FrameIndexOutOfRange {
                    index,
                    frame_count: frames.len(),
                })
        };
        let (start_time, end_time) = (timestamp(start)?, timestamp(end)?);
        if start_time >= end_time {
            return Err(FrametrimError::InvalidRange {
                start: start_time,
                end: end_time,
            });
        }

        Ok(TrimRequest::new(source.clone(), start_time, end_time))
    }
}
