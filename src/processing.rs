//! The session-wide processing flag.
//!
//! Engine loading, frame extraction, and trimming are mutually exclusive.
//! [`ProcessingGate`] holds the single [`ProcessingState`] shared by all of
//! them; entering a state hands back a [`ProcessingGuard`] that puts the gate
//! back to `Idle` when dropped, so every exit path (success, error, early
//! return) releases the flag.
//!
//! Guards are `Send`. Operations that hand work to the blocking pool move the
//! guard into that work, so the flag outlives a dropped caller future and is
//! only released once the engine call itself returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::FrametrimError;

/// Which exclusive operation, if any, is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    /// Nothing running.
    #[default]
    Idle,
    /// The media engine is initialising.
    LoadingEngine,
    /// Sample frames are being decoded.
    ExtractingFrames,
    /// A trim is in flight.
    Trimming,
}

impl ProcessingState {
    /// Whether an operation is running.
    pub fn is_busy(self) -> bool {
        self != ProcessingState::Idle
    }

    /// Text for a busy indicator, or `None` when idle.
    pub fn status_message(self) -> Option<&'static str> {
        match self {
            ProcessingState::Idle => None,
            ProcessingState::LoadingEngine => Some("Waiting for FFmpeg to load..."),
            ProcessingState::ExtractingFrames => Some("Extracting frames..."),
            ProcessingState::Trimming => Some("Processing..."),
        }
    }
}

/// Shared handle to the processing flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ProcessingGate {
    state: Arc<Mutex<ProcessingState>>,
}

impl ProcessingGate {
    /// A gate in the `Idle` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn current(&self) -> ProcessingState {
        *self.lock()
    }

    /// Claim the gate for `state`.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::Busy`] naming the active operation if the
    /// gate is not idle.
    pub fn try_enter(&self, state: ProcessingState) -> Result<ProcessingGuard, FrametrimError> {
        let mut current = self.lock();
        if current.is_busy() {
            log::debug!("Rejecting {state:?}: {:?} is active", *current);
            return Err(FrametrimError::Busy { active: *current });
        }
        *current = state;
        log::debug!("Processing state -> {state:?}");

        Ok(ProcessingGuard {
            gate: self.clone(),
            state,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ProcessingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the gate in one state; releases it to `Idle` on drop.
#[derive(Debug)]
#[must_use = "the processing flag is released as soon as the guard is dropped"]
pub struct ProcessingGuard {
    gate: ProcessingGate,
    state: ProcessingState,
}

impl ProcessingGuard {
    /// The state this guard holds.
    pub fn state(&self) -> ProcessingState {
        self.state
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        let mut current = self.gate.lock();
        if *current == self.state {
            *current = ProcessingState::Idle;
            log::debug!("Processing state {:?} -> Idle", self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let gate = ProcessingGate::new();
        {
            let guard = gate.try_enter(ProcessingState::Trimming).unwrap();
            assert_eq!(guard.state(), ProcessingState::Trimming);
            assert_eq!(gate.current(), ProcessingState::Trimming);
        }
        assert_eq!(gate.current(), ProcessingState::Idle);
    }

    #[test]
    fn second_entry_is_rejected() {
        let gate = ProcessingGate::new();
        let _guard = gate.try_enter(ProcessingState::ExtractingFrames).unwrap();
        match gate.try_enter(ProcessingState::Trimming) {
            Err(FrametrimError::Busy { active }) => {
                assert_eq!(active, ProcessingState::ExtractingFrames)
            }
            other => panic!("expected Busy, got {other:?}"),
        }
        assert_eq!(gate.current(), ProcessingState::ExtractingFrames);
    }

    #[test]
    fn status_messages() {
        assert_eq!(ProcessingState::Idle.status_message(), None);
        assert_eq!(
            ProcessingState::LoadingEngine.status_message(),
            Some("Waiting for FFmpeg to load...")
        );
        assert_eq!(
            ProcessingState::Trimming.status_message(),
            Some("Processing...")
        );
    }
}
