//! Explicitly owned, lazily initialised media engine.
//!
//! [`EngineService`] wraps one [`MediaEngine`] with a one-time lifecycle:
//! `load()` runs [`MediaEngine::initialize`] on the blocking pool while the
//! shared [`ProcessingGate`] reports `LoadingEngine`; afterwards the engine is
//! handed out to any number of callers. Anything that asks for the engine
//! before loading has finished gets [`FrametrimError::EngineNotReady`].
//!
//! The `LoadingEngine` flag is held by the blocking initialisation itself, so
//! dropping the `load()` future early does not free the gate while the engine
//! is still starting up.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{
    engine::MediaEngine,
    error::FrametrimError,
    processing::{ProcessingGate, ProcessingState},
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
};

/// A media engine plus its readiness state and the session's processing gate.
pub struct EngineService {
    engine: Arc<dyn MediaEngine>,
    ready: OnceCell<()>,
    gate: ProcessingGate,
    progress: Arc<dyn ProgressCallback>,
}

impl Debug for EngineService {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("EngineService")
            .field("engine", &self.engine.name())
            .field("ready", &self.is_ready())
            .field("state", &self.gate.current())
            .finish()
    }
}

impl EngineService {
    /// Wrap `engine` with a fresh gate. The engine is not initialised yet.
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self::with_gate(engine, ProcessingGate::new())
    }

    /// Wrap `engine`, sharing an existing gate.
    pub fn with_gate(engine: Arc<dyn MediaEngine>, gate: ProcessingGate) -> Self {
        Self {
            engine,
            ready: OnceCell::new(),
            gate,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Report engine loading and trimming to `callback`.
    ///
    /// Each operation reports once when it starts and once when it completes
    /// successfully.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Initialise the engine. Idempotent once it has succeeded.
    ///
    /// A failed initialisation leaves the service unloaded, so `load` may be
    /// called again.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::Busy`] if another operation holds the gate.
    /// - [`FrametrimError::EngineInitialization`] if the engine fails to
    ///   start.
    pub async fn load(&self) -> Result<(), FrametrimError> {
        if self.is_ready() {
            return Ok(());
        }

        let guard = self.gate.try_enter(ProcessingState::LoadingEngine)?;
        self.ready
            .get_or_try_init(|| async move {
                log::info!("Loading media engine {}", self.engine.name());
                let mut tracker = self.tracker(OperationType::EngineLoading);
                tracker.begin();
                let engine = Arc::clone(&self.engine);
                tokio::task::spawn_blocking(move || {
                    let _guard = guard;
                    engine.initialize()
                })
                .await
                .map_err(|error| FrametrimError::EngineInitialization(error.to_string()))?
                .map_err(|error| match error {
                    FrametrimError::EngineInitialization(_) => error,
                    other => FrametrimError::EngineInitialization(other.to_string()),
                })?;
                tracker.advance(None);
                log::info!("Media engine {} ready", self.engine.name());
                Ok::<(), FrametrimError>(())
            })
            .await?;

        Ok(())
    }

    /// Whether [`load`](EngineService::load) has completed successfully.
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// The engine, once ready.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::EngineNotReady`] before loading completes.
    pub fn engine(&self) -> Result<Arc<dyn MediaEngine>, FrametrimError> {
        if self.is_ready() {
            Ok(Arc::clone(&self.engine))
        } else {
            Err(FrametrimError::EngineNotReady)
        }
    }

    /// The processing gate shared by everything using this engine.
    pub fn gate(&self) -> &ProcessingGate {
        &self.gate
    }

    /// Current processing state.
    pub fn state(&self) -> ProcessingState {
        self.gate.current()
    }

    /// A one-step progress tracker for `operation`.
    pub(crate) fn tracker(&self, operation: OperationType) -> ProgressTracker {
        ProgressTracker::new(Arc::clone(&self.progress), operation, Some(1))
    }
}
