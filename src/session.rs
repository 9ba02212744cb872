//! One editing session over one loaded source.
//!
//! [`EditorSession`] wires the components together the way an editor UI
//! uses them: load the engine, load a source, extract sample frames, pick a
//! start and end frame (which previews the range on an attached player), and
//! trim.
//!
//! Replacing or clearing the source cancels any in-flight sampling, clears
//! the frames, selection, and previous output, and stops the playback
//! monitor. Operations that started against the old source still run to
//! completion, but their results are discarded and they return
//! [`FrametrimError::SourceReplaced`].
//!
//! All methods take `&self`; wrap the session in an [`Arc`] to run
//! extraction or trimming from spawned tasks.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    configuration::{PlaybackOptions, SamplerOptions},
    engine::SourceMedia,
    error::FrametrimError,
    metadata::MediaInfo,
    pipeline::{TrimPipeline, TrimRequest, TrimmedMedia},
    playback::{PlaybackSynchronizer, Player},
    probe::MediaProbe,
    processing::ProcessingState,
    progress::CancellationToken,
    sampler::{FrameSampler, FrameSet},
    selection::{Selection, SelectionModel},
    service::EngineService,
};

#[derive(Default)]
struct SessionState {
    generation: u64,
    source: Option<SourceMedia>,
    probe: Option<MediaProbe>,
    info: Option<MediaInfo>,
    frames: FrameSet,
    selection: SelectionModel,
    extraction: Option<CancellationToken>,
    synchronizer: Option<PlaybackSynchronizer>,
    trimmed: Option<TrimmedMedia>,
}

impl SessionState {
    /// Invalidate everything tied to the current source and install `source`.
    fn replace_source(&mut self, source: Option<SourceMedia>) -> u64 {
        self.generation += 1;
        if let Some(token) = self.extraction.take() {
            log::debug!("Cancelling in-flight frame extraction");
            token.cancel();
        }
        self.source = source;
        self.probe = None;
        self.info = None;
        self.frames = FrameSet::default();
        self.selection.reset();
        self.trimmed = None;
        if let Some(synchronizer) = self.synchronizer.as_mut() {
            synchronizer.deactivate();
        }
        self.generation
    }

    fn follow_selection(&mut self) {
        if let Some(synchronizer) = self.synchronizer.as_mut() {
            synchronizer.follow(self.selection.selection(), &self.frames);
        }
    }
}

/// The editing session.
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "ffmpeg")]
/// # async fn run() -> Result<(), frametrim::FrametrimError> {
/// use std::sync::Arc;
///
/// use frametrim::{EditorSession, EngineService, FfmpegEngine, SourceMedia};
///
/// let service = Arc::new(EngineService::new(Arc::new(FfmpegEngine::new())));
/// let session = EditorSession::new(service);
/// session.load_engine().await?;
///
/// session.load_source(SourceMedia::from_path("input.mp4")?).await?;
/// let frames = session.extract_frames().await?;
/// session.pick(2)?;
/// session.pick(5)?;
/// let output = session.trim().await?;
/// output.save(output.file_name())?;
/// # let _ = frames;
/// # Ok(())
/// # }
/// ```
pub struct EditorSession {
    service: Arc<EngineService>,
    pipeline: TrimPipeline,
    sampler_options: SamplerOptions,
    playback_options: PlaybackOptions,
    state: Arc<Mutex<SessionState>>,
}

impl Debug for EditorSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.state();
        f.debug_struct("EditorSession")
            .field("service", &self.service)
            .field("generation", &state.generation)
            .field("info", &state.info)
            .field("frames", &state.frames.len())
            .field("selection", &state.selection.selection())
            .field("has_output", &state.trimmed.is_some())
            .finish()
    }
}

impl EditorSession {
    /// A session with default sampler and playback options.
    pub fn new(service: Arc<EngineService>) -> Self {
        Self {
            pipeline: TrimPipeline::new(Arc::clone(&service)),
            service,
            sampler_options: SamplerOptions::default(),
            playback_options: PlaybackOptions::default(),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Replace the sampler options.
    ///
    /// The session installs its own cancellation token for every extraction;
    /// a token set on `options` is ignored.
    #[must_use]
    pub fn with_sampler_options(mut self, options: SamplerOptions) -> Self {
        self.sampler_options = options;
        self
    }

    /// Replace the playback options used for attached players.
    #[must_use]
    pub fn with_playback_options(mut self, options: PlaybackOptions) -> Self {
        self.playback_options = options;
        self
    }

    /// Load the media engine. See [`EngineService::load`].
    pub async fn load_engine(&self) -> Result<(), FrametrimError> {
        self.service.load().await
    }

    /// Whether the engine has loaded.
    pub fn is_engine_ready(&self) -> bool {
        self.service.is_ready()
    }

    /// Current processing state, for a busy indicator.
    pub fn processing_state(&self) -> ProcessingState {
        self.service.state()
    }

    /// Replace the current source with `source` and open it.
    ///
    /// Everything tied to the previous source is invalidated first, even if
    /// opening the new one fails.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::EngineNotReady`] before the engine has loaded.
    /// - [`FrametrimError::UnreadableMedia`] if the source cannot be opened.
    /// - [`FrametrimError::SourceReplaced`] if another source was loaded
    ///   while this one was opening.
    pub async fn load_source(&self, source: SourceMedia) -> Result<MediaInfo, FrametrimError> {
        let engine = self.service.engine()?;
        let generation = self.state().replace_source(Some(source.clone()));
        log::info!(
            "Loading source {} ({} bytes)",
            source.name().unwrap_or("<unnamed>"),
            source.len()
        );

        let name = source.name().map(str::to_owned);
        let opened = tokio::task::spawn_blocking(move || MediaProbe::open(&*engine, &source))
            .await
            .map_err(|error| FrametrimError::UnreadableMedia {
                name,
                reason: format!("open task failed: {error}"),
            })?;

        let mut state = self.state();
        if state.generation != generation {
            log::warn!("Source replaced while opening; discarding");
            return Err(FrametrimError::SourceReplaced);
        }
        match opened {
            Ok(probe) => {
                let info = probe.info().clone();
                state.info = Some(info.clone());
                state.probe = Some(probe);
                Ok(info)
            }
            Err(error) => {
                state.source = None;
                Err(error)
            }
        }
    }

    /// Drop the current source and everything derived from it.
    pub fn clear(&self) {
        log::info!("Clearing source");
        self.state().replace_source(None);
    }

    /// Metadata of the loaded source.
    pub fn media_info(&self) -> Option<MediaInfo> {
        self.state().info.clone()
    }

    /// The loaded source.
    pub fn source(&self) -> Option<SourceMedia> {
        self.state().source.clone()
    }

    /// Decode the configured number of sample frames from the loaded source.
    ///
    /// On success the frames replace any previous set and the selection is
    /// reset. On failure no frames are stored.
    ///
    /// Dropping the returned future does not stop sampling: it finishes on
    /// the blocking pool while holding the `ExtractingFrames` flag, then
    /// hands the source back so a later call can extract again.
    ///
    /// # Errors
    ///
    /// - [`FrametrimError::EngineNotReady`] before the engine has loaded.
    /// - [`FrametrimError::Busy`] if another exclusive operation is running.
    /// - [`FrametrimError::NoSource`] if no source is open.
    /// - [`FrametrimError::FrameExtractionFailed`] if any sample fails.
    /// - [`FrametrimError::SourceReplaced`] if the source was replaced or
    ///   cleared during extraction.
    pub async fn extract_frames(&self) -> Result<FrameSet, FrametrimError> {
        self.service.engine()?;
        let guard = self
            .service
            .gate()
            .try_enter(ProcessingState::ExtractingFrames)?;

        let token = CancellationToken::new();
        let (mut probe, generation) = {
            let mut state = self.state();
            let probe = state.probe.take().ok_or(FrametrimError::NoSource)?;
            state.extraction = Some(token.clone());
            (probe, state.generation)
        };

        let options = self.sampler_options.clone().with_cancellation(token);
        let shared = Arc::clone(&self.state);
        // The blocking side owns the flag and returns the probe to the
        // session itself, so dropping this future loses neither.
        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = FrameSampler::sample_all(&mut probe, &options);
            let mut state = lock(&shared);
            if state.generation == generation {
                state.probe = Some(probe);
                state.extraction = None;
            }
            result
        })
        .await
        .map_err(|error| FrametrimError::FrameExtractionFailed {
            index: 0,
            timestamp: 0.0,
            reason: format!("extraction task failed: {error}"),
        })?;

        let mut state = self.state();
        if state.generation != generation {
            log::warn!("Source replaced during frame extraction; discarding frames");
            return Err(FrametrimError::SourceReplaced);
        }

        let frames = result?;
        log::info!("Extracted {} sample frames", frames.len());
        state.frames = frames.clone();
        state.selection.reset();
        state.trimmed = None;
        state.follow_selection();
        Ok(frames)
    }

    /// The current sample frames (empty until extraction succeeds).
    pub fn frames(&self) -> FrameSet {
        self.state().frames.clone()
    }

    /// Pick the sample frame at `index`.
    ///
    /// A completed pair starts previewing on the attached player; any other
    /// transition stops the preview.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::FrameIndexOutOfRange`] if `index` is not a
    /// loaded frame.
    pub fn pick(&self, index: usize) -> Result<Selection, FrametrimError> {
        let mut state = self.state();
        let frame_count = state.frames.len();
        if index >= frame_count {
            return Err(FrametrimError::FrameIndexOutOfRange { index, frame_count });
        }
        let selection = state.selection.pick(index);
        log::debug!("Picked frame {index}: {selection:?}");
        state.follow_selection();
        Ok(selection)
    }

    /// Current selection.
    pub fn selection(&self) -> Selection {
        self.state().selection.selection()
    }

    /// Whether frame `index` is a selected endpoint.
    pub fn is_selected(&self, index: usize) -> bool {
        self.state().selection.is_selected(index)
    }

    /// Whether the selection describes a non-empty forward range.
    pub fn is_trimmable(&self) -> bool {
        let state = self.state();
        state.selection.is_trimmable(&state.frames)
    }

    /// Whether [`trim`](EditorSession::trim) would currently be attempted:
    /// engine ready, nothing else running, and a trimmable selection.
    pub fn can_trim(&self) -> bool {
        self.service.is_ready() && !self.processing_state().is_busy() && self.is_trimmable()
    }

    /// Snapshot the selection as a [`TrimRequest`].
    ///
    /// # Errors
    ///
    /// [`FrametrimError::NoSource`], or the errors of
    /// [`SelectionModel::trim_request`].
    pub fn trim_request(&self) -> Result<TrimRequest, FrametrimError> {
        let state = self.state();
        let source = state.source.as_ref().ok_or(FrametrimError::NoSource)?;
        state.selection.trim_request(&state.frames, source)
    }

    /// Trim the selected range.
    ///
    /// A failed trim leaves the selection untouched so it can be retried.
    ///
    /// # Errors
    ///
    /// The errors of [`trim_request`](EditorSession::trim_request) and
    /// [`TrimPipeline::trim`], plus [`FrametrimError::SourceReplaced`] if the
    /// source changed while trimming.
    pub async fn trim(&self) -> Result<TrimmedMedia, FrametrimError> {
        let request = self.trim_request()?;
        let generation = self.state().generation;

        let result = self.pipeline.trim(&request).await;

        let mut state = self.state();
        if state.generation != generation {
            log::warn!("Source replaced during trim; discarding output");
            return Err(FrametrimError::SourceReplaced);
        }
        let output = result?;
        state.trimmed = Some(output.clone());
        Ok(output)
    }

    /// The most recent trim output for the current source.
    pub fn trimmed_output(&self) -> Option<TrimmedMedia> {
        self.state().trimmed.clone()
    }

    /// Attach a player for previewing selections, replacing any previous one.
    ///
    /// If a complete pair is already selected, previewing starts at once, so
    /// this must then be called inside a Tokio runtime.
    pub fn attach_player(&self, player: Arc<dyn Player>) {
        let mut state = self.state();
        let mut synchronizer = PlaybackSynchronizer::new(player, self.playback_options.clone());
        synchronizer.follow(state.selection.selection(), &state.frames);
        state.synchronizer = Some(synchronizer);
    }

    /// Detach the player, stopping any preview.
    pub fn detach_player(&self) {
        self.state().synchronizer = None;
    }

    /// Whether a preview monitor is running on the attached player.
    pub fn is_previewing(&self) -> bool {
        self.state()
            .synchronizer
            .as_ref()
            .is_some_and(PlaybackSynchronizer::is_monitoring)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
