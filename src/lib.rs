//! # frametrim
//!
//! Sample a video into a strip of evenly spaced thumbnails, pick a start and
//! an end frame, preview the range, and cut it out losslessly.
//!
//! `frametrim` decodes sample frames as JPEG [`ImageBytes`], tracks a
//! two-click [`Selection`] over them, keeps a live [`Player`] inside the
//! selected range, and stream-copies the range into a new MP4 via FFmpeg
//! through the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # async fn run() -> Result<(), frametrim::FrametrimError> {
//! use std::sync::Arc;
//!
//! use frametrim::{EditorSession, EngineService, FfmpegEngine, SourceMedia};
//!
//! let service = Arc::new(EngineService::new(Arc::new(FfmpegEngine::new())));
//! let session = EditorSession::new(service);
//! session.load_engine().await?;
//!
//! session.load_source(SourceMedia::from_path("input.mp4")?).await?;
//! let frames = session.extract_frames().await?;
//! println!("{} frames", frames.len());
//!
//! session.pick(2)?;
//! session.pick(5)?;
//! let output = session.trim().await?;
//! output.save(output.file_name())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pieces
//!
//! - **Engine service**: one explicitly owned [`MediaEngine`], loaded once
//! - **Frame sampling**: [`FrameSampler`] yields `count` frames from `0` to
//!   just before the end of the stream
//! - **Selection**: [`SelectionModel`] turns frame picks into a start/end pair
//! - **Playback sync**: [`PlaybackSynchronizer`] seeks a player to the start
//!   and pauses it at the end
//! - **Trimming**: [`TrimPipeline`] stream-copies the range without
//!   re-encoding, so the cut may snap back to a keyframe
//! - **Progress & cancellation**: [`ProgressCallback`] and
//!   [`CancellationToken`] for frame extraction
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | The FFmpeg-backed [`FfmpegEngine`] (enabled by default) |
//!
//! Without `ffmpeg`, bring your own [`MediaEngine`].
//!
//! ## Requirements
//!
//! The `ffmpeg` feature needs the FFmpeg development libraries installed on
//! the system.

pub mod configuration;
pub mod engine;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod metadata;
pub mod pipeline;
pub mod playback;
pub mod probe;
pub mod processing;
pub mod progress;
pub mod sampler;
pub mod selection;
pub mod service;
pub mod session;
pub mod thumbnail;

pub use configuration::{DEFAULT_SAMPLE_COUNT, MAX_POLL_INTERVAL, PlaybackOptions, SamplerOptions};
pub use engine::{FrameDecoder, MediaEngine, SourceMedia};
pub use error::{ErrorKind, FrametrimError};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegEngine, FfmpegLogLevel, FfmpegOptions};
pub use metadata::MediaInfo;
pub use pipeline::{OUTPUT_FILE_NAME, OUTPUT_MIME_TYPE, TrimPipeline, TrimRequest, TrimmedMedia};
pub use playback::{ClockSource, PlaybackSynchronizer, Player, PlayerEvent, PlayerListener, Subscription};
pub use probe::MediaProbe;
pub use processing::{ProcessingGate, ProcessingGuard, ProcessingState};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use sampler::{END_EPSILON, FrameSampler, FrameSequence, FrameSet, SampleFrame, sample_timestamps};
pub use selection::{Selection, SelectionModel};
pub use service::EngineService;
pub use session::EditorSession;
pub use thumbnail::{ImageBytes, THUMBNAIL_MIME_TYPE, encode_thumbnail, fit_dimensions};
