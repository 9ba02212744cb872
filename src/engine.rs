//! The media engine boundary.
//!
//! Everything that actually touches encoded media goes through
//! [`MediaEngine`] and the [`FrameDecoder`] it hands out. The crate ships an
//! FFmpeg implementation ([`FfmpegEngine`](crate::FfmpegEngine), feature
//! `ffmpeg`); tests and embedders can plug in their own.
//!
//! All engine methods are blocking. Async callers run them on Tokio's
//! blocking pool.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
    sync::Arc,
};

use image::DynamicImage;

use crate::{error::FrametrimError, metadata::MediaInfo};

/// Raw source bytes as supplied by the upload boundary.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone)]
pub struct SourceMedia {
    bytes: Arc<[u8]>,
    name: Option<String>,
}

impl Debug for SourceMedia {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SourceMedia")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl SourceMedia {
    /// Wrap raw media bytes.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            name: None,
        }
    }

    /// Attach a display name (typically the uploaded file name).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a media file from disk. The file name becomes the display name.
    ///
    /// # Errors
    ///
    /// Returns [`FrametrimError::IoError`] if the file cannot be read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FrametrimError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let source = Self::new(bytes);
        Ok(match path.file_name() {
            Some(name) => source.with_name(name.to_string_lossy()),
            None => source,
        })
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The display name, if one was supplied.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Byte length of the source.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the source holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A media decode/transcode engine.
///
/// `initialize` is called exactly once by [`EngineService`](crate::EngineService)
/// before any other method.
pub trait MediaEngine: Send + Sync {
    /// Short engine name used in log output.
    fn name(&self) -> &str;

    /// One-time initialisation (library setup, codec registration).
    fn initialize(&self) -> Result<(), FrametrimError>;

    /// Open `source` for random-access frame decoding.
    ///
    /// Implementations must have the duration available when this returns.
    /// Fails with [`FrametrimError::UnreadableMedia`] if the bytes cannot be
    /// probed.
    fn open(&self, source: &SourceMedia) -> Result<Box<dyn FrameDecoder>, FrametrimError>;

    /// Stream-copy `[start_seconds, end_seconds)` of `source` into a new,
    /// self-contained media file and return its bytes.
    ///
    /// No re-encoding happens, so the output may start at the keyframe at
    /// or before `start_seconds`.
    fn copy_transcode(
        &self,
        source: &SourceMedia,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Vec<u8>, FrametrimError>;
}

/// An opened, decodable source.
pub trait FrameDecoder: Send {
    /// Duration and dimensions, loaded at open time.
    fn info(&self) -> &MediaInfo;

    /// Decode the frame displayed at `seconds`.
    ///
    /// Callers guarantee `0 <= seconds < duration`.
    fn decode_frame_at(&mut self, seconds: f64) -> Result<DynamicImage, FrametrimError>;
}
