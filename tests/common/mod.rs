//! Scripted engine and player shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use frametrim::{
    FrameDecoder, FrametrimError, MediaEngine, MediaInfo, Player, PlayerEvent, PlayerListener,
    SourceMedia, Subscription,
};
use image::DynamicImage;

// ── Scripted engine ────────────────────────────────────────────────

#[derive(Default)]
struct EngineState {
    initialize_calls: AtomicUsize,
    open_calls: AtomicUsize,
    decode_calls: AtomicUsize,
    copy_calls: AtomicUsize,
    decoded_at: Mutex<Vec<f64>>,
    copied_ranges: Mutex<Vec<(f64, f64)>>,
    copy_gate: Mutex<Option<Receiver<()>>>,
    copy_entered: AtomicBool,
}

/// What `copy_transcode` returns.
#[derive(Debug, Clone)]
pub enum CopyOutcome {
    Bytes(Vec<u8>),
    Empty,
    Fail(String),
}

/// A [`MediaEngine`] with configurable behaviour and call counters.
#[derive(Clone)]
pub struct ScriptedEngine {
    duration: f64,
    width: u32,
    height: u32,
    fail_initialize: bool,
    fail_open: bool,
    fail_decode_call: Option<usize>,
    decode_delay: Option<Duration>,
    copy_outcome: CopyOutcome,
    state: Arc<EngineState>,
}

impl ScriptedEngine {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            width: 64,
            height: 36,
            fail_initialize: false,
            fail_open: false,
            fail_decode_call: None,
            decode_delay: None,
            copy_outcome: CopyOutcome::Bytes(b"ftypisom trimmed".to_vec()),
            state: Arc::new(EngineState::default()),
        }
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Fail the `call`th decode (0-based, counted across the engine).
    pub fn failing_decode_call(mut self, call: usize) -> Self {
        self.fail_decode_call = Some(call);
        self
    }

    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = Some(delay);
        self
    }

    pub fn with_copy_outcome(mut self, outcome: CopyOutcome) -> Self {
        self.copy_outcome = outcome;
        self
    }

    /// Block `copy_transcode` until the returned sender fires (or drops).
    pub fn gate_copy(&self) -> Sender<()> {
        let (sender, receiver) = channel();
        *self.state.copy_gate.lock().unwrap() = Some(receiver);
        sender
    }

    pub fn initialize_calls(&self) -> usize {
        self.state.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.state.open_calls.load(Ordering::SeqCst)
    }

    pub fn decode_calls(&self) -> usize {
        self.state.decode_calls.load(Ordering::SeqCst)
    }

    pub fn copy_calls(&self) -> usize {
        self.state.copy_calls.load(Ordering::SeqCst)
    }

    pub fn copy_entered(&self) -> bool {
        self.state.copy_entered.load(Ordering::SeqCst)
    }

    pub fn decoded_at(&self) -> Vec<f64> {
        self.state.decoded_at.lock().unwrap().clone()
    }

    pub fn copied_ranges(&self) -> Vec<(f64, f64)> {
        self.state.copied_ranges.lock().unwrap().clone()
    }
}

impl MediaEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn initialize(&self) -> Result<(), FrametrimError> {
        self.state.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(FrametrimError::EngineInitialization(
                "scripted failure".to_string(),
            ));
        }
        Ok(())
    }

    fn open(&self, source: &SourceMedia) -> Result<Box<dyn FrameDecoder>, FrametrimError> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(FrametrimError::UnreadableMedia {
                name: source.name().map(str::to_owned),
                reason: "not a media file".to_string(),
            });
        }
        Ok(Box::new(ScriptedDecoder {
            info: MediaInfo::new(self.duration, self.width, self.height),
            engine: self.clone(),
        }))
    }

    fn copy_transcode(
        &self,
        _source: &SourceMedia,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<Vec<u8>, FrametrimError> {
        self.state.copy_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .copied_ranges
            .lock()
            .unwrap()
            .push((start_seconds, end_seconds));
        self.state.copy_entered.store(true, Ordering::SeqCst);

        let gate = self.state.copy_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        match &self.copy_outcome {
            CopyOutcome::Bytes(bytes) => Ok(bytes.clone()),
            CopyOutcome::Empty => Ok(Vec::new()),
            CopyOutcome::Fail(reason) => Err(FrametrimError::TrimFailed(reason.clone())),
        }
    }
}

struct ScriptedDecoder {
    info: MediaInfo,
    engine: ScriptedEngine,
}

impl FrameDecoder for ScriptedDecoder {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn decode_frame_at(&mut self, seconds: f64) -> Result<DynamicImage, FrametrimError> {
        let call = self.engine.state.decode_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.engine.decode_delay {
            std::thread::sleep(delay);
        }
        if self.engine.fail_decode_call == Some(call) {
            return Err(FrametrimError::DecodeFailure {
                timestamp: seconds,
                reason: "corrupt packet".to_string(),
            });
        }
        self.engine.state.decoded_at.lock().unwrap().push(seconds);
        Ok(DynamicImage::new_rgb8(self.info.width, self.info.height))
    }
}

pub fn source() -> SourceMedia {
    SourceMedia::new(vec![0u8; 128]).with_name("clip.mp4")
}

// ── Fake player ────────────────────────────────────────────────────

type Listeners = Arc<Mutex<Vec<(usize, PlayerListener)>>>;

/// A [`Player`] driven by the test: the test moves the clock and emits
/// events by hand.
pub struct FakePlayer {
    position: Mutex<f64>,
    seeks: Mutex<Vec<f64>>,
    pauses: AtomicUsize,
    plays: AtomicUsize,
    listeners: Listeners,
    next_id: AtomicUsize,
    time_updates: bool,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    pub fn with_time_updates() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(time_updates: bool) -> Self {
        Self {
            position: Mutex::new(0.0),
            seeks: Mutex::new(Vec::new()),
            pauses: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicUsize::new(0),
            time_updates,
        }
    }

    pub fn set_position(&self, seconds: f64) {
        *self.position.lock().unwrap() = seconds;
    }

    /// Deliver `event` to every current listener.
    pub fn emit(&self, event: PlayerEvent) {
        let listeners: Vec<PlayerListener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Finish the most recent seek: move there and emit `Seeked`.
    pub fn complete_seek(&self) {
        let target = self.seeks().last().copied().unwrap_or(0.0);
        self.set_position(target);
        self.emit(PlayerEvent::Seeked { position: target });
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl Player for FakePlayer {
    fn seek(&self, seconds: f64) {
        self.seeks.lock().unwrap().push(seconds);
    }

    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn current_time(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn subscribe(&self, listener: PlayerListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().push((id, listener));
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || {
            listeners
                .lock()
                .unwrap()
                .retain(|(listener_id, _)| *listener_id != id);
        })
    }

    fn supports_time_updates(&self) -> bool {
        self.time_updates
    }
}
