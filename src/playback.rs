//! Previewing a selection on a live player.
//!
//! [`PlaybackSynchronizer`] seeks a [`Player`] to the start of the selected
//! range and pauses it once playback reaches the end. The end check only
//! starts after the player reports that the seek finished, so a stale
//! position from before the seek can never trigger the pause.
//!
//! The clock is watched one of two ways, chosen per activation:
//!
//! - native [`PlayerEvent::TimeUpdate`] events, when the player reports
//!   [`Player::supports_time_updates`] and the options prefer them;
//! - polling [`Player::current_time`] at the configured interval (at most
//!   100ms) otherwise.
//!
//! At most one monitor runs per synchronizer. Activating again, calling
//! [`deactivate`](PlaybackSynchronizer::deactivate), or dropping the
//! synchronizer stops the previous monitor and releases its player
//! subscription.
//!
//! Monitors run as Tokio tasks, so activation must happen inside a Tokio
//! runtime.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{configuration::PlaybackOptions, sampler::FrameSet, selection::Selection};

/// A state change reported by a player.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum PlayerEvent {
    /// A seek finished; the player is now at `position` seconds.
    Seeked {
        /// Position after the seek.
        position: f64,
    },
    /// Playback time advanced.
    TimeUpdate {
        /// Current position.
        position: f64,
    },
    /// Playback started.
    Play,
    /// Playback paused.
    Pause,
    /// Playback reached the end of the media.
    Ended,
}

/// Callback registered with [`Player::subscribe`].
pub type PlayerListener = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

/// Handle returned by [`Player::subscribe`]. Unsubscribes when dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

impl Subscription {
    /// Wrap the player's unsubscribe action.
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Unsubscribe now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// A live media player.
pub trait Player: Send + Sync {
    /// Start seeking to `seconds`. Completion is reported as
    /// [`PlayerEvent::Seeked`].
    fn seek(&self, seconds: f64);

    /// Start playback.
    fn play(&self);

    /// Pause playback.
    fn pause(&self);

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Register `listener` for state changes.
    fn subscribe(&self, listener: PlayerListener) -> Subscription;

    /// Whether the player emits [`PlayerEvent::TimeUpdate`] while playing.
    fn supports_time_updates(&self) -> bool {
        false
    }
}

/// How a monitor watches for the end boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// The player's own time-update events.
    TimeUpdates,
    /// Polling `current_time` at a fixed interval.
    Polling(Duration),
}

struct Monitor {
    task: JoinHandle<()>,
    subscription: Arc<Mutex<Option<Subscription>>>,
    range: (f64, f64),
    clock: ClockSource,
}

impl Monitor {
    fn stop(self) {
        self.task.abort();
        release(&self.subscription);
    }
}

/// Drives seek-to-start and pause-at-end for one player.
pub struct PlaybackSynchronizer {
    player: Arc<dyn Player>,
    options: PlaybackOptions,
    monitor: Option<Monitor>,
}

impl Debug for PlaybackSynchronizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PlaybackSynchronizer")
            .field("options", &self.options)
            .field("active_range", &self.active_range())
            .field("monitoring", &self.is_monitoring())
            .finish()
    }
}

impl PlaybackSynchronizer {
    /// A synchronizer with no active monitor.
    pub fn new(player: Arc<dyn Player>, options: PlaybackOptions) -> Self {
        Self {
            player,
            options,
            monitor: None,
        }
    }

    /// The player being driven.
    pub fn player(&self) -> &Arc<dyn Player> {
        &self.player
    }

    /// Follow `selection`: a complete pair activates a monitor over its
    /// timestamps, anything else stops the current one.
    pub fn follow(&mut self, selection: Selection, frames: &FrameSet) {
        let range = selection
            .pair()
            .and_then(|(start, end)| Some((frames.timestamp(start)?, frames.timestamp(end)?)));
        match range {
            Some((start, end)) => self.activate(start, end),
            None => self.deactivate(),
        }
    }

    /// Seek to `start` and pause once playback reaches `end`.
    ///
    /// Any previous monitor is stopped first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn activate(&mut self, start: f64, end: f64) {
        self.deactivate();

        let clock = if self.options.prefer_time_updates && self.player.supports_time_updates() {
            ClockSource::TimeUpdates
        } else {
            ClockSource::Polling(self.options.poll_interval)
        };

        let (sender, receiver) = unbounded_channel();
        let listener: PlayerListener = Arc::new(move |event| {
            let _ = sender.send(event);
        });
        let subscription = Arc::new(Mutex::new(Some(self.player.subscribe(listener))));

        log::debug!("Seeking to {start:.3}s, pausing at {end:.3}s ({clock:?})");
        self.player.seek(start);

        let task = tokio::spawn(watch_until_end(
            Arc::clone(&self.player),
            receiver,
            Arc::clone(&subscription),
            end,
            clock,
        ));

        self.monitor = Some(Monitor {
            task,
            subscription,
            range: (start, end),
            clock,
        });
    }

    /// Stop the active monitor, if any, and release its subscription.
    pub fn deactivate(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            log::debug!("Stopping playback monitor for {:?}", monitor.range);
            monitor.stop();
        }
    }

    /// Whether a monitor is still waiting for the seek or the end boundary.
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| !monitor.task.is_finished())
    }

    /// The range of the most recent activation, until deactivated.
    pub fn active_range(&self) -> Option<(f64, f64)> {
        self.monitor.as_ref().map(|monitor| monitor.range)
    }

    /// How the most recent activation watches the clock.
    pub fn clock_source(&self) -> Option<ClockSource> {
        self.monitor.as_ref().map(|monitor| monitor.clock)
    }
}

impl Drop for PlaybackSynchronizer {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn release(subscription: &Mutex<Option<Subscription>>) {
    let taken = subscription
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    drop(taken);
}

async fn watch_until_end(
    player: Arc<dyn Player>,
    mut events: UnboundedReceiver<PlayerEvent>,
    subscription: Arc<Mutex<Option<Subscription>>>,
    end: f64,
    clock: ClockSource,
) {
    if wait_for_seek(&mut events).await {
        let reached = match clock {
            ClockSource::TimeUpdates => wait_for_time_update(&mut events, end).await,
            ClockSource::Polling(interval) => poll_until(&*player, end, interval).await,
        };
        if reached {
            log::debug!("Reached {end:.3}s, pausing");
            player.pause();
        }
    }
    release(&subscription);
}

async fn wait_for_seek(events: &mut UnboundedReceiver<PlayerEvent>) -> bool {
    while let Some(event) = events.recv().await {
        if let PlayerEvent::Seeked { position } = event {
            log::debug!("Seek completed at {position:.3}s");
            return true;
        }
    }
    false
}

async fn wait_for_time_update(events: &mut UnboundedReceiver<PlayerEvent>, end: f64) -> bool {
    while let Some(event) = events.recv().await {
        match event {
            PlayerEvent::TimeUpdate { position } if position >= end => return true,
            _ => {}
        }
    }
    false
}

async fn poll_until(player: &dyn Player, end: f64, interval: Duration) -> bool {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if player.current_time() >= end {
            return true;
        }
    }
}
