//! Shared reload state between the change detector and the HTTP handlers.
//!
//! The detector thread is the only writer. Handlers read the watermark and
//! read-and-clear the flag, each in a single atomic operation.

use crate::event::ReloadEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// The Reload Signal: a dirty flag, a modification watermark, and a fan-out
/// channel for stream subscribers.
#[derive(Debug)]
pub struct ReloadSignal {
    dirty: AtomicBool,
    watermark: AtomicU64,
    events: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadSignal {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            dirty: AtomicBool::new(false),
            watermark: AtomicU64::new(0),
            events,
        }
    }

    /// Records a detected change: sets the flag, advances the watermark and
    /// notifies stream subscribers.
    pub fn notify(&self, event: ReloadEvent) {
        self.advance_watermark(event.modified);
        self.dirty.store(true, Ordering::Release);
        // No subscribers is the common case in polling modes.
        let _ = self.events.send(event);
    }

    /// Returns whether a reload is pending and clears it in the same step.
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Latest change watermark in milliseconds since the Unix epoch.
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Moves the watermark forward; never moves it back.
    pub fn advance_watermark(&self, millis: u64) {
        self.watermark.fetch_max(millis, Ordering::AcqRel);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.events.subscribe()
    }
}

/// Converts a timestamp to milliseconds since the Unix epoch, clamping
/// pre-epoch times to zero.
pub fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
