//! Audio primitive and clock abstractions
//!
//! The runtime never synthesizes sound itself. It drives:
//! - a [`Transport`]: the musical clock, with one-shot timers
//! - an [`AudioEngine`]: builds per-node [`Voice`]s and looping [`Playable`] parts
//!
//! [`VirtualTransport`] and [`LoggingEngine`] are tokio-driven stand-ins that
//! keep real time and log what would be played.
//!
//! Implementations must never run a timer callback inline from
//! [`Transport::schedule_once`] or [`Transport::start`], nor while holding
//! their own locks: callbacks re-enter the scheduler.

mod logging_engine;
mod virtual_transport;

pub use logging_engine::LoggingEngine;
pub use virtual_transport::VirtualTransport;

use mind_common::{MusicalTime, ThoughtEvent};
use std::sync::Arc;

/// One-shot timer callback
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Per-event part callback: `(transport time in seconds, event)`
pub type PartCallback = Arc<dyn Fn(f64, &ThoughtEvent) + Send + Sync + 'static>;

/// Identifies a timer armed with [`Transport::schedule_once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Musical clock
pub trait Transport: Send + Sync {
    fn is_running(&self) -> bool;

    /// Start the clock; no effect if already running
    fn start(&self);

    /// Current transport time in seconds (0 while stopped)
    fn now(&self) -> f64;

    /// Time of the next bar boundary, in seconds
    fn next_bar(&self) -> f64;

    /// Run `callback` once when the transport reaches `at` seconds
    fn schedule_once(&self, at: f64, callback: TimerCallback) -> TimerHandle;

    /// Cancel a pending timer; unknown or already fired handles are ignored
    fn clear(&self, handle: TimerHandle);
}

/// A looping unit of scheduled events
pub trait Playable: Send + Sync {
    /// Begin looping with the part's time zero at transport time `offset`
    fn start(&self, offset: f64);

    fn stop(&self);

    /// Free the part; it is never started again afterwards
    fn release(&self);
}

/// Per-node sound source
pub trait Voice: Send + Sync {
    /// Play `pitch` (MIDI number) for `duration` seconds at transport `time`
    fn trigger(&self, pitch: f64, duration: f64, time: f64, velocity: f64);

    fn mute(&self, time: f64);

    fn control_change(&self, cc: f64, value: f64, time: f64);
}

pub trait AudioEngine: Send + Sync {
    fn create_voice(&self, node_id: &str) -> Arc<dyn Voice>;

    /// Build a part that loops `events` over `loop_end`, calling `callback`
    /// for each event as it comes due
    fn create_part(
        &self,
        events: Vec<ThoughtEvent>,
        loop_end: MusicalTime,
        callback: PartCallback,
    ) -> Box<dyn Playable>;
}
