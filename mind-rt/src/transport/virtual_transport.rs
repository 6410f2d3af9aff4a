//! Wall-clock transport driven by tokio timers

use super::{TimerCallback, TimerHandle, Transport};
use mind_common::Meter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

enum Timer {
    /// Armed before the transport started; spawned on start
    Waiting { at: f64, callback: TimerCallback },
    Armed(AbortHandle),
}

struct ClockState {
    started_at: Option<Instant>,
    next_id: u64,
    timers: HashMap<u64, Timer>,
}

/// Transport whose time is the wall-clock time since [`Transport::start`]
///
/// Each timer is a tokio task sleeping until its deadline. Uses
/// `tokio::time::Instant`, so paused-time tests control it too.
pub struct VirtualTransport {
    meter: Meter,
    runtime: Handle,
    state: Arc<Mutex<ClockState>>,
}

impl VirtualTransport {
    pub fn new(meter: Meter, runtime: Handle) -> Self {
        Self {
            meter,
            runtime,
            state: Arc::new(Mutex::new(ClockState {
                started_at: None,
                next_id: 0,
                timers: HashMap::new(),
            })),
        }
    }

    pub fn meter(&self) -> Meter {
        self.meter
    }

    /// Number of timers not yet fired or cleared
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    fn arm(&self, id: u64, deadline: Instant, callback: TimerCallback) -> AbortHandle {
        let state = Arc::clone(&self.state);
        self.runtime
            .spawn(async move {
                tokio::time::sleep_until(deadline).await;
                // Cleared timers are gone from the map even if the abort lost the race
                let due = state.lock().timers.remove(&id).is_some();
                if due {
                    callback();
                }
            })
            .abort_handle()
    }
}

fn deadline(started_at: Instant, at: f64) -> Instant {
    started_at + Duration::from_secs_f64(at.max(0.0))
}

impl Transport for VirtualTransport {
    fn is_running(&self) -> bool {
        self.state.lock().started_at.is_some()
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if state.started_at.is_some() {
            return;
        }
        let started_at = Instant::now();
        state.started_at = Some(started_at);

        let waiting: Vec<u64> = state
            .timers
            .iter()
            .filter(|(_, timer)| matches!(timer, Timer::Waiting { .. }))
            .map(|(id, _)| *id)
            .collect();
        for id in waiting {
            if let Some(Timer::Waiting { at, callback }) = state.timers.remove(&id) {
                let handle = self.arm(id, deadline(started_at, at), callback);
                state.timers.insert(id, Timer::Armed(handle));
            }
        }

        info!(
            bpm = self.meter.bpm,
            "Transport started ({}/{})", self.meter.beats_per_bar, self.meter.beat_unit
        );
    }

    fn now(&self) -> f64 {
        self.state
            .lock()
            .started_at
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn next_bar(&self) -> f64 {
        if self.is_running() {
            self.meter.next_bar_after(self.now())
        } else {
            0.0
        }
    }

    fn schedule_once(&self, at: f64, callback: TimerCallback) -> TimerHandle {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        let timer = match state.started_at {
            Some(started_at) => Timer::Armed(self.arm(id, deadline(started_at, at), callback)),
            None => Timer::Waiting { at, callback },
        };
        state.timers.insert(id, timer);
        debug!(timer_id = id, at, "Timer armed");
        TimerHandle(id)
    }

    fn clear(&self, handle: TimerHandle) {
        if let Some(Timer::Armed(task)) = self.state.lock().timers.remove(&handle.0) {
            task.abort();
        }
    }
}
