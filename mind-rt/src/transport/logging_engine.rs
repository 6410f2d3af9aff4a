//! Audio engine that logs instead of synthesizing
//!
//! Parts loop in tokio tasks on wall-clock time and hand each event to the
//! part callback, so the scheduling path behaves as it would against a real
//! synthesizer. Voices log what they would play.

use super::{AudioEngine, PartCallback, Playable, Voice};
use mind_common::{Meter, MusicalTime, ThoughtEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

pub struct LoggingEngine {
    meter: Meter,
    runtime: Handle,
}

impl LoggingEngine {
    pub fn new(meter: Meter, runtime: Handle) -> Self {
        Self { meter, runtime }
    }
}

impl AudioEngine for LoggingEngine {
    fn create_voice(&self, node_id: &str) -> Arc<dyn Voice> {
        Arc::new(LoggingVoice {
            node_id: node_id.to_string(),
        })
    }

    fn create_part(
        &self,
        events: Vec<ThoughtEvent>,
        loop_end: MusicalTime,
        callback: PartCallback,
    ) -> Box<dyn Playable> {
        let loop_seconds = loop_end.to_seconds(&self.meter);

        // Events at or past the loop end never sound
        let mut timed: Vec<(f64, ThoughtEvent)> = events
            .into_iter()
            .map(|event| (event.time().to_seconds(&self.meter), event))
            .filter(|(at, _)| *at < loop_seconds)
            .collect();
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));

        Box::new(LoggingPart {
            events: timed.into(),
            loop_seconds,
            callback,
            runtime: self.runtime.clone(),
            task: Mutex::new(None),
        })
    }
}

struct LoggingVoice {
    node_id: String,
}

impl Voice for LoggingVoice {
    fn trigger(&self, pitch: f64, duration: f64, time: f64, velocity: f64) {
        debug!(
            node_id = %self.node_id,
            pitch, duration, velocity,
            "note at {:.3}s", time
        );
    }

    fn mute(&self, time: f64) {
        debug!(node_id = %self.node_id, "mute at {:.3}s", time);
    }

    fn control_change(&self, cc: f64, value: f64, time: f64) {
        debug!(node_id = %self.node_id, cc, value, "cc at {:.3}s", time);
    }
}

struct LoggingPart {
    events: Arc<[(f64, ThoughtEvent)]>,
    loop_seconds: f64,
    callback: PartCallback,
    runtime: Handle,
    task: Mutex<Option<AbortHandle>>,
}

impl LoggingPart {
    fn halt(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Playable for LoggingPart {
    fn start(&self, offset: f64) {
        self.halt();
        if self.events.is_empty() {
            trace!("Empty part started at {:.3}s", offset);
            return;
        }

        let events = Arc::clone(&self.events);
        let callback = Arc::clone(&self.callback);
        let loop_seconds = self.loop_seconds;

        let task = self.runtime.spawn(async move {
            let origin = Instant::now();
            let mut iteration: u64 = 0;
            loop {
                let base = iteration as f64 * loop_seconds;
                for (at, event) in events.iter() {
                    let due = origin + Duration::from_secs_f64(base + at);
                    tokio::time::sleep_until(due).await;
                    callback(offset + base + at, event);
                }
                // Wait out the tail of the loop before wrapping
                tokio::time::sleep_until(origin + Duration::from_secs_f64(base + loop_seconds))
                    .await;
                iteration += 1;
            }
        });
        *self.task.lock() = Some(task.abort_handle());
    }

    fn stop(&self) {
        self.halt();
    }

    fn release(&self) {
        self.halt();
        trace!("Part released");
    }
}

impl Drop for LoggingPart {
    fn drop(&mut self) {
        self.halt();
    }
}
