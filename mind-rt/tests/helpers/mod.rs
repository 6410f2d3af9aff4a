//! Test doubles for mind-rt integration tests
//!
//! - [`ManualTransport`]: a clock that only moves when the test says so
//! - [`RecordingEngine`]: parts and voices that record what they were asked to do
//! - [`FakeThoughtService`]: scripted generate/resolve replies with optional delays
//! - [`RecordingSink`]: captures published outputs

#![allow(dead_code)]

use async_trait::async_trait;
use mind_common::api::{
    ErrorEnvelope, GenerateRequest, Profile, ResolveRequest, ResolveResponse, ResolvedThought,
};
use mind_common::events::{EventBus, MindEvent, OutputSource};
use mind_common::{Meter, MusicalTime, Thought, ThoughtEvent};
use mind_rt::client::{ThoughtService, TransportError};
use mind_rt::graph::ThoughtSink;
use mind_rt::scheduler::PartSwapScheduler;
use mind_rt::transport::{
    AudioEngine, PartCallback, Playable, TimerCallback, TimerHandle, Transport, Voice,
};
use mind_rt::RuntimeStore;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Thought fixtures
// ============================================================================

/// A valid `thought.v0` body with one note per `(time, midi)` pair
pub fn thought_json(node_id: &str, notes: &[(&str, u8)]) -> Value {
    let sequence: Vec<Value> = notes
        .iter()
        .map(|(time, midi)| {
            json!({
                "time": time,
                "type": "note",
                "midi": midi,
                "velocity": 0.8,
                "duration": "8n"
            })
        })
        .collect();
    json!({
        "schema_version": "thought.v0",
        "node_id": node_id,
        "status": "active",
        "style_profile": "wide_acoustic",
        "meta": { "loop_bars": 1 },
        "sequence": sequence
    })
}

pub fn thought(node_id: &str, notes: &[(&str, u8)]) -> Arc<Thought> {
    Arc::new(mind_common::validate(&thought_json(node_id, notes)).unwrap())
}

/// A Thought whose status asks for silence
pub fn silent_thought(node_id: &str) -> Arc<Thought> {
    let mut body = thought_json(node_id, &[]);
    body["status"] = json!("muted");
    Arc::new(mind_common::validate(&body).unwrap())
}

// ============================================================================
// ManualTransport
// ============================================================================

struct ManualClock {
    running: bool,
    now: f64,
    next_id: u64,
    timers: BTreeMap<u64, (f64, TimerCallback)>,
    starts: usize,
    clears: usize,
}

/// Transport whose clock only moves on [`ManualTransport::advance_to`]
///
/// Due callbacks run on the test's thread, after the clock lock is released.
pub struct ManualTransport {
    meter: Meter,
    /// When set, `clear` is ignored so superseded callbacks still fire
    leaky: bool,
    clock: Mutex<ManualClock>,
}

impl ManualTransport {
    pub fn new(meter: Meter) -> Arc<Self> {
        Self::build(meter, false)
    }

    /// A transport that never cancels timers, modelling a callback that was
    /// already on its way when it was cleared
    pub fn leaky(meter: Meter) -> Arc<Self> {
        Self::build(meter, true)
    }

    fn build(meter: Meter, leaky: bool) -> Arc<Self> {
        Arc::new(Self {
            meter,
            leaky,
            clock: Mutex::new(ManualClock {
                running: false,
                now: 0.0,
                next_id: 0,
                timers: BTreeMap::new(),
                starts: 0,
                clears: 0,
            }),
        })
    }

    pub fn pending_timers(&self) -> usize {
        self.clock.lock().timers.len()
    }

    pub fn deadlines(&self) -> Vec<f64> {
        self.clock.lock().timers.values().map(|(at, _)| *at).collect()
    }

    pub fn start_count(&self) -> usize {
        self.clock.lock().starts
    }

    pub fn clear_count(&self) -> usize {
        self.clock.lock().clears
    }

    /// Move the clock to `to` seconds and fire every due timer in deadline
    /// order; returns how many fired
    pub fn advance_to(&self, to: f64) -> usize {
        let due = {
            let mut clock = self.clock.lock();
            clock.now = to;
            if !clock.running {
                return 0;
            }
            let mut due_ids: Vec<(f64, u64)> = clock
                .timers
                .iter()
                .filter(|(_, (at, _))| *at <= to)
                .map(|(id, (at, _))| (*at, *id))
                .collect();
            due_ids.sort_by(|a, b| a.partial_cmp(b).unwrap());
            due_ids
                .into_iter()
                .filter_map(|(_, id)| clock.timers.remove(&id))
                .collect::<Vec<_>>()
        };

        let fired = due.len();
        for (_, callback) in due {
            callback();
        }
        fired
    }
}

impl Transport for ManualTransport {
    fn is_running(&self) -> bool {
        self.clock.lock().running
    }

    fn start(&self) {
        let mut clock = self.clock.lock();
        if !clock.running {
            clock.running = true;
            clock.starts += 1;
        }
    }

    fn now(&self) -> f64 {
        self.clock.lock().now
    }

    fn next_bar(&self) -> f64 {
        let clock = self.clock.lock();
        if clock.running {
            self.meter.next_bar_after(clock.now)
        } else {
            0.0
        }
    }

    fn schedule_once(&self, at: f64, callback: TimerCallback) -> TimerHandle {
        let mut clock = self.clock.lock();
        let id = clock.next_id;
        clock.next_id += 1;
        clock.timers.insert(id, (at, callback));
        TimerHandle(id)
    }

    fn clear(&self, handle: TimerHandle) {
        let mut clock = self.clock.lock();
        clock.clears += 1;
        if !self.leaky {
            clock.timers.remove(&handle.0);
        }
    }
}

// ============================================================================
// RecordingEngine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCall {
    Trigger {
        pitch: f64,
        duration: f64,
        time: f64,
        velocity: f64,
    },
    Mute {
        time: f64,
    },
    ControlChange {
        cc: f64,
        value: f64,
        time: f64,
    },
}

#[derive(Default)]
pub struct RecordingVoice {
    calls: Mutex<Vec<VoiceCall>>,
}

impl RecordingVoice {
    pub fn calls(&self) -> Vec<VoiceCall> {
        self.calls.lock().clone()
    }
}

impl Voice for RecordingVoice {
    fn trigger(&self, pitch: f64, duration: f64, time: f64, velocity: f64) {
        self.calls.lock().push(VoiceCall::Trigger {
            pitch,
            duration,
            time,
            velocity,
        });
    }

    fn mute(&self, time: f64) {
        self.calls.lock().push(VoiceCall::Mute { time });
    }

    fn control_change(&self, cc: f64, value: f64, time: f64) {
        self.calls.lock().push(VoiceCall::ControlChange { cc, value, time });
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartState {
    pub started_at: Option<f64>,
    pub stops: usize,
    pub released: bool,
}

/// A part built by [`RecordingEngine`]
pub struct RecordedPart {
    pub events: Vec<ThoughtEvent>,
    pub loop_end: MusicalTime,
    meter: Meter,
    callback: PartCallback,
    state: Mutex<PartState>,
}

impl RecordedPart {
    pub fn state(&self) -> PartState {
        self.state.lock().clone()
    }

    pub fn first_pitch(&self) -> Option<f64> {
        self.events.iter().find_map(|event| match event {
            ThoughtEvent::Note { midi, .. } => Some(*midi),
            _ => None,
        })
    }

    /// Run one pass of the loop through the part callback
    pub fn play_once(&self) {
        let offset = self.state.lock().started_at.unwrap_or(0.0);
        for event in &self.events {
            (self.callback)(offset + event.time().to_seconds(&self.meter), event);
        }
    }
}

struct PartHandle(Arc<RecordedPart>);

impl Playable for PartHandle {
    fn start(&self, offset: f64) {
        let mut state = self.0.state.lock();
        assert!(!state.released, "released part started");
        state.started_at = Some(offset);
    }

    fn stop(&self) {
        self.0.state.lock().stops += 1;
    }

    fn release(&self) {
        self.0.state.lock().released = true;
    }
}

pub struct RecordingEngine {
    meter: Meter,
    voices: Mutex<HashMap<String, Arc<RecordingVoice>>>,
    parts: Mutex<Vec<Arc<RecordedPart>>>,
}

impl RecordingEngine {
    pub fn new(meter: Meter) -> Arc<Self> {
        Arc::new(Self {
            meter,
            voices: Mutex::new(HashMap::new()),
            parts: Mutex::new(Vec::new()),
        })
    }

    /// Every part built so far, in creation order
    pub fn parts(&self) -> Vec<Arc<RecordedPart>> {
        self.parts.lock().clone()
    }

    pub fn voice(&self, node_id: &str) -> Option<Arc<RecordingVoice>> {
        self.voices.lock().get(node_id).cloned()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.lock().len()
    }
}

impl AudioEngine for RecordingEngine {
    fn create_voice(&self, node_id: &str) -> Arc<dyn Voice> {
        let voice = Arc::new(RecordingVoice::default());
        self.voices
            .lock()
            .insert(node_id.to_string(), Arc::clone(&voice));
        voice
    }

    fn create_part(
        &self,
        events: Vec<ThoughtEvent>,
        loop_end: MusicalTime,
        callback: PartCallback,
    ) -> Box<dyn Playable> {
        let part = Arc::new(RecordedPart {
            events,
            loop_end,
            meter: self.meter,
            callback,
            state: Mutex::new(PartState::default()),
        });
        self.parts.lock().push(Arc::clone(&part));
        Box::new(PartHandle(part))
    }
}

// ============================================================================
// FakeThoughtService
// ============================================================================

struct Scripted<T> {
    delay: Duration,
    result: Result<T, TransportError>,
}

/// Scripted [`ThoughtService`]
///
/// Replies are consumed in order. With no scripted reply, `generate` returns
/// a one-note Thought for the requesting node and `resolve` echoes its first
/// input.
pub struct FakeThoughtService {
    profiles: Mutex<Result<Vec<Profile>, TransportError>>,
    generate_replies: Mutex<VecDeque<Scripted<Value>>>,
    resolve_replies: Mutex<VecDeque<Scripted<ResolveResponse>>>,
    generate_requests: Mutex<Vec<GenerateRequest>>,
    resolve_requests: Mutex<Vec<ResolveRequest>>,
    before_reply: Mutex<Option<ReplyHook>>,
}

type ReplyHook = Box<dyn Fn() + Send + Sync>;

impl FakeThoughtService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            profiles: Mutex::new(Ok(vec![
                Profile::new("wide_acoustic"),
                Profile::new("dark_pulse_synth"),
            ])),
            generate_replies: Mutex::new(VecDeque::new()),
            resolve_replies: Mutex::new(VecDeque::new()),
            generate_requests: Mutex::new(Vec::new()),
            resolve_requests: Mutex::new(Vec::new()),
            before_reply: Mutex::new(None),
        })
    }

    /// Run `hook` as each reply is returned, in the same poll that completes
    /// the call
    pub fn before_reply(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.before_reply.lock() = Some(Box::new(hook));
    }

    fn reply<T>(&self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if let Some(hook) = self.before_reply.lock().as_ref() {
            hook();
        }
        result
    }

    pub fn set_profiles(&self, profiles: Vec<Profile>) {
        *self.profiles.lock() = Ok(profiles);
    }

    pub fn fail_profiles(&self, error: TransportError) {
        *self.profiles.lock() = Err(error);
    }

    pub fn push_generate(&self, delay: Duration, result: Result<Value, TransportError>) {
        self.generate_replies
            .lock()
            .push_back(Scripted { delay, result });
    }

    pub fn push_resolve(&self, delay: Duration, result: Result<ResolveResponse, TransportError>) {
        self.resolve_replies
            .lock()
            .push_back(Scripted { delay, result });
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.generate_requests.lock().clone()
    }

    pub fn resolve_requests(&self) -> Vec<ResolveRequest> {
        self.resolve_requests.lock().clone()
    }
}

#[async_trait]
impl ThoughtService for FakeThoughtService {
    async fn profiles(&self) -> Result<Vec<Profile>, TransportError> {
        self.profiles.lock().clone()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Value, TransportError> {
        self.generate_requests.lock().push(request.clone());
        let scripted = self.generate_replies.lock().pop_front();
        match scripted {
            Some(Scripted { delay, result }) => {
                tokio::time::sleep(delay).await;
                self.reply(result)
            }
            None => self.reply(Ok(thought_json(&request.node_id, &[("0:0:0", 60)]))),
        }
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, TransportError> {
        self.resolve_requests.lock().push(request.clone());
        let scripted = self.resolve_replies.lock().pop_front();
        match scripted {
            Some(Scripted { delay, result }) => {
                tokio::time::sleep(delay).await;
                self.reply(result)
            }
            None => self.reply(Ok(resolved_from(request))),
        }
    }
}

fn resolved_from(request: &ResolveRequest) -> ResolveResponse {
    let resolved = request
        .inputs
        .first()
        .map(|input| ResolvedThought {
            node_id: Some(input.node_id.clone()),
            thought: serde_json::to_value(&input.thought).unwrap(),
        })
        .into_iter()
        .collect();
    ResolveResponse {
        resolved,
        meta: None,
    }
}

/// A resolver reply carrying the given bodies
pub fn resolve_response(bodies: Vec<Value>) -> ResolveResponse {
    ResolveResponse {
        resolved: bodies
            .into_iter()
            .map(|thought| ResolvedThought {
                node_id: None,
                thought,
            })
            .collect(),
        meta: None,
    }
}

/// A backend-declared failure
pub fn backend_error(code: &str, message: &str) -> TransportError {
    TransportError::new(ErrorEnvelope::new(code, message, None))
}

// ============================================================================
// RecordingSink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(String, Arc<Thought>, OutputSource)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<(String, Arc<Thought>, OutputSource)> {
        self.published.lock().clone()
    }
}

impl ThoughtSink for RecordingSink {
    fn publish(&self, node_id: &str, thought: Arc<Thought>, source: OutputSource) {
        self.published
            .lock()
            .push((node_id.to_string(), thought, source));
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Store, scheduler and fakes wired together
pub struct Harness {
    pub store: Arc<RuntimeStore>,
    pub transport: Arc<ManualTransport>,
    pub engine: Arc<RecordingEngine>,
    pub scheduler: Arc<PartSwapScheduler>,
    pub events: broadcast::Receiver<MindEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transport(ManualTransport::new(Meter::default()))
    }

    pub fn with_transport(transport: Arc<ManualTransport>) -> Self {
        let meter = Meter::default();
        let store = Arc::new(RuntimeStore::new(EventBus::new(256)));
        let events = store.event_bus().subscribe();
        let engine = RecordingEngine::new(meter);
        let scheduler = PartSwapScheduler::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&engine) as Arc<dyn AudioEngine>,
            Arc::clone(&store),
            meter,
        );
        Self {
            store,
            transport,
            engine,
            scheduler,
            events,
        }
    }

    /// Every event received so far
    pub fn drain_events(&mut self) -> Vec<MindEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
