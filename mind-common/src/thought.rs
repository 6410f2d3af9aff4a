//! Thought data model
//!
//! A Thought is the unit of playable content per graph node: a looping,
//! timed event sequence plus metadata. Thoughts are immutable once built and
//! are shared as `Arc<Thought>`; a newer Thought supersedes an older one
//! wholesale.
//!
//! Untrusted payloads should go through [`crate::validate::validate`], which
//! applies the structural rules before decoding into these types.

use crate::timing::{Meter, MusicalTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Schema version carried by every Thought
pub const THOUGHT_SCHEMA_VERSION: &str = "thought.v0";

/// Thought status that means "play this"; anything else is a stop request
pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub schema_version: String,
    pub node_id: String,
    pub status: ThoughtStatus,
    pub style_profile: String,
    pub meta: ThoughtMeta,
    pub sequence: Vec<ThoughtEvent>,

    /// Fields this runtime does not interpret, kept so the Thought can be
    /// sent back to the service unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Thought {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Loop span as a musical time (`loop_bars:0:0`)
    pub fn loop_end(&self) -> MusicalTime {
        MusicalTime::bars(self.meta.loop_bars)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtMeta {
    /// Loop length in bars, always positive
    pub loop_bars: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One timed event of a Thought sequence, keyed by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ThoughtEvent {
    Note {
        time: MusicalTime,
        midi: f64,
        velocity: Velocity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<NoteLength>,
    },
    Mute {
        time: MusicalTime,
        velocity: Velocity,
    },
    Cc {
        time: MusicalTime,
        cc: f64,
        value: f64,
        velocity: Velocity,
    },
}

impl ThoughtEvent {
    /// Intra-loop position of the event
    pub fn time(&self) -> MusicalTime {
        match self {
            ThoughtEvent::Note { time, .. }
            | ThoughtEvent::Mute { time, .. }
            | ThoughtEvent::Cc { time, .. } => *time,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ThoughtEvent::Note { .. } => "note",
            ThoughtEvent::Mute { .. } => "mute",
            ThoughtEvent::Cc { .. } => "cc",
        }
    }
}

/// Thought status as sent on the wire
///
/// Only the string `"active"` means play; any other value, including
/// non-strings, is a stop request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThoughtStatus(pub Value);

impl ThoughtStatus {
    pub fn is_active(&self) -> bool {
        self.0.as_str() == Some(STATUS_ACTIVE)
    }
}

impl fmt::Display for ThoughtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// Event velocity
///
/// The wire format only requires velocity to be present and non-null, so the
/// raw value is kept and interpreted on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Velocity(pub Value);

impl Velocity {
    /// Numeric level handed to the audio engine
    ///
    /// Numbers pass through, numeric strings are parsed, booleans map to 1/0,
    /// anything else plays at full level.
    pub fn level(&self) -> f64 {
        match &self.0 {
            Value::Number(n) => n.as_f64().unwrap_or(1.0),
            Value::String(s) => s.trim().parse().unwrap_or(1.0),
            Value::Bool(on) => {
                if *on {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 1.0,
        }
    }
}

impl From<f64> for Velocity {
    fn from(level: f64) -> Self {
        Velocity(Value::from(level))
    }
}

/// Note duration, either seconds or transport notation (`"0:0:2"`, `"8n"`)
///
/// Any other JSON value is kept as-is and plays as one sixteenth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteLength {
    Seconds(f64),
    Notation(String),
    Other(Value),
}

impl NoteLength {
    /// Length in seconds; unreadable notation falls back to one sixteenth
    pub fn to_seconds(&self, meter: &Meter) -> f64 {
        match self {
            NoteLength::Seconds(s) => *s,
            NoteLength::Notation(n) => meter
                .notation_to_seconds(n)
                .unwrap_or_else(|| MusicalTime::SIXTEENTH.to_seconds(meter)),
            NoteLength::Other(_) => MusicalTime::SIXTEENTH.to_seconds(meter),
        }
    }
}
