//! Musical timing: `bar:beat:sixteenth` positions and tempo/meter conversions
//!
//! Thought sequences address time musically. A [`MusicalTime`] of `1:2:3` means
//! bar 1, quarter-note beat 2, sixteenth 3 (all zero-based), the same
//! convention the audio transport uses for its bars:quarters:sixteenths
//! notation. Converting to seconds needs a [`Meter`] (tempo + time signature).
//!
//! # Examples
//!
//! ```rust
//! use mind_common::timing::{Meter, MusicalTime};
//!
//! let meter = Meter::default(); // 120 BPM, 4/4
//! let t: MusicalTime = "1:0:0".parse().unwrap();
//! assert_eq!(t.to_seconds(&meter), 2.0);
//! assert_eq!(meter.next_bar_after(0.5), 2.0);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A position in musical time: bar, quarter-note beat, sixteenth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MusicalTime {
    pub bar: u32,
    pub beat: u32,
    pub sixteenth: u32,
}

/// Returned when a string is not of the form `bar:beat:sixteenth`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("time must match bar:beat:sixteenth, got {0:?}")]
pub struct ParseTimeError(pub String);

impl MusicalTime {
    /// Loop origin
    pub const ZERO: MusicalTime = MusicalTime::new(0, 0, 0);

    /// Default note length when an event carries no duration
    pub const SIXTEENTH: MusicalTime = MusicalTime::new(0, 0, 1);

    pub const fn new(bar: u32, beat: u32, sixteenth: u32) -> Self {
        Self {
            bar,
            beat,
            sixteenth,
        }
    }

    /// Whole-bar span, used for loop ends (`loop_bars:0:0`)
    pub const fn bars(bars: u32) -> Self {
        Self::new(bars, 0, 0)
    }

    /// Position measured in quarter notes from the origin
    pub fn to_quarters(&self, meter: &Meter) -> f64 {
        self.bar as f64 * meter.quarters_per_bar()
            + self.beat as f64
            + self.sixteenth as f64 / 4.0
    }

    /// Position in seconds at the meter's tempo
    pub fn to_seconds(&self, meter: &Meter) -> f64 {
        self.to_quarters(meter) * meter.seconds_per_quarter()
    }
}

impl FromStr for MusicalTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(ParseTimeError(s.to_string()));
        }

        let mut fields = [0u32; 3];
        for (field, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseTimeError(s.to_string()));
            }
            // Digits only, so the parse can fail only on overflow
            *field = part.parse().unwrap_or(u32::MAX);
        }

        Ok(Self::new(fields[0], fields[1], fields[2]))
    }
}

impl fmt::Display for MusicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.bar, self.beat, self.sixteenth)
    }
}

impl Serialize for MusicalTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MusicalTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Tempo and time signature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    /// Quarter notes per minute
    pub bpm: f64,
    /// Time signature numerator
    pub beats_per_bar: u32,
    /// Time signature denominator
    pub beat_unit: u32,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new(120.0, 4, 4)
    }
}

impl Meter {
    pub fn new(bpm: f64, beats_per_bar: u32, beat_unit: u32) -> Self {
        Self {
            bpm,
            beats_per_bar,
            beat_unit,
        }
    }

    /// Build a meter from a tempo and a signature string such as `"4/4"` or `"6/8"`
    pub fn from_time_signature(bpm: f64, signature: &str) -> Result<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(Error::InvalidInput(format!("tempo must be positive, got {}", bpm)));
        }

        let (num, den) = signature
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("invalid time signature: {}", signature)))?;
        let beats_per_bar: u32 = num
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid time signature: {}", signature)))?;
        let beat_unit: u32 = den
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid time signature: {}", signature)))?;

        if beats_per_bar == 0 || beat_unit == 0 {
            return Err(Error::InvalidInput(format!(
                "invalid time signature: {}",
                signature
            )));
        }

        Ok(Self::new(bpm, beats_per_bar, beat_unit))
    }

    pub fn quarters_per_bar(&self) -> f64 {
        self.beats_per_bar as f64 * 4.0 / self.beat_unit as f64
    }

    pub fn seconds_per_quarter(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Length of one bar in seconds
    pub fn bar_seconds(&self) -> f64 {
        self.quarters_per_bar() * self.seconds_per_quarter()
    }

    /// First bar boundary strictly after `seconds`
    pub fn next_bar_after(&self, seconds: f64) -> f64 {
        let bar = self.bar_seconds();
        ((seconds / bar).floor() + 1.0) * bar
    }

    /// Resolve a duration written in transport notation to seconds
    ///
    /// Accepts `bar:beat:sixteenth`, note values (`"8n"` = eighth note),
    /// measures (`"2m"`) and plain seconds (`"0.25"`). Returns `None` for
    /// anything else.
    pub fn notation_to_seconds(&self, notation: &str) -> Option<f64> {
        let notation = notation.trim();

        if let Ok(time) = notation.parse::<MusicalTime>() {
            return Some(time.to_seconds(self));
        }

        if let Some(value) = notation.strip_suffix('n') {
            let division: u32 = value.parse().ok().filter(|d| *d > 0)?;
            return Some(4.0 / division as f64 * self.seconds_per_quarter());
        }

        if let Some(value) = notation.strip_suffix('m') {
            let bars: u32 = value.parse().ok()?;
            return Some(bars as f64 * self.bar_seconds());
        }

        notation
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
    }
}
