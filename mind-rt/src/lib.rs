//! # Mind Thought Runtime (mind-rt)
//!
//! Keeps looping playback of per-node Thoughts consistent while intent edits,
//! generation responses and conflict resolutions arrive asynchronously.
//!
//! **Purpose:** Coordinate per-node generation requests (debounce, cancellation,
//! staleness), swap audio parts only on bar boundaries, track node status, and
//! merge multi-input Thoughts through the remote resolver.
//!
//! **Architecture:** tokio tasks around node-id keyed registries behind
//! `parking_lot` mutexes; audio and clock are reached through the traits in
//! [`transport`]; the remote service through [`client::ThoughtService`].

pub mod api;
pub mod client;
pub mod error;
pub mod generation;
pub mod graph;
pub mod profiles;
pub mod request;
pub mod resolution;
pub mod scheduler;
pub mod status;
pub mod transport;

pub use error::{Error, Result};
pub use graph::Graph;
pub use request::RequestOutcome;
pub use status::RuntimeStore;
