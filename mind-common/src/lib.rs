//! # Mind Common Library
//!
//! Shared code for the Mind thought runtime and its tooling:
//! - Thought data model (tagged event union, musical time)
//! - Schema validation of untrusted Thought payloads
//! - Node status types
//! - Event types (MindEvent enum) and the EventBus
//! - Wire types of the remote generation/resolution service
//! - Configuration loading

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod status;
pub mod thought;
pub mod timing;
pub mod validate;

pub use error::{Error, Result};
pub use status::{NodeState, NodeStatus};
pub use thought::{Thought, ThoughtEvent};
pub use timing::{Meter, MusicalTime};
pub use validate::{validate, ValidationError};
