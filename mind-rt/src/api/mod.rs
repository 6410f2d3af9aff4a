//! HTTP/SSE control surface
//!
//! Lets a UI (or curl) drive the graph host and observe the runtime:
//! node creation and widget edits, gate wiring, status and outputs, and a
//! live SSE feed of runtime events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
