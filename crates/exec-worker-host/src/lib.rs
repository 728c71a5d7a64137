//! Host-side client for the exec worker.
//!
//! Provides:
//! - `HostClient` - sends exec requests and correlates worker events by
//!   session
//! - `SessionHandle` - per-session stream of typed events

pub mod client;

pub use client::{HostClient, SessionEvent, SessionFailed, SessionHandle};
