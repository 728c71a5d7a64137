//! Transport layer for the host/worker channel.
//!
//! Provides:
//! - Wire loops (one JSON envelope per line, each direction a FIFO pipe)
//! - The worker's sequential inbound processing loop

pub mod wire;
pub mod worker;

pub use wire::{WireError, read_envelopes, write_envelopes};
pub use worker::{WorkerError, run_worker, serve};
