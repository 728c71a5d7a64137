//! Core abstractions for the exec worker.
//!
//! This crate provides the fundamental building blocks:
//! - `Envelope` - namespaced message unit crossing the host/worker boundary
//! - `ExecEvent` - typed vocabulary of outbound worker events
//! - `OutboundSender` - FIFO fire-and-forget channel back to the host
//! - Sink and Evaluator traits - the output-capture and code-evaluation seams

pub mod envelope;
pub mod evaluator;
pub mod event;
pub mod outbound;
pub mod sink;

pub use envelope::{Envelope, MSG_TYPE_PREFIX};
pub use evaluator::{EvalError, Evaluator, Namespace};
pub use event::{ExecEvent, StreamChannel};
pub use outbound::OutboundSender;
pub use sink::{CapturedSink, ConsoleSink, NullSink, OutputSinks, StreamSink};
