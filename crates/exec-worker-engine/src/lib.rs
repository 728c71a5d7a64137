//! Message routing and sequential execution for the exec worker.
//!
//! This crate provides:
//! - `Dispatcher` - routes inbound envelopes to registered handlers
//! - `ExecEngine` - runs ordered code segments against a shared namespace,
//!   capturing their output into outbound envelopes

pub mod dispatcher;
pub mod exec;

pub use dispatcher::{
    DispatchError, DispatchOutcome, Dispatcher, Handler, HandlerError, HandlerRegistry,
    RegistryBuilder,
};
pub use exec::{EXEC_SUBTYPE, EngineError, ExecEngine, ExecHandler, ExecRequest};
