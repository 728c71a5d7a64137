//! The `exec` handler: sequential segment execution with output capture.

use exec_worker_core::{
    EvalError, Evaluator, ExecEvent, Namespace, OutboundSender, OutputSinks,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dispatcher::{Handler, HandlerError};

/// Subtype the execution engine is registered under.
pub const EXEC_SUBTYPE: &str = "exec";

/// Arguments of an `exec` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecRequest {
    /// Caller-supplied opaque session token. Uniqueness is the host's
    /// responsibility, not enforced here.
    pub session_id: String,
    /// Ordered code segments. The contents are not validated; an empty
    /// list is legal.
    pub codes: Vec<String>,
}

/// Engine-level failure.
///
/// Evaluation failures never surface here; they are reported to the host
/// via `exec-code-error`/`exec-error` and recovered.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A second `exec` request arrived while a session was running.
    #[error("an exec session is already in flight")]
    SessionInFlight,
}

/// Sequential execution engine for `exec` sessions.
///
/// Runs each segment of a session against one shared namespace, in order,
/// never concurrently. The engine owns the sinks in effect for
/// evaluation; during a segment they point at capture wrappers scoped to
/// that segment, and the parent pair saved at session entry is reinstated
/// on every exit path.
pub struct ExecEngine<E> {
    evaluator: E,
    outbound: OutboundSender,
    sinks: OutputSinks,
    in_flight: bool,
}

impl<E: Evaluator> ExecEngine<E> {
    /// Create an engine whose parent sinks are the real console streams.
    #[must_use]
    pub fn new(evaluator: E, outbound: OutboundSender) -> Self {
        Self::with_sinks(evaluator, outbound, OutputSinks::console())
    }

    /// Create an engine with explicit parent sinks.
    #[must_use]
    pub fn with_sinks(evaluator: E, outbound: OutboundSender, sinks: OutputSinks) -> Self {
        Self {
            evaluator,
            outbound,
            sinks,
            in_flight: false,
        }
    }

    /// The sinks currently in effect. Outside a running session this is
    /// the parent pair the next session will wrap.
    #[must_use]
    pub fn current_sinks(&self) -> &OutputSinks {
        &self.sinks
    }

    /// Run one exec session to completion.
    ///
    /// Emits `exec-started` first and exactly one of `exec-success` or
    /// `exec-error` last. The first failing segment aborts the remainder;
    /// its error string is carried in both the segment-scoped and the
    /// session-scoped message. Cancellation and timeouts are not
    /// supported: the session runs to completion or to the first failure.
    ///
    /// # Errors
    /// Returns [`EngineError::SessionInFlight`] if a session is already
    /// running. The single-threaded worker loop makes that unreachable in
    /// normal operation; it is enforced here rather than assumed.
    pub fn run_session(&mut self, request: &ExecRequest) -> Result<(), EngineError> {
        if self.in_flight {
            return Err(EngineError::SessionInFlight);
        }
        self.in_flight = true;

        self.outbound.send(ExecEvent::Started {
            session_id: request.session_id.clone(),
        });

        let parents = self.sinks.clone();
        let outcome = self.run_segments(request, &parents);
        // Reinstate the parent pair saved at session entry. Every exit
        // path of `run_segments` flows through here.
        self.sinks = parents;

        match outcome {
            Ok(()) => self.outbound.send(ExecEvent::Success {
                session_id: request.session_id.clone(),
            }),
            Err(error) => self.outbound.send(ExecEvent::Error {
                session_id: request.session_id.clone(),
                error: error.to_string(),
            }),
        }

        self.in_flight = false;
        Ok(())
    }

    fn run_segments(
        &mut self,
        request: &ExecRequest,
        parents: &OutputSinks,
    ) -> Result<(), EvalError> {
        let mut namespace = Namespace::new();

        for (code_idx, code) in request.codes.iter().enumerate() {
            self.outbound.send(ExecEvent::CodeStarted {
                session_id: request.session_id.clone(),
                code_idx,
            });

            // Each segment gets fresh capture wrappers around the sinks
            // saved at session entry, not around the previous segment's
            // wrappers.
            self.sinks =
                OutputSinks::captured(&request.session_id, code_idx, parents, &self.outbound);
            let sinks = self.sinks.clone();

            if let Err(error) = self.evaluator.eval(code, &mut namespace, &sinks) {
                self.outbound.send(ExecEvent::CodeError {
                    session_id: request.session_id.clone(),
                    code_idx,
                    error: error.to_string(),
                });
                if let Err(io_error) = sinks.stderr.write(&error.diagnostic()) {
                    tracing::warn!("failed to write error diagnostic: {io_error}");
                }
                return Err(error);
            }

            self.outbound.send(ExecEvent::CodeSuccess {
                session_id: request.session_id.clone(),
                code_idx,
            });
        }

        Ok(())
    }
}

/// Adapter registering an [`ExecEngine`] as the `exec` message handler.
pub struct ExecHandler<E> {
    engine: ExecEngine<E>,
}

impl<E: Evaluator> ExecHandler<E> {
    /// Wrap an engine for registration.
    #[must_use]
    pub fn new(engine: ExecEngine<E>) -> Self {
        Self { engine }
    }
}

impl<E: Evaluator> Handler for ExecHandler<E> {
    fn handle(&mut self, args: &Map<String, Value>) -> Result<(), HandlerError> {
        let request: ExecRequest = serde_json::from_value(Value::Object(args.clone()))?;
        self.engine.run_session(&request)?;
        Ok(())
    }
}
