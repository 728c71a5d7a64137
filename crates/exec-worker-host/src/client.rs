//! Request submission and per-session event correlation.

use std::collections::HashMap;

use exec_worker_core::{Envelope, ExecEvent, StreamChannel};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

/// Terminal failure of a session, carrying the worker's error string.
///
/// The string form is the whole cross-boundary contract; nothing richer
/// survives the channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SessionFailed(pub String);

/// Event delivered to the owner of one host-side session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The worker picked up the session.
    Started,
    /// A code segment began.
    CodeStarted { code_idx: usize },
    /// Captured standard output from a segment.
    Stdout { code_idx: usize, data: String },
    /// The segment's standard output was flushed.
    StdoutFlush { code_idx: usize },
    /// Captured standard error from a segment.
    Stderr { code_idx: usize, data: String },
    /// The segment's standard error was flushed.
    StderrFlush { code_idx: usize },
    /// A code segment completed.
    CodeSuccess { code_idx: usize },
    /// A code segment failed.
    CodeError { code_idx: usize, error: String },
    /// Terminal event: the session's outcome. Nothing follows it.
    Finished(Result<(), SessionFailed>),
}

/// Handle to one in-flight session.
pub struct SessionHandle {
    /// The session id sent to the worker.
    pub session_id: String,
    /// Ordered session events, ending with [`SessionEvent::Finished`].
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionHandle {
    /// Drain events until the terminal one and return the session outcome.
    ///
    /// # Errors
    /// Returns the worker's error string if the session failed, or a
    /// channel-closed failure if the worker went away mid-session.
    pub async fn wait(&mut self) -> Result<(), SessionFailed> {
        while let Some(event) = self.events.recv().await {
            if let SessionEvent::Finished(result) = event {
                return result;
            }
        }
        Err(SessionFailed(
            "worker channel closed before the session finished".to_string(),
        ))
    }
}

/// Sends exec requests to the worker and routes its events back to the
/// owning session.
///
/// Session ids are generated from a local sequence; callers needing their
/// own tokens can use [`HostClient::run_with_id`]. Unlike the worker's
/// dispatcher, unknown subtypes here are logged and dropped: the host
/// must tolerate a newer worker.
pub struct HostClient {
    to_worker: mpsc::UnboundedSender<Envelope>,
    sessions: HashMap<String, mpsc::UnboundedSender<SessionEvent>>,
    session_seq: u64,
}

impl HostClient {
    /// Create a client sending requests into `to_worker`.
    #[must_use]
    pub fn new(to_worker: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            to_worker,
            sessions: HashMap::new(),
            session_seq: 0,
        }
    }

    /// Submit an exec request for `codes` under a generated session id.
    pub fn run(&mut self, codes: Vec<String>) -> SessionHandle {
        let session_id = self.session_seq.to_string();
        self.session_seq += 1;
        self.run_with_id(session_id, codes)
    }

    /// Submit an exec request under a caller-chosen session id.
    pub fn run_with_id(&mut self, session_id: String, codes: Vec<String>) -> SessionHandle {
        let (tx, events) = mpsc::unbounded_channel();
        self.sessions.insert(session_id.clone(), tx);

        let mut value = Map::new();
        value.insert("session_id".to_string(), Value::String(session_id.clone()));
        value.insert(
            "codes".to_string(),
            Value::Array(codes.into_iter().map(Value::String).collect()),
        );
        // Fire-and-forget; a dead worker surfaces as a closed event
        // channel, not as a send error.
        if self.to_worker.send(Envelope::new("exec", value)).is_err() {
            tracing::warn!(%session_id, "worker channel closed, exec request dropped");
            self.sessions.remove(&session_id);
        }

        SessionHandle { session_id, events }
    }

    /// Route one envelope coming back from the worker.
    ///
    /// Foreign messages are ignored. Prefixed messages that do not parse
    /// as a known worker event, or that reference an unknown session, are
    /// logged and dropped.
    pub fn on_message(&mut self, envelope: &Envelope) {
        let Some(subtype) = envelope.subtype() else {
            return;
        };
        let Some(event) = ExecEvent::from_envelope(envelope) else {
            tracing::warn!(%subtype, "unhandled worker message");
            return;
        };

        let session_id = event.session_id().to_string();
        let (session_event, terminal) = match event {
            ExecEvent::Started { .. } => (SessionEvent::Started, false),
            ExecEvent::CodeStarted { code_idx, .. } => {
                (SessionEvent::CodeStarted { code_idx }, false)
            }
            ExecEvent::StreamWrite {
                code_idx,
                data,
                channel,
                ..
            } => match channel {
                StreamChannel::Stdout => (SessionEvent::Stdout { code_idx, data }, false),
                StreamChannel::Stderr => (SessionEvent::Stderr { code_idx, data }, false),
            },
            ExecEvent::StreamFlush {
                code_idx, channel, ..
            } => match channel {
                StreamChannel::Stdout => (SessionEvent::StdoutFlush { code_idx }, false),
                StreamChannel::Stderr => (SessionEvent::StderrFlush { code_idx }, false),
            },
            ExecEvent::CodeSuccess { code_idx, .. } => {
                (SessionEvent::CodeSuccess { code_idx }, false)
            }
            ExecEvent::CodeError {
                code_idx, error, ..
            } => (SessionEvent::CodeError { code_idx, error }, false),
            ExecEvent::Success { .. } => (SessionEvent::Finished(Ok(())), true),
            ExecEvent::Error { error, .. } => {
                (SessionEvent::Finished(Err(SessionFailed(error))), true)
            }
        };

        let Some(tx) = self.sessions.get(&session_id) else {
            tracing::warn!(%session_id, "event for unknown session");
            return;
        };
        let _ = tx.send(session_event);
        if terminal {
            self.sessions.remove(&session_id);
        }
    }

    /// Number of sessions still awaiting their terminal event.
    #[must_use]
    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }
}
