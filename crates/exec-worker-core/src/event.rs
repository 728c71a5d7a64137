//! Typed vocabulary of the events a worker emits while running a session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::Envelope;

/// Which process stream a captured write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChannel {
    Stdout,
    Stderr,
}

/// Outbound worker event, one per protocol subtype.
///
/// Converts losslessly into an [`Envelope`]; the subtype becomes the
/// envelope type (under the namespace prefix) and the fields become the
/// value payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecEvent {
    /// A session began.
    Started { session_id: String },
    /// A code segment began.
    CodeStarted { session_id: String, code_idx: usize },
    /// A write captured from a segment's output stream.
    StreamWrite {
        session_id: String,
        code_idx: usize,
        data: String,
        #[serde(skip)]
        channel: StreamChannel,
    },
    /// A flush captured from a segment's output stream.
    StreamFlush {
        session_id: String,
        code_idx: usize,
        #[serde(skip)]
        channel: StreamChannel,
    },
    /// A code segment evaluated successfully.
    CodeSuccess { session_id: String, code_idx: usize },
    /// A code segment failed; `error` is the string form of the failure.
    CodeError {
        session_id: String,
        code_idx: usize,
        error: String,
    },
    /// Every segment of the session succeeded.
    Success { session_id: String },
    /// The session aborted; `error` is the string form of the failure.
    Error { session_id: String, error: String },
}

impl ExecEvent {
    /// The protocol subtype this event is emitted under.
    #[must_use]
    pub const fn subtype(&self) -> &'static str {
        match self {
            Self::Started { .. } => "exec-started",
            Self::CodeStarted { .. } => "exec-code-started",
            Self::StreamWrite {
                channel: StreamChannel::Stdout,
                ..
            } => "exec-code-stdout-write",
            Self::StreamWrite {
                channel: StreamChannel::Stderr,
                ..
            } => "exec-code-stderr-write",
            Self::StreamFlush {
                channel: StreamChannel::Stdout,
                ..
            } => "exec-code-stdout-flush",
            Self::StreamFlush {
                channel: StreamChannel::Stderr,
                ..
            } => "exec-code-stderr-flush",
            Self::CodeSuccess { .. } => "exec-code-success",
            Self::CodeError { .. } => "exec-code-error",
            Self::Success { .. } => "exec-success",
            Self::Error { .. } => "exec-error",
        }
    }

    /// Parse an outbound worker envelope back into its typed event.
    ///
    /// Returns `None` for foreign messages, unknown subtypes, or payloads
    /// missing required fields. Hosts use this to correlate events by
    /// session.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        #[derive(Deserialize)]
        struct Session {
            session_id: String,
        }
        #[derive(Deserialize)]
        struct Code {
            session_id: String,
            code_idx: usize,
        }
        #[derive(Deserialize)]
        struct Write {
            session_id: String,
            code_idx: usize,
            data: String,
        }
        #[derive(Deserialize)]
        struct CodeError {
            session_id: String,
            code_idx: usize,
            error: String,
        }
        #[derive(Deserialize)]
        struct SessionError {
            session_id: String,
            error: String,
        }

        fn parse<T: serde::de::DeserializeOwned>(value: &Map<String, Value>) -> Option<T> {
            serde_json::from_value(Value::Object(value.clone())).ok()
        }

        let subtype = envelope.subtype()?;
        let value = &envelope.value;
        let event = match subtype {
            "exec-started" => {
                let p: Session = parse(value)?;
                Self::Started {
                    session_id: p.session_id,
                }
            }
            "exec-code-started" => {
                let p: Code = parse(value)?;
                Self::CodeStarted {
                    session_id: p.session_id,
                    code_idx: p.code_idx,
                }
            }
            "exec-code-stdout-write" | "exec-code-stderr-write" => {
                let p: Write = parse(value)?;
                Self::StreamWrite {
                    session_id: p.session_id,
                    code_idx: p.code_idx,
                    data: p.data,
                    channel: if subtype == "exec-code-stdout-write" {
                        StreamChannel::Stdout
                    } else {
                        StreamChannel::Stderr
                    },
                }
            }
            "exec-code-stdout-flush" | "exec-code-stderr-flush" => {
                let p: Code = parse(value)?;
                Self::StreamFlush {
                    session_id: p.session_id,
                    code_idx: p.code_idx,
                    channel: if subtype == "exec-code-stdout-flush" {
                        StreamChannel::Stdout
                    } else {
                        StreamChannel::Stderr
                    },
                }
            }
            "exec-code-success" => {
                let p: Code = parse(value)?;
                Self::CodeSuccess {
                    session_id: p.session_id,
                    code_idx: p.code_idx,
                }
            }
            "exec-code-error" => {
                let p: CodeError = parse(value)?;
                Self::CodeError {
                    session_id: p.session_id,
                    code_idx: p.code_idx,
                    error: p.error,
                }
            }
            "exec-success" => {
                let p: Session = parse(value)?;
                Self::Success {
                    session_id: p.session_id,
                }
            }
            "exec-error" => {
                let p: SessionError = parse(value)?;
                Self::Error {
                    session_id: p.session_id,
                    error: p.error,
                }
            }
            _ => return None,
        };
        Some(event)
    }

    /// The session the event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Started { session_id }
            | Self::CodeStarted { session_id, .. }
            | Self::StreamWrite { session_id, .. }
            | Self::StreamFlush { session_id, .. }
            | Self::CodeSuccess { session_id, .. }
            | Self::CodeError { session_id, .. }
            | Self::Success { session_id }
            | Self::Error { session_id, .. } => session_id,
        }
    }
}

impl From<ExecEvent> for Envelope {
    fn from(event: ExecEvent) -> Self {
        let subtype = event.subtype();
        // Untagged struct variants always serialize to objects.
        let value = match serde_json::to_value(&event) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self::new(subtype, value)
    }
}
