//! The code-evaluation seam.
//!
//! Evaluation itself is an external collaborator: anything that can run a
//! source string against a namespace can drive the engine by implementing
//! [`Evaluator`].

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::sink::OutputSinks;

/// Mutable binding environment shared across all segments of a session.
///
/// Created empty at session start, mutated by every segment in order, and
/// discarded at session end.
pub type Namespace = HashMap<String, Value>;

/// Failure raised while evaluating one code segment.
///
/// `Display` renders only the message; that string form is the
/// authoritative cross-boundary contract. The full detail is available
/// via [`EvalError::diagnostic`] for the error stream side channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    /// Error class, e.g. `NameError`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Optional multi-line trace.
    pub trace: Option<String>,
}

impl EvalError {
    /// Create an error with a kind and message.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
        }
    }

    /// Attach a trace.
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Full diagnostic detail (kind, message, trace) for human inspection.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let mut out = format!("{}: {}\n", self.kind, self.message);
        if let Some(trace) = &self.trace {
            out.push_str(trace);
            if !trace.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Evaluates one code segment against a session's shared namespace.
///
/// Implementations write any program output through `sinks` rather than
/// the process-wide streams, and report failures as values; the engine
/// decides what a failure means for the rest of the session.
pub trait Evaluator: Send {
    /// Evaluate `code`, binding and reading names in `namespace`.
    ///
    /// # Errors
    /// Returns the evaluation failure for the segment.
    fn eval(
        &mut self,
        code: &str,
        namespace: &mut Namespace,
        sinks: &OutputSinks,
    ) -> Result<(), EvalError>;
}
