//! The envelope message unit crossing the host/worker boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace prefix carried by every message this subsystem owns.
///
/// Inbound messages without it belong to another subsystem sharing the
/// channel and are ignored.
pub const MSG_TYPE_PREFIX: &str = "exec-worker.";

/// A tagged message unit with a namespaced type and a value payload.
///
/// `value` holds the named arguments for the target handler. Envelopes are
/// immutable once sent and have no identity beyond their content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Namespaced message type, e.g. `exec-worker.exec-started`.
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Named arguments for the target handler.
    pub value: Map<String, Value>,
}

impl Envelope {
    /// Build an envelope for `subtype` under the fixed namespace prefix.
    #[must_use]
    pub fn new(subtype: &str, value: Map<String, Value>) -> Self {
        Self {
            msg_type: format!("{MSG_TYPE_PREFIX}{subtype}"),
            value,
        }
    }

    /// The portion of the type after the namespace prefix, used for
    /// handler lookup.
    ///
    /// Returns `None` for messages owned by another subsystem.
    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.msg_type.strip_prefix(MSG_TYPE_PREFIX)
    }
}
