//! Inbound message routing.

use std::collections::HashMap;

use exec_worker_core::Envelope;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::exec::EngineError;

/// Routing failure.
///
/// Both variants signal a host/worker integration mismatch, not a runtime
/// condition to recover from; the worker loop propagates them.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message carried our prefix but no handler is registered for
    /// its subtype.
    #[error("no handler registered for message subtype `{0}`")]
    UnknownSubtype(String),
    /// The matched handler failed.
    #[error("handler for `{subtype}` failed: {source}")]
    Handler {
        subtype: String,
        #[source]
        source: HandlerError,
    },
}

/// Failure inside a message handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The envelope `value` did not match the handler's parameters.
    #[error("invalid arguments: {0}")]
    InvalidArgs(#[from] serde_json::Error),
    /// The engine refused the request.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A registered message handler.
///
/// Handlers receive the envelope `value` as named arguments and emit any
/// response envelopes themselves; the dispatcher sends nothing back to the
/// host on its own.
pub trait Handler: Send {
    /// Handle one message.
    ///
    /// # Errors
    /// Returns an error if the arguments do not match the handler's
    /// parameters or the handler rejects the request. Evaluation failures
    /// inside an exec session are not errors at this level; they are
    /// reported to the host and recovered.
    fn handle(&mut self, args: &Map<String, Value>) -> Result<(), HandlerError>;
}

/// Builder for the subtype-to-handler table.
///
/// Registration is a startup-time step; the finished registry is immutable
/// and handed to [`Dispatcher::new`]. Registering a subtype twice keeps
/// the last handler.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `subtype`.
    #[must_use]
    pub fn register(mut self, subtype: impl Into<String>, handler: impl Handler + 'static) -> Self {
        let subtype = subtype.into();
        if self
            .handlers
            .insert(subtype.clone(), Box::new(handler))
            .is_some()
        {
            tracing::debug!(%subtype, "replacing existing handler registration");
        }
        self
    }

    /// Finish the registry.
    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable subtype-to-handler lookup table.
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

/// What [`Dispatcher::dispatch`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message carried our prefix and its handler ran.
    Handled,
    /// The message belongs to another subsystem sharing the channel.
    Ignored,
}

/// Routes inbound envelopes to registered handlers.
pub struct Dispatcher {
    registry: HandlerRegistry,
}

impl Dispatcher {
    /// Create a dispatcher over a finished registry.
    #[must_use]
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Route one inbound envelope.
    ///
    /// Messages without the namespace prefix are silently ignored. The
    /// matched handler runs to completion before this returns; there is no
    /// suspension point for a second message to interleave.
    ///
    /// # Errors
    /// Returns a routing error for an unregistered subtype or a handler
    /// failure; both are fatal to the worker loop.
    pub fn dispatch(&mut self, envelope: &Envelope) -> Result<DispatchOutcome, DispatchError> {
        let Some(subtype) = envelope.subtype() else {
            tracing::trace!(msg_type = %envelope.msg_type, "ignoring message for another subsystem");
            return Ok(DispatchOutcome::Ignored);
        };

        let handler = self
            .registry
            .handlers
            .get_mut(subtype)
            .ok_or_else(|| DispatchError::UnknownSubtype(subtype.to_string()))?;

        handler
            .handle(&envelope.value)
            .map_err(|source| DispatchError::Handler {
                subtype: subtype.to_string(),
                source,
            })?;

        Ok(DispatchOutcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        last_arg: Arc<std::sync::Mutex<Option<String>>>,
    }

    impl Handler for CountingHandler {
        fn handle(&mut self, args: &Map<String, Value>) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_arg.lock().unwrap() = args
                .get("name")
                .and_then(Value::as_str)
                .map(String::from);
            Ok(())
        }
    }

    fn counting_dispatcher() -> (Dispatcher, Arc<AtomicUsize>, Arc<std::sync::Mutex<Option<String>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let last_arg = Arc::new(std::sync::Mutex::new(None));
        let handler = CountingHandler {
            calls: Arc::clone(&calls),
            last_arg: Arc::clone(&last_arg),
        };
        let dispatcher = Dispatcher::new(RegistryBuilder::new().register("probe", handler).build());
        (dispatcher, calls, last_arg)
    }

    #[test]
    fn foreign_prefix_is_ignored_without_invocation() {
        let (mut dispatcher, calls, _) = counting_dispatcher();
        let envelope = Envelope {
            msg_type: "other-subsystem.probe".to_string(),
            value: Map::new(),
        };

        let outcome = dispatcher.dispatch(&envelope).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_subtype_is_a_fatal_routing_error() {
        let (mut dispatcher, calls, _) = counting_dispatcher();
        let envelope = Envelope::new("no-such-subtype", Map::new());

        let error = dispatcher.dispatch(&envelope).unwrap_err();
        assert!(matches!(
            error,
            DispatchError::UnknownSubtype(subtype) if subtype == "no-such-subtype"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_receives_the_value_as_named_arguments() {
        let (mut dispatcher, calls, last_arg) = counting_dispatcher();
        let mut value = Map::new();
        value.insert("name".to_string(), Value::String("segment".to_string()));

        let outcome = dispatcher.dispatch(&Envelope::new("probe", value)).unwrap();
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_arg.lock().unwrap().as_deref(), Some("segment"));
    }

    #[test]
    fn last_registration_wins() {
        struct TaggingHandler {
            tag: &'static str,
            seen: Arc<std::sync::Mutex<Vec<&'static str>>>,
        }
        impl Handler for TaggingHandler {
            fn handle(&mut self, _args: &Map<String, Value>) -> Result<(), HandlerError> {
                self.seen.lock().unwrap().push(self.tag);
                Ok(())
            }
        }

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let registry = RegistryBuilder::new()
            .register(
                "probe",
                TaggingHandler {
                    tag: "first",
                    seen: Arc::clone(&seen),
                },
            )
            .register(
                "probe",
                TaggingHandler {
                    tag: "second",
                    seen: Arc::clone(&seen),
                },
            )
            .build();
        let mut dispatcher = Dispatcher::new(registry);

        dispatcher.dispatch(&Envelope::new("probe", Map::new())).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["second"]);
    }
}
