//! Output sinks and per-segment stream capture.

use std::{
    io::{self, Write as _},
    sync::Arc,
};

use crate::{
    event::{ExecEvent, StreamChannel},
    outbound::OutboundSender,
};

/// Destination for standard-output or standard-error writes during
/// evaluation.
///
/// Evaluators receive sinks explicitly instead of reaching for the
/// process-wide streams.
pub trait StreamSink: Send + Sync {
    /// Write `data` to the sink.
    ///
    /// # Errors
    /// Returns an error if the underlying stream write fails.
    fn write(&self, data: &str) -> io::Result<()>;

    /// Flush the sink.
    ///
    /// # Errors
    /// Returns an error if the underlying stream flush fails.
    fn flush(&self) -> io::Result<()>;
}

/// The stdout/stderr sink pair in effect for evaluation.
///
/// Sinks are shared by reference, so restoring a saved pair is an identity
/// operation, checkable with [`OutputSinks::same_as`].
#[derive(Clone)]
pub struct OutputSinks {
    /// Standard-output destination.
    pub stdout: Arc<dyn StreamSink>,
    /// Standard-error destination.
    pub stderr: Arc<dyn StreamSink>,
}

impl OutputSinks {
    /// Sinks wired to the real process streams.
    #[must_use]
    pub fn console() -> Self {
        Self {
            stdout: Arc::new(ConsoleSink::Stdout),
            stderr: Arc::new(ConsoleSink::Stderr),
        }
    }

    /// Sinks that discard everything. Useful when the host consumes output
    /// exclusively through the message channel.
    #[must_use]
    pub fn null() -> Self {
        Self {
            stdout: Arc::new(NullSink),
            stderr: Arc::new(NullSink),
        }
    }

    /// Wrap `parents` in captured sinks scoped to one code segment.
    #[must_use]
    pub fn captured(
        session_id: &str,
        code_idx: usize,
        parents: &Self,
        outbound: &OutboundSender,
    ) -> Self {
        Self {
            stdout: Arc::new(CapturedSink::new(
                session_id,
                code_idx,
                StreamChannel::Stdout,
                Arc::clone(&parents.stdout),
                outbound.clone(),
            )),
            stderr: Arc::new(CapturedSink::new(
                session_id,
                code_idx,
                StreamChannel::Stderr,
                Arc::clone(&parents.stderr),
                outbound.clone(),
            )),
        }
    }

    /// Whether both sinks are the very same objects as in `other`.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.stdout, &other.stdout) && Arc::ptr_eq(&self.stderr, &other.stderr)
    }
}

/// Sink wired to one of the real process streams.
#[derive(Debug, Clone, Copy)]
pub enum ConsoleSink {
    Stdout,
    Stderr,
}

impl StreamSink for ConsoleSink {
    fn write(&self, data: &str) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().write_all(data.as_bytes()),
            Self::Stderr => io::stderr().write_all(data.as_bytes()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().flush(),
            Self::Stderr => io::stderr().flush(),
        }
    }
}

/// Sink that discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn write(&self, _data: &str) -> io::Result<()> {
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Redirection wrapper scoped to exactly one `(session_id, code_idx)`
/// pair.
///
/// Every write is first emitted as an outbound envelope, then forwarded
/// unmodified to the saved parent sink, so native console behaviour is
/// preserved. Flushes follow the same emit-then-forward order. No
/// buffering or batching happens in this layer.
pub struct CapturedSink {
    session_id: String,
    code_idx: usize,
    channel: StreamChannel,
    parent: Arc<dyn StreamSink>,
    outbound: OutboundSender,
}

impl CapturedSink {
    /// Create a captured sink forwarding to `parent`.
    #[must_use]
    pub fn new(
        session_id: &str,
        code_idx: usize,
        channel: StreamChannel,
        parent: Arc<dyn StreamSink>,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            code_idx,
            channel,
            parent,
            outbound,
        }
    }
}

impl StreamSink for CapturedSink {
    fn write(&self, data: &str) -> io::Result<()> {
        self.outbound.send(ExecEvent::StreamWrite {
            session_id: self.session_id.clone(),
            code_idx: self.code_idx,
            data: data.to_string(),
            channel: self.channel,
        });
        self.parent.write(data)
    }

    fn flush(&self) -> io::Result<()> {
        self.outbound.send(ExecEvent::StreamFlush {
            session_id: self.session_id.clone(),
            code_idx: self.code_idx,
            channel: self.channel,
        });
        self.parent.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use super::*;
    use crate::envelope::Envelope;

    /// Parent sink that records writes and, on each call, checks whether
    /// the matching envelope was already emitted.
    struct OrderProbe {
        rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
        writes: Mutex<Vec<String>>,
        flushes: Mutex<usize>,
    }

    impl OrderProbe {
        fn new(rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
            Self {
                rx: Mutex::new(rx),
                writes: Mutex::new(Vec::new()),
                flushes: Mutex::new(0),
            }
        }

        fn emitted_before_forward(&self) -> Envelope {
            self.rx
                .lock()
                .unwrap()
                .try_recv()
                .expect("envelope must be emitted before the parent write")
        }
    }

    impl StreamSink for OrderProbe {
        fn write(&self, data: &str) -> io::Result<()> {
            let envelope = self.emitted_before_forward();
            assert_eq!(envelope.value["data"], data);
            self.writes.lock().unwrap().push(data.to_string());
            Ok(())
        }

        fn flush(&self) -> io::Result<()> {
            let envelope = self.emitted_before_forward();
            assert!(envelope.msg_type.ends_with("-flush"));
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn write_emits_envelope_then_forwards() {
        let (outbound, rx) = OutboundSender::channel();
        let probe = Arc::new(OrderProbe::new(rx));
        let sink = CapturedSink::new(
            "s1",
            3,
            StreamChannel::Stdout,
            Arc::clone(&probe) as Arc<dyn StreamSink>,
            outbound,
        );

        sink.write("hello").unwrap();
        sink.flush().unwrap();

        assert_eq!(*probe.writes.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*probe.flushes.lock().unwrap(), 1);
    }

    #[test]
    fn captured_envelopes_carry_segment_identity() {
        let (outbound, mut rx) = OutboundSender::channel();
        let parents = OutputSinks::null();
        let sinks = OutputSinks::captured("s7", 2, &parents, &outbound);

        sinks.stderr.write("boom").unwrap();

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.msg_type, "exec-worker.exec-code-stderr-write");
        assert_eq!(envelope.value["session_id"], "s7");
        assert_eq!(envelope.value["code_idx"], 2);
        assert_eq!(envelope.value["data"], "boom");
    }

    #[test]
    fn same_as_tracks_identity_not_structure() {
        let a = OutputSinks::null();
        let b = OutputSinks::null();
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }
}
