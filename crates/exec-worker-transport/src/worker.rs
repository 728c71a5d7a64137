//! The worker's inbound processing loop.

use exec_worker_core::Envelope;
use exec_worker_engine::{DispatchError, Dispatcher};
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncWrite},
    sync::mpsc,
};

use crate::wire::{WireError, read_envelopes, write_envelopes};

/// Worker loop failure.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A routing or argument error; a host/worker integration mismatch.
    #[error("routing error: {0}")]
    Dispatch(#[from] DispatchError),
    /// The wire itself failed.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Process inbound envelopes strictly one at a time.
///
/// Each message is fully handled (including an entire multi-segment exec
/// session) before the next one is dequeued; a long-running segment blocks
/// all further message processing. Returns when the inbound channel
/// closes.
///
/// # Errors
/// A dispatch error terminates the loop and is returned; evaluation
/// failures never surface here.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    dispatcher: &mut Dispatcher,
) -> Result<(), WorkerError> {
    while let Some(envelope) = rx.recv().await {
        dispatcher.dispatch(&envelope)?;
    }
    Ok(())
}

/// Run a complete worker over a byte transport.
///
/// Wires `reader` into the dispatcher and drains `outbound_rx` (the
/// receiving half from [`exec_worker_core::OutboundSender::channel`]) into
/// `writer`. Returns when the host closes the inbound stream, or earlier
/// on a fatal routing error. Outbound messages emitted before a fatal
/// error are still flushed: the writer drains until every
/// `OutboundSender` clone is dropped, which happens when the dispatcher
/// (and the engine inside it) is torn down.
///
/// # Errors
/// Returns the first routing or wire failure.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    mut dispatcher: Dispatcher,
    outbound_rx: mpsc::UnboundedReceiver<Envelope>,
) -> Result<(), WorkerError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    let read_task = tokio::spawn(async move { read_envelopes(reader, inbound_tx).await });
    let write_task = tokio::spawn(async move { write_envelopes(writer, outbound_rx).await });

    let worker_result = run_worker(inbound_rx, &mut dispatcher).await;

    // Closing the dispatcher drops the engine's outbound sender, letting
    // the writer drain pending envelopes and exit.
    drop(dispatcher);
    read_task.abort();

    let writer_result = match write_task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("outbound writer task failed: {e}");
            Ok(())
        }
    };

    worker_result?;
    writer_result?;
    Ok(())
}
