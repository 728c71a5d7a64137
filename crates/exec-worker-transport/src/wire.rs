//! Wire loops: one JSON envelope per line, per direction.

use exec_worker_core::Envelope;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

/// Wire failure.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read envelopes off `reader`, one JSON object per line, forwarding them
/// into `tx` until EOF or until the receiving side goes away.
///
/// Blank lines are skipped. A line that does not parse as an envelope is
/// logged and dropped; wire noise is a transport concern, not a routing
/// error.
///
/// # Errors
/// Returns an error if reading from the underlying stream fails.
pub async fn read_envelopes<R>(
    mut reader: R,
    tx: mpsc::UnboundedSender<Envelope>,
) -> Result<(), WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = String::new();
    loop {
        buffer.clear();
        match reader.read_line(&mut buffer).await {
            Ok(0) => break, // EOF
            Ok(_) => {
                let line = buffer.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Envelope>(line) {
                    Ok(envelope) => {
                        if tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("dropping unparseable inbound message: {e}");
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Drain `rx`, writing one JSON envelope per line to `writer`, flushing
/// after each message, until the sending side closes.
///
/// # Errors
/// Returns an error if serialization or the underlying write fails.
pub async fn write_envelopes<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = rx.recv().await {
        let json = serde_json::to_string(&envelope)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
