//! Runnable exec worker speaking JSON lines over stdio.
//!
//! Run with: cargo run -p stdio-worker-demo
//!
//! Then paste an exec request, one JSON object per line:
//! `{"type":"exec-worker.exec","value":{"session_id":"s1","codes":["let x = 1","print x"]}}`

use exec_worker_core::{OutboundSender, OutputSinks};
use exec_worker_engine::{Dispatcher, EXEC_SUBTYPE, ExecEngine, ExecHandler, RegistryBuilder};
use exec_worker_transport::serve;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod evaluator;

use evaluator::LineEvaluator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing. Logs go to stderr; stdout carries the protocol.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (outbound, outbound_rx) = OutboundSender::channel();
    // Parent sinks are silent: the host consumes output through the
    // message channel, and stdout must stay clean for the protocol.
    let engine = ExecEngine::with_sinks(LineEvaluator::default(), outbound, OutputSinks::null());
    let dispatcher = Dispatcher::new(
        RegistryBuilder::new()
            .register(EXEC_SUBTYPE, ExecHandler::new(engine))
            .build(),
    );

    tracing::info!("exec worker ready on stdio");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(stdin, stdout, dispatcher, outbound_rx).await?;

    tracing::info!("inbound channel closed, shutting down");
    Ok(())
}
