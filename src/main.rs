use std::panic::AssertUnwindSafe;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lingo_core::protocol::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the protocol, logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lingo_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("lingo-core {} ready", env!("CARGO_PKG_VERSION"));

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
            {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let session = Session::new(tx.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = std::panic::catch_unwind(AssertUnwindSafe(|| session.handle(&line)))
            .unwrap_or_else(|_| {
                json!({
                    "status": "error",
                    "message": "internal core error"
                })
                .to_string()
            });

        if tx.send(response).is_err() {
            break;
        }
    }

    info!("stdin closed, shutting down");
    session.shutdown();
    drop(session);
    drop(tx);
    writer.await?;

    Ok(())
}
