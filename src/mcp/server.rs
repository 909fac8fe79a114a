use crate::app::App;
use crate::config::Settings;
use crate::errors::ToolError;
use crate::mcp::adapter::ProtocolAdapter;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

/// Serves line-delimited JSON-RPC until the reader closes.
///
/// Each request runs on its own task; a single writer task owns the output so
/// response lines never interleave.
pub async fn serve<R, W>(adapter: Arc<ProtocolAdapter>, reader: R, writer: W) -> Result<(), ToolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    // Lines are read as bytes so a non-UTF-8 line is answered instead of ending the loop.
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        let raw = line.clone();
        let adapter = adapter.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = adapter.handle_bytes(&raw).await {
                let _ = tx.send(response);
            }
        });
    }

    // The writer drains until every in-flight task has dropped its sender.
    drop(tx);
    writer_task
        .await
        .map_err(|err| ToolError::internal(format!("Writer task failed: {}", err)))??;
    Ok(())
}

pub async fn run_stdio(settings: Settings) -> Result<(), ToolError> {
    let app = App::initialize(settings)?;
    app.logger.info(
        "Server ready",
        Some(&serde_json::json!({
            "tools": app.registry.len(),
            "base_url": app.settings.base_url,
        })),
    );
    serve(app.adapter.clone(), tokio::io::stdin(), tokio::io::stdout()).await
}
