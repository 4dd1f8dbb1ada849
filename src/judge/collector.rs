//! Background drain of sandbox output
//!
//! The attached stream has bounded buffering on the runtime side, so it is
//! drained from a separate task while the foreground waits for the judge.
//! Stdout is kept for classification; stderr is forwarded as it arrives.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::sandbox::{OutputFrame, OutputStream};

/// Everything the collector retained
#[derive(Debug, Default)]
pub struct CapturedOutput {
    /// Complete primary output
    pub stdout: Vec<u8>,
    /// Number of diagnostic bytes seen (forwarded, not kept)
    pub diagnostic_bytes: usize,
}

/// Handle to the drain task. Dropping it without joining aborts the task.
pub struct OutputCollector {
    handle: Option<JoinHandle<Result<CapturedOutput>>>,
}

impl OutputCollector {
    pub fn spawn<W>(output: OutputStream, diagnostics: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(drain(output, diagnostics))),
        }
    }

    /// Wait for the stream to end and return what was captured
    pub async fn join(mut self) -> Result<CapturedOutput> {
        let handle = self
            .handle
            .take()
            .context("Output collector already joined")?;
        handle.await.context("Output collector task failed")?
    }
}

impl Drop for OutputCollector {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn drain<W>(mut output: OutputStream, mut diagnostics: W) -> Result<CapturedOutput>
where
    W: AsyncWrite + Unpin,
{
    let mut captured = CapturedOutput::default();
    let mut forwarding = true;

    while let Some(frame) = output.next().await {
        match frame.context("Failed to read sandbox output")? {
            OutputFrame::Stdout(bytes) => captured.stdout.extend_from_slice(&bytes),
            OutputFrame::Stderr(bytes) => {
                captured.diagnostic_bytes += bytes.len();
                if forwarding {
                    if let Err(e) = diagnostics.write_all(&bytes).await {
                        // Judge stderr is informational; keep draining stdout
                        warn!("Stopped forwarding judge stderr: {}", e);
                        forwarding = false;
                    }
                }
            }
        }
    }

    if forwarding {
        if let Err(e) = diagnostics.flush().await {
            warn!("Failed to flush judge stderr: {}", e);
        }
    }

    Ok(captured)
}
