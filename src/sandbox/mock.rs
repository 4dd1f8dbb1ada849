//! Scripted in-memory sandbox provider for tests

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};

use super::{Attachment, OutputFrame, SandboxId, SandboxProvider, SandboxSpec};

/// Stage at which the mock misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Create,
    Start,
    Attach,
    Write,
    Drain,
    Wait,
    Inspect,
    Remove,
    /// `wait` never returns
    Hang,
    /// `wait` panics
    Panic,
}

/// Provider call, in the order they were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Start,
    Attach,
    Wait,
    ExitCode,
    Remove,
}

pub struct MockProvider {
    frames: Vec<OutputFrame>,
    exit_code: i64,
    fault: Option<Fault>,
    streamed: bool,
    drained: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<Call>>,
    specs: Mutex<Vec<SandboxSpec>>,
    stdin: Arc<Mutex<Vec<u8>>>,
    stdin_closed: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new(exit_code: i64) -> Self {
        Self {
            frames: Vec::new(),
            exit_code,
            fault: None,
            streamed: false,
            drained: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
            stdin: Arc::new(Mutex::new(Vec::new())),
            stdin_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stdout(mut self, data: impl AsRef<[u8]>) -> Self {
        self.frames
            .push(OutputFrame::Stdout(Bytes::copy_from_slice(data.as_ref())));
        self
    }

    pub fn stderr(mut self, data: impl AsRef<[u8]>) -> Self {
        self.frames
            .push(OutputFrame::Stderr(Bytes::copy_from_slice(data.as_ref())));
        self
    }

    pub fn fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Deliver output through a one-slot channel fed by a task, and hold
    /// `wait` until the reader has taken every frame. A runtime behaves the
    /// same way once its output buffer is full.
    pub fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn removals(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Remove).count()
    }

    pub fn specs(&self) -> Vec<SandboxSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn stdin(&self) -> Vec<u8> {
        self.stdin.lock().unwrap().clone()
    }

    pub fn stdin_closed(&self) -> bool {
        self.stdin_closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fails_at(&self, fault: Fault) -> Result<()> {
        if self.fault == Some(fault) {
            anyhow::bail!("injected {:?} failure", fault);
        }
        Ok(())
    }
}

#[async_trait]
impl SandboxProvider for MockProvider {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId> {
        self.record(Call::Create(spec.image.clone()));
        self.fails_at(Fault::Create)?;
        self.specs.lock().unwrap().push(spec.clone());
        Ok(SandboxId("mock-1".into()))
    }

    async fn start(&self, _id: &SandboxId) -> Result<()> {
        self.record(Call::Start);
        self.fails_at(Fault::Start)
    }

    async fn attach(&self, _id: &SandboxId) -> Result<Attachment> {
        self.record(Call::Attach);
        self.fails_at(Fault::Attach)?;

        let input = RecordingInput {
            buf: self.stdin.clone(),
            closed: self.stdin_closed.clone(),
            broken: self.fault == Some(Fault::Write),
        };

        let mut frames: Vec<Result<OutputFrame>> = self.frames.iter().cloned().map(Ok).collect();
        if self.fault == Some(Fault::Drain) {
            frames.push(Err(anyhow::anyhow!("injected Drain failure")));
        }

        let output = if self.streamed {
            let (tx, rx) = mpsc::channel(1);
            let (drained_tx, drained_rx) = oneshot::channel();
            *self.drained.lock().unwrap() = Some(drained_rx);

            tokio::spawn(async move {
                for frame in frames {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
                // The slot frees up only once the last frame has been received
                if tx.reserve().await.is_ok() {
                    drop(tx);
                    let _ = drained_tx.send(());
                }
            });

            stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|frame| (frame, rx)) })
                .boxed()
        } else {
            stream::iter(frames).boxed()
        };

        Ok(Attachment {
            input: Box::pin(input),
            output,
        })
    }

    async fn wait(&self, _id: &SandboxId) -> Result<()> {
        self.record(Call::Wait);
        let drained = self.drained.lock().unwrap().take();
        if let Some(drained) = drained {
            drained
                .await
                .map_err(|_| anyhow::anyhow!("output reader went away before the sandbox stopped"))?;
        }
        match self.fault {
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::Panic) => panic!("injected panic while waiting"),
            _ => self.fails_at(Fault::Wait),
        }
    }

    async fn exit_code(&self, _id: &SandboxId) -> Result<i64> {
        self.record(Call::ExitCode);
        self.fails_at(Fault::Inspect)?;
        Ok(self.exit_code)
    }

    async fn remove(&self, _id: &SandboxId) -> Result<()> {
        self.record(Call::Remove);
        self.fails_at(Fault::Remove)
    }
}

/// Stdin half that records what the judge would have read
struct RecordingInput {
    buf: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    broken: bool,
}

impl AsyncWrite for RecordingInput {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, data: &[u8]) -> Poll<io::Result<usize>> {
        if self.broken {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected Write failure")));
        }
        self.buf.lock().unwrap().extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
