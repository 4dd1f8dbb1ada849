//! Sandbox module - Container runtime abstraction
//!
//! This module provides a minimal interface over the container runtime.
//! It handles:
//! - Container creation with fixed resource ceilings
//! - Start, attach, wait, inspect and removal
//! - Conversion of the runtime's framed output into [`OutputFrame`]s
//!
//! The sandbox module does NOT:
//! - Decide which image judges a submission
//! - Interpret exit codes or parse verdicts
//! - Retry anything

pub mod docker;
#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use tokio::io::AsyncWrite;

pub use docker::DockerProvider;

/// Resource ceilings applied to every sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Memory limit in bytes
    pub memory_bytes: i64,
    /// Memory + swap limit in bytes
    pub memory_swap_bytes: i64,
    /// CPU quota in units of 1e-9 CPUs
    pub nano_cpus: i64,
    /// Maximum number of processes/threads
    pub pids_limit: i64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 1024 * 1024 * 1024,
            memory_swap_bytes: 2 * 1024 * 1024 * 1024,
            nano_cpus: 500_000_000,
            pids_limit: 100,
        }
    }
}

/// Everything needed to create a sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSpec {
    pub image: String,
    pub limits: SandboxLimits,
}

impl SandboxSpec {
    pub fn new(image: impl Into<String>, limits: SandboxLimits) -> Self {
        Self {
            image: image.into(),
            limits,
        }
    }
}

/// Runtime-assigned sandbox identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxId(pub String);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form, as printed by `docker ps`
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "{}", short)
    }
}

/// One demultiplexed chunk of sandbox output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrame {
    /// Primary channel (stdout)
    Stdout(Bytes),
    /// Diagnostic channel (stderr)
    Stderr(Bytes),
}

pub type OutputStream = Pin<Box<dyn Stream<Item = Result<OutputFrame>> + Send>>;
pub type InputSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Both directions of an attached sandbox
pub struct Attachment {
    /// Sandbox stdin; shutting it down closes the judge's stdin
    pub input: InputSink,
    /// Sandbox stdout/stderr frames, ending when the sandbox stops
    pub output: OutputStream,
}

/// Container runtime used to run judges
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Create a stopped sandbox
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId>;

    async fn start(&self, id: &SandboxId) -> Result<()>;

    /// Attach to stdin/stdout/stderr in streaming mode
    async fn attach(&self, id: &SandboxId) -> Result<Attachment>;

    /// Block until the sandbox is no longer running
    async fn wait(&self, id: &SandboxId) -> Result<()>;

    /// Exit code of a stopped sandbox
    async fn exit_code(&self, id: &SandboxId) -> Result<i64>;

    /// Remove the sandbox, stopping it first if it still runs
    async fn remove(&self, id: &SandboxId) -> Result<()>;
}
