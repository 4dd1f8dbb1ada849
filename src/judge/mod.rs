//! Judge module - Single-shot sandboxed judge run
//!
//! Drives one submission through one sandbox:
//! create -> start -> attach -> (send input || drain output) -> wait ->
//! inspect -> classify, and removes the sandbox on every path once it exists.
//!
//! The judge module does NOT:
//! - Choose the image (see `dispatch`)
//! - Retry any stage
//! - Enforce resource ceilings itself (the runtime does)

pub mod collector;
pub mod verdict;

use anyhow::Context;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::JudgeError;
use crate::sandbox::{Attachment, InputSink, SandboxId, SandboxLimits, SandboxProvider, SandboxSpec};
use crate::submission::Submission;

use collector::OutputCollector;
use verdict::classify;

pub use verdict::Verdict;

/// Runs judges against an injected sandbox provider
pub struct JudgeRunner<'a, P: ?Sized> {
    provider: &'a P,
    limits: SandboxLimits,
    wait_timeout: Option<Duration>,
}

impl<'a, P> JudgeRunner<'a, P>
where
    P: SandboxProvider + ?Sized,
{
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            limits: SandboxLimits::default(),
            wait_timeout: None,
        }
    }

    /// Bound the completion wait. `None` waits for as long as the judge runs.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Run `image` against `submission` and classify the result.
    ///
    /// Once a sandbox has been created it is removed exactly once before this
    /// returns, including when a stage fails or panics.
    pub async fn run(&self, image: &str, submission: &Submission) -> Result<Verdict, JudgeError> {
        let payload = submission
            .to_payload()
            .map_err(|e| JudgeError::Communication(e.into()))?;

        let spec = SandboxSpec::new(image, self.limits.clone());
        let id = self
            .provider
            .create(&spec)
            .await
            .map_err(JudgeError::Provisioning)?;
        info!("Created sandbox {} from image {}", id, image);

        let outcome = AssertUnwindSafe(self.drive(&id, &payload))
            .catch_unwind()
            .await;

        self.remove(&id).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive(&self, id: &SandboxId, payload: &[u8]) -> Result<Verdict, JudgeError> {
        self.provider
            .start(id)
            .await
            .map_err(JudgeError::Provisioning)?;
        debug!("Started sandbox {}", id);

        let Attachment { mut input, output } = self
            .provider
            .attach(id)
            .await
            .map_err(JudgeError::Communication)?;

        // Must be draining before the judge can fill the runtime's buffers
        let collector = OutputCollector::spawn(output, tokio::io::stderr());

        send_input(&mut input, payload)
            .await
            .map_err(JudgeError::Communication)?;
        info!("Sent submission to judge ({} bytes)", payload.len());

        self.wait(id).await?;

        let exit_code = self
            .provider
            .exit_code(id)
            .await
            .map_err(JudgeError::Communication)?;
        info!("Judge finished with exit code {}", exit_code);

        let captured = collector.join().await.map_err(JudgeError::Communication)?;
        debug!(
            "Collected {} stdout bytes and {} stderr bytes from sandbox {}",
            captured.stdout.len(),
            captured.diagnostic_bytes,
            id
        );

        let verdict = classify(exit_code, &captured.stdout)?;
        match &verdict {
            Verdict::Completed(_) => info!("Parsed verdict from sandbox {}", id),
            Verdict::Failed { exit_code, output } => {
                warn!(
                    "Judge exited with non-zero exit code {}; output:\n{}",
                    exit_code, output
                );
            }
        }

        Ok(verdict)
    }

    async fn wait(&self, id: &SandboxId) -> Result<(), JudgeError> {
        let wait = self.provider.wait(id);
        match self.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| {
                    JudgeError::Wait(anyhow::anyhow!(
                        "Judge did not stop within {}s",
                        limit.as_secs_f64()
                    ))
                })?
                .map_err(JudgeError::Wait),
            None => wait.await.map_err(JudgeError::Wait),
        }
    }

    async fn remove(&self, id: &SandboxId) {
        match self.provider.remove(id).await {
            Ok(()) => debug!("Removed sandbox {}", id),
            Err(e) => error!("Failed to remove sandbox {}: {:#}", id, e),
        }
    }
}

/// Write the payload and close the judge's stdin
async fn send_input(input: &mut InputSink, payload: &[u8]) -> anyhow::Result<()> {
    input
        .write_all(payload)
        .await
        .context("Failed to write submission to judge")?;
    input.flush().await.context("Failed to flush judge input")?;
    input
        .shutdown()
        .await
        .context("Failed to close judge input")?;
    Ok(())
}
