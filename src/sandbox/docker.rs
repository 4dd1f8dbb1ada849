//! Docker-backed sandbox provider
//!
//! Talks to the Docker Engine API through bollard. The client is built once
//! at startup and shared by reference for the lifetime of the process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions,
    InspectContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::{future, StreamExt};
use tracing::{debug, info};

use super::{Attachment, OutputFrame, SandboxId, SandboxProvider, SandboxSpec};

/// Sandbox provider backed by a Docker daemon
pub struct DockerProvider {
    docker: Docker,
}

impl DockerProvider {
    /// Connect using the standard Docker environment (`DOCKER_HOST` or the
    /// local socket) and negotiate the API version with the daemon.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon")?
            .negotiate_version()
            .await
            .context("Failed to negotiate Docker API version")?;

        info!("Connected to Docker daemon");
        Ok(Self { docker })
    }
}

/// Build the container configuration for a judge sandbox.
///
/// Stdin stays open until the first attached client closes it, and no TTY is
/// allocated so stdout and stderr arrive as separate frames.
pub fn container_config(spec: &SandboxSpec) -> Config<String> {
    Config {
        image: Some(spec.image.clone()),
        open_stdin: Some(true),
        stdin_once: Some(true),
        tty: Some(false),
        attach_stdin: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(HostConfig {
            memory: Some(spec.limits.memory_bytes),
            memory_swap: Some(spec.limits.memory_swap_bytes),
            nano_cpus: Some(spec.limits.nano_cpus),
            pids_limit: Some(spec.limits.pids_limit),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn frame_from_log(log: LogOutput) -> Option<OutputFrame> {
    match log {
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            Some(OutputFrame::Stdout(message))
        }
        LogOutput::StdErr { message } => Some(OutputFrame::Stderr(message)),
        LogOutput::StdIn { .. } => None,
    }
}

#[async_trait]
impl SandboxProvider for DockerProvider {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId> {
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config(spec))
            .await
            .with_context(|| format!("Failed to create container from image {}", spec.image))?;

        for warning in &response.warnings {
            debug!("Docker warning for {}: {}", spec.image, warning);
        }

        Ok(SandboxId(response.id))
    }

    async fn start(&self, id: &SandboxId) -> Result<()> {
        self.docker
            .start_container(&id.0, None::<StartContainerOptions<String>>)
            .await
            .with_context(|| format!("Failed to start container {}", id))
    }

    async fn attach(&self, id: &SandboxId) -> Result<Attachment> {
        let options = attach_options();

        let AttachContainerResults { output, input } = self
            .docker
            .attach_container(&id.0, Some(options))
            .await
            .with_context(|| format!("Failed to attach to container {}", id))?;

        let output = output
            .filter_map(|item| {
                future::ready(match item {
                    Ok(log) => frame_from_log(log).map(Ok),
                    Err(e) => Some(Err(anyhow::Error::from(e).context("Container stream failed"))),
                })
            })
            .boxed();

        Ok(Attachment { input, output })
    }

    async fn wait(&self, id: &SandboxId) -> Result<()> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(&id.0, Some(options));

        match stream.next().await {
            Some(Ok(response)) => {
                debug!("Container {} stopped with status {}", id, response.status_code);
                Ok(())
            }
            // bollard reports a nonzero exit as an error; the container did stop
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => {
                debug!("Container {} stopped with status {}", id, code);
                Ok(())
            }
            Some(Err(e)) => {
                Err(anyhow::Error::from(e).context(format!("Failed to wait for container {}", id)))
            }
            None => anyhow::bail!("Wait stream for container {} ended without a status", id),
        }
    }

    async fn exit_code(&self, id: &SandboxId) -> Result<i64> {
        let inspection = self
            .docker
            .inspect_container(&id.0, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("Failed to inspect container {}", id))?;

        inspection
            .state
            .and_then(|state| state.exit_code)
            .ok_or_else(|| anyhow::anyhow!("Container {} has no exit code", id))
    }

    async fn remove(&self, id: &SandboxId) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(&id.0, Some(options))
            .await
            .with_context(|| format!("Failed to remove container {}", id))
    }
}

/// Attach options: stream all three channels, replaying output the judge
/// wrote between start and attach
pub fn attach_options() -> AttachContainerOptions<String> {
    AttachContainerOptions {
        stdin: Some(true),
        stdout: Some(true),
        stderr: Some(true),
        stream: Some(true),
        logs: Some(true),
        detach_keys: None,
    }
}
