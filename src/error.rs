//! Error taxonomy for a judge invocation
//!
//! `ConfigError` covers everything that is decided before any sandbox work
//! (reading the submission, validating it, choosing an image).
//! `JudgeError` covers the sandbox lifecycle itself. A judge that exits with a
//! nonzero code is not an error; see [`crate::judge::Verdict::Failed`].

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the submission or its dispatch. No sandbox is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read submission file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed submission: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("submission must be a JSON object")]
    NotAnObject,

    #[error("submission is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` must be a string")]
    NotAString(&'static str),

    #[error("unsupported task type or language (task_type={task_type}, lang={lang})")]
    Unsupported { task_type: String, lang: String },
}

/// Fatal failures of a judge run.
///
/// Every variant except `Config` is raised after a sandbox may exist; the
/// runner removes it before the error reaches the caller.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to provision sandbox: {0:#}")]
    Provisioning(anyhow::Error),

    #[error("failed to communicate with sandbox: {0:#}")]
    Communication(anyhow::Error),

    #[error("error while waiting for sandbox: {0:#}")]
    Wait(anyhow::Error),

    #[error("judge exited successfully but produced a malformed verdict: {0}")]
    VerdictParse(#[source] serde_json::Error),
}

impl JudgeError {
    /// Short stage name used in logs
    pub fn stage(&self) -> &'static str {
        match self {
            JudgeError::Config(_) => "config",
            JudgeError::Provisioning(_) => "provisioning",
            JudgeError::Communication(_) => "communication",
            JudgeError::Wait(_) => "wait",
            JudgeError::VerdictParse(_) => "verdict_parse",
        }
    }
}
