//! Manager configuration
//!
//! Loaded once at startup from the environment (after `.env` is applied).

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::ImageTable;

/// Manager configuration
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Upper bound on the completion wait (default: none, wait forever)
    pub wait_timeout: Option<Duration>,
    /// Image table override (default: built-in table)
    pub images_path: Option<PathBuf>,
}

impl ManagerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let wait_timeout = match lookup("JUDGE_WAIT_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid JUDGE_WAIT_TIMEOUT_SECS: {}", raw))?;
                if secs == 0 {
                    anyhow::bail!("JUDGE_WAIT_TIMEOUT_SECS must be positive");
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let images_path = lookup("JUDGE_IMAGES_CONFIG")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            wait_timeout,
            images_path,
        })
    }

    /// Load the image table this configuration points to
    pub fn image_table(&self) -> anyhow::Result<ImageTable> {
        match &self.images_path {
            Some(path) => ImageTable::from_file(path),
            None => ImageTable::builtin(),
        }
    }
}
