//! Judge image selection
//!
//! Maps a validated [`Task`] to the image that judges it. Built-in images
//! come from a TOML table; portable tasks carry their own image.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::submission::Task;

/// Built-in image table: task type -> language -> image
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageTable {
    #[serde(default)]
    simple_diff: HashMap<String, String>,
}

impl ImageTable {
    /// The table compiled into the binary
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/images.toml"));
        Self::parse(content)
    }

    /// Load a table from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read image table {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid image table {:?}", path))
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Pick the judge image for a task
    pub fn resolve(&self, task: &Task) -> Result<String, ConfigError> {
        match task {
            Task::SimpleDiff { lang } => {
                self.simple_diff
                    .get(lang)
                    .cloned()
                    .ok_or_else(|| ConfigError::Unsupported {
                        task_type: task.task_type().to_string(),
                        lang: lang.clone(),
                    })
            }
            Task::CustomPortable { image } => Ok(image.clone()),
        }
    }
}
