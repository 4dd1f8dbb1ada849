//! Submission parsing and validation
//!
//! A submission is an open JSON object. Only the dispatch fields
//! (`task_type`, `lang`, `image`) are checked here; everything else is
//! handed to the judge untouched.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::error::ConfigError;

/// Validated dispatch information extracted from a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Output comparison task judged by a built-in image for `lang`
    SimpleDiff { lang: String },
    /// Task that ships its own judge image
    CustomPortable { image: String },
}

impl Task {
    pub fn task_type(&self) -> &'static str {
        match self {
            Task::SimpleDiff { .. } => "simple_diff",
            Task::CustomPortable { .. } => "custom_portable",
        }
    }
}

/// A submission ready to be sent to a judge
#[derive(Debug, Clone)]
pub struct Submission {
    task: Task,
    fields: Map<String, Value>,
}

impl Submission {
    /// Read and validate a submission file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).await.map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    /// Parse and validate a submission document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_slice(bytes).map_err(ConfigError::Malformed)?;
        match value {
            Value::Object(fields) => Self::from_map(fields),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Result<Self, ConfigError> {
        let task_type = required_str(&fields, "task_type")?;

        let task = match task_type {
            "simple_diff" => Task::SimpleDiff {
                lang: required_str(&fields, "lang")?.to_string(),
            },
            "custom_portable" => Task::CustomPortable {
                image: required_str(&fields, "image")?.to_string(),
            },
            other => {
                return Err(ConfigError::Unsupported {
                    task_type: other.to_string(),
                    lang: optional_str(&fields, "lang").unwrap_or("none").to_string(),
                })
            }
        };

        Ok(Self { task, fields })
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The full submission mapping, including the dispatch fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Encode the submission as one line of canonical JSON.
    ///
    /// Keys are emitted in sorted order and the line ends with `\n`.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        let sorted: BTreeMap<&String, &Value> = self.fields.iter().collect();
        let mut payload = serde_json::to_vec(&sorted)?;
        payload.push(b'\n');
        Ok(payload)
    }
}

fn required_str<'a>(
    fields: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(ConfigError::MissingField(key)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ConfigError::NotAString(key)),
    }
}

fn optional_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}
