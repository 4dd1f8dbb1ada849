use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::JudgeError;

/// Outcome of one judge run
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Judge exited with 0 and printed this mapping
    Completed(Map<String, Value>),
    /// Judge exited with a nonzero code; stdout is kept verbatim
    Failed { exit_code: i64, output: String },
}

/// Classify a stopped judge by exit code and primary output.
///
/// Output of a failed judge is never parsed. Output of a successful judge
/// must be exactly one JSON object (surrounding whitespace allowed).
pub fn classify(exit_code: i64, stdout: &[u8]) -> Result<Verdict, JudgeError> {
    if exit_code != 0 {
        return Ok(Verdict::Failed {
            exit_code,
            output: String::from_utf8_lossy(stdout).into_owned(),
        });
    }

    let result: Map<String, Value> =
        serde_json::from_slice(stdout).map_err(JudgeError::VerdictParse)?;
    Ok(Verdict::Completed(result))
}

/// Condensed view of the feedback format used by the bundled judges:
/// `{"err": .., "message": .., "test_results": [{"score": .., ..}]}`
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSummary {
    pub status: String,
    pub message: Option<String>,
    pub total_score: f64,
    pub tests: usize,
}

#[derive(Deserialize)]
struct RawFeedback {
    err: Option<String>,
    message: Option<String>,
    test_results: Vec<RawTestResult>,
}

#[derive(Deserialize)]
struct RawTestResult {
    err: Option<String>,
    #[serde(default)]
    score: f64,
}

impl Verdict {
    /// Summarize a completed verdict if it uses the feedback format
    pub fn summary(&self) -> Option<FeedbackSummary> {
        let Verdict::Completed(result) = self else {
            return None;
        };
        let raw: RawFeedback = serde_json::from_value(Value::Object(result.clone())).ok()?;

        // Portable judges report status per test only; the first non-OK one wins
        let status = raw
            .err
            .or_else(|| {
                raw.test_results
                    .iter()
                    .filter_map(|t| t.err.clone())
                    .find(|e| e != "OK")
            })
            .unwrap_or_else(|| "OK".to_string());

        Some(FeedbackSummary {
            status,
            message: raw.message,
            total_score: raw.test_results.iter().map(|t| t.score).sum(),
            tests: raw.test_results.len(),
        })
    }
}
