use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One computed analysis as returned by `/analyze` and `/analysis/{id}`.
///
/// Only `analysis_id` and `preview_rows` are read on this side; every
/// other field (summary, columns, charts, insights, forecast, ...) is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl AnalysisResult {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Preview rows as JSON objects; non-object entries are skipped.
    pub fn preview_rows(&self) -> Vec<Map<String, Value>> {
        self.body
            .get("preview_rows")
            .and_then(|v| v.as_array())
            .map(|rows| rows.iter().filter_map(|r| r.as_object().cloned()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiReport {
    pub html: String,
}

/// What `/ai-report` should narrate.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportSource {
    /// A stored analysis on the backend.
    Id(String),
    /// A full analysis document held by the caller.
    Inline(Value),
}

impl ReportSource {
    pub fn to_body(&self) -> Value {
        match self {
            ReportSource::Id(id) => serde_json::json!({ "analysis_id": id }),
            ReportSource::Inline(analysis) => serde_json::json!({ "analysis": analysis }),
        }
    }
}
