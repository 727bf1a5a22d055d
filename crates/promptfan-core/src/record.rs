use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inbound body of `POST /generate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Run every model's attempts concurrently instead of one at a time.
    #[serde(default)]
    pub parallel: bool,
}

/// What a single attempt produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The provider returned non-empty text.
    Text(String),
    /// The provider (or the attempt deadline) failed; holds the error display.
    Failed(String),
}

/// The immutable record of one executed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub provider: String,
    pub model: String,
    /// Zero-based position within the model's batch.
    pub attempt: usize,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time spent in the provider call.
    pub duration_seconds: f64,
    pub outcome: AttemptOutcome,
}

impl AttemptResult {
    /// The value contributed to [`ModelResults`]: the text, or `Error: <reason>`.
    pub fn entry(&self) -> String {
        match &self.outcome {
            AttemptOutcome::Text(text) => text.clone(),
            AttemptOutcome::Failed(reason) => format!("Error: {reason}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Text(_))
    }
}

/// Durable projection of an [`AttemptResult`], one row per attempt.
///
/// Field names follow the analytical table's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRecord {
    /// Attempt start.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock latency of the provider call, in seconds.
    pub response_time: f64,
    pub request_body: String,
    /// Generated text; empty when the attempt failed.
    pub response_body: String,
    pub model: String,
    pub provider: String,
    /// One-based attempt number.
    pub attempt: u32,
    /// Failure reason; `None` on success.
    pub error: Option<String>,
}

impl LogRecord {
    /// Builds the row for `attempt`, which was executed with `prompt`.
    pub fn from_attempt(attempt: &AttemptResult, prompt: &str) -> Self {
        let (response_body, error) = match &attempt.outcome {
            AttemptOutcome::Text(text) => (text.clone(), None),
            AttemptOutcome::Failed(reason) => (String::new(), Some(reason.clone())),
        };
        Self {
            timestamp: attempt.started_at,
            response_time: attempt.duration_seconds,
            request_body: prompt.to_string(),
            response_body,
            model: attempt.model.clone(),
            provider: attempt.provider.clone(),
            attempt: u32::try_from(attempt.attempt + 1).unwrap_or(u32::MAX),
            error,
        }
    }
}

/// Per-model list of attempt entries; always exactly K long.
pub type ModelResults = Vec<String>;

/// Model name to its results, for a single provider.
pub type ProviderResults = BTreeMap<String, ModelResults>;

/// Response body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchResponse {
    /// Single-provider mode: `{model: [entries]}`.
    Single(ProviderResults),
    /// Multi-provider mode: `{provider: {model: [entries]}}`.
    Multi(BTreeMap<String, ProviderResults>),
}

impl BatchResponse {
    /// Results for a model, looked up across whichever shape this is.
    pub fn model(&self, provider: &str, model: &str) -> Option<&ModelResults> {
        match self {
            Self::Single(models) => models.get(model),
            Self::Multi(providers) => providers.get(provider).and_then(|m| m.get(model)),
        }
    }

    /// Total number of entries across every provider and model.
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Single(models) => models.values().map(Vec::len).sum(),
            Self::Multi(providers) => providers
                .values()
                .flat_map(BTreeMap::values)
                .map(Vec::len)
                .sum(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn attempt(outcome: AttemptOutcome) -> AttemptResult {
        AttemptResult {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            attempt: 2,
            started_at: Utc::now(),
            duration_seconds: 1.25,
            outcome,
        }
    }

    #[test]
    fn request_parallel_defaults_to_false() {
        let req: GenerationRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.parallel);
        let req: GenerationRequest = serde_json::from_str(r#"{"parallel": true}"#).unwrap();
        assert!(req.parallel);
    }

    #[test]
    fn failed_attempt_entry_is_prefixed() {
        let a = attempt(AttemptOutcome::Failed("boom".into()));
        assert_eq!(a.entry(), "Error: boom");
        assert!(!a.is_success());
    }

    #[test]
    fn log_record_uses_column_names() {
        let a = attempt(AttemptOutcome::Text("hello".into()));
        let record = LogRecord::from_attempt(&a, "prompt");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ResponseBody"], "hello");
        assert_eq!(json["RequestBody"], "prompt");
        assert_eq!(json["ResponseTime"], 1.25);
        assert_eq!(json["Attempt"], 3);
        assert!(json["Error"].is_null());
    }

    #[test]
    fn log_record_for_failure_has_empty_body() {
        let a = attempt(AttemptOutcome::Failed("timeout".into()));
        let record = LogRecord::from_attempt(&a, "p");
        assert_eq!(record.response_body, "");
        assert_eq!(record.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn single_response_serializes_flat() {
        let mut models = ProviderResults::new();
        models.insert("m1".into(), vec!["ok".into(); 2]);
        let json = serde_json::to_value(BatchResponse::Single(models)).unwrap();
        assert_eq!(json, serde_json::json!({"m1": ["ok", "ok"]}));
    }

    #[test]
    fn multi_response_nests_by_provider() {
        let mut models = ProviderResults::new();
        models.insert("m1".into(), vec!["ok".into()]);
        let mut providers = BTreeMap::new();
        providers.insert("openai".to_string(), models);
        let resp = BatchResponse::Multi(providers);
        assert_eq!(resp.entry_count(), 1);
        assert_eq!(resp.model("openai", "m1").unwrap(), &vec!["ok".to_string()]);
        assert!(resp.model("aws_bedrock", "m1").is_none());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["openai"]["m1"][0], "ok");
    }
}
