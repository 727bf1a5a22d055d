use crate::sink::LogSink;
use async_trait::async_trait;
use promptfan_core::{LogRecord, PromptfanError, PromptfanResult};
use tracing::info;
use uuid::Uuid;

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";

/// Where rows go and how to authenticate.
#[derive(Debug, Clone)]
pub struct BigQueryTarget {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    /// OAuth bearer token; short-lived, never refreshed by the sink.
    pub access_token: String,
    /// Overrides `https://bigquery.googleapis.com`.
    pub endpoint: Option<String>,
}

/// Streams rows into a BigQuery table through the `tabledata.insertAll` API.
pub struct BigQuerySink {
    target: BigQueryTarget,
    url: String,
    http: reqwest::Client,
}

impl BigQuerySink {
    /// Sink streaming into `target`'s table.
    pub fn new(target: BigQueryTarget) -> Self {
        let endpoint = target
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        let url = format!(
            "{endpoint}/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            target.project_id, target.dataset_id, target.table_id
        );
        Self {
            target,
            url,
            http: reqwest::Client::new(),
        }
    }

    /// `project.dataset.table`, for logs.
    pub fn table(&self) -> String {
        format!(
            "{}.{}.{}",
            self.target.project_id, self.target.dataset_id, self.target.table_id
        )
    }
}

#[async_trait]
impl LogSink for BigQuerySink {
    fn name(&self) -> &str {
        "bigquery"
    }

    async fn insert(&self, record: &LogRecord) -> PromptfanResult<()> {
        // Tables created with only the six original columns drop `Attempt`
        // and `Error` instead of rejecting the row.
        let body = serde_json::json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "ignoreUnknownValues": true,
            "rows": [{
                "insertId": Uuid::new_v4().to_string(),
                "json": record,
            }],
        });

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.target.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PromptfanError::Sink(format!("BigQuery insert failed: {e}")))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PromptfanError::Sink(format!(
                "BigQuery rejected the access token (GCP_ACCESS_TOKEN expired or invalid): {resp_body}"
            )));
        }
        if !status.is_success() {
            return Err(PromptfanError::Sink(format!(
                "BigQuery API error {status}: {resp_body}"
            )));
        }

        if let Some(errors) = resp_body["insertErrors"].as_array() {
            if !errors.is_empty() {
                return Err(PromptfanError::Sink(format!(
                    "BigQuery rejected row: {}",
                    serde_json::Value::Array(errors.clone())
                )));
            }
        }

        info!(table = %self.table(), model = %record.model, "Log record inserted");
        Ok(())
    }
}
