//! Logging sinks for promptfan.
//!
//! Every generation attempt produces one [`promptfan_core::LogRecord`]; a
//! [`LogSink`] stores it. Sinks are best-effort from the caller's point of
//! view: a failed insert is logged by the caller and never aborts a batch.

pub mod bigquery;
pub mod jsonl;
pub mod sink;

pub use bigquery::{BigQuerySink, BigQueryTarget};
pub use jsonl::JsonlSink;
pub use sink::{DiscardSink, LogSink};

use promptfan_core::{Credentials, PromptfanError, PromptfanResult, SinkConfig};
use std::sync::Arc;

/// Build the sink selected by `[sink]`.
pub async fn build_sink(
    config: &SinkConfig,
    credentials: &Credentials,
) -> PromptfanResult<Arc<dyn LogSink>> {
    match config {
        SinkConfig::BigQuery {
            project_id,
            dataset_id,
            table_id,
            endpoint,
        } => {
            let missing = |field: &str| {
                PromptfanError::Config(format!("[sink] kind = \"bigquery\" requires {field}"))
            };
            let target = BigQueryTarget {
                project_id: project_id.clone().ok_or_else(|| missing("project_id"))?,
                dataset_id: dataset_id.clone().ok_or_else(|| missing("dataset_id"))?,
                table_id: table_id.clone().ok_or_else(|| missing("table_id"))?,
                access_token: Credentials::require(&credentials.gcp_access_token, "GCP_ACCESS_TOKEN")?
                    .to_string(),
                endpoint: endpoint.clone(),
            };
            Ok(Arc::new(BigQuerySink::new(target)))
        }
        SinkConfig::Jsonl { path } => Ok(Arc::new(JsonlSink::new(path.clone()).await?)),
        SinkConfig::None => Ok(Arc::new(DiscardSink)),
    }
}
