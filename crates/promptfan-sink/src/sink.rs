use async_trait::async_trait;
use promptfan_core::{LogRecord, PromptfanResult};

/// Append-only destination for [`LogRecord`]s.
///
/// Callers await `insert` once per attempt and treat a failure as non-fatal:
/// they log it and carry on with the batch.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Short label used in logs, e.g. `bigquery`.
    fn name(&self) -> &str;

    async fn insert(&self, record: &LogRecord) -> PromptfanResult<()>;
}

/// Accepts and drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl LogSink for DiscardSink {
    fn name(&self) -> &str {
        "none"
    }

    async fn insert(&self, _record: &LogRecord) -> PromptfanResult<()> {
        Ok(())
    }
}
