use crate::sink::LogSink;
use async_trait::async_trait;
use promptfan_core::{LogRecord, PromptfanResult};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Appends one JSON line per record to a local file.
///
/// Writes are serialised so concurrent attempts never interleave lines.
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    /// Create the parent directory if needed. The file itself is created on
    /// first insert.
    pub async fn new(path: impl Into<PathBuf>) -> PromptfanResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn insert(&self, record: &LogRecord) -> PromptfanResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), model = %record.model, "Log record appended");
        Ok(())
    }
}
