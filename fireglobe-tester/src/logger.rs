//! On-disk logs of a test run

use crate::results::TestResults;
use chrono::Utc;
use fireglobe_core::error::{self, Error};
use fireglobe_core::store::sanitize_id;
use fireglobe_core::{Message, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Writes `conversation_<id>.jsonl` message logs and `test_results_<ts>.json`
#[derive(Debug, Clone)]
pub struct ResultsLogger {
    dir: PathBuf,
}

impl ResultsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::from(e)
                .with_operation("logger::new")
                .with_context("path", dir.display().to_string())
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn message_log_path(&self, conversation_id: &str) -> PathBuf {
        self.dir.join(format!("conversation_{}.jsonl", sanitize_id(conversation_id)))
    }

    /// Append one message as a JSON line
    pub async fn log_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        let mut line = serde_json::to_string(message).map_err(|e| error::serialization_error(e.to_string()))?;
        line.push('\n');

        let path = self.message_log_path(conversation_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::from(e).with_operation("logger::log_message"))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::from(e).with_operation("logger::log_message"))?;
        Ok(())
    }

    /// Write the full results as pretty JSON and return the path
    pub async fn save_results(&self, results: &TestResults) -> Result<PathBuf> {
        let path = self
            .dir
            .join(format!("test_results_{}.json", Utc::now().format("%Y%m%d_%H%M%S")));
        let content =
            serde_json::to_string_pretty(results).map_err(|e| error::serialization_error(e.to_string()))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::from(e).with_operation("logger::save_results"))?;
        tracing::info!("Test results saved to {}", path.display());
        Ok(path)
    }
}
