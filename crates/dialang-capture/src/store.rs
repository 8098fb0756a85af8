//! Capture stores.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use dialang_core::capture::CaptureEvent;

/// A capture event with the time it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: CaptureEvent,
}

impl CaptureRecord {
    pub fn now(event: CaptureEvent) -> Self {
        Self {
            at: Utc::now(),
            event,
        }
    }
}

/// Durable destination for capture records.
#[async_trait]
pub trait CaptureStore: Send + Sync {
    /// Human-readable store name (e.g. "jsonl").
    fn name(&self) -> &str;

    /// Append a batch. Either every record is stored or none is.
    async fn append(&self, records: &[CaptureRecord]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

/// Appends records to a JSON-lines file, one write per batch.
pub struct JsonlStore {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlStore {
    /// Open (or create) the file for appending.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open capture file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CaptureStore for JsonlStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, records: &[CaptureRecord]) -> Result<()> {
        // Serialize the whole batch before touching the file.
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record).context("failed to encode record")?;
            buffer.push(b'\n');
        }

        let mut file = self.file.lock().await;
        write_batch(&mut *file, &buffer)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// A writer that can be cut back to an earlier length.
#[async_trait]
trait Truncatable: AsyncWrite + Unpin + Send {
    async fn end_offset(&mut self) -> std::io::Result<u64>;
    async fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
}

#[async_trait]
impl Truncatable for tokio::fs::File {
    async fn end_offset(&mut self) -> std::io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len).await
    }
}

/// Write `buffer` in full, or cut the writer back to where it started.
async fn write_batch<W: Truncatable>(writer: &mut W, buffer: &[u8]) -> std::io::Result<()> {
    let start = writer.end_offset().await?;
    let written = async {
        writer.write_all(buffer).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        if let Err(rollback) = writer.truncate_to(start).await {
            tracing::error!(start, "failed to roll back partial capture batch: {rollback}");
        }
        return Err(e);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps records in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CaptureRecord>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn records(&self) -> Vec<CaptureRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CaptureStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, records: &[CaptureRecord]) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            anyhow::bail!("memory store is rejecting writes");
        }
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use uuid::Uuid;

    fn record(key: &str) -> CaptureRecord {
        CaptureRecord::now(CaptureEvent::Questionnaire {
            session_id: Uuid::new_v4(),
            answers: BTreeMap::from([(key.to_string(), "1".to_string())]),
        })
    }

    #[tokio::test]
    async fn jsonl_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture").join("events.jsonl");

        let store = JsonlStore::open(&path).await.unwrap();
        store.append(&[record("a"), record("b")]).await.unwrap();
        drop(store);

        // Reopening appends rather than truncating.
        let store = JsonlStore::open(&path).await.unwrap();
        store.append(&[record("c")]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let parsed: CaptureRecord = serde_json::from_str(lines[2]).unwrap();
        assert!(matches!(
            parsed.event,
            CaptureEvent::Questionnaire { ref answers, .. } if answers.contains_key("c")
        ));
        let raw: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(raw["event"], "questionnaire");
        assert!(raw["at"].is_string());
    }

    /// Accepts bytes up to `limit`, then fails every write.
    struct FillingWriter {
        data: Vec<u8>,
        limit: usize,
    }

    impl AsyncWrite for FillingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let this = self.get_mut();
            let room = this.limit.saturating_sub(this.data.len());
            if room == 0 {
                return Poll::Ready(Err(std::io::Error::other("no space left")));
            }
            let n = room.min(buf.len());
            this.data.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[async_trait]
    impl Truncatable for FillingWriter {
        async fn end_offset(&mut self) -> std::io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        async fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_batch_write_leaves_no_partial_line() {
        let mut writer = FillingWriter {
            data: b"{\"kept\":1}\n".to_vec(),
            limit: 20,
        };
        let batch = b"{\"event\":\"questionnaire\"}\n{\"event\":\"test_finished\"}\n";

        assert!(write_batch(&mut writer, batch).await.is_err());
        assert_eq!(writer.data, b"{\"kept\":1}\n".to_vec());

        writer.limit = 1024;
        write_batch(&mut writer, batch).await.unwrap();
        assert_eq!(writer.data.len(), 11 + batch.len());
    }

    #[tokio::test]
    async fn memory_store_rejects_whole_batch() {
        let store = MemoryStore::new();
        store.append(&[record("a")]).await.unwrap();
        store.set_failing(true);
        assert!(store.append(&[record("b"), record("c")]).await.is_err());
        assert_eq!(store.records().len(), 1);
    }
}
