//! Channel-backed event sink and its background writer.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dialang_core::capture::{CaptureEvent, EventSink};
use dialang_core::SinkError;

use crate::store::{CaptureRecord, CaptureStore};

/// Upper bound on records appended in one store call.
const MAX_BATCH: usize = 64;

/// Event sink that queues records for a background writer.
///
/// `emit` never blocks. It fails only once the writer has gone away.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CaptureRecord>,
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CaptureEvent) -> Result<(), SinkError> {
        self.tx
            .send(CaptureRecord::now(event))
            .map_err(|_| SinkError::Closed)
    }
}

/// Counts reported by a finished writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: usize,
    pub failed: usize,
}

/// Handle on the background writer task.
pub struct CaptureWriter {
    handle: JoinHandle<WriterStats>,
}

impl CaptureWriter {
    /// Wait for the writer to drain its queue and stop.
    ///
    /// The writer stops once every [`ChannelSink`] clone has been dropped;
    /// drop them before awaiting this.
    pub async fn finish(self) -> Result<WriterStats> {
        self.handle.await.context("capture writer task failed")
    }
}

/// Spawn a writer task feeding `store` and return the sink that feeds it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_writer(store: Arc<dyn CaptureStore>) -> (ChannelSink, CaptureWriter) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(write_loop(store, rx));
    (ChannelSink { tx }, CaptureWriter { handle })
}

async fn write_loop(
    store: Arc<dyn CaptureStore>,
    mut rx: mpsc::UnboundedReceiver<CaptureRecord>,
) -> WriterStats {
    let mut stats = WriterStats::default();

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }

        match store.append(&batch).await {
            Ok(()) => {
                stats.written += batch.len();
                tracing::debug!(store = store.name(), count = batch.len(), "capture batch written");
            }
            Err(e) => {
                stats.failed += batch.len();
                tracing::error!(
                    store = store.name(),
                    count = batch.len(),
                    "failed to write capture batch: {e:#}"
                );
            }
        }
    }

    tracing::debug!(?stats, "capture writer stopped");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn finished() -> CaptureEvent {
        CaptureEvent::TestFinished {
            pass_id: Uuid::new_v4(),
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn forwards_events_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (sink, writer) = spawn_writer(store.clone());

        let pass_id = Uuid::new_v4();
        for booklet_id in 1..=3 {
            sink.emit(CaptureEvent::TestStarted {
                pass_id,
                booklet_id,
                booklet_length: 10,
            })
            .unwrap();
        }
        drop(sink);

        let stats = writer.finish().await.unwrap();
        assert_eq!(stats, WriterStats { written: 3, failed: 0 });

        let booklets: Vec<u32> = store
            .records()
            .into_iter()
            .filter_map(|r| match r.event {
                CaptureEvent::TestStarted { booklet_id, .. } => Some(booklet_id),
                _ => None,
            })
            .collect();
        assert_eq!(booklets, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn store_failures_are_counted_not_raised() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let (sink, writer) = spawn_writer(store.clone());

        assert!(sink.emit(finished()).is_ok());
        drop(sink);

        let stats = writer.finish().await.unwrap();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.failed, 1);
        assert!(store.records().is_empty());
    }

    #[test]
    fn closed_channel_reports_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink { tx };
        assert!(matches!(sink.emit(finished()), Err(SinkError::Closed)));
    }
}
