//! Data-capture events and the sink the engine reports them to.
//!
//! The engine emits an event for every recorded fact (pre-test responses,
//! scores, basket batches, results) and never waits on or fails because of
//! the outcome. Concrete asynchronous sinks live in `dialang-capture`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SinkError;
use crate::model::CefrLevel;
use crate::scoring::ScoredItem;
use crate::session::ClientInfo;

/// An append-only data-capture record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    SessionCreated {
        session_id: Uuid,
        admin_language: String,
        started_at: DateTime<Utc>,
        client: ClientInfo,
    },
    PassCreated {
        session_id: Uuid,
        pass_id: Uuid,
        test_language: String,
        skill: String,
        client: ClientInfo,
    },
    VsptResponses {
        pass_id: Uuid,
        responses: BTreeMap<String, bool>,
    },
    VsptScores {
        pass_id: Uuid,
        z_score: f64,
        meara_score: u32,
        level: CefrLevel,
    },
    SaResponses {
        pass_id: Uuid,
        responses: BTreeMap<String, bool>,
    },
    SaScores {
        pass_id: Uuid,
        ppe: f64,
        level: CefrLevel,
    },
    TestStarted {
        pass_id: Uuid,
        booklet_id: u32,
        booklet_length: u32,
    },
    /// Every scored item of one basket. Stored as a single unit.
    ItemResponses {
        pass_id: Uuid,
        basket_id: u32,
        items: Vec<ScoredItem>,
    },
    /// Emitted for every submitted basket, the final one included, so the
    /// count of these events always equals the number of scored baskets.
    BasketCompleted {
        pass_id: Uuid,
        basket_id: u32,
        /// Index of the basket in the booklet's ordering.
        basket_number: usize,
    },
    TestResult {
        pass_id: Uuid,
        raw_score: u32,
        grade: u8,
        level: CefrLevel,
    },
    TestFinished {
        pass_id: Uuid,
        finished_at: DateTime<Utc>,
    },
    Questionnaire {
        session_id: Uuid,
        answers: BTreeMap<String, String>,
    },
}

impl CaptureEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CaptureEvent::SessionCreated { .. } => "session_created",
            CaptureEvent::PassCreated { .. } => "pass_created",
            CaptureEvent::VsptResponses { .. } => "vspt_responses",
            CaptureEvent::VsptScores { .. } => "vspt_scores",
            CaptureEvent::SaResponses { .. } => "sa_responses",
            CaptureEvent::SaScores { .. } => "sa_scores",
            CaptureEvent::TestStarted { .. } => "test_started",
            CaptureEvent::ItemResponses { .. } => "item_responses",
            CaptureEvent::BasketCompleted { .. } => "basket_completed",
            CaptureEvent::TestResult { .. } => "test_result",
            CaptureEvent::TestFinished { .. } => "test_finished",
            CaptureEvent::Questionnaire { .. } => "questionnaire",
        }
    }
}

/// Receives capture events from the engine.
///
/// Implementations must not block; anything slow belongs on a background
/// task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CaptureEvent) -> Result<(), SinkError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: CaptureEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Collects events in memory. Can be switched to reject everything.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CaptureEvent>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `emit` fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Names of the events received so far, in order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(CaptureEvent::name)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: CaptureEvent) -> Result<(), SinkError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(SinkError::Rejected(event.name().to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questionnaire() -> CaptureEvent {
        CaptureEvent::Questionnaire {
            session_id: Uuid::new_v4(),
            answers: BTreeMap::from([("age".to_string(), "30".to_string())]),
        }
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(questionnaire()).unwrap();
        sink.emit(CaptureEvent::TestFinished {
            pass_id: Uuid::new_v4(),
            finished_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(sink.event_names(), vec!["questionnaire", "test_finished"]);
    }

    #[test]
    fn failing_sink_rejects() {
        let sink = MemorySink::new();
        sink.set_failing(true);
        assert!(matches!(
            sink.emit(questionnaire()),
            Err(SinkError::Rejected(_))
        ));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(questionnaire()).unwrap();
        assert_eq!(json["event"], "questionnaire");
        assert_eq!(json["answers"]["age"], "30");
    }
}
