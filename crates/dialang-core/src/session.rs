//! Test session state.
//!
//! A [`TestSession`] is a plain value owned by the caller. The engine takes
//! it by `&mut` for each transition and either commits every change or
//! leaves it untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::ItemResult;
use crate::sa::SaResult;
use crate::scoring::{ScoredBasket, ScoredItem};
use crate::selector::{PlacementInput, TestDifficulty};
use crate::vspt::VsptResult;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Admin language chosen, no test yet.
    AdminLanguageSelected,
    /// Test language and skill chosen, no booklet yet.
    LanguageSelected,
    /// Booklet assigned, baskets being submitted.
    InProgress,
    /// Final basket submitted and graded.
    Completed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::AdminLanguageSelected => write!(f, "admin-language-selected"),
            SessionPhase::LanguageSelected => write!(f, "language-selected"),
            SessionPhase::InProgress => write!(f, "in-progress"),
            SessionPhase::Completed => write!(f, "completed"),
        }
    }
}

/// Test execution script: per-session presentation flags and overrides.
///
/// The `hide_*` flags are carried for the presentation layer and never
/// interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tes {
    pub hide_vspt: bool,
    pub hide_vspt_result: bool,
    pub hide_sa: bool,
    pub hide_test: bool,
    pub hide_feedback_menu: bool,
    pub disallow_instant_feedback: bool,
    /// Where to send the test-taker once the test is done.
    pub test_complete_url: Option<String>,
    /// Fixes the booklet tier regardless of pre-test results.
    pub difficulty: Option<TestDifficulty>,
}

/// Optional metadata about the test-taker's client, recorded with each pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub browser_locale: Option<String>,
    pub referrer: Option<String>,
}

/// One visitor's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub session_id: Uuid,
    /// Identifies the current attempt. Regenerated on every test language
    /// selection.
    pub pass_id: Option<Uuid>,
    pub admin_language: String,
    pub test_language: String,
    pub skill: String,
    pub phase: SessionPhase,
    pub tes: Tes,
    pub client: ClientInfo,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    // -- attempt ------------------------------------------------------------
    pub booklet_id: Option<u32>,
    pub booklet_length: u32,
    /// Index of the current basket in the booklet's ordering.
    pub current_basket_number: usize,
    pub current_basket_id: Option<u32>,
    pub scored_items: Vec<ScoredItem>,
    pub scored_baskets: Vec<ScoredBasket>,
    pub vspt: Option<VsptResult>,
    pub sa: Option<SaResult>,
    pub result: Option<ItemResult>,
}

impl TestSession {
    /// A fresh session with only an admin language.
    pub fn new(admin_language: &str) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            pass_id: None,
            admin_language: admin_language.to_string(),
            test_language: String::new(),
            skill: String::new(),
            phase: SessionPhase::AdminLanguageSelected,
            tes: Tes::default(),
            client: ClientInfo::default(),
            started_at: Utc::now(),
            expires_at: None,
            finished_at: None,
            booklet_id: None,
            booklet_length: 0,
            current_basket_number: 0,
            current_basket_id: None,
            scored_items: Vec::new(),
            scored_baskets: Vec::new(),
            vspt: None,
            sa: None,
            result: None,
        }
    }

    /// Clear every attempt-scoped field, including pre-test results.
    ///
    /// Session identity, admin language, script and client metadata survive.
    pub fn reset_attempt(&mut self) {
        self.pass_id = None;
        self.test_language.clear();
        self.skill.clear();
        self.finished_at = None;
        self.booklet_id = None;
        self.booklet_length = 0;
        self.current_basket_number = 0;
        self.current_basket_id = None;
        self.scored_items.clear();
        self.scored_baskets.clear();
        self.vspt = None;
        self.sa = None;
        self.result = None;
    }

    pub fn vspt_submitted(&self) -> bool {
        self.vspt.is_some()
    }

    pub fn sa_submitted(&self) -> bool {
        self.sa.is_some()
    }

    /// Number of items scored so far.
    pub fn items_completed(&self) -> usize {
        self.scored_items.len()
    }

    /// Inputs for booklet selection.
    pub fn placement_input(&self) -> PlacementInput<'_> {
        PlacementInput {
            language: &self.test_language,
            skill: &self.skill,
            vspt_z_score: self.vspt.as_ref().map(|v| v.z_score),
            sa_ppe: self.sa.as_ref().map(|s| s.ppe),
            difficulty: self.tes.difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CefrLevel;

    #[test]
    fn reset_clears_attempt_but_keeps_identity() {
        let mut session = TestSession::new("eng");
        session.pass_id = Some(Uuid::new_v4());
        session.test_language = "fra".into();
        session.skill = "reading".into();
        session.booklet_id = Some(3);
        session.current_basket_id = Some(10);
        session.sa = Some(SaResult {
            ppe: 0.2,
            level: CefrLevel::A2,
        });
        session.tes.hide_sa = true;
        let id = session.session_id;

        session.reset_attempt();

        assert_eq!(session.session_id, id);
        assert_eq!(session.admin_language, "eng");
        assert!(session.tes.hide_sa);
        assert!(session.pass_id.is_none());
        assert!(session.booklet_id.is_none());
        assert!(session.current_basket_id.is_none());
        assert!(!session.sa_submitted());
    }

    #[test]
    fn placement_input_reflects_pretests() {
        let mut session = TestSession::new("eng");
        session.test_language = "deu".into();
        session.skill = "listening".into();
        session.vspt = Some(VsptResult {
            z_score: 0.4,
            meara_score: 400,
            level: CefrLevel::B1,
        });
        session.tes.difficulty = Some(TestDifficulty::Hard);

        let input = session.placement_input();
        assert_eq!(input.language, "deu");
        assert_eq!(input.vspt_z_score, Some(0.4));
        assert_eq!(input.sa_ppe, None);
        assert_eq!(input.difficulty, Some(TestDifficulty::Hard));
    }

    #[test]
    fn phase_display() {
        assert_eq!(SessionPhase::InProgress.to_string(), "in-progress");
    }
}
