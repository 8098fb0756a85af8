//! Test session engine.
//!
//! Drives a [`TestSession`] from admin-language selection through the
//! optional pre-tests, booklet selection and basket-by-basket submission to
//! a final grade. Each transition validates and computes first, then commits
//! to the session, so a rejected request leaves the session untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capture::{CaptureEvent, EventSink};
use crate::catalog::ReferenceCatalog;
use crate::error::EngineError;
use crate::form::{self, BasketSubmission, FormFields, ResponseValue};
use crate::grading::{self, ItemResult};
use crate::model::CefrLevel;
use crate::sa::{self, SaResult};
use crate::scoring::{self, ScoredBasket, ScoredItem};
use crate::selector;
use crate::session::{ClientInfo, SessionPhase, TestSession, Tes};
use crate::vspt::{self, VsptResult};

/// Configuration for the test engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Default post-test redirect, used when a session's script has none.
    pub test_complete_url: Option<String>,
    /// Recorded on each session as its expiry time.
    pub session_lifetime_hours: Option<u32>,
}

/// Response to a successful `start_test`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTestResponse {
    pub start_basket_id: u32,
    pub total_items: u32,
}

/// Response to a successful basket submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum BasketOutcome {
    /// More baskets follow.
    Next {
        next_basket_id: u32,
        items_completed_count: usize,
        scored_basket: ScoredBasket,
    },
    /// That was the last basket.
    Done {
        item_level: CefrLevel,
        test_done: bool,
        scored_basket: ScoredBasket,
    },
    /// That was the last basket and the session has a post-test redirect.
    Redirect {
        redirect: String,
        scored_basket: ScoredBasket,
    },
}

impl BasketOutcome {
    pub fn scored_basket(&self) -> &ScoredBasket {
        match self {
            BasketOutcome::Next { scored_basket, .. }
            | BasketOutcome::Done { scored_basket, .. }
            | BasketOutcome::Redirect { scored_basket, .. } => scored_basket,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, BasketOutcome::Next { .. })
    }
}

/// The placement and scoring engine.
pub struct TestEngine {
    catalog: Arc<ReferenceCatalog>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl TestEngine {
    pub fn new(
        catalog: Arc<ReferenceCatalog>,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            sink,
            config,
        }
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    /// Start a new session for an admin language.
    pub fn set_admin_language(
        &self,
        admin_language: &str,
        mut tes: Tes,
    ) -> Result<TestSession, EngineError> {
        let admin_language = admin_language.trim();
        if admin_language.is_empty() {
            return Err(EngineError::MissingField("adminLanguage".into()));
        }

        if tes.test_complete_url.is_none() {
            tes.test_complete_url = self.config.test_complete_url.clone();
        }

        let mut session = TestSession::new(admin_language);
        session.tes = tes;
        session.expires_at = self
            .config
            .session_lifetime_hours
            .map(|hours| session.started_at + Duration::hours(i64::from(hours)));

        tracing::info!(session_id = %session.session_id, admin_language, "session created");
        Ok(session)
    }

    /// Choose the test language and skill, starting a new attempt.
    ///
    /// Valid from any phase. Every attempt-scoped field is cleared,
    /// including pre-test results.
    pub fn set_test_language(
        &self,
        session: &mut TestSession,
        test_language: &str,
        skill: &str,
        client: ClientInfo,
    ) -> Result<Uuid, EngineError> {
        let test_language = test_language.trim();
        let skill = skill.trim();
        if test_language.is_empty() {
            return Err(EngineError::MissingField("testLanguage".into()));
        }
        if skill.is_empty() {
            return Err(EngineError::MissingField("skill".into()));
        }

        let first_pass = session.phase == SessionPhase::AdminLanguageSelected;
        let pass_id = Uuid::new_v4();

        session.reset_attempt();
        session.test_language = test_language.to_string();
        session.skill = skill.to_string();
        session.pass_id = Some(pass_id);
        session.client = client;
        session.phase = SessionPhase::LanguageSelected;

        if first_pass {
            self.emit(CaptureEvent::SessionCreated {
                session_id: session.session_id,
                admin_language: session.admin_language.clone(),
                started_at: session.started_at,
                client: session.client.clone(),
            });
        }
        self.emit(CaptureEvent::PassCreated {
            session_id: session.session_id,
            pass_id,
            test_language: session.test_language.clone(),
            skill: session.skill.clone(),
            client: session.client.clone(),
        });

        tracing::info!(%pass_id, test_language, skill, "test language selected");
        Ok(pass_id)
    }

    /// Score a VSPT submission.
    pub fn submit_vspt(
        &self,
        session: &mut TestSession,
        fields: &FormFields,
    ) -> Result<VsptResult, EngineError> {
        let pass_id = require_phase(session, SessionPhase::LanguageSelected, "submit the VSPT")?;

        let responses = form::parse_vspt_fields(fields);
        let result = vspt::score_vspt(&self.catalog, &session.test_language, &responses)?;

        session.vspt = Some(result.clone());
        self.emit(CaptureEvent::VsptResponses {
            pass_id,
            responses: responses.into_iter().collect(),
        });
        self.emit(CaptureEvent::VsptScores {
            pass_id,
            z_score: result.z_score,
            meara_score: result.meara_score,
            level: result.level,
        });

        tracing::info!(%pass_id, meara_score = result.meara_score, level = %result.level, "vspt submitted");
        Ok(result)
    }

    /// Score a self-assessment submission.
    pub fn submit_sa(
        &self,
        session: &mut TestSession,
        fields: &FormFields,
    ) -> Result<SaResult, EngineError> {
        let pass_id = require_phase(session, SessionPhase::LanguageSelected, "submit the SA")?;

        let responses = form::parse_sa_fields(fields);
        let result = sa::score_sa(&self.catalog, &session.skill, &responses)?;

        session.sa = Some(result.clone());
        self.emit(CaptureEvent::SaResponses {
            pass_id,
            responses: responses.into_iter().collect(),
        });
        self.emit(CaptureEvent::SaScores {
            pass_id,
            ppe: result.ppe,
            level: result.level,
        });

        tracing::info!(%pass_id, ppe = result.ppe, level = %result.level, "sa submitted");
        Ok(result)
    }

    /// Select a booklet and move to the first basket.
    pub fn start_test(&self, session: &mut TestSession) -> Result<StartTestResponse, EngineError> {
        let pass_id = require_phase(session, SessionPhase::LanguageSelected, "start the test")?;
        if !session.scored_items.is_empty() {
            return Err(EngineError::InvalidTransition {
                action: "start the test",
                phase: session.phase,
            });
        }

        let booklet_id = selector::select_booklet(&self.catalog, &session.placement_input())?;
        let booklet = self.catalog.booklet(booklet_id).ok_or_else(|| {
            tracing::error!(booklet_id, "selected booklet is not in the catalog");
            EngineError::UnknownBooklet(booklet_id)
        })?;
        let first_basket = *booklet.basket_ids.first().ok_or_else(|| {
            tracing::error!(booklet_id, "selected booklet has no baskets");
            EngineError::UnknownBooklet(booklet_id)
        })?;

        session.booklet_id = Some(booklet_id);
        session.booklet_length = booklet.length;
        session.current_basket_number = 0;
        session.current_basket_id = Some(first_basket);
        session.phase = SessionPhase::InProgress;

        self.emit(CaptureEvent::TestStarted {
            pass_id,
            booklet_id,
            booklet_length: booklet.length,
        });

        tracing::info!(%pass_id, booklet_id, first_basket, "test started");
        Ok(StartTestResponse {
            start_basket_id: first_basket,
            total_items: booklet.length,
        })
    }

    /// Score the current basket and advance, finishing the test after the
    /// last basket.
    pub fn submit_basket(
        &self,
        session: &mut TestSession,
        fields: &FormFields,
    ) -> Result<BasketOutcome, EngineError> {
        let pass_id = require_phase(session, SessionPhase::InProgress, "submit a basket")?;
        let (Some(expected), Some(booklet_id)) = (session.current_basket_id, session.booklet_id)
        else {
            return Err(EngineError::InvalidTransition {
                action: "submit a basket",
                phase: session.phase,
            });
        };

        let submission = BasketSubmission::parse(fields)?;
        if submission.basket_id != expected {
            return Err(EngineError::WrongBasket {
                expected,
                submitted: submission.basket_id,
            });
        }

        let basket = self.catalog.basket(expected).ok_or_else(|| {
            tracing::error!(basket_id = expected, "booklet basket is not in the catalog");
            EngineError::UnknownBasket(expected)
        })?;
        if basket.basket_type != submission.basket_type {
            return Err(EngineError::BasketTypeMismatch {
                basket_id: expected,
                expected: basket.basket_type.to_string(),
                submitted: submission.basket_type.to_string(),
            });
        }

        let booklet = self.catalog.booklet(booklet_id).ok_or_else(|| {
            tracing::error!(booklet_id, "session booklet is not in the catalog");
            EngineError::UnknownBooklet(booklet_id)
        })?;

        let items = self.score_submission(&submission, session.items_completed())?;
        let scored_basket = ScoredBasket {
            id: expected,
            basket_type: basket.basket_type,
            skill: items
                .first()
                .map(|i| i.item.skill.clone())
                .unwrap_or_default(),
            items,
        };

        // Nothing below can fail.
        let basket_number = session.current_basket_number;
        session
            .scored_items
            .extend(scored_basket.items.iter().cloned());
        session.scored_baskets.push(scored_basket.clone());

        self.emit(CaptureEvent::ItemResponses {
            pass_id,
            basket_id: expected,
            items: scored_basket.items.clone(),
        });
        self.emit(CaptureEvent::BasketCompleted {
            pass_id,
            basket_id: expected,
            basket_number,
        });

        let next_number = basket_number + 1;
        if let Some(&next_basket_id) = booklet.basket_ids.get(next_number) {
            session.current_basket_number = next_number;
            session.current_basket_id = Some(next_basket_id);
            tracing::info!(
                %pass_id,
                basket_id = expected,
                next_basket_id,
                items_completed = session.items_completed(),
                "basket submitted"
            );
            return Ok(BasketOutcome::Next {
                next_basket_id,
                items_completed_count: session.items_completed(),
                scored_basket,
            });
        }

        let result = self.finish_test(session, pass_id, booklet_id);
        match session.tes.test_complete_url.as_deref() {
            Some(url) => Ok(BasketOutcome::Redirect {
                redirect: redirect_url(
                    url,
                    result.grade,
                    session.sa.as_ref().map(|s| s.level),
                    session.vspt.as_ref().map(|v| v.level),
                ),
                scored_basket,
            }),
            None => Ok(BasketOutcome::Done {
                item_level: result.level,
                test_done: true,
                scored_basket,
            }),
        }
    }

    /// Forward questionnaire answers to the capture sink. Never changes the
    /// session.
    pub fn submit_questionnaire(
        &self,
        session: &TestSession,
        answers: &FormFields,
    ) -> Result<(), EngineError> {
        if answers.is_empty() {
            return Err(EngineError::MissingField("questionnaire".into()));
        }
        self.emit(CaptureEvent::Questionnaire {
            session_id: session.session_id,
            answers: answers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        });
        tracing::debug!(session_id = %session.session_id, "questionnaire submitted");
        Ok(())
    }

    fn score_submission(
        &self,
        submission: &BasketSubmission,
        already_scored: usize,
    ) -> Result<Vec<ScoredItem>, EngineError> {
        let offset = already_scored as u32;
        submission
            .items
            .iter()
            .map(|response| {
                let item = self
                    .catalog
                    .item(response.item_id)
                    .ok_or(EngineError::UnknownItem(response.item_id))?;
                if !self.catalog.basket_contains_item(submission.basket_id, item) {
                    return Err(EngineError::ItemNotInBasket {
                        item_id: item.id,
                        basket_id: submission.basket_id,
                    });
                }

                let score = match &response.value {
                    ResponseValue::AnswerId(answer_id) => {
                        scoring::score_id_response(&self.catalog, item.id, *answer_id)?
                    }
                    ResponseValue::Text(text) => {
                        scoring::score_text_response(&self.catalog, item.id, text)?
                    }
                };
                Ok(score.place(
                    &self.catalog,
                    submission.basket_id,
                    response.position,
                    offset + response.position,
                ))
            })
            .collect()
    }

    fn finish_test(&self, session: &mut TestSession, pass_id: Uuid, booklet_id: u32) -> ItemResult {
        let result = grading::grade_items(
            &self.catalog,
            &session.test_language,
            &session.skill,
            booklet_id,
            &session.scored_items,
        );
        let finished_at = Utc::now();

        session.result = Some(result.clone());
        session.finished_at = Some(finished_at);
        session.current_basket_id = None;
        session.phase = SessionPhase::Completed;

        self.emit(CaptureEvent::TestResult {
            pass_id,
            raw_score: result.raw_score,
            grade: result.grade,
            level: result.level,
        });
        self.emit(CaptureEvent::TestFinished {
            pass_id,
            finished_at,
        });

        tracing::info!(
            %pass_id,
            raw_score = result.raw_score,
            grade = result.grade,
            level = %result.level,
            "test finished"
        );
        result
    }

    fn emit(&self, event: CaptureEvent) {
        let name = event.name();
        if let Err(e) = self.sink.emit(event) {
            tracing::warn!(event = name, error = %e, "failed to record capture event");
        }
    }
}

/// Check the session phase and return the current pass id.
fn require_phase(
    session: &TestSession,
    phase: SessionPhase,
    action: &'static str,
) -> Result<Uuid, EngineError> {
    match session.pass_id {
        Some(pass_id) if session.phase == phase => Ok(pass_id),
        _ => Err(EngineError::InvalidTransition {
            action,
            phase: session.phase,
        }),
    }
}

/// Append the final grade and any pre-test levels to a redirect target.
pub fn redirect_url(
    base: &str,
    grade: u8,
    sa_level: Option<CefrLevel>,
    vspt_level: Option<CefrLevel>,
) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    let mut url = format!("{base}{separator}itemGrade={grade}");
    if let Some(level) = sa_level {
        url.push_str(&format!("&saLevel={level}"));
    }
    if let Some(level) = vspt_level {
        url.push_str(&format!("&vsptLevel={level}"));
    }
    url
}
