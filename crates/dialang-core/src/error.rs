//! Engine error types.
//!
//! Every fallible transition returns an [`EngineError`]. Callers classify it
//! through [`EngineError::kind`] to decide between an internal failure and a
//! client-error response, without matching on message text.

use thiserror::Error;

use crate::session::SessionPhase;

/// Broad class of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reference data is missing for a key the engine needed.
    Configuration,
    /// The request was malformed or arrived in the wrong state.
    Client,
    /// A scoring lookup found no matching row.
    Scoring,
}

/// Errors raised by the placement and scoring engine.
#[derive(Debug, Error)]
pub enum EngineError {
    // -- configuration ------------------------------------------------------
    /// The catalog has no VSPT words for this test language.
    #[error("no VSPT words for test language '{language}'")]
    NoVsptWords { language: String },

    /// The catalog has no VSPT bands for this test language.
    #[error("no VSPT bands for test language '{language}'")]
    NoVsptBands { language: String },

    /// No band covers the computed Meara score.
    #[error("no VSPT level for test language '{language}' and meara score {meara_score}")]
    NoVsptBand { language: String, meara_score: u32 },

    /// No preliminary-estimate assignments exist for this language and skill.
    #[error("no preest assignments for {language}/{skill}")]
    NoPreestAssignments { language: String, skill: String },

    /// No preliminary-estimate weights exist for this key.
    #[error("no preest weights for {language}/{skill} (vspt: {vspt}, sa: {sa})")]
    NoPreestWeight {
        language: String,
        skill: String,
        vspt: bool,
        sa: bool,
    },

    /// The assignment list is too short for the requested index.
    #[error("preest assignments for {language}/{skill} have no entry at index {index}")]
    AssignmentOutOfRange {
        language: String,
        skill: String,
        index: usize,
    },

    /// The estimate exceeds every assignment threshold.
    #[error("no booklet threshold for {language}/{skill} covers estimate {estimate}")]
    NoBookletForEstimate {
        language: String,
        skill: String,
        estimate: f64,
    },

    /// The booklet is not in the catalog, or has no baskets.
    #[error("unknown or empty booklet: {0}")]
    UnknownBooklet(u32),

    /// The basket is not in the catalog.
    #[error("unknown basket: {0}")]
    UnknownBasket(u32),

    // -- client -------------------------------------------------------------
    /// A required request field was absent or empty.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A request field could not be parsed.
    #[error("invalid value for field '{field}': {value}")]
    InvalidField { field: String, value: String },

    /// The basket type is not one of the five known presentation types.
    #[error("unrecognised basket type: {0}")]
    UnknownBasketType(String),

    /// The submission names a different basket than the session expects.
    #[error("basket {submitted} submitted but the current basket is {expected}")]
    WrongBasket { expected: u32, submitted: u32 },

    /// The submitted basket type does not match the catalog.
    #[error("basket {basket_id} is of type '{expected}', not '{submitted}'")]
    BasketTypeMismatch {
        basket_id: u32,
        expected: String,
        submitted: String,
    },

    /// A basket submission carried no item responses.
    #[error("no item responses supplied for basket {basket_id}")]
    EmptyBasket { basket_id: u32 },

    /// An item response arrived without a position in its basket.
    #[error("no position supplied for item {item_id}")]
    MissingPosition { item_id: u32 },

    /// An item's position in its basket was not a positive integer.
    #[error("invalid position '{value}' for item {item_id}")]
    InvalidPosition { item_id: u32, value: String },

    /// Positions within a basket were duplicated or left gaps.
    #[error("item positions in basket {basket_id} are not 1..{count}")]
    PositionsNotContiguous { basket_id: u32, count: usize },

    /// The same item was answered more than once in one basket.
    #[error("item {item_id} answered more than once in basket {basket_id}")]
    DuplicateItem { basket_id: u32, item_id: u32 },

    /// The item does not exist in the catalog.
    #[error("unknown item: {0}")]
    UnknownItem(u32),

    /// The answer does not exist in the catalog.
    #[error("unknown answer: {0}")]
    UnknownAnswer(u32),

    /// The answer belongs to a different item.
    #[error("answer {answer_id} does not belong to item {item_id}")]
    AnswerItemMismatch { item_id: u32, answer_id: u32 },

    /// The item is not part of the basket being submitted.
    #[error("item {item_id} is not part of basket {basket_id}")]
    ItemNotInBasket { item_id: u32, basket_id: u32 },

    /// The transition is not valid from the session's current phase.
    #[error("cannot {action} while the session is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },

    // -- scoring ------------------------------------------------------------
    /// No self-assessment grade row matches the raw score.
    #[error("no sa grade for skill '{skill}' and raw score {raw_score}")]
    NoSaGrade { skill: String, raw_score: u32 },
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NoVsptWords { .. }
            | EngineError::NoVsptBands { .. }
            | EngineError::NoVsptBand { .. }
            | EngineError::NoPreestAssignments { .. }
            | EngineError::NoPreestWeight { .. }
            | EngineError::AssignmentOutOfRange { .. }
            | EngineError::NoBookletForEstimate { .. }
            | EngineError::UnknownBooklet(_)
            | EngineError::UnknownBasket(_) => ErrorKind::Configuration,
            EngineError::NoSaGrade { .. } => ErrorKind::Scoring,
            _ => ErrorKind::Client,
        }
    }

    /// Returns `true` if the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::Client
    }

    /// Returns `true` if reference data is missing or inconsistent.
    pub fn is_configuration_error(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Errors reported by a persistence sink.
///
/// The engine logs these and carries on; they never fail a transition.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink is no longer accepting events.
    #[error("capture sink closed")]
    Closed,

    /// The sink refused the event.
    #[error("capture sink rejected event: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            EngineError::NoVsptWords {
                language: "eng".into()
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert!(EngineError::UnknownBasketType("quiz".into()).is_client_error());
        assert!(EngineError::MissingPosition { item_id: 4 }.is_client_error());
        assert_eq!(
            EngineError::NoSaGrade {
                skill: "reading".into(),
                raw_score: 7
            }
            .kind(),
            ErrorKind::Scoring
        );
        assert!(EngineError::UnknownBooklet(3).is_configuration_error());
    }

    #[test]
    fn messages_name_the_key() {
        let err = EngineError::NoBookletForEstimate {
            language: "eng".into(),
            skill: "reading".into(),
            estimate: 2.5,
        };
        assert_eq!(
            err.to_string(),
            "no booklet threshold for eng/reading covers estimate 2.5"
        );
    }
}
