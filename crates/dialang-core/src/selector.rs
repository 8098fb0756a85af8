//! Adaptive booklet selection.
//!
//! Combines whatever pre-test results the session holds into a single
//! ability estimate and maps it onto a booklet through the assignment
//! thresholds for the test language and skill.

use serde::{Deserialize, Serialize};

use crate::catalog::ReferenceCatalog;
use crate::error::EngineError;
use crate::model::{PreestAssignment, PreestKey, PreestWeight, TestKey};

/// Index of the default, moderate-difficulty assignment.
const DEFAULT_ASSIGNMENT: usize = 1;

/// Fixed difficulty requested by a test execution script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestDifficulty {
    Easy,
    Medium,
    Hard,
}

impl TestDifficulty {
    fn assignment_index(&self) -> usize {
        match self {
            TestDifficulty::Easy => 0,
            TestDifficulty::Medium => DEFAULT_ASSIGNMENT,
            TestDifficulty::Hard => 2,
        }
    }
}

/// Everything booklet selection looks at.
#[derive(Debug, Clone)]
pub struct PlacementInput<'a> {
    pub language: &'a str,
    pub skill: &'a str,
    /// VSPT z-score, if the VSPT was submitted.
    pub vspt_z_score: Option<f64>,
    /// Self-assessment proficiency estimate, if the SA was submitted.
    pub sa_ppe: Option<f64>,
    /// Overrides the pre-tests when set.
    pub difficulty: Option<TestDifficulty>,
}

/// Linear combination of pre-test results.
///
/// Unsubmitted components contribute zero.
pub fn combined_estimate(weight: &PreestWeight, vspt_z_score: f64, sa_ppe: f64) -> f64 {
    sa_ppe * weight.sa_weight + vspt_z_score * weight.vspt_weight + weight.constant
}

/// First assignment, in ascending threshold order, whose threshold is at
/// least `estimate`.
///
/// This is first-fit, not nearest-fit: an estimate just above one threshold
/// goes to the next booklet up.
pub fn first_fit(assignments: &[PreestAssignment], estimate: f64) -> Option<u32> {
    assignments
        .iter()
        .find(|a| estimate <= a.threshold)
        .map(|a| a.booklet_id)
}

/// Choose the booklet to administer.
pub fn select_booklet(
    catalog: &ReferenceCatalog,
    input: &PlacementInput<'_>,
) -> Result<u32, EngineError> {
    let key = TestKey::new(input.language, input.skill);
    let assignments = catalog.preest_assignments(&key).ok_or_else(|| {
        tracing::error!("no preest assignments for {}/{}", input.language, input.skill);
        EngineError::NoPreestAssignments {
            language: input.language.to_string(),
            skill: input.skill.to_string(),
        }
    })?;

    let by_index = |index: usize| {
        assignments
            .get(index)
            .map(|a| a.booklet_id)
            .ok_or_else(|| EngineError::AssignmentOutOfRange {
                language: input.language.to_string(),
                skill: input.skill.to_string(),
                index,
            })
    };

    if let Some(difficulty) = input.difficulty {
        tracing::debug!(?difficulty, "booklet fixed by test difficulty");
        return by_index(difficulty.assignment_index());
    }

    if input.vspt_z_score.is_none() && input.sa_ppe.is_none() {
        tracing::debug!("no pre-tests submitted, using default booklet");
        return by_index(DEFAULT_ASSIGNMENT);
    }

    let weight_key = PreestKey {
        test: key,
        vspt_submitted: input.vspt_z_score.is_some(),
        sa_submitted: input.sa_ppe.is_some(),
    };
    let weight = catalog.preest_weight(&weight_key).ok_or_else(|| {
        tracing::error!(?weight_key, "no preest weights");
        EngineError::NoPreestWeight {
            language: input.language.to_string(),
            skill: input.skill.to_string(),
            vspt: weight_key.vspt_submitted,
            sa: weight_key.sa_submitted,
        }
    })?;

    let estimate = combined_estimate(
        weight,
        input.vspt_z_score.unwrap_or(0.0),
        input.sa_ppe.unwrap_or(0.0),
    );
    tracing::debug!(estimate, "combined pre-test estimate");

    first_fit(assignments, estimate).ok_or_else(|| {
        tracing::error!(
            estimate,
            "estimate exceeds every threshold for {}/{}",
            input.language,
            input.skill
        );
        EngineError::NoBookletForEstimate {
            language: input.language.to_string(),
            skill: input.skill.to_string(),
            estimate,
        }
    })
}
