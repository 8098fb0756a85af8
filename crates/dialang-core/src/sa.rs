//! Self-assessment scoring.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ReferenceCatalog;
use crate::error::EngineError;
use crate::model::CefrLevel;

/// Outcome of a self-assessment submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaResult {
    /// Proficiency estimate from the grading table.
    pub ppe: f64,
    pub level: CefrLevel,
}

/// Sum of the weights of every statement answered "agree".
///
/// Statements without a weight contribute nothing.
pub fn raw_score(
    catalog: &ReferenceCatalog,
    skill: &str,
    responses: &HashMap<String, bool>,
) -> u32 {
    let Some(weights) = catalog.sa_weights(skill) else {
        return 0;
    };
    responses
        .iter()
        .filter(|(_, agreed)| **agreed)
        .filter_map(|(id, _)| weights.get(id))
        .sum()
}

/// Score a self-assessment submission for a skill.
pub fn score_sa(
    catalog: &ReferenceCatalog,
    skill: &str,
    responses: &HashMap<String, bool>,
) -> Result<SaResult, EngineError> {
    let raw = raw_score(catalog, skill, responses);
    tracing::debug!(skill, raw, "sa raw score");

    let grade = catalog
        .sa_grade(skill, raw)
        .ok_or_else(|| EngineError::NoSaGrade {
            skill: skill.to_string(),
            raw_score: raw,
        })?;

    Ok(SaResult {
        ppe: grade.ppe,
        level: CefrLevel::for_grade(grade.grade),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogTables;
    use crate::model::{SaGrade, SaWeight};

    fn catalog() -> ReferenceCatalog {
        let weight = |id: &str, weight| SaWeight {
            skill: "Reading".into(),
            statement_id: id.into(),
            weight,
        };
        ReferenceCatalog::from_tables(CatalogTables {
            sa_weights: vec![weight("s1", 3), weight("s2", 5)],
            sa_grades: vec![SaGrade {
                skill: "Reading".into(),
                raw_score: 3,
                ppe: 0.4,
                se: 0.1,
                grade: 2,
            }],
            ..Default::default()
        })
    }

    fn responses(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn sums_agreed_weights() {
        let catalog = catalog();
        let r = responses(&[("s1", true), ("s2", false)]);
        assert_eq!(raw_score(&catalog, "Reading", &r), 3);
        let r = responses(&[("s1", true), ("s2", true), ("s9", true)]);
        assert_eq!(raw_score(&catalog, "Reading", &r), 8);
    }

    #[test]
    fn looks_up_grade_row() {
        let result = score_sa(
            &catalog(),
            "Reading",
            &responses(&[("s1", true), ("s2", false)]),
        )
        .unwrap();
        assert_eq!(
            result,
            SaResult {
                ppe: 0.4,
                level: CefrLevel::A2
            }
        );
    }

    #[test]
    fn missing_grade_row_is_a_scoring_error() {
        let err = score_sa(&catalog(), "Reading", &responses(&[("s2", true)])).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NoSaGrade { raw_score: 5, .. }
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::Scoring);
    }

    #[test]
    fn unknown_skill_scores_zero() {
        assert_eq!(
            raw_score(&catalog(), "Listening", &responses(&[("s1", true)])),
            0
        );
    }
}
