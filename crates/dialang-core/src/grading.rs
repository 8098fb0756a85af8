//! Final grading.

use serde::{Deserialize, Serialize};

use crate::catalog::ReferenceCatalog;
use crate::model::{CefrLevel, GradeKey, TestKey};
use crate::scoring::ScoredItem;

/// Final result of a completed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub raw_score: u32,
    /// Sum of item weights. Diagnostic only.
    pub total_weight: u32,
    pub grade: u8,
    pub level: CefrLevel,
}

/// Grade a completed test.
///
/// A raw score with no row in the booklet's grading table is reported as
/// grade 0 / A1 rather than failing, so every test yields a result.
pub fn grade_items(
    catalog: &ReferenceCatalog,
    language: &str,
    skill: &str,
    booklet_id: u32,
    items: &[ScoredItem],
) -> ItemResult {
    let raw_score: u32 = items.iter().map(|i| i.score).sum();
    let total_weight: u32 = items.iter().map(|i| i.item.weight).sum();
    tracing::debug!(raw_score, total_weight, booklet_id, "grading test");

    let key = GradeKey {
        test: TestKey::new(language, skill),
        booklet_id,
    };
    let grade = match catalog
        .item_grades(&key)
        .and_then(|table| table.get(&raw_score))
    {
        Some(row) => row.grade,
        None => {
            tracing::warn!(
                raw_score,
                booklet_id,
                "no item grade for {language}/{skill}, defaulting to A1"
            );
            0
        }
    };

    ItemResult {
        raw_score,
        total_weight,
        grade,
        level: CefrLevel::for_grade(grade),
    }
}
