//! Item scoring.
//!
//! Two response shapes are supported: identifier responses name one of the
//! item's answers, free-text responses are matched against every answer the
//! item has.

use serde::{Deserialize, Serialize};

use crate::catalog::ReferenceCatalog;
use crate::error::EngineError;
use crate::matcher::TextResponseMatcher;
use crate::model::{Answer, BasketType, Item};

/// What the test-taker submitted for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ItemResponse {
    /// The id of the chosen answer.
    Answer(u32),
    /// Free text.
    Text(String),
}

/// A scored response, not yet placed in the test.
#[derive(Debug, Clone)]
pub struct ItemScore {
    pub item: Item,
    pub response: ItemResponse,
    pub correct: bool,
    pub score: u32,
}

impl ItemScore {
    /// Attach basket and position information.
    pub fn place(
        self,
        catalog: &ReferenceCatalog,
        basket_id: u32,
        position_in_basket: u32,
        position_in_test: u32,
    ) -> ScoredItem {
        let answers = catalog.answers_for_item(self.item.id).to_vec();
        ScoredItem {
            item: self.item,
            basket_id,
            position_in_basket,
            position_in_test,
            response: self.response,
            correct: self.correct,
            score: self.score,
            answers,
        }
    }
}

/// A response event: the scored item with its place in the test and a
/// snapshot of the item's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: Item,
    pub basket_id: u32,
    pub position_in_basket: u32,
    /// 1-based position across the whole test.
    pub position_in_test: u32,
    pub response: ItemResponse,
    pub correct: bool,
    pub score: u32,
    pub answers: Vec<Answer>,
}

/// A completed basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBasket {
    pub id: u32,
    pub basket_type: BasketType,
    pub skill: String,
    /// Ordered by position in the basket.
    pub items: Vec<ScoredItem>,
}

fn lookup_item(catalog: &ReferenceCatalog, item_id: u32) -> Result<&Item, EngineError> {
    catalog
        .item(item_id)
        .ok_or(EngineError::UnknownItem(item_id))
}

/// Score a response that names an answer.
pub fn score_id_response(
    catalog: &ReferenceCatalog,
    item_id: u32,
    answer_id: u32,
) -> Result<ItemScore, EngineError> {
    let item = lookup_item(catalog, item_id)?;
    let answer = catalog
        .answer(answer_id)
        .ok_or(EngineError::UnknownAnswer(answer_id))?;
    if answer.item_id != item_id {
        return Err(EngineError::AnswerItemMismatch { item_id, answer_id });
    }

    let score = if answer.correct { item.weight } else { 0 };
    Ok(ItemScore {
        item: item.clone(),
        response: ItemResponse::Answer(answer_id),
        correct: answer.correct,
        score,
    })
}

/// Score a free-text response. No matching answer simply scores zero.
pub fn score_text_response(
    catalog: &ReferenceCatalog,
    item_id: u32,
    text: &str,
) -> Result<ItemScore, EngineError> {
    let item = lookup_item(catalog, item_id)?;
    let matcher = TextResponseMatcher::new(catalog.punctuation());
    let correct = catalog
        .answers_for_item(item_id)
        .iter()
        .any(|answer| matcher.matches(text, &answer.text));

    Ok(ItemScore {
        item: item.clone(),
        response: ItemResponse::Text(text.to_string()),
        correct,
        score: if correct { item.weight } else { 0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogTables;

    fn item(id: u32, weight: u32) -> Item {
        Item {
            id,
            item_type: "shortanswer".into(),
            skill: "reading".into(),
            sub_skill: String::new(),
            text: String::new(),
            weight,
            basket_id: 1,
            position: 1,
        }
    }

    fn answer(id: u32, item_id: u32, text: &str, correct: bool) -> Answer {
        Answer {
            id,
            item_id,
            text: text.into(),
            correct,
        }
    }

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::from_tables(CatalogTables {
            items: vec![item(1, 2), item(2, 1)],
            answers: vec![
                answer(10, 1, "yes", true),
                answer(11, 1, "no", false),
                answer(20, 2, "the Dog", true),
                answer(21, 2, "a hound", true),
            ],
            punctuation: vec!["21".into(), "2e".into()],
            ..Default::default()
        })
    }

    #[test]
    fn correct_answer_earns_item_weight() {
        let scored = score_id_response(&catalog(), 1, 10).unwrap();
        assert!(scored.correct);
        assert_eq!(scored.score, 2);
        assert_eq!(scored.response, ItemResponse::Answer(10));
    }

    #[test]
    fn wrong_answer_scores_zero() {
        let scored = score_id_response(&catalog(), 1, 11).unwrap();
        assert!(!scored.correct);
        assert_eq!(scored.score, 0);
    }

    #[test]
    fn unknown_item_or_answer_is_an_error() {
        let catalog = catalog();
        assert!(matches!(
            score_id_response(&catalog, 9, 10),
            Err(EngineError::UnknownItem(9))
        ));
        assert!(matches!(
            score_id_response(&catalog, 1, 99),
            Err(EngineError::UnknownAnswer(99))
        ));
        assert!(matches!(
            score_id_response(&catalog, 1, 20),
            Err(EngineError::AnswerItemMismatch { .. })
        ));
    }

    #[test]
    fn text_matches_any_registered_answer() {
        let catalog = catalog();
        assert!(score_text_response(&catalog, 2, "  The   dog!").unwrap().correct);
        assert!(score_text_response(&catalog, 2, "A hound.").unwrap().correct);
        let miss = score_text_response(&catalog, 2, "a cat").unwrap();
        assert!(!miss.correct);
        assert_eq!(miss.score, 0);
    }

    #[test]
    fn text_for_unknown_item_is_an_error() {
        assert!(matches!(
            score_text_response(&catalog(), 5, "x"),
            Err(EngineError::UnknownItem(5))
        ));
    }

    #[test]
    fn placing_snapshots_answers() {
        let catalog = catalog();
        let scored = score_id_response(&catalog, 1, 10)
            .unwrap()
            .place(&catalog, 7, 2, 5);
        assert_eq!(scored.basket_id, 7);
        assert_eq!(scored.position_in_basket, 2);
        assert_eq!(scored.position_in_test, 5);
        assert_eq!(scored.answers.len(), 2);
    }
}
