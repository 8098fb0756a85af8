//! Form-field parsing.
//!
//! Submissions arrive as flat string maps. These functions turn them into
//! typed values before any state is touched.
//!
//! | submission        | key                 | value                       |
//! |-------------------|---------------------|-----------------------------|
//! | VSPT              | `word:<id>`         | `valid` for "yes"           |
//! | SA                | `statement:<id>`    | `yes` for "agree"           |
//! | basket (mcq)      | `itemId`, `response`| item id, answer id          |
//! | basket (others)   | `<item>-response`   | answer id or text           |
//! |                   | `<item>-position`   | 1-based position in basket  |

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::model::{BasketType, ResponseShape};

pub type FormFields = HashMap<String, String>;

const WORD_PREFIX: &str = "word:";
const STATEMENT_PREFIX: &str = "statement:";
const RESPONSE_SUFFIX: &str = "-response";
const POSITION_SUFFIX: &str = "-position";

/// VSPT responses keyed by word id. Fields without the `word:` prefix are
/// ignored.
pub fn parse_vspt_fields(fields: &FormFields) -> HashMap<String, bool> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(WORD_PREFIX)
                .map(|id| (id.to_string(), value == "valid"))
        })
        .collect()
}

/// SA responses keyed by statement id.
pub fn parse_sa_fields(fields: &FormFields) -> HashMap<String, bool> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(STATEMENT_PREFIX)
                .map(|id| (id.to_string(), value == "yes"))
        })
        .collect()
}

/// A single item's raw response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    AnswerId(u32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemSubmission {
    pub item_id: u32,
    pub position: u32,
    pub value: ResponseValue,
}

/// A parsed basket submission. Items are ordered by position, and positions
/// are exactly `1..=items.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketSubmission {
    pub basket_id: u32,
    pub basket_type: BasketType,
    pub items: Vec<ItemSubmission>,
}

impl BasketSubmission {
    pub fn parse(fields: &FormFields) -> Result<Self, EngineError> {
        let basket_id = parse_u32(fields, "basketId")?;
        let raw_type = required(fields, "basketType")?;
        let basket_type: BasketType = raw_type
            .parse()
            .map_err(|_| EngineError::UnknownBasketType(raw_type.to_string()))?;

        let mut items = if basket_type == BasketType::Mcq {
            vec![ItemSubmission {
                item_id: parse_u32(fields, "itemId")?,
                position: 1,
                value: ResponseValue::AnswerId(parse_u32(fields, "response")?),
            }]
        } else {
            parse_item_fields(fields, basket_type.response_shape())?
        };

        if items.is_empty() {
            return Err(EngineError::EmptyBasket { basket_id });
        }

        let mut seen = HashSet::new();
        if let Some(dup) = items.iter().find(|i| !seen.insert(i.item_id)) {
            return Err(EngineError::DuplicateItem {
                basket_id,
                item_id: dup.item_id,
            });
        }

        items.sort_by_key(|i| i.position);
        let contiguous = items
            .iter()
            .enumerate()
            .all(|(index, item)| item.position as usize == index + 1);
        if !contiguous {
            return Err(EngineError::PositionsNotContiguous {
                basket_id,
                count: items.len(),
            });
        }

        Ok(Self {
            basket_id,
            basket_type,
            items,
        })
    }
}

fn parse_item_fields(
    fields: &FormFields,
    shape: ResponseShape,
) -> Result<Vec<ItemSubmission>, EngineError> {
    let mut items = Vec::new();
    for (key, value) in fields {
        let Some(raw_id) = key.strip_suffix(RESPONSE_SUFFIX) else {
            continue;
        };
        let item_id: u32 = raw_id.parse().map_err(|_| EngineError::InvalidField {
            field: key.clone(),
            value: raw_id.to_string(),
        })?;

        let position_key = format!("{raw_id}{POSITION_SUFFIX}");
        let raw_position = fields
            .get(&position_key)
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .ok_or(EngineError::MissingPosition { item_id })?;
        let position = raw_position
            .parse::<u32>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| EngineError::InvalidPosition {
                item_id,
                value: raw_position.to_string(),
            })?;

        let value = match shape {
            ResponseShape::Identifier => {
                ResponseValue::AnswerId(value.trim().parse().map_err(|_| {
                    EngineError::InvalidField {
                        field: key.clone(),
                        value: value.clone(),
                    }
                })?)
            }
            ResponseShape::FreeText => ResponseValue::Text(value.clone()),
        };

        items.push(ItemSubmission {
            item_id,
            position,
            value,
        });
    }
    Ok(items)
}

fn required<'a>(fields: &'a FormFields, name: &str) -> Result<&'a str, EngineError> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::MissingField(name.to_string()))
}

fn parse_u32(fields: &FormFields, name: &str) -> Result<u32, EngineError> {
    let raw = required(fields, name)?;
    raw.parse().map_err(|_| EngineError::InvalidField {
        field: name.to_string(),
        value: raw.to_string(),
    })
}
