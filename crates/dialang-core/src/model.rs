//! Reference data model.
//!
//! Rows of the immutable tables the catalog is built from, the composite
//! keys used to index them, and the CEFR scale every grade is reported on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common European Framework of Reference level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// Map a numeric grade (1..=6) onto the CEFR scale.
    ///
    /// Grade 0 and anything outside the scale map to the lowest level.
    pub fn for_grade(grade: u8) -> Self {
        match grade {
            2 => CefrLevel::A2,
            3 => CefrLevel::B1,
            4 => CefrLevel::B2,
            5 => CefrLevel::C1,
            6 => CefrLevel::C2,
            _ => CefrLevel::A1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("unknown CEFR level: {other}")),
        }
    }
}

/// Presentation type of a basket, which fixes the shape of its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasketType {
    /// A single multiple-choice item answered at basket level.
    Mcq,
    /// Several multiple-choice items shown in tabs.
    TabbedPane,
    /// Free-text answers to several questions.
    ShortAnswer,
    /// Free-text gaps in a passage.
    GapText,
    /// Gaps filled by dragging one of a fixed set of answers.
    GapDrop,
}

/// How a basket's responses are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// The response names an answer id.
    Identifier,
    /// The response is text matched against the item's answers.
    FreeText,
}

impl BasketType {
    pub fn response_shape(&self) -> ResponseShape {
        match self {
            BasketType::Mcq | BasketType::TabbedPane | BasketType::GapDrop => {
                ResponseShape::Identifier
            }
            BasketType::ShortAnswer | BasketType::GapText => ResponseShape::FreeText,
        }
    }
}

impl fmt::Display for BasketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasketType::Mcq => write!(f, "mcq"),
            BasketType::TabbedPane => write!(f, "tabbedpane"),
            BasketType::ShortAnswer => write!(f, "shortanswer"),
            BasketType::GapText => write!(f, "gaptext"),
            BasketType::GapDrop => write!(f, "gapdrop"),
        }
    }
}

impl FromStr for BasketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mcq" => Ok(BasketType::Mcq),
            "tabbedpane" => Ok(BasketType::TabbedPane),
            "shortanswer" => Ok(BasketType::ShortAnswer),
            "gaptext" => Ok(BasketType::GapText),
            "gapdrop" => Ok(BasketType::GapDrop),
            other => Err(format!("unknown basket type: {other}")),
        }
    }
}

/// A single test item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    /// Item type as authored (e.g. "mcq", "gapdrop", "shortanswer").
    pub item_type: String,
    pub skill: String,
    #[serde(default)]
    pub sub_skill: String,
    #[serde(default)]
    pub text: String,
    /// Maximum score for this item.
    pub weight: u32,
    /// The basket (or child testlet) the item belongs to.
    pub basket_id: u32,
    /// 1-based position within its basket.
    pub position: u32,
}

/// A candidate answer for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: u32,
    pub item_id: u32,
    #[serde(default)]
    pub text: String,
    pub correct: bool,
}

/// A group of items administered and submitted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub id: u32,
    pub basket_type: BasketType,
    /// Parent testlet, for baskets nested inside another basket.
    #[serde(default)]
    pub parent_id: Option<u32>,
}

/// An ordered sequence of baskets forming one difficulty tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booklet {
    pub id: u32,
    pub basket_ids: Vec<u32>,
    /// Total number of items across the booklet.
    pub length: u32,
}

/// A VSPT probe word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsptWord {
    pub language: String,
    pub word_id: String,
    pub word: String,
    /// `true` for a real word, `false` for an invented one.
    pub valid: bool,
    #[serde(default)]
    pub weight: i32,
}

/// A Meara score range mapped onto a CEFR level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsptBand {
    pub language: String,
    pub level: CefrLevel,
    pub low: u32,
    pub high: u32,
}

impl VsptBand {
    pub fn contains(&self, score: u32) -> bool {
        (self.low..=self.high).contains(&score)
    }
}

/// Weight of one self-assessment statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaWeight {
    pub skill: String,
    pub statement_id: String,
    pub weight: u32,
}

/// Precomputed self-assessment grading row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaGrade {
    pub skill: String,
    pub raw_score: u32,
    /// Proficiency estimate.
    pub ppe: f64,
    /// Standard error of the estimate.
    pub se: f64,
    pub grade: u8,
}

/// Coefficients combining pre-test results into one ability estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreestWeight {
    pub language: String,
    pub skill: String,
    pub vspt_submitted: bool,
    pub sa_submitted: bool,
    pub sa_weight: f64,
    pub vspt_weight: f64,
    pub constant: f64,
}

/// Estimate threshold at or below which a booklet is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreestAssignment {
    pub language: String,
    pub skill: String,
    pub threshold: f64,
    pub booklet_id: u32,
}

/// Final grading row for a raw score on one booklet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemGrade {
    pub language: String,
    pub skill: String,
    pub booklet_id: u32,
    pub raw_score: u32,
    pub estimate: f64,
    pub se: f64,
    pub grade: u8,
}

// ---------------------------------------------------------------------------
// Composite lookup keys
// ---------------------------------------------------------------------------

/// A test language and skill pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestKey {
    pub language: String,
    pub skill: String,
}

impl TestKey {
    pub fn new(language: &str, skill: &str) -> Self {
        Self {
            language: language.to_string(),
            skill: skill.to_string(),
        }
    }
}

/// Key for the preliminary-estimate weight table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreestKey {
    pub test: TestKey,
    pub vspt_submitted: bool,
    pub sa_submitted: bool,
}

/// Key for a booklet's final grading table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GradeKey {
    pub test: TestKey,
    pub booklet_id: u32,
}
