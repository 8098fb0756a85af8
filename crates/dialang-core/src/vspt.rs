//! Vocabulary Size Placement Test scoring.
//!
//! Yes/no responses to a mix of real and invented words are reduced to a
//! signal-detection z-score, scaled into a "Meara" score and banded onto the
//! CEFR scale.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::ReferenceCatalog;
use crate::error::EngineError;
use crate::model::{CefrLevel, VsptWord};

/// Response counts over one language's word list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VsptTally {
    /// Yes-responses to real words.
    pub hits: u32,
    /// Yes-responses to invented words.
    pub false_alarms: u32,
    pub real_answered: u32,
    pub fake_answered: u32,
}

impl VsptTally {
    /// Count responses over the full word list. Unanswered words count as "no".
    pub fn from_responses(words: &[VsptWord], responses: &HashMap<String, bool>) -> Self {
        let mut tally = VsptTally::default();
        for word in words {
            let yes = responses.get(&word.word_id).copied().unwrap_or(false);
            if word.valid {
                tally.real_answered += 1;
                if yes {
                    tally.hits += 1;
                }
            } else {
                tally.fake_answered += 1;
                if yes {
                    tally.false_alarms += 1;
                }
            }
        }
        tally
    }

    /// Two-alternative z-score for this tally.
    pub fn z_score(&self) -> f64 {
        if self.hits == 0 {
            return 0.0;
        }
        if self.hits == self.real_answered
            && self.fake_answered > 0
            && self.false_alarms == self.fake_answered
        {
            // Every word marked as real.
            return -1.0;
        }

        let h = f64::from(self.hits) / f64::from(self.real_answered);
        let f = if self.fake_answered == 0 {
            0.0
        } else {
            f64::from(self.false_alarms) / f64::from(self.fake_answered)
        };
        tracing::debug!(h, f, "vspt rates");

        let numerator = 4.0 * h * (1.0 - f) - 2.0 * (h - f) * (1.0 + h - f);
        let denominator = 4.0 * h * (1.0 - f) - (h - f) * (1.0 + h - f);
        let z = 1.0 - numerator / denominator;
        if z.is_finite() {
            z
        } else {
            tracing::warn!(h, f, "degenerate vspt rates, scoring as no signal");
            0.0
        }
    }
}

/// Meara score for a z-score: zero when the z-score is not positive,
/// otherwise z × 1000 rounded to the nearest integer.
pub fn meara_score(z_score: f64) -> u32 {
    if z_score <= 0.0 {
        0
    } else {
        (z_score * 1000.0).round() as u32
    }
}

/// Outcome of a VSPT submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsptResult {
    pub z_score: f64,
    pub meara_score: u32,
    pub level: CefrLevel,
}

/// Score a VSPT submission for a test language.
pub fn score_vspt(
    catalog: &ReferenceCatalog,
    language: &str,
    responses: &HashMap<String, bool>,
) -> Result<VsptResult, EngineError> {
    let words = catalog
        .vspt_words(language)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| {
            tracing::error!("no vspt words for test language '{language}'");
            EngineError::NoVsptWords {
                language: language.to_string(),
            }
        })?;

    let tally = VsptTally::from_responses(words, responses);
    let z_score = tally.z_score();
    let meara_score = meara_score(z_score);
    tracing::debug!(?tally, z_score, meara_score, "vspt scored");

    let bands = catalog.vspt_bands(language).ok_or_else(|| {
        tracing::error!("no vspt bands for test language '{language}'");
        EngineError::NoVsptBands {
            language: language.to_string(),
        }
    })?;

    let band = bands.iter().find(|b| b.contains(meara_score)).ok_or_else(|| {
        tracing::error!("no vspt band for '{language}' covers meara score {meara_score}");
        EngineError::NoVsptBand {
            language: language.to_string(),
            meara_score,
        }
    })?;

    Ok(VsptResult {
        z_score,
        meara_score,
        level: band.level,
    })
}
