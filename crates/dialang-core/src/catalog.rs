//! Immutable reference catalog.
//!
//! Built once at startup from a directory of JSON tables (or directly from
//! in-memory rows in tests) and shared read-only by every component.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{
    Answer, Basket, Booklet, GradeKey, Item, ItemGrade, PreestAssignment, PreestKey,
    PreestWeight, ResponseShape, SaGrade, SaWeight, TestKey, VsptBand, VsptWord,
};

/// Raw table rows, as loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogTables {
    pub items: Vec<Item>,
    pub answers: Vec<Answer>,
    pub baskets: Vec<Basket>,
    pub booklets: Vec<Booklet>,
    /// Punctuation characters as lowercase hex code points (e.g. "21" for '!').
    #[serde(default)]
    pub punctuation: Vec<String>,
    pub vspt_words: Vec<VsptWord>,
    pub vspt_bands: Vec<VsptBand>,
    pub sa_weights: Vec<SaWeight>,
    pub sa_grades: Vec<SaGrade>,
    pub preest_weights: Vec<PreestWeight>,
    pub preest_assignments: Vec<PreestAssignment>,
    pub item_grades: Vec<ItemGrade>,
}

/// Indexed, read-only reference data.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    items: HashMap<u32, Item>,
    answers: HashMap<u32, Answer>,
    item_answers: HashMap<u32, Vec<Answer>>,
    baskets: HashMap<u32, Basket>,
    booklets: HashMap<u32, Booklet>,
    punctuation: HashSet<char>,
    vspt_words: HashMap<String, Vec<VsptWord>>,
    vspt_bands: HashMap<String, Vec<VsptBand>>,
    sa_weights: HashMap<String, HashMap<String, u32>>,
    sa_grades: HashMap<String, HashMap<u32, SaGrade>>,
    preest_weights: HashMap<PreestKey, PreestWeight>,
    preest_assignments: HashMap<TestKey, Vec<PreestAssignment>>,
    item_grades: HashMap<GradeKey, HashMap<u32, ItemGrade>>,
}

/// Row counts per table, for display.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub items: usize,
    pub answers: usize,
    pub baskets: usize,
    pub booklets: usize,
    pub punctuation: usize,
    pub vspt_languages: usize,
    pub sa_skills: usize,
    pub preest_keys: usize,
    pub grading_tables: usize,
}

impl ReferenceCatalog {
    /// Index raw rows into lookup tables.
    ///
    /// Assignment lists are sorted ascending by threshold; selection depends
    /// on that order.
    pub fn from_tables(tables: CatalogTables) -> Self {
        let mut catalog = ReferenceCatalog::default();

        for answer in tables.answers {
            catalog
                .item_answers
                .entry(answer.item_id)
                .or_default()
                .push(answer.clone());
            catalog.answers.insert(answer.id, answer);
        }
        for answers in catalog.item_answers.values_mut() {
            answers.sort_by_key(|a| a.id);
        }

        catalog.items = tables.items.into_iter().map(|i| (i.id, i)).collect();
        catalog.baskets = tables.baskets.into_iter().map(|b| (b.id, b)).collect();
        catalog.booklets = tables.booklets.into_iter().map(|b| (b.id, b)).collect();
        catalog.punctuation = parse_punctuation(&tables.punctuation);

        for word in tables.vspt_words {
            catalog
                .vspt_words
                .entry(word.language.clone())
                .or_default()
                .push(word);
        }
        for band in tables.vspt_bands {
            catalog
                .vspt_bands
                .entry(band.language.clone())
                .or_default()
                .push(band);
        }

        for weight in tables.sa_weights {
            catalog
                .sa_weights
                .entry(weight.skill.clone())
                .or_default()
                .insert(weight.statement_id, weight.weight);
        }
        for grade in tables.sa_grades {
            catalog
                .sa_grades
                .entry(grade.skill.clone())
                .or_default()
                .insert(grade.raw_score, grade);
        }

        for weight in tables.preest_weights {
            let key = PreestKey {
                test: TestKey::new(&weight.language, &weight.skill),
                vspt_submitted: weight.vspt_submitted,
                sa_submitted: weight.sa_submitted,
            };
            catalog.preest_weights.insert(key, weight);
        }
        for assignment in tables.preest_assignments {
            catalog
                .preest_assignments
                .entry(TestKey::new(&assignment.language, &assignment.skill))
                .or_default()
                .push(assignment);
        }
        for assignments in catalog.preest_assignments.values_mut() {
            assignments.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        }

        for grade in tables.item_grades {
            let key = GradeKey {
                test: TestKey::new(&grade.language, &grade.skill),
                booklet_id: grade.booklet_id,
            };
            catalog
                .item_grades
                .entry(key)
                .or_default()
                .insert(grade.raw_score, grade);
        }

        catalog
    }

    /// Load every table from a catalog directory.
    ///
    /// `punctuation.json` is optional; every other table is required.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("catalog directory not found: {}", dir.display());
        }

        let punctuation_path = dir.join("punctuation.json");
        let punctuation = if punctuation_path.exists() {
            read_table(dir, "punctuation.json")?
        } else {
            tracing::warn!(
                "no punctuation list in {}, free-text matching will keep punctuation",
                dir.display()
            );
            Vec::new()
        };

        let tables = CatalogTables {
            items: read_table(dir, "items.json")?,
            answers: read_table(dir, "answers.json")?,
            baskets: read_table(dir, "baskets.json")?,
            booklets: read_table(dir, "booklets.json")?,
            punctuation,
            vspt_words: read_table(dir, "vspt-words.json")?,
            vspt_bands: read_table(dir, "vspt-bands.json")?,
            sa_weights: read_table(dir, "sa-weights.json")?,
            sa_grades: read_table(dir, "sa-grades.json")?,
            preest_weights: read_table(dir, "preest-weights.json")?,
            preest_assignments: read_table(dir, "preest-assignments.json")?,
            item_grades: read_table(dir, "item-grades.json")?,
        };

        let catalog = Self::from_tables(tables);
        tracing::info!(
            items = catalog.items.len(),
            booklets = catalog.booklets.len(),
            "loaded catalog from {}",
            dir.display()
        );
        Ok(catalog)
    }

    pub fn item(&self, id: u32) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn answer(&self, id: u32) -> Option<&Answer> {
        self.answers.get(&id)
    }

    /// Every answer registered for an item, ordered by answer id.
    pub fn answers_for_item(&self, item_id: u32) -> &[Answer] {
        self.item_answers
            .get(&item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn basket(&self, id: u32) -> Option<&Basket> {
        self.baskets.get(&id)
    }

    pub fn booklet(&self, id: u32) -> Option<&Booklet> {
        self.booklets.get(&id)
    }

    pub fn punctuation(&self) -> &HashSet<char> {
        &self.punctuation
    }

    pub fn vspt_words(&self, language: &str) -> Option<&[VsptWord]> {
        self.vspt_words.get(language).map(Vec::as_slice)
    }

    pub fn vspt_bands(&self, language: &str) -> Option<&[VsptBand]> {
        self.vspt_bands.get(language).map(Vec::as_slice)
    }

    pub fn sa_weights(&self, skill: &str) -> Option<&HashMap<String, u32>> {
        self.sa_weights.get(skill)
    }

    pub fn sa_grade(&self, skill: &str, raw_score: u32) -> Option<&SaGrade> {
        self.sa_grades.get(skill)?.get(&raw_score)
    }

    pub fn preest_weight(&self, key: &PreestKey) -> Option<&PreestWeight> {
        self.preest_weights.get(key)
    }

    /// Assignments for a language and skill, ascending by threshold.
    pub fn preest_assignments(&self, key: &TestKey) -> Option<&[PreestAssignment]> {
        self.preest_assignments.get(key).map(Vec::as_slice)
    }

    pub fn item_grades(&self, key: &GradeKey) -> Option<&HashMap<u32, ItemGrade>> {
        self.item_grades.get(key)
    }

    /// Whether `item` sits in `basket_id` or in one of its child testlets.
    pub fn basket_contains_item(&self, basket_id: u32, item: &Item) -> bool {
        let mut current = Some(item.basket_id);
        let mut hops = 0;
        while let Some(id) = current {
            if id == basket_id {
                return true;
            }
            // Guard against cycles in malformed parent links.
            hops += 1;
            if hops > self.baskets.len() {
                return false;
            }
            current = self.baskets.get(&id).and_then(|b| b.parent_id);
        }
        false
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            items: self.items.len(),
            answers: self.answers.len(),
            baskets: self.baskets.len(),
            booklets: self.booklets.len(),
            punctuation: self.punctuation.len(),
            vspt_languages: self.vspt_words.len(),
            sa_skills: self.sa_weights.len(),
            preest_keys: self.preest_assignments.len(),
            grading_tables: self.item_grades.len(),
        }
    }

    /// Check the catalog for data that would break or degrade a session.
    pub fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        let mut booklet_ids: Vec<_> = self.booklets.keys().copied().collect();
        booklet_ids.sort_unstable();
        for id in booklet_ids {
            let booklet = &self.booklets[&id];
            if booklet.basket_ids.is_empty() {
                warnings.push(ValidationWarning::new(
                    "booklets",
                    format!("booklet {id} has no baskets"),
                ));
            }
            let mut item_count = 0u32;
            for basket_id in &booklet.basket_ids {
                if !self.baskets.contains_key(basket_id) {
                    warnings.push(ValidationWarning::new(
                        "booklets",
                        format!("booklet {id} references unknown basket {basket_id}"),
                    ));
                }
                item_count += self
                    .items
                    .values()
                    .filter(|item| self.basket_contains_item(*basket_id, item))
                    .count() as u32;
            }
            if item_count != booklet.length {
                warnings.push(ValidationWarning::new(
                    "booklets",
                    format!(
                        "booklet {id} declares length {} but its baskets hold {item_count} items",
                        booklet.length
                    ),
                ));
            }
        }

        for (language, bands) in &self.vspt_bands {
            let mut sorted: Vec<_> = bands.iter().collect();
            sorted.sort_by_key(|b| b.low);
            for pair in sorted.windows(2) {
                if pair[1].low <= pair[0].high {
                    warnings.push(ValidationWarning::new(
                        "vspt-bands",
                        format!(
                            "bands {}..={} and {}..={} overlap for '{language}'",
                            pair[0].low, pair[0].high, pair[1].low, pair[1].high
                        ),
                    ));
                }
            }
        }

        for (language, words) in &self.vspt_words {
            let real = words.iter().filter(|w| w.valid).count();
            if real == 0 || real == words.len() {
                warnings.push(ValidationWarning::new(
                    "vspt-words",
                    format!("word list for '{language}' needs both real and invented words"),
                ));
            }
        }

        let mut item_ids: Vec<_> = self.items.keys().copied().collect();
        item_ids.sort_unstable();
        for id in item_ids {
            let item = &self.items[&id];
            let shape = self
                .baskets
                .get(&item.basket_id)
                .map(|b| b.basket_type.response_shape());
            if shape == Some(ResponseShape::Identifier) {
                let correct = self
                    .answers_for_item(id)
                    .iter()
                    .filter(|a| a.correct)
                    .count();
                if correct != 1 {
                    warnings.push(ValidationWarning::new(
                        "answers",
                        format!("item {id} has {correct} correct answers, expected 1"),
                    ));
                }
            }
        }

        for (key, assignments) in &self.preest_assignments {
            if assignments.len() < 2 {
                warnings.push(ValidationWarning::new(
                    "preest-assignments",
                    format!(
                        "{}/{} has {} assignment(s); the default booklet needs at least 2",
                        key.language,
                        key.skill,
                        assignments.len()
                    ),
                ));
            }
            for assignment in assignments {
                let grade_key = GradeKey {
                    test: key.clone(),
                    booklet_id: assignment.booklet_id,
                };
                if !self.item_grades.contains_key(&grade_key) {
                    warnings.push(ValidationWarning::new(
                        "item-grades",
                        format!(
                            "no grading table for {}/{} booklet {}; results will default to A1",
                            key.language, key.skill, assignment.booklet_id
                        ),
                    ));
                }
                if !self.booklets.contains_key(&assignment.booklet_id) {
                    warnings.push(ValidationWarning::new(
                        "preest-assignments",
                        format!(
                            "{}/{} assigns unknown booklet {}",
                            key.language, key.skill, assignment.booklet_id
                        ),
                    ));
                }
            }
        }

        for key in self.preest_weights.keys() {
            if !self.preest_assignments.contains_key(&key.test) {
                warnings.push(ValidationWarning::new(
                    "preest-weights",
                    format!(
                        "weights for {}/{} have no booklet assignments",
                        key.test.language, key.test.skill
                    ),
                ));
            }
        }

        warnings
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The table the warning concerns.
    pub table: &'static str,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(table: &'static str, message: String) -> Self {
        Self { table, message }
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = dir.join(name);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read catalog table: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse catalog table: {}", path.display()))
}

fn parse_punctuation(entries: &[String]) -> HashSet<char> {
    entries
        .iter()
        .filter_map(|entry| {
            let parsed = u32::from_str_radix(entry.trim(), 16)
                .ok()
                .and_then(char::from_u32);
            if parsed.is_none() {
                tracing::warn!("skipping unparseable punctuation entry '{entry}'");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BasketType, CefrLevel};

    fn item(id: u32, basket_id: u32, position: u32) -> Item {
        Item {
            id,
            item_type: "mcq".into(),
            skill: "reading".into(),
            sub_skill: String::new(),
            text: String::new(),
            weight: 1,
            basket_id,
            position,
        }
    }

    fn assignment(threshold: f64, booklet_id: u32) -> PreestAssignment {
        PreestAssignment {
            language: "eng".into(),
            skill: "reading".into(),
            threshold,
            booklet_id,
        }
    }

    #[test]
    fn assignments_are_sorted_by_threshold() {
        let catalog = ReferenceCatalog::from_tables(CatalogTables {
            preest_assignments: vec![
                assignment(1.0, 3),
                assignment(-0.4, 1),
                assignment(0.5, 2),
            ],
            ..Default::default()
        });
        let list = catalog
            .preest_assignments(&TestKey::new("eng", "reading"))
            .unwrap();
        let ids: Vec<u32> = list.iter().map(|a| a.booklet_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn punctuation_is_parsed_from_hex() {
        let set = parse_punctuation(&["21".into(), "2d".into(), "zz".into()]);
        assert!(set.contains(&'!'));
        assert!(set.contains(&'-'));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn child_testlet_items_belong_to_parent() {
        let catalog = ReferenceCatalog::from_tables(CatalogTables {
            baskets: vec![
                Basket {
                    id: 10,
                    basket_type: BasketType::TabbedPane,
                    parent_id: None,
                },
                Basket {
                    id: 11,
                    basket_type: BasketType::Mcq,
                    parent_id: Some(10),
                },
            ],
            ..Default::default()
        });
        assert!(catalog.basket_contains_item(10, &item(1, 11, 1)));
        assert!(catalog.basket_contains_item(11, &item(1, 11, 1)));
        assert!(!catalog.basket_contains_item(12, &item(1, 11, 1)));
    }

    #[test]
    fn validate_flags_overlapping_bands_and_short_assignments() {
        let band = |low, high| VsptBand {
            language: "eng".into(),
            level: CefrLevel::A1,
            low,
            high,
        };
        let catalog = ReferenceCatalog::from_tables(CatalogTables {
            vspt_bands: vec![band(0, 300), band(300, 600)],
            preest_assignments: vec![assignment(0.0, 1)],
            ..Default::default()
        });
        let warnings = catalog.validate();
        assert!(warnings.iter().any(|w| w.message.contains("overlap")));
        assert!(warnings.iter().any(|w| w.message.contains("at least 2")));
    }

    #[test]
    fn validate_flags_id_items_without_single_correct_answer() {
        let catalog = ReferenceCatalog::from_tables(CatalogTables {
            items: vec![item(1, 10, 1)],
            baskets: vec![Basket {
                id: 10,
                basket_type: BasketType::Mcq,
                parent_id: None,
            }],
            answers: vec![
                Answer {
                    id: 1,
                    item_id: 1,
                    text: "a".into(),
                    correct: true,
                },
                Answer {
                    id: 2,
                    item_id: 1,
                    text: "b".into(),
                    correct: true,
                },
            ],
            booklets: vec![Booklet {
                id: 1,
                basket_ids: vec![10],
                length: 1,
            }],
            ..Default::default()
        });
        let warnings = catalog.validate();
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].message.contains("2 correct answers"));
    }

    #[test]
    fn load_dir_reads_json_tables() {
        let dir = tempfile::tempdir().unwrap();
        let tables = CatalogTables {
            items: vec![item(1, 10, 1)],
            ..Default::default()
        };
        let write = |name: &str, value: serde_json::Value| {
            std::fs::write(dir.path().join(name), value.to_string()).unwrap();
        };
        write("items.json", serde_json::to_value(&tables.items).unwrap());
        for name in [
            "answers.json",
            "baskets.json",
            "booklets.json",
            "vspt-words.json",
            "vspt-bands.json",
            "sa-weights.json",
            "sa-grades.json",
            "preest-weights.json",
            "preest-assignments.json",
            "item-grades.json",
        ] {
            write(name, serde_json::json!([]));
        }

        let catalog = ReferenceCatalog::load_dir(dir.path()).unwrap();
        assert!(catalog.item(1).is_some());
        assert!(catalog.punctuation().is_empty());
    }

    #[test]
    fn load_dir_missing_table_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReferenceCatalog::load_dir(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("items.json"));
    }
}
