//! Free-text response matching.

use std::collections::HashSet;

/// Compares free-text responses against canonical answers.
///
/// Both sides go through the same normalization: punctuation removed,
/// whitespace trimmed and collapsed to single spaces, then lowercased. With
/// an empty punctuation set only whitespace and case are normalized.
#[derive(Debug, Clone, Copy)]
pub struct TextResponseMatcher<'a> {
    punctuation: &'a HashSet<char>,
}

impl<'a> TextResponseMatcher<'a> {
    pub fn new(punctuation: &'a HashSet<char>) -> Self {
        Self { punctuation }
    }

    /// Normalize a response or answer for comparison.
    pub fn normalize(&self, input: &str) -> String {
        let stripped: String = if self.punctuation.is_empty() {
            input.to_string()
        } else {
            input
                .chars()
                .filter(|c| !self.punctuation.contains(c))
                .collect()
        };
        stripped
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Whether the response equals the answer after normalization.
    pub fn matches(&self, response: &str, answer: &str) -> bool {
        self.normalize(response) == self.normalize(answer)
    }
}
