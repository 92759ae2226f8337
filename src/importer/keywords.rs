// File: ./src/importer/keywords.rs
// Maps free-text category names onto the keyword vocabulary.
//
// Matching goes from strict to loose:
//   1. the whole text equals a keyword label (any translation or alt label)
//   2. the text is split on separators and conjunctions ("ja", "och",
//      "and", ",", "/", "&", "+") and every part is matched on its own
//   3. an unmatched multi-word part falls back to its last word, which in
//      Finnish compounds and noun phrases carries the head noun
//      ("klassinen musiikki" -> "musiikki")
//
// Deprecated keywords never match.
use crate::model::Keyword;
use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;

pub struct KeywordMatcher {
    labels: HashMap<String, Vec<String>>,
    separators: Regex,
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl KeywordMatcher {
    pub fn new<'a, I>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Keyword>,
    {
        let mut labels: HashMap<String, Vec<String>> = HashMap::new();
        for kw in keywords.into_iter().filter(|k| !k.deprecated) {
            for label in kw.labels() {
                if label.is_empty() {
                    continue;
                }
                let ids = labels.entry(normalize(&label)).or_default();
                if !ids.contains(&kw.id) {
                    ids.push(kw.id.clone());
                }
            }
        }
        let separators = Regex::new(r"(?i)\s*(?:,|/|&|\+|\bja\b|\boch\b|\band\b)\s*")?;
        Ok(Self { labels, separators })
    }

    fn lookup(&self, label: &str) -> Option<&Vec<String>> {
        self.labels.get(label)
    }

    /// Keyword ids for `text`, in the order they were found.
    pub fn match_text(&self, text: &str) -> Vec<String> {
        let text = normalize(text);
        if text.is_empty() {
            return Vec::new();
        }
        if let Some(ids) = self.lookup(&text) {
            return ids.clone();
        }

        let mut found: Vec<String> = Vec::new();
        for part in self.separators.split(&text).map(str::trim) {
            if part.is_empty() {
                continue;
            }
            let ids = self.lookup(part).or_else(|| {
                let mut words = part.split(' ');
                let last = words.next_back()?;
                if words.next().is_some() {
                    self.lookup(last)
                } else {
                    None
                }
            });
            for id in ids.into_iter().flatten() {
                if !found.contains(id) {
                    found.push(id.clone());
                }
            }
        }
        if found.is_empty() {
            log::debug!("No keyword match for '{}'", text);
        }
        found
    }
}
