// File: ./src/model/translated.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A text field stored once per language code (`fi`, `sv`, `zh_hans`...).
///
/// Absent languages and `None` are the same thing: setting a language to
/// `None` removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Translated(BTreeMap<String, String>);

impl Translated {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    pub fn set(&mut self, lang: &str, value: Option<String>) {
        match value {
            Some(v) => {
                self.0.insert(lang.to_string(), v);
            }
            None => {
                self.0.remove(lang);
            }
        }
    }

    pub fn contains(&self, lang: &str) -> bool {
        self.0.contains_key(lang)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Case-insensitive substring search over every translation.
    pub fn contains_text(&self, needle_lower: &str) -> bool {
        self.0
            .values()
            .any(|v| v.to_lowercase().contains(needle_lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_none_removes_language() {
        let mut t = Translated::from_pairs([("fi", "Konsertti"), ("sv", "Konsert")]);
        t.set("sv", None);
        assert!(!t.contains("sv"));
        assert_eq!(t.get("fi"), Some("Konsertti"));
        assert_eq!(t.languages().collect::<Vec<_>>(), vec!["fi"]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let t = Translated::from_pairs([("en", "Concert")]);
        assert_eq!(serde_json::to_string(&t).unwrap(), r#"{"en":"Concert"}"#);
    }
}
