use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key -> translated text. Used both for one batch's parsed reply and for the run-wide
/// aggregate.
pub type TranslationMap = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Lookup identity: the text itself for table sources, a dotted path for trees, the
    /// record name for record lists.
    pub key: String,
    pub source_text: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_text: source_text.into(),
        }
    }

    /// Table rows use the text as their key.
    pub fn keyed_by_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            key: text.clone(),
            source_text: text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// Position among all batches of the run (0-based).
    pub index: usize,
    pub entries: Vec<Entry>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Keys whose entry matches `label` as a key or as source text. Exact matches win;
    /// a case-insensitive comparison is the fallback.
    #[must_use]
    pub fn keys_for_label(&self, label: &str) -> Vec<&str> {
        let label = collapse_whitespace(label);
        if label.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<&str> = Vec::new();
        for e in &self.entries {
            if (e.key == label || collapse_whitespace(&e.source_text) == label)
                && !out.contains(&e.key.as_str())
            {
                out.push(&e.key);
            }
        }
        if !out.is_empty() {
            return out;
        }
        let lower = label.to_lowercase();
        for e in &self.entries {
            if (e.key.to_lowercase() == lower
                || collapse_whitespace(&e.source_text).to_lowercase() == lower)
                && !out.contains(&e.key.as_str())
            {
                out.push(&e.key);
            }
        }
        out
    }

    /// Keys with no usable (non-blank) value in `map`.
    #[must_use]
    pub fn missing_from(&self, map: &TranslationMap) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.entries {
            let ok = map.get(&e.key).is_some_and(|v| !is_blank(v));
            if !ok && !out.contains(&e.key) {
                out.push(e.key.clone());
            }
        }
        out
    }
}

/// Single-spaced, trimmed form used when texts are enumerated one per line.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[inline]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Batch {
        Batch {
            index: 0,
            entries: vec![
                Entry::new("home.title", "Welcome"),
                Entry::new("menu.title", "Welcome"),
                Entry::keyed_by_text("Software Engineer"),
            ],
        }
    }

    #[test]
    fn label_matches_key_or_text() {
        let b = batch();
        assert_eq!(b.keys_for_label("Welcome"), vec!["home.title", "menu.title"]);
        assert_eq!(b.keys_for_label("home.title"), vec!["home.title"]);
        assert_eq!(b.keys_for_label("software engineer"), vec!["Software Engineer"]);
        assert!(b.keys_for_label("Nurse").is_empty());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let b = batch();
        let mut map = TranslationMap::new();
        map.insert("home.title".to_string(), "Hoş geldiniz".to_string());
        map.insert("menu.title".to_string(), "   ".to_string());
        assert_eq!(
            b.missing_from(&map),
            vec!["menu.title".to_string(), "Software Engineer".to_string()]
        );
    }
}
