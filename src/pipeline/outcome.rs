use thiserror::Error;

use crate::ir::TranslationMap;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BatchFailure {
    /// The external call errored; the batch contributes nothing.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The reply could not be used at all (JSON mode is all-or-nothing).
    #[error("parse failure: {0}")]
    Parse(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every key in the batch received a non-blank translation.
    Complete,
    /// Some keys were abstained on, dropped, or never echoed back.
    Partial { missing: Vec<String> },
    Failed(BatchFailure),
    /// Already covered by a resumed checkpoint; no call was made.
    Resumed,
}

#[derive(Clone, Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    /// Parsed translations for this batch (empty on failure).
    pub map: TranslationMap,
    pub status: BatchStatus,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, BatchStatus::Failed(_))
    }
}

/// What a run produced, batch by batch, plus the merged mapping.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<BatchOutcome>,
    pub translations: TranslationMap,
    pub elapsed_secs: f64,
}

impl RunReport {
    #[must_use]
    pub fn count(&self, pred: impl Fn(&BatchStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, BatchStatus::Failed(_)))
    }

    #[must_use]
    pub fn partial(&self) -> usize {
        self.count(|s| matches!(s, BatchStatus::Partial { .. }))
    }

    #[must_use]
    pub fn complete(&self) -> usize {
        self.count(|s| matches!(s, BatchStatus::Complete))
    }

    /// Alphabetic characters across all translated values.
    #[must_use]
    pub fn translated_letters(&self) -> usize {
        self.translations
            .values()
            .map(|v| v.chars().filter(|c| c.is_alphabetic()).count())
            .sum()
    }

    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "batches: {} complete, {} partial, {} failed, {} resumed | translated entries: {} | letters: {} | {:.2}s",
            self.complete(),
            self.partial(),
            self.failed(),
            self.count(|s| matches!(s, BatchStatus::Resumed)),
            self.translations.len(),
            self.translated_letters(),
            self.elapsed_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_ignore_digits_and_spaces() {
        let mut report = RunReport::default();
        report
            .translations
            .insert("a".to_string(), "Aşçı 2".to_string());
        report
            .translations
            .insert("b".to_string(), "Şef".to_string());
        assert_eq!(report.translated_letters(), 7);
    }
}
