use anyhow::anyhow;

use crate::ir::TranslationMap;

/// Tie-break when the same key is translated by more than one batch. This only happens
/// when the source itself repeats a key and the repeats land in different batches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// The later-processed batch overwrites earlier values.
    #[default]
    LastWins,
    /// The first translation seen for a key is kept.
    FirstWins,
}

impl MergePolicy {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "last_wins" | "last" => Ok(Self::LastWins),
            "first_wins" | "first" => Ok(Self::FirstWins),
            other => Err(anyhow!(
                "unknown merge policy: {other} (expected last_wins|first_wins)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConflict {
    pub key: String,
    pub kept: String,
    pub dropped: String,
}

#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    policy: MergePolicy,
    map: TranslationMap,
}

impl Aggregator {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            map: TranslationMap::new(),
        }
    }

    /// Starts from an existing mapping (e.g. a resumed checkpoint).
    pub fn seeded(policy: MergePolicy, map: TranslationMap) -> Self {
        Self { policy, map }
    }

    #[must_use]
    pub fn map(&self) -> &TranslationMap {
        &self.map
    }

    #[must_use]
    pub fn into_map(self) -> TranslationMap {
        self.map
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Merges one batch's mapping and reports keys that already had a different value.
    pub fn merge(&mut self, batch: &TranslationMap) -> Vec<KeyConflict> {
        let mut conflicts = Vec::new();
        for (k, v) in batch {
            match self.map.get(k) {
                Some(existing) if existing == v => {}
                Some(existing) => {
                    let (kept, dropped) = match self.policy {
                        MergePolicy::LastWins => (v.clone(), existing.clone()),
                        MergePolicy::FirstWins => (existing.clone(), v.clone()),
                    };
                    conflicts.push(KeyConflict {
                        key: k.clone(),
                        kept: kept.clone(),
                        dropped,
                    });
                    self.map.insert(k.clone(), kept);
                }
                None => {
                    self.map.insert(k.clone(), v.clone());
                }
            }
        }
        conflicts
    }
}
