use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ir::{Entry, TranslationMap};
use crate::textio::{read_text_file, write_text_file};

pub const CHECKPOINT_SCHEMA: &str = "label_translator.checkpoint.v1";

/// Aggregate mapping persisted after each batch so an interrupted run can resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema: String,
    /// Digest of the entry sequence; together with `batch_size` it ties a checkpoint to
    /// the run that wrote it.
    pub source_digest: String,
    pub batch_size: usize,
    /// Batches with a lower index are done.
    pub next_batch: usize,
    pub translations: TranslationMap,
}

impl Checkpoint {
    pub fn new(source_digest: String, batch_size: usize) -> Self {
        Self {
            schema: CHECKPOINT_SCHEMA.to_string(),
            source_digest,
            batch_size,
            next_batch: 0,
            translations: TranslationMap::new(),
        }
    }

    #[must_use]
    pub fn matches(&self, source_digest: &str, batch_size: usize) -> bool {
        self.schema == CHECKPOINT_SCHEMA
            && self.source_digest == source_digest
            && self.batch_size == batch_size
    }

    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = read_text_file(path, None)?;
        let cp: Checkpoint = serde_json::from_str(&text)
            .with_context(|| format!("parse checkpoint: {}", path.display()))?;
        Ok(Some(cp))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize checkpoint")?;
        let tmp = path.with_extension("json.tmp");
        write_text_file(&tmp, &json)?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("replace checkpoint: {}", path.display()))?;
        Ok(())
    }
}

#[must_use]
pub fn source_digest(entries: &[Entry]) -> String {
    let mut hasher = Sha256::new();
    for e in entries {
        hasher.update(e.key.as_bytes());
        hasher.update([0u8]);
        hasher.update(e.source_text.as_bytes());
        hasher.update([0xFFu8]);
    }
    hex::encode(hasher.finalize())
}
