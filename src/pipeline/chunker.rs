use anyhow::anyhow;

use crate::ir::{Batch, Entry};

/// Splits `entries` into consecutive batches of at most `batch_size`, in order. No shuffling,
/// no dedup: concatenating the batches gives back `entries`.
pub fn chunk_entries(entries: &[Entry], batch_size: usize) -> anyhow::Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(anyhow!("batch_size must be > 0"));
    }
    Ok(entries
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            entries: chunk.to_vec(),
        })
        .collect())
}

#[must_use]
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}
