//! In-process vector index with exact cosine search.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{IndexedEntry, VectorIndex};
use crate::error::StoreError;
use crate::record::Candidate;

#[derive(Default)]
struct Inner {
    dimensions: Option<usize>,
    entries: BTreeMap<String, IndexedEntry>,
}

/// Exact nearest-neighbor index held in memory.
///
/// The first upserted vector fixes the dimension; later vectors must match it.
#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<Inner>,
}

impl MemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored ids in lexical order.
    pub fn ids(&self) -> Vec<String> {
        self.read().entries.keys().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), StoreError> {
        let mut inner = self.write();
        let expected = inner
            .dimensions
            .or_else(|| entries.first().map(|entry| entry.embedding.len()));
        if let Some(expected) = expected {
            if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
                return Err(StoreError::Dimension {
                    expected,
                    found: bad.embedding.len(),
                });
            }
            inner.dimensions = Some(expected);
        }
        for entry in entries {
            inner.entries.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError> {
        let inner = self.read();
        if let Some(expected) = inner.dimensions {
            if expected != vector.len() {
                return Err(StoreError::Dimension {
                    expected,
                    found: vector.len(),
                });
            }
        }
        let mut scored: Vec<(f32, &IndexedEntry)> = inner
            .entries
            .values()
            .map(|entry| (cosine_similarity(&entry.embedding, vector), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| Candidate::from_metadata(&entry.metadata, entry.content.clone()))
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read().entries.len())
    }
}

/// Cosine similarity in `[-1, 1]`; 0 for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    (dot / denom) as f32
}
