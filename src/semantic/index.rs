//! In-memory embedding records keyed by note id.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::note_id::NoteId;
use crate::sources::EmbeddingStore;

/// One stored embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: NoteId,
    pub vector: Vec<f32>,
    /// Model that produced the vector
    pub model: String,
    pub updated_at: DateTime<Utc>,
}

/// Embeddings for one model and dimension.
pub struct EmbeddingIndex {
    entries: RwLock<HashMap<NoteId, EmbeddingRecord>>,
    model: String,
    dimensions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store a zero-norm vector")]
    ZeroNormVector,

    #[error("Cannot store a vector with non-finite components")]
    NonFiniteVector,

    #[error("Index lock poisoned")]
    Poisoned,
}

impl EmbeddingIndex {
    pub fn new(model: &str, dimensions: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            model: model.to_string(),
            dimensions,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(id))
            .unwrap_or(false)
    }

    /// Insert or replace the embedding for `id`, stamped now.
    pub fn insert(&self, id: NoteId, vector: Vec<f32>) -> Result<(), IndexError> {
        self.insert_record(EmbeddingRecord {
            id,
            vector,
            model: self.model.clone(),
            updated_at: Utc::now(),
        })
    }

    pub fn insert_record(&self, record: EmbeddingRecord) -> Result<(), IndexError> {
        if record.vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: record.vector.len(),
            });
        }

        if record.vector.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFiniteVector);
        }

        let norm = record.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.entries
            .write()
            .map_err(|_| IndexError::Poisoned)?
            .insert(record.id.clone(), record);
        Ok(())
    }

    /// Drop every record whose id is not in `keep`. Returns how many were removed.
    pub fn retain_ids(&self, keep: &std::collections::HashSet<NoteId>) -> usize {
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|id, _| keep.contains(id));
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Snapshot of all records, ordered by id.
    pub fn records(&self) -> Vec<EmbeddingRecord> {
        let mut records: Vec<EmbeddingRecord> = self
            .entries
            .read()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

impl EmbeddingStore for EmbeddingIndex {
    fn get(&self, id: &NoteId) -> anyhow::Result<Option<Vec<f32>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!(IndexError::Poisoned))?;
        Ok(entries.get(id).map(|r| r.vector.clone()))
    }

    fn get_all(&self) -> anyhow::Result<HashMap<NoteId, Vec<f32>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!(IndexError::Poisoned))?;
        Ok(entries
            .iter()
            .map(|(id, r)| (id.clone(), r.vector.clone()))
            .collect())
    }

    fn count(&self) -> anyhow::Result<usize> {
        Ok(self.len())
    }
}
