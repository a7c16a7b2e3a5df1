use crate::note_id::NoteId;

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("note not found: {0}")]
    NotFound(NoteId),

    /// Vectors of different lengths point at a corrupted embedding store.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("collaborator error: {0:?}")]
    Source(#[from] anyhow::Error),
}
