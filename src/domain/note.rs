use serde::{Deserialize, Serialize};

use crate::note_id::NoteId;

/// A note after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDomain {
    pub id: NoteId,
    pub path: String,
    pub title: String,
    pub primary_domain: String,
    #[serde(default)]
    pub secondary_domains: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Not persisted; the embedding store owns vectors.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}
