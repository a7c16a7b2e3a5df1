//! Contracts for the collaborators the discovery engines consume.
//!
//! The filesystem vault, the vector store and the chat client implement
//! these; tests substitute in-memory fakes.

use std::collections::HashMap;

use crate::note_id::NoteId;

/// Read-only access to note embeddings.
pub trait EmbeddingStore: Send + Sync {
    fn get(&self, id: &NoteId) -> anyhow::Result<Option<Vec<f32>>>;
    fn get_all(&self) -> anyhow::Result<HashMap<NoteId, Vec<f32>>>;
    fn count(&self) -> anyhow::Result<usize>;
}

/// A note as listed by a corpus scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRef {
    pub id: NoteId,
    pub path: String,
}

/// Note paths and metadata.
pub trait NoteSource: Send + Sync {
    /// List every note in the corpus.
    fn scan(&self) -> anyhow::Result<Vec<NoteRef>>;
    fn tags(&self, path: &str) -> Vec<String>;
    fn title(&self, path: &str) -> String;
    /// Leading body text, at most `max_chars` characters.
    fn excerpt(&self, path: &str, max_chars: usize) -> String;
}

/// Answers whether two notes link to each other, in either direction.
pub trait LinkChecker: Send + Sync {
    fn exists(&self, path_a: &str, path_b: &str) -> bool;
}

/// Raw result of one evaluator request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluatorResponse {
    pub success: bool,
    pub text: Option<String>,
}

impl EvaluatorResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: Some(text.into()),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            text: None,
        }
    }

    /// The text of a successful response.
    pub fn into_text(self) -> Option<String> {
        if self.success {
            self.text
        } else {
            None
        }
    }
}

/// External language model judging or explaining note pairs.
pub trait Evaluator: Send + Sync {
    fn generate(&self, prompt: &str, system_prompt: &str) -> EvaluatorResponse;
}
