use std::sync::Arc;

use crate::{domain::Connection, sources::Evaluator, sources::NoteSource};

const EXPLAIN_SYSTEM_PROMPT: &str = "You explain surprising links between notes from different \
fields. Be concrete and brief. Do not restate the titles.";

/// Attaches evaluator-written explanations to discovered connections.
pub struct Explainer {
    evaluator: Arc<dyn Evaluator>,
    notes: Arc<dyn NoteSource>,
    excerpt_chars: usize,
}

impl Explainer {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        notes: Arc<dyn NoteSource>,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            evaluator,
            notes,
            excerpt_chars,
        }
    }

    fn prompt(&self, connection: &Connection) -> String {
        let source = &connection.source;
        let target = &connection.target;
        format!(
            "Note A ({}): \"{}\"\n{}\n\nNote B ({}): \"{}\"\n{}\n\n\
             These notes were flagged as a {} connection (similarity {:.2}). \
             In two or three sentences, explain what idea connects them.",
            source.primary_domain,
            source.title,
            self.notes.excerpt(&source.path, self.excerpt_chars),
            target.primary_domain,
            target.title,
            self.notes.excerpt(&target.path, self.excerpt_chars),
            connection.connection_type,
            connection.similarity,
        )
    }

    /// Explain one connection. Returns whether an explanation was attached.
    pub fn explain(&self, connection: &mut Connection) -> bool {
        if connection.explanation().is_some() {
            return false;
        }

        let response = self
            .evaluator
            .generate(&self.prompt(connection), EXPLAIN_SYSTEM_PROMPT);

        match response.into_text().map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => connection.attach_explanation(text),
            _ => {
                log::warn!(
                    "pair={},{} outcome=error reason=explanation-failed",
                    connection.source.id,
                    connection.target.id
                );
                false
            }
        }
    }

    /// Explain each connection in turn. Returns how many were explained.
    pub fn explain_all(&self, connections: &mut [Connection]) -> usize {
        connections
            .iter_mut()
            .map(|c| self.explain(c))
            .filter(|explained| *explained)
            .count()
    }
}
