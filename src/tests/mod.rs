//! Scenario tests over the discovery engines, wired to in-memory collaborators.

mod deep;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    classifier::DomainClassifier,
    config::{ClassificationMethod, DiscoveryConfig},
    note_id::NoteId,
    sources::{EmbeddingStore, Evaluator, EvaluatorResponse, LinkChecker, NoteRef, NoteSource},
};

#[derive(Debug, Clone)]
pub struct MemoryNote {
    pub id: NoteId,
    pub path: String,
    pub title: String,
    pub tags: Vec<String>,
    pub body: String,
}

/// Fixed set of notes.
#[derive(Default)]
pub struct MemoryNotes {
    notes: Vec<MemoryNote>,
}

impl MemoryNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, path: &str, title: &str, tags: &[&str]) -> Self {
        self.notes.push(MemoryNote {
            id: NoteId::from(id),
            path: path.to_string(),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            body: format!("Body of {title}."),
        });
        self
    }

    fn find(&self, path: &str) -> Option<&MemoryNote> {
        self.notes.iter().find(|n| n.path == path)
    }
}

impl NoteSource for MemoryNotes {
    fn scan(&self) -> anyhow::Result<Vec<NoteRef>> {
        Ok(self
            .notes
            .iter()
            .map(|n| NoteRef {
                id: n.id.clone(),
                path: n.path.clone(),
            })
            .collect())
    }

    fn tags(&self, path: &str) -> Vec<String> {
        self.find(path).map(|n| n.tags.clone()).unwrap_or_default()
    }

    fn title(&self, path: &str) -> String {
        self.find(path).map(|n| n.title.clone()).unwrap_or_default()
    }

    fn excerpt(&self, path: &str, max_chars: usize) -> String {
        self.find(path)
            .map(|n| n.body.chars().take(max_chars).collect())
            .unwrap_or_default()
    }
}

/// Embeddings without dimension checks, so corrupted stores can be simulated.
#[derive(Default)]
pub struct MemoryEmbeddings {
    vectors: HashMap<NoteId, Vec<f32>>,
}

impl MemoryEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, vector: &[f32]) -> Self {
        self.vectors.insert(NoteId::from(id), vector.to_vec());
        self
    }
}

impl EmbeddingStore for MemoryEmbeddings {
    fn get(&self, id: &NoteId) -> anyhow::Result<Option<Vec<f32>>> {
        Ok(self.vectors.get(id).cloned())
    }

    fn get_all(&self) -> anyhow::Result<HashMap<NoteId, Vec<f32>>> {
        Ok(self.vectors.clone())
    }

    fn count(&self) -> anyhow::Result<usize> {
        Ok(self.vectors.len())
    }
}

/// Directed links; `exists` checks both directions like the vault does.
#[derive(Default)]
pub struct MemoryLinks {
    links: HashSet<(String, String)>,
}

impl MemoryLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: &str, to: &str) -> Self {
        self.links.insert((from.to_string(), to.to_string()));
        self
    }
}

impl LinkChecker for MemoryLinks {
    fn exists(&self, path_a: &str, path_b: &str) -> bool {
        self.links.contains(&(path_a.to_string(), path_b.to_string()))
            || self.links.contains(&(path_b.to_string(), path_a.to_string()))
    }
}

type Script = Box<dyn Fn(&str) -> EvaluatorResponse + Send + Sync>;

/// Evaluator answering from a closure over the prompt; records every prompt.
pub struct ScriptedEvaluator {
    script: Script,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    pub fn new(script: impl Fn(&str) -> EvaluatorResponse + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(vec![]),
        }
    }

    /// Same answer for every prompt.
    pub fn always(response: EvaluatorResponse) -> Self {
        Self::new(move |_| response.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Evaluator for ScriptedEvaluator {
    fn generate(&self, prompt: &str, _system_prompt: &str) -> EvaluatorResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.script)(prompt)
    }
}

/// Evaluator reply in the line format the deep engine parses.
pub fn judgement(possible: bool, score: f64, analogy: &str) -> EvaluatorResponse {
    EvaluatorResponse::ok(format!(
        "CONNECTION_POSSIBLE: {}\nQUALITY_SCORE: {score:.1}\nANALOGY: {analogy}",
        if possible { "YES" } else { "NO" }
    ))
}

pub fn discovery_config(method: ClassificationMethod) -> DiscoveryConfig {
    DiscoveryConfig {
        classification_method: method,
        min_similarity: 0.5,
        min_serendipity_score: 0.0,
        ..DiscoveryConfig::default()
    }
}

pub fn classifier(notes: &Arc<MemoryNotes>, config: &DiscoveryConfig) -> Arc<DomainClassifier> {
    Arc::new(DomainClassifier::new(notes.clone(), config).unwrap())
}

/// Unit vector at cosine `similarity` from `[1, 0]`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}
