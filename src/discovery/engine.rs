//! Similarity-first discovery.
//!
//! For a source note every other embedded note is a candidate. A candidate
//! survives when it passes the folder filters, is not already linked, lives
//! in a different domain, is similar enough and scores high enough.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{
    classifier::DomainClassifier,
    config::DiscoveryConfig,
    discovery::similarity::cosine_similarity,
    domain::{
        count_generic_terms, Connection, ConnectionType, DomainDistance, NoteDomain, ScoreParams,
        SerendipityScore,
    },
    errors::DiscoveryError,
    note_id::NoteId,
    sources::{EmbeddingStore, LinkChecker},
};

pub struct SerendipityEngine {
    embeddings: Arc<dyn EmbeddingStore>,
    classifier: Arc<DomainClassifier>,
    links: Arc<dyn LinkChecker>,
    config: DiscoveryConfig,
    rng: Mutex<StdRng>,
}

impl SerendipityEngine {
    pub fn new(
        embeddings: Arc<dyn EmbeddingStore>,
        classifier: Arc<DomainClassifier>,
        links: Arc<dyn LinkChecker>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            embeddings,
            classifier,
            links,
            config,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the random source used for corpus sampling.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Find cross-domain connections for one source note, best first.
    ///
    /// A source without an embedding yields no connections.
    pub fn discover(&self, source_id: &NoteId) -> Result<Vec<Connection>, DiscoveryError> {
        if self.embeddings.get(source_id)?.is_none() {
            log::debug!("source={source_id} outcome=skip reason=no-embedding");
            return Ok(vec![]);
        }

        let all = self.embeddings.get_all()?;
        self.discover_within(source_id, &all)
    }

    fn discover_within(
        &self,
        source_id: &NoteId,
        all: &HashMap<NoteId, Vec<f32>>,
    ) -> Result<Vec<Connection>, DiscoveryError> {
        let Some(source_embedding) = all.get(source_id) else {
            return Ok(vec![]);
        };

        let source = self
            .classifier
            .classify(source_id, Some(source_embedding.clone()))?;

        let mut target_ids: Vec<&NoteId> = all.keys().filter(|id| *id != source_id).collect();
        target_ids.sort();

        let mut connections = Vec::new();
        for target_id in target_ids {
            let candidate = self.evaluate_candidate(&source, target_id, &all[target_id])?;
            if let Some(connection) = candidate {
                connections.push(connection);
            }
        }

        connections.sort_by(|a, b| {
            b.score
                .value()
                .partial_cmp(&a.score.value())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        connections.truncate(self.config.max_results);

        log::debug!("source={source_id} connections={}", connections.len());
        Ok(connections)
    }

    /// Run every filter stage for one candidate.
    ///
    /// Only a dimension mismatch is an error; every other rejection is `None`.
    fn evaluate_candidate(
        &self,
        source: &NoteDomain,
        target_id: &NoteId,
        target_embedding: &[f32],
    ) -> Result<Option<Connection>, DiscoveryError> {
        let Some(target_path) = self.classifier.path_for_id(target_id) else {
            log::debug!("target={target_id} outcome=skip reason=unindexed");
            return Ok(None);
        };

        if !self.config.path_allowed(&target_path) {
            return Ok(None);
        }

        if self.links.exists(&source.path, &target_path) {
            log::debug!("target={target_id} outcome=skip reason=already-linked");
            return Ok(None);
        }

        let target = match self
            .classifier
            .classify(target_id, Some(target_embedding.to_vec()))
        {
            Ok(target) => target,
            Err(e) => {
                log::debug!("target={target_id} outcome=skip reason=classification err={e}");
                return Ok(None);
            }
        };

        if target.primary_domain == source.primary_domain {
            return Ok(None);
        }

        let source_embedding = source.embedding.as_deref().unwrap_or_default();
        let similarity = cosine_similarity(source_embedding, target_embedding)?;
        if !similarity.is_finite() || similarity < self.config.min_similarity {
            return Ok(None);
        }

        let domain_distance = DomainDistance::from_tag_jaccard(&source.tags, &target.tags);

        // linked pairs were filtered above
        let score = SerendipityScore::calculate(ScoreParams {
            similarity,
            domain_distance: domain_distance.value(),
            is_already_linked: false,
            generic_terms_count: count_generic_terms(
                &target.title,
                &target.tags,
                &self.config.generic_terms,
            ),
        });

        if score.value() < self.config.min_serendipity_score {
            return Ok(None);
        }

        Ok(Some(Connection::new(
            source.clone(),
            target,
            score,
            domain_distance,
            similarity,
            ConnectionType::infer(similarity, domain_distance.value()),
            Utc::now(),
        )))
    }

    /// Vault-wide search: run `discover` from a random sample of sources and
    /// merge the results, keeping one connection per unordered pair.
    pub fn find_top_serendipitous_connections(
        &self,
        limit: usize,
    ) -> Result<Vec<Connection>, DiscoveryError> {
        let all = self.embeddings.get_all()?;
        let sources = self.sample_sources(&all);
        log::info!("sampling sources={} of embedded={}", sources.len(), all.len());

        let mut seen: HashSet<(NoteId, NoteId)> = HashSet::new();
        let mut merged = Vec::new();

        for source_id in sources {
            let connections = match self.discover_within(&source_id, &all) {
                Ok(connections) => connections,
                Err(DiscoveryError::NotFound(id)) => {
                    log::debug!("source={id} outcome=skip reason=not-indexed");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for connection in connections {
                if seen.insert(NoteId::pair_key(&connection.source.id, &connection.target.id)) {
                    merged.push(connection);
                }
            }
        }

        merged.sort_by(|a, b| {
            b.score
                .value()
                .partial_cmp(&a.score.value())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(limit);

        Ok(merged)
    }

    /// Sorted ids, uniformly sampled without replacement above `sample_size`.
    fn sample_sources(&self, all: &HashMap<NoteId, Vec<f32>>) -> Vec<NoteId> {
        let mut ids: Vec<NoteId> = all.keys().cloned().collect();
        ids.sort();

        if ids.len() <= self.config.sample_size {
            return ids;
        }

        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        rand::seq::index::sample(&mut *rng, ids.len(), self.config.sample_size)
            .into_iter()
            .map(|i| ids[i].clone())
            .collect()
    }
}
