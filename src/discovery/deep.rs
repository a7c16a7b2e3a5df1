//! LLM-first discovery.
//!
//! Similarity-first search only proposes pairs that are already close in
//! embedding space. Here pairs are drawn by domain separation alone and the
//! evaluator decides whether a connection exists.
//!
//! Evaluator calls run strictly one at a time.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::{
    classifier::DomainClassifier,
    config::{DeepConfig, DiscoveryConfig},
    discovery::response::{evaluation_prompt, parse_judgement, EVALUATION_SYSTEM_PROMPT},
    domain::{DeepConnection, DomainDistance, NoteDomain},
    errors::DiscoveryError,
    sources::{EmbeddingStore, Evaluator, NoteSource},
};

/// Distance assigned to every candidate pair. Pairs come from different
/// domains, and this mode does not refine the value with tag overlap.
const CROSS_DOMAIN_DISTANCE: f64 = 1.0;

/// A cross-domain pair awaiting evaluation.
#[derive(Debug, Clone)]
struct CandidatePair {
    source: NoteDomain,
    target: NoteDomain,
    domain_distance: DomainDistance,
}

pub struct DeepDiscoveryEngine {
    embeddings: Arc<dyn EmbeddingStore>,
    classifier: Arc<DomainClassifier>,
    notes: Arc<dyn NoteSource>,
    evaluator: Arc<dyn Evaluator>,
    discovery: DiscoveryConfig,
    deep: DeepConfig,
    rng: Mutex<StdRng>,
}

impl DeepDiscoveryEngine {
    pub fn new(
        embeddings: Arc<dyn EmbeddingStore>,
        classifier: Arc<DomainClassifier>,
        notes: Arc<dyn NoteSource>,
        evaluator: Arc<dyn Evaluator>,
        discovery: DiscoveryConfig,
        deep: DeepConfig,
    ) -> Self {
        Self {
            embeddings,
            classifier,
            notes,
            evaluator,
            discovery,
            deep,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the random source used for sampling and shuffling.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn discover(&self) -> Result<Vec<DeepConnection>, DiscoveryError> {
        self.discover_with_progress(|_, _| {})
    }

    /// Like [`discover`](Self::discover), reporting `(evaluated, total)` after each evaluator call.
    pub fn discover_with_progress<F>(
        &self,
        mut on_evaluated: F,
    ) -> Result<Vec<DeepConnection>, DiscoveryError>
    where
        F: FnMut(usize, usize),
    {
        let groups = self.group_by_domain()?;
        if groups.len() < 2 {
            log::info!("deep discovery needs two domains, found {}", groups.len());
            return Ok(vec![]);
        }

        let candidates = self.candidate_pairs(&groups);
        let total = candidates.len();
        log::info!("deep discovery domains={} pairs={total}", groups.len());

        let mut results = Vec::new();
        for (done, pair) in candidates.into_iter().enumerate() {
            if let Some(connection) = self.evaluate(pair) {
                results.push(connection);
            }
            on_evaluated(done + 1, total);
        }

        results.retain(|c: &DeepConnection| c.quality_score >= self.deep.min_quality_score);
        results.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(self.discovery.max_results);

        Ok(results)
    }

    /// Classify every embedded note that passes the folder filters, keyed by domain.
    fn group_by_domain(&self) -> Result<BTreeMap<String, Vec<NoteDomain>>, DiscoveryError> {
        let mut ids: Vec<_> = self.embeddings.get_all()?.into_keys().collect();
        ids.sort();

        let mut groups: BTreeMap<String, Vec<NoteDomain>> = BTreeMap::new();
        for id in ids {
            let Some(path) = self.classifier.path_for_id(&id) else {
                continue;
            };
            if !self.discovery.path_allowed(&path) {
                continue;
            }

            match self.classifier.classify(&id, None) {
                Ok(note) => groups.entry(note.primary_domain.clone()).or_default().push(note),
                Err(e) => log::debug!("note={id} outcome=skip reason=classification err={e}"),
            }
        }

        Ok(groups)
    }

    /// Cross product of small per-domain samples for every pair of domains,
    /// shuffled and cut to the evaluation budget.
    fn candidate_pairs(&self, groups: &BTreeMap<String, Vec<NoteDomain>>) -> Vec<CandidatePair> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let domains: Vec<&Vec<NoteDomain>> = groups.values().collect();
        let mut pairs = Vec::new();

        for (i, left) in domains.iter().enumerate() {
            for right in &domains[i + 1..] {
                let left_sample = sample_notes(&mut *rng, left, self.deep.samples_per_domain);
                let right_sample = sample_notes(&mut *rng, right, self.deep.samples_per_domain);

                for source in &left_sample {
                    for target in &right_sample {
                        pairs.push(CandidatePair {
                            source: (*source).clone(),
                            target: (*target).clone(),
                            domain_distance: DomainDistance::from_value(CROSS_DOMAIN_DISTANCE),
                        });
                    }
                }
            }
        }

        pairs.shuffle(&mut *rng);
        pairs.truncate(self.deep.max_pairs_to_evaluate);
        pairs
    }

    /// Ask the evaluator about one pair. Failures drop the pair.
    fn evaluate(&self, pair: CandidatePair) -> Option<DeepConnection> {
        let source_excerpt = self.notes.excerpt(&pair.source.path, self.deep.excerpt_chars);
        let target_excerpt = self.notes.excerpt(&pair.target.path, self.deep.excerpt_chars);
        let prompt = evaluation_prompt(
            &pair.source,
            &source_excerpt,
            &pair.target,
            &target_excerpt,
        );

        let Some(text) = self
            .evaluator
            .generate(&prompt, EVALUATION_SYSTEM_PROMPT)
            .into_text()
        else {
            log::warn!(
                "pair={},{} outcome=error reason=evaluator-failed",
                pair.source.id,
                pair.target.id
            );
            return None;
        };

        let judgement = parse_judgement(&text);
        log::debug!(
            "pair={},{} possible={} score={}",
            pair.source.id,
            pair.target.id,
            judgement.possible,
            judgement.score
        );

        if !judgement.possible || judgement.score <= 0.0 {
            return None;
        }

        Some(DeepConnection {
            source: pair.source,
            target: pair.target,
            quality_score: judgement.score,
            explanation: judgement.text,
            domain_distance: pair.domain_distance,
            discovered_at: Utc::now(),
        })
    }
}

/// Up to `n` notes, sampled without replacement when the group is larger.
fn sample_notes<'a, R: Rng + ?Sized>(
    rng: &mut R,
    notes: &'a [NoteDomain],
    n: usize,
) -> Vec<&'a NoteDomain> {
    if notes.len() <= n {
        return notes.iter().collect();
    }

    rand::seq::index::sample(rng, notes.len(), n)
        .into_iter()
        .map(|i| &notes[i])
        .collect()
}
