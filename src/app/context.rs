use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    app::factory::AppPaths,
    cache::ConnectionCache,
    classifier::DomainClassifier,
    cli::errors::{CliError, CliResult},
    config::Config,
    discovery::{DeepDiscoveryEngine, Explainer, SerendipityEngine},
    llm::ChatEvaluator,
    note_id::NoteId,
    semantic::{EmbeddingIndex, EmbeddingModel, VectorStorage},
    sources::Evaluator,
    storage,
    vault::Vault,
};

/// Shared state for one command run: config, the vault and the
/// collaborators built from them.
pub struct AppContext {
    config: Config,
    paths: AppPaths,
    vault: Arc<Vault>,
    classifier: Arc<DomainClassifier>,
    cache: Option<ConnectionCache>,
}

impl AppContext {
    /// Open the configured vault and index it once.
    pub fn new(config: Config, paths: AppPaths) -> Result<Self> {
        let vault = Arc::new(Vault::new(&config.vault_path));
        let classifier = Arc::new(
            DomainClassifier::new(vault.clone(), &config.discovery)
                .with_context(|| format!("failed to index vault at {}", config.vault_path))?,
        );
        log::info!(
            "vault={} notes={}",
            config.vault_path,
            classifier.indexed_count()
        );

        let cache = if config.cache.enabled {
            let store = storage::BackendLocal::new(&paths.base_path)?;
            Some(ConnectionCache::new(Arc::new(store), config.cache.ttl_minutes))
        } else {
            None
        };

        Ok(Self {
            config,
            paths,
            vault,
            classifier,
            cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vault(&self) -> Arc<Vault> {
        self.vault.clone()
    }

    pub fn classifier(&self) -> Arc<DomainClassifier> {
        self.classifier.clone()
    }

    /// `None` when caching is disabled in config.
    pub fn cache(&self) -> Option<&ConnectionCache> {
        self.cache.as_ref()
    }

    pub fn vector_storage(&self) -> VectorStorage {
        VectorStorage::new(PathBuf::from(&self.paths.vectors_path))
    }

    pub fn embedding_model(&self) -> Result<EmbeddingModel> {
        let semantic = &self.config.semantic;
        Ok(EmbeddingModel::new(
            &semantic.model,
            PathBuf::from(&self.paths.base_path),
            Duration::from_secs(semantic.download_timeout_secs),
        )?)
    }

    /// Stored embeddings for the configured model, without loading the model.
    pub fn load_embeddings(&self) -> Result<Arc<EmbeddingIndex>> {
        let storage = self.vector_storage();
        let model = &self.config.semantic.model;

        if !storage.exists() {
            log::warn!("no embeddings stored yet, run `serendip embed` first");
            return Ok(Arc::new(EmbeddingIndex::new(model, 0)));
        }

        let dimensions = storage.stored_dimensions()?;
        let index = storage
            .load_or_empty(model, dimensions)
            .with_context(|| format!("failed to load {}", storage.path().display()))?;
        Ok(Arc::new(index))
    }

    pub fn evaluator(&self) -> Result<Arc<dyn Evaluator>> {
        Ok(Arc::new(ChatEvaluator::from_config(&self.config.llm)?))
    }

    /// Accept a note id or a vault-relative path.
    pub fn resolve_note(&self, note: &str) -> CliResult<NoteId> {
        let note = note.trim();
        let id = NoteId::from(note);
        if self.classifier.path_for_id(&id).is_some() {
            return Ok(id);
        }

        let path = note.trim_start_matches("./");
        let with_ext = if path.ends_with(".md") {
            path.to_string()
        } else {
            format!("{path}.md")
        };

        self.classifier
            .id_for_path(&with_ext)
            .ok_or_else(|| CliError::note_not_found(note))
    }

    pub fn standard_engine(
        &self,
        embeddings: Arc<EmbeddingIndex>,
        seed: Option<u64>,
    ) -> SerendipityEngine {
        let engine = SerendipityEngine::new(
            embeddings,
            self.classifier.clone(),
            self.vault.clone(),
            self.config.discovery.clone(),
        );
        match seed {
            Some(seed) => engine.with_rng(StdRng::seed_from_u64(seed)),
            None => engine,
        }
    }

    pub fn deep_engine(
        &self,
        embeddings: Arc<EmbeddingIndex>,
        evaluator: Arc<dyn Evaluator>,
        seed: Option<u64>,
    ) -> DeepDiscoveryEngine {
        let engine = DeepDiscoveryEngine::new(
            embeddings,
            self.classifier.clone(),
            self.vault.clone(),
            evaluator,
            self.config.discovery.clone(),
            self.config.deep.clone(),
        );
        match seed {
            Some(seed) => engine.with_rng(StdRng::seed_from_u64(seed)),
            None => engine,
        }
    }

    pub fn explainer(&self, evaluator: Arc<dyn Evaluator>) -> Explainer {
        Explainer::new(evaluator, self.vault.clone(), self.config.deep.excerpt_chars)
    }
}
