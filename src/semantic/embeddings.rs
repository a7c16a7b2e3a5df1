//! fastembed wrapper used by the `embed` command.
//!
//! Models are downloaded on first use into `<base>/models`.

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Supported model names (lowercase) and their fastembed variants.
const MODELS: &[(&str, fastembed::EmbeddingModel)] = &[
    ("all-minilm-l6-v2", fastembed::EmbeddingModel::AllMiniLML6V2),
    ("all-minilm-l6-v2-q", fastembed::EmbeddingModel::AllMiniLML6V2Q),
    ("bge-small-en-v1.5", fastembed::EmbeddingModel::BGESmallENV15),
    ("bge-small-en-v1.5-q", fastembed::EmbeddingModel::BGESmallENV15Q),
    ("bge-base-en-v1.5", fastembed::EmbeddingModel::BGEBaseENV15),
    ("bge-base-en-v1.5-q", fastembed::EmbeddingModel::BGEBaseENV15Q),
    ("bge-large-en-v1.5", fastembed::EmbeddingModel::BGELargeENV15),
    ("bge-large-en-v1.5-q", fastembed::EmbeddingModel::BGELargeENV15Q),
];

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Unknown model: {0}")]
    InvalidModel(String),
}

/// fastembed's embed() needs &mut self, hence the Mutex.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let variant = parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        log::info!(
            "loading embedding model '{model_name}' (download timeout {}s)",
            download_timeout.as_secs()
        );

        let options = InitOptions::new(variant)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = model
            .embed(vec!["probe"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }

    pub fn model_id_hash(&self) -> [u8; 32] {
        model_id_hash(&self.model_name)
    }
}

/// SHA256 of a model name; identifies the model in vectors.bin.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    let wanted = name.to_lowercase();
    MODELS
        .iter()
        .find(|(known, _)| *known == wanted || known.replace(['-', '.'], "") == wanted)
        .map(|(_, variant)| variant.clone())
        .ok_or_else(|| {
            let supported: Vec<&str> = MODELS.iter().map(|(n, _)| *n).collect();
            EmbeddingError::InvalidModel(format!("{name} (supported: {})", supported.join(", ")))
        })
}
