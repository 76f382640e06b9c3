//! Embedding generation for lyrics and queries.
//!
//! The rest of the crate only sees [`EmbeddingGenerator`], a single
//! `texts -> vectors` capability. Any `Fn(&[&str]) -> SearchResult<Vec<Vec<f32>>>`
//! closure is a generator, which is how tests and embedders inject stub models.
//! [`FastEmbedGenerator`] is the production implementation backed by fastembed.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::error::{SearchError, SearchResult};
use crate::vector::VectorDimension;

/// Trait for generating embeddings from text.
///
/// Implementations must be safe to call from several threads at once;
/// the pipeline runs independent batches concurrently.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// # Returns
    /// One vector per input text, in input order.
    fn generate_embeddings(&self, texts: &[&str]) -> SearchResult<Vec<Vec<f32>>>;
}

impl<F> EmbeddingGenerator for F
where
    F: Fn(&[&str]) -> SearchResult<Vec<Vec<f32>>> + Send + Sync,
{
    fn generate_embeddings(&self, texts: &[&str]) -> SearchResult<Vec<Vec<f32>>> {
        self(texts)
    }
}

/// FastEmbed implementation of [`EmbeddingGenerator`].
///
/// The model is chosen by name (see [`parse_embedding_model`]); the default is the
/// multilingual `ParaphraseMLMiniLML12V2` encoder since lyrics come in many languages.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Load a fastembed model, downloading it into `cache_dir` on first use.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new(
        model: EmbeddingModel,
        cache_dir: Option<PathBuf>,
        show_download_progress: bool,
    ) -> SearchResult<Self> {
        let model_name = model_to_string(&model);
        let mut options = InitOptions::new(model).with_show_download_progress(show_download_progress);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let mut text_model = TextEmbedding::try_new(options).map_err(|e| {
            SearchError::Embedding(format!(
                "Failed to initialize embedding model {model_name}: {e}. Ensure you have internet connection for first-time model download"
            ))
        })?;

        // Probe the output width once instead of trusting a lookup table
        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| SearchError::Embedding(format!("Failed to probe model: {e}")))?;
        let width = probe.first().map(Vec::len).unwrap_or_default();
        let dimension = VectorDimension::new(width)?;

        info!(model = %model_name, dimension = width, "embedding model ready");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name,
            dimension,
        })
    }

    /// Create a generator from a model name as written in settings.
    pub fn from_name(
        name: &str,
        cache_dir: Option<PathBuf>,
        show_download_progress: bool,
    ) -> SearchResult<Self> {
        Self::new(parse_embedding_model(name)?, cache_dir, show_download_progress)
    }

    /// Width of the vectors this model produces.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> SearchResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects owned strings
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                SearchError::Embedding(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| SearchError::Embedding(format!("Failed to generate embeddings: {e}")))?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }
        debug!(count = embeddings.len(), "generated embeddings");

        Ok(embeddings)
    }
}

/// Parse a model name from settings into a fastembed model.
///
/// Matching ignores case and separators, so `paraphrase-ml-minilm-l12-v2`
/// and `ParaphraseMLMiniLML12V2` are the same model.
pub fn parse_embedding_model(name: &str) -> SearchResult<EmbeddingModel> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match key.as_str() {
        "paraphrasemlminilml12v2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "allminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "allminilml12v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "multilinguale5small" => Ok(EmbeddingModel::MultilingualE5Small),
        "multilinguale5base" => Ok(EmbeddingModel::MultilingualE5Base),
        "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        _ => Err(SearchError::invalid_argument(format!(
            "unknown embedding model '{name}'. Supported: ParaphraseMLMiniLML12V2, AllMiniLML6V2, AllMiniLML12V2, MultilingualE5Small, MultilingualE5Base, BGESmallENV15"
        ))),
    }
}

/// Canonical settings name of a fastembed model.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::ParaphraseMLMiniLML12V2 => "ParaphraseMLMiniLML12V2".to_string(),
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2".to_string(),
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2".to_string(),
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small".to_string(),
        EmbeddingModel::MultilingualE5Base => "MultilingualE5Base".to_string(),
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_is_a_generator() {
        let generator: Arc<dyn EmbeddingGenerator> =
            Arc::new(|texts: &[&str]| -> SearchResult<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
            });

        let embeddings = generator.generate_embeddings(&["ab", "abcd"]).unwrap();
        assert_eq!(embeddings, vec![vec![2.0, 1.0], vec![4.0, 1.0]]);
    }

    #[test]
    fn test_closure_errors_propagate() {
        let failing = |_: &[&str]| -> SearchResult<Vec<Vec<f32>>> {
            Err(SearchError::Embedding("model offline".to_string()))
        };
        assert!(matches!(
            failing.generate_embeddings(&["x"]),
            Err(SearchError::Embedding(_))
        ));
    }

    #[test]
    fn test_parse_embedding_model() {
        assert!(matches!(
            parse_embedding_model("ParaphraseMLMiniLML12V2"),
            Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
        ));
        assert!(matches!(
            parse_embedding_model("all-minilm-l6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(parse_embedding_model("universal-sentence-encoder").is_err());
    }

    #[test]
    fn test_model_name_round_trip() {
        for name in ["ParaphraseMLMiniLML12V2", "AllMiniLML6V2", "MultilingualE5Small"] {
            let model = parse_embedding_model(name).unwrap();
            assert_eq!(model_to_string(&model), name);
        }
    }
}
