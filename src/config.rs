//! Configuration for lyrics-search.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LS_` and use double underscores
//! to separate nested levels:
//! - `LS_INDEX__TREE_COUNT=50` sets `index.tree_count`
//! - `LS_PIPELINE__BATCH_SIZE=32` sets `pipeline.batch_size`
//! - `LS_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SearchResult;
use crate::pipeline::{DEFAULT_BATCH_SIZE, DEFAULT_TEXT_COLUMN, PipelineOptions};
use crate::query::DEFAULT_LIMIT;
use crate::records::ColumnSpec;
use crate::vector::{TreeCount, VECTOR_DIMENSION_384, VectorDimension};

/// Directory holding the settings file and default data.
pub const CONFIG_DIR: &str = ".lyrics-search";

/// Settings file name inside [`CONFIG_DIR`].
pub const SETTINGS_FILE: &str = "settings.toml";

const ENV_PREFIX: &str = "LS_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Where containers and indexes go when no explicit path is given
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// fastembed model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded model files are kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Texts per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// L2-normalize embeddings before storing them
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Corpus column holding the lyrics
    #[serde(default = "default_text_column")]
    pub text_column: String,

    /// Metadata columns copied into containers; empty means a synthetic `index`
    #[serde(default)]
    pub metadata_columns: Vec<ColumnSpec>,

    /// Batches embedded concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexConfig {
    /// Trees in the forest; more trees, better recall, bigger file
    #[serde(default = "default_tree_count")]
    pub tree_count: usize,

    /// Vector dimension the index is built and loaded with
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Candidates examined per query; -1 means `tree_count * k`
    #[serde(default = "default_search_k")]
    pub search_k: i64,

    /// Fixed seed for reproducible builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QueryConfig {
    /// Results returned when no count is given
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("data")
}
fn default_true() -> bool {
    true
}
fn default_embedding_model() -> String {
    "ParaphraseMLMiniLML12V2".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_text_column() -> String {
    DEFAULT_TEXT_COLUMN.to_string()
}
fn default_workers() -> usize {
    num_cpus::get()
}
fn default_tree_count() -> usize {
    100
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_search_k() -> i64 {
    -1
}
fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            debug: false,
            embedding: EmbeddingConfig::default(),
            pipeline: PipelineConfig::default(),
            index: IndexConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            normalize: true,
            text_column: default_text_column(),
            metadata_columns: Vec::new(),
            workers: default_workers(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            tree_count: default_tree_count(),
            dimension: default_dimension(),
            search_k: default_search_k(),
            seed: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            batch_size: self.batch_size,
            normalize: self.normalize,
            workers: self.workers,
        }
    }
}

impl IndexConfig {
    pub fn tree_count(&self) -> SearchResult<TreeCount> {
        TreeCount::new(self.tree_count)
    }

    pub fn dimension(&self) -> SearchResult<VectorDimension> {
        VectorDimension::new(self.dimension)
    }

    /// Candidate budget, `None` for the automatic `tree_count * k`.
    #[must_use]
    pub fn search_k(&self) -> Option<usize> {
        usize::try_from(self.search_k).ok().filter(|&k| k > 0)
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory,
    /// from the current directory up to root
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(SETTINGS_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Create the default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE);
        Self::init_config_file_at(&config_path, force)?;
        Ok(config_path)
    }

    /// Write a commented settings template to `path`
    pub fn init_config_file_at(
        path: &Path,
        force: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !force && path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::default();
        let template = format!(
            r#"# lyrics-search configuration

# Version of the configuration schema
version = {version}

# Default location for containers and indexes
data_dir = "{data_dir}"

# Global debug mode
debug = false

[embedding]
# fastembed model used for lyrics and queries
model = "{model}"
# Directory for downloaded model files
# cache_dir = ".lyrics-search/models"
show_download_progress = true

[pipeline]
# Texts sent to the model per call
batch_size = {batch_size}
# L2-normalize embeddings (needed for angular search)
normalize = true
# Corpus column holding the lyrics
text_column = "{text_column}"
# Metadata columns stored next to each embedding (int, float or string).
# Empty means a synthetic 0-based "index" column.
metadata_columns = []
# metadata_columns = [{{ name = "Artist", dtype = "string" }}, {{ name = "Title", dtype = "string" }}]
# Batches embedded concurrently (defaults to CPU count)
# workers = {workers}

[index]
# Trees in the forest: more trees give better recall but slower builds
tree_count = {tree_count}
# Vector dimension, must match the embedding model
dimension = {dimension}
# Candidates examined per query, -1 for tree_count * k
search_k = -1
# Fixed seed for reproducible builds
# seed = 42

[query]
# Results returned when no count is given
default_limit = {default_limit}
"#,
            version = defaults.version,
            data_dir = defaults.data_dir.display(),
            model = defaults.embedding.model,
            batch_size = defaults.pipeline.batch_size,
            text_column = defaults.pipeline.text_column,
            workers = defaults.pipeline.workers,
            tree_count = defaults.index.tree_count,
            dimension = defaults.index.dimension,
            default_limit = defaults.query.default_limit,
        );

        std::fs::write(path, template)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ColumnType;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.data_dir, PathBuf::from(".lyrics-search/data"));
        assert_eq!(settings.pipeline.batch_size, 64);
        assert_eq!(settings.pipeline.text_column, "Lyrics");
        assert!(settings.pipeline.normalize);
        assert!(settings.pipeline.workers > 0);
        assert_eq!(settings.index.tree_count, 100);
        assert_eq!(settings.index.dimension, 384);
        assert_eq!(settings.index.search_k(), None);
        assert_eq!(settings.query.default_limit, 5);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[pipeline]
batch_size = 16
metadata_columns = [{ name = "Artist", dtype = "string" }, { name = "id", dtype = "int" }]

[index]
tree_count = 10
search_k = 500
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.pipeline.batch_size, 16);
        assert_eq!(
            settings.pipeline.metadata_columns,
            vec![
                ColumnSpec::new("Artist", ColumnType::String),
                ColumnSpec::new("id", ColumnType::Int),
            ]
        );
        assert_eq!(settings.index.tree_count().unwrap().get(), 10);
        assert_eq!(settings.index.search_k(), Some(500));
        // Untouched sections keep their defaults
        assert_eq!(settings.query.default_limit, 5);
        assert!(settings.pipeline.normalize);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/settings.toml");

        let mut settings = Settings::default();
        settings.index.tree_count = 7;
        settings.index.seed = Some(99);
        settings.pipeline.normalize = false;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.index.tree_count, 7);
        assert_eq!(loaded.index.seed, Some(99));
        assert!(!loaded.pipeline.normalize);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".lyrics-search/settings.toml");

        Settings::init_config_file_at(&config_path, false).unwrap();
        assert!(Settings::init_config_file_at(&config_path, false).is_err());
        Settings::init_config_file_at(&config_path, true).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        let parsed: Settings = toml::from_str(&content).unwrap();
        assert_eq!(parsed.index, IndexConfig::default());
        assert_eq!(parsed.embedding, EmbeddingConfig::default());
        assert_eq!(parsed.query, QueryConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[query]\ndefault_limit = 3\n").unwrap();

        unsafe {
            std::env::set_var("LS_QUERY__DEFAULT_LIMIT", "12");
        }
        let settings = Settings::load_from(&config_path).unwrap();
        unsafe {
            std::env::remove_var("LS_QUERY__DEFAULT_LIMIT");
        }

        assert_eq!(settings.query.default_limit, 12);
    }

    #[test]
    fn test_negative_search_k_means_auto() {
        let index = IndexConfig {
            search_k: -1,
            ..IndexConfig::default()
        };
        assert_eq!(index.search_k(), None);

        let index = IndexConfig {
            search_k: 0,
            ..IndexConfig::default()
        };
        assert_eq!(index.search_k(), None);
    }
}
