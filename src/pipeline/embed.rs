//! Batch embedding of a corpus and hand-off to the record store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{SearchError, SearchResult};
use crate::pipeline::corpus::Corpus;
use crate::records::{ColumnSpec, RecordWriter, Schema, TextRecord};
use crate::vector::{EmbeddingGenerator, VectorDimension, normalize_vector};

/// Texts sent to the provider per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Tunables of the embedding pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batch_size: usize,
    /// Rescale every vector to unit length (required for angular search
    /// unless the provider already normalizes).
    pub normalize: bool,
    /// Batches embedded concurrently.
    pub workers: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            normalize: true,
            workers: num_cpus::get(),
        }
    }
}

/// Outcome of [`EmbeddingPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSummary {
    pub path: PathBuf,
    pub records: usize,
    pub dimension: usize,
}

/// Turns text records into embeddings and persists them.
///
/// Batches may run on several workers; results are always reassembled in
/// record order, so `vectors[i]` belongs to `records[i]`.
pub struct EmbeddingPipeline {
    generator: Arc<dyn EmbeddingGenerator>,
    dimension: VectorDimension,
    options: PipelineOptions,
    pool: rayon::ThreadPool,
    progress: ProgressBar,
}

impl std::fmt::Debug for EmbeddingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingPipeline")
            .field("dimension", &self.dimension)
            .field("options", &self.options)
            .finish()
    }
}

impl EmbeddingPipeline {
    /// `dimension` is the output width of `generator`; every vector it
    /// returns is checked against it.
    pub fn new(
        generator: Arc<dyn EmbeddingGenerator>,
        dimension: VectorDimension,
        options: PipelineOptions,
    ) -> SearchResult<Self> {
        if options.batch_size == 0 {
            return Err(SearchError::invalid_argument("batch size must be at least 1"));
        }
        if options.workers == 0 {
            return Err(SearchError::invalid_argument("worker count must be at least 1"));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("embed-{i}"))
            .build()
            .map_err(|e| SearchError::Embedding(format!("failed to start embedding workers: {e}")))?;

        Ok(Self {
            generator,
            dimension,
            options,
            pool,
            progress: ProgressBar::hidden(),
        })
    }

    /// Reports embedded record counts to `bar`.
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Embeds every record, one provider call per batch.
    pub fn embed(&self, records: &[TextRecord]) -> SearchResult<Vec<Vec<f32>>> {
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        self.progress.set_length(texts.len() as u64);

        let batches = self.pool.install(|| {
            texts
                .par_chunks(self.options.batch_size)
                .enumerate()
                .map(|(n, batch)| self.embed_batch(n, batch))
                .collect::<SearchResult<Vec<_>>>()
        })?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        info!(
            records = vectors.len(),
            batches = texts.len().div_ceil(self.options.batch_size),
            normalized = self.options.normalize,
            "embeddings computed"
        );
        Ok(vectors)
    }

    fn embed_batch(&self, n: usize, batch: &[&str]) -> SearchResult<Vec<Vec<f32>>> {
        let mut vectors = self.generator.generate_embeddings(batch)?;
        if vectors.len() != batch.len() {
            return Err(SearchError::Embedding(format!(
                "provider returned {} vectors for a batch of {}",
                vectors.len(),
                batch.len()
            )));
        }

        for vector in &mut vectors {
            self.dimension.validate_vector(vector)?;
            if self.options.normalize {
                normalize_vector(vector);
            }
        }

        self.progress.inc(batch.len() as u64);
        debug!(batch = n, size = batch.len(), "batch embedded");
        Ok(vectors)
    }

    /// Writes records and their vectors to a container at `destination`.
    pub fn save(
        &self,
        records: &[TextRecord],
        vectors: &[Vec<f32>],
        columns: &[ColumnSpec],
        destination: impl AsRef<Path>,
    ) -> SearchResult<usize> {
        if records.len() != vectors.len() {
            return Err(SearchError::invalid_argument(format!(
                "{} records but {} vectors",
                records.len(),
                vectors.len()
            )));
        }

        let schema = Schema::new(self.dimension.get(), true, columns.to_vec());
        let mut writer = RecordWriter::create(destination, schema)?;
        for (record, vector) in records.iter().zip(vectors) {
            writer.append(Some(&record.text), vector, &record.metadata)?;
        }
        writer.finish()
    }

    /// Embeds a loaded corpus and saves it.
    pub fn run(&self, corpus: &Corpus, destination: impl AsRef<Path>) -> SearchResult<EmbeddingSummary> {
        let destination = destination.as_ref();
        let vectors = self.embed(&corpus.records)?;
        let records = self.save(&corpus.records, &vectors, &corpus.columns, destination)?;
        self.progress.finish_and_clear();

        Ok(EmbeddingSummary {
            path: destination.to_path_buf(),
            records,
            dimension: self.dimension.get(),
        })
    }
}
