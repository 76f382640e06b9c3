//! Embedding pipeline: corpus rows in, vector container out.

mod corpus;
mod embed;

pub use corpus::{Corpus, CorpusStats, DEFAULT_TEXT_COLUMN, load_corpus, parse_corpus};
pub use embed::{DEFAULT_BATCH_SIZE, EmbeddingPipeline, EmbeddingSummary, PipelineOptions};
