//! Corpus to container to index to query, with a stub embedding provider.

use crate::common::{TestWorkspace, hashing_provider, keyword_provider};
use lyrics_search::{
    ColumnSpec, ColumnType, EmbeddingPipeline, IndexBuilder, ItemId, MetadataValue,
    PipelineOptions, QueryEngine, SearchError, TreeCount, VectorContainer, VectorDimension,
    load_corpus,
};
use std::sync::Arc;

fn options(batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        batch_size,
        normalize: true,
        workers: 2,
    }
}

#[test]
fn test_rain_songs_rank_before_fire() {
    let ws = TestWorkspace::new();
    let corpus_path = ws.write_corpus(
        "songs.tsv",
        &["Lyrics", "Artist"],
        &[
            &["a quiet song about rain", "A"],
            &["a loud song about fire", "B"],
            &["a soft song about rain", "C"],
        ],
    );
    let artist = ColumnSpec::new("Artist", ColumnType::String);
    let corpus = load_corpus(&corpus_path, "Lyrics", &[artist]).unwrap();
    assert_eq!(corpus.len(), 3);

    let dimension = VectorDimension::new(3).unwrap();
    let container = ws.path("data/songs.vec");
    let pipeline = EmbeddingPipeline::new(keyword_provider(), dimension, options(2)).unwrap();
    let summary = pipeline.run(&corpus, &container).unwrap();
    assert_eq!(summary.records, 3);

    let index = IndexBuilder::new(dimension, TreeCount::new(10).unwrap())
        .build_from_files(&[&container])
        .unwrap();
    let engine = QueryEngine::new(Arc::new(index), keyword_provider());

    let ids = engine.query("rain song", 2).unwrap();
    assert_eq!(ids, vec![ItemId::new(0), ItemId::new(2)]);

    // Ids resolve back to container positions
    let stored = VectorContainer::load(&container).unwrap();
    let artists: Vec<_> = ids
        .iter()
        .map(|id| stored.records[id.index()].metadata.get("Artist").cloned())
        .collect();
    assert_eq!(
        artists,
        vec![
            Some(MetadataValue::String("A".into())),
            Some(MetadataValue::String("C".into())),
        ]
    );
}

#[test]
fn test_small_index_returns_everything() {
    let ws = TestWorkspace::new();
    let corpus_path = ws.write_corpus(
        "songs.tsv",
        &["Lyrics"],
        &[&["rain"], &["fire"], &["soft rain and fire"]],
    );
    let corpus = load_corpus(&corpus_path, "Lyrics", &[]).unwrap();

    let dimension = VectorDimension::new(3).unwrap();
    let container = ws.path("songs.vec");
    EmbeddingPipeline::new(keyword_provider(), dimension, options(64))
        .unwrap()
        .run(&corpus, &container)
        .unwrap();

    let index = IndexBuilder::new(dimension, TreeCount::new(3).unwrap())
        .build_from_files(&[&container])
        .unwrap();
    let engine = QueryEngine::new(Arc::new(index), keyword_provider());

    let mut ids = engine.query("rain", 5).unwrap();
    assert_eq!(ids.len(), 3);
    ids.sort();
    assert_eq!(ids, vec![ItemId::new(0), ItemId::new(1), ItemId::new(2)]);
}

#[test]
fn test_container_order_defines_ids() {
    let ws = TestWorkspace::new();
    let dimension = VectorDimension::new(16).unwrap();
    let provider = hashing_provider(16);

    let first = ws.write_corpus(
        "first.tsv",
        &["Lyrics"],
        &[&["one"], &["two"], &["three"]],
    );
    let second = ws.write_corpus("second.tsv", &["Lyrics"], &[&["four"], &["five"]]);

    let pipeline = EmbeddingPipeline::new(provider.clone(), dimension, options(2)).unwrap();
    let mut containers = Vec::new();
    for (n, corpus_path) in [first, second].iter().enumerate() {
        let corpus = load_corpus(corpus_path, "Lyrics", &[]).unwrap();
        let container = ws.path(&format!("part-{n}.vec"));
        pipeline.run(&corpus, &container).unwrap();
        containers.push(container);
    }

    let index = IndexBuilder::new(dimension, TreeCount::new(8).unwrap())
        .build_from_files(&containers)
        .unwrap();
    assert_eq!(index.len(), 5);

    // Each item finds itself: id 3 is the first record of the second file
    let engine = QueryEngine::new(Arc::new(index), provider).with_search_k(Some(100));
    assert_eq!(engine.query("four", 1).unwrap(), vec![ItemId::new(3)]);
    assert_eq!(engine.query("one", 1).unwrap(), vec![ItemId::new(0)]);
}

#[test]
fn test_mixed_dimensions_are_rejected() {
    let ws = TestWorkspace::new();
    let corpus_path = ws.write_corpus("songs.tsv", &["Lyrics"], &[&["rain"]]);
    let corpus = load_corpus(&corpus_path, "Lyrics", &[]).unwrap();

    let container = ws.path("songs.vec");
    EmbeddingPipeline::new(keyword_provider(), VectorDimension::new(3).unwrap(), options(8))
        .unwrap()
        .run(&corpus, &container)
        .unwrap();

    let result = IndexBuilder::new(VectorDimension::new(4).unwrap(), TreeCount::new(2).unwrap())
        .build_from_files(&[&container]);
    assert!(matches!(
        result,
        Err(SearchError::DimensionMismatch {
            expected: 4,
            actual: 3
        })
    ));
}
