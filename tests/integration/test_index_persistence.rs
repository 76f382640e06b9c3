//! Saved indexes answer queries exactly like the in-memory original.

use crate::common::{TestWorkspace, hashing_provider};
use lyrics_search::vector::inspect_index_file;
use lyrics_search::{
    AnnIndex, EmbeddingGenerator, IndexBuilder, QueryEngine, SearchError, TreeCount,
    VectorDimension,
};
use std::fs;
use std::sync::Arc;

const DIM: usize = 12;

fn lyric_lines() -> Vec<String> {
    (0..200)
        .map(|i| format!("verse {i} about {} and {}", i % 7, i % 11))
        .collect()
}

fn built_index(provider: &Arc<dyn EmbeddingGenerator>) -> AnnIndex {
    let lines = lyric_lines();
    let texts: Vec<&str> = lines.iter().map(String::as_str).collect();
    let vectors = provider.generate_embeddings(&texts).unwrap();

    let mut index = AnnIndex::new(
        VectorDimension::new(DIM).unwrap(),
        TreeCount::new(12).unwrap(),
    )
    .with_seed(7);
    for v in &vectors {
        index.insert(v).unwrap();
    }
    index.build().unwrap();
    index
}

#[test]
fn test_loaded_index_answers_like_original() {
    let ws = TestWorkspace::new();
    let provider = hashing_provider(DIM);
    let index = built_index(&provider);
    let path = ws.path("out/lyrics.ann");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    index.save(&path).unwrap();

    let loaded = AnnIndex::load(&path, VectorDimension::new(DIM).unwrap()).unwrap();
    assert_eq!(loaded.len(), index.len());
    assert!(loaded.is_built());

    let original = QueryEngine::new(Arc::new(index), provider.clone());
    let reloaded = QueryEngine::new(Arc::new(loaded), provider);
    for query in ["verse 3 about 3", "about 5 and 9", "chorus"] {
        assert_eq!(
            original.query_with_distances(query, 10).unwrap(),
            reloaded.query_with_distances(query, 10).unwrap()
        );
    }
}

#[test]
fn test_index_file_header() {
    let ws = TestWorkspace::new();
    let index = built_index(&hashing_provider(DIM));
    let path = ws.path("lyrics.ann");
    index.save(&path).unwrap();

    let info = inspect_index_file(&path).unwrap();
    assert_eq!(info.dimension, DIM);
    assert_eq!(info.item_count, 200);
    assert_eq!(info.tree_count, 12);
    assert_eq!(info.seed, 7);
    assert_eq!(info.file_size, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_load_with_other_model_dimension_fails() {
    let ws = TestWorkspace::new();
    let index = built_index(&hashing_provider(DIM));
    let path = ws.path("lyrics.ann");
    index.save(&path).unwrap();

    assert!(matches!(
        AnnIndex::load(&path, VectorDimension::new(384).unwrap()),
        Err(SearchError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_seeded_builds_write_identical_files() {
    let ws = TestWorkspace::new();
    let dimension = VectorDimension::new(DIM).unwrap();
    let provider = hashing_provider(DIM);
    let lines = lyric_lines();
    let texts: Vec<&str> = lines.iter().map(String::as_str).collect();
    let vectors = provider.generate_embeddings(&texts).unwrap();

    let container = lyrics_search::VectorContainer::new(
        lyrics_search::Schema::new(DIM, false, Vec::new()),
        vectors
            .into_iter()
            .map(|v| lyrics_search::StoredRecord::new(None, v, lyrics_search::Metadata::new()))
            .collect(),
    );

    let builder = IndexBuilder::new(dimension, TreeCount::new(5).unwrap()).with_seed(99);
    let a = ws.path("a.ann");
    let b = ws.path("b.ann");
    builder
        .build_from_containers(std::slice::from_ref(&container))
        .unwrap()
        .save(&a)
        .unwrap();
    builder
        .build_from_containers(std::slice::from_ref(&container))
        .unwrap()
        .save(&b)
        .unwrap();

    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}
