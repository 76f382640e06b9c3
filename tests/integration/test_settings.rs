//! Settings files drive the pipeline and index builder.

use crate::common::{TestWorkspace, keyword_provider};
use lyrics_search::{
    ColumnType, EmbeddingPipeline, IndexBuilder, QueryEngine, Settings, VectorDimension,
    load_corpus,
};
use std::fs;
use std::sync::Arc;

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let ws = TestWorkspace::new();
    let path = ws.path(".lyrics-search/settings.toml");

    Settings::init_config_file_at(&path, false).unwrap();
    assert!(Settings::init_config_file_at(&path, false).is_err());

    fs::write(&path, "version = 9\n").unwrap();
    Settings::init_config_file_at(&path, true).unwrap();
    assert_eq!(Settings::load_from(&path).unwrap().version, 1);
}

#[test]
fn test_settings_file_configures_a_run() {
    let ws = TestWorkspace::new();
    let config = ws.path("settings.toml");
    fs::write(
        &config,
        r#"
[pipeline]
batch_size = 1
workers = 1
text_column = "Text"
metadata_columns = [{ name = "Year", dtype = "int" }]

[index]
tree_count = 4
dimension = 3
seed = 5
search_k = 50

[query]
default_limit = 2
"#,
    )
    .unwrap();
    let settings = Settings::load_from(&config).unwrap();
    assert_eq!(settings.pipeline.metadata_columns[0].dtype, ColumnType::Int);

    let corpus_path = ws.write_corpus(
        "songs.tsv",
        &["Year", "Text"],
        &[
            &["1971", "rain all day"],
            &["not a year", "fire"],
            &["1980", "fire in the night"],
            &["1999", "soft rain"],
        ],
    );
    let corpus = load_corpus(
        &corpus_path,
        &settings.pipeline.text_column,
        &settings.pipeline.metadata_columns,
    )
    .unwrap();
    // The row with a non-numeric year is skipped
    assert_eq!(corpus.stats.rows_skipped, 1);
    assert_eq!(corpus.len(), 3);

    let dimension: VectorDimension = settings.index.dimension().unwrap();
    let container = ws.path("songs.vec");
    EmbeddingPipeline::new(keyword_provider(), dimension, settings.pipeline.options())
        .unwrap()
        .run(&corpus, &container)
        .unwrap();

    let index = IndexBuilder::new(dimension, settings.index.tree_count().unwrap())
        .with_seed(settings.index.seed.unwrap())
        .build_from_files(&[&container])
        .unwrap();
    assert_eq!(index.seed(), 5);

    let engine =
        QueryEngine::new(Arc::new(index), keyword_provider()).with_search_k(settings.index.search_k());
    let ids = engine
        .query("rain", settings.query.default_limit)
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.get() == 0 || id.get() == 2));
}
