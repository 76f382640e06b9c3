//! On-disk container layout: data file plus JSON schema sidecar.

use crate::common::TestWorkspace;
use lyrics_search::{
    ColumnSpec, ColumnType, Metadata, MetadataValue, RecordReader, RecordWriter, Schema,
    SearchError, StoredRecord, VectorContainer,
};
use std::fs;

fn song_schema() -> Schema {
    Schema::new(
        2,
        true,
        vec![
            ColumnSpec::new("Artist", ColumnType::String),
            ColumnSpec::new("Year", ColumnType::Int),
            ColumnSpec::new("Score", ColumnType::Float),
        ],
    )
}

#[test]
fn test_sidecar_uses_flat_dtype_keys() {
    let ws = TestWorkspace::new();
    let data = ws.path("nested/dir/songs.vec");

    let mut writer = RecordWriter::create(&data, song_schema()).unwrap();
    writer
        .append(
            Some("la la"),
            &[0.6, 0.8],
            &Metadata::new()
                .with("Artist", "Nina")
                .with("Year", 1966i64)
                .with("Score", 4.5f64),
        )
        .unwrap();
    assert_eq!(writer.finish().unwrap(), 1);

    let sidecar = Schema::sidecar_path(&data);
    assert!(sidecar.ends_with("songs.vec.schema.json"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&sidecar).unwrap()).unwrap();
    assert_eq!(json["embedding_size"], 2);
    assert_eq!(json["has_text"], true);
    assert_eq!(
        json["metadata_columns"],
        serde_json::json!(["Artist", "Year", "Score"])
    );
    assert_eq!(json["dtype_Artist"], "string");
    assert_eq!(json["dtype_Year"], "int");
    assert_eq!(json["dtype_Score"], "float");
}

#[test]
fn test_sparse_sidecar_falls_back_to_defaults() {
    let ws = TestWorkspace::new();
    let data = ws.path("legacy.vec");

    // Container written without text and with a single int column
    let schema = Schema::new(2, false, vec![ColumnSpec::new("index", ColumnType::Int)]);
    let container = VectorContainer::new(
        schema,
        vec![StoredRecord::new(
            None,
            vec![1.0, 0.0],
            Metadata::new().with("index", 0i64),
        )],
    );
    container.save(&data).unwrap();

    // Older sidecars only carried the embedding size and the int dtype
    fs::write(
        Schema::sidecar_path(&data),
        r#"{"embedding_size": 2, "dtype_index": "int"}"#,
    )
    .unwrap();

    let loaded = VectorContainer::load(&data).unwrap();
    assert!(!loaded.schema.has_text);
    assert_eq!(loaded.schema.column_names().collect::<Vec<_>>(), vec!["index"]);
    assert_eq!(
        loaded.records[0].metadata.get("index"),
        Some(&MetadataValue::Int(0))
    );
}

#[test]
fn test_reader_streams_large_container() {
    let ws = TestWorkspace::new();
    let data = ws.path("many.vec");
    let schema = Schema::new(2, false, vec![ColumnSpec::new("index", ColumnType::Int)]);

    let mut writer = RecordWriter::create(&data, schema).unwrap();
    for i in 0..2_000i64 {
        let angle = i as f32 * 0.01;
        writer
            .append(
                None,
                &[angle.cos(), angle.sin()],
                &Metadata::new().with("index", i),
            )
            .unwrap();
    }
    writer.finish().unwrap();

    let reader = RecordReader::open(&data).unwrap();
    let mut seen = 0i64;
    for record in reader {
        let record = record.unwrap();
        assert_eq!(record.metadata.get("index"), Some(&MetadataValue::Int(seen)));
        seen += 1;
    }
    assert_eq!(seen, 2_000);
}

#[test]
fn test_missing_sidecar_is_schema_error() {
    let ws = TestWorkspace::new();
    let data = ws.path("orphan.vec");
    let container = VectorContainer::new(song_schema(), Vec::new());
    container.save(&data).unwrap();
    fs::remove_file(Schema::sidecar_path(&data)).unwrap();

    assert!(matches!(
        VectorContainer::load(&data),
        Err(SearchError::Schema { .. })
    ));
}
