#![allow(dead_code)]

use lyrics_search::{EmbeddingGenerator, SearchResult};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Writes a tab-separated corpus with the given header and rows.
    pub fn write_corpus(&self, name: &str, header: &[&str], rows: &[&[&str]]) -> PathBuf {
        let mut contents = header.join("\t");
        contents.push('\n');
        for row in rows {
            contents.push_str(&row.join("\t"));
            contents.push('\n');
        }
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write corpus");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Deterministic 3-d provider: "rain" and "fire" pick an axis, soft words
/// tilt towards the third one.
pub fn keyword_provider() -> Arc<dyn EmbeddingGenerator> {
    Arc::new(|texts: &[&str]| -> SearchResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    })
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 3];
    if text.contains("rain") {
        v[0] += 1.0;
    }
    if text.contains("fire") {
        v[1] += 1.0;
    }
    if text.contains("quiet") {
        v[2] += 0.2;
    }
    if text.contains("soft") {
        v[2] += 0.3;
    }
    v
}

/// Provider whose vectors spread over `dimension` axes by text hash.
pub fn hashing_provider(dimension: usize) -> Arc<dyn EmbeddingGenerator> {
    Arc::new(move |texts: &[&str]| -> SearchResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; dimension];
                for (i, b) in t.bytes().enumerate() {
                    v[(i + b as usize) % dimension] += f32::from(b) / 255.0;
                }
                v
            })
            .collect())
    })
}
