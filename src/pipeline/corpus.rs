//! Tab-separated corpus loading.
//!
//! The corpus is UTF-8 text with a header row. Fields that contain tabs,
//! line breaks or quotes are wrapped in double quotes, with embedded quotes
//! doubled (the convention of common csv writers in tab mode).
//!
//! Malformed rows are skipped with a warning; a missing column is fatal.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{IoContext, SearchError, SearchResult};
use crate::records::{
    ColumnSpec, ColumnType, DEFAULT_METADATA_COLUMN, Metadata, MetadataValue, TextRecord,
};

/// Default name of the column holding the lyrics.
pub const DEFAULT_TEXT_COLUMN: &str = "Lyrics";

const DELIMITER: char = '\t';
const QUOTE: char = '"';
const BOM: char = '\u{feff}';

/// Row counters collected while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    /// Non-blank data rows seen after the header.
    pub rows_read: usize,
    /// Rows dropped because they were malformed.
    pub rows_skipped: usize,
}

impl CorpusStats {
    #[must_use]
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_skipped
    }
}

/// A loaded corpus, ready for embedding.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub path: PathBuf,
    pub records: Vec<TextRecord>,
    /// Metadata columns carried by every record, in order.
    pub columns: Vec<ColumnSpec>,
    pub stats: CorpusStats,
}

impl Corpus {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Loads the text column and the declared metadata columns of a corpus file.
///
/// With no metadata columns, every record gets a synthetic `index` int
/// column holding its 0-based position.
pub fn load_corpus(
    path: impl AsRef<Path>,
    text_column: &str,
    metadata_columns: &[ColumnSpec],
) -> SearchResult<Corpus> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_path(path)?;
    let input = String::from_utf8(bytes)
        .map_err(|e| SearchError::corpus(path, format!("file is not valid UTF-8: {e}")))?;
    parse_corpus(&input, path, text_column, metadata_columns)
}

/// Same as [`load_corpus`] on already-read text. `path` names the source in
/// errors and logs.
pub fn parse_corpus(
    input: &str,
    path: &Path,
    text_column: &str,
    metadata_columns: &[ColumnSpec],
) -> SearchResult<Corpus> {
    let mut rows = split_rows(input).into_iter();

    let mut header = rows
        .next()
        .ok_or_else(|| SearchError::corpus(path, "file is empty, expected a header row"))?;
    if let Some(first) = header.first_mut() {
        if let Some(stripped) = first.strip_prefix(BOM) {
            *first = stripped.to_string();
        }
    }

    let find = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| {
                SearchError::corpus(
                    path,
                    format!("column '{name}' not found in header [{}]", header.join(", ")),
                )
            })
    };
    let text_at = find(text_column)?;
    let meta_at = metadata_columns
        .iter()
        .map(|c| find(&c.name))
        .collect::<SearchResult<Vec<_>>>()?;

    let synthetic = metadata_columns.is_empty();
    let columns = if synthetic {
        vec![ColumnSpec::new(DEFAULT_METADATA_COLUMN, ColumnType::Int)]
    } else {
        metadata_columns.to_vec()
    };

    let mut stats = CorpusStats::default();
    let mut records = Vec::new();
    // Header is line 1
    for (line, row) in rows.enumerate().map(|(n, row)| (n + 2, row)) {
        if row.len() == 1 && row[0].is_empty() {
            continue;
        }
        stats.rows_read += 1;

        let Some(text) = row.get(text_at).filter(|t| !t.trim().is_empty()) else {
            warn!(path = %path.display(), line, "skipping row without {text_column} text");
            stats.rows_skipped += 1;
            continue;
        };

        let metadata = if synthetic {
            Some(Metadata::new().with(DEFAULT_METADATA_COLUMN, records.len() as i64))
        } else {
            row_metadata(&row, metadata_columns, &meta_at)
        };
        let Some(metadata) = metadata else {
            warn!(path = %path.display(), line, "skipping row with missing or mistyped metadata");
            stats.rows_skipped += 1;
            continue;
        };

        records.push(TextRecord::new(text.clone(), metadata));
    }

    info!(
        path = %path.display(),
        read = stats.rows_read,
        skipped = stats.rows_skipped,
        "corpus loaded"
    );

    Ok(Corpus {
        path: path.to_path_buf(),
        records,
        columns,
        stats,
    })
}

fn row_metadata(row: &[String], columns: &[ColumnSpec], positions: &[usize]) -> Option<Metadata> {
    let mut metadata = Metadata::new();
    for (column, &at) in columns.iter().zip(positions) {
        let value = MetadataValue::parse(row.get(at)?, column.dtype)?;
        metadata.push(column.name.clone(), value);
    }
    Some(metadata)
}

/// Splits input into rows of fields, honouring quoted fields.
fn split_rows(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    chars.next();
                    field.push(QUOTE);
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            QUOTE if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            DELIMITER => {
                row.push(std::mem::take(&mut field));
                at_field_start = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                at_field_start = true;
            }
            _ => {
                field.push(c);
                at_field_start = false;
            }
        }
    }

    if !field.is_empty() || !row.is_empty() || !at_field_start {
        row.push(field);
        rows.push(row);
    }
    rows
}
