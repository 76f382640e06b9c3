//! Streaming reader and writer for vector container files.
//!
//! # Storage Format
//!
//! - Header (8 bytes): magic `LSVR`, format version (u32 LE)
//! - Records: frames as produced by the codec, in write order
//!
//! The schema sidecar is written by [`RecordWriter::finish`] after the last
//! frame, so a readable sidecar means the data file is complete.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{IoContext, SearchError, SearchResult};
use crate::records::codec::{self, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use crate::records::record::{Metadata, StoredRecord, VectorContainer};
use crate::records::schema::Schema;

/// Current container format version.
const CONTAINER_VERSION: u32 = 1;

/// Magic bytes to identify container files.
const MAGIC_BYTES: &[u8; 4] = b"LSVR";

/// Append-only writer for a container.
#[derive(Debug)]
pub struct RecordWriter {
    path: PathBuf,
    schema: Schema,
    out: BufWriter<File>,
    written: usize,
}

impl RecordWriter {
    /// Creates (or truncates) the data file at `path`.
    ///
    /// Parent directories are created. A sidecar left over from an earlier
    /// container at the same path is removed until `finish` writes the new one.
    pub fn create(path: impl AsRef<Path>, schema: Schema) -> SearchResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }

        let sidecar = Schema::sidecar_path(&path);
        match std::fs::remove_file(&sidecar) {
            Ok(()) => debug!(path = %sidecar.display(), "removed stale schema"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(SearchError::io(&sidecar, e)),
        }

        let file = File::create(&path).with_path(&path)?;
        let mut out = BufWriter::new(file);
        out.write_all(MAGIC_BYTES).with_path(&path)?;
        out.write_all(&CONTAINER_VERSION.to_le_bytes())
            .with_path(&path)?;

        Ok(Self {
            path,
            schema,
            out,
            written: 0,
        })
    }

    /// Appends one record after validating it against the schema.
    pub fn append(
        &mut self,
        text: Option<&str>,
        embedding: &[f32],
        metadata: &Metadata,
    ) -> SearchResult<()> {
        let invalid = |reason: String| {
            SearchError::schema(&self.path, format!("record {}: {reason}", self.written))
        };
        codec::validate(&self.schema, text, embedding, metadata).map_err(invalid)?;
        let frame = codec::encode_frame(&self.schema, text, embedding, metadata).map_err(invalid)?;

        self.out.write_all(&frame).with_path(&self.path)?;
        self.written += 1;
        Ok(())
    }

    pub fn append_record(&mut self, record: &StoredRecord) -> SearchResult<()> {
        self.append(record.text.as_deref(), &record.embedding, &record.metadata)
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.written
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Flushes the data file and writes the schema sidecar.
    ///
    /// Returns the number of records written.
    pub fn finish(mut self) -> SearchResult<usize> {
        self.out.flush().with_path(&self.path)?;
        self.out.get_ref().sync_all().with_path(&self.path)?;
        self.schema.save(&self.path)?;

        info!(
            path = %self.path.display(),
            records = self.written,
            dimension = self.schema.embedding_size,
            "container written"
        );
        Ok(self.written)
    }
}

/// Streaming reader over a container. Yields records in stored order
/// without loading the whole file.
///
/// The first error ends the iteration.
#[derive(Debug)]
pub struct RecordReader {
    path: PathBuf,
    schema: Schema,
    input: BufReader<File>,
    position: usize,
    finished: bool,
}

impl RecordReader {
    /// Opens a container, reading its schema first.
    pub fn open(path: impl AsRef<Path>) -> SearchResult<Self> {
        let path = path.as_ref().to_path_buf();
        let schema = Schema::load(&path)?;

        let file = File::open(&path).with_path(&path)?;
        let mut input = BufReader::new(file);

        let mut header = [0u8; 8];
        match input.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(SearchError::schema(&path, "file too small to contain header"));
            }
            Err(e) => return Err(SearchError::io(&path, e)),
        }
        if &header[0..4] != MAGIC_BYTES {
            return Err(SearchError::schema(&path, "invalid magic bytes"));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != CONTAINER_VERSION {
            return Err(SearchError::schema(
                &path,
                format!("unsupported container version {version} (expected {CONTAINER_VERSION})"),
            ));
        }

        Ok(Self {
            path,
            schema,
            input,
            position: 0,
            finished: false,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next length prefix. `None` on a clean end of file.
    fn read_frame_len(&mut self) -> SearchResult<Option<usize>> {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(SearchError::io(&self.path, e)),
            }
        }

        match filled {
            0 => Ok(None),
            FRAME_HEADER_SIZE => Ok(Some(u32::from_le_bytes(buf) as usize)),
            _ => Err(self.truncated()),
        }
    }

    fn truncated(&self) -> SearchError {
        SearchError::schema(
            &self.path,
            format!("truncated data file at record {}", self.position),
        )
    }

    fn read_record(&mut self) -> SearchResult<Option<StoredRecord>> {
        let Some(len) = self.read_frame_len()? else {
            return Ok(None);
        };
        if len > MAX_FRAME_SIZE {
            return Err(SearchError::schema(
                &self.path,
                format!("record {} declares an implausible size of {len} bytes", self.position),
            ));
        }

        let mut payload = vec![0u8; len];
        match self.input.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(self.truncated()),
            Err(e) => return Err(SearchError::io(&self.path, e)),
        }

        let (text, embedding, metadata) =
            codec::decode_payload(&self.schema, &payload, &self.path, self.position)?;
        self.position += 1;
        Ok(Some(StoredRecord::new(text, embedding, metadata)))
    }
}

impl Iterator for RecordReader {
    type Item = SearchResult<StoredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl VectorContainer {
    /// Writes the container and its schema sidecar, overwriting both.
    pub fn save(&self, path: impl AsRef<Path>) -> SearchResult<()> {
        let mut writer = RecordWriter::create(path, self.schema.clone())?;
        for record in &self.records {
            writer.append_record(record)?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Reads a whole container. Any malformed record aborts the read.
    pub fn load(path: impl AsRef<Path>) -> SearchResult<Self> {
        let reader = RecordReader::open(path)?;
        let schema = reader.schema().clone();
        let records = reader.collect::<SearchResult<Vec<_>>>()?;
        Ok(Self { schema, records })
    }
}
