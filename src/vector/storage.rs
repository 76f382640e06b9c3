//! On-disk format for a built forest, loaded through a memory map.
//!
//! # Storage Format
//!
//! All integers and floats are little-endian.
//! - Header (28 bytes): magic `LSAN`, version, dimension, item count,
//!   tree count (u32 each after the magic), seed (u64)
//! - Items: `item_count * dimension` f32 values, row-major
//! - Trees: for each tree a root position and node count (u32), then nodes.
//!   A node starts with a tag byte: `0` leaf (u32 count, then u32 ids),
//!   `1` split (u32 left, u32 right, then `dimension` f32 normal)
//!
//! Counts are checked against the bytes left before anything is allocated.
//! A split's children are stored after it, so child positions must be larger
//! than the split's own. Out-of-range references, backward links and trailing
//! bytes are schema errors.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use tracing::info;

use crate::error::{IoContext, SearchError, SearchResult};
use crate::vector::forest::{IndexState, Node, Tree};
use crate::vector::{AnnIndex, ItemId, TreeCount, VectorDimension};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 28;

/// Magic bytes to identify index files.
const MAGIC_BYTES: &[u8; 4] = b"LSAN";

/// Root position plus node count.
const TREE_HEADER_SIZE: usize = 8;

const TAG_LEAF: u8 = 0;
const TAG_SPLIT: u8 = 1;

/// Summary of an index file, read from its header only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFileInfo {
    pub path: PathBuf,
    pub version: u32,
    pub dimension: usize,
    pub item_count: usize,
    pub tree_count: usize,
    pub seed: u64,
    pub file_size: u64,
}

impl AnnIndex {
    /// Writes the built forest to `path`, creating parent directories.
    ///
    /// Only a built index can be saved.
    pub fn save(&self, path: impl AsRef<Path>) -> SearchResult<()> {
        let path = path.as_ref();
        self.ensure_built()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }

        let file = File::create(path).with_path(path)?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out).with_path(path)?;
        out.flush().with_path(path)?;

        info!(path = %path.display(), items = self.len(), trees = self.trees.len(), "index saved");
        Ok(())
    }

    /// Loads a saved forest. The result is built and ready for queries.
    ///
    /// `dimension` must match the dimension the index was built with.
    pub fn load(path: impl AsRef<Path>, dimension: VectorDimension) -> SearchResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_path(path)?;
        // The map is only read during this call and dropped before returning
        let mmap = unsafe { MmapOptions::new().map(&file) }.with_path(path)?;

        let mut reader = ByteReader::new(&mmap, path);
        let header = read_header(&mut reader)?;
        if header.dimension != dimension.get() {
            return Err(SearchError::DimensionMismatch {
                expected: dimension.get(),
                actual: header.dimension,
            });
        }
        let tree_count = TreeCount::new(header.tree_count)
            .map_err(|_| SearchError::schema(path, "index file declares zero trees"))?;

        let dim = dimension.get();
        let float_count = header
            .item_count
            .checked_mul(dim)
            .ok_or_else(|| SearchError::schema(path, "item table size overflows"))?;
        let items = reader.f32_vec(float_count)?;

        // Every tree carries at least its root and node count
        let tree_bytes = header
            .tree_count
            .checked_mul(TREE_HEADER_SIZE)
            .ok_or_else(|| SearchError::schema(path, "tree table size overflows"))?;
        if tree_bytes > reader.remaining() {
            return Err(SearchError::schema(
                path,
                format!(
                    "header declares {} trees but only {} bytes follow the items",
                    header.tree_count,
                    reader.remaining()
                ),
            ));
        }

        let mut trees = Vec::with_capacity(header.tree_count);
        for _ in 0..header.tree_count {
            trees.push(read_tree(&mut reader, dim, header.item_count)?);
        }

        if reader.remaining() != 0 {
            return Err(SearchError::schema(
                path,
                format!("{} unexpected trailing bytes", reader.remaining()),
            ));
        }

        info!(
            path = %path.display(),
            items = header.item_count,
            trees = header.tree_count,
            "index loaded"
        );

        Ok(Self {
            dimension,
            tree_count,
            seed: header.seed,
            items,
            trees,
            state: IndexState::Built,
        })
    }

    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        out.write_all(MAGIC_BYTES)?;
        out.write_all(&STORAGE_VERSION.to_le_bytes())?;
        out.write_all(&(self.dimension.get() as u32).to_le_bytes())?;
        out.write_all(&(self.len() as u32).to_le_bytes())?;
        out.write_all(&(self.trees.len() as u32).to_le_bytes())?;
        out.write_all(&self.seed.to_le_bytes())?;

        for &value in &self.items {
            out.write_all(&value.to_le_bytes())?;
        }

        for tree in &self.trees {
            out.write_all(&tree.root.to_le_bytes())?;
            out.write_all(&(tree.nodes.len() as u32).to_le_bytes())?;
            for node in &tree.nodes {
                match node {
                    Node::Leaf { items } => {
                        out.write_all(&[TAG_LEAF])?;
                        out.write_all(&(items.len() as u32).to_le_bytes())?;
                        for &id in items {
                            out.write_all(&ItemId::new(id).to_bytes())?;
                        }
                    }
                    Node::Split {
                        normal,
                        left,
                        right,
                    } => {
                        out.write_all(&[TAG_SPLIT])?;
                        out.write_all(&left.to_le_bytes())?;
                        out.write_all(&right.to_le_bytes())?;
                        for &value in normal {
                            out.write_all(&value.to_le_bytes())?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reads only the header of an index file.
pub fn inspect_index_file(path: impl AsRef<Path>) -> SearchResult<IndexFileInfo> {
    let path = path.as_ref();
    let file = File::open(path).with_path(path)?;
    let file_size = file.metadata().with_path(path)?.len();
    let mmap = unsafe { MmapOptions::new().map(&file) }.with_path(path)?;

    let mut reader = ByteReader::new(&mmap, path);
    let header = read_header(&mut reader)?;
    Ok(IndexFileInfo {
        path: path.to_path_buf(),
        version: STORAGE_VERSION,
        dimension: header.dimension,
        item_count: header.item_count,
        tree_count: header.tree_count,
        seed: header.seed,
        file_size,
    })
}

struct Header {
    dimension: usize,
    item_count: usize,
    tree_count: usize,
    seed: u64,
}

fn read_header(reader: &mut ByteReader<'_>) -> SearchResult<Header> {
    if reader.remaining() < HEADER_SIZE {
        return Err(reader.corrupt("file too small to contain header"));
    }
    if reader.take(4)? != MAGIC_BYTES {
        return Err(reader.corrupt("invalid magic bytes"));
    }

    let version = reader.u32()?;
    if version != STORAGE_VERSION {
        return Err(reader.corrupt(format!(
            "unsupported format version {version} (expected {STORAGE_VERSION})"
        )));
    }

    Ok(Header {
        dimension: reader.u32()? as usize,
        item_count: reader.u32()? as usize,
        tree_count: reader.u32()? as usize,
        seed: reader.u64()?,
    })
}

fn read_tree(reader: &mut ByteReader<'_>, dim: usize, item_count: usize) -> SearchResult<Tree> {
    let root = reader.u32()?;
    let node_count = reader.u32()? as usize;
    if root as usize >= node_count {
        return Err(reader.corrupt(format!(
            "tree root {root} outside of {node_count} nodes"
        )));
    }

    let mut nodes = Vec::with_capacity(node_count.min(reader.remaining()));
    for position in 0..node_count {
        let node = match reader.u8()? {
            TAG_LEAF => {
                let count = reader.u32()? as usize;
                let mut items = Vec::with_capacity(count.min(reader.remaining() / 4));
                for _ in 0..count {
                    let id = reader.item_id()?;
                    if id.index() >= item_count {
                        return Err(reader.corrupt(format!(
                            "leaf references item {id} but the index holds {item_count}"
                        )));
                    }
                    items.push(id.get());
                }
                Node::Leaf { items }
            }
            TAG_SPLIT => {
                let left = reader.u32()?;
                let right = reader.u32()?;
                if left as usize >= node_count || right as usize >= node_count {
                    return Err(reader.corrupt("split references a missing child node"));
                }
                if left as usize <= position || right as usize <= position {
                    return Err(reader.corrupt(format!(
                        "split at node {position} links back to node {}",
                        left.min(right)
                    )));
                }
                Node::Split {
                    left,
                    right,
                    normal: reader.f32_vec(dim)?,
                }
            }
            tag => return Err(reader.corrupt(format!("unknown node tag {tag}"))),
        };
        nodes.push(node);
    }

    Ok(Tree { root, nodes })
}

/// Bounds-checked little-endian cursor over the mapped file.
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    path: &'a Path,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            bytes,
            offset: 0,
            path,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn corrupt(&self, reason: impl Into<String>) -> SearchError {
        SearchError::schema(self.path, reason)
    }

    fn take(&mut self, len: usize) -> SearchResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.corrupt(format!(
                "truncated index file: needed {len} bytes at offset {}",
                self.offset
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u8(&mut self) -> SearchResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> SearchResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn item_id(&mut self) -> SearchResult<ItemId> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(ItemId::from_bytes(buf))
    }

    fn u64(&mut self) -> SearchResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn f32_vec(&mut self, count: usize) -> SearchResult<Vec<f32>> {
        let byte_len = count
            .checked_mul(4)
            .ok_or_else(|| self.corrupt("vector block size overflows"))?;
        let raw = self.take(byte_len)?;
        Ok(raw
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}
