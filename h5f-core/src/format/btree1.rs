//! B-tree v1 node codec (`TREE`)
//!
//! The first-generation B-tree indexes two things: the children of a v1
//! group (keys are link-name offsets into the local heap) and the chunks
//! of a chunked dataset (keys are chunk coordinates). Chunk coordinates
//! order lexicographically with the leftmost dimension most significant.
//! This engine only reads these trees.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::codec::ByteReader;
use crate::error::{FormatError, Result};
use crate::format::constants::BTREE_V1_SIGNATURE;
use crate::format::superblock::Superblock;

/// Key of one chunk: its stored byte size, filter mask and coordinates.
/// The coordinate list is as stored on disk, which for most writers
/// includes a trailing element-offset word beyond the dataset rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkKey {
    pub chunk_size: u32,
    pub filter_mask: u32,
    pub offsets: Vec<u64>,
}

/// A group-tree node: `entries_used + 1` heap-offset keys interleaved
/// with child addresses (symbol-table nodes at level 0, deeper tree
/// nodes above).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub level: u8,
    pub left_sibling: u64,
    pub right_sibling: u64,
    pub keys: Vec<u64>,
    pub children: Vec<u64>,
}

/// A chunk-tree node: `entries_used + 1` chunk keys interleaved with
/// child addresses (chunk byte ranges at level 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkNode {
    pub level: u8,
    pub left_sibling: u64,
    pub right_sibling: u64,
    pub keys: Vec<ChunkKey>,
    pub children: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BtreeV1Node {
    Group(GroupNode),
    Chunk(ChunkNode),
}

impl BtreeV1Node {
    /// Parse a node. `chunk_rank` is the per-key coordinate count for
    /// chunk trees (the stored layout dimensionality) and is ignored for
    /// group trees.
    pub fn parse(buf: &[u8], sb: &Superblock, chunk_rank: usize) -> Result<Self> {
        let mut r = ByteReader::new(buf, "b-tree v1 node");
        r.expect_signature(&BTREE_V1_SIGNATURE)?;
        let node_type = r.read_u8()?;
        let level = r.read_u8()?;
        let entries_used = r.read_u16()? as usize;
        let left_sibling = r.read_address(sb.offset_size)?;
        let right_sibling = r.read_address(sb.offset_size)?;

        match node_type {
            0 => {
                let mut keys = Vec::with_capacity(entries_used + 1);
                let mut children = Vec::with_capacity(entries_used);
                for _ in 0..entries_used {
                    keys.push(r.read_uint(sb.length_size)?);
                    children.push(r.read_address(sb.offset_size)?);
                }
                keys.push(r.read_uint(sb.length_size)?);
                Ok(BtreeV1Node::Group(GroupNode {
                    level,
                    left_sibling,
                    right_sibling,
                    keys,
                    children,
                }))
            }
            1 => {
                let mut keys = Vec::with_capacity(entries_used + 1);
                let mut children = Vec::with_capacity(entries_used);
                for _ in 0..entries_used {
                    keys.push(read_chunk_key(&mut r, chunk_rank)?);
                    children.push(r.read_address(sb.offset_size)?);
                }
                keys.push(read_chunk_key(&mut r, chunk_rank)?);
                Ok(BtreeV1Node::Chunk(ChunkNode {
                    level,
                    left_sibling,
                    right_sibling,
                    keys,
                    children,
                }))
            }
            _ => Err(FormatError::FieldOutOfRange("b-tree v1 node type")),
        }
    }
}

fn read_chunk_key(r: &mut ByteReader<'_>, rank: usize) -> Result<ChunkKey> {
    let chunk_size = r.read_u32()?;
    let filter_mask = r.read_u32()?;
    let mut offsets = Vec::with_capacity(rank);
    for _ in 0..rank {
        offsets.push(r.read_u64()?);
    }
    Ok(ChunkKey {
        chunk_size,
        filter_mask,
        offsets,
    })
}

/// Lexicographic comparison of chunk coordinates, leftmost dimension
/// most significant. When ranks differ, equal shared prefixes compare
/// equal.
pub fn compare_coords(a: &[u64], b: &[u64]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
