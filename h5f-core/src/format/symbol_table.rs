//! Symbol-table structures of version 1 groups
//!
//! A v1 group is a B-tree v1 keyed through a local heap of link names,
//! with `SNOD` leaf nodes holding the actual symbol-table entries. The
//! superblock's root-group pointer for v0/v1 files is itself one of these
//! entries.

use alloc::vec::Vec;

use crate::codec::{ByteReader, ByteWriter, UNDEF_ADDRESS};
use crate::error::{FormatError, Result};
use crate::format::constants::SYMBOL_TABLE_NODE_SIGNATURE;
use crate::format::superblock::Superblock;

/// A single symbol-table entry (40 bytes with 8-byte offsets).
///
/// The 16-byte scratch area is interpreted for cache type 1 (group
/// entries) as the cached B-tree and local-heap addresses; for other
/// cache types it is opaque and both cached addresses read as UNDEF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    pub link_name_offset: u64,
    pub object_header_address: u64,
    pub cache_type: u32,
    pub btree_address: u64,
    pub heap_address: u64,
}

impl SymbolTableEntry {
    /// A group entry with cached B-tree/heap addresses.
    pub fn group(object_header_address: u64, btree_address: u64, heap_address: u64) -> Self {
        Self {
            link_name_offset: 0,
            object_header_address,
            cache_type: 1,
            btree_address,
            heap_address,
        }
    }

    pub fn read(r: &mut ByteReader<'_>, sb: &Superblock) -> Result<Self> {
        let link_name_offset = r.read_address(sb.offset_size)?;
        let object_header_address = r.read_address(sb.offset_size)?;
        let cache_type = r.read_u32()?;
        r.skip(4)?; // reserved
        let scratch = r.take(16)?;
        let (btree_address, heap_address) = if cache_type == 1 {
            let mut s = ByteReader::new(scratch, "symbol table entry scratch");
            (
                s.read_address(sb.offset_size)?,
                s.read_address(sb.offset_size)?,
            )
        } else {
            (UNDEF_ADDRESS, UNDEF_ADDRESS)
        };
        Ok(Self {
            link_name_offset,
            object_header_address,
            cache_type,
            btree_address,
            heap_address,
        })
    }

    pub fn write(&self, w: &mut ByteWriter, sb: &Superblock) {
        w.write_address(self.link_name_offset, sb.offset_size);
        w.write_address(self.object_header_address, sb.offset_size);
        w.write_u32(self.cache_type);
        w.write_zeros(4);
        let scratch_start = w.len();
        if self.cache_type == 1 {
            w.write_address(self.btree_address, sb.offset_size);
            w.write_address(self.heap_address, sb.offset_size);
        }
        w.write_zeros(16 - (w.len() - scratch_start));
    }

    /// Encoded size for the declared offset width.
    pub fn encoded_size(sb: &Superblock) -> usize {
        2 * sb.offset_size as usize + 4 + 4 + 16
    }
}

/// A `SNOD` symbol-table node: the leaf payload of a v1 group B-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableNode {
    pub version: u8,
    pub entries: Vec<SymbolTableEntry>,
}

impl SymbolTableNode {
    pub fn parse(buf: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "symbol table node");
        r.expect_signature(&SYMBOL_TABLE_NODE_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 1 {
            return Err(FormatError::UnsupportedVersion {
                structure: "symbol table node",
                version,
            });
        }
        r.skip(1)?; // reserved
        let count = r.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(SymbolTableEntry::read(&mut r, sb)?);
        }
        Ok(Self { version, entries })
    }
}

/// The Symbol Table header message (type 0x11) carried by v1 group
/// object headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableMessage {
    pub btree_address: u64,
    pub heap_address: u64,
}

impl SymbolTableMessage {
    pub fn parse(body: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(body, "symbol table message");
        let btree_address = r.read_address(sb.offset_size)?;
        let heap_address = r.read_address(sb.offset_size)?;
        Ok(Self {
            btree_address,
            heap_address,
        })
    }

    pub fn encode(&self, sb: &Superblock) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(2 * sb.offset_size as usize);
        w.write_address(self.btree_address, sb.offset_size);
        w.write_address(self.heap_address, sb.offset_size);
        w.finish()
    }
}
