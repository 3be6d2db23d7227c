//! B-tree v2 codec (`BTHD` / `BTIN` / `BTLF`)
//!
//! The second-generation B-tree backs the dense-attribute name index:
//! leaf records pair a Jenkins lookup3 hash of the attribute name with a
//! 7-byte fractal-heap id. Every node carries a trailing lookup3
//! checksum; readers validate it and writers recompute it on every
//! rewrite.

use alloc::vec::Vec;

use crate::checksum::metadata_checksum;
use crate::codec::{ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::constants::{
    BTREE_V2_HEADER_SIGNATURE, BTREE_V2_INTERNAL_SIGNATURE, BTREE_V2_LEAF_SIGNATURE,
};
use crate::format::superblock::Superblock;

/// Record type for the attribute name index
pub const RECORD_TYPE_ATTRIBUTE_NAME: u8 = 8;

/// On-disk size of one name record: 4-byte hash + 7-byte heap id.
pub const NAME_RECORD_SIZE: usize = 11;

/// One name-index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRecord {
    /// Jenkins lookup3 hash of the attribute name
    pub hash: u32,
    /// Fractal heap id of the attribute message body
    pub heap_id: [u8; 7],
}

impl NameRecord {
    pub fn new(name: &str, heap_id: [u8; 7]) -> Self {
        Self {
            hash: metadata_checksum(name.as_bytes()),
            heap_id,
        }
    }
}

/// The `BTHD` tree header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtreeV2Header {
    pub version: u8,
    pub record_type: u8,
    pub node_size: u32,
    pub record_size: u16,
    pub depth: u16,
    pub split_percent: u8,
    pub merge_percent: u8,
    pub root_address: u64,
    pub root_record_count: u16,
    pub total_record_count: u64,
}

impl BtreeV2Header {
    pub fn parse(buf: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "b-tree v2 header");
        r.expect_signature(&BTREE_V2_HEADER_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "b-tree v2 header",
                version,
            });
        }
        let record_type = r.read_u8()?;
        let node_size = r.read_u32()?;
        let record_size = r.read_u16()?;
        let depth = r.read_u16()?;
        let split_percent = r.read_u8()?;
        let merge_percent = r.read_u8()?;
        let root_address = r.read_address(sb.offset_size)?;
        let root_record_count = r.read_u16()?;
        let total_record_count = r.read_uint(sb.length_size)?;
        let stored = r.read_u32()?;

        let body_len = buf.len() - r.remaining() - 4;
        if metadata_checksum(&buf[..body_len]) != stored {
            return Err(FormatError::ChecksumMismatch("b-tree v2 header"));
        }

        Ok(Self {
            version,
            record_type,
            node_size,
            record_size,
            depth,
            split_percent,
            merge_percent,
            root_address,
            root_record_count,
            total_record_count,
        })
    }

    pub fn encode(&self, sb: &Superblock) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(&BTREE_V2_HEADER_SIGNATURE);
        w.write_u8(self.version);
        w.write_u8(self.record_type);
        w.write_u32(self.node_size);
        w.write_u16(self.record_size);
        w.write_u16(self.depth);
        w.write_u8(self.split_percent);
        w.write_u8(self.merge_percent);
        w.write_address(self.root_address, sb.offset_size);
        w.write_u16(self.root_record_count);
        w.write_uint(self.total_record_count, sb.length_size);
        let checksum = metadata_checksum(w.as_slice());
        w.write_u32(checksum);
        w.finish()
    }

    /// Encoded size for the declared widths.
    pub fn encoded_size(sb: &Superblock) -> usize {
        16 + sb.offset_size as usize + 2 + sb.length_size as usize + 4
    }
}

/// A `BTLF` leaf holding name records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub version: u8,
    pub record_type: u8,
    pub records: Vec<NameRecord>,
}

impl LeafNode {
    pub fn new(records: Vec<NameRecord>) -> Self {
        Self {
            version: 0,
            record_type: RECORD_TYPE_ATTRIBUTE_NAME,
            records,
        }
    }

    /// Parse a leaf with a known record count (from the tree header or
    /// the parent's child pointer).
    pub fn parse(buf: &[u8], record_count: usize) -> Result<Self> {
        let mut r = ByteReader::new(buf, "b-tree v2 leaf");
        r.expect_signature(&BTREE_V2_LEAF_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "b-tree v2 leaf",
                version,
            });
        }
        let record_type = r.read_u8()?;
        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            let hash = r.read_u32()?;
            let raw = r.take(7)?;
            let mut heap_id = [0u8; 7];
            heap_id.copy_from_slice(raw);
            records.push(NameRecord { hash, heap_id });
        }
        let body_len = 6 + NAME_RECORD_SIZE * record_count;
        let stored = r.read_u32()?;
        if metadata_checksum(&buf[..body_len]) != stored {
            return Err(FormatError::ChecksumMismatch("b-tree v2 leaf"));
        }
        Ok(Self {
            version,
            record_type,
            records,
        })
    }

    /// Encode with a freshly computed checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(6 + NAME_RECORD_SIZE * self.records.len() + 4);
        w.write_bytes(&BTREE_V2_LEAF_SIGNATURE);
        w.write_u8(self.version);
        w.write_u8(self.record_type);
        for record in &self.records {
            w.write_u32(record.hash);
            w.write_bytes(&record.heap_id);
        }
        let checksum = metadata_checksum(w.as_slice());
        w.write_u32(checksum);
        w.finish()
    }
}

/// Pointer from an internal node to one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildPointer {
    pub address: u64,
    pub record_count: u16,
    /// Present below depth-1 internals
    pub total_record_count: Option<u64>,
}

/// A `BTIN` internal node: `n` records separating `n + 1` children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub version: u8,
    pub record_type: u8,
    pub records: Vec<NameRecord>,
    pub children: Vec<ChildPointer>,
}

impl InternalNode {
    /// Parse an internal node at the given depth with a known record
    /// count.
    pub fn parse(buf: &[u8], record_count: usize, depth: u16, sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "b-tree v2 internal node");
        r.expect_signature(&BTREE_V2_INTERNAL_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "b-tree v2 internal node",
                version,
            });
        }
        let record_type = r.read_u8()?;
        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            let hash = r.read_u32()?;
            let raw = r.take(7)?;
            let mut heap_id = [0u8; 7];
            heap_id.copy_from_slice(raw);
            records.push(NameRecord { hash, heap_id });
        }
        let mut children = Vec::with_capacity(record_count + 1);
        for _ in 0..=record_count {
            let address = r.read_address(sb.offset_size)?;
            let count = r.read_u16()?;
            let total = if depth > 1 {
                Some(r.read_uint(sb.length_size)?)
            } else {
                None
            };
            children.push(ChildPointer {
                address,
                record_count: count,
                total_record_count: total,
            });
        }
        let body_len = buf.len() - r.remaining() - 4;
        let stored = r.read_u32()?;
        if metadata_checksum(&buf[..body_len]) != stored {
            return Err(FormatError::ChecksumMismatch("b-tree v2 internal node"));
        }
        Ok(Self {
            version,
            record_type,
            records,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sb() -> Superblock {
        Superblock::new_v2(48)
    }

    #[test]
    fn test_header_round_trip() {
        let header = BtreeV2Header {
            version: 0,
            record_type: RECORD_TYPE_ATTRIBUTE_NAME,
            node_size: 512,
            record_size: NAME_RECORD_SIZE as u16,
            depth: 0,
            split_percent: 100,
            merge_percent: 40,
            root_address: 0x1000,
            root_record_count: 3,
            total_record_count: 3,
        };
        let buf = header.encode(&sb());
        assert_eq!(buf.len(), BtreeV2Header::encoded_size(&sb()));
        assert_eq!(BtreeV2Header::parse(&buf, &sb()).unwrap(), header);
    }

    #[test]
    fn test_header_checksum_mismatch() {
        let header = BtreeV2Header {
            version: 0,
            record_type: RECORD_TYPE_ATTRIBUTE_NAME,
            node_size: 512,
            record_size: 11,
            depth: 0,
            split_percent: 100,
            merge_percent: 40,
            root_address: 0x1000,
            root_record_count: 0,
            total_record_count: 0,
        };
        let mut buf = header.encode(&sb());
        buf[6] ^= 1;
        assert!(matches!(
            BtreeV2Header::parse(&buf, &sb()),
            Err(FormatError::ChecksumMismatch(_))
        ));
    }

    #[test]
    fn test_leaf_round_trip_and_hash_property() {
        let names = ["alpha", "beta", "gamma"];
        let mut records: Vec<NameRecord> = names
            .iter()
            .enumerate()
            .map(|(i, name)| NameRecord::new(name, [i as u8 + 1, 0, 0, 0, 0, 0, 0]))
            .collect();
        records.sort_by_key(|r| r.hash);

        let leaf = LeafNode::new(records.clone());
        let buf = leaf.encode();
        let back = LeafNode::parse(&buf, records.len()).unwrap();
        assert_eq!(back, leaf);

        // Every stored hash is the lookup3 hash of its name.
        for record in &back.records {
            let matches = names
                .iter()
                .any(|name| metadata_checksum(name.as_bytes()) == record.hash);
            assert!(matches);
        }
    }

    #[test]
    fn test_leaf_checksum_recomputed_on_encode() {
        let leaf = LeafNode::new(vec![NameRecord::new("count", [1, 0, 0, 0, 0, 0, 0])]);
        let mut buf = leaf.encode();
        buf[8] ^= 0xFF;
        assert!(matches!(
            LeafNode::parse(&buf, 1),
            Err(FormatError::ChecksumMismatch(_))
        ));
    }

    #[test]
    fn test_internal_node_parse() {
        // Hand-encode a depth-1 internal node with one record.
        let record = NameRecord::new("middle", [9, 0, 0, 0, 0, 0, 0]);
        let mut w = ByteWriter::new();
        w.write_bytes(&BTREE_V2_INTERNAL_SIGNATURE);
        w.write_u8(0);
        w.write_u8(RECORD_TYPE_ATTRIBUTE_NAME);
        w.write_u32(record.hash);
        w.write_bytes(&record.heap_id);
        for (addr, count) in [(0x2000u64, 2u16), (0x3000, 3)] {
            w.write_address(addr, 8);
            w.write_u16(count);
        }
        let checksum = metadata_checksum(w.as_slice());
        w.write_u32(checksum);
        let buf = w.finish();

        let node = InternalNode::parse(&buf, 1, 1, &sb()).unwrap();
        assert_eq!(node.records, vec![record]);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].address, 0x3000);
        assert_eq!(node.children[1].record_count, 3);
        assert_eq!(node.children[0].total_record_count, None);
    }
}
