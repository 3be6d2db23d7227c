//! Attribute Info message codec (type 0x15)
//!
//! Presence of this message signals dense attribute storage: its
//! addresses point at the fractal heap holding the attribute bodies and
//! the B-tree v2 name index over them.

use alloc::vec::Vec;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::superblock::Superblock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub version: u8,
    /// Bit 0: creation order tracked; bit 1: creation order indexed
    pub flags: u8,
    /// Phase-change bounds, present when creation order is tracked
    pub max_compact: Option<u16>,
    pub min_dense: Option<u16>,
    pub fractal_heap_address: u64,
    pub name_index_address: u64,
    pub creation_order_index_address: Option<u64>,
}

impl AttributeInfo {
    pub fn parse(body: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(body, "attribute info message");
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "attribute info",
                version,
            });
        }
        let flags = r.read_u8()?;
        let (max_compact, min_dense) = if flags & 0x1 != 0 {
            (Some(r.read_u16()?), Some(r.read_u16()?))
        } else {
            (None, None)
        };
        let fractal_heap_address = r.read_address(sb.offset_size)?;
        let name_index_address = r.read_address(sb.offset_size)?;
        let creation_order_index_address = if flags & 0x2 != 0 {
            Some(r.read_address(sb.offset_size)?)
        } else {
            None
        };
        Ok(Self {
            version,
            flags,
            max_compact,
            min_dense,
            fractal_heap_address,
            name_index_address,
            creation_order_index_address,
        })
    }

    pub fn encode(&self, sb: &Superblock) -> Result<Vec<u8>> {
        if self.flags & 0x1 != 0 && (self.max_compact.is_none() || self.min_dense.is_none()) {
            return Err(FormatError::Inconsistent(
                "attribute info tracks creation order but lacks phase-change bounds",
            ));
        }
        if self.flags & 0x2 != 0 && self.creation_order_index_address.is_none() {
            return Err(FormatError::Inconsistent(
                "attribute info indexes creation order but lacks an index address",
            ));
        }

        let mut w = ByteWriter::new();
        w.write_u8(self.version);
        w.write_u8(self.flags);
        if self.flags & 0x1 != 0 {
            w.write_u16(self.max_compact.unwrap_or(0));
            w.write_u16(self.min_dense.unwrap_or(0));
        }
        w.write_address(self.fractal_heap_address, sb.offset_size);
        w.write_address(self.name_index_address, sb.offset_size);
        if self.flags & 0x2 != 0 {
            w.write_address(self.creation_order_index_address.unwrap_or(0), sb.offset_size);
        }
        Ok(w.finish())
    }
}
