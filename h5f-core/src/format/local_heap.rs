//! Local heap codec (`HEAP`)
//!
//! The local heap is the byte arena v1 symbol tables store their link
//! names in; B-tree keys and symbol-table entries refer to names by
//! offset into its data segment.

use crate::codec::ByteReader;
use crate::error::{FormatError, Result};
use crate::format::constants::LOCAL_HEAP_SIGNATURE;
use crate::format::superblock::Superblock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalHeap {
    pub version: u8,
    pub data_segment_size: u64,
    pub free_list_head: u64,
    pub data_segment_address: u64,
}

impl LocalHeap {
    pub fn parse(buf: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "local heap");
        r.expect_signature(&LOCAL_HEAP_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "local heap",
                version,
            });
        }
        r.skip(3)?; // reserved
        let data_segment_size = r.read_uint(sb.length_size)?;
        let free_list_head = r.read_uint(sb.length_size)?;
        let data_segment_address = r.read_address(sb.offset_size)?;
        Ok(Self {
            version,
            data_segment_size,
            free_list_head,
            data_segment_address,
        })
    }

    /// Encoded prefix size for the declared widths.
    pub fn encoded_size(sb: &Superblock) -> usize {
        8 + 2 * sb.length_size as usize + sb.offset_size as usize
    }
}

/// The NUL-terminated name at `offset` in a heap data segment.
pub fn name_at(segment: &[u8], offset: u64) -> Result<&[u8]> {
    let start = offset as usize;
    if start >= segment.len() {
        return Err(FormatError::FieldOutOfRange("local heap name offset"));
    }
    let rest = &segment[start..];
    let nul = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or(FormatError::Truncated("local heap name"))?;
    Ok(&rest[..nul])
}
