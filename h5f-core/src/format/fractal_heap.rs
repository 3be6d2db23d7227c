//! Fractal heap codec (`FRHP` header, `FHDB` direct blocks, heap ids)
//!
//! The fractal heap stores variable-size objects (dense attribute
//! bodies, link records) addressed by compact heap ids. The id's offset
//! and length widths are properties of the heap header, never constants:
//! the offset width is `ceil(max_heap_size / 8)` and the length width is
//! the narrower of what the maximum direct-block size and the maximum
//! managed-object size require.

use alloc::vec::Vec;

use crate::codec::{compute_offset_size, ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::constants::{DIRECT_BLOCK_SIGNATURE, FRACTAL_HEAP_SIGNATURE};
use crate::format::superblock::Superblock;

/// Header flag: direct blocks carry a checksum
pub const FLAG_CHECKSUM_DIRECT_BLOCKS: u8 = 0x2;

/// The `FRHP` heap header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractalHeapHeader {
    pub version: u8,
    pub heap_id_length: u16,
    pub io_filter_length: u16,
    pub flags: u8,
    pub max_managed_object_size: u32,
    pub next_huge_id: u64,
    pub huge_btree_address: u64,
    pub free_space: u64,
    pub free_space_manager_address: u64,
    pub managed_space: u64,
    pub allocated_managed_space: u64,
    pub managed_iterator_offset: u64,
    pub managed_object_count: u64,
    pub huge_size: u64,
    pub huge_count: u64,
    pub tiny_size: u64,
    pub tiny_count: u64,
    pub table_width: u16,
    pub starting_block_size: u64,
    pub max_direct_block_size: u64,
    /// Maximum heap address-space size in bits (log2)
    pub max_heap_size: u16,
    pub starting_rows: u16,
    pub root_block_address: u64,
    pub current_rows: u16,
}

impl FractalHeapHeader {
    /// Width of a heap id's offset field in bytes.
    pub fn id_offset_width(&self) -> u8 {
        self.max_heap_size.div_ceil(8) as u8
    }

    /// Width of a heap id's length field in bytes.
    pub fn id_length_width(&self) -> u8 {
        compute_offset_size(self.max_direct_block_size)
            .min(compute_offset_size(self.max_managed_object_size as u64))
    }

    pub fn direct_blocks_checksummed(&self) -> bool {
        self.flags & FLAG_CHECKSUM_DIRECT_BLOCKS != 0
    }

    pub fn parse(buf: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "fractal heap header");
        r.expect_signature(&FRACTAL_HEAP_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "fractal heap header",
                version,
            });
        }
        let heap_id_length = r.read_u16()?;
        let io_filter_length = r.read_u16()?;
        let flags = r.read_u8()?;
        let max_managed_object_size = r.read_u32()?;
        let next_huge_id = r.read_uint(sb.length_size)?;
        let huge_btree_address = r.read_address(sb.offset_size)?;
        let free_space = r.read_uint(sb.length_size)?;
        let free_space_manager_address = r.read_address(sb.offset_size)?;
        let managed_space = r.read_uint(sb.length_size)?;
        let allocated_managed_space = r.read_uint(sb.length_size)?;
        let managed_iterator_offset = r.read_uint(sb.length_size)?;
        let managed_object_count = r.read_uint(sb.length_size)?;
        let huge_size = r.read_uint(sb.length_size)?;
        let huge_count = r.read_uint(sb.length_size)?;
        let tiny_size = r.read_uint(sb.length_size)?;
        let tiny_count = r.read_uint(sb.length_size)?;
        let table_width = r.read_u16()?;
        let starting_block_size = r.read_uint(sb.length_size)?;
        let max_direct_block_size = r.read_uint(sb.length_size)?;
        let max_heap_size = r.read_u16()?;
        let starting_rows = r.read_u16()?;
        let root_block_address = r.read_address(sb.offset_size)?;
        let current_rows = r.read_u16()?;

        if io_filter_length > 0 {
            return Err(FormatError::Unsupported("filtered fractal heaps"));
        }

        Ok(Self {
            version,
            heap_id_length,
            io_filter_length,
            flags,
            max_managed_object_size,
            next_huge_id,
            huge_btree_address,
            free_space,
            free_space_manager_address,
            managed_space,
            allocated_managed_space,
            managed_iterator_offset,
            managed_object_count,
            huge_size,
            huge_count,
            tiny_size,
            tiny_count,
            table_width,
            starting_block_size,
            max_direct_block_size,
            max_heap_size,
            starting_rows,
            root_block_address,
            current_rows,
        })
    }

    pub fn encode(&self, sb: &Superblock) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(&FRACTAL_HEAP_SIGNATURE);
        w.write_u8(self.version);
        w.write_u16(self.heap_id_length);
        w.write_u16(self.io_filter_length);
        w.write_u8(self.flags);
        w.write_u32(self.max_managed_object_size);
        w.write_uint(self.next_huge_id, sb.length_size);
        w.write_address(self.huge_btree_address, sb.offset_size);
        w.write_uint(self.free_space, sb.length_size);
        w.write_address(self.free_space_manager_address, sb.offset_size);
        w.write_uint(self.managed_space, sb.length_size);
        w.write_uint(self.allocated_managed_space, sb.length_size);
        w.write_uint(self.managed_iterator_offset, sb.length_size);
        w.write_uint(self.managed_object_count, sb.length_size);
        w.write_uint(self.huge_size, sb.length_size);
        w.write_uint(self.huge_count, sb.length_size);
        w.write_uint(self.tiny_size, sb.length_size);
        w.write_uint(self.tiny_count, sb.length_size);
        w.write_u16(self.table_width);
        w.write_uint(self.starting_block_size, sb.length_size);
        w.write_uint(self.max_direct_block_size, sb.length_size);
        w.write_u16(self.max_heap_size);
        w.write_u16(self.starting_rows);
        w.write_address(self.root_block_address, sb.offset_size);
        w.write_u16(self.current_rows);
        w.finish()
    }

    /// Encoded size for the declared widths.
    pub fn encoded_size(sb: &Superblock) -> usize {
        22 + 3 * sb.offset_size as usize + 12 * sb.length_size as usize
    }
}

/// A decoded managed heap id: offset within the heap's address space
/// and object length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapId {
    pub offset: u64,
    pub length: u64,
}

impl HeapId {
    /// Decode a heap id using the widths declared by its heap header.
    pub fn parse(bytes: &[u8], header: &FractalHeapHeader) -> Result<Self> {
        let mut r = ByteReader::new(bytes, "fractal heap id");
        let first = r.read_u8()?;
        let version = (first >> 6) & 0x3;
        let id_type = (first >> 4) & 0x3;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "fractal heap id",
                version,
            });
        }
        if id_type != 0 {
            return Err(FormatError::Inconsistent(
                "heap id does not name a managed object",
            ));
        }
        let offset = r.read_uint(header.id_offset_width())?;
        let length = r.read_uint(header.id_length_width())?;
        Ok(Self { offset, length })
    }

    /// Encode at the heap's declared id length (zero-padded when the
    /// declared id length exceeds the used bytes).
    pub fn encode(&self, header: &FractalHeapHeader) -> Vec<u8> {
        let used = 1 + header.id_offset_width() as usize + header.id_length_width() as usize;
        let total = used.max(header.heap_id_length as usize);
        let mut w = ByteWriter::with_capacity(total);
        w.write_u8(0); // version 0, managed type
        w.write_uint(self.offset, header.id_offset_width());
        w.write_uint(self.length, header.id_length_width());
        w.write_zeros(total - used);
        w.finish()
    }
}

/// An `FHDB` direct block prefix. The managed-object payload follows
/// the prefix; this codec never copies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectBlock {
    pub heap_header_address: u64,
    /// This block's offset within the heap address space
    pub block_offset: u64,
}

impl DirectBlock {
    pub fn parse(buf: &[u8], header: &FractalHeapHeader, sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "fractal heap direct block");
        r.expect_signature(&DIRECT_BLOCK_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "fractal heap direct block",
                version,
            });
        }
        let heap_header_address = r.read_address(sb.offset_size)?;
        let block_offset = r.read_uint(header.id_offset_width())?;
        if header.direct_blocks_checksummed() {
            // Stored checksum; validation is deferred like the
            // Fletcher32 filter's.
            r.skip(4)?;
        }
        Ok(Self {
            heap_header_address,
            block_offset,
        })
    }

    /// Prefix length ahead of the managed-object bytes.
    pub fn header_size(header: &FractalHeapHeader, sb: &Superblock) -> usize {
        let base = 4 + 1 + sb.offset_size as usize + header.id_offset_width() as usize;
        if header.direct_blocks_checksummed() {
            base + 4
        } else {
            base
        }
    }

    /// File address of an object's payload inside this block.
    pub fn payload_address(
        &self,
        block_address: u64,
        header: &FractalHeapHeader,
        sb: &Superblock,
        id: &HeapId,
    ) -> Result<u64> {
        if id.offset < self.block_offset {
            return Err(FormatError::Inconsistent(
                "heap id offset precedes its direct block",
            ));
        }
        Ok(block_address
            + Self::header_size(header, sb) as u64
            + (id.offset - self.block_offset))
    }
}
