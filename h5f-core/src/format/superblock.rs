//! Superblock codec: the file-level anchor
//!
//! The superblock declares the offset and length widths every other
//! structure in the file is encoded with, and points at the root group's
//! object header. Five versions coexist: v0/v1 carry a root symbol-table
//! entry, v2/v3 a compact checksummed body, v4 adds a selectable checksum
//! algorithm.

use alloc::vec::Vec;

use crate::checksum::{crc32, fletcher32, metadata_checksum};
use crate::codec::{ByteReader, ByteWriter, UNDEF_ADDRESS};
use crate::error::{FormatError, Result};
use crate::format::constants::{checksum_algorithm, SUPERBLOCK_SIGNATURE};
use crate::format::symbol_table::SymbolTableEntry;

/// Version-specific trailing content of a superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuperblockLayout {
    /// v0/v1: symbol-table bootstrap for the root group
    Legacy {
        free_space_address: u64,
        driver_info_address: u64,
        group_leaf_k: u16,
        group_internal_k: u16,
        /// v1 only; zero for v0
        indexed_storage_k: u16,
        root_entry: SymbolTableEntry,
    },
    /// v2/v3: extension pointer, lookup3-checksummed body
    Compact { extension_address: u64 },
    /// v4: extension pointer plus a declared checksum algorithm
    Checksummed {
        extension_address: u64,
        checksum_algorithm: u8,
    },
}

/// The decoded file anchor. Immutable for the lifetime of an open file;
/// every codec that reads a stored address or length takes it by shared
/// reference for the declared widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub version: u8,
    /// Bytes per stored file address
    pub offset_size: u8,
    /// Bytes per stored length
    pub length_size: u8,
    pub file_consistency_flags: u32,
    pub base_address: u64,
    pub end_of_file_address: u64,
    /// Address of the root group's object header
    pub root_header_address: u64,
    pub layout: SuperblockLayout,
}

/// Candidate byte offsets at which a superblock may start: 0, then every
/// power-of-two multiple of 512, allowing for a user block.
pub fn candidate_offsets() -> impl Iterator<Item = u64> {
    const SCAN_CAP: u64 = 1 << 26;
    core::iter::successors(Some(0u64), |&o| match o {
        0 => Some(512),
        o if o < SCAN_CAP => Some(o * 2),
        _ => None,
    })
}

fn validate_width(width: u8, ctx: &'static str) -> Result<()> {
    match width {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(FormatError::FieldOutOfRange(ctx)),
    }
}

impl Superblock {
    /// A fresh v2 superblock with 8-byte offsets and lengths, the layout
    /// this engine writes for new files.
    pub fn new_v2(root_header_address: u64) -> Self {
        Self {
            version: 2,
            offset_size: 8,
            length_size: 8,
            file_consistency_flags: 0,
            base_address: 0,
            end_of_file_address: 0,
            root_header_address,
            layout: SuperblockLayout::Compact {
                extension_address: UNDEF_ADDRESS,
            },
        }
    }

    /// Parse a superblock from a buffer that starts at its signature.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(buf, "superblock");
        r.expect_signature(&SUPERBLOCK_SIGNATURE)?;
        let version = r.read_u8()?;
        match version {
            0 | 1 => Self::parse_legacy(buf, version),
            2 | 3 => Self::parse_compact(buf, version),
            4 => Self::parse_v4(buf),
            _ => Err(FormatError::UnsupportedVersion {
                structure: "superblock",
                version,
            }),
        }
    }

    fn parse_legacy(buf: &[u8], version: u8) -> Result<Self> {
        let mut r = ByteReader::new(buf, "superblock v0/v1");
        r.skip(9)?; // signature + version
        r.skip(1)?; // free-space storage version
        r.skip(1)?; // root group symbol-table entry version
        r.skip(1)?; // reserved
        r.skip(1)?; // shared header message format version
        let offset_size = r.read_u8()?;
        let length_size = r.read_u8()?;
        validate_width(offset_size, "superblock offset size")?;
        validate_width(length_size, "superblock length size")?;
        r.skip(1)?; // reserved
        let group_leaf_k = r.read_u16()?;
        let group_internal_k = r.read_u16()?;
        let file_consistency_flags = r.read_u32()?;
        let indexed_storage_k = if version == 1 {
            let k = r.read_u16()?;
            r.skip(2)?; // reserved
            k
        } else {
            0
        };

        // The widths below come from the fields just decoded.
        let sb_widths = Self {
            version,
            offset_size,
            length_size,
            file_consistency_flags,
            base_address: 0,
            end_of_file_address: 0,
            root_header_address: 0,
            layout: SuperblockLayout::Compact {
                extension_address: UNDEF_ADDRESS,
            },
        };

        let base_address = r.read_address(offset_size)?;
        let free_space_address = r.read_address(offset_size)?;
        let end_of_file_address = r.read_address(offset_size)?;
        let driver_info_address = r.read_address(offset_size)?;
        let root_entry = SymbolTableEntry::read(&mut r, &sb_widths)?;

        Ok(Self {
            version,
            offset_size,
            length_size,
            file_consistency_flags,
            base_address,
            end_of_file_address,
            root_header_address: root_entry.object_header_address,
            layout: SuperblockLayout::Legacy {
                free_space_address,
                driver_info_address,
                group_leaf_k,
                group_internal_k,
                indexed_storage_k,
                root_entry,
            },
        })
    }

    fn parse_compact(buf: &[u8], version: u8) -> Result<Self> {
        const BODY: usize = 44;
        let mut r = ByteReader::new(buf, "superblock v2/v3");
        r.skip(9)?;
        let offset_size = r.read_u8()?;
        let length_size = r.read_u8()?;
        validate_width(offset_size, "superblock offset size")?;
        validate_width(length_size, "superblock length size")?;
        let file_consistency_flags = r.read_u8()? as u32;
        let base_address = r.read_address(offset_size)?;
        let extension_address = r.read_address(offset_size)?;
        let end_of_file_address = r.read_address(offset_size)?;
        let root_header_address = r.read_address(offset_size)?;
        let stored = r.read_u32()?;
        let body_len = 12 + 4 * offset_size as usize;
        debug_assert!(offset_size != 8 || body_len == BODY);
        if metadata_checksum(&buf[..body_len]) != stored {
            return Err(FormatError::ChecksumMismatch("superblock v2/v3"));
        }

        Ok(Self {
            version,
            offset_size,
            length_size,
            file_consistency_flags,
            base_address,
            end_of_file_address,
            root_header_address,
            layout: SuperblockLayout::Compact { extension_address },
        })
    }

    fn parse_v4(buf: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(buf, "superblock v4");
        r.skip(9)?;
        let offset_size = r.read_u8()?;
        let length_size = r.read_u8()?;
        validate_width(offset_size, "superblock offset size")?;
        validate_width(length_size, "superblock length size")?;
        let file_consistency_flags = r.read_u8()? as u32;
        let algorithm = r.read_u8()?;
        r.skip(3)?; // reserved
        let base_address = r.read_address(offset_size)?;
        let extension_address = r.read_address(offset_size)?;
        let end_of_file_address = r.read_address(offset_size)?;
        let root_header_address = r.read_address(offset_size)?;
        let stored = r.read_u32()?;

        let body_len = 16 + 4 * offset_size as usize;
        let computed = match algorithm {
            checksum_algorithm::CRC32 => crc32(&buf[..body_len]),
            checksum_algorithm::FLETCHER32 => fletcher32(&buf[..body_len]),
            _ => return Err(FormatError::Unsupported("superblock v4 checksum algorithm")),
        };
        if computed != stored {
            return Err(FormatError::ChecksumMismatch("superblock v4"));
        }

        Ok(Self {
            version: 4,
            offset_size,
            length_size,
            file_consistency_flags,
            base_address,
            end_of_file_address,
            root_header_address,
            layout: SuperblockLayout::Checksummed {
                extension_address,
                checksum_algorithm: algorithm,
            },
        })
    }

    /// Encode the superblock, recording `eof` as the end-of-file address.
    ///
    /// Writing is restricted to 8-byte offsets and lengths; files with
    /// narrower widths are read-only.
    pub fn encode(&self, eof: u64) -> Result<Vec<u8>> {
        if self.offset_size != 8 || self.length_size != 8 {
            return Err(FormatError::Unsupported(
                "writing superblocks with non-8-byte offset or length size",
            ));
        }

        match (&self.layout, self.version) {
            (SuperblockLayout::Legacy { .. }, 0 | 1) => self.encode_legacy(eof),
            (SuperblockLayout::Compact { .. }, 2 | 3) => Ok(self.encode_compact(eof)),
            (SuperblockLayout::Checksummed { .. }, 4) => self.encode_v4(eof),
            _ => Err(FormatError::Inconsistent(
                "superblock layout does not match its version",
            )),
        }
    }

    fn encode_legacy(&self, eof: u64) -> Result<Vec<u8>> {
        let SuperblockLayout::Legacy {
            free_space_address,
            driver_info_address,
            group_leaf_k,
            group_internal_k,
            indexed_storage_k,
            ref root_entry,
        } = self.layout
        else {
            unreachable!()
        };

        let mut w = ByteWriter::with_capacity(96);
        w.write_bytes(&SUPERBLOCK_SIGNATURE);
        w.write_u8(self.version);
        w.write_u8(0); // free-space storage version
        w.write_u8(0); // root group symbol-table entry version
        w.write_u8(0); // reserved
        w.write_u8(0); // shared header message format version
        w.write_u8(self.offset_size);
        w.write_u8(self.length_size);
        w.write_u8(0); // reserved
        w.write_u16(group_leaf_k);
        w.write_u16(group_internal_k);
        w.write_u32(self.file_consistency_flags);
        if self.version == 1 {
            w.write_u16(indexed_storage_k);
            w.write_u16(0);
        }
        w.write_address(self.base_address, self.offset_size);
        w.write_address(free_space_address, self.offset_size);
        w.write_address(eof, self.offset_size);
        w.write_address(driver_info_address, self.offset_size);
        root_entry.write(&mut w, self);
        Ok(w.finish())
    }

    fn encode_compact(&self, eof: u64) -> Vec<u8> {
        let SuperblockLayout::Compact { extension_address } = self.layout else {
            unreachable!()
        };

        let mut w = ByteWriter::with_capacity(48);
        w.write_bytes(&SUPERBLOCK_SIGNATURE);
        w.write_u8(self.version);
        w.write_u8(self.offset_size);
        w.write_u8(self.length_size);
        w.write_u8(self.file_consistency_flags as u8);
        w.write_address(self.base_address, self.offset_size);
        w.write_address(extension_address, self.offset_size);
        w.write_address(eof, self.offset_size);
        w.write_address(self.root_header_address, self.offset_size);
        let checksum = metadata_checksum(w.as_slice());
        w.write_u32(checksum);
        w.finish()
    }

    fn encode_v4(&self, eof: u64) -> Result<Vec<u8>> {
        let SuperblockLayout::Checksummed {
            extension_address,
            checksum_algorithm: algorithm,
        } = self.layout
        else {
            unreachable!()
        };

        if extension_address == 0 || extension_address == UNDEF_ADDRESS {
            return Err(FormatError::InvalidAddress(
                "superblock v4 requires a superblock extension",
            ));
        }

        let mut w = ByteWriter::with_capacity(52);
        w.write_bytes(&SUPERBLOCK_SIGNATURE);
        w.write_u8(4);
        w.write_u8(self.offset_size);
        w.write_u8(self.length_size);
        w.write_u8(self.file_consistency_flags as u8);
        w.write_u8(algorithm);
        w.write_zeros(3);
        w.write_address(self.base_address, self.offset_size);
        w.write_address(extension_address, self.offset_size);
        w.write_address(eof, self.offset_size);
        w.write_address(self.root_header_address, self.offset_size);
        let checksum = match algorithm {
            checksum_algorithm::CRC32 => crc32(w.as_slice()),
            checksum_algorithm::FLETCHER32 => fletcher32(w.as_slice()),
            _ => return Err(FormatError::Unsupported("superblock v4 checksum algorithm")),
        };
        w.write_u32(checksum);
        Ok(w.finish())
    }
}
