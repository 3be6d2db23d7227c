//! Data layout message codec (type 0x08)
//!
//! Version 3 stores the layout class and class-specific fields; version 4
//! keeps the same field order for the classes supported here and is
//! parsed by the same path. In the chunked form the B-tree address
//! precedes the chunk dimensions.

use alloc::vec::Vec;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::superblock::Superblock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw bytes stored inline in the message body
    Compact { data: Vec<u8> },
    /// A single byte range in the file
    Contiguous { address: u64, size: u64 },
    /// Tiles indexed by a B-tree v1; dimensions as stored on disk
    /// (writers commonly append a trailing element-size dimension)
    Chunked {
        btree_address: u64,
        chunk_dims: Vec<u32>,
    },
}

impl DataLayout {
    pub fn parse(body: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(body, "data layout message");
        let version = r.read_u8()?;
        if version != 3 && version != 4 {
            return Err(FormatError::UnsupportedVersion {
                structure: "data layout",
                version,
            });
        }
        match r.read_u8()? {
            0 => {
                let size = r.read_u16()? as usize;
                Ok(DataLayout::Compact {
                    data: r.take(size)?.to_vec(),
                })
            }
            1 => {
                let address = r.read_address(sb.offset_size)?;
                let size = r.read_uint(sb.length_size)?;
                Ok(DataLayout::Contiguous { address, size })
            }
            2 => {
                let dimensionality = r.read_u8()? as usize;
                let btree_address = r.read_address(sb.offset_size)?;
                let mut chunk_dims = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    chunk_dims.push(r.read_u32()?);
                }
                Ok(DataLayout::Chunked {
                    btree_address,
                    chunk_dims,
                })
            }
            3 => Err(FormatError::Unsupported("virtual data layout")),
            _ => Err(FormatError::FieldOutOfRange("data layout class")),
        }
    }

    /// Encode in the version-3 layout. Compact layouts are written with
    /// their inline bytes; chunked layouts reject dimensionalities that
    /// do not fit the on-disk fields.
    pub fn encode(&self, sb: &Superblock) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        w.write_u8(3);
        match self {
            DataLayout::Compact { data } => {
                if data.len() > u16::MAX as usize {
                    return Err(FormatError::FieldOutOfRange("compact layout size"));
                }
                w.write_u8(0);
                w.write_u16(data.len() as u16);
                w.write_bytes(data);
            }
            DataLayout::Contiguous { address, size } => {
                w.write_u8(1);
                w.write_address(*address, sb.offset_size);
                w.write_uint(*size, sb.length_size);
            }
            DataLayout::Chunked {
                btree_address,
                chunk_dims,
            } => {
                if chunk_dims.len() > 255 {
                    return Err(FormatError::FieldOutOfRange("chunked layout dimensionality"));
                }
                w.write_u8(2);
                w.write_u8(chunk_dims.len() as u8);
                w.write_address(*btree_address, sb.offset_size);
                for dim in chunk_dims {
                    w.write_u32(*dim);
                }
            }
        }
        Ok(w.finish())
    }
}
