//! Fill value message codec (types 0x04 and 0x05)
//!
//! Parsed so dataset headers iterate cleanly; this engine never writes
//! fill values, so there is no encoder.

use alloc::vec::Vec;

use crate::codec::ByteReader;
use crate::error::{FormatError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillValue {
    pub version: u8,
    pub space_allocation_time: u8,
    pub write_time: u8,
    pub defined: bool,
    pub value: Option<Vec<u8>>,
}

impl FillValue {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, "fill value message");
        let version = r.read_u8()?;
        match version {
            1 | 2 => {
                let space_allocation_time = r.read_u8()?;
                let write_time = r.read_u8()?;
                let defined = r.read_u8()? != 0;
                let value = if version == 1 || defined {
                    let size = r.read_u32()? as usize;
                    Some(r.take(size)?.to_vec())
                } else {
                    None
                };
                Ok(Self {
                    version,
                    space_allocation_time,
                    write_time,
                    defined,
                    value,
                })
            }
            3 => {
                let flags = r.read_u8()?;
                let defined = flags & 0x20 != 0;
                let value = if defined {
                    let size = r.read_u32()? as usize;
                    Some(r.take(size)?.to_vec())
                } else {
                    None
                };
                Ok(Self {
                    version,
                    space_allocation_time: flags & 0x3,
                    write_time: (flags >> 2) & 0x3,
                    defined,
                    value,
                })
            }
            _ => Err(FormatError::UnsupportedVersion {
                structure: "fill value",
                version,
            }),
        }
    }

    /// The old fill value message (type 0x04): just a size and bytes.
    pub fn parse_old(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, "old fill value message");
        let size = r.read_u32()? as usize;
        let value = r.take(size)?.to_vec();
        Ok(Self {
            version: 0,
            space_allocation_time: 0,
            write_time: 0,
            defined: !value.is_empty(),
            value: Some(value),
        })
    }
}
