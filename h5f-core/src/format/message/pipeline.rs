//! Filter pipeline message codec (type 0x0B)
//!
//! The pipeline records the transformations applied to each chunk on
//! write, in application order. Version 1 pads filter names and odd
//! client-data runs to 8 bytes; version 2 drops the names and padding.

use alloc::string::String;
use alloc::vec::Vec;

use crate::codec::{pad8, ByteReader, ByteWriter};
use crate::error::{FormatError, Result};

/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterDescription {
    pub id: u16,
    /// Bit 0: the filter is optional and may be skipped on failure
    pub flags: u16,
    /// Version 1 only; empty for version 2 pipelines
    pub name: String,
    pub client_data: Vec<u32>,
}

impl FilterDescription {
    pub fn new(id: u16, flags: u16, client_data: Vec<u32>) -> Self {
        Self {
            id,
            flags,
            name: String::new(),
            client_data,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.flags & 0x1 != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterPipeline {
    pub version: u8,
    pub filters: Vec<FilterDescription>,
}

impl FilterPipeline {
    pub fn new_v2(filters: Vec<FilterDescription>) -> Self {
        Self {
            version: 2,
            filters,
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, "filter pipeline message");
        let version = r.read_u8()?;
        if version != 1 && version != 2 {
            return Err(FormatError::UnsupportedVersion {
                structure: "filter pipeline",
                version,
            });
        }
        let count = r.read_u8()? as usize;
        if version == 1 {
            r.skip(6)?; // reserved
        }

        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let id = r.read_u16()?;
            let name_len = if version == 1 { r.read_u16()? as usize } else { 0 };
            let flags = r.read_u16()?;
            let client_count = r.read_u16()? as usize;
            let name = if name_len > 0 {
                let raw = r.take(name_len)?;
                let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                String::from_utf8(raw[..end].to_vec())
                    .map_err(|_| FormatError::FieldOutOfRange("filter name encoding"))?
            } else {
                String::new()
            };
            let mut client_data = Vec::with_capacity(client_count);
            for _ in 0..client_count {
                client_data.push(r.read_u32()?);
            }
            if version == 1 && client_count % 2 == 1 {
                r.skip(4)?; // pad client data to 8 bytes
            }
            filters.push(FilterDescription {
                id,
                flags,
                name,
                client_data,
            });
        }

        Ok(Self { version, filters })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.version != 1 && self.version != 2 {
            return Err(FormatError::UnsupportedVersion {
                structure: "filter pipeline",
                version: self.version,
            });
        }
        if self.filters.len() > u8::MAX as usize {
            return Err(FormatError::FieldOutOfRange("filter pipeline length"));
        }

        let mut w = ByteWriter::new();
        w.write_u8(self.version);
        w.write_u8(self.filters.len() as u8);
        if self.version == 1 {
            w.write_zeros(6);
        }
        for filter in &self.filters {
            w.write_u16(filter.id);
            if self.version == 1 {
                let name_len = if filter.name.is_empty() {
                    0
                } else {
                    pad8(filter.name.len() + 1)
                };
                w.write_u16(name_len as u16);
                w.write_u16(filter.flags);
                w.write_u16(filter.client_data.len() as u16);
                if name_len > 0 {
                    w.write_bytes(filter.name.as_bytes());
                    w.write_zeros(name_len - filter.name.len());
                }
            } else {
                w.write_u16(filter.flags);
                w.write_u16(filter.client_data.len() as u16);
            }
            for value in &filter.client_data {
                w.write_u32(*value);
            }
            if self.version == 1 && filter.client_data.len() % 2 == 1 {
                w.write_zeros(4);
            }
        }
        Ok(w.finish())
    }
}
