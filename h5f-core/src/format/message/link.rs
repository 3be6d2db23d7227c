//! Link and Link Info message codecs (types 0x06 and 0x02)
//!
//! A Link message names one member of a group; its flags gate every
//! optional field. Link Info mirrors Attribute Info for dense link
//! storage and is the one message even an empty root group carries.

use alloc::string::String;
use alloc::vec::Vec;

use crate::codec::{ByteReader, ByteWriter, UNDEF_ADDRESS};
use crate::error::{FormatError, Result};
use crate::format::superblock::Superblock;

/// Type-specific payload of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkValue {
    Hard { address: u64 },
    Soft { target: String },
    External { file: String, path: String },
}

impl LinkValue {
    const fn type_code(&self) -> u8 {
        match self {
            LinkValue::Hard { .. } => 0,
            LinkValue::Soft { .. } => 1,
            LinkValue::External { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub creation_order: Option<u64>,
    pub charset: Option<u8>,
    pub name: String,
    pub value: LinkValue,
}

const FLAG_CREATION_ORDER: u8 = 0x04;
const FLAG_CHARSET: u8 = 0x08;
const FLAG_LINK_TYPE: u8 = 0x10;

impl Link {
    pub fn hard(name: &str, address: u64) -> Self {
        Self {
            creation_order: None,
            charset: None,
            name: String::from(name),
            value: LinkValue::Hard { address },
        }
    }

    pub fn parse(body: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(body, "link message");
        let version = r.read_u8()?;
        if version != 1 {
            return Err(FormatError::UnsupportedVersion {
                structure: "link",
                version,
            });
        }
        let flags = r.read_u8()?;
        let name_len_width = 1u8 << (flags & 0x3);

        let link_type = if flags & FLAG_LINK_TYPE != 0 {
            r.read_u8()?
        } else {
            0 // hard link when the field is absent
        };
        let creation_order = if flags & FLAG_CREATION_ORDER != 0 {
            Some(r.read_u64()?)
        } else {
            None
        };
        let charset = if flags & FLAG_CHARSET != 0 {
            Some(r.read_u8()?)
        } else {
            None
        };

        let name_len = r.read_uint(name_len_width)? as usize;
        let name = String::from_utf8(r.take(name_len)?.to_vec())
            .map_err(|_| FormatError::FieldOutOfRange("link name encoding"))?;

        let value = match link_type {
            0 => LinkValue::Hard {
                address: r.read_address(sb.offset_size)?,
            },
            1 => {
                let len = r.read_u16()? as usize;
                let target = String::from_utf8(r.take(len)?.to_vec())
                    .map_err(|_| FormatError::FieldOutOfRange("soft link target encoding"))?;
                LinkValue::Soft { target }
            }
            2 => {
                let len = r.read_u16()? as usize;
                let raw = r.take(len)?;
                let mut v = ByteReader::new(raw, "external link value");
                let file = String::from_utf8(v.read_cstr()?.to_vec())
                    .map_err(|_| FormatError::FieldOutOfRange("external link file encoding"))?;
                let mut path_bytes = v.rest();
                if let [head @ .., 0] = path_bytes {
                    path_bytes = head;
                }
                let path = String::from_utf8(path_bytes.to_vec())
                    .map_err(|_| FormatError::FieldOutOfRange("external link path encoding"))?;
                LinkValue::External { file, path }
            }
            _ => return Err(FormatError::FieldOutOfRange("link type")),
        };

        Ok(Self {
            creation_order,
            charset,
            name,
            value,
        })
    }

    pub fn encode(&self, sb: &Superblock) -> Result<Vec<u8>> {
        let name_len = self.name.len() as u64;
        let name_len_width = match crate::codec::compute_offset_size(name_len) {
            1 => 1u8,
            2 => 2,
            3 | 4 => 4,
            _ => 8,
        };

        let mut flags = name_len_width.trailing_zeros() as u8 | FLAG_LINK_TYPE;
        if self.creation_order.is_some() {
            flags |= FLAG_CREATION_ORDER;
        }
        if self.charset.is_some() {
            flags |= FLAG_CHARSET;
        }

        let mut w = ByteWriter::new();
        w.write_u8(1);
        w.write_u8(flags);
        w.write_u8(self.value.type_code());
        if let Some(order) = self.creation_order {
            w.write_u64(order);
        }
        if let Some(charset) = self.charset {
            w.write_u8(charset);
        }
        w.write_uint(name_len, name_len_width);
        w.write_bytes(self.name.as_bytes());

        match &self.value {
            LinkValue::Hard { address } => {
                w.write_address(*address, sb.offset_size);
            }
            LinkValue::Soft { target } => {
                if target.len() > u16::MAX as usize {
                    return Err(FormatError::FieldOutOfRange("soft link target length"));
                }
                w.write_u16(target.len() as u16);
                w.write_bytes(target.as_bytes());
            }
            LinkValue::External { file, path } => {
                let len = file.len() + 1 + path.len() + 1;
                if len > u16::MAX as usize {
                    return Err(FormatError::FieldOutOfRange("external link value length"));
                }
                w.write_u16(len as u16);
                w.write_cstr(file);
                w.write_cstr(path);
            }
        }
        Ok(w.finish())
    }
}

/// Link Info message (type 0x02).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    pub version: u8,
    /// Bit 0: creation order tracked; bit 1: creation order indexed
    pub flags: u8,
    pub max_creation_order: Option<i64>,
    pub fractal_heap_address: u64,
    pub name_index_address: u64,
    pub creation_order_index_address: Option<u64>,
}

impl LinkInfo {
    /// The empty, compact-storage link info written into new groups.
    pub fn empty() -> Self {
        Self {
            version: 0,
            flags: 0,
            max_creation_order: None,
            fractal_heap_address: UNDEF_ADDRESS,
            name_index_address: UNDEF_ADDRESS,
            creation_order_index_address: None,
        }
    }

    pub fn parse(body: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(body, "link info message");
        let version = r.read_u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "link info",
                version,
            });
        }
        let flags = r.read_u8()?;
        if flags & !0x3 != 0 {
            return Err(FormatError::FieldOutOfRange("link info reserved flags"));
        }
        let max_creation_order = if flags & 0x1 != 0 {
            let raw = r.read_u64()? as i64;
            if raw < 0 {
                return Err(FormatError::FieldOutOfRange("link info max creation order"));
            }
            Some(raw)
        } else {
            None
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
            max_creation_order,
            fractal_heap_address,
            name_index_address,
            creation_order_index_address,
        })
    }

    pub fn encode(&self, sb: &Superblock) -> Result<Vec<u8>> {
        if let Some(order) = self.max_creation_order {
            if order < 0 {
                return Err(FormatError::FieldOutOfRange("link info max creation order"));
            }
        }
        if self.flags & 0x1 != 0 && self.max_creation_order.is_none() {
            return Err(FormatError::Inconsistent(
                "link info tracks creation order but lacks the maximum",
            ));
        }

        let mut w = ByteWriter::new();
        w.write_u8(self.version);
        w.write_u8(self.flags);
        if self.flags & 0x1 != 0 {
            w.write_u64(self.max_creation_order.unwrap_or(0) as u64);
        }
        w.write_address(self.fractal_heap_address, sb.offset_size);
        w.write_address(self.name_index_address, sb.offset_size);
        if self.flags & 0x2 != 0 {
            w.write_address(
                self.creation_order_index_address.unwrap_or(UNDEF_ADDRESS),
                sb.offset_size,
            );
        }
        Ok(w.finish())
    }
}
