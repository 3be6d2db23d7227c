//! Attribute message codec (type 0x0C)
//!
//! An attribute bundles a name, a datatype, a dataspace and the raw
//! value bytes into one message. Version 1 pads the name/datatype/
//! dataspace regions to 8 bytes; versions 2 and 3 pack them tightly and
//! version 3 adds a name-encoding byte.

use alloc::string::String;
use alloc::vec::Vec;

use crate::codec::{pad8, ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::message::dataspace::Dataspace;
use crate::format::message::datatype::{CharacterSet, Datatype};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub version: u8,
    pub name: String,
    pub name_encoding: CharacterSet,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    /// Raw value bytes, laid out per the datatype
    pub data: Vec<u8>,
}

impl Attribute {
    /// A new attribute in the version-3 layout this engine writes.
    pub fn new(name: &str, datatype: Datatype, dataspace: Dataspace, data: Vec<u8>) -> Self {
        Self {
            version: 3,
            name: String::from(name),
            name_encoding: CharacterSet::Ascii,
            datatype,
            dataspace,
            data,
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, "attribute message");
        let version = r.read_u8()?;
        if !(1..=3).contains(&version) {
            return Err(FormatError::UnsupportedVersion {
                structure: "attribute",
                version,
            });
        }
        let flags = r.read_u8()?;
        if version >= 2 && flags != 0 {
            return Err(FormatError::Unsupported("shared attribute messages"));
        }
        let name_size = r.read_u16()? as usize;
        let datatype_size = r.read_u16()? as usize;
        let dataspace_size = r.read_u16()? as usize;
        let name_encoding = if version >= 3 {
            CharacterSet::from_code(r.read_u8()?)?
        } else {
            CharacterSet::Ascii
        };

        // Version 1 pads each region to an 8-byte boundary.
        let padded = |n: usize| if version == 1 { pad8(n) } else { n };

        let name_raw = r.take(padded(name_size))?;
        let name_bytes = &name_raw[..name_size];
        let end = name_bytes.iter().position(|b| *b == 0).unwrap_or(name_size);
        let name = String::from_utf8(name_bytes[..end].to_vec())
            .map_err(|_| FormatError::FieldOutOfRange("attribute name encoding"))?;

        let datatype_raw = r.take(padded(datatype_size))?;
        let datatype = Datatype::parse(&datatype_raw[..datatype_size])?;

        let dataspace_raw = r.take(padded(dataspace_size))?;
        let dataspace = Dataspace::parse(&dataspace_raw[..dataspace_size])?;

        let data = r.rest().to_vec();

        Ok(Self {
            version,
            name,
            name_encoding,
            datatype,
            dataspace,
            data,
        })
    }

    /// Encode in the version-3 layout.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let datatype = self.datatype.encode()?;
        let dataspace = self.dataspace.encode();
        let name_size = self.name.len() + 1;
        if name_size > u16::MAX as usize
            || datatype.len() > u16::MAX as usize
            || dataspace.len() > u16::MAX as usize
        {
            return Err(FormatError::FieldOutOfRange("attribute header sizes"));
        }

        let mut w = ByteWriter::with_capacity(self.encoded_size());
        w.write_u8(3);
        w.write_u8(0);
        w.write_u16(name_size as u16);
        w.write_u16(datatype.len() as u16);
        w.write_u16(dataspace.len() as u16);
        w.write_u8(self.name_encoding.code());
        w.write_cstr(&self.name);
        w.write_bytes(&datatype);
        w.write_bytes(&dataspace);
        w.write_bytes(&self.data);

        // A mismatch here is an engine bug, not a data error.
        assert_eq!(
            w.len(),
            self.encoded_size(),
            "attribute encoder length mismatch"
        );
        Ok(w.finish())
    }

    /// Exact byte length `encode` will produce.
    pub fn encoded_size(&self) -> usize {
        9 + self.name.len()
            + 1
            + self.datatype.encoded_size()
            + self.dataspace.encoded_size()
            + self.data.len()
    }
}
