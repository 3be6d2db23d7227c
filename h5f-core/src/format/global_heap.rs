//! Global heap codec (`GCOL`)
//!
//! Global heap collections pool variable-length payloads (most often
//! vlen strings). Objects are 8-byte aligned, keyed by a small per-
//! collection id; id 0 marks the free space at the tail and never names
//! an object. Dataset bytes refer into a collection with a
//! {collection address, object index} pair.

use alloc::vec::Vec;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::constants::GLOBAL_HEAP_SIGNATURE;
use crate::format::superblock::Superblock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeapObject {
    pub id: u16,
    pub reference_count: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeapCollection {
    pub version: u8,
    /// Declared collection size in bytes, header included
    pub collection_size: u64,
    pub objects: Vec<GlobalHeapObject>,
}

impl GlobalHeapCollection {
    pub fn parse(buf: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(buf, "global heap collection");
        r.expect_signature(&GLOBAL_HEAP_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 1 {
            return Err(FormatError::UnsupportedVersion {
                structure: "global heap collection",
                version,
            });
        }
        r.skip(3)?; // reserved
        let collection_size = r.read_uint(sb.length_size)?;
        if collection_size as usize > buf.len() {
            return Err(FormatError::Truncated("global heap collection"));
        }

        let mut objects = Vec::new();
        // Walk objects until the free-space sentinel or the declared end.
        let object_header_len = 8 + sb.length_size as usize;
        while (r.position() + object_header_len) as u64 <= collection_size {
            let id = r.read_u16()?;
            let reference_count = r.read_u16()?;
            r.skip(4)?; // reserved
            let size = r.read_uint(sb.length_size)? as usize;
            if id == 0 {
                break;
            }
            let data = r.take(size)?.to_vec();
            // Payloads pad each object out to an 8-byte boundary.
            let pad = ((8 - r.position() % 8) % 8).min(r.remaining());
            r.skip(pad)?;
            objects.push(GlobalHeapObject {
                id,
                reference_count,
                data,
            });
        }

        Ok(Self {
            version,
            collection_size,
            objects,
        })
    }

    /// The payload stored under object id `index`. Id 0 is the free
    /// space sentinel and never resolves.
    pub fn object(&self, index: u16) -> Result<&[u8]> {
        if index == 0 {
            return Err(FormatError::FieldOutOfRange(
                "global heap object id 0 is the free-space sentinel",
            ));
        }
        self.objects
            .iter()
            .find(|o| o.id == index)
            .map(|o| o.data.as_slice())
            .ok_or(FormatError::NotFound("global heap object"))
    }

    /// Encode a collection of the given total size, ending with the
    /// free-space sentinel.
    pub fn encode(&self, sb: &Superblock) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        w.write_bytes(&GLOBAL_HEAP_SIGNATURE);
        w.write_u8(1);
        w.write_zeros(3);
        w.write_uint(self.collection_size, sb.length_size);
        for object in &self.objects {
            if object.id == 0 {
                return Err(FormatError::FieldOutOfRange(
                    "global heap object id 0 is reserved",
                ));
            }
            w.write_u16(object.id);
            w.write_u16(object.reference_count);
            w.write_zeros(4);
            w.write_uint(object.data.len() as u64, sb.length_size);
            w.write_bytes(&object.data);
            w.pad_to_multiple(8);
        }
        if (w.len() + 8 + sb.length_size as usize) as u64 <= self.collection_size {
            // Free-space sentinel occupying the remainder.
            let remaining = self.collection_size - w.len() as u64;
            w.write_u16(0);
            w.write_u16(0);
            w.write_zeros(4);
            w.write_uint(remaining, sb.length_size);
        }
        if w.len() as u64 > self.collection_size {
            return Err(FormatError::CapacityExceeded("global heap collection size"));
        }
        let shortfall = self.collection_size as usize - w.len();
        w.write_zeros(shortfall);
        Ok(w.finish())
    }
}

/// A variable-length datum reference as stored in dataset bytes:
/// the collection's file address plus the object index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlenRef {
    pub collection_address: u64,
    pub object_index: u32,
}

impl VlenRef {
    /// Stored size: one file address plus a 4-byte index.
    pub fn encoded_size(sb: &Superblock) -> usize {
        sb.offset_size as usize + 4
    }

    pub fn parse(bytes: &[u8], sb: &Superblock) -> Result<Self> {
        let mut r = ByteReader::new(bytes, "variable-length reference");
        let collection_address = r.read_address(sb.offset_size)?;
        let object_index = r.read_u32()?;
        Ok(Self {
            collection_address,
            object_index,
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

    fn collection(objects: Vec<GlobalHeapObject>) -> GlobalHeapCollection {
        GlobalHeapCollection {
            version: 1,
            collection_size: 4096,
            objects,
        }
    }

    #[test]
    fn test_round_trip_and_lookup() {
        let c = collection(vec![
            GlobalHeapObject {
                id: 1,
                reference_count: 1,
                data: b"hello".to_vec(),
            },
            GlobalHeapObject {
                id: 2,
                reference_count: 3,
                data: b"a longer payload that crosses alignment".to_vec(),
            },
            GlobalHeapObject {
                id: 3,
                reference_count: 0,
                data: vec![],
            },
        ]);
        let buf = c.encode(&sb()).unwrap();
        assert_eq!(buf.len(), 4096);

        let back = GlobalHeapCollection::parse(&buf, &sb()).unwrap();
        assert_eq!(back.objects, c.objects);
        for object in &c.objects {
            assert_eq!(back.object(object.id).unwrap(), object.data.as_slice());
        }
    }

    #[test]
    fn test_id_zero_never_returned() {
        let c = collection(vec![GlobalHeapObject {
            id: 1,
            reference_count: 1,
            data: b"x".to_vec(),
        }]);
        let buf = c.encode(&sb()).unwrap();
        let back = GlobalHeapCollection::parse(&buf, &sb()).unwrap();
        assert!(matches!(
            back.object(0),
            Err(FormatError::FieldOutOfRange(_))
        ));
        assert!(matches!(back.object(9), Err(FormatError::NotFound(_))));
    }

    #[test]
    fn test_declared_size_bounds_the_walk() {
        let c = collection(vec![GlobalHeapObject {
            id: 1,
            reference_count: 1,
            data: b"abc".to_vec(),
        }]);
        let mut buf = c.encode(&sb()).unwrap();
        // Truncate below the declared collection size.
        buf.truncate(24);
        assert!(matches!(
            GlobalHeapCollection::parse(&buf, &sb()),
            Err(FormatError::Truncated(_))
        ));
    }

    #[test]
    fn test_vlen_ref_parse() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0x1400u64.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        let vr = VlenRef::parse(&bytes, &sb()).unwrap();
        assert_eq!(vr.collection_address, 0x1400);
        assert_eq!(vr.object_index, 2);
        assert_eq!(VlenRef::encoded_size(&sb()), 12);
    }
}
