//! Global heap access with per-collection caching
//!
//! Variable-length data references all funnel through here: the cache
//! reads a `GCOL` collection once per address and serves object lookups
//! from the decoded form. Collections are read-only.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::{FormatError, GlobalHeapCollection, Superblock, VlenRef};

use crate::backend::ByteSource;
use crate::error::Result;

#[derive(Default)]
pub struct GlobalHeapCache {
    collections: HashMap<u64, GlobalHeapCollection>,
}

impl GlobalHeapCache {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// The bytes of the object a variable-length reference points at.
    pub fn object<B: ByteSource>(
        &mut self,
        source: &mut B,
        sb: &Superblock,
        reference: &VlenRef,
    ) -> Result<&[u8]> {
        let collection = self.collection(source, sb, reference.collection_address)?;
        if reference.object_index > u16::MAX as u32 {
            return Err(FormatError::FieldOutOfRange("global heap object index").into());
        }
        Ok(collection.object(reference.object_index as u16)?)
    }

    fn collection<B: ByteSource>(
        &mut self,
        source: &mut B,
        sb: &Superblock,
        address: u64,
    ) -> Result<&GlobalHeapCollection> {
        if address == UNDEF_ADDRESS {
            return Err(
                FormatError::InvalidAddress("global heap collection address is undefined").into(),
            );
        }
        match self.collections.entry(address) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                // The declared collection size sits right after the
                // 8-byte prefix; read it first, then the whole image.
                let prefix_len = 8 + sb.length_size as usize;
                let prefix = {
                    let mut buf = vec![0u8; prefix_len];
                    source.read_at(address, &mut buf)?;
                    buf
                };
                let mut size = 0u64;
                for (i, byte) in prefix[8..].iter().enumerate() {
                    size |= (*byte as u64) << (8 * i);
                }
                let image = source.read_vec(address, size as usize)?;
                let collection = GlobalHeapCollection::parse(&image, sb)?;
                Ok(entry.insert(collection))
            }
        }
    }
}
