//! File handle: superblock discovery and object access
//!
//! Opening scans the candidate superblock offsets (0, 512, 1024, ...,
//! allowing for a user block), decodes the anchor and keeps it immutable
//! for the lifetime of the handle.

use h5f_core::constants::SUPERBLOCK_SIGNATURE;
use h5f_core::superblock::candidate_offsets;
use h5f_core::{FormatError, ObjectHeader, Superblock};

use crate::backend::ByteSource;
use crate::error::Result;
use crate::object::{self, ObjectKind};

pub struct Hdf5File<B: ByteSource> {
    backend: B,
    superblock: Superblock,
    superblock_offset: u64,
}

impl<B: ByteSource> Hdf5File<B> {
    /// Locate and decode the superblock, failing with `NotAnHdf5File`
    /// when no candidate offset carries the signature.
    pub fn open(mut backend: B) -> Result<Self> {
        let size = backend.size()?;
        for offset in candidate_offsets() {
            if offset + SUPERBLOCK_SIGNATURE.len() as u64 > size {
                break;
            }
            let mut signature = [0u8; 8];
            backend.read_at(offset, &mut signature)?;
            if signature != SUPERBLOCK_SIGNATURE {
                continue;
            }
            // Large enough for any version at any declared width.
            let block_len = (size - offset).min(256) as usize;
            let block = backend.read_vec(offset, block_len)?;
            let superblock = Superblock::parse(&block)?;
            return Ok(Self {
                backend,
                superblock,
                superblock_offset: offset,
            });
        }
        Err(FormatError::NotAnHdf5File.into())
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Byte offset the superblock was found at (the user-block size).
    pub fn superblock_offset(&self) -> u64 {
        self.superblock_offset
    }

    /// The root group's object header.
    pub fn root_header(&mut self) -> Result<ObjectHeader> {
        let address = self.superblock.root_header_address;
        object::read_object_header(&mut self.backend, &self.superblock, address)
    }

    /// The object header at an arbitrary address, continuations
    /// followed.
    pub fn object_header_at(&mut self, address: u64) -> Result<ObjectHeader> {
        object::read_object_header(&mut self.backend, &self.superblock, address)
    }

    pub fn object_kind(&mut self, address: u64) -> Result<ObjectKind> {
        let header = self.object_header_at(address)?;
        Ok(object::classify(&header))
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ByteSink, MemoryBackend};
    use crate::object::ObjectKind;
    use h5f_core::constants::msg;
    use h5f_core::message::LinkInfo;
    use h5f_core::HeaderMessage;

    fn minimal_file_bytes(user_block: u64) -> MemoryBackend {
        let sb = Superblock::new_v2(user_block + 48);
        let mut root = ObjectHeader::new_v2();
        root.append_message(HeaderMessage::new(
            msg::LINK_INFO,
            LinkInfo::empty().encode(&sb).unwrap(),
        ))
        .unwrap();
        let image = root.encode().unwrap();
        let eof = user_block + 48 + image.len() as u64;

        let mut backend = MemoryBackend::new();
        backend
            .write_at(user_block, &sb.encode(eof).unwrap())
            .unwrap();
        backend.write_at(user_block + 48, &image).unwrap();
        backend
    }

    #[test]
    fn test_open_at_offset_zero() {
        let mut file = Hdf5File::open(minimal_file_bytes(0)).unwrap();
        assert_eq!(file.superblock().version, 2);
        assert_eq!(file.superblock_offset(), 0);
        let root = file.root_header().unwrap();
        assert_eq!(object::classify(&root), ObjectKind::Group);
        assert_eq!(root.messages.len(), 1);
    }

    #[test]
    fn test_open_behind_user_block() {
        for user_block in [512u64, 2048] {
            let mut file = Hdf5File::open(minimal_file_bytes(user_block)).unwrap();
            assert_eq!(file.superblock_offset(), user_block);
            assert!(file.root_header().is_ok());
        }
    }

    #[test]
    fn test_not_an_hdf5_file() {
        let backend = MemoryBackend::from_vec(vec![0u8; 4096]);
        assert!(matches!(
            Hdf5File::open(backend),
            Err(crate::Error::Format(FormatError::NotAnHdf5File))
        ));
    }

    #[test]
    fn test_signature_not_at_candidate_offset_is_ignored() {
        let mut backend = MemoryBackend::from_vec(vec![0u8; 4096]);
        backend.write_at(100, &SUPERBLOCK_SIGNATURE).unwrap();
        assert!(matches!(
            Hdf5File::open(backend),
            Err(crate::Error::Format(FormatError::NotAnHdf5File))
        ));
    }
}
