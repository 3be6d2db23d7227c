//! File writer orchestration
//!
//! Composes the core encoders over a byte sink: a minimal file is a v2
//! superblock at offset 0 and a root group object header (one empty
//! Link Info message) at offset 48. Attribute appends are read-modify-
//! write of the root header, which sits at the tail of a minimal file
//! and may grow there; the superblock is rewritten with the new
//! end-of-file address after every mutation.

use h5f_core::constants::msg;
use h5f_core::message::{Attribute, LinkInfo};
use h5f_core::{FormatError, HeaderMessage, ObjectHeader, Superblock};

use crate::attr;
use crate::backend::{ByteSink, ByteSource};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::object::read_object_header;

/// Address the root group's object header is written at.
pub const ROOT_HEADER_ADDRESS: u64 = 48;

pub struct FileWriter<B: ByteSource + ByteSink> {
    backend: B,
    superblock: Superblock,
    config: EngineConfig,
}

impl<B: ByteSource + ByteSink> FileWriter<B> {
    /// Write a fresh minimal file: superblock plus an empty root group.
    pub fn create(mut backend: B, config: EngineConfig) -> Result<Self> {
        if config.link_storage == crate::config::LinkStorage::Dense {
            return Err(FormatError::Unsupported(
                "dense link storage for new groups",
            )
            .into());
        }
        let superblock = Superblock::new_v2(ROOT_HEADER_ADDRESS);

        let mut root = match config.object_header_version {
            1 => ObjectHeader::new_v1(),
            2 => ObjectHeader::new_v2(),
            _ => {
                return Err(FormatError::FieldOutOfRange(
                    "configured object header version",
                )
                .into())
            }
        };
        root.append_message(HeaderMessage::new(
            msg::LINK_INFO,
            LinkInfo::empty().encode(&superblock)?,
        ))?;

        let image = root.encode()?;
        let eof = ROOT_HEADER_ADDRESS + image.len() as u64;
        backend.write_at(0, &superblock.encode(eof)?)?;
        backend.write_at(ROOT_HEADER_ADDRESS, &image)?;

        let mut superblock = superblock;
        superblock.end_of_file_address = eof;
        Ok(Self {
            backend,
            superblock,
            config,
        })
    }

    /// Reopen an existing file for mutation.
    pub fn open(mut backend: B, config: EngineConfig) -> Result<Self> {
        let size = backend.size()?;
        let block = backend.read_vec(0, size.min(256) as usize)?;
        let superblock = Superblock::parse(&block)?;
        Ok(Self {
            backend,
            superblock,
            config,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Append a compact attribute to the root group, failing when
    /// chunk 0 can no longer hold the message.
    pub fn add_root_attribute(&mut self, attribute: &Attribute) -> Result<()> {
        let address = self.superblock.root_header_address;
        let mut header = read_object_header(&mut self.backend, &self.superblock, address)?;
        let old_len = header.encode()?.len() as u64;
        header.append_message(HeaderMessage::new(msg::ATTRIBUTE, attribute.encode()?))?;

        let image = header.encode()?;
        let end = address + image.len() as u64;
        // Growth is only safe while the header is the file's tail.
        if image.len() as u64 > old_len
            && address + old_len != self.superblock.end_of_file_address
        {
            return Err(FormatError::CapacityExceeded(
                "object header cannot grow past other data",
            )
            .into());
        }

        self.backend.write_at(address, &image)?;
        if end > self.superblock.end_of_file_address {
            self.superblock.end_of_file_address = end;
            let encoded = self.superblock.encode(end)?;
            self.backend.write_at(0, &encoded)?;
        }
        Ok(())
    }

    /// Replace a compact attribute on the root group.
    pub fn modify_root_attribute(&mut self, attribute: &Attribute) -> Result<()> {
        attr::modify_compact_attribute(
            &mut self.backend,
            &self.superblock,
            self.superblock.root_header_address,
            attribute,
        )
    }

    /// Remove a compact attribute from the root group.
    pub fn delete_root_attribute(&mut self, name: &str) -> Result<()> {
        attr::delete_compact_attribute(
            &mut self.backend,
            &self.superblock,
            self.superblock.root_header_address,
            name,
        )
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
    use crate::attr::read_attributes;
    use crate::backend::MemoryBackend;
    use crate::dataset::DataValue;
    use crate::file::Hdf5File;
    use crate::gheap::GlobalHeapCache;
    use crate::object::{classify, ObjectKind};
    use h5f_core::message::{Dataspace, Datatype, Message};

    #[test]
    fn test_minimal_root_group_bytes() {
        let writer = FileWriter::create(MemoryBackend::new(), EngineConfig::default()).unwrap();
        let bytes = writer.into_backend().into_inner();

        // Superblock then the 29-byte root header image at 48.
        assert_eq!(bytes.len(), 48 + 29);
        let image = &bytes[48..];
        assert_eq!(&image[0..4], b"OHDR");
        assert_eq!(image[4], 2);
        assert_eq!(image[5], 0);
        assert_eq!(image[6], 22);
        assert_eq!(image[7], 2);
        assert_eq!(u16::from_le_bytes([image[8], image[9]]), 18);
        assert_eq!(image[10], 0);
    }

    #[test]
    fn test_minimal_file_reads_back() {
        let writer = FileWriter::create(MemoryBackend::new(), EngineConfig::default()).unwrap();
        let mut file = Hdf5File::open(writer.into_backend()).unwrap();
        assert_eq!(file.superblock().version, 2);
        assert_eq!(file.superblock().root_header_address, 48);
        assert_eq!(file.superblock().end_of_file_address, 48 + 29);

        let root = file.root_header().unwrap();
        assert_eq!(root.version, 2);
        assert_eq!(classify(&root), ObjectKind::Group);
        assert_eq!(root.messages.len(), 1);
        assert!(matches!(
            root.messages[0].decode(file.superblock()).unwrap(),
            Message::LinkInfo(info) if info == LinkInfo::empty()
        ));
    }

    #[test]
    fn test_dense_link_storage_rejected() {
        let config = EngineConfig {
            link_storage: crate::config::LinkStorage::Dense,
            ..Default::default()
        };
        assert!(matches!(
            FileWriter::create(MemoryBackend::new(), config),
            Err(crate::Error::Format(FormatError::Unsupported(_)))
        ));
    }

    #[test]
    fn test_v1_root_header_configuration() {
        let config = EngineConfig {
            object_header_version: 1,
            ..Default::default()
        };
        let writer = FileWriter::create(MemoryBackend::new(), config).unwrap();
        let mut file = Hdf5File::open(writer.into_backend()).unwrap();
        let root = file.root_header().unwrap();
        assert_eq!(root.version, 1);
        assert_eq!(classify(&root), ObjectKind::Group);
    }

    #[test]
    fn test_attribute_append_then_read_value() {
        let mut writer =
            FileWriter::create(MemoryBackend::new(), EngineConfig::default()).unwrap();
        let attribute = Attribute::new(
            "version",
            Datatype::int32(),
            Dataspace::simple(vec![1]),
            vec![0x2A, 0, 0, 0],
        );
        writer.add_root_attribute(&attribute).unwrap();

        let mut file = Hdf5File::open(writer.into_backend()).unwrap();
        let sb = file.superblock().clone();
        let root = file.root_header().unwrap();
        let attrs = read_attributes(file.backend_mut(), &sb, &root).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0], attribute);

        let mut gheap = GlobalHeapCache::new();
        let values =
            attr::attribute_values(&attrs[0], &sb, file.backend_mut(), &mut gheap).unwrap();
        assert_eq!(values, vec![DataValue::Int(42)]);
    }

    #[test]
    fn test_modify_and_delete_through_writer() {
        let mut writer =
            FileWriter::create(MemoryBackend::new(), EngineConfig::default()).unwrap();
        let original = Attribute::new(
            "counter",
            Datatype::int32(),
            Dataspace::simple(vec![1]),
            vec![1, 0, 0, 0],
        );
        writer.add_root_attribute(&original).unwrap();

        let replacement = Attribute::new(
            "counter",
            Datatype::int32(),
            Dataspace::simple(vec![1]),
            vec![2, 0, 0, 0],
        );
        writer.modify_root_attribute(&replacement).unwrap();

        let sb = writer.superblock().clone();
        let root = read_object_header(writer.backend_mut(), &sb, 48).unwrap();
        let attrs = read_attributes(writer.backend_mut(), &sb, &root).unwrap();
        assert_eq!(attrs, vec![replacement]);

        writer.delete_root_attribute("counter").unwrap();
        let root = read_object_header(writer.backend_mut(), &sb, 48).unwrap();
        let attrs = read_attributes(writer.backend_mut(), &sb, &root).unwrap();
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_reopen_existing_file() {
        let mut writer =
            FileWriter::create(MemoryBackend::new(), EngineConfig::default()).unwrap();
        let first = Attribute::new(
            "a",
            Datatype::int32(),
            Dataspace::simple(vec![1]),
            vec![1, 0, 0, 0],
        );
        writer.add_root_attribute(&first).unwrap();
        let backend = writer.into_backend();

        let mut writer = FileWriter::open(backend, EngineConfig::default()).unwrap();
        let second = Attribute::new(
            "b",
            Datatype::int32(),
            Dataspace::simple(vec![1]),
            vec![2, 0, 0, 0],
        );
        writer.add_root_attribute(&second).unwrap();

        let mut file = Hdf5File::open(writer.into_backend()).unwrap();
        let sb = file.superblock().clone();
        let root = file.root_header().unwrap();
        let attrs = read_attributes(file.backend_mut(), &sb, &root).unwrap();
        assert_eq!(attrs, vec![first, second]);
    }

    #[test]
    fn test_append_fills_chunk_zero_then_fails() {
        let mut writer =
            FileWriter::create(MemoryBackend::new(), EngineConfig::default()).unwrap();
        // The 1-byte chunk-0 size field caps the message region at 255
        // bytes; keep appending until the capacity error surfaces.
        let mut appended = 0;
        loop {
            let attribute = Attribute::new(
                &format!("attr{appended}"),
                Datatype::int32(),
                Dataspace::simple(vec![1]),
                vec![0; 4],
            );
            match writer.add_root_attribute(&attribute) {
                Ok(()) => appended += 1,
                Err(crate::Error::Format(FormatError::CapacityExceeded(_))) => break,
                Err(other) => panic!("unexpected error {other}"),
            }
            assert!(appended < 16, "capacity error never surfaced");
        }
        assert!(appended >= 1);
    }
}
