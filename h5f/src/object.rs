//! Object header reading over a byte source
//!
//! Handles both header versions, staged reads so only the header's own
//! bytes are fetched, and continuation-block following (v1 continuations
//! are raw message streams; v2 blocks are `OCHK`-framed and
//! checksummed).

use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::constants::{msg, OBJECT_HEADER_V2_SIGNATURE};
use h5f_core::{FormatError, HeaderMessage, Message, ObjectHeader, Superblock};

use crate::backend::ByteSource;
use crate::error::Result;

/// Cap on a single header block read; a v1 header with an unknown
/// message-stream length is read up to this bound.
const MAX_HEADER_BLOCK: u64 = 1 << 20;

/// Coarse classification of what an object header describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Group,
    Dataset,
    Other,
}

/// Classify a header by its messages.
pub fn classify(header: &ObjectHeader) -> ObjectKind {
    let has = |type_id| header.messages_of_type(type_id).next().is_some();
    if has(msg::SYMBOL_TABLE) || has(msg::LINK_INFO) || has(msg::LINK) {
        ObjectKind::Group
    } else if has(msg::DATA_LAYOUT) {
        ObjectKind::Dataset
    } else {
        ObjectKind::Other
    }
}

/// Read and parse the object header at `address`, following any
/// continuation blocks.
pub fn read_object_header<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    address: u64,
) -> Result<ObjectHeader> {
    if address == UNDEF_ADDRESS {
        return Err(FormatError::InvalidAddress("object header address is undefined").into());
    }

    let mut signature = [0u8; 4];
    source.read_at(address, &mut signature)?;

    let (mut header, mut outstanding) = if signature == OBJECT_HEADER_V2_SIGNATURE {
        (read_v2(source, address)?, 0)
    } else {
        read_v1(source, address)?
    };

    follow_continuations(source, sb, &mut header, &mut outstanding)?;
    if outstanding > 0 {
        return Err(FormatError::Truncated("object header v1 message stream").into());
    }
    Ok(header)
}

fn read_v2<B: ByteSource>(source: &mut B, address: u64) -> Result<ObjectHeader> {
    // Fetch the fixed prefix plus the widest optional block so the
    // chunk-0 size is decodable, then the exact image.
    let mut prefix = [0u8; 6 + 16 + 4 + 8];
    let prefix_len = (prefix.len() as u64).min(source.size()?.saturating_sub(address)) as usize;
    if prefix_len < 7 {
        return Err(FormatError::Truncated("object header v2 prefix").into());
    }
    source.read_at(address, &mut prefix[..prefix_len])?;

    let flags = prefix[5];
    let mut offset = 6usize;
    if flags & 0x20 != 0 {
        offset += 16;
    }
    if flags & 0x10 != 0 {
        offset += 4;
    }
    let size_width = 1usize << (flags & 0x3);
    if offset + size_width > prefix_len {
        return Err(FormatError::Truncated("object header v2 prefix").into());
    }
    let mut chunk0 = 0u64;
    for (i, byte) in prefix[offset..offset + size_width].iter().enumerate() {
        chunk0 |= (*byte as u64) << (8 * i);
    }

    let total = offset + size_width + chunk0 as usize;
    let image = source.read_vec(address, total)?;
    Ok(ObjectHeader::parse(&image)?)
}

fn read_v1<B: ByteSource>(source: &mut B, address: u64) -> Result<(ObjectHeader, u16)> {
    let available = source.size()?.saturating_sub(address);
    if available < 16 {
        return Err(FormatError::Truncated("object header v1").into());
    }
    // The v1 header-size field counts message headers only, so the full
    // message-stream length is unknown up front; read up to the cap and
    // let the parser stop at the declared message count.
    let block = source.read_vec(address, available.min(MAX_HEADER_BLOCK) as usize)?;
    Ok(ObjectHeader::parse_v1_partial(&block)?)
}

fn follow_continuations<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    header: &mut ObjectHeader,
    outstanding: &mut u16,
) -> Result<()> {
    let track = header.flags & 0x4 != 0;
    let mut cursor = 0usize;
    while cursor < header.messages.len() {
        let message = &header.messages[cursor];
        cursor += 1;
        if message.type_id != msg::CONTINUATION {
            continue;
        }
        let Message::Continuation { offset, length } = message.decode(sb)? else {
            continue;
        };
        if offset == UNDEF_ADDRESS {
            return Err(
                FormatError::InvalidAddress("continuation block address is undefined").into(),
            );
        }
        let block = source.read_vec(offset, length as usize)?;
        let mut more: Vec<HeaderMessage> = if header.version == 2 {
            ObjectHeader::parse_v2_continuation(&block, track)?
        } else {
            let (messages, remaining) = ObjectHeader::parse_v1_continuation(&block, *outstanding)?;
            *outstanding = remaining;
            messages
        };
        header.messages.append(&mut more);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ByteSink, MemoryBackend};
    use h5f_core::checksum::metadata_checksum;
    use h5f_core::codec::ByteWriter;
    use h5f_core::constants::CONTINUATION_V2_SIGNATURE;
    use h5f_core::message::LinkInfo;

    fn sb() -> Superblock {
        Superblock::new_v2(48)
    }

    fn minimal_group_header() -> ObjectHeader {
        let mut header = ObjectHeader::new_v2();
        header
            .append_message(HeaderMessage::new(
                msg::LINK_INFO,
                LinkInfo::empty().encode(&sb()).unwrap(),
            ))
            .unwrap();
        header
    }

    #[test]
    fn test_read_v2_at_offset() {
        let header = minimal_group_header();
        let mut backend = MemoryBackend::new();
        backend.write_at(48, &header.encode().unwrap()).unwrap();

        let back = read_object_header(&mut backend, &sb(), 48).unwrap();
        assert_eq!(back, header);
        assert_eq!(classify(&back), ObjectKind::Group);
    }

    #[test]
    fn test_read_v1() {
        let mut header = ObjectHeader::new_v1();
        header
            .append_message(HeaderMessage::new(msg::NIL, vec![1, 2, 3]))
            .unwrap();
        let mut backend = MemoryBackend::new();
        backend.write_at(96, &header.encode().unwrap()).unwrap();

        let back = read_object_header(&mut backend, &sb(), 96).unwrap();
        assert_eq!(back.messages, header.messages);
        assert_eq!(classify(&back), ObjectKind::Other);
    }

    #[test]
    fn test_undef_address_rejected() {
        let mut backend = MemoryBackend::new();
        assert!(matches!(
            read_object_header(&mut backend, &sb(), UNDEF_ADDRESS),
            Err(crate::Error::Format(FormatError::InvalidAddress(_)))
        ));
    }

    #[test]
    fn test_v2_continuation_followed() {
        // Chunk 0 holds a continuation message pointing at an OCHK block
        // with one NIL message.
        let mut block = ByteWriter::new();
        block.write_bytes(&CONTINUATION_V2_SIGNATURE);
        block.write_u8(msg::NIL as u8);
        block.write_u16(2);
        block.write_u8(0);
        block.write_bytes(&[0xAB, 0xCD]);
        let checksum = metadata_checksum(block.as_slice());
        block.write_u32(checksum);
        let block = block.finish();

        let continuation_address = 0x400u64;
        let mut body = ByteWriter::new();
        body.write_address(continuation_address, 8);
        body.write_uint(block.len() as u64, 8);

        let mut header = ObjectHeader::new_v2();
        header
            .append_message(HeaderMessage::new(msg::CONTINUATION, body.finish()))
            .unwrap();

        let mut backend = MemoryBackend::new();
        backend.write_at(48, &header.encode().unwrap()).unwrap();
        backend.write_at(continuation_address, &block).unwrap();

        let back = read_object_header(&mut backend, &sb(), 48).unwrap();
        assert_eq!(back.messages.len(), 2);
        assert_eq!(back.messages[1].type_id, msg::NIL);
        assert_eq!(back.messages[1].body, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_v1_continuation_followed() {
        // A v1 header declaring two messages, the second in a
        // continuation block.
        let mut first = ObjectHeader::new_v1();
        first
            .append_message(HeaderMessage::new(
                msg::CONTINUATION,
                {
                    let mut w = ByteWriter::new();
                    w.write_address(0x800, 8);
                    w.write_uint(12, 8);
                    w.finish()
                },
            ))
            .unwrap();
        let mut image = first.encode().unwrap();
        image[2] = 2; // two messages in total

        let mut continuation = ByteWriter::new();
        continuation.write_u16(msg::NIL);
        continuation.write_u16(4);
        continuation.write_u8(0);
        continuation.write_zeros(3);
        continuation.write_bytes(&[9, 9, 9, 9]);

        let mut backend = MemoryBackend::new();
        backend.write_at(0, &image).unwrap();
        backend.write_at(0x800, &continuation.finish()).unwrap();

        let back = read_object_header(&mut backend, &sb(), 0).unwrap();
        assert_eq!(back.messages.len(), 2);
        assert_eq!(back.messages[1].body, vec![9, 9, 9, 9]);
    }
}
