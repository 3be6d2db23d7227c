//! Object header codec (versions 1 and 2)
//!
//! An object header is the message container identifying every object in
//! the file. Version 1 uses a fixed 16-byte prefix, 8-byte message
//! headers and 8-byte alignment; version 2 is `OHDR`-signed with compact
//! 4-byte message headers and a chunk-0 size whose stored width is picked
//! by two flag bits. Messages that overflow chunk 0 live in continuation
//! blocks, which readers follow and the writer refuses to allocate.

use alloc::vec::Vec;

use crate::checksum::metadata_checksum;
use crate::codec::{pad8, ByteReader, ByteWriter};
use crate::error::{FormatError, Result};
use crate::format::constants::{CONTINUATION_V2_SIGNATURE, OBJECT_HEADER_V2_SIGNATURE};
use crate::format::message::{decode_message, Message};
use crate::format::superblock::Superblock;

/// One message as stored: type code, flags and the raw body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMessage {
    pub type_id: u16,
    pub flags: u8,
    /// Present when the v2 header tracks attribute creation order
    pub creation_order: Option<u16>,
    pub body: Vec<u8>,
}

impl HeaderMessage {
    pub fn new(type_id: u16, body: Vec<u8>) -> Self {
        Self {
            type_id,
            flags: 0,
            creation_order: None,
            body,
        }
    }

    /// Decode the body with the per-type parsers.
    pub fn decode(&self, sb: &Superblock) -> Result<Message> {
        decode_message(self.type_id, &self.body, sb)
    }
}

/// v2 timestamp block (flag bit 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTimes {
    pub access: u32,
    pub modification: u32,
    pub change: u32,
    pub birth: u32,
}

const FLAG_SIZE_WIDTH_MASK: u8 = 0x03;
const FLAG_TRACK_CREATION_ORDER: u8 = 0x04;
const FLAG_PHASE_CHANGE: u8 = 0x10;
const FLAG_TIMES: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub version: u8,
    /// v2 flags byte; zero for v1 headers
    pub flags: u8,
    /// v1 reference count; 1 for v2 headers
    pub refcount: u32,
    pub times: Option<ObjectTimes>,
    /// Attribute phase-change bounds (v2 flag bit 4)
    pub phase_change: Option<(u16, u16)>,
    pub messages: Vec<HeaderMessage>,
}

impl ObjectHeader {
    /// A fresh, empty version-2 header.
    pub fn new_v2() -> Self {
        Self {
            version: 2,
            flags: 0,
            refcount: 1,
            times: None,
            phase_change: None,
            messages: Vec::new(),
        }
    }

    pub fn new_v1() -> Self {
        Self {
            version: 1,
            flags: 0,
            refcount: 1,
            times: None,
            phase_change: None,
            messages: Vec::new(),
        }
    }

    /// All messages of one type, in header order.
    pub fn messages_of_type(&self, type_id: u16) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.type_id == type_id)
    }

    /// Decode the first message of one type.
    pub fn find_message(&self, type_id: u16, sb: &Superblock) -> Result<Option<Message>> {
        match self.messages_of_type(type_id).next() {
            Some(message) => Ok(Some(message.decode(sb)?)),
            None => Ok(None),
        }
    }

    /// Parse either header version from a buffer starting at its first
    /// byte. For v1 headers whose messages continue past this buffer,
    /// use [`ObjectHeader::parse_v1_partial`].
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.starts_with(&OBJECT_HEADER_V2_SIGNATURE) {
            return Self::parse_v2(buf);
        }
        let (header, remaining) = Self::parse_v1_partial(buf)?;
        if remaining > 0 {
            return Err(FormatError::Truncated("object header v1 message stream"));
        }
        Ok(header)
    }

    /// Parse a v1 header prefix and as many of its messages as this
    /// buffer holds, returning how many messages are still outstanding
    /// (they live in continuation blocks).
    pub fn parse_v1_partial(buf: &[u8]) -> Result<(Self, u16)> {
        let mut r = ByteReader::new(buf, "object header v1");
        let version = r.read_u8()?;
        if version != 1 {
            return Err(FormatError::UnsupportedVersion {
                structure: "object header",
                version,
            });
        }
        r.skip(1)?; // reserved
        let message_count = r.read_u16()?;
        let refcount = r.read_u32()?;
        let _header_size = r.read_u32()?;
        r.skip(4)?; // alignment padding

        let (messages, remaining) = parse_v1_messages(&mut r, message_count)?;
        Ok((
            Self {
                version: 1,
                flags: 0,
                refcount,
                times: None,
                phase_change: None,
                messages,
            },
            remaining,
        ))
    }

    /// Parse raw v1 messages from a continuation block.
    pub fn parse_v1_continuation(
        buf: &[u8],
        outstanding: u16,
    ) -> Result<(Vec<HeaderMessage>, u16)> {
        let mut r = ByteReader::new(buf, "object header v1 continuation");
        parse_v1_messages(&mut r, outstanding)
    }

    fn parse_v2(buf: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(buf, "object header v2");
        r.expect_signature(&OBJECT_HEADER_V2_SIGNATURE)?;
        let version = r.read_u8()?;
        if version != 2 {
            return Err(FormatError::UnsupportedVersion {
                structure: "object header",
                version,
            });
        }
        let flags = r.read_u8()?;
        let times = if flags & FLAG_TIMES != 0 {
            Some(ObjectTimes {
                access: r.read_u32()?,
                modification: r.read_u32()?,
                change: r.read_u32()?,
                birth: r.read_u32()?,
            })
        } else {
            None
        };
        let phase_change = if flags & FLAG_PHASE_CHANGE != 0 {
            Some((r.read_u16()?, r.read_u16()?))
        } else {
            None
        };
        let size_width = 1u8 << (flags & FLAG_SIZE_WIDTH_MASK);
        let chunk0_size = r.read_uint(size_width)? as usize;
        let region = r.take(chunk0_size)?;
        let messages = parse_v2_messages(region, flags & FLAG_TRACK_CREATION_ORDER != 0)?;

        Ok(Self {
            version: 2,
            flags,
            refcount: 1,
            times,
            phase_change,
            messages,
        })
    }

    /// Parse a v2 continuation block (`OCHK` + messages + checksum).
    pub fn parse_v2_continuation(
        buf: &[u8],
        track_creation_order: bool,
    ) -> Result<Vec<HeaderMessage>> {
        if buf.len() < CONTINUATION_V2_SIGNATURE.len() + 4 {
            return Err(FormatError::Truncated("object header v2 continuation"));
        }
        let mut r = ByteReader::new(buf, "object header v2 continuation");
        r.expect_signature(&CONTINUATION_V2_SIGNATURE)?;

        let body_end = buf.len() - 4;
        let stored = u32::from_le_bytes([
            buf[body_end],
            buf[body_end + 1],
            buf[body_end + 2],
            buf[body_end + 3],
        ]);
        if metadata_checksum(&buf[..body_end]) != stored {
            return Err(FormatError::ChecksumMismatch("object header v2 continuation"));
        }
        parse_v2_messages(&buf[4..body_end], track_creation_order)
    }

    /// Serialize the header image for its original address.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self.version {
            1 => self.encode_v1(),
            2 => self.encode_v2(),
            _ => Err(FormatError::UnsupportedVersion {
                structure: "object header",
                version: self.version,
            }),
        }
    }

    fn encode_v1(&self) -> Result<Vec<u8>> {
        if self.messages.len() > u16::MAX as usize {
            return Err(FormatError::CapacityExceeded("object header v1 message count"));
        }

        let mut w = ByteWriter::new();
        w.write_u8(1);
        w.write_u8(0);
        w.write_u16(self.messages.len() as u16);
        w.write_u32(self.refcount);
        // Fixed header plus the 8-byte message headers; bodies excluded.
        w.write_u32(16 + 8 * self.messages.len() as u32);
        w.write_zeros(4);

        for message in &self.messages {
            if message.body.len() > u16::MAX as usize {
                return Err(FormatError::CapacityExceeded("object header v1 message size"));
            }
            w.write_u16(message.type_id);
            w.write_u16(message.body.len() as u16);
            w.write_u8(message.flags);
            w.write_zeros(3);
            w.write_bytes(&message.body);
            w.pad_to_multiple(8);
        }
        Ok(w.finish())
    }

    fn encode_v2(&self) -> Result<Vec<u8>> {
        let track = self.flags & FLAG_TRACK_CREATION_ORDER != 0;
        let size_width = 1u8 << (self.flags & FLAG_SIZE_WIDTH_MASK);
        let chunk0_size = self.chunk0_size();
        if chunk0_size > max_for_width(size_width) {
            return Err(FormatError::CapacityExceeded(
                "object header chunk 0 exceeds its declared size width",
            ));
        }

        let mut w = ByteWriter::new();
        w.write_bytes(&OBJECT_HEADER_V2_SIGNATURE);
        w.write_u8(2);
        w.write_u8(self.flags);
        if self.flags & FLAG_TIMES != 0 {
            let times = self
                .times
                .ok_or(FormatError::Inconsistent("object header times flag without times"))?;
            w.write_u32(times.access);
            w.write_u32(times.modification);
            w.write_u32(times.change);
            w.write_u32(times.birth);
        }
        if self.flags & FLAG_PHASE_CHANGE != 0 {
            let (max_compact, min_dense) = self.phase_change.ok_or(FormatError::Inconsistent(
                "object header phase-change flag without bounds",
            ))?;
            w.write_u16(max_compact);
            w.write_u16(min_dense);
        }
        w.write_uint(chunk0_size as u64, size_width);

        for message in &self.messages {
            if message.type_id > u8::MAX as u16 {
                return Err(FormatError::FieldOutOfRange("object header v2 message type"));
            }
            if message.body.len() > u16::MAX as usize {
                return Err(FormatError::CapacityExceeded("object header v2 message size"));
            }
            w.write_u8(message.type_id as u8);
            w.write_u16(message.body.len() as u16);
            w.write_u8(message.flags);
            if track {
                w.write_u16(message.creation_order.unwrap_or(0));
            }
            w.write_bytes(&message.body);
        }
        Ok(w.finish())
    }

    /// Bytes the chunk-0 message region occupies (headers + bodies).
    pub fn chunk0_size(&self) -> usize {
        let header_len = if self.flags & FLAG_TRACK_CREATION_ORDER != 0 {
            6
        } else {
            4
        };
        self.messages
            .iter()
            .map(|m| header_len + m.body.len())
            .sum()
    }

    /// Append a message, failing when chunk 0 can no longer hold the
    /// image. Continuation blocks are not allocated on the write path.
    pub fn append_message(&mut self, message: HeaderMessage) -> Result<()> {
        match self.version {
            1 => {
                if self.messages.len() >= u16::MAX as usize {
                    return Err(FormatError::CapacityExceeded(
                        "object header v1 message count",
                    ));
                }
            }
            2 => {
                let header_len = if self.flags & FLAG_TRACK_CREATION_ORDER != 0 {
                    6
                } else {
                    4
                };
                let size_width = 1u8 << (self.flags & FLAG_SIZE_WIDTH_MASK);
                let new_size = self.chunk0_size() + header_len + message.body.len();
                if new_size > max_for_width(size_width) {
                    return Err(FormatError::CapacityExceeded(
                        "object header chunk 0 is full; grow requires a continuation block",
                    ));
                }
            }
            _ => {
                return Err(FormatError::UnsupportedVersion {
                    structure: "object header",
                    version: self.version,
                })
            }
        }
        self.messages.push(message);
        Ok(())
    }
}

const fn max_for_width(width: u8) -> usize {
    match width {
        1 => u8::MAX as usize,
        2 => u16::MAX as usize,
        4 => u32::MAX as usize,
        _ => usize::MAX,
    }
}

fn parse_v1_messages(
    r: &mut ByteReader<'_>,
    count: u16,
) -> Result<(Vec<HeaderMessage>, u16)> {
    let mut messages = Vec::with_capacity(count as usize);
    let mut remaining = count;
    while remaining > 0 && r.remaining() >= 8 {
        let type_id = r.read_u16()?;
        let size = r.read_u16()? as usize;
        let flags = r.read_u8()?;
        r.skip(3)?;
        let body = r.take(size)?.to_vec();
        // Message header plus payload pads to an 8-byte boundary.
        let pad = pad8(8 + size) - (8 + size);
        if r.remaining() >= pad {
            r.skip(pad)?;
        } else {
            r.rest();
        }
        messages.push(HeaderMessage {
            type_id,
            flags,
            creation_order: None,
            body,
        });
        remaining -= 1;
    }
    Ok((messages, remaining))
}

fn parse_v2_messages(region: &[u8], track_creation_order: bool) -> Result<Vec<HeaderMessage>> {
    let header_len = if track_creation_order { 6 } else { 4 };
    let mut r = ByteReader::new(region, "object header v2 messages");
    let mut messages = Vec::new();
    while r.remaining() >= header_len {
        let type_id = r.read_u8()? as u16;
        let size = r.read_u16()? as usize;
        let flags = r.read_u8()?;
        let creation_order = if track_creation_order {
            Some(r.read_u16()?)
        } else {
            None
        };
        let body = r.take(size)?.to_vec();
        messages.push(HeaderMessage {
            type_id,
            flags,
            creation_order,
            body,
        });
    }
    // Anything shorter than a message header is gap padding.
    Ok(messages)
}
