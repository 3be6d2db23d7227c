//! Header message codecs
//!
//! Every object-header message is a tagged blob; this module holds the
//! per-type parsers and encoders plus the dispatch from type code to
//! decoded [`Message`]. Types the engine does not understand decode to
//! [`Message::Unknown`] and are skipped by readers, as the format
//! requires.

pub mod attribute;
pub mod attribute_info;
pub mod dataspace;
pub mod datatype;
pub mod fill_value;
pub mod layout;
pub mod link;
pub mod pipeline;

pub use attribute::Attribute;
pub use attribute_info::AttributeInfo;
pub use dataspace::{Dataspace, DataspaceType};
pub use datatype::{
    ByteOrder, CharacterSet, CompoundMember, Datatype, DatatypeClass, EnumMember, StringPadding,
    VlenKind,
};
pub use fill_value::FillValue;
pub use layout::DataLayout;
pub use link::{Link, LinkInfo, LinkValue};
pub use pipeline::{FilterDescription, FilterPipeline};

use crate::codec::ByteReader;
use crate::error::Result;
use crate::format::constants::msg;
use crate::format::superblock::Superblock;
use crate::format::symbol_table::SymbolTableMessage;

/// A decoded header message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Nil,
    Dataspace(Dataspace),
    LinkInfo(LinkInfo),
    Datatype(Datatype),
    FillValue(FillValue),
    Link(Link),
    DataLayout(DataLayout),
    FilterPipeline(FilterPipeline),
    Attribute(Attribute),
    /// Another object-header block: `length` bytes at `offset`
    Continuation { offset: u64, length: u64 },
    SymbolTable(SymbolTableMessage),
    ModificationTime { seconds: u32 },
    AttributeInfo(AttributeInfo),
    /// Preserved but not interpreted
    Unknown { type_id: u16 },
}

/// Decode one message body by its type code. Unknown codes succeed with
/// [`Message::Unknown`] so iteration can skip them.
pub fn decode_message(type_id: u16, body: &[u8], sb: &Superblock) -> Result<Message> {
    Ok(match type_id {
        msg::NIL => Message::Nil,
        msg::DATASPACE => Message::Dataspace(Dataspace::parse(body)?),
        msg::LINK_INFO => Message::LinkInfo(LinkInfo::parse(body, sb)?),
        msg::DATATYPE => Message::Datatype(Datatype::parse(body)?),
        msg::FILL_VALUE_OLD => Message::FillValue(FillValue::parse_old(body)?),
        msg::FILL_VALUE => Message::FillValue(FillValue::parse(body)?),
        msg::LINK => Message::Link(Link::parse(body, sb)?),
        msg::DATA_LAYOUT => Message::DataLayout(DataLayout::parse(body, sb)?),
        msg::FILTER_PIPELINE => Message::FilterPipeline(FilterPipeline::parse(body)?),
        msg::ATTRIBUTE => Message::Attribute(Attribute::parse(body)?),
        msg::CONTINUATION => {
            let mut r = ByteReader::new(body, "continuation message");
            let offset = r.read_address(sb.offset_size)?;
            let length = r.read_uint(sb.length_size)?;
            Message::Continuation { offset, length }
        }
        msg::SYMBOL_TABLE => Message::SymbolTable(SymbolTableMessage::parse(body, sb)?),
        msg::MODIFICATION_TIME => {
            let mut r = ByteReader::new(body, "modification time message");
            let version = r.read_u8()?;
            if version != 1 {
                return Err(crate::error::FormatError::UnsupportedVersion {
                    structure: "modification time",
                    version,
                });
            }
            r.skip(3)?;
            Message::ModificationTime {
                seconds: r.read_u32()?,
            }
        }
        msg::ATTRIBUTE_INFO => Message::AttributeInfo(AttributeInfo::parse(body, sb)?),
        other => Message::Unknown { type_id: other },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sb() -> Superblock {
        Superblock::new_v2(48)
    }

    #[test]
    fn test_dispatch_known_types() {
        let ds = Dataspace::simple(vec![2, 2]);
        match decode_message(msg::DATASPACE, &ds.encode(), &sb()).unwrap() {
            Message::Dataspace(back) => assert_eq!(back, ds),
            other => panic!("unexpected message {other:?}"),
        }

        let info = LinkInfo::empty();
        match decode_message(msg::LINK_INFO, &info.encode(&sb()).unwrap(), &sb()).unwrap() {
            Message::LinkInfo(back) => assert_eq!(back, info),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_continuation_body() {
        let mut body = vec![];
        body.extend_from_slice(&0x1234u64.to_le_bytes());
        body.extend_from_slice(&0x200u64.to_le_bytes());
        match decode_message(msg::CONTINUATION, &body, &sb()).unwrap() {
            Message::Continuation { offset, length } => {
                assert_eq!(offset, 0x1234);
                assert_eq!(length, 0x200);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_modification_time() {
        let mut body = vec![1u8, 0, 0, 0];
        body.extend_from_slice(&1_600_000_000u32.to_le_bytes());
        match decode_message(msg::MODIFICATION_TIME, &body, &sb()).unwrap() {
            Message::ModificationTime { seconds } => assert_eq!(seconds, 1_600_000_000),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        match decode_message(0x7F, &[1, 2, 3], &sb()).unwrap() {
            Message::Unknown { type_id } => assert_eq!(type_id, 0x7F),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
