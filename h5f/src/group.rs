//! Group member lookup
//!
//! Two storage generations coexist. Old-style (v1) groups keep a
//! symbol table: a B-tree v1 over name offsets in a local heap, with
//! `SNOD` leaves holding the entries. New-style groups carry compact
//! Link messages directly in the header. Both resolve a child name to
//! its object-header address.

use h5f_core::btree1::BtreeV1Node;
use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::constants::msg;
use h5f_core::local_heap::{self, LocalHeap};
use h5f_core::message::{Link, LinkValue, Message};
use h5f_core::{FormatError, ObjectHeader, Superblock, SymbolTableNode};

use crate::backend::ByteSource;
use crate::error::Result;

/// Resolve a child of `group_header` by name to its object-header
/// address.
pub fn lookup_child<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    group_header: &ObjectHeader,
    name: &str,
) -> Result<u64> {
    // Compact links first: new-style groups store members as Link
    // messages.
    for message in group_header.messages_of_type(msg::LINK) {
        match Link::parse(&message.body, sb) {
            Ok(link) if link.name == name => match link.value {
                LinkValue::Hard { address } => return Ok(address),
                _ => {
                    return Err(FormatError::Unsupported(
                        "resolving soft and external links",
                    )
                    .into())
                }
            },
            Ok(_) => {}
            Err(err) => log::warn!("skipping unparseable link message: {err}"),
        }
    }

    if let Some(Message::SymbolTable(table)) =
        group_header.find_message(msg::SYMBOL_TABLE, sb)?
    {
        let heap = read_local_heap(source, sb, table.heap_address)?;
        let segment =
            source.read_vec(heap.data_segment_address, heap.data_segment_size as usize)?;
        return symbol_table_lookup(source, sb, table.btree_address, &segment, name);
    }

    Err(FormatError::NotFound("group member").into())
}

fn read_local_heap<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    address: u64,
) -> Result<LocalHeap> {
    if address == UNDEF_ADDRESS {
        return Err(FormatError::InvalidAddress("local heap address is undefined").into());
    }
    let image = source.read_vec(address, LocalHeap::encoded_size(sb))?;
    Ok(LocalHeap::parse(&image, sb)?)
}

fn symbol_table_lookup<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    btree_address: u64,
    segment: &[u8],
    name: &str,
) -> Result<u64> {
    let mut pending = vec![btree_address];
    while let Some(address) = pending.pop() {
        let node = read_group_node(source, sb, address)?;
        if node.level > 0 {
            pending.extend(node.children.iter().copied());
            continue;
        }
        for child in &node.children {
            let snod = read_symbol_node(source, sb, *child)?;
            for entry in &snod.entries {
                if local_heap::name_at(segment, entry.link_name_offset)? == name.as_bytes() {
                    return Ok(entry.object_header_address);
                }
            }
        }
    }
    Err(FormatError::NotFound("group member").into())
}

fn read_group_node<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    address: u64,
) -> Result<h5f_core::btree1::GroupNode> {
    // Entry count first, then the exact node.
    let prefix = source.read_vec(address, 8)?;
    let entries = u16::from_le_bytes([prefix[6], prefix[7]]) as usize;
    let node_len = 8
        + 2 * sb.offset_size as usize
        + (entries + 1) * sb.length_size as usize
        + entries * sb.offset_size as usize;
    let image = source.read_vec(address, node_len)?;
    match BtreeV1Node::parse(&image, sb, 0)? {
        BtreeV1Node::Group(node) => Ok(node),
        BtreeV1Node::Chunk(_) => {
            Err(FormatError::Inconsistent("symbol table points at a chunk tree").into())
        }
    }
}

fn read_symbol_node<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    address: u64,
) -> Result<SymbolTableNode> {
    let prefix = source.read_vec(address, 8)?;
    let count = u16::from_le_bytes([prefix[6], prefix[7]]) as usize;
    let node_len = 8 + count * h5f_core::SymbolTableEntry::encoded_size(sb);
    let image = source.read_vec(address, node_len)?;
    Ok(SymbolTableNode::parse(&image, sb)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ByteSink, MemoryBackend};
    use h5f_core::codec::ByteWriter;
    use h5f_core::message::LinkInfo;
    use h5f_core::{HeaderMessage, SymbolTableEntry, SymbolTableMessage};

    fn sb() -> Superblock {
        Superblock::new_v2(48)
    }

    #[test]
    fn test_compact_link_lookup() {
        let mut header = ObjectHeader::new_v2();
        header
            .append_message(HeaderMessage::new(
                msg::LINK_INFO,
                LinkInfo::empty().encode(&sb()).unwrap(),
            ))
            .unwrap();
        header
            .append_message(HeaderMessage::new(
                msg::LINK,
                Link::hard("child_a", 0x900).encode(&sb()).unwrap(),
            ))
            .unwrap();

        let mut backend = MemoryBackend::new();
        assert_eq!(
            lookup_child(&mut backend, &sb(), &header, "child_a").unwrap(),
            0x900
        );
        assert!(matches!(
            lookup_child(&mut backend, &sb(), &header, "other"),
            Err(crate::Error::Format(FormatError::NotFound(_)))
        ));
    }

    /// Build a one-level symbol-table group: local heap with two names,
    /// a leaf B-tree node pointing at one SNOD with both entries.
    fn build_symbol_table_group(backend: &mut MemoryBackend) -> ObjectHeader {
        let heap_address = 0x100u64;
        let segment_address = 0x200u64;
        let btree_address = 0x300u64;
        let snod_address = 0x400u64;

        let mut segment = ByteWriter::new();
        segment.write_u8(0);
        let dataset_a_offset = segment.len() as u64;
        segment.write_cstr("dataset_a");
        let dataset_b_offset = segment.len() as u64;
        segment.write_cstr("dataset_b");
        let segment = segment.finish();

        let mut heap = ByteWriter::new();
        heap.write_bytes(b"HEAP");
        heap.write_u8(0);
        heap.write_zeros(3);
        heap.write_uint(segment.len() as u64, 8);
        heap.write_uint(0, 8);
        heap.write_address(segment_address, 8);
        backend.write_at(heap_address, &heap.finish()).unwrap();
        backend.write_at(segment_address, &segment).unwrap();

        let mut node = ByteWriter::new();
        node.write_bytes(b"TREE");
        node.write_u8(0);
        node.write_u8(0);
        node.write_u16(1);
        node.write_address(UNDEF_ADDRESS, 8);
        node.write_address(UNDEF_ADDRESS, 8);
        node.write_uint(dataset_a_offset, 8);
        node.write_address(snod_address, 8);
        node.write_uint(dataset_b_offset, 8);
        backend.write_at(btree_address, &node.finish()).unwrap();

        let mut snod = ByteWriter::new();
        snod.write_bytes(b"SNOD");
        snod.write_u8(1);
        snod.write_u8(0);
        snod.write_u16(2);
        for (offset, address) in [(dataset_a_offset, 0x800u64), (dataset_b_offset, 0x880)] {
            let entry = SymbolTableEntry {
                link_name_offset: offset,
                object_header_address: address,
                cache_type: 0,
                btree_address: UNDEF_ADDRESS,
                heap_address: UNDEF_ADDRESS,
            };
            entry.write(&mut snod, &sb());
        }
        backend.write_at(snod_address, &snod.finish()).unwrap();

        let mut header = ObjectHeader::new_v1();
        header
            .append_message(HeaderMessage::new(
                msg::SYMBOL_TABLE,
                SymbolTableMessage {
                    btree_address,
                    heap_address,
                }
                .encode(&sb()),
            ))
            .unwrap();
        header
    }

    #[test]
    fn test_symbol_table_lookup() {
        let mut backend = MemoryBackend::new();
        let header = build_symbol_table_group(&mut backend);

        assert_eq!(
            lookup_child(&mut backend, &sb(), &header, "dataset_a").unwrap(),
            0x800
        );
        assert_eq!(
            lookup_child(&mut backend, &sb(), &header, "dataset_b").unwrap(),
            0x880
        );
        assert!(lookup_child(&mut backend, &sb(), &header, "missing").is_err());
    }
}
