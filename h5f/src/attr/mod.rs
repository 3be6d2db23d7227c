//! Attribute access: compact and dense iteration plus mutation
//!
//! Compact attributes are messages inside the object header; dense
//! attributes live in a fractal heap indexed by a B-tree v2 announced
//! through an Attribute Info message. Iteration is best-effort: a
//! single attribute that fails to parse is logged and skipped while the
//! rest of the object stays readable.

pub mod compact;
pub mod dense;
pub mod store;

pub use compact::{delete_compact_attribute, modify_compact_attribute};
pub use dense::{
    delete_dense_attribute, modify_dense_attribute, open_dense_storage, DiskHeapStore,
    DiskNameIndex,
};

use h5f_core::btree2::{BtreeV2Header, InternalNode, LeafNode, NAME_RECORD_SIZE};
use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::constants::msg;
use h5f_core::message::{Attribute, Message};
use h5f_core::{FormatError, ObjectHeader, Superblock};

use crate::backend::ByteSource;
use crate::dataset::{self, DataValue};
use crate::error::{Error, Result};
use crate::fheap::FractalHeapReader;
use crate::gheap::GlobalHeapCache;

/// All attributes of an object, compact first, then dense storage.
pub fn read_attributes<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    header: &ObjectHeader,
) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();
    for message in header.messages_of_type(msg::ATTRIBUTE) {
        match Attribute::parse(&message.body) {
            Ok(attribute) => attributes.push(attribute),
            Err(err) => log::warn!("skipping unparseable attribute message: {err}"),
        }
    }

    if let Some(Message::AttributeInfo(info)) = header.find_message(msg::ATTRIBUTE_INFO, sb)? {
        if info.fractal_heap_address != UNDEF_ADDRESS
            && info.name_index_address != UNDEF_ADDRESS
        {
            let heap = FractalHeapReader::open(source, sb, info.fractal_heap_address)?;
            for heap_id in dense_record_ids(source, sb, info.name_index_address)? {
                let bytes = heap.read_object(source, sb, &heap_id)?;
                match Attribute::parse(&bytes) {
                    Ok(attribute) => attributes.push(attribute),
                    Err(err) => {
                        log::warn!("skipping unparseable dense attribute object: {err}")
                    }
                }
            }
        }
    }
    Ok(attributes)
}

/// Find one attribute by name.
pub fn find_attribute<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    header: &ObjectHeader,
    name: &str,
) -> Result<Attribute> {
    read_attributes(source, sb, header)?
        .into_iter()
        .find(|a| a.name == name)
        .ok_or_else(|| Error::AttributeNotFound(name.to_string()))
}

/// Decode an attribute's raw bytes into typed values.
pub fn attribute_values<B: ByteSource>(
    attribute: &Attribute,
    sb: &Superblock,
    source: &mut B,
    gheap: &mut GlobalHeapCache,
) -> Result<Vec<DataValue>> {
    dataset::decode_values(
        &attribute.data,
        &attribute.datatype,
        attribute.dataspace.element_count() as usize,
        sb,
        source,
        gheap,
    )
}

/// Every heap id recorded in a name index, in record order, walking
/// internal nodes where the tree has depth.
pub fn dense_record_ids<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    index_address: u64,
) -> Result<Vec<[u8; 7]>> {
    let image = source.read_vec(index_address, BtreeV2Header::encoded_size(sb))?;
    let header = BtreeV2Header::parse(&image, sb)?;
    if header.root_address == UNDEF_ADDRESS || header.root_record_count == 0 {
        return Ok(Vec::new());
    }
    let mut ids = Vec::with_capacity((header.total_record_count as usize).min(4096));
    collect_node(
        source,
        sb,
        header.root_address,
        header.root_record_count as usize,
        header.depth,
        &mut ids,
    )?;
    Ok(ids)
}

fn collect_node<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    address: u64,
    record_count: usize,
    depth: u16,
    ids: &mut Vec<[u8; 7]>,
) -> Result<()> {
    if depth == 0 {
        let len = 6 + NAME_RECORD_SIZE * record_count + 4;
        let image = source.read_vec(address, len)?;
        let leaf = LeafNode::parse(&image, record_count)?;
        ids.extend(leaf.records.iter().map(|r| r.heap_id));
        return Ok(());
    }

    let pointer_len = sb.offset_size as usize
        + 2
        + if depth > 1 { sb.length_size as usize } else { 0 };
    let len = 6 + NAME_RECORD_SIZE * record_count + (record_count + 1) * pointer_len + 4;
    let image = source.read_vec(address, len)?;
    let node = InternalNode::parse(&image, record_count, depth, sb)?;
    if node.children.len() != node.records.len() + 1 {
        return Err(FormatError::Inconsistent("b-tree v2 internal child count").into());
    }
    for (i, child) in node.children.iter().enumerate() {
        collect_node(
            source,
            sb,
            child.address,
            child.record_count as usize,
            depth - 1,
            ids,
        )?;
        if i < node.records.len() {
            ids.push(node.records[i].heap_id);
        }
    }
    Ok(())
}
