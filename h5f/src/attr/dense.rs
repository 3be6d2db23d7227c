//! Dense attribute mutation
//!
//! A dense attribute's bytes live as a fractal-heap object; its name is
//! indexed by a B-tree v2 record pointing at that object. Replacing a
//! value with one of the same length touches only the heap; any other
//! replacement frees the old object, inserts the new one and re-points
//! the index record. The operations are generic over the two capability
//! seams so the logic is testable without on-disk structures; the
//! `Disk*` types implement those seams over a byte source/sink for
//! single-root heaps and depth-0 name indexes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use h5f_core::btree2::{BtreeV2Header, LeafNode, NameRecord, NAME_RECORD_SIZE};
use h5f_core::checksum::metadata_checksum;
use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::message::{Attribute, AttributeInfo};
use h5f_core::{DirectBlock, FormatError, FractalHeapHeader, HeapId, Superblock};

use crate::attr::store::{HeapStore, NameIndex};
use crate::backend::{ByteSink, ByteSource};
use crate::error::{Error, Result};

/// Replace the dense attribute named `new_attr.name`.
///
/// Equal-length values are overwritten in place and the index is left
/// untouched; anything else is delete + insert + record update. The
/// inserted heap id must be exactly 8 bytes, the width the index
/// record update consumes.
pub fn modify_dense_attribute<H: HeapStore, N: NameIndex>(
    heap: &mut H,
    index: &mut N,
    new_attr: &Attribute,
) -> Result<()> {
    let name = new_attr.name.as_str();
    let heap_id = index
        .search(name)?
        .ok_or_else(|| Error::AttributeNotFound(name.to_string()))?;
    let old = heap.get(&heap_id)?;

    if new_attr.data.len() == old.len() {
        return heap.overwrite(&heap_id, &new_attr.data);
    }

    heap.delete(&heap_id)?;
    let new_id = heap.insert(&new_attr.data)?;
    let packed: [u8; 8] = new_id.as_slice().try_into().map_err(|_| {
        Error::from(FormatError::Inconsistent(
            "inserted heap id is not exactly 8 bytes",
        ))
    })?;
    index.update(name, u64::from_le_bytes(packed))
}

/// Remove the dense attribute named `name`. The index's lazy policy
/// wins over the caller's `rebalance` request; the heap object is freed
/// after the record.
pub fn delete_dense_attribute<H: HeapStore, N: NameIndex>(
    heap: &mut H,
    index: &mut N,
    name: &str,
    rebalance: bool,
) -> Result<()> {
    let heap_id = index
        .search(name)?
        .ok_or_else(|| Error::AttributeNotFound(name.to_string()))?;
    if index.lazy_rebalancing_enabled() {
        index.delete_lazy(name)?;
    } else if rebalance {
        index.delete_with_rebalancing(name)?;
    } else {
        index.delete(name)?;
    }
    heap.delete(&heap_id)
}

/// Open the on-disk heap store and name index behind an Attribute Info
/// message, sharing one backend between them.
pub fn open_dense_storage<B: ByteSource + ByteSink>(
    backend: Rc<RefCell<B>>,
    sb: &Superblock,
    info: &AttributeInfo,
    lazy_rebalancing: bool,
) -> Result<(DiskHeapStore<B>, DiskNameIndex<B>)> {
    let index = DiskNameIndex::open(
        Rc::clone(&backend),
        sb,
        info.name_index_address,
        lazy_rebalancing,
    )?;
    let heap = DiskHeapStore::open(
        backend,
        sb,
        info.fractal_heap_address,
        &index.record_ids(),
    )?;
    Ok((heap, index))
}

/// On-disk [`NameIndex`] over a depth-0 B-tree v2.
pub struct DiskNameIndex<B: ByteSource + ByteSink> {
    backend: Rc<RefCell<B>>,
    sb: Superblock,
    header_address: u64,
    header: BtreeV2Header,
    leaf: LeafNode,
    lazy: bool,
}

impl<B: ByteSource + ByteSink> DiskNameIndex<B> {
    pub fn open(
        backend: Rc<RefCell<B>>,
        sb: &Superblock,
        address: u64,
        lazy: bool,
    ) -> Result<Self> {
        if address == UNDEF_ADDRESS {
            return Err(FormatError::InvalidAddress("name index address is undefined").into());
        }
        let (header, leaf) = {
            let mut source = backend.borrow_mut();
            let image = source.read_vec(address, BtreeV2Header::encoded_size(sb))?;
            let header = BtreeV2Header::parse(&image, sb)?;
            if header.depth != 0 {
                return Err(FormatError::Unsupported(
                    "mutating name indexes deeper than a root leaf",
                )
                .into());
            }
            let leaf = if header.root_address == UNDEF_ADDRESS {
                LeafNode::new(Vec::new())
            } else {
                let len = 6 + NAME_RECORD_SIZE * header.root_record_count as usize + 4;
                let image = source.read_vec(header.root_address, len)?;
                LeafNode::parse(&image, header.root_record_count as usize)?
            };
            (header, leaf)
        };
        Ok(Self {
            backend,
            sb: sb.clone(),
            header_address: address,
            header,
            leaf,
            lazy,
        })
    }

    /// Heap ids of every record, for seeding the heap store's live map.
    pub fn record_ids(&self) -> Vec<[u8; 7]> {
        self.leaf.records.iter().map(|r| r.heap_id).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let hash = metadata_checksum(name.as_bytes());
        self.leaf.records.iter().position(|r| r.hash == hash)
    }

    fn flush(&mut self) -> Result<()> {
        let mut sink = self.backend.borrow_mut();
        sink.write_at(self.header.root_address, &self.leaf.encode())?;
        sink.write_at(self.header_address, &self.header.encode(&self.sb))
    }

    fn remove_record(&mut self, name: &str) -> Result<()> {
        let position = self
            .position(name)
            .ok_or(FormatError::NotFound("name index record"))?;
        self.leaf.records.remove(position);
        self.header.root_record_count -= 1;
        self.header.total_record_count -= 1;
        self.flush()
    }
}

impl<B: ByteSource + ByteSink> NameIndex for DiskNameIndex<B> {
    fn search(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.position(name).map(|i| {
            let mut packed = self.leaf.records[i].heap_id.to_vec();
            packed.push(0);
            packed
        }))
    }

    fn update(&mut self, name: &str, heap_id: u64) -> Result<()> {
        let position = self
            .position(name)
            .ok_or(FormatError::NotFound("name index record"))?;
        let packed = heap_id.to_le_bytes();
        let mut record_id = [0u8; 7];
        record_id.copy_from_slice(&packed[..7]);
        self.leaf.records[position].heap_id = record_id;
        self.flush()
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.remove_record(name)
    }

    fn delete_with_rebalancing(&mut self, name: &str) -> Result<()> {
        // A root leaf has no siblings to rebalance with.
        self.remove_record(name)
    }

    fn delete_lazy(&mut self, name: &str) -> Result<()> {
        self.remove_record(name)
    }

    fn lazy_rebalancing_enabled(&self) -> bool {
        self.lazy
    }
}

/// On-disk [`HeapStore`] over a single-root fractal heap.
///
/// The live-object map is seeded from the name index's records; gets of
/// unknown ids fail, deletes reclaim their range, and inserts first-fit
/// into reclaimed space within the root direct block.
pub struct DiskHeapStore<B: ByteSource + ByteSink> {
    backend: Rc<RefCell<B>>,
    sb: Superblock,
    header_address: u64,
    header: FractalHeapHeader,
    block_address: u64,
    block: DirectBlock,
    live: HashMap<u64, u64>,
}

impl<B: ByteSource + ByteSink> DiskHeapStore<B> {
    pub fn open(
        backend: Rc<RefCell<B>>,
        sb: &Superblock,
        address: u64,
        seed_ids: &[[u8; 7]],
    ) -> Result<Self> {
        if address == UNDEF_ADDRESS {
            return Err(FormatError::InvalidAddress("fractal heap address is undefined").into());
        }
        let (header, block_address, block) = {
            let mut source = backend.borrow_mut();
            let image = source.read_vec(address, FractalHeapHeader::encoded_size(sb))?;
            let header = FractalHeapHeader::parse(&image, sb)?;
            let root = header.root_block_address;
            if root == UNDEF_ADDRESS {
                return Err(FormatError::NotFound("fractal heap root block").into());
            }
            let prefix = source.read_vec(root, DirectBlock::header_size(&header, sb))?;
            let block = DirectBlock::parse(&prefix, &header, sb)?;
            (header, root, block)
        };

        let mut live = HashMap::new();
        for id_bytes in seed_ids {
            let id = HeapId::parse(id_bytes, &header)?;
            live.insert(id.offset, id.length);
        }

        Ok(Self {
            backend,
            sb: sb.clone(),
            header_address: address,
            header,
            block_address,
            block,
            live,
        })
    }

    fn payload_address(&self, id: &HeapId) -> Result<u64> {
        Ok(self
            .block
            .payload_address(self.block_address, &self.header, &self.sb, id)?)
    }

    fn live_id(&self, heap_id: &[u8]) -> Result<HeapId> {
        let id = HeapId::parse(heap_id, &self.header)?;
        match self.live.get(&id.offset) {
            Some(length) if *length == id.length => Ok(id),
            _ => Err(FormatError::NotFound("fractal heap object").into()),
        }
    }

    /// Payload bytes the root direct block can hold.
    fn capacity(&self) -> u64 {
        let header_len = DirectBlock::header_size(&self.header, &self.sb) as u64;
        self.header.starting_block_size.saturating_sub(header_len)
    }

    fn flush_header(&mut self) -> Result<()> {
        self.backend
            .borrow_mut()
            .write_at(self.header_address, &self.header.encode(&self.sb))
    }
}

impl<B: ByteSource + ByteSink> HeapStore for DiskHeapStore<B> {
    fn get(&mut self, heap_id: &[u8]) -> Result<Vec<u8>> {
        let id = self.live_id(heap_id)?;
        let address = self.payload_address(&id)?;
        self.backend
            .borrow_mut()
            .read_vec(address, id.length as usize)
    }

    fn overwrite(&mut self, heap_id: &[u8], data: &[u8]) -> Result<()> {
        let id = self.live_id(heap_id)?;
        if data.len() as u64 != id.length {
            return Err(FormatError::Inconsistent(
                "overwrite must preserve the object length",
            )
            .into());
        }
        let address = self.payload_address(&id)?;
        self.backend.borrow_mut().write_at(address, data)
    }

    fn insert(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let length = data.len() as u64;
        if length > self.header.max_managed_object_size as u64 {
            return Err(FormatError::CapacityExceeded(
                "object exceeds the heap's managed-object limit",
            )
            .into());
        }

        // First fit among the gaps between live objects.
        let mut ranges: Vec<(u64, u64)> =
            self.live.iter().map(|(off, len)| (*off, *len)).collect();
        ranges.sort_unstable();
        let mut candidate = self.block.block_offset;
        for (offset, len) in ranges {
            if candidate + length <= offset {
                break;
            }
            candidate = candidate.max(offset + len);
        }
        if candidate + length > self.block.block_offset + self.capacity() {
            return Err(FormatError::CapacityExceeded(
                "fractal heap root direct block is full",
            )
            .into());
        }

        let id = HeapId {
            offset: candidate,
            length,
        };
        let address = self.payload_address(&id)?;
        self.backend.borrow_mut().write_at(address, data)?;
        self.live.insert(id.offset, id.length);
        self.header.managed_object_count += 1;
        self.header.free_space = self.header.free_space.saturating_sub(length);
        self.flush_header()?;

        let mut bytes = id.encode(&self.header);
        bytes.resize(8, 0);
        Ok(bytes)
    }

    fn delete(&mut self, heap_id: &[u8]) -> Result<()> {
        let id = self.live_id(heap_id)?;
        self.live.remove(&id.offset);
        self.header.managed_object_count = self.header.managed_object_count.saturating_sub(1);
        self.header.free_space += id.length;
        self.flush_header()
    }
}

/// Build the minimal on-disk dense storage (heap + index) for tests and
/// tooling: one direct block, one root leaf, the given attributes laid
/// out back to back.
#[doc(hidden)]
pub fn build_dense_fixture<B: ByteSource + ByteSink>(
    backend: &mut B,
    sb: &Superblock,
    heap_address: u64,
    index_address: u64,
    attributes: &[(&str, &[u8])],
) -> Result<AttributeInfo> {
    use h5f_core::codec::ByteWriter;
    use h5f_core::constants::DIRECT_BLOCK_SIGNATURE;

    let block_address = heap_address + 0x200;
    let leaf_address = index_address + 0x100;

    let mut header = FractalHeapHeader {
        version: 0,
        heap_id_length: 7,
        io_filter_length: 0,
        flags: 0,
        max_managed_object_size: 4096,
        next_huge_id: 0,
        huge_btree_address: UNDEF_ADDRESS,
        free_space: 0,
        free_space_manager_address: UNDEF_ADDRESS,
        managed_space: 0x10000,
        allocated_managed_space: 0x10000,
        managed_iterator_offset: 0,
        managed_object_count: attributes.len() as u64,
        huge_size: 0,
        huge_count: 0,
        tiny_size: 0,
        tiny_count: 0,
        table_width: 4,
        starting_block_size: 0x1000,
        max_direct_block_size: 0x10000,
        max_heap_size: 32,
        starting_rows: 1,
        root_block_address: block_address,
        current_rows: 1,
    };
    header.free_space = 0x1000;
    backend.write_at(heap_address, &header.encode(sb))?;

    let mut block = ByteWriter::new();
    block.write_bytes(&DIRECT_BLOCK_SIGNATURE);
    block.write_u8(0);
    block.write_address(heap_address, sb.offset_size);
    block.write_uint(0, header.id_offset_width());
    backend.write_at(block_address, &block.finish())?;

    let payload_base =
        block_address + DirectBlock::header_size(&header, sb) as u64;
    let mut offset = 0u64;
    let mut records = Vec::new();
    for (name, data) in attributes {
        backend.write_at(payload_base + offset, data)?;
        let id = HeapId {
            offset,
            length: data.len() as u64,
        };
        let mut id_bytes = [0u8; 7];
        id_bytes.copy_from_slice(&id.encode(&header));
        records.push(NameRecord::new(name, id_bytes));
        offset += data.len() as u64;
    }
    records.sort_by_key(|r| r.hash);

    let leaf = LeafNode::new(records);
    backend.write_at(leaf_address, &leaf.encode())?;

    let tree = BtreeV2Header {
        version: 0,
        record_type: h5f_core::btree2::RECORD_TYPE_ATTRIBUTE_NAME,
        node_size: 512,
        record_size: NAME_RECORD_SIZE as u16,
        depth: 0,
        split_percent: 100,
        merge_percent: 40,
        root_address: leaf_address,
        root_record_count: attributes.len() as u16,
        total_record_count: attributes.len() as u64,
    };
    backend.write_at(index_address, &tree.encode(sb))?;

    Ok(AttributeInfo {
        version: 0,
        flags: 0,
        max_compact: None,
        min_dense: None,
        fractal_heap_address: heap_address,
        name_index_address: index_address,
        creation_order_index_address: None,
    })
}
