//! Dataset reading: raw bytes and typed values
//!
//! A dataset header names a datatype, a dataspace and a layout. Compact
//! layouts carry their bytes inline, contiguous layouts are one read,
//! and chunked layouts walk the B-tree v1 chunk index, undo the filter
//! pipeline per chunk and place each tile at its N-dimensional position.
//! Typed decoding produces `DataValue`s from the raw buffer plus the
//! datatype descriptor; reshaping beyond a flat sequence lives above the
//! engine.

use h5f_core::btree1::{BtreeV1Node, ChunkKey};
use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::constants::msg;
use h5f_core::message::{
    ByteOrder, DataLayout, Dataspace, Datatype, DatatypeClass, FilterPipeline, Message,
    StringPadding, VlenKind,
};
use h5f_core::{FormatError, ObjectHeader, Superblock, VlenRef};

use crate::backend::ByteSource;
use crate::error::Result;
use crate::filters;
use crate::gheap::GlobalHeapCache;

/// A decoded element.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Int(i64),
    Uint(u64),
    Float32(f32),
    Float64(f64),
    Str(String),
    /// An enum member name
    Enum(String),
    Array(Vec<DataValue>),
    Compound(Vec<(String, DataValue)>),
    /// Opaque, reference and raw-class payloads
    Bytes(Vec<u8>),
}

pub struct DatasetReader {
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub layout: DataLayout,
    pub pipeline: Option<FilterPipeline>,
}

impl DatasetReader {
    /// Collect the dataset-defining messages from an object header.
    pub fn from_header(header: &ObjectHeader, sb: &Superblock) -> Result<Self> {
        let datatype = match header.find_message(msg::DATATYPE, sb)? {
            Some(Message::Datatype(datatype)) => datatype,
            _ => return Err(FormatError::NotFound("datatype message").into()),
        };
        let dataspace = match header.find_message(msg::DATASPACE, sb)? {
            Some(Message::Dataspace(dataspace)) => dataspace,
            _ => return Err(FormatError::NotFound("dataspace message").into()),
        };
        let layout = match header.find_message(msg::DATA_LAYOUT, sb)? {
            Some(Message::DataLayout(layout)) => layout,
            _ => return Err(FormatError::NotFound("data layout message").into()),
        };
        let pipeline = match header.find_message(msg::FILTER_PIPELINE, sb)? {
            Some(Message::FilterPipeline(pipeline)) => Some(pipeline),
            _ => None,
        };
        Ok(Self {
            datatype,
            dataspace,
            layout,
            pipeline,
        })
    }

    /// The dataset's raw element bytes in row-major order.
    pub fn read_raw<B: ByteSource>(&self, source: &mut B, sb: &Superblock) -> Result<Vec<u8>> {
        let element_size = self.datatype.size as usize;
        let total = self.dataspace.element_count() as usize * element_size;
        match &self.layout {
            DataLayout::Compact { data } => {
                if data.len() < total {
                    return Err(FormatError::Truncated("compact dataset storage").into());
                }
                Ok(data[..total].to_vec())
            }
            DataLayout::Contiguous { address, size } => {
                if *address == UNDEF_ADDRESS {
                    return Err(FormatError::InvalidAddress(
                        "contiguous dataset has no allocated storage",
                    )
                    .into());
                }
                if (*size as usize) < total {
                    return Err(FormatError::Truncated("contiguous dataset storage").into());
                }
                source.read_vec(*address, total)
            }
            DataLayout::Chunked {
                btree_address,
                chunk_dims,
            } => self.read_chunked(source, sb, *btree_address, chunk_dims),
        }
    }

    /// All elements, decoded. A scalar dataspace yields one value.
    pub fn read_values<B: ByteSource>(
        &self,
        source: &mut B,
        sb: &Superblock,
        gheap: &mut GlobalHeapCache,
    ) -> Result<Vec<DataValue>> {
        let raw = self.read_raw(source, sb)?;
        decode_values(
            &raw,
            &self.datatype,
            self.dataspace.element_count() as usize,
            sb,
            source,
            gheap,
        )
    }

    fn read_chunked<B: ByteSource>(
        &self,
        source: &mut B,
        sb: &Superblock,
        btree_address: u64,
        stored_dims: &[u32],
    ) -> Result<Vec<u8>> {
        if btree_address == UNDEF_ADDRESS {
            return Err(FormatError::InvalidAddress("chunk index has no root").into());
        }
        let rank = self.dataspace.rank();
        // Stored chunk dimensionality commonly carries a trailing
        // element-size word beyond the dataset rank.
        let chunk_dims: Vec<u64> = match stored_dims.len() {
            n if n == rank => stored_dims.iter().map(|d| *d as u64).collect(),
            n if n == rank + 1 => stored_dims[..rank].iter().map(|d| *d as u64).collect(),
            _ => {
                return Err(FormatError::Inconsistent(
                    "chunk dimensionality does not match the dataspace rank",
                )
                .into())
            }
        };
        if chunk_dims.iter().any(|d| *d == 0) {
            return Err(FormatError::FieldOutOfRange("zero-length chunk dimension").into());
        }

        let element_size = self.datatype.size as usize;
        let total = self.dataspace.element_count() as usize * element_size;
        let mut out = vec![0u8; total];

        let mut pending = vec![btree_address];
        while let Some(address) = pending.pop() {
            let node = read_chunk_node(source, sb, address, stored_dims.len())?;
            if node.level > 0 {
                pending.extend(node.children.iter().copied());
                continue;
            }
            for (key, child) in node.keys.iter().zip(node.children.iter()) {
                let stored = source.read_vec(*child, key.chunk_size as usize)?;
                let chunk = match &self.pipeline {
                    Some(pipeline) => filters::apply_pipeline(stored, &masked(pipeline, key))?,
                    None => stored,
                };
                place_chunk(
                    &mut out,
                    &chunk,
                    &key.offsets[..rank.min(key.offsets.len())],
                    &chunk_dims,
                    &self.dataspace.dims,
                    element_size,
                )?;
            }
        }
        Ok(out)
    }
}

/// Per-chunk filter mask: bit `i` set means pipeline entry `i` was
/// skipped when the chunk was written.
fn masked(pipeline: &FilterPipeline, key: &ChunkKey) -> FilterPipeline {
    if key.filter_mask == 0 {
        return pipeline.clone();
    }
    let mut masked = pipeline.clone();
    masked.filters = pipeline
        .filters
        .iter()
        .enumerate()
        .filter(|(i, _)| key.filter_mask & (1 << i) == 0)
        .map(|(_, f)| f.clone())
        .collect();
    masked
}

fn read_chunk_node<B: ByteSource>(
    source: &mut B,
    sb: &Superblock,
    address: u64,
    key_rank: usize,
) -> Result<h5f_core::btree1::ChunkNode> {
    // Prefix first for the entry count, then the exact node.
    let prefix = source.read_vec(address, 8)?;
    let entries = u16::from_le_bytes([prefix[6], prefix[7]]) as usize;
    let key_size = 8 + 8 * key_rank;
    let node_len = 8
        + 2 * sb.offset_size as usize
        + (entries + 1) * key_size
        + entries * sb.offset_size as usize;
    let image = source.read_vec(address, node_len)?;
    match BtreeV1Node::parse(&image, sb, key_rank)? {
        BtreeV1Node::Chunk(node) => Ok(node),
        BtreeV1Node::Group(_) => {
            Err(FormatError::Inconsistent("chunk index points at a group tree").into())
        }
    }
}

/// Copy one decompressed chunk into the output buffer at its coordinate
/// position, clipping edge chunks to the dataspace extent.
fn place_chunk(
    out: &mut [u8],
    chunk: &[u8],
    coords: &[u64],
    chunk_dims: &[u64],
    dims: &[u64],
    element_size: usize,
) -> Result<()> {
    let rank = chunk_dims.len();
    if coords.len() < rank || dims.len() < rank || rank == 0 {
        return Err(FormatError::Inconsistent("chunk coordinate rank mismatch").into());
    }

    let chunk_elements: u64 = chunk_dims.iter().product();
    if chunk.len() < chunk_elements as usize * element_size {
        return Err(FormatError::Truncated("decoded chunk payload").into());
    }

    // Row-major strides, in elements.
    let mut out_strides = vec![1u64; rank];
    let mut chunk_strides = vec![1u64; rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        out_strides[i] = out_strides[i + 1] * dims[i + 1];
        chunk_strides[i] = chunk_strides[i + 1] * chunk_dims[i + 1];
    }

    // Iterate every row of the chunk (all dimensions but the last) and
    // copy the contiguous tail run, clipped to the dataset extent.
    let mut index = vec![0u64; rank - 1];
    loop {
        let mut inside = true;
        for i in 0..rank - 1 {
            if coords[i] + index[i] >= dims[i] {
                inside = false;
                break;
            }
        }
        if inside && coords[rank - 1] < dims[rank - 1] {
            let run = (chunk_dims[rank - 1]).min(dims[rank - 1] - coords[rank - 1]) as usize;
            let mut src = 0u64;
            let mut dst = coords[rank - 1];
            for i in 0..rank - 1 {
                src += index[i] * chunk_strides[i];
                dst += (coords[i] + index[i]) * out_strides[i];
            }
            let src = src as usize * element_size;
            let dst = dst as usize * element_size;
            let len = run * element_size;
            out[dst..dst + len].copy_from_slice(&chunk[src..src + len]);
        }

        // Odometer over the outer dimensions.
        let mut i = rank - 1;
        loop {
            if i == 0 {
                return Ok(());
            }
            i -= 1;
            index[i] += 1;
            if index[i] < chunk_dims[i] {
                break;
            }
            index[i] = 0;
        }
    }
}

/// Decode `count` elements laid out per `datatype` from a raw buffer.
pub fn decode_values<B: ByteSource>(
    raw: &[u8],
    datatype: &Datatype,
    count: usize,
    sb: &Superblock,
    source: &mut B,
    gheap: &mut GlobalHeapCache,
) -> Result<Vec<DataValue>> {
    let size = datatype.size as usize;
    if raw.len() < count * size {
        return Err(FormatError::Truncated("dataset value buffer").into());
    }
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        values.push(decode_one(
            &raw[i * size..(i + 1) * size],
            datatype,
            sb,
            source,
            gheap,
        )?);
    }
    Ok(values)
}

fn decode_one<B: ByteSource>(
    bytes: &[u8],
    datatype: &Datatype,
    sb: &Superblock,
    source: &mut B,
    gheap: &mut GlobalHeapCache,
) -> Result<DataValue> {
    match &datatype.class {
        DatatypeClass::Fixed {
            byte_order, signed, ..
        } => decode_fixed(bytes, *byte_order, *signed),
        DatatypeClass::Float { byte_order, .. } => match bytes.len() {
            4 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(bytes);
                Ok(DataValue::Float32(match byte_order {
                    ByteOrder::LittleEndian => f32::from_le_bytes(raw),
                    ByteOrder::BigEndian => f32::from_be_bytes(raw),
                }))
            }
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(DataValue::Float64(match byte_order {
                    ByteOrder::LittleEndian => f64::from_le_bytes(raw),
                    ByteOrder::BigEndian => f64::from_be_bytes(raw),
                }))
            }
            _ => Ok(DataValue::Bytes(bytes.to_vec())),
        },
        DatatypeClass::String { padding, .. } => {
            let trimmed = match padding {
                StringPadding::NullTerminated => bytes
                    .iter()
                    .position(|b| *b == 0)
                    .map_or(bytes, |p| &bytes[..p]),
                StringPadding::NullPadded => {
                    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                    &bytes[..end]
                }
                StringPadding::SpacePadded => {
                    let end = bytes
                        .iter()
                        .rposition(|b| *b != b' ')
                        .map_or(0, |p| p + 1);
                    &bytes[..end]
                }
            };
            Ok(DataValue::Str(lossy_string(trimmed)))
        }
        DatatypeClass::VariableLength { kind, base } => {
            let ref_len = VlenRef::encoded_size(sb);
            if bytes.len() < ref_len {
                return Err(FormatError::Truncated("variable-length reference").into());
            }
            let reference = VlenRef::parse(&bytes[..ref_len], sb)?;
            let object = gheap.object(source, sb, &reference)?.to_vec();
            match kind {
                VlenKind::String => {
                    let end = object.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                    Ok(DataValue::Str(lossy_string(&object[..end])))
                }
                VlenKind::Sequence => {
                    let element = base.size as usize;
                    if element == 0 || object.len() % element != 0 {
                        return Err(FormatError::Inconsistent(
                            "variable-length sequence is not a whole number of elements",
                        )
                        .into());
                    }
                    let values =
                        decode_values(&object, base, object.len() / element, sb, source, gheap)?;
                    Ok(DataValue::Array(values))
                }
            }
        }
        DatatypeClass::Compound { members } => {
            let mut fields = Vec::with_capacity(members.len());
            for member in members {
                let start = member.byte_offset as usize;
                let end = start + member.datatype.size as usize;
                if end > bytes.len() {
                    return Err(FormatError::Truncated("compound member region").into());
                }
                fields.push((
                    member.name.clone(),
                    decode_one(&bytes[start..end], &member.datatype, sb, source, gheap)?,
                ));
            }
            Ok(DataValue::Compound(fields))
        }
        DatatypeClass::Enum { base, members } => {
            let width = (base.size as usize).min(bytes.len());
            let value = &bytes[..width];
            match members.iter().find(|m| m.value == value) {
                Some(member) => Ok(DataValue::Enum(member.name.clone())),
                None => Ok(DataValue::Bytes(value.to_vec())),
            }
        }
        DatatypeClass::Array { dims, base } => {
            let count: u64 = dims.iter().map(|d| *d as u64).product();
            let values = decode_values(bytes, base, count as usize, sb, source, gheap)?;
            Ok(DataValue::Array(values))
        }
        DatatypeClass::Opaque { .. } | DatatypeClass::Reference | DatatypeClass::Raw { .. } => {
            Ok(DataValue::Bytes(bytes.to_vec()))
        }
    }
}

fn decode_fixed(bytes: &[u8], byte_order: ByteOrder, signed: bool) -> Result<DataValue> {
    let width = bytes.len();
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Ok(DataValue::Bytes(bytes.to_vec()));
    }
    let mut value = 0u64;
    match byte_order {
        ByteOrder::LittleEndian => {
            for (i, byte) in bytes.iter().enumerate() {
                value |= (*byte as u64) << (8 * i);
            }
        }
        ByteOrder::BigEndian => {
            for byte in bytes {
                value = (value << 8) | *byte as u64;
            }
        }
    }
    if signed {
        let shift = 64 - 8 * width as u32;
        Ok(DataValue::Int(((value << shift) as i64) >> shift))
    } else {
        Ok(DataValue::Uint(value))
    }
}

fn lossy_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ByteSink, MemoryBackend};
    use h5f_core::codec::ByteWriter;
    use h5f_core::constants::filter;
    use h5f_core::global_heap::{GlobalHeapCollection, GlobalHeapObject};
    use h5f_core::message::{CharacterSet, CompoundMember, FilterDescription};
    use h5f_core::HeaderMessage;
    use std::io::Write;

    fn sb() -> Superblock {
        Superblock::new_v2(48)
    }

    fn header_for(
        datatype: &Datatype,
        dataspace: &Dataspace,
        layout: &DataLayout,
        pipeline: Option<&FilterPipeline>,
    ) -> ObjectHeader {
        let mut header = ObjectHeader::new_v2();
        header.flags = 0x1; // roomier chunk-0 size field
        header
            .append_message(HeaderMessage::new(
                msg::DATATYPE,
                datatype.encode().unwrap(),
            ))
            .unwrap();
        header
            .append_message(HeaderMessage::new(msg::DATASPACE, dataspace.encode()))
            .unwrap();
        header
            .append_message(HeaderMessage::new(
                msg::DATA_LAYOUT,
                layout.encode(&sb()).unwrap(),
            ))
            .unwrap();
        if let Some(pipeline) = pipeline {
            header
                .append_message(HeaderMessage::new(
                    msg::FILTER_PIPELINE,
                    pipeline.encode().unwrap(),
                ))
                .unwrap();
        }
        header
    }

    #[test]
    fn test_contiguous_int32_read() {
        let data: Vec<u8> = (1i32..=6).flat_map(|v| v.to_le_bytes()).collect();
        let mut backend = MemoryBackend::new();
        backend.write_at(0x800, &data).unwrap();

        let header = header_for(
            &Datatype::int32(),
            &Dataspace::simple(vec![2, 3]),
            &DataLayout::Contiguous {
                address: 0x800,
                size: data.len() as u64,
            },
            None,
        );
        let reader = DatasetReader::from_header(&header, &sb()).unwrap();
        assert_eq!(reader.read_raw(&mut backend, &sb()).unwrap(), data);

        let mut gheap = GlobalHeapCache::new();
        let values = reader.read_values(&mut backend, &sb(), &mut gheap).unwrap();
        assert_eq!(values.len(), 6);
        assert_eq!(values[0], DataValue::Int(1));
        assert_eq!(values[5], DataValue::Int(6));
    }

    #[test]
    fn test_compact_scalar_float() {
        let header = header_for(
            &Datatype::ieee_float(8).unwrap(),
            &Dataspace::scalar(),
            &DataLayout::Compact {
                data: 2.5f64.to_le_bytes().to_vec(),
            },
            None,
        );
        let reader = DatasetReader::from_header(&header, &sb()).unwrap();
        let mut backend = MemoryBackend::new();
        let mut gheap = GlobalHeapCache::new();
        let values = reader.read_values(&mut backend, &sb(), &mut gheap).unwrap();
        assert_eq!(values, vec![DataValue::Float64(2.5)]);
    }

    /// Build a single-leaf chunk index over the given (coords, bytes)
    /// chunks at `tree_address`.
    fn write_chunk_tree(
        backend: &mut MemoryBackend,
        tree_address: u64,
        chunks: &[(Vec<u64>, Vec<u8>)],
        data_start: u64,
    ) {
        let mut w = ByteWriter::new();
        w.write_bytes(b"TREE");
        w.write_u8(1);
        w.write_u8(0);
        w.write_u16(chunks.len() as u16);
        w.write_address(UNDEF_ADDRESS, 8);
        w.write_address(UNDEF_ADDRESS, 8);
        let mut address = data_start;
        for (coords, bytes) in chunks {
            w.write_u32(bytes.len() as u32);
            w.write_u32(0);
            for c in coords {
                w.write_u64(*c);
            }
            w.write_address(address, 8);
            backend.write_at(address, bytes).unwrap();
            address += bytes.len() as u64;
        }
        // Closing key.
        w.write_u32(0);
        w.write_u32(0);
        for _ in 0..chunks[0].0.len() {
            w.write_u64(0);
        }
        backend.write_at(tree_address, &w.finish()).unwrap();
    }

    #[test]
    fn test_chunked_read_with_edge_clipping() {
        // 3x5 dataset of u8 elements, 2x4 chunks: edge chunks clip.
        let dims = vec![3u64, 5];
        let chunk = |base: u8, count: usize| (0..count as u8).map(|i| base + i).collect::<Vec<_>>();

        let mut backend = MemoryBackend::new();
        let chunks = vec![
            (vec![0, 0, 0], chunk(0, 8)),
            (vec![0, 4, 0], chunk(100, 8)),
            (vec![2, 0, 0], chunk(200, 8)),
            (vec![2, 4, 0], chunk(230, 8)),
        ];
        write_chunk_tree(&mut backend, 0x100, &chunks, 0x1000);

        let header = header_for(
            &Datatype::fixed(1, false),
            &Dataspace::simple(dims),
            &DataLayout::Chunked {
                btree_address: 0x100,
                chunk_dims: vec![2, 4, 1],
            },
            None,
        );
        let reader = DatasetReader::from_header(&header, &sb()).unwrap();
        let raw = reader.read_raw(&mut backend, &sb()).unwrap();

        #[rustfmt::skip]
        let expected = vec![
            0, 1, 2, 3, 100,
            4, 5, 6, 7, 104,
            200, 201, 202, 203, 230,
        ];
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_chunked_read_through_pipeline() {
        // One 2x2 chunk of int32, shuffled then deflated.
        let raw: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|v| v.to_le_bytes()).collect();
        let shuffled: Vec<u8> = {
            let mut out = vec![0u8; raw.len()];
            let count = raw.len() / 4;
            for element in 0..count {
                for b in 0..4 {
                    out[b * count + element] = raw[element * 4 + b];
                }
            }
            out
        };
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&shuffled).unwrap();
        let stored = encoder.finish().unwrap();

        let mut backend = MemoryBackend::new();
        write_chunk_tree(&mut backend, 0x100, &[(vec![0, 0, 0], stored)], 0x1000);

        let pipeline = FilterPipeline::new_v2(vec![
            FilterDescription::new(filter::SHUFFLE, 0, vec![4]),
            FilterDescription::new(filter::DEFLATE, 0, vec![]),
        ]);
        let header = header_for(
            &Datatype::int32(),
            &Dataspace::simple(vec![2, 2]),
            &DataLayout::Chunked {
                btree_address: 0x100,
                chunk_dims: vec![2, 2, 4],
            },
            Some(&pipeline),
        );
        let reader = DatasetReader::from_header(&header, &sb()).unwrap();
        let mut gheap = GlobalHeapCache::new();
        let values = reader.read_values(&mut backend, &sb(), &mut gheap).unwrap();
        assert_eq!(
            values,
            vec![
                DataValue::Int(1),
                DataValue::Int(2),
                DataValue::Int(3),
                DataValue::Int(4),
            ]
        );
    }

    #[test]
    fn test_fixed_string_padding_rules() {
        let mut backend = MemoryBackend::new();
        let mut gheap = GlobalHeapCache::new();

        for (padding, raw, expected) in [
            (StringPadding::NullTerminated, b"hi\0junk!".to_vec(), "hi"),
            (StringPadding::NullPadded, b"hi\0\0\0\0\0\0".to_vec(), "hi"),
            (StringPadding::SpacePadded, b"hi      ".to_vec(), "hi"),
        ] {
            let dt = Datatype::string(8, padding, CharacterSet::Ascii);
            let values = decode_values(&raw, &dt, 1, &sb(), &mut backend, &mut gheap).unwrap();
            assert_eq!(values, vec![DataValue::Str(expected.into())]);
        }
    }

    #[test]
    fn test_vlen_string_through_global_heap() {
        let collection = GlobalHeapCollection {
            version: 1,
            collection_size: 128,
            objects: vec![GlobalHeapObject {
                id: 1,
                reference_count: 1,
                data: b"variable\0\0".to_vec(),
            }],
        };
        let mut backend = MemoryBackend::new();
        backend
            .write_at(0x2000, &collection.encode(&sb()).unwrap())
            .unwrap();

        let mut raw = Vec::new();
        raw.extend_from_slice(&0x2000u64.to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());

        let dt = Datatype::variable_length(
            VlenKind::String,
            Datatype::string(1, StringPadding::NullTerminated, CharacterSet::Ascii),
        );
        let mut gheap = GlobalHeapCache::new();
        let values = decode_values(&raw, &dt, 1, &sb(), &mut backend, &mut gheap).unwrap();
        assert_eq!(values, vec![DataValue::Str("variable".into())]);
    }

    #[test]
    fn test_compound_decode() {
        let dt = Datatype::compound(
            12,
            vec![
                CompoundMember {
                    name: "id".into(),
                    byte_offset: 0,
                    datatype: Datatype::int32(),
                },
                CompoundMember {
                    name: "score".into(),
                    byte_offset: 4,
                    datatype: Datatype::ieee_float(8).unwrap(),
                },
            ],
        );
        let mut raw = Vec::new();
        raw.extend_from_slice(&7i32.to_le_bytes());
        raw.extend_from_slice(&0.5f64.to_le_bytes());

        let mut backend = MemoryBackend::new();
        let mut gheap = GlobalHeapCache::new();
        let values = decode_values(&raw, &dt, 1, &sb(), &mut backend, &mut gheap).unwrap();
        assert_eq!(
            values,
            vec![DataValue::Compound(vec![
                ("id".into(), DataValue::Int(7)),
                ("score".into(), DataValue::Float64(0.5)),
            ])]
        );
    }

    #[test]
    fn test_enum_and_unsigned_decode() {
        let dt = Datatype::enumeration(
            Datatype::int32(),
            vec![
                h5f_core::message::EnumMember {
                    name: "OFF".into(),
                    value: 0i32.to_le_bytes().to_vec(),
                },
                h5f_core::message::EnumMember {
                    name: "ON".into(),
                    value: 1i32.to_le_bytes().to_vec(),
                },
            ],
        );
        let mut backend = MemoryBackend::new();
        let mut gheap = GlobalHeapCache::new();
        let raw = 1i32.to_le_bytes();
        let values = decode_values(&raw, &dt, 1, &sb(), &mut backend, &mut gheap).unwrap();
        assert_eq!(values, vec![DataValue::Enum("ON".into())]);

        let unsigned = Datatype::fixed(2, false);
        let values =
            decode_values(&0xFFEEu16.to_le_bytes(), &unsigned, 1, &sb(), &mut backend, &mut gheap)
                .unwrap();
        assert_eq!(values, vec![DataValue::Uint(0xFFEE)]);

        let signed = Datatype::fixed(2, true);
        let values =
            decode_values(&(-2i16).to_le_bytes(), &signed, 1, &sb(), &mut backend, &mut gheap)
                .unwrap();
        assert_eq!(values, vec![DataValue::Int(-2)]);
    }

    #[test]
    fn test_big_endian_decode() {
        let mut dt = Datatype::int32();
        if let DatatypeClass::Fixed {
            ref mut byte_order, ..
        } = dt.class
        {
            *byte_order = ByteOrder::BigEndian;
        }
        let mut backend = MemoryBackend::new();
        let mut gheap = GlobalHeapCache::new();
        let values = decode_values(
            &258i32.to_be_bytes(),
            &dt,
            1,
            &sb(),
            &mut backend,
            &mut gheap,
        )
        .unwrap();
        assert_eq!(values, vec![DataValue::Int(258)]);
    }
}
