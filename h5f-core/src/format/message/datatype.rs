//! Datatype message codec (type 0x03)
//!
//! A datatype is polymorphic over its class, and the length of the
//! class-specific property block is itself class- and version-dependent:
//! sizing a version-3 compound requires walking its members. Each class
//! variant carries first-class fields; classes without first-class
//! decoding (Time, Bitfield, Complex) keep their raw property bytes.
//!
//! Encoders are factored into `emit` (header + properties, appended in
//! place) and the thin public `encode` that fills a fresh buffer, so
//! nested datatypes inside compounds, enums and arrays are inlined
//! without any wrapping frame.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::codec::{pad8, ByteReader, ByteWriter};
use crate::error::{FormatError, Result};

/// Datatype class identifiers (low nibble of the first header byte)
pub mod class_id {
    pub const FIXED: u8 = 0;
    pub const FLOAT: u8 = 1;
    pub const TIME: u8 = 2;
    pub const STRING: u8 = 3;
    pub const BITFIELD: u8 = 4;
    pub const OPAQUE: u8 = 5;
    pub const COMPOUND: u8 = 6;
    pub const REFERENCE: u8 = 7;
    pub const ENUM: u8 = 8;
    pub const VARIABLE_LENGTH: u8 = 9;
    pub const ARRAY: u8 = 10;
    pub const COMPLEX: u8 = 11;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Padding rule for fixed-length strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminated,
    NullPadded,
    SpacePadded,
}

impl StringPadding {
    pub const fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(StringPadding::NullTerminated),
            1 => Ok(StringPadding::NullPadded),
            2 => Ok(StringPadding::SpacePadded),
            _ => Err(FormatError::FieldOutOfRange("string padding code")),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            StringPadding::NullTerminated => 0,
            StringPadding::NullPadded => 1,
            StringPadding::SpacePadded => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

impl CharacterSet {
    pub const fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(CharacterSet::Ascii),
            1 => Ok(CharacterSet::Utf8),
            _ => Err(FormatError::FieldOutOfRange("character set code")),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            CharacterSet::Ascii => 0,
            CharacterSet::Utf8 => 1,
        }
    }
}

/// Sequence vs string flavor of a variable-length type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlenKind {
    Sequence,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundMember {
    pub name: String,
    pub byte_offset: u32,
    pub datatype: Datatype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    /// Raw value bytes, exactly the base type's size
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatatypeClass {
    Fixed {
        byte_order: ByteOrder,
        signed: bool,
        bit_offset: u16,
        bit_precision: u16,
    },
    Float {
        byte_order: ByteOrder,
        bit_offset: u16,
        bit_precision: u16,
        exponent_location: u8,
        exponent_size: u8,
        mantissa_location: u8,
        mantissa_size: u8,
        exponent_bias: u32,
    },
    String {
        padding: StringPadding,
        charset: CharacterSet,
    },
    Opaque {
        tag: String,
    },
    Compound {
        members: Vec<CompoundMember>,
    },
    Reference,
    Enum {
        base: Box<Datatype>,
        members: Vec<EnumMember>,
    },
    VariableLength {
        kind: VlenKind,
        base: Box<Datatype>,
    },
    Array {
        dims: Vec<u32>,
        base: Box<Datatype>,
    },
    /// Time, Bitfield and Complex keep their raw property bytes.
    Raw {
        class_id: u8,
        properties: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datatype {
    pub version: u8,
    /// 24-bit class bit field as stored on disk
    pub class_bit_field: u32,
    /// Size of one element in bytes
    pub size: u32,
    pub class: DatatypeClass,
}

impl Datatype {
    /// A little-endian fixed-point type of the given byte size.
    pub fn fixed(size: u32, signed: bool) -> Self {
        let class = DatatypeClass::Fixed {
            byte_order: ByteOrder::LittleEndian,
            signed,
            bit_offset: 0,
            bit_precision: (size * 8) as u16,
        };
        Self::with_effective_bits(1, size, class)
    }

    /// Little-endian `int32`.
    pub fn int32() -> Self {
        Self::fixed(4, true)
    }

    /// Little-endian `int64`.
    pub fn int64() -> Self {
        Self::fixed(8, true)
    }

    /// An IEEE 754 little-endian float; only 4- and 8-byte sizes have a
    /// defined exponent/mantissa split.
    pub fn ieee_float(size: u32) -> Result<Self> {
        let (exponent_size, exponent_bias) = match size {
            4 => (8u8, 127u32),
            8 => (11u8, 1023u32),
            _ => {
                return Err(FormatError::FieldOutOfRange(
                    "IEEE float size must be 4 or 8 bytes",
                ))
            }
        };
        let mantissa_size = (size * 8 - 1) as u8 - exponent_size;
        let class = DatatypeClass::Float {
            byte_order: ByteOrder::LittleEndian,
            bit_offset: 0,
            bit_precision: (size * 8) as u16,
            exponent_location: mantissa_size,
            exponent_size,
            mantissa_location: 0,
            mantissa_size,
            exponent_bias,
        };
        // Sign bit sits in the top bit; mantissa msb is implied.
        let sign_location = (size * 8 - 1) << 8;
        let mut dt = Self::with_effective_bits(1, size, class);
        dt.class_bit_field |= sign_location | 0x20;
        Ok(dt)
    }

    /// A fixed-length string of `size` bytes.
    pub fn string(size: u32, padding: StringPadding, charset: CharacterSet) -> Self {
        Self::with_effective_bits(1, size, DatatypeClass::String { padding, charset })
    }

    pub fn opaque(size: u32, tag: &str) -> Self {
        Self::with_effective_bits(
            1,
            size,
            DatatypeClass::Opaque {
                tag: String::from(tag),
            },
        )
    }

    pub fn reference(size: u32) -> Self {
        Self::with_effective_bits(1, size, DatatypeClass::Reference)
    }

    /// A version-3 compound over the given members; `size` is the byte
    /// span of one record.
    pub fn compound(size: u32, members: Vec<CompoundMember>) -> Self {
        Self::with_effective_bits(3, size, DatatypeClass::Compound { members })
    }

    /// A version-1 compound (8-byte-padded member names, legacy array
    /// info); only scalar members can be re-encoded in this form.
    pub fn compound_v1(size: u32, members: Vec<CompoundMember>) -> Self {
        Self::with_effective_bits(1, size, DatatypeClass::Compound { members })
    }

    pub fn enumeration(base: Datatype, members: Vec<EnumMember>) -> Self {
        let size = base.size;
        Self::with_effective_bits(
            3,
            size,
            DatatypeClass::Enum {
                base: Box::new(base),
                members,
            },
        )
    }

    pub fn array(base: Datatype, dims: Vec<u32>) -> Self {
        let element_count: u64 = dims.iter().map(|d| *d as u64).product();
        let size = (base.size as u64 * element_count) as u32;
        Self::with_effective_bits(
            3,
            size,
            DatatypeClass::Array {
                dims,
                base: Box::new(base),
            },
        )
    }

    pub fn variable_length(kind: VlenKind, base: Datatype) -> Self {
        // A vlen element in dataset bytes is a global-heap reference.
        Self::with_effective_bits(
            3,
            12,
            DatatypeClass::VariableLength {
                kind,
                base: Box::new(base),
            },
        )
    }

    fn with_effective_bits(version: u8, size: u32, class: DatatypeClass) -> Self {
        let mut dt = Self {
            version,
            class_bit_field: 0,
            size,
            class,
        };
        dt.class_bit_field = dt.effective_bit_field();
        dt
    }

    pub fn class_id(&self) -> u8 {
        match &self.class {
            DatatypeClass::Fixed { .. } => class_id::FIXED,
            DatatypeClass::Float { .. } => class_id::FLOAT,
            DatatypeClass::String { .. } => class_id::STRING,
            DatatypeClass::Opaque { .. } => class_id::OPAQUE,
            DatatypeClass::Compound { .. } => class_id::COMPOUND,
            DatatypeClass::Reference => class_id::REFERENCE,
            DatatypeClass::Enum { .. } => class_id::ENUM,
            DatatypeClass::VariableLength { .. } => class_id::VARIABLE_LENGTH,
            DatatypeClass::Array { .. } => class_id::ARRAY,
            DatatypeClass::Raw { class_id, .. } => *class_id,
        }
    }

    /// The class bit field implied by the variant fields. For classes
    /// whose semantics live in the bit field (member counts, string
    /// padding, opaque tag length) the encoder always derives it from
    /// the variant so the two can never disagree.
    fn effective_bit_field(&self) -> u32 {
        match &self.class {
            DatatypeClass::Fixed {
                byte_order, signed, ..
            } => {
                let mut bits = 0;
                if *byte_order == ByteOrder::BigEndian {
                    bits |= 0x1;
                }
                if *signed {
                    bits |= 0x8;
                }
                bits
            }
            DatatypeClass::Float { byte_order, .. } => {
                let mut bits = self.class_bit_field & !0x1;
                if *byte_order == ByteOrder::BigEndian {
                    bits |= 0x1;
                }
                bits
            }
            DatatypeClass::String { padding, charset } => {
                (padding.code() as u32) | ((charset.code() as u32) << 4)
            }
            DatatypeClass::Opaque { tag } => pad8(tag.len() + 1) as u32,
            DatatypeClass::Compound { members } => members.len() as u32 & 0xFFFF,
            DatatypeClass::Enum { members, .. } => members.len() as u32 & 0xFFFF,
            DatatypeClass::VariableLength { kind, .. } => match kind {
                VlenKind::Sequence => 0,
                VlenKind::String => 1,
            },
            DatatypeClass::Reference | DatatypeClass::Array { .. } => 0,
            DatatypeClass::Raw { .. } => self.class_bit_field,
        }
    }

    /// Parse a datatype occupying (at most) the whole buffer.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(buf, "datatype message");
        Self::parse_inline(&mut r, true)
    }

    /// Parse a datatype nested inside another datatype's properties.
    /// Unlike the top level there is no surrounding length to lean on,
    /// so every class must have a computable property size.
    fn parse_inline(r: &mut ByteReader<'_>, top_level: bool) -> Result<Self> {
        let class_and_version = r.read_u8()?;
        let version = class_and_version >> 4;
        let class = class_and_version & 0x0F;
        let class_bit_field = r.read_uint(3)? as u32;
        let size = r.read_u32()?;

        let class = match class {
            class_id::FIXED => {
                let bit_offset = r.read_u16()?;
                let bit_precision = r.read_u16()?;
                DatatypeClass::Fixed {
                    byte_order: byte_order_bit(class_bit_field),
                    signed: class_bit_field & 0x8 != 0,
                    bit_offset,
                    bit_precision,
                }
            }
            class_id::FLOAT => {
                let bit_offset = r.read_u16()?;
                let bit_precision = r.read_u16()?;
                let exponent_location = r.read_u8()?;
                let exponent_size = r.read_u8()?;
                let mantissa_location = r.read_u8()?;
                let mantissa_size = r.read_u8()?;
                let exponent_bias = r.read_u32()?;
                DatatypeClass::Float {
                    byte_order: byte_order_bit(class_bit_field),
                    bit_offset,
                    bit_precision,
                    exponent_location,
                    exponent_size,
                    mantissa_location,
                    mantissa_size,
                    exponent_bias,
                }
            }
            class_id::STRING => {
                // One property byte carries padding and character set;
                // older writers leave it out and use the bit field alone.
                let code = if top_level {
                    if r.is_empty() {
                        class_bit_field as u8
                    } else {
                        r.read_u8()?
                    }
                } else {
                    r.read_u8()?
                };
                DatatypeClass::String {
                    padding: StringPadding::from_code(code & 0x0F)?,
                    charset: CharacterSet::from_code((code >> 4) & 0x0F)?,
                }
            }
            class_id::TIME => DatatypeClass::Raw {
                class_id: class_id::TIME,
                properties: r.take(2)?.to_vec(),
            },
            class_id::BITFIELD => DatatypeClass::Raw {
                class_id: class_id::BITFIELD,
                properties: r.take(4)?.to_vec(),
            },
            class_id::OPAQUE => {
                let padded_len = (class_bit_field & 0xFFFF) as usize;
                let raw = r.take(padded_len)?;
                let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                let tag = core::str::from_utf8(&raw[..end])
                    .map_err(|_| FormatError::FieldOutOfRange("opaque tag encoding"))?;
                DatatypeClass::Opaque {
                    tag: String::from(tag),
                }
            }
            class_id::COMPOUND => match version {
                1 => Self::parse_compound_v1(r, class_bit_field)?,
                3 => Self::parse_compound_v3(r)?,
                2 => return Err(FormatError::Unsupported("compound datatype version 2")),
                _ => {
                    return Err(FormatError::UnsupportedVersion {
                        structure: "compound datatype",
                        version,
                    })
                }
            },
            class_id::REFERENCE => DatatypeClass::Reference,
            class_id::ENUM => {
                let count = (class_bit_field & 0xFFFF) as usize;
                let base = Self::parse_inline(r, false)?;
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = read_padded_name(r)?;
                    let value = r.take(base.size as usize)?.to_vec();
                    members.push(EnumMember { name, value });
                }
                DatatypeClass::Enum {
                    base: Box::new(base),
                    members,
                }
            }
            class_id::VARIABLE_LENGTH => {
                r.skip(4)?;
                let base = Self::parse_inline(r, false)?;
                let kind = if class_bit_field & 0x0F == 1 {
                    VlenKind::String
                } else {
                    VlenKind::Sequence
                };
                DatatypeClass::VariableLength {
                    kind,
                    base: Box::new(base),
                }
            }
            class_id::ARRAY => {
                if version != 3 {
                    return Err(FormatError::UnsupportedVersion {
                        structure: "array datatype",
                        version,
                    });
                }
                let ndims = r.read_u8()? as usize;
                let mut dims = Vec::with_capacity(ndims);
                for _ in 0..ndims {
                    dims.push(r.read_u32()?);
                }
                let base = Self::parse_inline(r, false)?;
                DatatypeClass::Array {
                    dims,
                    base: Box::new(base),
                }
            }
            class_id::COMPLEX if top_level => DatatypeClass::Raw {
                class_id: class_id::COMPLEX,
                properties: r.rest().to_vec(),
            },
            _ => {
                return Err(FormatError::Unsupported(if top_level {
                    "datatype class"
                } else {
                    "inline sizing for this datatype class"
                }))
            }
        };

        Ok(Self {
            version,
            class_bit_field,
            size,
            class,
        })
    }

    fn parse_compound_v1(r: &mut ByteReader<'_>, class_bit_field: u32) -> Result<DatatypeClass> {
        let count = (class_bit_field & 0xFFFF) as usize;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let name = read_padded_name(r)?;
            let byte_offset = r.read_u32()?;
            r.skip(28)?; // legacy per-member array info
            let datatype = Self::parse_inline(r, false)?;
            members.push(CompoundMember {
                name,
                byte_offset,
                datatype,
            });
        }
        Ok(DatatypeClass::Compound { members })
    }

    fn parse_compound_v3(r: &mut ByteReader<'_>) -> Result<DatatypeClass> {
        let count = r.read_u32()? as usize;
        // Every member needs at least a name byte, its terminator, the
        // offset and a nested header.
        if count > r.remaining() / 13 {
            return Err(FormatError::Inconsistent(
                "compound member count exceeds remaining property bytes",
            ));
        }
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let name_bytes = r.read_cstr()?;
            let name = String::from_utf8(name_bytes.to_vec())
                .map_err(|_| FormatError::FieldOutOfRange("compound member name encoding"))?;
            let byte_offset = r.read_u32()?;
            let datatype = Self::parse_inline(r, false)?;
            members.push(CompoundMember {
                name,
                byte_offset,
                datatype,
            });
        }
        Ok(DatatypeClass::Compound { members })
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let expected = self.encoded_size();
        let mut w = ByteWriter::with_capacity(expected);
        self.emit(&mut w)?;
        // A mismatch here is an engine bug, not a data error.
        assert_eq!(w.len(), expected, "datatype encoder length mismatch");
        Ok(w.finish())
    }

    /// Append header + properties in place (the inline form used for
    /// nested datatypes).
    fn emit(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8((self.version << 4) | self.class_id());
        w.write_uint(self.effective_bit_field() as u64, 3);
        w.write_u32(self.size);

        match &self.class {
            DatatypeClass::Fixed {
                bit_offset,
                bit_precision,
                ..
            } => {
                w.write_u16(*bit_offset);
                w.write_u16(*bit_precision);
            }
            DatatypeClass::Float {
                bit_offset,
                bit_precision,
                exponent_location,
                exponent_size,
                mantissa_location,
                mantissa_size,
                exponent_bias,
                ..
            } => {
                w.write_u16(*bit_offset);
                w.write_u16(*bit_precision);
                w.write_u8(*exponent_location);
                w.write_u8(*exponent_size);
                w.write_u8(*mantissa_location);
                w.write_u8(*mantissa_size);
                w.write_u32(*exponent_bias);
            }
            DatatypeClass::String { padding, charset } => {
                w.write_u8(padding.code() | (charset.code() << 4));
            }
            DatatypeClass::Opaque { tag } => {
                let padded = pad8(tag.len() + 1);
                w.write_bytes(tag.as_bytes());
                w.write_zeros(padded - tag.len());
            }
            DatatypeClass::Compound { members } => match self.version {
                1 => {
                    for member in members {
                        write_padded_name(w, &member.name);
                        w.write_u32(member.byte_offset);
                        w.write_zeros(28);
                        member.datatype.emit(w)?;
                    }
                }
                3 => {
                    w.write_u32(members.len() as u32);
                    for member in members {
                        w.write_cstr(&member.name);
                        w.write_u32(member.byte_offset);
                        member.datatype.emit(w)?;
                    }
                }
                _ => return Err(FormatError::Unsupported("encoding this compound version")),
            },
            DatatypeClass::Reference => {}
            DatatypeClass::Enum { base, members } => {
                base.emit(w)?;
                for member in members {
                    if member.value.len() != base.size as usize {
                        return Err(FormatError::Inconsistent(
                            "enum member value width does not match its base type",
                        ));
                    }
                    write_padded_name(w, &member.name);
                    w.write_bytes(&member.value);
                }
            }
            DatatypeClass::VariableLength { base, .. } => {
                w.write_zeros(4);
                base.emit(w)?;
            }
            DatatypeClass::Array { dims, base } => {
                if dims.len() > 255 {
                    return Err(FormatError::FieldOutOfRange(
                        "array datatype dimensionality",
                    ));
                }
                w.write_u8(dims.len() as u8);
                for dim in dims {
                    w.write_u32(*dim);
                }
                base.emit(w)?;
            }
            DatatypeClass::Raw { properties, .. } => {
                w.write_bytes(properties);
            }
        }
        Ok(())
    }

    /// Exact byte length `encode` will produce.
    pub fn encoded_size(&self) -> usize {
        8 + match &self.class {
            DatatypeClass::Fixed { .. } => 4,
            DatatypeClass::Float { .. } => 12,
            DatatypeClass::String { .. } => 1,
            DatatypeClass::Opaque { tag } => pad8(tag.len() + 1),
            DatatypeClass::Compound { members } => match self.version {
                1 => members
                    .iter()
                    .map(|m| pad8(m.name.len() + 1) + 4 + 28 + m.datatype.encoded_size())
                    .sum(),
                _ => {
                    4 + members
                        .iter()
                        .map(|m| m.name.len() + 1 + 4 + m.datatype.encoded_size())
                        .sum::<usize>()
                }
            },
            DatatypeClass::Reference => 0,
            DatatypeClass::Enum { base, members } => {
                base.encoded_size()
                    + members
                        .iter()
                        .map(|m| pad8(m.name.len() + 1) + base.size as usize)
                        .sum::<usize>()
            }
            DatatypeClass::VariableLength { base, .. } => 4 + base.encoded_size(),
            DatatypeClass::Array { dims, base } => 1 + 4 * dims.len() + base.encoded_size(),
            DatatypeClass::Raw { properties, .. } => properties.len(),
        }
    }

    /// Byte order for classes that have one.
    pub fn byte_order(&self) -> Option<ByteOrder> {
        match &self.class {
            DatatypeClass::Fixed { byte_order, .. } | DatatypeClass::Float { byte_order, .. } => {
                Some(*byte_order)
            }
            _ => None,
        }
    }
}

const fn byte_order_bit(class_bit_field: u32) -> ByteOrder {
    if class_bit_field & 0x1 != 0 {
        ByteOrder::BigEndian
    } else {
        ByteOrder::LittleEndian
    }
}

/// Member and enum names are NUL-terminated and zero-padded to 8 bytes
/// in the layouts that predate version 3.
fn read_padded_name(r: &mut ByteReader<'_>) -> Result<String> {
    let start = r.position();
    let bytes = r.read_cstr()?;
    let name = String::from_utf8(bytes.to_vec())
        .map_err(|_| FormatError::FieldOutOfRange("datatype name encoding"))?;
    let consumed = r.position() - start;
    r.skip(pad8(consumed) - consumed)?;
    Ok(name)
}

fn write_padded_name(w: &mut ByteWriter, name: &str) {
    let padded = pad8(name.len() + 1);
    w.write_bytes(name.as_bytes());
    w.write_zeros(padded - name.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn round_trip(dt: &Datatype) -> Datatype {
        let buf = dt.encode().unwrap();
        assert_eq!(buf.len(), dt.encoded_size());
        Datatype::parse(&buf).unwrap()
    }

    #[test]
    fn test_int32_layout() {
        let dt = Datatype::int32();
        let buf = dt.encode().unwrap();
        assert_eq!(buf.len(), 12);
        assert_eq!(buf[0], 0x10); // version 1, class 0
        assert_eq!(buf[1], 0x08); // signed
        assert_eq!(&buf[4..8], &4u32.to_le_bytes());
        assert_eq!(round_trip(&dt), dt);
    }

    #[test]
    fn test_fixed_round_trips() {
        for dt in [
            Datatype::int32(),
            Datatype::int64(),
            Datatype::fixed(2, false),
            Datatype::fixed(1, true),
        ] {
            assert_eq!(round_trip(&dt), dt);
        }
    }

    #[test]
    fn test_ieee_float_properties() {
        let f32_t = Datatype::ieee_float(4).unwrap();
        match f32_t.class {
            DatatypeClass::Float {
                exponent_size,
                mantissa_size,
                exponent_bias,
                exponent_location,
                ..
            } => {
                assert_eq!(exponent_size, 8);
                assert_eq!(mantissa_size, 23);
                assert_eq!(exponent_bias, 127);
                assert_eq!(exponent_location, 23);
            }
            _ => panic!("expected float"),
        }

        let f64_t = Datatype::ieee_float(8).unwrap();
        match f64_t.class {
            DatatypeClass::Float {
                exponent_size,
                mantissa_size,
                exponent_bias,
                ..
            } => {
                assert_eq!(exponent_size, 11);
                assert_eq!(mantissa_size, 52);
                assert_eq!(exponent_bias, 1023);
            }
            _ => panic!("expected float"),
        }

        assert_eq!(round_trip(&f32_t), f32_t);
        assert_eq!(round_trip(&f64_t), f64_t);
        assert!(Datatype::ieee_float(2).is_err());
    }

    #[test]
    fn test_string_round_trip() {
        let dt = Datatype::string(16, StringPadding::SpacePadded, CharacterSet::Utf8);
        let back = round_trip(&dt);
        assert_eq!(back, dt);
        assert_eq!(dt.encoded_size(), 9);
    }

    #[test]
    fn test_opaque_round_trip() {
        let dt = Datatype::opaque(6, "pixel");
        assert_eq!(dt.class_bit_field, 8);
        assert_eq!(round_trip(&dt), dt);

        let long = Datatype::opaque(1, "a longer opaque tag");
        assert_eq!(round_trip(&long), long);
    }

    #[test]
    fn test_reference_round_trip() {
        let dt = Datatype::reference(8);
        assert_eq!(dt.encoded_size(), 8);
        assert_eq!(round_trip(&dt), dt);
    }

    #[test]
    fn test_compound_v3_nested_depth_4() {
        let inner = Datatype::compound(
            8,
            vec![
                CompoundMember {
                    name: String::from("x"),
                    byte_offset: 0,
                    datatype: Datatype::int32(),
                },
                CompoundMember {
                    name: String::from("y"),
                    byte_offset: 4,
                    datatype: Datatype::int32(),
                },
            ],
        );
        let level2 = Datatype::compound(
            16,
            vec![
                CompoundMember {
                    name: String::from("point"),
                    byte_offset: 0,
                    datatype: inner,
                },
                CompoundMember {
                    name: String::from("weight"),
                    byte_offset: 8,
                    datatype: Datatype::ieee_float(8).unwrap(),
                },
            ],
        );
        let level3 = Datatype::compound(
            20,
            vec![
                CompoundMember {
                    name: String::from("sample"),
                    byte_offset: 0,
                    datatype: level2,
                },
                CompoundMember {
                    name: String::from("id"),
                    byte_offset: 16,
                    datatype: Datatype::fixed(4, false),
                },
            ],
        );
        let level4 = Datatype::compound(
            24,
            vec![
                CompoundMember {
                    name: String::from("record"),
                    byte_offset: 0,
                    datatype: level3,
                },
                CompoundMember {
                    name: String::from("tag"),
                    byte_offset: 20,
                    datatype: Datatype::string(4, StringPadding::NullTerminated, CharacterSet::Ascii),
                },
            ],
        );
        let back = round_trip(&level4);
        assert_eq!(back, level4);
    }

    #[test]
    fn test_compound_v1_scalar_members() {
        let dt = Datatype::compound_v1(
            12,
            vec![
                CompoundMember {
                    name: String::from("count"),
                    byte_offset: 0,
                    datatype: Datatype::int32(),
                },
                CompoundMember {
                    name: String::from("value"),
                    byte_offset: 4,
                    datatype: Datatype::ieee_float(8).unwrap(),
                },
            ],
        );
        let buf = dt.encode().unwrap();
        // Member count is carried in the class bit field, not the body.
        assert_eq!(buf[1], 2);
        assert_eq!(round_trip(&dt), dt);
    }

    #[test]
    fn test_compound_v2_rejected() {
        let mut buf = Datatype::compound(4, vec![]).encode().unwrap();
        buf[0] = 0x26; // version 2, class compound
        assert_eq!(
            Datatype::parse(&buf),
            Err(FormatError::Unsupported("compound datatype version 2"))
        );
    }

    #[test]
    fn test_enum_round_trip() {
        let dt = Datatype::enumeration(
            Datatype::int32(),
            vec![
                EnumMember {
                    name: String::from("RED"),
                    value: 0i32.to_le_bytes().to_vec(),
                },
                EnumMember {
                    name: String::from("GREEN"),
                    value: 1i32.to_le_bytes().to_vec(),
                },
                EnumMember {
                    name: String::from("BLUE"),
                    value: 2i32.to_le_bytes().to_vec(),
                },
            ],
        );
        assert_eq!(dt.class_bit_field & 0xFFFF, 3);
        assert_eq!(round_trip(&dt), dt);
    }

    #[test]
    fn test_enum_value_width_checked() {
        let dt = Datatype::enumeration(
            Datatype::int32(),
            vec![EnumMember {
                name: String::from("BAD"),
                value: vec![1, 2],
            }],
        );
        assert!(matches!(dt.encode(), Err(FormatError::Inconsistent(_))));
    }

    #[test]
    fn test_array_round_trip() {
        let dt = Datatype::array(Datatype::ieee_float(4).unwrap(), vec![3, 4]);
        assert_eq!(dt.size, 48);
        assert_eq!(round_trip(&dt), dt);
    }

    #[test]
    fn test_vlen_string_detection() {
        let dt = Datatype::variable_length(
            VlenKind::String,
            Datatype::string(1, StringPadding::NullTerminated, CharacterSet::Ascii),
        );
        let back = round_trip(&dt);
        match back.class {
            DatatypeClass::VariableLength { kind, .. } => assert_eq!(kind, VlenKind::String),
            _ => panic!("expected variable-length"),
        }

        let seq = Datatype::variable_length(VlenKind::Sequence, Datatype::int32());
        let back = round_trip(&seq);
        match back.class {
            DatatypeClass::VariableLength { kind, .. } => assert_eq!(kind, VlenKind::Sequence),
            _ => panic!("expected variable-length"),
        }
    }

    #[test]
    fn test_time_keeps_raw_properties() {
        let dt = Datatype {
            version: 1,
            class_bit_field: 0,
            size: 4,
            class: DatatypeClass::Raw {
                class_id: class_id::TIME,
                properties: vec![0x20, 0x00],
            },
        };
        assert_eq!(round_trip(&dt), dt);
    }

    #[test]
    fn test_truncated_datatype() {
        let buf = Datatype::int32().encode().unwrap();
        assert!(matches!(
            Datatype::parse(&buf[..6]),
            Err(FormatError::Truncated(_))
        ));
    }
}
