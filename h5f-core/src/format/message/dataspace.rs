//! Dataspace message codec (type 0x01)

use alloc::vec::Vec;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{FormatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    Scalar,
    Simple,
    Null,
}

/// The extent of a dataset or attribute: rank, current dimensions and
/// optional maximum dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub version: u8,
    pub space_type: DataspaceType,
    pub dims: Vec<u64>,
    pub max_dims: Option<Vec<u64>>,
}

impl Dataspace {
    /// A rank-N simple dataspace with no maximum dimensions.
    pub fn simple(dims: Vec<u64>) -> Self {
        Self {
            version: 1,
            space_type: DataspaceType::Simple,
            dims,
            max_dims: None,
        }
    }

    pub fn scalar() -> Self {
        Self {
            version: 1,
            space_type: DataspaceType::Scalar,
            dims: Vec::new(),
            max_dims: None,
        }
    }

    /// Total number of elements: the dimension product, 1 for scalar and
    /// 0 for null dataspaces.
    pub fn element_count(&self) -> u64 {
        match self.space_type {
            DataspaceType::Scalar => 1,
            DataspaceType::Null => 0,
            DataspaceType::Simple => self.dims.iter().product(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, "dataspace message");
        let version = r.read_u8()?;
        match version {
            1 => Self::parse_v1(&mut r),
            2 => Self::parse_v2(&mut r),
            _ => Err(FormatError::UnsupportedVersion {
                structure: "dataspace",
                version,
            }),
        }
    }

    fn parse_v1(r: &mut ByteReader<'_>) -> Result<Self> {
        let rank = r.read_u8()? as usize;
        let flags = r.read_u8()?;
        r.skip(5)?; // reserved
        let dims = read_dims(r, rank)?;
        let max_dims = if flags & 0x1 != 0 {
            Some(read_dims(r, rank)?)
        } else {
            None
        };
        // Version 1 has no explicit type byte: rank zero means scalar.
        let space_type = if rank == 0 {
            DataspaceType::Scalar
        } else {
            DataspaceType::Simple
        };
        Ok(Self {
            version: 1,
            space_type,
            dims,
            max_dims,
        })
    }

    fn parse_v2(r: &mut ByteReader<'_>) -> Result<Self> {
        let rank = r.read_u8()? as usize;
        let flags = r.read_u8()?;
        let space_type = match r.read_u8()? {
            0 => DataspaceType::Scalar,
            1 => DataspaceType::Simple,
            2 => DataspaceType::Null,
            _ => return Err(FormatError::FieldOutOfRange("dataspace type")),
        };
        let dims = read_dims(r, rank)?;
        let max_dims = if flags & 0x1 != 0 {
            Some(read_dims(r, rank)?)
        } else {
            None
        };
        Ok(Self {
            version: 2,
            space_type,
            dims,
            max_dims,
        })
    }

    /// Encode in the version-1 layout. A scalar dataspace is written as
    /// the rank-1 extent `[1]`.
    pub fn encode(&self) -> Vec<u8> {
        let (dims, max_dims) = match self.space_type {
            DataspaceType::Scalar => (&[1u64][..], None),
            _ => (&self.dims[..], self.max_dims.as_deref()),
        };

        let mut w = ByteWriter::with_capacity(self.encoded_size());
        w.write_u8(1);
        w.write_u8(dims.len() as u8);
        w.write_u8(if max_dims.is_some() { 0x1 } else { 0 });
        w.write_zeros(5);
        for dim in dims {
            w.write_u64(*dim);
        }
        if let Some(max_dims) = max_dims {
            for dim in max_dims {
                w.write_u64(*dim);
            }
        }
        w.finish()
    }

    /// Exact byte length `encode` will produce.
    pub fn encoded_size(&self) -> usize {
        let rank = match self.space_type {
            DataspaceType::Scalar => 1,
            _ => self.dims.len(),
        };
        let max_rank = match self.space_type {
            DataspaceType::Scalar => 0,
            _ if self.max_dims.is_some() => rank,
            _ => 0,
        };
        8 + 8 * (rank + max_rank)
    }
}

fn read_dims(r: &mut ByteReader<'_>, rank: usize) -> Result<Vec<u64>> {
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(r.read_u64()?);
    }
    Ok(dims)
}
