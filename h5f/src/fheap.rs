//! Fractal heap reading over a byte source
//!
//! Dense attribute storage keeps its objects in a fractal heap whose
//! root is a single direct block for every file this engine writes and
//! for typical small dense attribute sets from other writers. A root
//! that turns out to be an indirect block is reported as unsupported
//! rather than misread.

use h5f_core::codec::UNDEF_ADDRESS;
use h5f_core::{DirectBlock, FormatError, FractalHeapHeader, HeapId, Superblock};

use crate::backend::ByteSource;
use crate::error::Result;

const INDIRECT_BLOCK_SIGNATURE: [u8; 4] = *b"FHIB";

pub struct FractalHeapReader {
    header: FractalHeapHeader,
    header_address: u64,
}

impl FractalHeapReader {
    pub fn open<B: ByteSource>(
        source: &mut B,
        sb: &Superblock,
        address: u64,
    ) -> Result<Self> {
        if address == UNDEF_ADDRESS {
            return Err(FormatError::InvalidAddress("fractal heap address is undefined").into());
        }
        let image = source.read_vec(address, FractalHeapHeader::encoded_size(sb))?;
        let header = FractalHeapHeader::parse(&image, sb)?;
        Ok(Self {
            header,
            header_address: address,
        })
    }

    pub fn header(&self) -> &FractalHeapHeader {
        &self.header
    }

    pub fn header_address(&self) -> u64 {
        self.header_address
    }

    /// Read the root direct block's prefix, rejecting indirect roots.
    pub fn root_block<B: ByteSource>(
        &self,
        source: &mut B,
        sb: &Superblock,
    ) -> Result<(u64, DirectBlock)> {
        let root = self.header.root_block_address;
        if root == UNDEF_ADDRESS {
            return Err(FormatError::NotFound("fractal heap root block").into());
        }
        let prefix_len = DirectBlock::header_size(&self.header, sb);
        let prefix = source.read_vec(root, prefix_len)?;
        if prefix.starts_with(&INDIRECT_BLOCK_SIGNATURE) {
            return Err(FormatError::Unsupported(
                "fractal heaps with indirect block trees",
            )
            .into());
        }
        let block = DirectBlock::parse(&prefix, &self.header, sb)?;
        Ok((root, block))
    }

    /// Fetch the bytes of a managed object by its heap id.
    pub fn read_object<B: ByteSource>(
        &self,
        source: &mut B,
        sb: &Superblock,
        id_bytes: &[u8],
    ) -> Result<Vec<u8>> {
        let id = HeapId::parse(id_bytes, &self.header)?;
        let (root_address, block) = self.root_block(source, sb)?;
        let payload = block.payload_address(root_address, &self.header, sb, &id)?;
        source.read_vec(payload, id.length as usize)
    }
}
