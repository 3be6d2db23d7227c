//! Signatures, type codes and sentinels of the HDF5 format

/// File format signature at the start of every superblock
pub const SUPERBLOCK_SIGNATURE: [u8; 8] = *b"\x89HDF\r\n\x1a\n";

/// Version 2 object header prefix
pub const OBJECT_HEADER_V2_SIGNATURE: [u8; 4] = *b"OHDR";

/// Version 2 object header continuation block prefix
pub const CONTINUATION_V2_SIGNATURE: [u8; 4] = *b"OCHK";

/// B-tree v1 node
pub const BTREE_V1_SIGNATURE: [u8; 4] = *b"TREE";

/// B-tree v2 header / internal node / leaf node
pub const BTREE_V2_HEADER_SIGNATURE: [u8; 4] = *b"BTHD";
pub const BTREE_V2_INTERNAL_SIGNATURE: [u8; 4] = *b"BTIN";
pub const BTREE_V2_LEAF_SIGNATURE: [u8; 4] = *b"BTLF";

/// Fractal heap header and direct block
pub const FRACTAL_HEAP_SIGNATURE: [u8; 4] = *b"FRHP";
pub const DIRECT_BLOCK_SIGNATURE: [u8; 4] = *b"FHDB";

/// Local heap (symbol-table name pool)
pub const LOCAL_HEAP_SIGNATURE: [u8; 4] = *b"HEAP";

/// Global heap collection (variable-length object pool)
pub const GLOBAL_HEAP_SIGNATURE: [u8; 4] = *b"GCOL";

/// Symbol table node
pub const SYMBOL_TABLE_NODE_SIGNATURE: [u8; 4] = *b"SNOD";

/// Header message type codes
pub mod msg {
    pub const NIL: u16 = 0x00;
    pub const DATASPACE: u16 = 0x01;
    pub const LINK_INFO: u16 = 0x02;
    pub const DATATYPE: u16 = 0x03;
    pub const FILL_VALUE_OLD: u16 = 0x04;
    pub const FILL_VALUE: u16 = 0x05;
    pub const LINK: u16 = 0x06;
    pub const DATA_LAYOUT: u16 = 0x08;
    pub const FILTER_PIPELINE: u16 = 0x0B;
    pub const ATTRIBUTE: u16 = 0x0C;
    pub const OBJECT_COMMENT: u16 = 0x0D;
    pub const CONTINUATION: u16 = 0x10;
    pub const SYMBOL_TABLE: u16 = 0x11;
    pub const MODIFICATION_TIME: u16 = 0x12;
    pub const ATTRIBUTE_INFO: u16 = 0x15;
}

/// Filter identifiers understood by the pipeline
pub mod filter {
    pub const DEFLATE: u16 = 1;
    pub const SHUFFLE: u16 = 2;
    pub const FLETCHER32: u16 = 3;
    pub const SZIP: u16 = 4;
    pub const BZIP2: u16 = 307;
    pub const LZF: u16 = 32000;
}

/// v4 superblock checksum algorithm codes
pub mod checksum_algorithm {
    pub const CRC32: u8 = 1;
    pub const FLETCHER32: u8 = 2;
}
