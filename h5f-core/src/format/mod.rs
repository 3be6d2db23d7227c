//! On-disk structure definitions for the HDF5 file format
//!
//! This module contains the codec for every structure the engine touches:
//! the superblock anchor, object headers and their messages, both B-tree
//! generations, and the three heap flavors. All codecs are pure functions
//! between byte slices and structs; none perform I/O.

pub mod btree1;
pub mod btree2;
pub mod constants;
pub mod fractal_heap;
pub mod global_heap;
pub mod local_heap;
pub mod message;
pub mod object_header;
pub mod superblock;
pub mod symbol_table;

pub use btree1::{compare_coords, BtreeV1Node, ChunkKey};
pub use btree2::{BtreeV2Header, InternalNode, LeafNode, NameRecord};
pub use fractal_heap::{DirectBlock, FractalHeapHeader, HeapId};
pub use global_heap::{GlobalHeapCollection, VlenRef};
pub use local_heap::LocalHeap;
pub use message::{decode_message, Message};
pub use object_header::{HeaderMessage, ObjectHeader};
pub use superblock::{Superblock, SuperblockLayout};
pub use symbol_table::{SymbolTableEntry, SymbolTableMessage, SymbolTableNode};
