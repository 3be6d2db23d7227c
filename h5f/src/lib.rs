//! H5F - HDF5 format engine with memory mapping and I/O support
//!
//! This crate layers file access over the pure codecs of `h5f-core`:
//! random-access byte sources and sinks, superblock discovery, object
//! header reading with continuation following, the chunked/contiguous/
//! compact dataset reader with its filter pipeline, compact and dense
//! attribute mutation, and the minimal-file writer.

// Re-export the format layer
pub use h5f_core::*;

pub mod attr;
pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fheap;
pub mod file;
pub mod filters;
pub mod gheap;
pub mod group;
pub mod object;
pub mod writer;

pub use attr::store::{HeapStore, MemHeapStore, MemNameIndex, NameIndex};
pub use backend::{ByteSink, ByteSource, FileBackend, MemoryBackend};
#[cfg(feature = "mmap")]
pub use backend::MmapBackend;
pub use config::{EngineConfig, LinkStorage};
pub use dataset::{DataValue, DatasetReader};
pub use error::{Error, Result};
pub use fheap::FractalHeapReader;
pub use file::Hdf5File;
pub use gheap::GlobalHeapCache;
pub use object::{read_object_header, ObjectKind};
pub use writer::FileWriter;
