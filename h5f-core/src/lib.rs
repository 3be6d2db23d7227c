#![no_std]

//! H5F Core - HDF5 On-Disk Format Definitions
//!
//! This crate provides the pure codec layer of the HDF5 format engine:
//! superblocks, object headers and their message stream, datatype and
//! dataspace descriptors, B-tree v1/v2 nodes, fractal/local/global heaps
//! and the metadata checksums they carry. Everything here operates on
//! byte slices; file access lives in the `h5f` crate.

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod checksum;
pub mod codec;
pub mod error;
pub mod format;

pub use error::{ErrorCategory, FormatError, Result};
pub use format::*;
