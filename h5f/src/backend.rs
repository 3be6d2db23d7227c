//! Random-access byte sources and sinks
//!
//! Every engine operation runs over these two narrow traits: "fill this
//! buffer from the given offset" and "write these bytes at the given
//! offset, extending as needed". Implementations cover in-memory
//! buffers, plain files and read-only memory maps.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

/// Random-access read capability.
pub trait ByteSource {
    /// Fill `buf` from `address`, failing if the range is not fully
    /// available.
    fn read_at(&mut self, address: u64, buf: &mut [u8]) -> Result<()>;

    /// Total size of the underlying data in bytes.
    fn size(&mut self) -> Result<u64>;

    /// Read `len` bytes at `address` into a fresh buffer.
    fn read_vec(&mut self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(address, &mut buf)?;
        Ok(buf)
    }
}

/// Random-access write capability. Writes past the current end extend
/// the underlying data.
pub trait ByteSink {
    fn write_at(&mut self, address: u64, data: &[u8]) -> Result<()>;
}

fn short_read_error() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "read past end of byte source",
    )
}

/// Growable in-memory backend, readable and writable.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Vec<u8>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSource for MemoryBackend {
    fn read_at(&mut self, address: u64, buf: &mut [u8]) -> Result<()> {
        let start = address as usize;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(short_read_error)?;
        if end > self.data.len() {
            return Err(short_read_error().into());
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }
}

impl ByteSink for MemoryBackend {
    fn write_at(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let start = address as usize;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }
}

/// File-backed backend using seek + read/write.
#[derive(Debug)]
pub struct FileBackend {
    file: File,
}

impl FileBackend {
    /// Open an existing file read-only for the source side.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Open (or create) a file for reading and writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        })
    }

    /// Open an existing file for reading and writing.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: OpenOptions::new().read(true).write(true).open(path)?,
        })
    }
}

impl ByteSource for FileBackend {
    fn read_at(&mut self, address: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(address))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

impl ByteSink for FileBackend {
    fn write_at(&mut self, address: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(address))?;
        self.file.write_all(data)?;
        Ok(())
    }
}

/// Read-only memory-mapped backend for zero-copy access to large files.
#[cfg(feature = "mmap")]
#[derive(Debug)]
pub struct MmapBackend {
    mmap: memmap2::Mmap,
}

#[cfg(feature = "mmap")]
impl MmapBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and lives as long as self;
        // concurrent truncation of the file is outside the engine's
        // exclusive-access contract.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

#[cfg(feature = "mmap")]
impl ByteSource for MmapBackend {
    fn read_at(&mut self, address: u64, buf: &mut [u8]) -> Result<()> {
        let start = address as usize;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(short_read_error)?;
        if end > self.mmap.len() {
            return Err(short_read_error().into());
        }
        buf.copy_from_slice(&self.mmap[start..end]);
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.mmap.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_round_trip() {
        let mut backend = MemoryBackend::new();
        backend.write_at(4, b"abcd").unwrap();
        assert_eq!(backend.size().unwrap(), 8);
        // The gap before the write reads as zeros.
        assert_eq!(backend.read_vec(0, 8).unwrap(), b"\0\0\0\0abcd");

        backend.write_at(6, b"XY").unwrap();
        assert_eq!(backend.read_vec(4, 4).unwrap(), b"abXY");
    }

    #[test]
    fn test_memory_backend_short_read() {
        let mut backend = MemoryBackend::from_vec(vec![1, 2, 3]);
        assert!(backend.read_vec(2, 4).is_err());
        assert!(backend.read_vec(100, 1).is_err());
    }

    #[cfg(feature = "mmap")]
    #[test]
    fn test_mmap_backend_reads() {
        let dir = std::env::temp_dir().join("h5f-backend-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mmap.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut backend = MmapBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 10);
        assert_eq!(backend.read_vec(3, 4).unwrap(), b"3456");
        assert!(backend.read_vec(8, 4).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = std::env::temp_dir().join("h5f-backend-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.bin");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.write_at(0, b"hello").unwrap();
        backend.write_at(8, b"world").unwrap();
        assert_eq!(backend.size().unwrap(), 13);

        let mut reader = FileBackend::open(&path).unwrap();
        assert_eq!(reader.read_vec(8, 5).unwrap(), b"world");
        std::fs::remove_file(&path).unwrap();
    }
}
