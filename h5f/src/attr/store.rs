//! Capability seams for dense-attribute mutation
//!
//! The mutation operations depend on two narrow interfaces: a heap
//! store over the attribute bodies and a name index over their heap
//! ids. Keeping them abstract lets tests drive the mutation logic
//! without materializing on-disk structures; the on-disk
//! implementations live in `attr::dense`.

use std::collections::HashMap;

use h5f_core::FormatError;

use crate::error::Result;

/// Variable-size object store keyed by heap-id bytes.
pub trait HeapStore {
    /// Fetch a live object's bytes.
    fn get(&mut self, heap_id: &[u8]) -> Result<Vec<u8>>;

    /// Replace a live object's bytes in place; the new bytes must have
    /// the same length.
    fn overwrite(&mut self, heap_id: &[u8], data: &[u8]) -> Result<()>;

    /// Store a new object, returning its heap id.
    fn insert(&mut self, data: &[u8]) -> Result<Vec<u8>>;

    /// Free a live object. Later `get`s of the same id fail.
    fn delete(&mut self, heap_id: &[u8]) -> Result<()>;
}

/// Name-to-heap-id index with the deletion policies of the B-tree v2.
pub trait NameIndex {
    /// The heap id recorded under `name`, or `None`.
    fn search(&mut self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Re-point an existing record at a new heap id.
    fn update(&mut self, name: &str, heap_id: u64) -> Result<()>;

    /// Remove a record without rebalancing.
    fn delete(&mut self, name: &str) -> Result<()>;

    /// Remove a record, keeping nodes at least half full.
    fn delete_with_rebalancing(&mut self, name: &str) -> Result<()>;

    /// Remove a record, tolerating under-full nodes for speed.
    fn delete_lazy(&mut self, name: &str) -> Result<()>;

    fn lazy_rebalancing_enabled(&self) -> bool;
}

/// In-memory reference implementation of [`HeapStore`].
#[derive(Debug, Default)]
pub struct MemHeapStore {
    objects: HashMap<Vec<u8>, Vec<u8>>,
    next_id: u64,
}

impl MemHeapStore {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
        }
    }

    /// Seed an object under a caller-chosen id.
    pub fn insert_with_id(&mut self, heap_id: &[u8], data: Vec<u8>) {
        self.objects.insert(heap_id.to_vec(), data);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl HeapStore for MemHeapStore {
    fn get(&mut self, heap_id: &[u8]) -> Result<Vec<u8>> {
        self.objects
            .get(heap_id)
            .cloned()
            .ok_or_else(|| FormatError::NotFound("fractal heap object").into())
    }

    fn overwrite(&mut self, heap_id: &[u8], data: &[u8]) -> Result<()> {
        let object = self
            .objects
            .get_mut(heap_id)
            .ok_or(FormatError::NotFound("fractal heap object"))?;
        if object.len() != data.len() {
            return Err(FormatError::Inconsistent(
                "overwrite must preserve the object length",
            )
            .into());
        }
        object.copy_from_slice(data);
        Ok(())
    }

    fn insert(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let id = self.next_id;
        self.next_id += 1;
        let heap_id = id.to_le_bytes().to_vec();
        self.objects.insert(heap_id.clone(), data.to_vec());
        Ok(heap_id)
    }

    fn delete(&mut self, heap_id: &[u8]) -> Result<()> {
        self.objects
            .remove(heap_id)
            .map(|_| ())
            .ok_or_else(|| FormatError::NotFound("fractal heap object").into())
    }
}

/// In-memory reference implementation of [`NameIndex`].
#[derive(Debug, Default)]
pub struct MemNameIndex {
    records: HashMap<String, Vec<u8>>,
    lazy: bool,
}

impl MemNameIndex {
    pub fn new(lazy: bool) -> Self {
        Self {
            records: HashMap::new(),
            lazy,
        }
    }

    /// Seed a record.
    pub fn insert(&mut self, name: &str, heap_id: &[u8]) {
        self.records.insert(name.to_string(), heap_id.to_vec());
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        self.records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| FormatError::NotFound("name index record").into())
    }
}

impl NameIndex for MemNameIndex {
    fn search(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records.get(name).cloned())
    }

    fn update(&mut self, name: &str, heap_id: u64) -> Result<()> {
        let record = self
            .records
            .get_mut(name)
            .ok_or(FormatError::NotFound("name index record"))?;
        *record = heap_id.to_le_bytes().to_vec();
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.remove(name)
    }

    fn delete_with_rebalancing(&mut self, name: &str) -> Result<()> {
        self.remove(name)
    }

    fn delete_lazy(&mut self, name: &str) -> Result<()> {
        self.remove(name)
    }

    fn lazy_rebalancing_enabled(&self) -> bool {
        self.lazy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_heap_round_trip() {
        let mut heap = MemHeapStore::new();
        let id = heap.insert(b"payload").unwrap();
        assert_eq!(id.len(), 8);
        assert_eq!(heap.get(&id).unwrap(), b"payload");

        heap.overwrite(&id, b"PAYLOAD").unwrap();
        assert_eq!(heap.get(&id).unwrap(), b"PAYLOAD");
        assert!(heap.overwrite(&id, b"too long!").is_err());

        heap.delete(&id).unwrap();
        assert!(heap.get(&id).is_err());
        assert!(heap.delete(&id).is_err());
    }

    #[test]
    fn test_mem_index_round_trip() {
        let mut index = MemNameIndex::new(false);
        index.insert("count", &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            index.search("count").unwrap(),
            Some(vec![1, 0, 0, 0, 0, 0, 0, 0])
        );
        assert_eq!(index.search("missing").unwrap(), None);

        index.update("count", 0x0202).unwrap();
        assert_eq!(
            index.search("count").unwrap().unwrap()[..2],
            [0x02, 0x02]
        );

        index.delete("count").unwrap();
        assert!(index.delete("count").is_err());
        assert!(!index.lazy_rebalancing_enabled());
    }
}
