//! An in-memory [`BlobStore`], for process-lifetime caches and tests.
use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use crate::cancel::CancelToken;
use crate::index::CacheItem;
use crate::size::Size;
use crate::traits::BlobStore;

type BlobMap = HashMap<(String, Size), Vec<u8>, ahash::RandomState>;

/// Keeps every blob in a hash map keyed by `(key, image_size)`.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<BlobMap>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        Default::default()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    fn ident(item: &CacheItem) -> (String, Size) {
        (item.key.clone(), item.image_size)
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, item: &CacheItem) -> io::Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(&Self::ident(item)).cloned())
    }

    fn put(&self, item: &CacheItem, bytes: &[u8]) -> io::Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(Self::ident(item), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, item: &CacheItem) -> io::Result<()> {
        self.blobs.lock().unwrap().remove(&Self::ident(item));
        Ok(())
    }

    fn enumerate(&self, cancel: &CancelToken) -> io::Result<Vec<CacheItem>> {
        let blobs = self.blobs.lock().unwrap();
        let mut items = Vec::with_capacity(blobs.len());
        for ((key, size), bytes) in blobs.iter() {
            if cancel.is_cancelled() {
                break;
            }
            items.push(CacheItem::new(key.clone(), *size, bytes.len() as u64));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_roundtrip() {
        let store = MemoryStore::new();
        let item = CacheItem::new("k", Size::new(10, 20), 3);

        assert!(store.get(&item).unwrap().is_none());
        store.put(&item, &[1, 2, 3]).unwrap();
        assert_eq!(store.get(&item).unwrap().unwrap(), vec![1, 2, 3]);

        store.delete(&item).unwrap();
        assert!(store.get(&item).unwrap().is_none());
        // Deleting again is fine.
        store.delete(&item).unwrap();
    }

    #[test]
    fn variants_of_one_key_are_distinct_blobs() {
        let store = MemoryStore::new();
        let small = CacheItem::new("k", Size::new(10, 20), 1);
        let large = CacheItem::new("k", Size::new(20, 40), 1);

        store.put(&small, &[1]).unwrap();
        store.put(&large, &[2]).unwrap();

        assert_eq!(store.blob_count(), 2);
        assert_eq!(store.get(&small).unwrap().unwrap(), vec![1]);
        assert_eq!(store.get(&large).unwrap().unwrap(), vec![2]);
    }

    #[test]
    fn enumerate_reports_current_blobs_and_honors_cancellation() {
        let store = MemoryStore::new();
        store
            .put(&CacheItem::new("a", Size::new(10, 20), 2), &[1, 2])
            .unwrap();
        store
            .put(&CacheItem::new("b", Size::new(20, 40), 3), &[1, 2, 3])
            .unwrap();

        let items = store.enumerate(&CancelToken::new()).unwrap();
        assert_eq!(items.len(), 2);

        let cancelled = CancelToken::new();
        cancelled.cancel();
        assert!(store.enumerate(&cancelled).unwrap().is_empty());
    }
}
