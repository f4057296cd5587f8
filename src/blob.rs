use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// Object-storage seam for document bytes. Production backends (S3,
/// Cloudinary, …) live behind this trait; the server ships with the
/// in-memory backend, which is also what the test suite uses.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    fn fetch(&self, key: &str) -> Result<Option<(Vec<u8>, String)>>;
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.blobs
            .write()
            .expect("blob lock poisoned")
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<(Vec<u8>, String)>> {
        Ok(self
            .blobs
            .read()
            .expect("blob lock poisoned")
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .write()
            .expect("blob lock poisoned")
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_fetch_delete() {
        let store = MemoryBlobStore::new();
        store.put("a/b", b"bytes".to_vec(), "text/plain").unwrap();
        let (bytes, ct) = store.fetch("a/b").unwrap().unwrap();
        assert_eq!(bytes, b"bytes");
        assert_eq!(ct, "text/plain");

        store.delete("a/b").unwrap();
        assert!(store.fetch("a/b").unwrap().is_none());
        // Deleting again is a no-op, which keeps the sweep idempotent.
        store.delete("a/b").unwrap();
    }
}
