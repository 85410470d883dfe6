//! Filesystem store with two-character directory sharding.
//!
//! ```text
//! {base_path}/
//! ├── objects/ab/cdef...        # raw bytes
//! └── metadata/ab/cdef....json  # {mime_type, size}
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::CasConfig;
use crate::hash::ContentHash;

/// What is known about a stored object without reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub hash: ContentHash,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    mime_type: String,
    size: u64,
}

const UNKNOWN_MIME: &str = "application/octet-stream";

/// Storage backend for ingested files.
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning their hash. Existing content is not rewritten.
    fn store(&self, data: &[u8], mime_type: &str) -> Result<ContentHash>;

    /// `Ok(None)` when the hash is unknown.
    fn retrieve(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>>;

    fn exists(&self, hash: &ContentHash) -> bool;

    /// `Ok(None)` when the hash is unknown.
    fn inspect(&self, hash: &ContentHash) -> Result<Option<ObjectInfo>>;

    /// Delete an object and its metadata. Returns whether anything was removed.
    fn remove(&self, hash: &ContentHash) -> Result<bool>;
}

impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    fn store(&self, data: &[u8], mime_type: &str) -> Result<ContentHash> {
        (**self).store(data, mime_type)
    }

    fn retrieve(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        (**self).retrieve(hash)
    }

    fn exists(&self, hash: &ContentHash) -> bool {
        (**self).exists(hash)
    }

    fn inspect(&self, hash: &ContentHash) -> Result<Option<ObjectInfo>> {
        (**self).inspect(hash)
    }

    fn remove(&self, hash: &ContentHash) -> Result<bool> {
        (**self).remove(hash)
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    config: CasConfig,
}

impl FileStore {
    /// Open a store, creating its directories unless read-only.
    pub fn new(config: CasConfig) -> Result<Self> {
        if !config.read_only {
            fs::create_dir_all(config.objects_dir())
                .context("failed to create CAS objects directory")?;
            fs::create_dir_all(config.metadata_dir())
                .context("failed to create CAS metadata directory")?;
        }
        Ok(Self { config })
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::with_base_path(path))
    }

    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::read_only(path))
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.config
            .objects_dir()
            .join(hash.prefix())
            .join(hash.remainder())
    }

    fn metadata_path(&self, hash: &ContentHash) -> PathBuf {
        self.config
            .metadata_dir()
            .join(hash.prefix())
            .join(format!("{}.json", hash.remainder()))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            bail!("CAS is in read-only mode");
        }
        Ok(())
    }
}

/// Remove a file, treating "already gone" as success.
fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

impl ContentStore for FileStore {
    fn store(&self, data: &[u8], mime_type: &str) -> Result<ContentHash> {
        self.ensure_writable()?;

        let hash = ContentHash::of(data);
        let object = self.object_path(&hash);
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).context("failed to create object shard directory")?;
        }
        if !object.exists() {
            fs::write(&object, data).context("failed to write object file")?;
        }

        if self.config.store_metadata {
            let sidecar = self.metadata_path(&hash);
            if let Some(parent) = sidecar.parent() {
                fs::create_dir_all(parent).context("failed to create metadata shard directory")?;
            }
            if !sidecar.exists() {
                let json = serde_json::to_string(&Sidecar {
                    mime_type: mime_type.to_string(),
                    size: data.len() as u64,
                })
                .context("failed to serialize metadata")?;
                fs::write(&sidecar, json).context("failed to write metadata file")?;
            }
        }

        Ok(hash)
    }

    fn retrieve(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(hash)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("failed to read object file"),
        }
    }

    fn exists(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).exists()
    }

    fn inspect(&self, hash: &ContentHash) -> Result<Option<ObjectInfo>> {
        let object = self.object_path(hash);
        if !object.exists() {
            return Ok(None);
        }

        let sidecar = self.metadata_path(hash);
        let (mime_type, size_bytes) = if sidecar.exists() {
            let json = fs::read_to_string(&sidecar).context("failed to read metadata file")?;
            let meta: Sidecar = serde_json::from_str(&json).context("failed to parse metadata")?;
            (meta.mime_type, meta.size)
        } else {
            let size = fs::metadata(&object)
                .context("failed to stat object file")?
                .len();
            (UNKNOWN_MIME.to_string(), size)
        };

        Ok(Some(ObjectInfo {
            hash: hash.clone(),
            mime_type,
            size_bytes,
        }))
    }

    fn remove(&self, hash: &ContentHash) -> Result<bool> {
        self.ensure_writable()?;
        let removed = remove_if_present(&self.object_path(hash))?;
        remove_if_present(&self.metadata_path(hash))?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    const MIDI: &str = "audio/midi";

    #[test]
    fn store_then_retrieve() -> Result<()> {
        let dir = TempDir::new()?;
        let store = FileStore::at_path(dir.path())?;

        let hash = store.store(b"MThd score bytes", MIDI)?;
        assert_eq!(store.retrieve(&hash)?.as_deref(), Some(&b"MThd score bytes"[..]));
        assert!(store.exists(&hash));
        Ok(())
    }

    #[test]
    fn unknown_hash_is_none() -> Result<()> {
        let dir = TempDir::new()?;
        let store = FileStore::at_path(dir.path())?;
        let missing: ContentHash = "00000000000000000000000000000000".parse()?;

        assert_eq!(store.retrieve(&missing)?, None);
        assert_eq!(store.inspect(&missing)?, None);
        assert!(!store.exists(&missing));
        Ok(())
    }

    #[test]
    fn inspect_reads_sidecar() -> Result<()> {
        let dir = TempDir::new()?;
        let store = FileStore::at_path(dir.path())?;
        let hash = store.store(b"twelve bytes", MIDI)?;

        let info = store.inspect(&hash)?.expect("stored");
        assert_eq!(info.mime_type, MIDI);
        assert_eq!(info.size_bytes, 12);
        Ok(())
    }

    #[test]
    fn inspect_without_sidecar_falls_back() -> Result<()> {
        let dir = TempDir::new()?;
        let store = FileStore::new(CasConfig {
            base_path: dir.path().to_path_buf(),
            store_metadata: false,
            read_only: false,
        })?;
        let hash = store.store(b"bare", MIDI)?;

        let info = store.inspect(&hash)?.expect("stored");
        assert_eq!(info.mime_type, UNKNOWN_MIME);
        assert_eq!(info.size_bytes, 4);
        Ok(())
    }

    #[test]
    fn identical_content_shares_one_object() -> Result<()> {
        let dir = TempDir::new()?;
        let store = Arc::new(FileStore::at_path(dir.path())?);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.store(b"same score", MIDI).expect("write failed"))
            })
            .collect();
        let hashes: Vec<ContentHash> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(hashes[0], ContentHash::of(b"same score"));
        Ok(())
    }

    #[test]
    fn remove_deletes_object_and_sidecar() -> Result<()> {
        let dir = TempDir::new()?;
        let store = FileStore::at_path(dir.path())?;
        let hash = store.store(b"short-lived", MIDI)?;

        assert!(store.remove(&hash)?);
        assert!(!store.exists(&hash));
        assert!(!store.metadata_path(&hash).exists());
        assert!(!store.remove(&hash)?);
        Ok(())
    }

    #[test]
    fn read_only_refuses_writes() -> Result<()> {
        let dir = TempDir::new()?;
        let hash = FileStore::at_path(dir.path())?.store(b"kept", MIDI)?;

        let reader = FileStore::read_only_at(dir.path())?;
        assert_eq!(reader.retrieve(&hash)?.as_deref(), Some(&b"kept"[..]));

        let err = reader.store(b"new", MIDI).unwrap_err();
        assert!(err.to_string().contains("read-only"));
        assert!(reader.remove(&hash).is_err());
        Ok(())
    }
}
