//! Turning file references into decoded works.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cas::{ContentHash, ContentStore};
use score_model::DecodedWork;

use crate::error::ResolutionError;

/// Opaque name of an input file: a relative upload path or a content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FileRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ContentHash> for FileRef {
    fn from(hash: &ContentHash) -> Self {
        Self(hash.to_string())
    }
}

/// Source of scores for batch and engine analysis.
pub trait ScoreResolver: Send + Sync {
    fn resolve(&self, file: &FileRef) -> Result<DecodedWork, ResolutionError>;
}

impl<R: ScoreResolver + ?Sized> ScoreResolver for Arc<R> {
    fn resolve(&self, file: &FileRef) -> Result<DecodedWork, ResolutionError> {
        (**self).resolve(file)
    }
}

/// Decode bytes, treating an empty buffer as its own failure.
pub fn decode_bytes(file: &FileRef, bytes: &[u8]) -> Result<DecodedWork, ResolutionError> {
    if bytes.is_empty() {
        return Err(ResolutionError::Empty(file.to_string()));
    }
    score_model::decode(bytes).map_err(|source| ResolutionError::Undecodable {
        file: file.to_string(),
        source,
    })
}

/// Files under one uploads directory, addressed by relative path.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a reference onto the root, refusing anything that could escape it.
    fn locate(&self, file: &FileRef) -> Result<PathBuf, ResolutionError> {
        let relative = Path::new(file.as_str());
        if file.as_str().trim().is_empty() {
            return Err(invalid(file, "empty file name"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid(file, "path escapes uploads directory")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid(file, "absolute paths are not allowed"))
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

fn invalid(file: &FileRef, reason: &str) -> ResolutionError {
    ResolutionError::InvalidReference {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

impl ScoreResolver for DirectoryResolver {
    fn resolve(&self, file: &FileRef) -> Result<DecodedWork, ResolutionError> {
        let path = self.locate(file)?;
        debug!(path = %path.display(), "reading upload");
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ResolutionError::NotFound(file.to_string()))
            }
            Err(e) => {
                return Err(ResolutionError::Unreadable {
                    file: file.to_string(),
                    source: e.into(),
                })
            }
        };
        decode_bytes(file, &bytes)
    }
}

/// Files previously ingested into a content store, addressed by hash.
pub struct CasResolver<S> {
    store: S,
}

impl<S: ContentStore> CasResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ContentStore> ScoreResolver for CasResolver<S> {
    fn resolve(&self, file: &FileRef) -> Result<DecodedWork, ResolutionError> {
        let hash: ContentHash = file
            .as_str()
            .parse()
            .map_err(|e: cas::HashError| invalid(file, &e.to_string()))?;
        let bytes = self
            .store
            .retrieve(&hash)
            .map_err(|source| ResolutionError::Unreadable {
                file: file.to_string(),
                source,
            })?
            .ok_or_else(|| ResolutionError::NotFound(file.to_string()))?;
        decode_bytes(file, &bytes)
    }
}
