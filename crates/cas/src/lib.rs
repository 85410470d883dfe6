//! Content-addressed storage for ingested score files.
//!
//! Files are addressed by a truncated BLAKE3 hash of their bytes. Writing the
//! same bytes twice is a no-op, so concurrent ingests of one file never
//! conflict. Objects live until a caller removes them; the store itself has
//! no eviction policy.
//!
//! ```rust,no_run
//! use cas::{CasConfig, ContentStore, FileStore};
//!
//! // SMARTSCORE_CAS_PATH, or ~/.smartscore/cas
//! let store = FileStore::new(CasConfig::from_env()).unwrap();
//!
//! let hash = store.store(b"MThd...", "audio/midi").unwrap();
//! let bytes = store.retrieve(&hash).unwrap();
//! assert!(bytes.is_some());
//!
//! store.remove(&hash).unwrap();
//! ```

pub mod config;
pub mod hash;
pub mod store;

pub use config::CasConfig;
pub use hash::{ContentHash, HashError};
pub use store::{ContentStore, FileStore, ObjectInfo};
