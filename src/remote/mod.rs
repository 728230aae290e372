//! Remote document/list store abstraction.
//!
//! The measurement store only needs two primitives from its backend: read every
//! child under a key path, and append a new uniquely keyed child. No
//! transactions or conditional writes are assumed.

pub mod firebase;
pub mod memory;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Characters a single key segment may not contain.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '$', '#', '[', ']'];
const MAX_KEY_BYTES: usize = 768;

/// Errors surfaced by the measurement store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write under {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

impl StoreError {
    pub fn read(path: &KeyPath, err: anyhow::Error) -> Self {
        StoreError::Read {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn write(path: &KeyPath, err: anyhow::Error) -> Self {
        StoreError::Write {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

/// Result type for measurement store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// `/`-separated location in the store, made of validated segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn root(segment: &str) -> StoreResult<Self> {
        validate_key(segment)?;
        Ok(Self {
            segments: vec![segment.to_string()],
        })
    }

    /// Root built from a compile-time label known to be a valid key.
    pub(crate) fn trusted_root(segment: &'static str) -> Self {
        debug_assert!(validate_key(segment).is_ok());
        Self {
            segments: vec![segment.to_string()],
        }
    }

    pub fn child(&self, segment: &str) -> StoreResult<Self> {
        validate_key(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Check that `key` can be used as one path segment in every backend.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let reject = |reason: &str| -> StoreResult<()> {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };

    if key.is_empty() {
        return reject("key must not be empty");
    }
    if key.len() > MAX_KEY_BYTES {
        return reject("key is longer than 768 bytes");
    }
    if key.chars().any(|c| FORBIDDEN_KEY_CHARS.contains(&c)) {
        return reject("key must not contain any of / . $ # [ ]");
    }
    if key.chars().any(char::is_control) {
        return reject("key must not contain control characters");
    }

    Ok(())
}

/// One raw child as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRecord {
    pub key: String,
    pub value: Value,
}

impl ChildRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Backend interface for the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All children directly under `path`, in the backend's own order.
    /// A path with no children yields an empty list.
    async fn read_children(&self, path: &KeyPath) -> anyhow::Result<Vec<ChildRecord>>;

    /// Durably append `value` under `path` with a fresh unique key and return the key.
    async fn push_child(&self, path: &KeyPath, value: Value) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn read_children(&self, path: &KeyPath) -> anyhow::Result<Vec<ChildRecord>> {
        (**self).read_children(path).await
    }

    async fn push_child(&self, path: &KeyPath, value: Value) -> anyhow::Result<String> {
        (**self).push_child(path, value).await
    }
}
