//! 🔌 Backends: where the real I/O happens.
//!
//! 🪣 The pipeline never talks to a bucket directly. It talks to an
//! [`ObjectStore`], which is four verbs and no opinions:
//! `get`, `copy`, `delete`, `put`.
//!
//! 🎭 This module is the casting agency. Need the real cloud? `S3ObjectStore`.
//! Need a stunt double that writes down everything it was asked to do and
//! fails on cue? `InMemoryObjectStore`. The `StorageBackend` enum dispatches
//! to whichever one showed up for work, so the pipeline stays blissfully
//! ignorant of where the bytes live.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls → `StorageBackend` enum → `impl ObjectStore for StorageBackend`
//! - The handle is `Clone` and holds no per-request state. Clone it into as many
//!   concurrent runs as you like. They will not step on each other. (They might
//!   step on the same *key*. That one's on you. See DESIGN.md.)
//! - Config lives next to the backend that uses it: `S3StorageConfig` is in `s3.rs`.
//!
//! 🦆 The duck has read-only IAM permissions. It is fine with this.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::zones::ObjectLocation;

pub mod in_mem;
pub mod s3;

pub use in_mem::{InMemoryObjectStore, StorageCall, StorageOp};
pub use s3::{S3ObjectStore, S3StorageConfig};

/// 🚿 A streaming object body. Boxed because every store hands back a
/// different concrete reader and struct fields can't hold `impl AsyncRead`.
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// 🪣 The storage collaborator. Four primitives, zero business logic.
///
/// # Contract 📜
/// - `get` returns `Ok(None)` when the store answered but handed back no body at
///   all. That is different from a body with zero bytes in it.
/// - `copy` is server-side and leaves the source alone.
/// - `delete` of a missing key is the store's call (S3 says "sure, it's gone").
/// - Nothing here retries. Retry policy belongs to whoever invoked us.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    async fn get(&self, location: &ObjectLocation) -> Result<Option<ObjectBody>>;
    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()>;
    async fn delete(&self, location: &ObjectLocation) -> Result<()>;
    async fn put(&self, location: &ObjectLocation, body: Vec<u8>, content_type: &str) -> Result<()>;
}

/// 🎭 The many faces of storage. A universal remote for buckets.
///
/// Ancient proverb: "He who hardcodes the S3 client, tests against production."
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory(InMemoryObjectStore),
    S3(S3ObjectStore),
}

#[async_trait]
impl ObjectStore for StorageBackend {
    async fn get(&self, location: &ObjectLocation) -> Result<Option<ObjectBody>> {
        match self {
            StorageBackend::InMemory(store) => store.get(location).await,
            StorageBackend::S3(store) => store.get(location).await,
        }
    }

    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        match self {
            StorageBackend::InMemory(store) => store.copy(from, to).await,
            StorageBackend::S3(store) => store.copy(from, to).await,
        }
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        match self {
            StorageBackend::InMemory(store) => store.delete(location).await,
            StorageBackend::S3(store) => store.delete(location).await,
        }
    }

    async fn put(&self, location: &ObjectLocation, body: Vec<u8>, content_type: &str) -> Result<()> {
        match self {
            StorageBackend::InMemory(store) => store.put(location, body, content_type).await,
            StorageBackend::S3(store) => store.put(location, body, content_type).await,
        }
    }
}

impl From<InMemoryObjectStore> for StorageBackend {
    fn from(store: InMemoryObjectStore) -> Self {
        StorageBackend::InMemory(store)
    }
}

impl From<S3ObjectStore> for StorageBackend {
    fn from(store: S3ObjectStore) -> Self {
        StorageBackend::S3(store)
    }
}
