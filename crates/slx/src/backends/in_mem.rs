//! # Previously, on Sluice...
//!
//! 🎬 The bucket was a lie. There was no cloud. There was only a `BTreeMap`
//! behind a `Mutex` behind an `Arc`, pretending very hard to be S3.
//!
//! `InMemoryObjectStore` is the stunt double for tests and local runs. It:
//! - holds objects in RAM, gone the moment you blink
//! - writes down every call it receives (`StorageCall`), in order, like a
//!   court stenographer with a grudge
//! - fails on cue (`StorageOp`) so the partial-failure paths get exercised
//!   without waiting for AWS to have a bad day
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please
//! also deploy a therapist.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::{ObjectBody, ObjectStore};
use crate::zones::ObjectLocation;

/// 📼 One entry in the stenographer's transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Get(ObjectLocation),
    Copy {
        from: ObjectLocation,
        to: ObjectLocation,
    },
    Delete(ObjectLocation),
    Put {
        location: ObjectLocation,
        content_type: String,
    },
}

/// 💣 The four primitives, by name. Used to schedule faults and to count calls.
/// Faults stick until cleared. The call is still recorded before it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageOp {
    Get,
    Copy,
    Delete,
    Put,
}

/// 📦 A stored object: the bytes and whatever content type the writer claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    objects: BTreeMap<ObjectLocation, StoredObject>,
    // 👻 keys that exist but answer `get` with no body at all
    bodiless: BTreeSet<ObjectLocation>,
    faults: BTreeSet<StorageOp>,
    calls: Vec<StorageCall>,
}

/// 🪣 A bucket that never forgets. Clone-able so tests can keep a handle after
/// giving one to the pipeline: every clone shares the same state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📥 Drop an object into the bucket without it counting as a call.
    pub async fn insert_object(&self, location: ObjectLocation, bytes: impl Into<Vec<u8>>) {
        let mut state = self.state.lock().await;
        state.bodiless.remove(&location);
        state.objects.insert(
            location,
            StoredObject {
                bytes: bytes.into(),
                content_type: None,
            },
        );
    }

    /// 👻 Make `get` on this location succeed with no body.
    pub async fn insert_bodiless(&self, location: ObjectLocation) {
        let mut state = self.state.lock().await;
        state.objects.remove(&location);
        state.bodiless.insert(location);
    }

    pub async fn inject_fault(&self, fault: StorageOp) {
        self.state.lock().await.faults.insert(fault);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    pub async fn object(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.state.lock().await.objects.get(location).cloned()
    }

    pub async fn keys(&self) -> Vec<ObjectLocation> {
        self.state.lock().await.objects.keys().cloned().collect()
    }

    /// 📼 The full transcript, oldest first.
    pub async fn calls(&self) -> Vec<StorageCall> {
        self.state.lock().await.calls.clone()
    }

    /// 🔢 How many gets/copies/deletes/puts happened. Mirrors "how many times
    /// was this command sent" style assertions.
    pub async fn call_count(&self, op: StorageOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| kind_of(call) == op)
            .count()
    }
}

fn kind_of(call: &StorageCall) -> StorageOp {
    match call {
        StorageCall::Get(_) => StorageOp::Get,
        StorageCall::Copy { .. } => StorageOp::Copy,
        StorageCall::Delete(_) => StorageOp::Delete,
        StorageCall::Put { .. } => StorageOp::Put,
    }
}

impl InMemoryState {
    /// 🧾 Record the call, then check whether it's scheduled to explode.
    fn record(&mut self, call: StorageCall) -> Result<()> {
        let the_kind = kind_of(&call);
        trace!("🧾 in-memory store received {:?}", call);
        self.calls.push(call);
        if self.faults.contains(&the_kind) {
            return Err(anyhow!(
                "💣 injected {:?} fault: the in-memory bucket did exactly what it was told, which was fail",
                the_kind
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Option<ObjectBody>> {
        let mut state = self.state.lock().await;
        state.record(StorageCall::Get(location.clone()))?;
        if state.bodiless.contains(location) {
            return Ok(None);
        }
        let the_object = state
            .objects
            .get(location)
            .ok_or_else(|| anyhow!("💀 NoSuchKey: {} is not in the in-memory bucket", location))?;
        let the_body: ObjectBody = Box::new(Cursor::new(the_object.bytes.clone()));
        Ok(Some(the_body))
    }

    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(StorageCall::Copy {
            from: from.clone(),
            to: to.clone(),
        })?;
        let the_object = state
            .objects
            .get(from)
            .cloned()
            .ok_or_else(|| anyhow!("💀 NoSuchKey: cannot copy {}, it is not there", from))?;
        state.objects.insert(to.clone(), the_object);
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(StorageCall::Delete(location.clone()))?;
        state.objects.remove(location);
        state.bodiless.remove(location);
        Ok(())
    }

    async fn put(&self, location: &ObjectLocation, body: Vec<u8>, content_type: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(StorageCall::Put {
            location: location.clone(),
            content_type: content_type.to_string(),
        })?;
        state.objects.insert(
            location.clone(),
            StoredObject {
                bytes: body,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }
}
