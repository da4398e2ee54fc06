//! 🚪 Event filter: the bouncer at the door of the pipeline.
//!
//! Notifications show up in all shapes. Some are S3 puts into `pending/`.
//! Some are deletes. Some are from SNS and lost. Some are `{}`. The bouncer
//! checks the first record and lets exactly one kind in:
//!
//! 1. there is at least one record
//! 2. `eventSource == "aws:s3"`
//! 3. `eventName == "ObjectCreated:Put"`
//! 4. the raw object key contains `pending` somewhere (substring, not prefix)
//! 5. there is a bucket name, and the key decodes to UTF-8
//!
//! The bouncer never throws. A malformed payload is just "not on the list".

use anyhow::{Context, Result, anyhow};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::zones::{ObjectLocation, PENDING_MARKER};

/// 📡 The storage service's name for itself in notifications.
pub const STORAGE_EVENT_SOURCE: &str = "aws:s3";
/// ✍️ Object created by a direct write, as opposed to copy/multipart/etc.
pub const DIRECT_WRITE_EVENT: &str = "ObjectCreated:Put";

/// 📨 A storage notification. Every field is optional because the sender is
/// under no obligation to be polite.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NotificationEvent {
    #[serde(rename = "Records", default)]
    pub records: Option<Vec<NotificationRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub s3: Option<S3Entity>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct S3Entity {
    #[serde(default)]
    pub bucket: Option<BucketRef>,
    #[serde(default)]
    pub object: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BucketRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObjectRef {
    /// 🔣 URL-escaped, spaces as `+`. Decode before use.
    #[serde(default)]
    pub key: Option<String>,
}

impl NotificationRecord {
    pub fn bucket_name(&self) -> Option<&str> {
        self.s3.as_ref()?.bucket.as_ref()?.name.as_deref()
    }

    pub fn raw_key(&self) -> Option<&str> {
        self.s3.as_ref()?.object.as_ref()?.key.as_deref()
    }
}

impl NotificationEvent {
    pub fn first_record(&self) -> Option<&NotificationRecord> {
        self.records.as_deref()?.first()
    }
}

/// 🧾 Deserialize a raw payload. Anything that doesn't fit the schema is `None`,
/// which the orchestrator treats as "not eligible".
pub fn parse_event(payload: &serde_json::Value) -> Option<NotificationEvent> {
    NotificationEvent::deserialize(payload).ok()
}

/// 🚪 Should this notification trigger a run? Total: never panics, never errors.
pub fn is_eligible(event: &NotificationEvent) -> bool {
    let Some(the_first) = event.first_record() else {
        return false;
    };
    the_first.event_source.as_deref() == Some(STORAGE_EVENT_SOURCE)
        && the_first.event_name.as_deref() == Some(DIRECT_WRITE_EVENT)
        && the_first
            .raw_key()
            .is_some_and(|key| key.contains(PENDING_MARKER) && decode_key(key).is_ok())
        && the_first.bucket_name().is_some()
}

/// 📍 Where the first record points, with the key decoded (`+` → space, then `%XX`).
pub fn target_location(event: &NotificationEvent) -> Result<ObjectLocation> {
    let the_first = event
        .first_record()
        .ok_or_else(|| anyhow!("💀 notification has no records to point at"))?;
    let the_bucket = the_first
        .bucket_name()
        .ok_or_else(|| anyhow!("💀 notification record has no bucket name"))?;
    let the_raw_key = the_first
        .raw_key()
        .ok_or_else(|| anyhow!("💀 notification record has no object key"))?;
    Ok(ObjectLocation::new(the_bucket, decode_key(the_raw_key)?))
}

/// 🔣 `my+cars%281%29.csv` → `my cars(1).csv`.
pub fn decode_key(raw_key: &str) -> Result<String> {
    let the_spaced = raw_key.replace('+', " ");
    let the_decoded = percent_decode_str(&the_spaced)
        .decode_utf8()
        .context(format!("💀 object key '{}' does not decode to UTF-8", raw_key))?;
    Ok(the_decoded.into_owned())
}
