//! 🪣📡 S3 Object Store: the cloud-to-pipeline paratrooper.
//!
//! INT. AWS CONSOLE. NIGHT. A lone bucket sits in us-west-1. Someone typed
//! `PUT pending/cars.csv` and walked away. The notification fired. The data
//! has been waiting. Patient. Ready to be streamed by a Rust process with an
//! async personality disorder.
//!
//! This module wraps the AWS S3 SDK and implements [`ObjectStore`]:
//! - `get` → `GetObject` → `ByteStream::into_async_read()` → boxed `AsyncRead`
//! - `copy` → `CopyObject` (server-side, the bytes never visit us)
//! - `delete` → `DeleteObject`
//! - `put` → `PutObject` with an explicit content type
//!
//! 🧠 Knowledge graph:
//! - `S3StorageConfig`: region, optional endpoint override, path-style toggle
//! - Credentials come from the usual chain (env vars → ~/.aws/config → IAM role → hope)
//! - `x-amz-copy-source` must be URL-encoded, key included. The SDK does not do it for us.
//!
//! ⚠️ The singularity will bypass S3 entirely and just *become* the data.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::{ObjectBody, ObjectStore};
use crate::zones::ObjectLocation;

// 🔣 Everything except unreserved characters and the path separator gets encoded.
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

// ============================================================
//  🔧 S3StorageConfig: knobs, dials, and one region
// ============================================================

/// 🔧 Configuration for the S3 object store.
///
/// `endpoint_url` + `force_path_style` exist for S3-compatible stores
/// (MinIO, LocalStack, the mock server in the tests).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct S3StorageConfig {
    /// 🌎 AWS region. Defaults to us-west-1, where the pending CSVs have always lived.
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// 🔀 Optional endpoint override
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// 🛣️ `https://host/bucket/key` instead of `https://bucket.host/key`
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_s3_region() -> String {
    // -- 🏖️ If you don't choose a region, the region chooses you.
    "us-west-1".to_string()
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            region: default_s3_region(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

// ============================================================
//  🪣 S3ObjectStore
// ============================================================

/// 🪣 `ObjectStore` over the AWS SDK. Cheap to clone: the SDK client is an
/// `Arc` with a connection pool inside and no per-request state.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// 🚀 Build a client from the environment plus whatever the config overrides.
    ///
    /// No network calls happen here. Credentials are resolved lazily on the first
    /// request, so a bad profile shows up as a `Read` error on the first `get`.
    pub async fn new(storage_config: &S3StorageConfig) -> Result<Self> {
        info!(
            "☁️ wiring up S3 in region {} (endpoint override: {:?})",
            storage_config.region, storage_config.endpoint_url
        );

        let mut the_loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(
            aws_sdk_s3::config::Region::new(storage_config.region.clone()),
        );
        if let Some(endpoint_url) = &storage_config.endpoint_url {
            the_loader = the_loader.endpoint_url(endpoint_url);
        }
        let the_sdk_config = the_loader.load().await;

        let the_s3_config = aws_sdk_s3::config::Builder::from(&the_sdk_config)
            .force_path_style(storage_config.force_path_style)
            .build();

        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(the_s3_config)))
    }

    /// 🔌 Wrap an already-built client. Tests point one at a mock server.
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

/// 🔣 `bucket/key` with the key percent-encoded, slashes left alone.
fn copy_source(from: &ObjectLocation) -> String {
    format!(
        "{}/{}",
        from.container,
        utf8_percent_encode(&from.key, COPY_SOURCE_ENCODE_SET)
    )
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Option<ObjectBody>> {
        let the_response = self
            .client
            .get_object()
            .bucket(&location.container)
            .key(&location.key)
            .send()
            .await
            .context(format!(
                "💀 GetObject failed for {}. The bucket ghosted us. \
                 Check: bucket name, key path, region, and credentials.",
                location
            ))?;

        debug!(
            "📥 GetObject answered for {} ({:?} bytes advertised)",
            location,
            the_response.content_length()
        );

        // 🔗 ByteStream → AsyncRead → Box. One vtable hop per read; the S3 round trip laughs at it.
        let the_body: ObjectBody = Box::new(the_response.body.into_async_read());
        Ok(Some(the_body))
    }

    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(from))
            .bucket(&to.container)
            .key(&to.key)
            .send()
            .await
            .context(format!("💀 CopyObject {} -> {} failed", from, to))?;
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&location.container)
            .key(&location.key)
            .send()
            .await
            .context(format!("💀 DeleteObject failed for {}", location))?;
        Ok(())
    }

    async fn put(&self, location: &ObjectLocation, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&location.container)
            .key(&location.key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .context(format!("💀 PutObject failed for {}", location))?;
        Ok(())
    }
}

// ============================================================
//  🧪 Tests: trust nothing, mock everything, blame DNS.
// ============================================================
