//! ObjectStore trait and the value types that cross it
//!
//! `ObjectStore` is the wire-level seam: one method per service request, all
//! returning already-classified [`Error`](crate::Error) values. The engines in
//! this crate (pagination, confirmation, multipart, batch deletion) are built
//! on top of it and never see provider types.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::{Error, ErrorKind, Result};
use crate::uri::StorageUri;

/// What a listed or inspected entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
    Directory,
    Symlink,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::File => write!(f, "file"),
            ObjectKind::Directory => write!(f, "directory"),
            ObjectKind::Symlink => write!(f, "symlink"),
        }
    }
}

/// Snapshot of an object or common prefix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub uri: StorageUri,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    pub kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ObjectInfo {
    /// A regular object
    pub fn file(uri: StorageUri, size: i64) -> Self {
        Self {
            uri,
            etag: None,
            last_modified: None,
            size,
            storage_class: None,
            kind: ObjectKind::File,
            content_type: None,
            error: None,
        }
    }

    /// A common prefix rolled up by the delimiter
    pub fn dir(uri: StorageUri) -> Self {
        Self {
            kind: ObjectKind::Directory,
            ..Self::file(uri, 0)
        }
    }

    pub fn key(&self) -> &str {
        self.uri.key()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ObjectKind::Directory
    }
}

/// A bucket as reported by list or head
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl BucketInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_date: None,
            region: None,
        }
    }
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct BucketPage {
    pub buckets: Vec<BucketInfo>,
    /// Present while more pages remain
    pub continuation_token: Option<String>,
}

/// Parameters for a single list-objects request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

/// One page of an object listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    pub common_prefixes: Vec<String>,
    /// Present while more pages remain
    pub next_continuation_token: Option<String>,
}

/// Whether stored metadata is copied from the source or replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetadataDirective {
    #[default]
    Copy,
    Replace,
}

impl std::str::FromStr for MetadataDirective {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(MetadataDirective::Copy),
            "replace" => Ok(MetadataDirective::Replace),
            _ => Err(format!("Invalid metadata directive: {s}")),
        }
    }
}

/// Caller-supplied object metadata for uploads and copies
///
/// Encryption fields are passed to the service as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferMetadata {
    pub acl: Option<String>,
    pub cache_control: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub encryption_method: Option<String>,
    pub encryption_key_id: Option<String>,
    pub storage_class: Option<String>,
    pub expires: Option<Timestamp>,
    pub user_defined: BTreeMap<String, String>,
    pub directive: MetadataDirective,
}

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutReceipt {
    pub uri: StorageUri,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub size: u64,
    /// Number of multipart parts; zero for a single-shot upload
    pub parts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// A part accepted by the service during a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
    pub size: u64,
}

/// Streaming body of a downloaded object
pub struct ObjectBody {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub content_length: Option<i64>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Raw result of one batch delete request
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub errors: Vec<(String, Error)>,
}

/// Wire-level operations against an S3-compatible service
///
/// Each method maps to exactly one request. Implementations classify every
/// provider error before returning it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of buckets
    async fn list_buckets_page(
        &self,
        continuation_token: Option<String>,
        max_buckets: i32,
    ) -> Result<BucketPage>;

    async fn head_bucket(&self, bucket: &str) -> Result<BucketInfo>;

    /// Create a bucket; `region` becomes the location constraint
    async fn create_bucket(&self, bucket: &str, region: Option<String>) -> Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Fetch one page of objects
    async fn list_objects_page(&self, request: &ListRequest) -> Result<ListPage>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// Open a streaming download
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    /// Single-request upload
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt>;

    /// Start a multipart upload and return its upload id
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &TransferMetadata,
    ) -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart>;

    /// Assemble parts, which must be sorted by part number
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<PutReceipt>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<()>;

    /// Server-side copy
    async fn copy_object(
        &self,
        source: &StorageUri,
        destination: &StorageUri,
        metadata: &TransferMetadata,
    ) -> Result<()>;

    /// Delete up to 1000 keys in one request
    ///
    /// A bucket-level failure is returned as `Err`; per-key failures are
    /// listed in the report.
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteReport>;
}
