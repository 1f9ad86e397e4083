//! s6-core: Object-storage access layer for the s6cmd CLI
//!
//! This crate provides the provider-independent half of s6cmd:
//! - `s3://bucket/key` locator parsing
//! - The error taxonomy every remote failure is classified into
//! - The `ObjectStore` wire trait implemented by the SDK adapter
//! - Bucket lifecycle, listing, transfer and batch-delete engines with
//!   post-mutation confirmation polling
//! - Session configuration
//!
//! Nothing in here depends on a specific S3 SDK, so the engines are tested
//! against an in-memory store.

pub mod bucket;
pub mod config;
pub mod delete;
pub mod error;
pub mod list;
pub mod retry;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transfer;
pub mod uri;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use bucket::BucketList;
pub use config::{
    ConfigManager, Credentials, RetryConfig, SessionConfig, TransferConfig, WaitConfig,
};
pub use delete::{DeleteOutcome, MAX_BATCH};
pub use error::{Error, ErrorKind, Result};
pub use list::{ListOptions, Listing};
pub use retry::{is_retryable_error, retry_with_backoff};
pub use session::Session;
pub use storage::Storage;
pub use traits::{
    BucketInfo, BucketPage, CompletedPart, DeleteReport, ListPage, ListRequest,
    MetadataDirective, ObjectBody, ObjectInfo, ObjectKind, ObjectStore, PutReceipt,
    TransferMetadata,
};
pub use transfer::{UploadStrategy, choose_strategy};
pub use uri::{StorageUri, parse};
pub use wait::{Presence, wait_until};
