//! In-memory `ObjectStore` used by the engine tests
//!
//! Emulates the S3 behaviours the engines rely on: continuation-token
//! pagination, delimiter roll-up, multipart assembly and idempotent batch
//! deletes. Knobs on [`MemoryStore`] inject failures and stale reads.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::traits::{
    BucketInfo, BucketPage, CompletedPart, DeleteReport, ListPage, ListRequest, ObjectBody,
    ObjectInfo, ObjectStore, PutReceipt, TransferMetadata,
};
use crate::uri::StorageUri;

#[derive(Debug, Clone)]
pub(crate) struct StoredObject {
    pub data: Bytes,
    pub metadata: TransferMetadata,
}

#[derive(Debug, Default)]
struct Bucket {
    region: Option<String>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug)]
struct Upload {
    bucket: String,
    key: String,
    metadata: TransferMetadata,
    parts: BTreeMap<i32, Bytes>,
}

/// Request counters
#[derive(Debug, Default, Clone)]
pub(crate) struct Calls {
    pub list_bucket_pages: usize,
    pub list_object_pages: usize,
    pub head_object: usize,
    pub put_object: usize,
    pub create_multipart: usize,
    pub upload_part: usize,
    pub complete_multipart: usize,
    pub abort_multipart: usize,
    pub delete_batches: usize,
    pub delete_batch_sizes: Vec<usize>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    uploads: HashMap<String, Upload>,
    next_upload: u64,
    calls: Calls,
    /// Buckets that exist but belong to another account
    foreign_buckets: HashSet<String>,
    /// Bucket list page index (zero based) that fails
    fail_bucket_page: Option<usize>,
    /// Object list page index (zero based) that fails
    fail_object_page: Option<usize>,
    /// Part numbers that fail with a non-retryable error
    fail_parts: HashSet<i32>,
    /// Part numbers that fail transiently this many more times
    flaky_parts: HashMap<i32, usize>,
    /// `bucket/key` paths that keep answering HEAD after deletion
    ghosts: HashSet<String>,
    /// Remaining HEAD requests that report `NotFound` regardless of state
    stale_heads: usize,
    /// Keys the batch delete refuses with `AccessDenied`
    protected_keys: HashSet<String>,
    /// Keys whose GET body fails midway
    broken_bodies: HashSet<String>,
}

/// Thread-safe in-memory object store
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with `bucket` already created
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store.add_bucket(bucket);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_bucket(&self, bucket: &str) {
        self.lock().buckets.entry(bucket.to_string()).or_default();
    }

    pub fn add_foreign_bucket(&self, bucket: &str) {
        self.lock().foreign_buckets.insert(bucket.to_string());
    }

    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.put_with(bucket, key, data, TransferMetadata::default());
    }

    pub fn put_with(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        metadata: TransferMetadata,
    ) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert(
                key.to_string(),
                StoredObject {
                    data: data.into(),
                    metadata,
                },
            );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.lock().buckets.contains_key(bucket)
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls.clone()
    }

    pub fn open_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    pub fn fail_bucket_page(&self, page: usize) {
        self.lock().fail_bucket_page = Some(page);
    }

    pub fn fail_object_page(&self, page: usize) {
        self.lock().fail_object_page = Some(page);
    }

    pub fn fail_part(&self, part_number: i32) {
        self.lock().fail_parts.insert(part_number);
    }

    pub fn flaky_part(&self, part_number: i32, failures: usize) {
        self.lock().flaky_parts.insert(part_number, failures);
    }

    pub fn ghost(&self, bucket: &str, key: &str) {
        self.lock().ghosts.insert(format!("{bucket}/{key}"));
    }

    pub fn stale_heads(&self, count: usize) {
        self.lock().stale_heads = count;
    }

    pub fn protect(&self, key: &str) {
        self.lock().protected_keys.insert(key.to_string());
    }

    pub fn break_body(&self, key: &str) {
        self.lock().broken_bodies.insert(key.to_string());
    }
}

fn no_such_bucket(bucket: &str) -> Error {
    Error::NotFound(bucket.to_string())
}

fn service_error(code: &str, message: &str) -> Error {
    Error::Unknown {
        code: Some(code.to_string()),
        message: message.to_string(),
    }
}

fn etag_of(data: &[u8]) -> String {
    format!("\"{:x}-{}\"", data.iter().map(|b| *b as u64).sum::<u64>(), data.len())
}

enum Entry {
    Object(String),
    Prefix(String),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Object(name) | Entry::Prefix(name) => name,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets_page(
        &self,
        continuation_token: Option<String>,
        max_buckets: i32,
    ) -> Result<BucketPage> {
        let mut state = self.lock();
        let page_index = state.calls.list_bucket_pages;
        state.calls.list_bucket_pages += 1;
        if state.fail_bucket_page == Some(page_index) {
            return Err(Error::AccessDenied("ListBuckets".into()));
        }

        let start: usize = continuation_token
            .map(|t| t.parse().unwrap_or(0))
            .unwrap_or(0);
        let names: Vec<&String> = state.buckets.keys().collect();
        let end = (start + max_buckets.max(1) as usize).min(names.len());
        let buckets = names[start.min(end)..end]
            .iter()
            .map(|name| BucketInfo::new(name.as_str()))
            .collect();
        let continuation_token = (end < names.len()).then(|| end.to_string());
        Ok(BucketPage {
            buckets,
            continuation_token,
        })
    }

    async fn head_bucket(&self, bucket: &str) -> Result<BucketInfo> {
        let state = self.lock();
        match state.buckets.get(bucket) {
            Some(b) => Ok(BucketInfo {
                region: b.region.clone(),
                ..BucketInfo::new(bucket)
            }),
            None if state.foreign_buckets.contains(bucket) => {
                Err(Error::AccessDenied(bucket.to_string()))
            }
            None => Err(no_such_bucket(bucket)),
        }
    }

    async fn create_bucket(&self, bucket: &str, region: Option<String>) -> Result<()> {
        let mut state = self.lock();
        if region.as_deref() == Some("invalid-region") {
            return Err(service_error(
                "InvalidLocationConstraint",
                "The specified location-constraint is not valid",
            ));
        }
        if state.buckets.contains_key(bucket) {
            return Err(Error::AlreadyExists {
                resource: bucket.to_string(),
                owned_by_you: true,
            });
        }
        if state.foreign_buckets.contains(bucket) {
            return Err(Error::AlreadyExists {
                resource: bucket.to_string(),
                owned_by_you: false,
            });
        }
        state.buckets.insert(
            bucket.to_string(),
            Bucket {
                region,
                ..Bucket::default()
            },
        );
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.lock();
        match state.buckets.get(bucket) {
            None => Err(no_such_bucket(bucket)),
            Some(b) if !b.objects.is_empty() => Err(service_error(
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            )),
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn list_objects_page(&self, request: &ListRequest) -> Result<ListPage> {
        let mut state = self.lock();
        let page_index = state.calls.list_object_pages;
        state.calls.list_object_pages += 1;
        if state.fail_object_page == Some(page_index) {
            return Err(Error::TransferFailed {
                message: "connection reset".into(),
                source: None,
            });
        }

        let bucket = state
            .buckets
            .get(&request.bucket)
            .ok_or_else(|| no_such_bucket(&request.bucket))?;

        let mut entries: Vec<Entry> = Vec::new();
        let mut seen_prefixes = BTreeSet::new();
        for key in bucket.objects.keys() {
            let Some(rest) = key.strip_prefix(request.prefix.as_str()) else {
                continue;
            };
            let rolled = request
                .delimiter
                .as_deref()
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|i| i + d.len()));
            match rolled {
                Some(end) => {
                    let prefix = format!("{}{}", request.prefix, &rest[..end]);
                    if seen_prefixes.insert(prefix.clone()) {
                        entries.push(Entry::Prefix(prefix));
                    }
                }
                None => entries.push(Entry::Object(key.clone())),
            }
        }
        entries.sort_by(|a, b| a.name().cmp(b.name()));

        let remaining: Vec<&Entry> = entries
            .iter()
            .filter(|e| match &request.continuation_token {
                Some(token) => e.name() > token.as_str(),
                None => true,
            })
            .collect();
        let take = request.max_keys.max(1) as usize;
        let page = &remaining[..take.min(remaining.len())];

        let mut result = ListPage::default();
        for entry in page {
            match entry {
                Entry::Object(key) => {
                    let stored = &bucket.objects[key];
                    let mut info = ObjectInfo::file(
                        StorageUri::new(&request.bucket, key),
                        stored.data.len() as i64,
                    );
                    info.etag = Some(etag_of(&stored.data));
                    info.storage_class = stored.metadata.storage_class.clone();
                    result.objects.push(info);
                }
                Entry::Prefix(prefix) => result.common_prefixes.push(prefix.clone()),
            }
        }
        if remaining.len() > page.len()
            && let Some(last) = page.last()
        {
            result.next_continuation_token = Some(last.name().to_string());
        }
        Ok(result)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let mut state = self.lock();
        state.calls.head_object += 1;
        let not_found = || Error::NotFound(format!("{bucket}/{key}"));
        if state.stale_heads > 0 {
            state.stale_heads -= 1;
            return Err(not_found());
        }
        let stored = state.buckets.get(bucket).and_then(|b| b.objects.get(key));
        match stored {
            Some(stored) => {
                let mut info =
                    ObjectInfo::file(StorageUri::new(bucket, key), stored.data.len() as i64);
                info.etag = Some(etag_of(&stored.data));
                info.content_type = stored.metadata.content_type.clone();
                info.storage_class = stored.metadata.storage_class.clone();
                Ok(info)
            }
            None if state.ghosts.contains(&format!("{bucket}/{key}")) => {
                Ok(ObjectInfo::file(StorageUri::new(bucket, key), 0))
            }
            None => Err(not_found()),
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let state = self.lock();
        let stored = state
            .buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .objects
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))?;
        let data = stored.data.clone();
        let content_length = Some(data.len() as i64);

        if state.broken_bodies.contains(key) {
            let half = data.slice(..data.len() / 2);
            let failing = std::io::Cursor::new(half.to_vec()).chain(BrokenReader);
            return Ok(ObjectBody {
                reader: Box::pin(failing),
                content_length,
            });
        }
        Ok(ObjectBody {
            reader: Box::pin(std::io::Cursor::new(data.to_vec())),
            content_length,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt> {
        let mut state = self.lock();
        state.calls.put_object += 1;
        let target = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        let size = body.len() as u64;
        let etag = etag_of(&body);
        target.objects.insert(
            key.to_string(),
            StoredObject {
                data: body,
                metadata: metadata.clone(),
            },
        );
        Ok(PutReceipt {
            uri: StorageUri::new(bucket, key),
            etag: Some(etag),
            size,
            parts: 0,
            version_id: None,
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &TransferMetadata,
    ) -> Result<String> {
        let mut state = self.lock();
        state.calls.create_multipart += 1;
        if !state.buckets.contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                metadata: metadata.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        let mut state = self.lock();
        state.calls.upload_part += 1;
        if state.fail_parts.contains(&part_number) {
            return Err(Error::AccessDenied(format!("part {part_number}")));
        }
        if let Some(left) = state.flaky_parts.get_mut(&part_number)
            && *left > 0
        {
            *left -= 1;
            return Err(service_error("SlowDown", "Please reduce your request rate"));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {upload_id}")))?;
        let etag = etag_of(&body);
        let size = body.len() as u64;
        upload.parts.insert(part_number, body);
        Ok(CompletedPart {
            part_number,
            etag,
            size,
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<PutReceipt> {
        let mut state = self.lock();
        state.calls.complete_multipart += 1;
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {upload_id}")))?;

        let mut data = Vec::new();
        let mut previous = 0;
        for part in &parts {
            if part.part_number <= previous {
                return Err(service_error(
                    "InvalidPartOrder",
                    "The list of parts was not in ascending order",
                ));
            }
            previous = part.part_number;
            let body = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| service_error("InvalidPart", "part was not uploaded"))?;
            data.extend_from_slice(body);
        }

        let data = Bytes::from(data);
        let etag = format!("{}-{}", etag_of(&data), parts.len());
        let size = data.len() as u64;
        state
            .buckets
            .get_mut(&upload.bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .objects
            .insert(
                upload.key.clone(),
                StoredObject {
                    data,
                    metadata: upload.metadata,
                },
            );
        Ok(PutReceipt {
            uri: StorageUri::new(bucket, key),
            etag: Some(etag),
            size,
            parts: parts.len(),
            version_id: None,
        })
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.abort_multipart += 1;
        state.uploads.remove(upload_id);
        Ok(())
    }

    async fn copy_object(
        &self,
        source: &StorageUri,
        destination: &StorageUri,
        metadata: &TransferMetadata,
    ) -> Result<()> {
        let mut state = self.lock();
        let stored = state
            .buckets
            .get(source.bucket())
            .ok_or_else(|| no_such_bucket(source.bucket()))?
            .objects
            .get(source.key())
            .cloned()
            .ok_or_else(|| Error::NotFound(source.path()))?;
        if stored.metadata.storage_class.as_deref() == Some("GLACIER") {
            return Err(Error::ObjectNotActive(source.path()));
        }
        let metadata = match metadata.directive {
            crate::traits::MetadataDirective::Copy => stored.metadata,
            crate::traits::MetadataDirective::Replace => metadata.clone(),
        };
        state
            .buckets
            .get_mut(destination.bucket())
            .ok_or_else(|| no_such_bucket(destination.bucket()))?
            .objects
            .insert(
                destination.key().to_string(),
                StoredObject {
                    data: stored.data,
                    metadata,
                },
            );
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteReport> {
        let mut state = self.lock();
        state.calls.delete_batches += 1;
        state.calls.delete_batch_sizes.push(keys.len());
        if keys.len() > 1000 {
            return Err(service_error("MalformedXML", "too many keys"));
        }
        let protected = state.protected_keys.clone();
        let target = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;

        let mut report = DeleteReport::default();
        for key in keys {
            if protected.contains(&key) {
                report
                    .errors
                    .push((key.clone(), Error::AccessDenied(format!("{bucket}/{key}"))));
                continue;
            }
            target.objects.remove(&key);
            report.deleted.push(key);
        }
        Ok(report)
    }
}

/// Reader that always fails, used to break a body midway
struct BrokenReader;

impl tokio::io::AsyncRead for BrokenReader {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        _buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}
