//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s6-core.

use async_trait::async_trait;
use aws_sdk_s3::types as s3;
use aws_smithy_types::DateTime;
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use jiff::Timestamp;
use s6_core::{
    BucketInfo, BucketPage, CompletedPart, DeleteReport, Error, ListPage, ListRequest,
    MetadataDirective, ObjectBody, ObjectInfo, ObjectStore, PutReceipt, Result, SessionConfig,
    StorageUri, TransferMetadata,
};

use crate::classify::{classify, classify_code};

/// Region used when neither flags, config nor the environment name one
const FALLBACK_REGION: &str = "us-east-1";

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from the resolved session configuration
    ///
    /// Static credentials from the session win; otherwise the SDK default
    /// chain runs, scoped to the configured profile.
    pub async fn new(config: &SessionConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(creds) = &config.credentials {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                &creds.access_key_id,
                &creds.access_key_secret,
                creds.session_token.clone(),
                None,
                "s6cmd-static-credentials",
            ));
        }

        let shared = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if shared.region().is_none() {
            builder = builder.region(aws_config::Region::new(FALLBACK_REGION));
        }

        tracing::debug!(
            region = ?shared.region(),
            endpoint = ?config.endpoint,
            path_style = config.path_style,
            "S3 client configured"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(builder.build()),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

fn to_timestamp(dt: &DateTime) -> Option<Timestamp> {
    Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).ok()
}

fn to_datetime(ts: Timestamp) -> DateTime {
    DateTime::from_secs(ts.as_second())
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Apply upload metadata to any request builder that accepts it
macro_rules! with_metadata {
    ($builder:expr, $metadata:expr) => {{
        let metadata: &TransferMetadata = $metadata;
        let builder = $builder
            .set_acl(metadata.acl.as_deref().map(s3::ObjectCannedAcl::from))
            .set_cache_control(metadata.cache_control.clone())
            .set_content_type(metadata.content_type.clone())
            .set_content_encoding(metadata.content_encoding.clone())
            .set_content_disposition(metadata.content_disposition.clone())
            .set_server_side_encryption(
                metadata
                    .encryption_method
                    .as_deref()
                    .map(s3::ServerSideEncryption::from),
            )
            .set_ssekms_key_id(metadata.encryption_key_id.clone())
            .set_storage_class(metadata.storage_class.as_deref().map(s3::StorageClass::from))
            .set_expires(metadata.expires.map(to_datetime));
        if metadata.user_defined.is_empty() {
            builder
        } else {
            builder.set_metadata(Some(metadata.user_defined.clone().into_iter().collect()))
        }
    }};
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets_page(
        &self,
        continuation_token: Option<String>,
        max_buckets: i32,
    ) -> Result<BucketPage> {
        let response = self
            .inner
            .list_buckets()
            .max_buckets(max_buckets)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| classify(e, "ListBuckets"))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| BucketInfo {
                name: b.name().unwrap_or_default().to_string(),
                creation_date: b.creation_date().and_then(to_timestamp),
                region: b.bucket_region().map(str::to_string),
            })
            .collect();

        Ok(BucketPage {
            buckets,
            continuation_token: response.continuation_token().map(str::to_string),
        })
    }

    async fn head_bucket(&self, bucket: &str) -> Result<BucketInfo> {
        let response = self
            .inner
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        Ok(BucketInfo {
            region: response.bucket_region().map(str::to_string),
            ..BucketInfo::new(bucket)
        })
    }

    async fn create_bucket(&self, bucket: &str, region: Option<String>) -> Result<()> {
        let mut request = self.inner.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if let Some(region) = region.filter(|r| r != FALLBACK_REGION) {
            let configuration = s3::CreateBucketConfiguration::builder()
                .location_constraint(s3::BucketLocationConstraint::from(region.as_str()))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        request.send().await.map_err(|e| classify(e, bucket))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;
        Ok(())
    }

    async fn list_objects_page(&self, request: &ListRequest) -> Result<ListPage> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(|e| classify(e, &request.bucket))?;

        let objects = response
            .contents()
            .iter()
            .map(|object| {
                let key = object.key().unwrap_or_default();
                let mut info = ObjectInfo::file(
                    StorageUri::new(&request.bucket, key),
                    object.size().unwrap_or(0),
                );
                info.last_modified = object.last_modified().and_then(to_timestamp);
                info.etag = object.e_tag().map(trim_etag);
                info.storage_class = object.storage_class().map(|sc| sc.as_str().to_string());
                info
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        let next_continuation_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation_token,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let uri = StorageUri::new(bucket, key);
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &uri.path()))?;

        let mut info = ObjectInfo::file(uri, response.content_length().unwrap_or(0));
        info.last_modified = response.last_modified().and_then(to_timestamp);
        info.etag = response.e_tag().map(trim_etag);
        info.content_type = response.content_type().map(str::to_string);
        info.storage_class = response.storage_class().map(|sc| sc.as_str().to_string());
        Ok(info)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &format!("{bucket}/{key}")))?;

        Ok(ObjectBody {
            content_length: response.content_length(),
            reader: Box::pin(response.body.into_async_read()),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt> {
        let size = body.len() as u64;
        let request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size as i64)
            .body(ByteStream::from(body));

        let response = with_metadata!(request, metadata)
            .send()
            .await
            .map_err(|e| classify(e, &format!("{bucket}/{key}")))?;

        Ok(PutReceipt {
            uri: StorageUri::new(bucket, key),
            etag: response.e_tag().map(trim_etag),
            size,
            parts: 0,
            version_id: response.version_id().map(str::to_string),
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &TransferMetadata,
    ) -> Result<String> {
        let request = self.inner.create_multipart_upload().bucket(bucket).key(key);
        let response = with_metadata!(request, metadata)
            .send()
            .await
            .map_err(|e| classify(e, &format!("{bucket}/{key}")))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Unknown {
                code: None,
                message: format!("{bucket}/{key}: no upload id in response"),
            })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        let size = body.len() as u64;
        let response = self
            .inner
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(size as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(e, &format!("{bucket}/{key}")))?;

        let etag = response.e_tag().ok_or_else(|| Error::Unknown {
            code: None,
            message: format!("{bucket}/{key}: part {part_number} returned no ETag"),
        })?;

        Ok(CompletedPart {
            part_number,
            etag: etag.to_string(),
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
        let size = parts.iter().map(|p| p.size).sum();
        let count = parts.len();
        let completed = parts
            .into_iter()
            .map(|p| {
                s3::CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(p.etag)
                    .build()
            })
            .collect();
        let upload = s3::CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        let response = self
            .inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| classify(e, &format!("{bucket}/{key}")))?;

        Ok(PutReceipt {
            uri: StorageUri::new(bucket, key),
            etag: response.e_tag().map(trim_etag),
            size,
            parts: count,
            version_id: response.version_id().map(str::to_string),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| classify(e, &format!("{bucket}/{key}")))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        source: &StorageUri,
        destination: &StorageUri,
        metadata: &TransferMetadata,
    ) -> Result<()> {
        let request = self
            .inner
            .copy_object()
            .copy_source(copy_source(source))
            .bucket(destination.bucket())
            .key(destination.key());

        let request = match metadata.directive {
            MetadataDirective::Replace => with_metadata!(request, metadata)
                .metadata_directive(s3::MetadataDirective::Replace),
            MetadataDirective::Copy => request
                .metadata_directive(s3::MetadataDirective::Copy)
                .set_acl(metadata.acl.as_deref().map(s3::ObjectCannedAcl::from))
                .set_storage_class(metadata.storage_class.as_deref().map(s3::StorageClass::from))
                .set_server_side_encryption(
                    metadata
                        .encryption_method
                        .as_deref()
                        .map(s3::ServerSideEncryption::from),
                )
                .set_ssekms_key_id(metadata.encryption_key_id.clone()),
        };

        request
            .send()
            .await
            .map_err(|e| classify(e, &source.path()))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteReport> {
        if keys.is_empty() {
            return Ok(DeleteReport::default());
        }

        let objects = keys
            .iter()
            .map(|k| s3::ObjectIdentifier::builder().key(k).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Unknown {
                code: None,
                message: format!("invalid delete request: {e}"),
            })?;

        let delete = s3::Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|e| Error::Unknown {
                code: None,
                message: format!("invalid delete request: {e}"),
            })?;

        let response = self
            .inner
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;

        let deleted = response
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(str::to_string))
            .collect();

        let errors = response
            .errors()
            .iter()
            .filter_map(|e| {
                let key = e.key()?;
                let classified = classify_code(
                    e.code(),
                    None,
                    e.message().unwrap_or_default(),
                    &format!("{bucket}/{key}"),
                );
                Some((key.to_string(), classified))
            })
            .collect();

        Ok(DeleteReport { deleted, errors })
    }
}

/// `bucket/key` with the key percent-encoded, slashes kept
fn copy_source(source: &StorageUri) -> String {
    let key = source
        .key()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{key}", source.bucket())
}
