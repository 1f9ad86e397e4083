//! Object transfer engine: upload, download, copy
//!
//! Payloads below the multipart threshold go up in one PUT. Anything larger
//! is split into parts that upload concurrently on a bounded `JoinSet`; each
//! part is retried on transient errors, and the first part that still fails
//! aborts the whole upload. Every successful write is confirmed with a HEAD
//! poll before returning.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;

use crate::config::{MIB, TransferConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::retry::{is_retryable_error, retry_with_backoff};
use crate::session::Session;
use crate::traits::{CompletedPart, PutReceipt, TransferMetadata};
use crate::uri::StorageUri;
use crate::wait::Presence;

/// Service limit on parts per multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// Largest object the service accepts (5 TiB)
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * MIB;

/// How a payload of known size is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    SingleShot,
    Multipart { part_size: u64 },
}

/// Pick the upload strategy for a payload of `size` bytes
///
/// The part size grows past the configured value when the payload would
/// otherwise need more than [`MAX_PARTS`] parts.
pub fn choose_strategy(size: u64, config: &TransferConfig) -> Result<UploadStrategy> {
    if size > MAX_OBJECT_SIZE {
        return Err(Error::ObjectTooLarge(format!(
            "{size} bytes exceeds the {MAX_OBJECT_SIZE} byte limit"
        )));
    }
    if size == 0 || size < config.multipart_threshold {
        return Ok(UploadStrategy::SingleShot);
    }
    let part_size = config.part_size.max(size.div_ceil(MAX_PARTS)).max(1);
    Ok(UploadStrategy::Multipart { part_size })
}

/// Cuts a reader into fixed-size parts
///
/// Holds at most one part (plus whatever a single read overshoots) in memory.
struct PartReader<R> {
    reader: R,
    buffer: BytesMut,
    part_size: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> PartReader<R> {
    fn new(reader: R, seed: Bytes, part_size: u64) -> Self {
        Self {
            reader,
            buffer: BytesMut::from(&seed[..]),
            part_size: usize::try_from(part_size).unwrap_or(usize::MAX),
            eof: false,
        }
    }

    async fn next_part(&mut self) -> Result<Option<Bytes>> {
        while !self.eof && self.buffer.len() < self.part_size {
            self.buffer.reserve(self.part_size - self.buffer.len());
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                self.eof = true;
            }
        }
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let take = self.buffer.len().min(self.part_size);
        Ok(Some(self.buffer.split_to(take).freeze()))
    }
}

/// A known-size source yielded a different number of bytes
fn size_changed(uri: &StorageUri, expected: u64, actual: u64) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{uri}: source changed size during upload, expected {expected} bytes, read {actual}"),
    ))
}

/// Read until `limit` bytes or EOF
async fn read_up_to<R: AsyncRead + Unpin>(reader: &mut R, limit: u64) -> Result<Bytes> {
    let mut buffer = Vec::new();
    reader.take(limit).read_to_end(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}

impl Session {
    /// Upload an in-memory payload
    pub async fn upload_bytes(
        &self,
        uri: &StorageUri,
        data: Bytes,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt> {
        match choose_strategy(data.len() as u64, &self.config.transfer)? {
            UploadStrategy::SingleShot => self.put_single(uri, data, metadata).await,
            UploadStrategy::Multipart { part_size } => {
                let parts = PartReader::new(tokio::io::empty(), data, part_size);
                self.put_multipart(uri, parts, None, metadata).await
            }
        }
    }

    /// Upload from a reader
    ///
    /// `size` is the exact payload length when known (files). For streams of
    /// unknown length (stdin) up to the multipart threshold is read first: EOF
    /// within it means a single PUT, otherwise multipart seeded with what was
    /// read.
    pub async fn upload_reader<R>(
        &self,
        uri: &StorageUri,
        mut reader: R,
        size: Option<u64>,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let transfer = &self.config.transfer;
        match size {
            Some(size) => match choose_strategy(size, transfer)? {
                UploadStrategy::SingleShot => {
                    // One byte past `size` reveals a source that grew
                    let data = self
                        .guard(read_up_to(&mut reader, size.saturating_add(1)))
                        .await?;
                    if data.len() as u64 != size {
                        return Err(size_changed(uri, size, data.len() as u64));
                    }
                    self.put_single(uri, data, metadata).await
                }
                UploadStrategy::Multipart { part_size } => {
                    let parts = PartReader::new(reader, Bytes::new(), part_size);
                    self.put_multipart(uri, parts, Some(size), metadata).await
                }
            },
            None => {
                let threshold = transfer.multipart_threshold.max(1);
                let probe = self.guard(read_up_to(&mut reader, threshold)).await?;
                if (probe.len() as u64) < threshold {
                    tracing::debug!(uri = %uri, size = probe.len(), "Stream fits in one request");
                    self.put_single(uri, probe, metadata).await
                } else {
                    let parts = PartReader::new(reader, probe, transfer.part_size);
                    self.put_multipart(uri, parts, None, metadata).await
                }
            }
        }
    }

    async fn put_single(
        &self,
        uri: &StorageUri,
        data: Bytes,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt> {
        let receipt = self
            .guard(
                self.store
                    .put_object(uri.bucket(), uri.key(), data, metadata),
            )
            .await?;
        self.wait_for_object(uri.bucket(), uri.key(), Presence::Exists)
            .await?;
        tracing::info!(uri = %uri, size = receipt.size, "Uploaded");
        Ok(receipt)
    }

    async fn put_multipart<R>(
        &self,
        uri: &StorageUri,
        parts: PartReader<R>,
        expected_size: Option<u64>,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let upload_id = self
            .guard(
                self.store
                    .create_multipart_upload(uri.bucket(), uri.key(), metadata),
            )
            .await?;
        tracing::debug!(uri = %uri, upload_id = %upload_id, "Multipart upload started");

        let completed = match self.upload_parts(uri, &upload_id, parts).await {
            Ok(completed) => completed,
            Err(e) => {
                self.abort_upload(uri, &upload_id, &e).await;
                return Err(e);
            }
        };

        let size: u64 = completed.iter().map(|p| p.size).sum();
        if let Some(expected) = expected_size
            && size != expected
        {
            let err = size_changed(uri, expected, size);
            self.abort_upload(uri, &upload_id, &err).await;
            return Err(err);
        }
        let count = completed.len();
        let completion = self
            .guard(self.store.complete_multipart_upload(
                uri.bucket(),
                uri.key(),
                &upload_id,
                completed,
            ))
            .await;
        let mut receipt = match completion {
            Ok(receipt) => receipt,
            Err(e) => {
                self.abort_upload(uri, &upload_id, &e).await;
                return Err(e);
            }
        };
        receipt.size = size;
        receipt.parts = count;

        self.wait_for_object(uri.bucket(), uri.key(), Presence::Exists)
            .await?;
        tracing::info!(uri = %uri, size, parts = count, "Uploaded");
        Ok(receipt)
    }

    /// Feed parts into a bounded worker pool and collect them in order
    async fn upload_parts<R>(
        &self,
        uri: &StorageUri,
        upload_id: &str,
        mut parts: PartReader<R>,
    ) -> Result<Vec<CompletedPart>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let concurrency = self.config.transfer.concurrency.max(1);
        let mut tasks: JoinSet<Result<CompletedPart>> = JoinSet::new();
        let mut completed = Vec::new();
        let mut part_number: i32 = 0;

        while let Some(body) = self.guard(parts.next_part()).await? {
            part_number += 1;
            if part_number as u64 > MAX_PARTS {
                return Err(Error::ObjectTooLarge(format!(
                    "{uri} needs more than {MAX_PARTS} parts of {} bytes",
                    parts.part_size
                )));
            }
            while tasks.len() >= concurrency {
                completed.push(self.join_part(&mut tasks).await?);
            }

            let store = Arc::clone(&self.store);
            let retry = self.config.retry.clone();
            let (bucket, key, upload_id) = (
                uri.bucket().to_string(),
                uri.key().to_string(),
                upload_id.to_string(),
            );
            tasks.spawn(async move {
                let size = body.len();
                let result = retry_with_backoff(
                    &retry,
                    || {
                        let store = Arc::clone(&store);
                        let body = body.clone();
                        let (bucket, key, upload_id) = (&bucket, &key, &upload_id);
                        async move {
                            store
                                .upload_part(bucket, key, upload_id, part_number, body)
                                .await
                        }
                    },
                    is_retryable_error,
                )
                .await;
                match &result {
                    Ok(_) => tracing::debug!(part_number, size, "Part finished"),
                    Err(e) => tracing::warn!(part_number, size, error = %e, "Part failed"),
                }
                result
            });
        }

        while !tasks.is_empty() {
            completed.push(self.join_part(&mut tasks).await?);
        }
        completed.sort_by_key(|p| p.part_number);
        Ok(completed)
    }

    async fn join_part(
        &self,
        tasks: &mut JoinSet<Result<CompletedPart>>,
    ) -> Result<CompletedPart> {
        let joined = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            joined = tasks.join_next() => joined,
        };
        match joined {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(Error::TransferFailed {
                message: format!("part task failed: {e}"),
                source: None,
            }),
            None => Err(Error::TransferFailed {
                message: "no part in flight".into(),
                source: None,
            }),
        }
    }

    /// Best-effort cleanup of a failed multipart upload
    async fn abort_upload(&self, uri: &StorageUri, upload_id: &str, cause: &Error) {
        tracing::warn!(uri = %uri, upload_id, error = %cause, "Aborting multipart upload");
        if let Err(e) = self
            .store
            .abort_multipart_upload(uri.bucket(), uri.key(), upload_id)
            .await
        {
            tracing::warn!(uri = %uri, upload_id, error = %e, "Abort failed");
        }
    }

    /// Stream an object into `writer`, returning the bytes written
    ///
    /// A missing key is `NotFound`; everything else, including local write
    /// errors, is `TransferFailed` carrying the cause.
    pub async fn download<W>(&self, uri: &StorageUri, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let wrap = |e: Error| match e.kind() {
            ErrorKind::NotFound | ErrorKind::Cancelled => e,
            _ => Error::transfer_failed(format!("download {uri}"), e),
        };

        let body = self
            .guard(self.store.get_object(uri.bucket(), uri.key()))
            .await
            .map_err(wrap)?;
        let mut reader = body.reader;
        let written = self
            .guard(async {
                let written = tokio::io::copy(&mut reader, writer).await?;
                writer.flush().await?;
                Ok(written)
            })
            .await
            .map_err(wrap)?;

        tracing::info!(uri = %uri, size = written, "Downloaded");
        Ok(written)
    }

    /// Download an object into memory
    pub async fn download_bytes(&self, uri: &StorageUri) -> Result<Bytes> {
        let mut buffer = Vec::new();
        self.download(uri, &mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    /// Server-side copy, confirmed at the destination
    pub async fn copy_object(
        &self,
        source: &StorageUri,
        destination: &StorageUri,
        metadata: &TransferMetadata,
    ) -> Result<()> {
        self.guard(self.store.copy_object(source, destination, metadata))
            .await?;
        self.wait_for_object(destination.bucket(), destination.key(), Presence::Exists)
            .await?;
        tracing::info!(source = %source, destination = %destination, "Copied");
        Ok(())
    }
}
