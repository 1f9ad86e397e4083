//! Bucket lifecycle: list, exists, create, delete, head

use crate::error::{Error, Result};
use crate::session::Session;
use crate::traits::BucketInfo;
use crate::wait::Presence;

/// Outcome of draining every bucket page
///
/// A failing page stops the listing; the buckets gathered so far are kept
/// next to the error.
#[derive(Debug, Default)]
pub struct BucketList {
    pub buckets: Vec<BucketInfo>,
    pub error: Option<Error>,
}

impl BucketList {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// All-or-nothing view of the listing
    pub fn into_result(self) -> Result<Vec<BucketInfo>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.buckets),
        }
    }
}

impl Session {
    /// List every bucket visible to the credentials
    pub async fn list_buckets(&self) -> BucketList {
        let mut list = BucketList::default();
        let mut token: Option<String> = None;
        let page_size = self.config.effective_page_size();

        loop {
            let page = match self
                .guard(self.store.list_buckets_page(token.take(), page_size))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        collected = list.buckets.len(),
                        error = %e,
                        "Bucket listing stopped early"
                    );
                    list.error = Some(e);
                    return list;
                }
            };

            tracing::debug!(count = page.buckets.len(), "Fetched bucket page");
            list.buckets.extend(page.buckets);
            match page.continuation_token {
                Some(next) => token = Some(next),
                None => return list,
            }
        }
    }

    /// True when the bucket exists and is reachable
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.guard(self.store.head_bucket(bucket)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn head_bucket(&self, bucket: &str) -> Result<BucketInfo> {
        self.guard(self.store.head_bucket(bucket)).await
    }

    /// Create a bucket and wait until it is visible
    ///
    /// An existing bucket comes back as a recoverable
    /// [`Error::AlreadyExists`]; `owned_by_you` tells whether it is the
    /// caller's own.
    pub async fn create_bucket(&self, bucket: &str, region: Option<&str>) -> Result<()> {
        let region = region
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.region.clone());

        self.guard(self.store.create_bucket(bucket, region)).await?;
        self.wait_for_bucket(bucket, Presence::Exists).await?;
        tracing::info!(bucket, "Bucket created");
        Ok(())
    }

    /// Delete an empty bucket and wait until it is gone
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.guard(self.store.delete_bucket(bucket)).await?;
        self.wait_for_bucket(bucket, Presence::Absent).await?;
        tracing::info!(bucket, "Bucket deleted");
        Ok(())
    }
}
