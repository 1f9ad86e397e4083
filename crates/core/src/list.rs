//! Paginated, delimiter-aware object listing
//!
//! [`Session::list_pages`] is the primitive: a lazy stream yielding one
//! service page at a time in provider key order. [`Session::list_objects`]
//! drains it into a [`Listing`]. Unlike bucket listing, a failing page aborts
//! the whole call and nothing gathered so far is returned.

use std::collections::BTreeSet;

use futures::{Stream, TryStreamExt};

use crate::config::clamp_page_size;
use crate::error::Result;
use crate::session::Session;
use crate::traits::{ListPage, ListRequest, ObjectInfo};
use crate::uri::StorageUri;

/// Default delimiter for hierarchical listings
pub const DELIMITER: &str = "/";

/// Options for listing objects
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// `None` lists every key under the prefix
    pub delimiter: Option<String>,
    /// Overrides the session page size
    pub page_size: Option<i32>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            delimiter: Some(DELIMITER.to_string()),
            page_size: None,
        }
    }
}

impl ListOptions {
    /// Flat listing with no delimiter roll-up
    pub fn recursive() -> Self {
        Self {
            delimiter: None,
            page_size: None,
        }
    }
}

/// Complete result of a listing
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<ObjectInfo>,
    pub common_prefixes: BTreeSet<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }

    /// Sum of object sizes
    pub fn total_size(&self) -> i64 {
        self.objects.iter().map(|o| o.size).sum()
    }

    /// Objects and common prefixes in key order, prefixes as directories
    pub fn entries(&self, bucket: &str) -> Vec<ObjectInfo> {
        merge_entries(bucket, &self.objects, &self.common_prefixes)
    }
}

impl ListPage {
    /// Page contents with common prefixes folded in as directory entries
    pub fn entries(&self, bucket: &str) -> Vec<ObjectInfo> {
        merge_entries(bucket, &self.objects, &self.common_prefixes)
    }
}

fn merge_entries<'a>(
    bucket: &str,
    objects: &[ObjectInfo],
    prefixes: impl IntoIterator<Item = &'a String>,
) -> Vec<ObjectInfo> {
    let mut entries: Vec<ObjectInfo> = prefixes
        .into_iter()
        .map(|p| ObjectInfo::dir(StorageUri::new(bucket, p)))
        .collect();
    entries.extend(objects.iter().cloned());
    entries.sort_by(|a, b| a.key().cmp(b.key()));
    entries
}

impl Session {
    /// Lazily fetch listing pages
    ///
    /// The stream ends after the page that carries no continuation token.
    pub fn list_pages<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> impl Stream<Item = Result<ListPage>> + Send + 'a {
        let page_size = options
            .page_size
            .map(clamp_page_size)
            .unwrap_or_else(|| self.config.effective_page_size());
        let first = ListRequest {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            delimiter: options.delimiter.clone().filter(|d| !d.is_empty()),
            max_keys: page_size,
            continuation_token: None,
        };

        futures::stream::try_unfold(Some(first), move |request| async move {
            let Some(request) = request else {
                return Ok(None);
            };
            let page = self.guard(self.store.list_objects_page(&request)).await?;
            tracing::debug!(
                bucket = %request.bucket,
                prefix = %request.prefix,
                objects = page.objects.len(),
                prefixes = page.common_prefixes.len(),
                more = page.next_continuation_token.is_some(),
                "Fetched object page"
            );

            let next = page
                .next_continuation_token
                .clone()
                .map(|token| ListRequest {
                    continuation_token: Some(token),
                    ..request
                });
            Ok(Some((page, next)))
        })
    }

    /// Hierarchical listing under `prefix` with the default delimiter
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Listing> {
        self.list_objects_with(bucket, prefix, &ListOptions::default())
            .await
    }

    /// Listing under `prefix` with explicit options
    pub async fn list_objects_with(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Listing> {
        let mut pages = std::pin::pin!(self.list_pages(bucket, prefix, options));
        let mut listing = Listing::default();
        while let Some(page) = pages.try_next().await? {
            listing.objects.extend(page.objects);
            listing.common_prefixes.extend(page.common_prefixes);
        }
        Ok(listing)
    }

    /// Metadata of a single object
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        self.guard(self.store.head_object(bucket, key)).await
    }
}
