//! Storage locator parsing
//!
//! Locators have the form `s3://bucket[/key]`. Bucket and key are split at the
//! first `/` after the scheme. Nothing is decoded or validated beyond that;
//! the service rejects illegal bucket names on the actual request.

use serde::Serialize;

use crate::error::{Error, Result};

/// The only accepted scheme
pub const SCHEME: &str = "s3";

const SEPARATOR: &str = "://";

/// A parsed `s3://bucket/key` locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StorageUri {
    scheme: String,
    bucket: String,
    key: String,
}

impl StorageUri {
    /// Build a locator from already-split parts
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme: SCHEME.to_string(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket name; empty for a root listing
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key or prefix; empty for bucket-level operations
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `bucket/key`, the form used in copy sources and log lines
    pub fn path(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }

    /// True when the locator names a prefix rather than a single object
    pub fn is_prefix(&self) -> bool {
        self.key.is_empty() || self.key.ends_with('/')
    }

    /// Locator for `child` underneath this one
    ///
    /// A trailing `/` on the current key is reused rather than doubled.
    pub fn join(&self, child: &str) -> Self {
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{child}", self.key)
        } else {
            format!("{}/{child}", self.key)
        };
        Self::new(&self.bucket, key)
    }

    /// Same bucket, different key
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self::new(&self.bucket, key)
    }
}

impl std::fmt::Display for StorageUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}{SEPARATOR}{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}{SEPARATOR}{}/{}", self.scheme, self.bucket, self.key)
        }
    }
}

impl std::str::FromStr for StorageUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parse a `s3://bucket[/key]` locator
pub fn parse(s: &str) -> Result<StorageUri> {
    let Some((scheme, rest)) = s.split_once(SEPARATOR) else {
        return Err(Error::InvalidUri(format!(
            "'{s}' is missing the {SCHEME}{SEPARATOR} prefix"
        )));
    };

    if scheme != SCHEME {
        return Err(Error::InvalidUri(format!(
            "unsupported scheme '{scheme}' in '{s}', expected {SCHEME}{SEPARATOR}"
        )));
    }

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));

    Ok(StorageUri {
        scheme: scheme.to_string(),
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}
