//! Batch deletion with per-key outcomes

use std::collections::{BTreeMap, BTreeSet};

use futures::{StreamExt, stream};

use crate::error::{Error, ErrorKind, Result};
use crate::list::ListOptions;
use crate::session::Session;
use crate::wait::Presence;

/// Service limit on keys per delete request
pub const MAX_BATCH: usize = 1000;

/// Result of deleting each requested key
pub type DeleteOutcome = BTreeMap<String, Result<()>>;

impl Session {
    /// Delete `keys` from `bucket`
    ///
    /// Keys that are already absent come back as `NotFound` and are not sent.
    /// The rest go out in batches of at most [`MAX_BATCH`]; every key the
    /// service reports deleted is then confirmed gone. A bucket-level failure,
    /// or a failure of the first batch request, returns `Err` for the whole
    /// call. When a later batch request fails, its error is recorded against
    /// every key of that batch and of the batches not yet sent, and the keys
    /// already deleted are still confirmed.
    pub async fn delete_objects(
        &self,
        bucket: &str,
        keys: &BTreeSet<String>,
    ) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::new();
        if keys.is_empty() {
            return Ok(outcome);
        }
        // HEAD cannot tell a missing bucket from a missing key
        if !self.bucket_exists(bucket).await? {
            return Err(Error::NotFound(bucket.to_string()));
        }

        let concurrency = self.config.transfer.concurrency.max(1);
        let probes: Vec<(String, Result<bool>)> = stream::iter(keys)
            .map(|key| async move {
                let exists = self.guard(self.object_exists(bucket, key)).await;
                (key.clone(), exists)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut present = Vec::new();
        for (key, probe) in probes {
            match probe {
                Ok(true) => present.push(key),
                Ok(false) => {
                    let missing = Error::NotFound(format!("{bucket}/{key}"));
                    outcome.insert(key, Err(missing));
                }
                Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
                Err(e) => {
                    outcome.insert(key, Err(e));
                }
            }
        }
        present.sort();

        let mut deleted = Vec::new();
        for (index, batch) in present.chunks(MAX_BATCH).enumerate() {
            let report = match self
                .guard(self.store.delete_objects(bucket, batch.to_vec()))
                .await
            {
                Ok(report) => report,
                Err(e) if index == 0 || e.kind() == ErrorKind::Cancelled => return Err(e),
                Err(e) => {
                    let unsent = &present[index * MAX_BATCH..];
                    tracing::warn!(
                        bucket,
                        batch = index,
                        unsent = unsent.len(),
                        error = %e,
                        "Delete batch failed"
                    );
                    for key in unsent {
                        outcome.insert(key.clone(), Err(e.duplicate()));
                    }
                    break;
                }
            };
            tracing::debug!(
                bucket,
                requested = batch.len(),
                deleted = report.deleted.len(),
                failed = report.errors.len(),
                "Delete batch finished"
            );

            let mut failed = BTreeSet::new();
            for (key, e) in report.errors {
                tracing::warn!(bucket, key = %key, error = %e, "Key not deleted");
                failed.insert(key.clone());
                outcome.insert(key, Err(e));
            }
            deleted.extend(batch.iter().filter(|k| !failed.contains(*k)).cloned());
        }

        let confirmations: Vec<(String, Result<()>)> = stream::iter(deleted)
            .map(|key| async move {
                let confirmed = self.wait_for_object(bucket, &key, Presence::Absent).await;
                (key, confirmed)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (key, confirmed) in confirmations {
            if let Err(e) = &confirmed
                && e.kind() == ErrorKind::Cancelled
            {
                return Err(Error::Cancelled);
            }
            outcome.insert(key, confirmed);
        }

        let ok = outcome.values().filter(|r| r.is_ok()).count();
        tracing::info!(bucket, deleted = ok, failed = outcome.len() - ok, "Delete finished");
        Ok(outcome)
    }

    /// Delete every object under `prefix`
    pub async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<DeleteOutcome> {
        let listing = self
            .list_objects_with(bucket, prefix, &ListOptions::recursive())
            .await?;
        let keys: BTreeSet<String> = listing
            .objects
            .into_iter()
            .map(|o| o.key().to_string())
            .collect();
        self.delete_objects(bucket, &keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionConfig, WaitConfig};
    use crate::testing::MemoryStore;
    use crate::traits::MockObjectStore;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryStore>, Session) {
        let store = Arc::new(MemoryStore::with_bucket("b"));
        let config = SessionConfig {
            wait: WaitConfig {
                interval_ms: 1,
                timeout_ms: 50,
            },
            ..Default::default()
        };
        let session = Session::new(store.clone(), config);
        (store, session)
    }

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_absent_key_reported_not_found() {
        let (store, session) = setup();
        store.put("b", "k1", "one");

        let outcome = session
            .delete_objects("b", &keys(&["k1", "k2"]))
            .await
            .unwrap();
        assert!(outcome["k1"].is_ok());
        assert_eq!(
            outcome["k2"].as_ref().unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(store.keys("b").is_empty());
        assert_eq!(store.calls().delete_batch_sizes, vec![1]);
    }

    #[tokio::test]
    async fn test_empty_key_set_makes_no_calls() {
        let mut mock = MockObjectStore::new();
        mock.expect_head_bucket().never();
        mock.expect_delete_objects().never();
        let session = Session::new(Arc::new(mock), SessionConfig::default());

        let outcome = session.delete_objects("b", &BTreeSet::new()).await.unwrap();
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_batches_are_capped() {
        let (store, session) = setup();
        let names: BTreeSet<String> = (0..2500).map(|i| format!("k{i:05}")).collect();
        for name in &names {
            store.put("b", name, "x");
        }

        let outcome = session.delete_objects("b", &names).await.unwrap();
        assert_eq!(outcome.len(), 2500);
        assert!(outcome.values().all(|r| r.is_ok()));
        assert_eq!(store.calls().delete_batch_sizes, vec![1000, 1000, 500]);
    }

    #[tokio::test]
    async fn test_per_key_errors() {
        let (store, session) = setup();
        store.put("b", "open", "1");
        store.put("b", "locked", "2");
        store.protect("locked");

        let outcome = session
            .delete_objects("b", &keys(&["open", "locked"]))
            .await
            .unwrap();
        assert!(outcome["open"].is_ok());
        assert_eq!(
            outcome["locked"].as_ref().unwrap_err().kind(),
            ErrorKind::AccessDenied
        );
        assert_eq!(store.keys("b"), vec!["locked".to_string()]);
    }

    #[tokio::test]
    async fn test_unconfirmed_key_times_out_alone() {
        let (store, session) = setup();
        store.put("b", "gone", "1");
        store.put("b", "lingering", "2");
        store.ghost("b", "lingering");

        let outcome = session
            .delete_objects("b", &keys(&["gone", "lingering"]))
            .await
            .unwrap();
        assert!(outcome["gone"].is_ok());
        assert_eq!(
            outcome["lingering"].as_ref().unwrap_err().kind(),
            ErrorKind::ConsistencyTimeout
        );
    }

    #[tokio::test]
    async fn test_missing_bucket_is_global_error() {
        let (_store, session) = setup();
        let err = session
            .delete_objects("nope", &keys(&["k"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_batch_failure_aborts() {
        let mut mock = MockObjectStore::new();
        mock.expect_head_bucket()
            .returning(|b| Ok(crate::traits::BucketInfo::new(b)));
        mock.expect_head_object().returning(|b, k| {
            Ok(crate::traits::ObjectInfo::file(
                crate::uri::StorageUri::new(b, k),
                1,
            ))
        });
        mock.expect_delete_objects()
            .returning(|b, _| Err(Error::AccessDenied(b.to_string())));
        let session = Session::new(Arc::new(mock), SessionConfig::default());

        let err = session
            .delete_objects("b", &keys(&["a", "b"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_later_batch_failure_keeps_earlier_outcomes() {
        use std::sync::Mutex;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let removed: Arc<Mutex<BTreeSet<String>>> = Arc::default();
        let requests = Arc::new(AtomicUsize::new(0));

        let mut mock = MockObjectStore::new();
        mock.expect_head_bucket()
            .returning(|b| Ok(crate::traits::BucketInfo::new(b)));
        let seen = removed.clone();
        mock.expect_head_object().returning(move |b, k| {
            if seen.lock().unwrap().contains(k) {
                Err(Error::NotFound(format!("{b}/{k}")))
            } else {
                Ok(crate::traits::ObjectInfo::file(
                    crate::uri::StorageUri::new(b, k),
                    1,
                ))
            }
        });
        let sink = removed.clone();
        let count = requests.clone();
        mock.expect_delete_objects().returning(move |b, keys| {
            if count.fetch_add(1, Ordering::SeqCst) == 0 {
                sink.lock().unwrap().extend(keys.iter().cloned());
                Ok(crate::traits::DeleteReport {
                    deleted: keys,
                    errors: vec![],
                })
            } else {
                Err(Error::AccessDenied(b.to_string()))
            }
        });
        let config = SessionConfig {
            wait: WaitConfig {
                interval_ms: 1,
                timeout_ms: 50,
            },
            ..Default::default()
        };
        let session = Session::new(Arc::new(mock), config);

        let names: BTreeSet<String> = (0..1500).map(|i| format!("k{i:05}")).collect();
        let outcome = session.delete_objects("b", &names).await.unwrap();

        assert_eq!(outcome.len(), 1500);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        let ok = outcome.values().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1000);
        assert!(outcome["k00999"].is_ok());
        let denied = outcome
            .values()
            .filter_map(|r| r.as_ref().err())
            .filter(|e| e.kind() == ErrorKind::AccessDenied)
            .count();
        assert_eq!(denied, 500);
        assert_eq!(
            outcome["k01000"].as_ref().unwrap_err().kind(),
            ErrorKind::AccessDenied
        );
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let (store, session) = setup();
        for key in ["logs/a", "logs/2024/b", "logs/2024/c", "keep/d"] {
            store.put("b", key, "x");
        }

        let outcome = session.delete_prefix("b", "logs/").await.unwrap();
        assert_eq!(outcome.len(), 3);
        assert_eq!(store.keys("b"), vec!["keep/d".to_string()]);
    }
}
