//! Client session
//!
//! A [`Session`] bundles the configured remote connection, the resolved
//! configuration and a cancellation token. The CLI builds exactly one per
//! invocation and passes it by reference; the lifecycle, list, transfer and
//! delete engines are `impl Session` blocks in their own modules.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::traits::ObjectStore;

/// One configured connection to an object store
#[derive(Clone)]
pub struct Session {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) config: SessionConfig,
    pub(crate) cancel: CancellationToken,
}

impl Session {
    pub fn new(store: Arc<dyn ObjectStore>, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Raw wire-level access
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Token that cancels every operation running on this session
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight and future operations
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` unless the session is cancelled first
    pub(crate) async fn guard<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
