//! Post-mutation confirmation polling
//!
//! Object stores acknowledge a write before every reader can observe it.
//! After each create or delete the engines poll a cheap HEAD probe on a fixed
//! interval until the new state is visible or an absolute deadline passes.

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::WaitConfig;
use crate::error::{Error, Result};
use crate::session::Session;

/// State a confirmation waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Exists,
    Absent,
}

impl Presence {
    fn describe(self) -> &'static str {
        match self {
            Presence::Exists => "exist",
            Presence::Absent => "disappear",
        }
    }
}

/// Poll `probe` until it returns `true`
///
/// The probe runs immediately, then every `config.interval()` until
/// `config.timeout()` has elapsed. A probe error ends the wait with that
/// error; running out of time gives [`Error::ConsistencyTimeout`].
pub async fn wait_until<F, Fut>(
    config: &WaitConfig,
    cancel: &CancellationToken,
    target: &str,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + config.timeout();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let satisfied = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = probe() => result?,
        };
        if satisfied {
            tracing::debug!(target_resource = target, attempt, "Confirmed");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::ConsistencyTimeout(target.to_string()));
        }

        let pause = config.interval().min(deadline - now);
        tracing::debug!(
            target_resource = target,
            attempt,
            pause_ms = pause.as_millis() as u64,
            "Not yet visible, polling again"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

impl Session {
    /// Wait for a bucket to appear or disappear
    pub(crate) async fn wait_for_bucket(&self, bucket: &str, state: Presence) -> Result<()> {
        let target = format!("bucket {bucket} to {}", state.describe());
        wait_until(&self.config.wait, &self.cancel, &target, move || async move {
            let exists = self.bucket_exists(bucket).await?;
            Ok(exists == (state == Presence::Exists))
        })
        .await
    }

    /// Wait for an object to appear or disappear
    pub(crate) async fn wait_for_object(
        &self,
        bucket: &str,
        key: &str,
        state: Presence,
    ) -> Result<()> {
        let target = format!("{bucket}/{key} to {}", state.describe());
        wait_until(&self.config.wait, &self.cancel, &target, move || async move {
            let exists = self.object_exists(bucket, key).await?;
            Ok(exists == (state == Presence::Exists))
        })
        .await
    }

    /// HEAD probe mapping `NotFound` to `false`
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.store.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
