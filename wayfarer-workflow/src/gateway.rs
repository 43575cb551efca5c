use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use wayfarer_core::{RequestStore, StoreError, StoreResult};

const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Wraps the injected store with a per-call timeout.
///
/// Reads are retried on transient failures; writes run once and rely on the
/// compare-and-set guard for safe retries by the caller.
#[derive(Clone)]
pub struct StoreGateway {
    store: Arc<dyn RequestStore>,
    timeout: Duration,
    read_retries: u32,
}

impl StoreGateway {
    pub fn new(store: Arc<dyn RequestStore>, timeout: Duration, read_retries: u32) -> Self {
        Self {
            store,
            timeout,
            read_retries,
        }
    }

    pub async fn read<'a, T, F, Fut>(&'a self, op: &'static str, call: F) -> StoreResult<T>
    where
        F: Fn(&'a dyn RequestStore) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(op, call(self.store.as_ref())).await {
                Err(err) if err.is_transient() && attempt < self.read_retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, error = %err, "Retrying store read");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                result => return result,
            }
        }
    }

    pub async fn write<'a, T, F, Fut>(&'a self, op: &'static str, call: F) -> StoreResult<T>
    where
        F: FnOnce(&'a dyn RequestStore) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        self.bounded(op, call(self.store.as_ref())).await
    }

    async fn bounded<T, Fut>(&self, op: &'static str, fut: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(op, millis, "Store call timed out");
                Err(StoreError::Timeout(millis))
            }
        }
    }
}
