//! Application state.

use std::sync::Arc;

use tokio::sync::watch;

use lectern_media::{DurationProbe, FfprobeDurationProbe};
use lectern_ml_client::MlClient;
use lectern_queue::EventBroker;
use lectern_storage::StateStore;
use lectern_worker::{JobDispatcher, VideoPipeline, WorkerConfig};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: StateStore,
    pub broker: EventBroker,
    pub dispatcher: Arc<JobDispatcher>,
    pub prober: Arc<dyn DurationProbe>,
    pub shutdown: ShutdownSignal,
}

impl AppState {
    /// Build the store, broker, pipeline and dispatcher from configuration.
    pub fn new(config: ApiConfig, worker_config: &WorkerConfig) -> ApiResult<Self> {
        let store = StateStore::new(config.layout());
        let broker = EventBroker::new(config.event_mailbox_capacity);
        let ml = MlClient::from_env().map_err(|e| ApiError::internal(e.to_string()))?;

        let pipeline = VideoPipeline::from_config(worker_config, store.clone(), broker.clone(), ml);
        let dispatcher = JobDispatcher::from_config(Arc::new(pipeline), worker_config);

        Ok(Self::from_parts(
            config,
            store,
            broker,
            Arc::new(dispatcher),
            Arc::new(FfprobeDurationProbe),
        ))
    }

    pub fn from_parts(
        config: ApiConfig,
        store: StateStore,
        broker: EventBroker,
        dispatcher: Arc<JobDispatcher>,
        prober: Arc<dyn DurationProbe>,
    ) -> Self {
        Self {
            config,
            store,
            broker,
            dispatcher,
            prober,
            shutdown: ShutdownSignal::new(),
        }
    }
}

/// Process-wide shutdown flag.
///
/// Long-lived responses (event streams) end once it fires, so graceful
/// shutdown is not held open by connected clients.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called, immediately if it already was.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal_wakes_waiters() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        assert!(signal.is_triggered());
        // Late waiters see the flag without a new trigger
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }
}
