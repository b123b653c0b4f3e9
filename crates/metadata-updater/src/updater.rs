use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use metadata_domain::{MetadataRecord, MonitoredResource};
use metadata_health::HealthChecker;
use metadata_store::MetadataStore;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::UpdaterError;

/// One item a poller wants published: aliases for the resource plus its
/// freshly observed record.
pub struct PollItem {
    pub ids: Vec<String>,
    pub resource: MonitoredResource,
    pub record: MetadataRecord,
}

/// The capability set a concrete poller supplies to [`PollingUpdater`].
///
/// The driver owns all health-check interaction; implementors only decide
/// whether they're configured to run and how to fetch one batch of data.
#[async_trait]
pub trait UpdaterKind: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Whether this poller is configured to run. `false` disables it
    /// permanently for the life of the process; this is normal, not an
    /// error (e.g. no orchestrator configured).
    fn validate_configuration(&self) -> bool;

    async fn query(&self) -> Result<Vec<PollItem>, UpdaterError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdaterState {
    New = 0,
    Started = 1,
    Disabled = 2,
    Stopped = 3,
    Unhealthy = 4,
}

impl From<u8> for UpdaterState {
    fn from(v: u8) -> Self {
        match v {
            1 => UpdaterState::Started,
            2 => UpdaterState::Disabled,
            3 => UpdaterState::Stopped,
            4 => UpdaterState::Unhealthy,
            _ => UpdaterState::New,
        }
    }
}

/// A generic lifecycle driver for a periodic [`UpdaterKind`].
///
/// `start()` spawns one worker: on each tick it runs `query()`, publishes
/// whatever it returns, and sleeps for `period` via a cancellable wait. A
/// run of consecutive transient failures marks the updater unhealthy
/// without stopping the loop; a single permanent failure stops it outright.
pub struct PollingUpdater<K: UpdaterKind> {
    kind: K,
    store: Arc<dyn MetadataStore>,
    health: Arc<HealthChecker>,
    period: StdDuration,
    unhealthy_after: u32,
    state: AtomicU8,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    consecutive_failures: AtomicU32,
}

impl<K: UpdaterKind> PollingUpdater<K> {
    pub fn new(
        kind: K,
        store: Arc<dyn MetadataStore>,
        health: Arc<HealthChecker>,
        period: StdDuration,
        unhealthy_after: u32,
    ) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            kind,
            store,
            health,
            period,
            unhealthy_after,
            state: AtomicU8::new(UpdaterState::New as u8),
            shutdown_tx,
            shutdown_rx,
            handle: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
        })
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn state(&self) -> UpdaterState {
        UpdaterState::from(self.state.load(Ordering::SeqCst))
    }

    /// Spawn the worker. May only be called once; subsequent calls are a
    /// no-op. If `validate_configuration` fails the updater moves straight
    /// to `Disabled` and no worker is spawned.
    pub async fn start(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(
                UpdaterState::New as u8,
                UpdaterState::Started as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        if !self.kind.validate_configuration() {
            self.state.store(UpdaterState::Disabled as u8, Ordering::SeqCst);
            debug!(updater = self.name(), "disabled by configuration");
            return;
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.handle.lock().await = Some(handle);
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            match self.kind.query().await {
                Ok(items) => {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    self.health.clear(self.name());
                    for item in items {
                        if let Err(e) = self.store.update_resource(&item.ids, item.resource.clone()).await {
                            warn!(updater = self.name(), error = %e, "failed to publish resource ids");
                        }
                        self.store.update_metadata(item.resource, item.record).await;
                    }
                }
                Err(UpdaterError::PermanentQuery(msg)) => {
                    error!(updater = self.name(), error = %msg, "permanent query failure, stopping");
                    self.health.set_unhealthy(self.name());
                    self.state.store(UpdaterState::Unhealthy as u8, Ordering::SeqCst);
                    break;
                }
                Err(e) => {
                    warn!(updater = self.name(), error = %e, "transient query failure");
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    if failures >= self.unhealthy_after {
                        self.health.set_unhealthy(self.name());
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }
        if self.state() != UpdaterState::Unhealthy {
            self.state.store(UpdaterState::Stopped as u8, Ordering::SeqCst);
        }
    }

    /// Cooperative, idempotent shutdown. Returns once the worker has
    /// exited or `timeout` elapses, whichever comes first.
    pub async fn stop(&self, timeout: StdDuration) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!(updater = self.name(), "worker did not exit within grace period");
            }
        }
    }
}

/// Object-safe view of a started [`PollingUpdater`], so an agent can hold a
/// heterogeneous set of updaters and stop them uniformly without naming
/// every concrete `K`. Constructed after `start()`, since `start` itself
/// needs the concrete `Arc<PollingUpdater<K>>` to spawn its worker.
#[async_trait]
pub trait ManagedUpdater: Send + Sync {
    fn name(&self) -> &str;
    async fn stop(&self, timeout: StdDuration);
}

#[async_trait]
impl<K: UpdaterKind> ManagedUpdater for PollingUpdater<K> {
    fn name(&self) -> &str {
        PollingUpdater::name(self)
    }
    async fn stop(&self, timeout: StdDuration) {
        PollingUpdater::stop(self, timeout).await
    }
}
