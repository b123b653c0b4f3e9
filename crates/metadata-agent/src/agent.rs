use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use metadata_config::Configuration;
use metadata_health::HealthChecker;
use metadata_store::{InMemoryMetadataStore, MetadataStore};
use metadata_updater::{
    ContainerPoller, InstancePoller, ManagedUpdater, OrchestratorPoller, PollingUpdater,
};
use thiserror::Error;
use tracing::{error, info};

const UNHEALTHY_AFTER_CONSECUTIVE_FAILURES: u32 = 3;
const SHUTDOWN_GRACE: StdDuration = StdDuration::from_secs(30);

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to bind API socket on {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),
}

/// Holds the store, health checker, and API server; hands out handles to
/// the updaters; owns their stop order.
pub struct Agent {
    store: Arc<InMemoryMetadataStore>,
    health: Arc<HealthChecker>,
    updaters: Vec<Arc<dyn ManagedUpdater>>,
    bind_addr: SocketAddr,
    sweeper_shutdown: tokio::sync::watch::Sender<bool>,
    sweeper_handle: tokio::task::JoinHandle<()>,
}

impl Agent {
    pub async fn build(config: &Configuration, bind_addr: SocketAddr) -> Self {
        let expire_after = ChronoDuration::seconds(config.metadata_reporter_interval_seconds as i64 * 10);
        let store = Arc::new(InMemoryMetadataStore::new(expire_after));
        let health = Arc::new(HealthChecker::new());

        let (sweeper_shutdown_tx, sweeper_shutdown_rx) = tokio::sync::watch::channel(false);
        let sweeper_handle = if config.metadata_reporter_purge_deleted {
            let sweep_interval = StdDuration::from_secs(config.metadata_reporter_interval_seconds);
            store.clone().spawn_expiry_sweeper(sweep_interval, sweeper_shutdown_rx)
        } else {
            tokio::spawn(async {})
        };

        let period = StdDuration::from_secs(config.metadata_reporter_interval_seconds);
        let version = config.metadata_ingestion_raw_content_version.clone();

        let mut updaters: Vec<Arc<dyn ManagedUpdater>> = Vec::new();

        let instance_kind = InstancePoller::new(config.instance_resource_type.clone(), version.clone());
        let instance_updater = PollingUpdater::new(
            instance_kind,
            store.clone() as Arc<dyn MetadataStore>,
            health.clone(),
            period,
            UNHEALTHY_AFTER_CONSECUTIVE_FAILURES,
        );
        instance_updater.start().await;
        updaters.push(instance_updater);

        let container_kind = ContainerPoller::new(
            config.docker_updater_enabled,
            config.docker_endpoint_host.clone(),
            config.docker_container_filter.clone(),
            config.docker_api_version.clone(),
            version.clone(),
        );
        let container_updater = PollingUpdater::new(
            container_kind,
            store.clone() as Arc<dyn MetadataStore>,
            health.clone(),
            period,
            UNHEALTHY_AFTER_CONSECUTIVE_FAILURES,
        );
        container_updater.start().await;
        updaters.push(container_updater);

        let orchestrator_kind = OrchestratorPoller::new(
            config.kubernetes_updater_enabled,
            config.kubernetes_node_name.clone(),
            config.kubernetes_pod_label_selector.clone(),
            version,
        );
        let orchestrator_updater = PollingUpdater::new(
            orchestrator_kind,
            store.clone() as Arc<dyn MetadataStore>,
            health.clone(),
            period,
            UNHEALTHY_AFTER_CONSECUTIVE_FAILURES,
        );
        orchestrator_updater.start().await;
        updaters.push(orchestrator_updater);

        Self {
            store,
            health,
            updaters,
            bind_addr,
            sweeper_shutdown: sweeper_shutdown_tx,
            sweeper_handle,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// Binds the API socket, serves until `shutdown` resolves, then runs
    /// the shutdown sequence: stop updaters, drain the API server, tear
    /// down the store.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<(), AgentError> {
        let app = metadata_api::build_app(self.store.clone() as Arc<dyn MetadataStore>);

        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| AgentError::BindFailed(self.bind_addr, e))?;
        info!(addr = %self.bind_addr, "lookup API listening");

        let updaters = self.updaters;
        let stop_updaters_then_drain = async move {
            shutdown.await;
            info!("shutdown signaled, stopping updaters");
            for updater in &updaters {
                updater.stop(SHUTDOWN_GRACE).await;
            }
            info!("updaters stopped, draining API server");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(stop_updaters_then_drain)
            .await
            .map_err(|e| {
                error!(error = %e, "API server terminated unexpectedly");
                AgentError::BindFailed(self.bind_addr, std::io::Error::new(std::io::ErrorKind::Other, e))
            })?;

        let _ = self.sweeper_shutdown.send(true);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.sweeper_handle).await;
        drop(self.store);

        info!("agent shutdown complete");
        Ok(())
    }
}
