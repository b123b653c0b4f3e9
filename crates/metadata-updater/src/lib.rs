pub mod container;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod updater;

pub use container::ContainerPoller;
pub use error::UpdaterError;
pub use instance::InstancePoller;
pub use orchestrator::OrchestratorPoller;
pub use updater::{ManagedUpdater, PollItem, PollingUpdater, UpdaterKind, UpdaterState};
