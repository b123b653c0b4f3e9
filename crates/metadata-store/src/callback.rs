use metadata_domain::MonitoredResource;

/// Emitted by the store after its internal state is committed and outside
/// the write lock. Subscribers must not call back into mutating store
/// methods.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// `alias` was rebound from `previous` to `current`. `previous` is
    /// `None` the first time the alias is bound.
    ResourceRebound {
        alias: String,
        previous: Option<MonitoredResource>,
        current: MonitoredResource,
    },
    /// A record was installed (or replaced) for `resource`.
    MetadataUpdated { resource: MonitoredResource },
    /// `resource` and its aliases were removed by the expiry sweep.
    Purged { resource: MonitoredResource },
}

/// A subscriber invoked after a store mutation commits.
pub type ChangeCallback = std::sync::Arc<dyn Fn(ChangeEvent) + Send + Sync>;
