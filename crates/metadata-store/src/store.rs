use async_trait::async_trait;
use metadata_domain::{MetadataRecord, MonitoredResource};

use crate::error::StoreError;

/// A consistent point-in-time copy of the resource→record map.
pub type MetadataSnapshot = std::collections::HashMap<MonitoredResource, MetadataRecord>;

/// The concurrent metadata plane: alias→resource and resource→record maps
/// with multi-alias lookup and time-based expiry.
///
/// All operations are safe under concurrent callers. Reads must not block
/// writers indefinitely.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Establish `alias → resource` for every alias in `aliases`. An empty
    /// alias is rejected; the rest of the batch still succeeds.
    async fn update_resource(
        &self,
        aliases: &[String],
        resource: MonitoredResource,
    ) -> Result<(), StoreError>;

    /// Install or replace the record for `resource`, subject to the
    /// monotonic-`collected_at` and tombstone-precedence invariants.
    /// Refreshes `last_collection_time` for `resource` regardless of whether
    /// the record itself was installed, so a resource stays "seen" even when
    /// a stale record arrives for it.
    async fn update_metadata(&self, resource: MonitoredResource, record: MetadataRecord);

    /// Resolve an alias to its currently bound resource.
    async fn lookup_resource(&self, alias: &str) -> Result<MonitoredResource, StoreError>;

    /// A consistent point-in-time copy of the resource→record map.
    async fn get_metadata_map(&self) -> MetadataSnapshot;

    /// Remove records where `is_deleted` is true or `expires_at` is past,
    /// together with every alias pointing at a purged resource. Returns the
    /// number of resources purged.
    async fn purge_deleted_entries(&self) -> usize;
}
