use async_trait::async_trait;
use chrono::Utc;
use metadata_domain::MonitoredResource;
use serde_json::json;

use crate::error::UpdaterError;
use crate::updater::{PollItem, UpdaterKind};

/// Reports the host's own stable identity once per period.
///
/// Identity is derived from `/etc/machine-id` (falling back to a random
/// id generated once at construction) and the local hostname.
pub struct InstancePoller {
    resource_type: String,
    record_version: String,
    instance_id: String,
    hostname: String,
}

impl InstancePoller {
    pub fn new(resource_type: impl Into<String>, record_version: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            record_version: record_version.into(),
            instance_id: read_machine_id(),
            hostname: read_hostname(),
        }
    }
}

fn read_machine_id() -> String {
    match std::fs::read_to_string("/etc/machine-id") {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

fn read_hostname() -> String {
    match std::fs::read_to_string("/etc/hostname") {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string()),
    }
}

#[async_trait]
impl UpdaterKind for InstancePoller {
    fn name(&self) -> &str {
        "instance-poller"
    }

    fn validate_configuration(&self) -> bool {
        true
    }

    async fn query(&self) -> Result<Vec<PollItem>, UpdaterError> {
        let resource = MonitoredResource::new(
            self.resource_type.clone(),
            [
                ("instance_id".to_string(), self.instance_id.clone()),
                ("hostname".to_string(), self.hostname.clone()),
            ],
        )
        .map_err(|e| UpdaterError::PermanentQuery(e.to_string()))?;

        let now = Utc::now();
        let record = metadata_domain::MetadataRecord::new(
            self.record_version.clone(),
            now,
            now,
            json!({ "hostname": self.hostname, "instance_id": self.instance_id }),
        );

        Ok(vec![PollItem {
            ids: vec![self.instance_id.clone(), self.hostname.clone()],
            resource,
            record,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_emits_a_single_self_describing_item() {
        let poller = InstancePoller::new("generic_node", "0.1");
        let items = poller.query().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].resource.resource_type(), "generic_node");
        assert!(items[0].ids.contains(&poller.instance_id));
    }

    #[test]
    fn is_always_enabled() {
        assert!(InstancePoller::new("generic_node", "0.1").validate_configuration());
    }
}
