use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use metadata_domain::{MetadataRecord, MonitoredResource};
use serde_json::json;
use tracing::debug;

use crate::error::UpdaterError;
use crate::updater::{PollItem, UpdaterKind};

/// Enumerates pods scoped to the local node via the Kubernetes API,
/// emitting tombstones for pods that disappear between polls. Disabled
/// entirely unless `kubernetes_updater_enabled` is set.
pub struct OrchestratorPoller {
    enabled: bool,
    node_name: Option<String>,
    label_selector: Option<String>,
    record_version: String,
    previously_seen: Mutex<HashSet<String>>,
}

impl OrchestratorPoller {
    pub fn new(
        enabled: bool,
        node_name: Option<String>,
        label_selector: Option<String>,
        record_version: impl Into<String>,
    ) -> Self {
        Self {
            enabled,
            node_name,
            label_selector,
            record_version: record_version.into(),
            previously_seen: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl UpdaterKind for OrchestratorPoller {
    fn name(&self) -> &str {
        "orchestrator-poller"
    }

    fn validate_configuration(&self) -> bool {
        self.enabled
    }

    async fn query(&self) -> Result<Vec<PollItem>, UpdaterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| UpdaterError::TransientQuery(e.to_string()))?;
        let pods: Api<Pod> = Api::all(client);

        let mut params = ListParams::default();
        if let Some(selector) = &self.label_selector {
            params = params.labels(selector);
        }
        if let Some(node) = &self.node_name {
            params = params.fields(&format!("spec.nodeName={node}"));
        }

        let list = pods
            .list(&params)
            .await
            .map_err(|e| UpdaterError::TransientQuery(e.to_string()))?;

        let now = Utc::now();
        let mut seen_now = HashSet::new();
        let mut items = Vec::new();

        for pod in list.items {
            let Some(uid) = pod.metadata.uid.clone() else { continue };
            seen_now.insert(uid.clone());

            let name = pod.metadata.name.clone().unwrap_or_default();
            let namespace = pod.metadata.namespace.clone().unwrap_or_default();
            let node = pod
                .spec
                .as_ref()
                .and_then(|s| s.node_name.clone())
                .unwrap_or_default();
            let phase = pod
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_default();

            let resource = MonitoredResource::new(
                "k8s_pod",
                [
                    ("namespace".to_string(), namespace.clone()),
                    ("pod_name".to_string(), name.clone()),
                ],
            )
            .map_err(|e| UpdaterError::PermanentQuery(e.to_string()))?;

            let record = MetadataRecord::new(
                self.record_version.clone(),
                now,
                now,
                json!({ "uid": uid, "node": node, "phase": phase }),
            );

            items.push(PollItem {
                ids: vec![uid, format!("{namespace}/{name}")],
                resource,
                record,
            });
        }

        let vanished: Vec<String> = {
            let mut guard = self.previously_seen.lock().expect("lock poisoned");
            let vanished = guard.difference(&seen_now).cloned().collect();
            *guard = seen_now;
            vanished
        };

        for uid in vanished {
            debug!(pod_uid = %uid, "orchestrator poller: tombstoning vanished pod");
            let resource = MonitoredResource::new("k8s_pod", [("uid".to_string(), uid.clone())])
                .map_err(|e| UpdaterError::PermanentQuery(e.to_string()))?;
            let mut record = MetadataRecord::new(self.record_version.clone(), now, now, json!(null));
            record.is_deleted = true;
            items.push(PollItem { ids: vec![uid], resource, record });
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_until_configured() {
        let poller = OrchestratorPoller::new(false, None, None, "0.1");
        assert!(!poller.validate_configuration());
    }

    #[test]
    fn enabled_when_configured() {
        let poller = OrchestratorPoller::new(true, Some("node-a".to_string()), None, "0.1");
        assert!(poller.validate_configuration());
    }
}
