use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::{ClientVersion, Docker};
use chrono::Utc;
use metadata_domain::{MetadataRecord, MonitoredResource};
use serde_json::json;
use tracing::debug;

use crate::error::UpdaterError;
use crate::updater::{PollItem, UpdaterKind};

/// Lists running containers from the local container runtime's admin
/// socket every period. Containers that vanish between polls are
/// reported as tombstones.
pub struct ContainerPoller {
    enabled: bool,
    endpoint: String,
    filter_label: Option<String>,
    api_version: Option<ClientVersion>,
    record_version: String,
    previously_seen: Mutex<HashSet<String>>,
}

impl ContainerPoller {
    pub fn new(
        enabled: bool,
        endpoint: impl Into<String>,
        filter_label: Option<String>,
        api_version: impl AsRef<str>,
        record_version: impl Into<String>,
    ) -> Self {
        Self {
            enabled,
            endpoint: endpoint.into(),
            filter_label,
            api_version: parse_client_version(api_version.as_ref()),
            record_version: record_version.into(),
            previously_seen: Mutex::new(HashSet::new()),
        }
    }

    fn connect(&self) -> Result<Docker, UpdaterError> {
        let version = self
            .api_version
            .as_ref()
            .unwrap_or(bollard::API_DEFAULT_VERSION);
        if let Some(path) = self.endpoint.strip_prefix("unix://") {
            Docker::connect_with_socket(path, 30, version)
        } else {
            Docker::connect_with_http(&self.endpoint, 30, version)
        }
        .map_err(|e| UpdaterError::TransientQuery(e.to_string()))
    }
}

/// Parses a `docker_api_version` value like `v1.41` or `1.41` into the
/// `(major, minor)` pair bollard's client takes.
fn parse_client_version(s: &str) -> Option<ClientVersion> {
    let s = s.trim().trim_start_matches(['v', 'V']);
    let (major, minor) = s.split_once('.')?;
    Some(ClientVersion {
        major_version: major.parse().ok()?,
        minor_version: minor.parse().ok()?,
    })
}

#[async_trait]
impl UpdaterKind for ContainerPoller {
    fn name(&self) -> &str {
        "container-poller"
    }

    fn validate_configuration(&self) -> bool {
        self.enabled && self.api_version.is_some()
    }

    async fn query(&self) -> Result<Vec<PollItem>, UpdaterError> {
        let docker = self.connect()?;

        let mut filters = std::collections::HashMap::new();
        if let Some(label) = &self.filter_label {
            filters.insert("label".to_string(), vec![label.clone()]);
        }
        let options = Some(ListContainersOptions::<String> {
            all: false,
            filters,
            ..Default::default()
        });

        let containers = docker
            .list_containers(options)
            .await
            .map_err(|e| UpdaterError::TransientQuery(e.to_string()))?;

        let now = Utc::now();
        let mut seen_now = HashSet::new();
        let mut items = Vec::new();

        for c in &containers {
            let Some(id) = c.id.clone() else { continue };
            seen_now.insert(id.clone());

            let short_id = id.chars().take(12).collect::<String>();
            let names: Vec<String> = c.names.clone().unwrap_or_default();

            let resource = MonitoredResource::new(
                "docker_container",
                [("container_id".to_string(), id.clone())],
            )
            .map_err(|e| UpdaterError::PermanentQuery(e.to_string()))?;

            let record = MetadataRecord::new(
                self.record_version.clone(),
                now,
                now,
                json!({ "image": c.image, "names": names, "state": c.state }),
            );

            let mut ids = vec![id, short_id];
            ids.extend(names.into_iter().map(|n| n.trim_start_matches('/').to_string()));
            items.push(PollItem { ids, resource, record });
        }

        let vanished: Vec<String> = {
            let mut guard = self.previously_seen.lock().expect("lock poisoned");
            let vanished = guard.difference(&seen_now).cloned().collect();
            *guard = seen_now;
            vanished
        };

        for id in vanished {
            debug!(container_id = %id, "container poller: tombstoning vanished container");
            let resource = MonitoredResource::new(
                "docker_container",
                [("container_id".to_string(), id.clone())],
            )
            .map_err(|e| UpdaterError::PermanentQuery(e.to_string()))?;
            let mut record = MetadataRecord::new(self.record_version.clone(), now, now, json!(null));
            record.is_deleted = true;
            let short_id = id.chars().take(12).collect::<String>();
            items.push(PollItem { ids: vec![id, short_id], resource, record });
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_when_not_configured() {
        let poller = ContainerPoller::new(false, "unix:///var/run/docker.sock", None, "v1.41", "0.1");
        assert!(!poller.validate_configuration());
    }

    #[test]
    fn enabled_when_configured() {
        let poller = ContainerPoller::new(true, "unix:///var/run/docker.sock", None, "v1.41", "0.1");
        assert!(poller.validate_configuration());
    }

    #[test]
    fn malformed_api_version_disables_even_when_enabled() {
        let poller = ContainerPoller::new(true, "unix:///var/run/docker.sock", None, "not-a-version", "0.1");
        assert!(!poller.validate_configuration());
    }

    #[test]
    fn parses_version_with_or_without_leading_v() {
        assert_eq!(
            parse_client_version("v1.41"),
            Some(ClientVersion { major_version: 1, minor_version: 41 })
        );
        assert_eq!(
            parse_client_version("1.24"),
            Some(ClientVersion { major_version: 1, minor_version: 24 })
        );
        assert_eq!(parse_client_version("garbage"), None);
    }
}
