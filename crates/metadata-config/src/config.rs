use serde::Deserialize;

use crate::error::ConfigError;

/// Read-only, typed view of every option recognized by the agent.
///
/// Assembled once at startup from (in increasing priority) these defaults,
/// an optional TOML file, and CLI flags — never read from a process-wide
/// global afterward.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub verbose_logging: bool,

    pub metadata_api_num_threads: usize,
    pub metadata_api_bind_host: String,
    pub metadata_api_bind_port: u16,

    pub metadata_ingestion_raw_content_version: String,
    pub metadata_reporter_interval_seconds: u64,
    pub metadata_reporter_purge_deleted: bool,

    pub instance_resource_type: String,

    pub kubernetes_updater_enabled: bool,
    pub kubernetes_endpoint_host: String,
    pub kubernetes_pod_label_selector: Option<String>,
    pub kubernetes_node_name: Option<String>,
    pub kubernetes_service_account_directory: String,
    pub kubernetes_cluster_name: Option<String>,
    pub kubernetes_cluster_location: Option<String>,

    pub docker_updater_enabled: bool,
    pub docker_endpoint_host: String,
    pub docker_api_version: String,
    pub docker_container_filter: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            verbose_logging: false,

            metadata_api_num_threads: 4,
            metadata_api_bind_host: "127.0.0.1".to_string(),
            metadata_api_bind_port: 8000,

            metadata_ingestion_raw_content_version: "0.1".to_string(),
            metadata_reporter_interval_seconds: 60,
            metadata_reporter_purge_deleted: true,

            instance_resource_type: "generic_node".to_string(),

            kubernetes_updater_enabled: false,
            kubernetes_endpoint_host: "https://kubernetes.default.svc".to_string(),
            kubernetes_pod_label_selector: None,
            kubernetes_node_name: None,
            kubernetes_service_account_directory: "/var/run/secrets/kubernetes.io/serviceaccount"
                .to_string(),
            kubernetes_cluster_name: None,
            kubernetes_cluster_location: None,

            docker_updater_enabled: true,
            docker_endpoint_host: "unix:///var/run/docker.sock".to_string(),
            docker_api_version: "v1.41".to_string(),
            docker_container_filter: None,
        }
    }
}

impl Configuration {
    pub fn merge(mut self, raw: RawConfiguration) -> Self {
        macro_rules! apply {
            ($field:ident) => {
                if let Some(v) = raw.$field {
                    self.$field = v;
                }
            };
        }
        macro_rules! apply_some {
            ($field:ident) => {
                if let Some(v) = raw.$field {
                    self.$field = Some(v);
                }
            };
        }
        apply!(verbose_logging);
        apply!(metadata_api_num_threads);
        apply!(metadata_api_bind_host);
        apply!(metadata_api_bind_port);
        apply!(metadata_ingestion_raw_content_version);
        apply!(metadata_reporter_interval_seconds);
        apply!(metadata_reporter_purge_deleted);
        apply!(instance_resource_type);
        apply!(kubernetes_updater_enabled);
        apply!(kubernetes_endpoint_host);
        apply_some!(kubernetes_node_name);
        apply!(kubernetes_service_account_directory);
        apply_some!(kubernetes_cluster_name);
        apply_some!(kubernetes_cluster_location);
        apply!(docker_updater_enabled);
        apply!(docker_endpoint_host);
        apply!(docker_api_version);
        apply_some!(docker_container_filter);

        // Optional-valued fields that a file may set explicitly: these two
        // are distinguished at the raw level via an explicit Option so a
        // present-but-empty selector overrides a previously set one.
        if let Some(v) = raw.kubernetes_pod_label_selector {
            self.kubernetes_pod_label_selector = v;
        }

        self
    }

    /// Rejects option values that are syntactically well-typed but
    /// semantically unusable. A period of 0 would otherwise silently
    /// disable all cancellable-sleep cooperation; a thread count of 0
    /// cannot back a multi-threaded runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_reporter_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "metadata_reporter_interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.metadata_api_num_threads == 0 {
            return Err(ConfigError::Invalid(
                "metadata_api_num_threads must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The subset of [`Configuration`] a TOML file may set. Every field is
/// optional; anything absent falls back to the built-in default.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfiguration {
    pub verbose_logging: Option<bool>,

    pub metadata_api_num_threads: Option<usize>,
    pub metadata_api_bind_host: Option<String>,
    pub metadata_api_bind_port: Option<u16>,

    pub metadata_ingestion_raw_content_version: Option<String>,
    pub metadata_reporter_interval_seconds: Option<u64>,
    pub metadata_reporter_purge_deleted: Option<bool>,

    pub instance_resource_type: Option<String>,

    pub kubernetes_updater_enabled: Option<bool>,
    pub kubernetes_endpoint_host: Option<String>,
    #[serde(default)]
    pub kubernetes_pod_label_selector: Option<Option<String>>,
    pub kubernetes_node_name: Option<String>,
    pub kubernetes_service_account_directory: Option<String>,
    pub kubernetes_cluster_name: Option<String>,
    pub kubernetes_cluster_location: Option<String>,

    pub docker_updater_enabled: Option<bool>,
    pub docker_endpoint_host: Option<String>,
    pub docker_api_version: Option<String>,
    pub docker_container_filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_kubernetes_and_enable_docker() {
        let cfg = Configuration::default();
        assert!(!cfg.kubernetes_updater_enabled);
        assert!(cfg.docker_updater_enabled);
    }

    #[test]
    fn merge_overrides_only_present_fields() {
        let raw: RawConfiguration = toml::from_str(
            r#"
            metadata_api_bind_port = 9000
            kubernetes_updater_enabled = true
            "#,
        )
        .unwrap();
        let cfg = Configuration::default().merge(raw);
        assert_eq!(cfg.metadata_api_bind_port, 9000);
        assert!(cfg.kubernetes_updater_enabled);
        assert_eq!(cfg.metadata_api_bind_host, "127.0.0.1");
    }

    #[test]
    fn defaults_validate() {
        Configuration::default().validate().unwrap();
    }

    #[test]
    fn zero_reporter_interval_fails_validation() {
        let mut cfg = Configuration::default();
        cfg.metadata_reporter_interval_seconds = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_api_threads_fails_validation() {
        let mut cfg = Configuration::default();
        cfg.metadata_api_num_threads = 0;
        assert!(cfg.validate().is_err());
    }
}
