use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A typed identity for a compute entity: `(type, labels)`.
///
/// Immutable once constructed. `labels` is kept in a [`BTreeMap`] so the
/// canonical JSON form always emits keys in the same order, and so that
/// pointwise equality of labels is just [`BTreeMap`]'s `PartialEq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub labels: BTreeMap<String, String>,
}

impl MonitoredResource {
    pub fn new(
        resource_type: impl Into<String>,
        labels: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, DomainError> {
        let resource_type = resource_type.into();
        if resource_type.is_empty() {
            return Err(DomainError::EmptyResourceType);
        }
        Ok(Self {
            resource_type,
            labels: labels.into_iter().collect(),
        })
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}
