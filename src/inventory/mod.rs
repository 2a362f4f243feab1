//! Client side of the orchestration inventory: the system of record for
//! containers, hosts and IP addresses.
//!
//! Records are plain resources with a `links` map. Related collections are
//! reached by following a named link rather than by building URLs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub mod cattle;
pub use cattle::CattleClient;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid inventory URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{kind} {id} has no `{link}` link")]
    MissingLink {
        kind: String,
        id: String,
        link: String,
    },
}

/// Fields shared by every inventory record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub links: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryContainer {
    #[serde(flatten)]
    pub resource: Resource,
    pub external_id: Option<String>,
    pub network_mode: Option<String>,
    pub primary_ip_address: Option<String>,
}

impl InventoryContainer {
    pub fn is_host_network(&self) -> bool {
        self.network_mode.as_deref() == Some("host")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Host {
    #[serde(flatten)]
    pub resource: Resource,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IpAddress {
    #[serde(flatten)]
    pub resource: Resource,
    pub address: Option<String>,
}

/// Query filters, sent as query string parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOpts {
    pub filters: BTreeMap<String, String>,
}

impl ListOpts {
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Live containers correlated with a Docker container ID.
    pub fn by_external_id(id: &str) -> Self {
        Self::default()
            .filter("externalId", id)
            .filter("removed_null", "")
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn list_containers(
        &self,
        opts: &ListOpts,
    ) -> Result<Collection<InventoryContainer>, InventoryError>;

    /// Follows the `hosts` link of `resource`.
    async fn hosts(&self, resource: &Resource) -> Result<Collection<Host>, InventoryError>;

    /// Follows the `ipAddresses` link of `resource`.
    async fn ip_addresses(&self, resource: &Resource)
        -> Result<Collection<IpAddress>, InventoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_container_collection() {
        let body = json!({
            "type": "collection",
            "resourceType": "container",
            "data": [{
                "id": "1i42",
                "type": "container",
                "externalId": "abc123",
                "networkMode": "managed",
                "primaryIpAddress": "10.42.17.3",
                "links": {
                    "self": "http://cattle/v1/containers/1i42",
                    "hosts": "http://cattle/v1/containers/1i42/hosts"
                }
            }]
        });
        let c: Collection<InventoryContainer> = serde_json::from_value(body).unwrap();
        let record = &c.data[0];
        assert_eq!(record.resource.id, "1i42");
        assert_eq!(record.resource.kind, "container");
        assert_eq!(record.external_id.as_deref(), Some("abc123"));
        assert_eq!(record.primary_ip_address.as_deref(), Some("10.42.17.3"));
        assert!(!record.is_host_network());
        assert_eq!(
            record.resource.links.get("hosts").map(String::as_str),
            Some("http://cattle/v1/containers/1i42/hosts")
        );
    }

    #[test]
    fn null_fields_and_missing_data() {
        let c: Collection<InventoryContainer> = serde_json::from_value(json!({
            "data": [{ "id": "1i1", "networkMode": "host", "primaryIpAddress": null }]
        }))
        .unwrap();
        assert!(c.data[0].is_host_network());
        assert_eq!(c.data[0].primary_ip_address, None);

        let empty: Collection<Host> = serde_json::from_value(json!({})).unwrap();
        assert!(empty.data.is_empty());
    }

    #[test]
    fn external_id_filter() {
        let opts = ListOpts::by_external_id("abc");
        assert_eq!(opts.filters.get("externalId").map(String::as_str), Some("abc"));
        assert_eq!(opts.filters.get("removed_null").map(String::as_str), Some(""));
    }
}
