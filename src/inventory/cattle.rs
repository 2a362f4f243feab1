use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use url::Url;

use super::{
    Collection, Host, Inventory, InventoryContainer, InventoryError, IpAddress, ListOpts, Resource,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a Cattle style inventory API.
#[derive(Clone)]
pub struct CattleClient {
    http: reqwest::Client,
    base: Url,
    access_key: String,
    secret_key: String,
}

impl CattleClient {
    pub fn new(
        url: &str,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, InventoryError> {
        let mut base = Url::parse(url)?;
        // Keep the last path segment (usually `v1`) when joining.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, InventoryError> {
        debug!("GET {} {:?}", url, query);
        let mut req = self.http.get(url).query(query);
        if !self.access_key.is_empty() {
            req = req.basic_auth(&self.access_key, Some(&self.secret_key));
        }
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn follow<T: DeserializeOwned>(
        &self,
        resource: &Resource,
        link: &str,
    ) -> Result<Collection<T>, InventoryError> {
        let href = resource
            .links
            .get(link)
            .ok_or_else(|| InventoryError::MissingLink {
                kind: resource.kind.clone(),
                id: resource.id.clone(),
                link: link.to_string(),
            })?;
        self.get(Url::parse(href)?, &[]).await
    }
}

#[async_trait]
impl Inventory for CattleClient {
    async fn list_containers(
        &self,
        opts: &ListOpts,
    ) -> Result<Collection<InventoryContainer>, InventoryError> {
        let query: Vec<(&str, &str)> = opts
            .filters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.get(self.base.join("containers")?, &query).await
    }

    async fn hosts(&self, resource: &Resource) -> Result<Collection<Host>, InventoryError> {
        self.follow(resource, "hosts").await
    }

    async fn ip_addresses(
        &self,
        resource: &Resource,
    ) -> Result<Collection<IpAddress>, InventoryError> {
        self.follow(resource, "ipAddresses").await
    }
}
