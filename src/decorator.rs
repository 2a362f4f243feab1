//! Runtime decorator that tags containers for the orchestration side and
//! fills in the address of pod infrastructure containers from the inventory.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::ListImagesOptions;
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, ImageInspect,
    ImageSummary,
};
use bollard::system::Version;
use log::{error, info};
use tokio::time::sleep;

use crate::cache::AddressCache;
use crate::inventory::{Inventory, InventoryContainer, InventoryError, ListOpts};
use crate::labels::{
    display_name, DISPLAY_NAME_LABEL, LAUNCH_CONFIG_LABEL, NETWORK_LABEL, PRIMARY_LAUNCH_CONFIG,
};
use crate::runtime::{ContainerRuntime, Result, RuntimeError};

/// Image of the placeholder container holding a pod's network namespace.
pub const DEFAULT_POD_INFRA_IMAGE: &str = "gcr.io/google_containers/pause:2.0";

const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(600) {
    Some(n) => n,
    None => unreachable!(),
};

/// How long an inspection waits for the inventory to report an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// At least one attempt always runs, so a cached address is always seen.
    pub max_attempts: NonZeroU32,
    /// Pause after each unsuccessful attempt.
    pub interval: Duration,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: Duration::from_millis(500),
        }
    }
}

/// Wraps a [`ContainerRuntime`], forwarding everything except container
/// creation and inspection.
///
/// Created containers get identity labels. Inspecting a running pod
/// infrastructure container polls the inventory until it knows the
/// container's address, and reports that address in the network settings.
pub struct DecoratingRuntime<R, I> {
    inner: R,
    inventory: I,
    cache: AddressCache,
    pod_infra_image: String,
    policy: ResolvePolicy,
}

impl<R, I> DecoratingRuntime<R, I>
where
    R: ContainerRuntime,
    I: Inventory,
{
    pub fn new(inner: R, inventory: I) -> Self {
        Self {
            inner,
            inventory,
            cache: AddressCache::default(),
            pod_infra_image: DEFAULT_POD_INFRA_IMAGE.to_string(),
            policy: ResolvePolicy::default(),
        }
    }

    pub fn with_cache(mut self, cache: AddressCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pod_infra_image(mut self, image: impl Into<String>) -> Self {
        self.pod_infra_image = image.into();
        self
    }

    pub fn cache(&self) -> &AddressCache {
        &self.cache
    }

    fn is_pod_infra(&self, image: Option<&str>) -> bool {
        image == Some(self.pod_infra_image.as_str())
    }

    /// Polls until an address is known for `id` or the attempt budget runs out.
    async fn resolve_address(&self, id: &str) -> Option<String> {
        let attempts = self.policy.max_attempts.get();
        for attempt in 1..=attempts {
            match self.lookup_address(id).await {
                Ok(Some(address)) => return Some(address),
                Ok(None) => {}
                Err(e) => error!("Failed to find IP for {}: {}", id, e),
            }
            if attempt < attempts {
                info!("Waiting to find IP for {} ({}/{})", id, attempt, attempts);
                sleep(self.policy.interval).await;
            }
        }
        None
    }

    /// A single attempt. `Ok(None)` means the inventory does not know the
    /// address yet.
    async fn lookup_address(&self, id: &str) -> Result<Option<String>, InventoryError> {
        if let Some(address) = self.cache.get(id) {
            return Ok(Some(address));
        }

        let found = self
            .inventory
            .list_containers(&ListOpts::by_external_id(id))
            .await?;
        let Some(record) = found.data.into_iter().next() else {
            return Ok(None);
        };

        let address = self.derive_address(&record).await?;
        if address.is_empty() {
            return Ok(None);
        }

        info!("Found IP {} for container {}", address, id);
        self.cache.put(id, &address);
        Ok(Some(address))
    }

    /// Host networked containers share the address of their host, everything
    /// else has its own primary address. Empty when not assigned yet.
    async fn derive_address(&self, record: &InventoryContainer) -> Result<String, InventoryError> {
        if !record.is_host_network() {
            return Ok(record.primary_ip_address.clone().unwrap_or_default());
        }

        let hosts = self.inventory.hosts(&record.resource).await?;
        let Some(host) = hosts.data.into_iter().next() else {
            return Ok(String::new());
        };
        let ips = self.inventory.ip_addresses(&host.resource).await?;
        Ok(ips
            .data
            .into_iter()
            .next()
            .and_then(|ip| ip.address)
            .unwrap_or_default())
    }
}

#[async_trait]
impl<R, I> ContainerRuntime for DecoratingRuntime<R, I>
where
    R: ContainerRuntime,
    I: Inventory,
{
    async fn ping(&self) -> Result<String> {
        self.inner.ping().await
    }

    async fn version(&self) -> Result<Version> {
        self.inner.version().await
    }

    async fn list_containers(
        &self,
        options: Option<ListContainersOptions<String>>,
    ) -> Result<Vec<ContainerSummary>> {
        self.inner.list_containers(options).await
    }

    async fn create_container(
        &self,
        options: Option<CreateContainerOptions<String>>,
        mut config: Config<String>,
    ) -> Result<ContainerCreateResponse> {
        let pod_infra = self.is_pod_infra(config.image.as_deref());
        let labels = config.labels.get_or_insert_with(HashMap::new);

        if pod_infra {
            labels.insert(NETWORK_LABEL.to_string(), "true".to_string());
            labels.insert(
                LAUNCH_CONFIG_LABEL.to_string(),
                PRIMARY_LAUNCH_CONFIG.to_string(),
            );
        }

        let name = options.as_ref().map(|o| o.name.as_str()).unwrap_or_default();
        let display = display_name(name, pod_infra);
        if !display.is_empty() {
            labels.insert(DISPLAY_NAME_LABEL.to_string(), display);
        }

        self.inner.create_container(options, config).await
    }

    async fn inspect_container(
        &self,
        id: &str,
        options: Option<InspectContainerOptions>,
    ) -> Result<ContainerInspectResponse> {
        let mut container = self.inner.inspect_container(id, options).await?;

        let running = container
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        let image = container.config.as_ref().and_then(|c| c.image.as_deref());
        if !running || !self.is_pod_infra(image) {
            return Ok(container);
        }

        let container_id = container.id.clone().unwrap_or_else(|| id.to_string());
        match self.resolve_address(&container_id).await {
            Some(address) => {
                container
                    .network_settings
                    .get_or_insert_with(Default::default)
                    .ip_address = Some(address);
                Ok(container)
            }
            None => Err(RuntimeError::AddressUnresolved {
                id: container_id,
                container: Box::new(container),
            }),
        }
    }

    async fn start_container(
        &self,
        id: &str,
        options: Option<StartContainerOptions<String>>,
    ) -> Result<()> {
        self.inner.start_container(id, options).await
    }

    async fn stop_container(&self, id: &str, options: Option<StopContainerOptions>) -> Result<()> {
        self.inner.stop_container(id, options).await
    }

    async fn remove_container(
        &self,
        id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> Result<()> {
        self.inner.remove_container(id, options).await
    }

    async fn list_images(
        &self,
        options: Option<ListImagesOptions<String>>,
    ) -> Result<Vec<ImageSummary>> {
        self.inner.list_images(options).await
    }

    async fn inspect_image(&self, name: &str) -> Result<ImageInspect> {
        self.inner.inspect_image(name).await
    }
}
