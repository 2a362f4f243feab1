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
use thiserror::Error;

pub mod docker;
pub use docker::DockerRuntime;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),

    /// The inventory never reported an address for a running pod
    /// infrastructure container. The inspection result is kept, without an
    /// address injected, so callers can still use it.
    #[error("failed to find IP for {id}")]
    AddressUnresolved {
        id: String,
        container: Box<ContainerInspectResponse>,
    },
}

impl RuntimeError {
    /// The inspection data attached to an [`RuntimeError::AddressUnresolved`].
    pub fn container(&self) -> Option<&ContainerInspectResponse> {
        match self {
            RuntimeError::AddressUnresolved { container, .. } => Some(container.as_ref()),
            RuntimeError::Docker(_) => None,
        }
    }
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// The container runtime operations the kubelet side relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<String>;

    async fn version(&self) -> Result<Version>;

    async fn list_containers(
        &self,
        options: Option<ListContainersOptions<String>>,
    ) -> Result<Vec<ContainerSummary>>;

    async fn create_container(
        &self,
        options: Option<CreateContainerOptions<String>>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse>;

    async fn inspect_container(
        &self,
        id: &str,
        options: Option<InspectContainerOptions>,
    ) -> Result<ContainerInspectResponse>;

    async fn start_container(
        &self,
        id: &str,
        options: Option<StartContainerOptions<String>>,
    ) -> Result<()>;

    async fn stop_container(&self, id: &str, options: Option<StopContainerOptions>) -> Result<()>;

    async fn remove_container(
        &self,
        id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> Result<()>;

    async fn list_images(
        &self,
        options: Option<ListImagesOptions<String>>,
    ) -> Result<Vec<ImageSummary>>;

    async fn inspect_image(&self, name: &str) -> Result<ImageInspect>;
}
