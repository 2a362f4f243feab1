use super::{ContainerRuntime, Result};
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
use bollard::{Docker, API_DEFAULT_VERSION};
use log::{debug, info};

/// Timeout, in seconds, for requests to the Docker daemon.
const DOCKER_TIMEOUT_SECS: u64 = 120;

/// [`ContainerRuntime`] backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connects to `host` when given, otherwise to the local daemon using
    /// default settings (unix socket on Linux, `DOCKER_HOST` if set).
    pub fn connect(host: Option<&str>) -> Result<Self> {
        let docker = match host {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            Some(host) => {
                Docker::connect_with_http(host, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            None => Docker::connect_with_local_defaults()?,
        };
        info!("Using Docker daemon at {}", host.unwrap_or("local defaults"));
        Ok(Self::new(docker))
    }

    /// The underlying client, for calls outside the [`ContainerRuntime`] set
    /// such as the event stream.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<String> {
        Ok(self.docker.ping().await?)
    }

    async fn version(&self) -> Result<Version> {
        Ok(self.docker.version().await?)
    }

    async fn list_containers(
        &self,
        options: Option<ListContainersOptions<String>>,
    ) -> Result<Vec<ContainerSummary>> {
        Ok(self.docker.list_containers(options).await?)
    }

    async fn create_container(
        &self,
        options: Option<CreateContainerOptions<String>>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse> {
        debug!(
            "Creating container {:?} from image {:?}",
            options.as_ref().map(|o| o.name.as_str()),
            config.image
        );
        Ok(self.docker.create_container(options, config).await?)
    }

    async fn inspect_container(
        &self,
        id: &str,
        options: Option<InspectContainerOptions>,
    ) -> Result<ContainerInspectResponse> {
        Ok(self.docker.inspect_container(id, options).await?)
    }

    async fn start_container(
        &self,
        id: &str,
        options: Option<StartContainerOptions<String>>,
    ) -> Result<()> {
        Ok(self.docker.start_container(id, options).await?)
    }

    async fn stop_container(&self, id: &str, options: Option<StopContainerOptions>) -> Result<()> {
        Ok(self.docker.stop_container(id, options).await?)
    }

    async fn remove_container(
        &self,
        id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> Result<()> {
        Ok(self.docker.remove_container(id, options).await?)
    }

    async fn list_images(
        &self,
        options: Option<ListImagesOptions<String>>,
    ) -> Result<Vec<ImageSummary>> {
        Ok(self.docker.list_images(options).await?)
    }

    async fn inspect_image(&self, name: &str) -> Result<ImageInspect> {
        Ok(self.docker.inspect_image(name).await?)
    }
}
