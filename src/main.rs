//! podnet daemon entry point.

use std::sync::Arc;

use log::{error, info};
use tokio::signal;

use podnet::runtime::ContainerRuntime;
use podnet::{watch, AddressCache, CattleClient, Config, DecoratingRuntime, DockerRuntime};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting podnet with config: {:?}", cfg);

    let docker = DockerRuntime::connect(cfg.docker_host.as_deref())?;
    let version = docker.ping().await?;
    info!("Docker daemon responded: {}", version);

    let inventory = CattleClient::new(
        &cfg.inventory.url,
        cfg.inventory.access_key.clone(),
        cfg.inventory.secret_key.clone(),
    )?;

    let events = docker.docker().clone();
    let runtime = Arc::new(
        DecoratingRuntime::new(docker, inventory)
            .with_cache(AddressCache::new(cfg.cache_capacity))
            .with_policy(cfg.resolve_policy())
            .with_pod_infra_image(cfg.pod_infra_image.clone()),
    );

    let watch_handle = tokio::spawn(watch::watch(events, runtime));

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    watch_handle.abort();

    info!("Shutdown complete.");
    Ok(())
}
