//! Feeds containers started on this node through the decorated runtime so
//! pod infrastructure containers get their address resolved and cached as
//! soon as they come up.

use std::sync::Arc;
use std::time::Duration;

use bollard::container::ListContainersOptions;
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::runtime::{ContainerRuntime, RuntimeError};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Inspects `id` through `runtime` and logs the outcome. Returns the
/// address reported in the network settings, if any.
pub async fn inspect_started<T>(runtime: &T, id: &str) -> Option<String>
where
    T: ContainerRuntime + ?Sized,
{
    match runtime.inspect_container(id, None).await {
        Ok(detail) => {
            let ip = detail
                .network_settings
                .and_then(|n| n.ip_address)
                .filter(|ip| !ip.is_empty());
            match &ip {
                Some(ip) => info!("Container {} -> {}", id, ip),
                None => debug!("Container {} has no address", id),
            }
            ip
        }
        Err(e) => {
            match unresolved_name(&e) {
                Some(name) => warn!("{} ({}), leaving it without an address", e, name),
                None => warn!("Failed to inspect started container {}: {}", id, e),
            }
            None
        }
    }
}

/// Name of the container whose address could not be resolved, taken from
/// the inspection data the error carries.
fn unresolved_name(err: &RuntimeError) -> Option<&str> {
    let detail = err.container()?;
    let name = detail.name.as_deref().or(detail.id.as_deref())?;
    Some(name.trim_start_matches('/'))
}

fn spawn_inspect<T>(runtime: &Arc<T>, id: String)
where
    T: ContainerRuntime + 'static,
{
    let runtime = Arc::clone(runtime);
    tokio::spawn(async move {
        inspect_started(runtime.as_ref(), &id).await;
    });
}

/// Runs until the task is aborted: inspects every running container once,
/// then every container reported by a `start` event.
pub async fn watch<T>(docker: Docker, runtime: Arc<T>)
where
    T: ContainerRuntime + 'static,
{
    loop {
        let running = runtime
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await;
        match running {
            Ok(containers) => {
                info!("Initial scan found {} containers", containers.len());
                for id in containers.into_iter().filter_map(|c| c.id) {
                    spawn_inspect(&runtime, id);
                }
            }
            Err(e) => {
                error!("Failed initial scan: {}. Retrying...", e);
                sleep(RECONNECT_DELAY).await;
                continue;
            }
        }

        let opts = EventsOptions::<String> {
            filters: [("type", ["container"]), ("event", ["start"])]
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            ..Default::default()
        };
        let mut stream = docker.events(Some(opts));

        info!("Listening for Docker events...");
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(event) => {
                    let Some(id) = event.actor.and_then(|a| a.id).filter(|id| !id.is_empty())
                    else {
                        continue;
                    };
                    debug!("Container started: {}", id);
                    spawn_inspect(&runtime, id);
                }
                Err(e) => {
                    error!("Error in Docker event stream: {}", e);
                    break;
                }
            }
        }

        warn!(
            "Docker event stream ended. Reconnecting in {}s...",
            RECONNECT_DELAY.as_secs()
        );
        sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockContainerRuntime;
    use bollard::models::{ContainerInspectResponse, NetworkSettings};

    #[test]
    fn unresolved_error_names_the_container() {
        let err = RuntimeError::AddressUnresolved {
            id: "abc".into(),
            container: Box::new(ContainerInspectResponse {
                id: Some("abc".into()),
                name: Some("/k8s_POD.1a2b_web-0_default_uid".into()),
                ..Default::default()
            }),
        };
        assert_eq!(unresolved_name(&err), Some("k8s_POD.1a2b_web-0_default_uid"));

        let unnamed = RuntimeError::AddressUnresolved {
            id: "abc".into(),
            container: Box::new(ContainerInspectResponse {
                id: Some("abc".into()),
                ..Default::default()
            }),
        };
        assert_eq!(unresolved_name(&unnamed), Some("abc"));

        let docker = RuntimeError::Docker(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container".into(),
        });
        assert_eq!(unresolved_name(&docker), None);
    }

    #[tokio::test]
    async fn reports_injected_address() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_inspect_container().returning(|_, _| {
            Ok(ContainerInspectResponse {
                network_settings: Some(NetworkSettings {
                    ip_address: Some("10.42.1.2".into()),
                    ..Default::default()
                }),
                ..Default::default()
            })
        });

        assert_eq!(
            inspect_started(&runtime, "abc").await.as_deref(),
            Some("10.42.1.2")
        );
    }

    #[tokio::test]
    async fn failures_yield_no_address() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_inspect_container().returning(|id, _| {
            Err(RuntimeError::AddressUnresolved {
                id: id.to_string(),
                container: Box::default(),
            })
        });
        assert_eq!(inspect_started(&runtime, "abc").await, None);

        let mut runtime = MockContainerRuntime::new();
        runtime.expect_inspect_container().returning(|_, _| {
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "daemon down".into(),
            }
            .into())
        });
        assert_eq!(inspect_started(&runtime, "abc").await, None);

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_inspect_container()
            .returning(|_, _| Ok(ContainerInspectResponse::default()));
        assert_eq!(inspect_started(&runtime, "abc").await, None);
    }
}
