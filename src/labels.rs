//! Identity labels written onto created containers.
//!
//! The key strings are read by the orchestration side and must not change.

/// Marks a container whose network is managed by the inventory service.
pub const NETWORK_LABEL: &str = "io.rancher.container.network";
/// Marks the launch configuration role of a container within its service.
pub const LAUNCH_CONFIG_LABEL: &str = "io.rancher.service.launch.config";
/// Value of [`LAUNCH_CONFIG_LABEL`] for the primary container of a service.
pub const PRIMARY_LAUNCH_CONFIG: &str = "io.rancher.service.primary.launch.config";
/// Human readable name shown by the orchestration UI.
pub const DISPLAY_NAME_LABEL: &str = "io.rancher.container.display_name";

/// Derives a display name from a kubelet style container name.
///
/// Names look like `k8s_<container>.<hash>_<pod>_<rest>`. Pod infrastructure
/// containers are named after their pod, everything else after the container
/// part of the second segment. Names with fewer than four segments yield an
/// empty string.
pub fn display_name(full_name: &str, pod_infra: bool) -> String {
    let parts: Vec<&str> = full_name.splitn(4, '_').collect();
    if parts.len() != 4 {
        return String::new();
    }

    if pod_infra {
        parts[2].to_string()
    } else {
        parts[1].split('.').next().unwrap_or_default().to_string()
    }
}
