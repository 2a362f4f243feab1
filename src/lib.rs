//! Docker runtime decorator for Rancher managed Kubernetes nodes.
//!
//! [`DecoratingRuntime`] wraps any [`ContainerRuntime`]. Containers it
//! creates are labelled for the orchestration side. Inspecting a running pod
//! infrastructure container reports the address the inventory assigned to
//! it, resolved with a bounded polling loop and cached in memory.

pub mod cache;
pub mod config;
pub mod decorator;
pub mod inventory;
pub mod labels;
pub mod runtime;
pub mod watch;

pub use cache::AddressCache;
pub use config::Config;
pub use decorator::{DecoratingRuntime, ResolvePolicy};
pub use inventory::{CattleClient, Inventory, InventoryError};
pub use runtime::{ContainerRuntime, DockerRuntime, RuntimeError};
