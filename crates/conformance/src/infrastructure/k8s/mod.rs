//! Kubernetes-backed implementations of the provider traits.
//!
//! - [`KubeClusterState`]: node and pod queries against the core API
//! - [`KubeVirtWorkloads`]: `VirtualMachine` lifecycle through the KubeVirt API

use core::error::Error;

pub mod cluster_state;
pub mod kubevirt;

pub use cluster_state::KubeClusterState;
pub use kubevirt::KubeVirtWorkloads;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
}

impl Error for KubernetesError {}
