//! Read-only view of the cluster as seen by the validators.
//!
//! [`ClusterStateProvider`] is the boundary the validators depend on; the
//! Kubernetes-backed implementation lives in `infrastructure::k8s`.

use core::error::Error;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use error_stack::Report;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Role label marking a legacy master node.
pub const MASTER_ROLE_LABEL: &str = "node-role.kubernetes.io/master";
/// Role label marking a control-plane node.
pub const CONTROL_PLANE_ROLE_LABEL: &str = "node-role.kubernetes.io/control-plane";

const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// Snapshot of a cluster node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterNode {
    pub name: String,
    /// Role label keys present on the node, e.g. `node-role.kubernetes.io/worker`
    pub role_labels: BTreeSet<String>,
    pub unschedulable: bool,
    pub capacity: BTreeMap<String, Quantity>,
    pub allocatable: BTreeMap<String, Quantity>,
}

impl ClusterNode {
    /// Builds a node view from the full label map, keeping only role labels.
    pub fn with_labels<'a>(
        name: impl Into<String>,
        labels: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        Self {
            name: name.into(),
            role_labels: labels
                .into_iter()
                .filter(|key| key.starts_with(ROLE_LABEL_PREFIX))
                .cloned()
                .collect(),
            ..Default::default()
        }
    }

    /// A worker carries neither master nor control-plane role and accepts pods.
    pub fn is_worker(&self) -> bool {
        !self.role_labels.contains(MASTER_ROLE_LABEL)
            && !self.role_labels.contains(CONTROL_PLANE_ROLE_LABEL)
            && !self.unschedulable
    }
}

/// Pod lifecycle phase as reported by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PodPhase {
    #[display("Pending")]
    Pending,
    #[display("Running")]
    Running,
    #[display("Succeeded")]
    Succeeded,
    #[display("Failed")]
    Failed,
    #[display("Unknown")]
    Unknown,
}

impl PodPhase {
    /// Unrecognised or missing phases map to [`PodPhase::Unknown`].
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// Snapshot of a pod.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPod {
    pub name: String,
    pub namespace: String,
    /// Node the pod is bound to; `None` while unscheduled
    pub node_name: Option<String>,
    pub phase: PodPhase,
}

/// Errors raised by [`ClusterStateProvider`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ClusterError {
    #[display("Cluster query failed: {message}")]
    Query { message: String },
    #[display("Invalid argument: {message}")]
    InvalidArgument { message: String },
    #[display("Node not found: {node}")]
    NodeNotFound { node: String },
    #[display("Device {device} is not advertised in {map} of node {node}")]
    DeviceNotAdvertised {
        node: String,
        device: String,
        map: &'static str,
    },
    #[display("No pod with prefix {prefix} on node {node} in namespace {namespace}")]
    PodNotFound {
        node: String,
        prefix: String,
        namespace: String,
    },
}

impl Error for ClusterError {}

pub type ClusterResult<T> = Result<T, Report<ClusterError>>;

/// Read-only queries against the cluster under test.
///
/// Every call re-reads the cluster; implementations must not cache between calls.
#[async_trait::async_trait]
pub trait ClusterStateProvider: Send + Sync {
    /// List nodes eligible to host the device plugin, in the API server's order.
    async fn list_worker_nodes(&self) -> ClusterResult<Vec<ClusterNode>>;

    /// # Errors
    ///
    /// - [`ClusterError::NodeNotFound`] if no node has this exact name
    async fn get_node(&self, name: &str) -> ClusterResult<ClusterNode>;

    /// List pods in `namespace` whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::InvalidArgument`] if either filter is empty
    async fn list_pods(&self, prefix: &str, namespace: &str) -> ClusterResult<Vec<ClusterPod>>;

    /// Find the pod matching `prefix` in `namespace` that is bound to `node`.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::InvalidArgument`] if any argument is empty
    /// - [`ClusterError::PodNotFound`] if no matching pod runs on the node
    async fn get_pod_on_node(
        &self,
        node: &str,
        prefix: &str,
        namespace: &str,
    ) -> ClusterResult<ClusterPod>;

    /// Advertised capacity of `device` on `node`.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::NodeNotFound`] if the node is absent
    /// - [`ClusterError::DeviceNotAdvertised`] if the capacity map lacks the key
    async fn get_device_capacity(&self, node: &str, device: &str) -> ClusterResult<Quantity> {
        let cluster_node = self.get_node(node).await?;
        lookup_quantity(&cluster_node, device, QuantityMap::Capacity)
    }

    /// Allocatable quantity of `device` on `node`.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::NodeNotFound`] if the node is absent
    /// - [`ClusterError::DeviceNotAdvertised`] if the allocatable map lacks the key
    async fn get_allocatable_device_quantity(
        &self,
        node: &str,
        device: &str,
    ) -> ClusterResult<Quantity> {
        let cluster_node = self.get_node(node).await?;
        lookup_quantity(&cluster_node, device, QuantityMap::Allocatable)
    }

    /// Project pods onto a name → phase map.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::InvalidArgument`] if `pods` is `None`
    fn pod_phase_map(
        &self,
        pods: Option<&[ClusterPod]>,
    ) -> ClusterResult<BTreeMap<String, PodPhase>> {
        pod_phase_map(pods)
    }
}

/// Which quantity map of a node to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuantityMap {
    Capacity,
    Allocatable,
}

impl QuantityMap {
    const fn label(self) -> &'static str {
        match self {
            QuantityMap::Capacity => "capacity",
            QuantityMap::Allocatable => "allocatable",
        }
    }
}

pub(crate) fn lookup_quantity(
    node: &ClusterNode,
    device: &str,
    map: QuantityMap,
) -> ClusterResult<Quantity> {
    let quantities = match map {
        QuantityMap::Capacity => &node.capacity,
        QuantityMap::Allocatable => &node.allocatable,
    };
    quantities.get(device).cloned().ok_or_else(|| {
        Report::new(ClusterError::DeviceNotAdvertised {
            node: node.name.clone(),
            device: device.to_string(),
            map: map.label(),
        })
    })
}

/// A missing list is a caller bug; an empty list is a valid, empty answer.
pub fn pod_phase_map(pods: Option<&[ClusterPod]>) -> ClusterResult<BTreeMap<String, PodPhase>> {
    let pods = pods.ok_or_else(|| {
        Report::new(ClusterError::InvalidArgument {
            message: "pod list is missing".to_string(),
        })
    })?;

    Ok(pods.iter().map(|pod| (pod.name.clone(), pod.phase)).collect())
}

/// Rejects empty name prefix / namespace filters so no query ever scans the whole cluster.
pub(crate) fn require_filters(prefix: &str, namespace: &str) -> ClusterResult<()> {
    if prefix.is_empty() || namespace.is_empty() {
        return Err(Report::new(ClusterError::InvalidArgument {
            message: format!(
                "pod name prefix and namespace are both required (prefix: {prefix:?}, namespace: {namespace:?})"
            ),
        }));
    }
    Ok(())
}

/// Whether `pod` belongs to the plugin identified by a name prefix and namespace
pub(crate) fn is_plugin_pod(pod: &ClusterPod, prefix: &str, namespace: &str) -> bool {
    pod.namespace == namespace && pod.name.starts_with(prefix)
}
