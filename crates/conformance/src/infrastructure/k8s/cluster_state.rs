use error_stack::Report;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use kube::Client;
use tracing::debug;

use crate::domain::cluster_state::is_plugin_pod;
use crate::domain::cluster_state::require_filters;
use crate::domain::cluster_state::ClusterError;
use crate::domain::cluster_state::ClusterNode;
use crate::domain::cluster_state::ClusterPod;
use crate::domain::cluster_state::ClusterResult;
use crate::domain::cluster_state::ClusterStateProvider;
use crate::domain::cluster_state::PodPhase;

/// Reads nodes and pods straight from the API server on every call.
#[derive(Clone)]
pub struct KubeClusterState {
    client: Client,
}

impl KubeClusterState {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn list_namespaced_pods(
        &self,
        namespace: &str,
        params: &ListParams,
    ) -> ClusterResult<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(params)
            .await
            .map_err(|e| query_failed(format!("list pods in {namespace}"), e))?;
        Ok(pods.items)
    }
}

#[async_trait::async_trait]
impl ClusterStateProvider for KubeClusterState {
    async fn list_worker_nodes(&self) -> ClusterResult<Vec<ClusterNode>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|e| query_failed("list nodes".to_string(), e))?;

        let workers: Vec<ClusterNode> = nodes
            .items
            .into_iter()
            .map(node_from_k8s)
            .filter(ClusterNode::is_worker)
            .collect();
        debug!(workers = workers.len(), "listed worker nodes");
        Ok(workers)
    }

    async fn get_node(&self, name: &str) -> ClusterResult<ClusterNode> {
        let api: Api<Node> = Api::all(self.client.clone());
        let node = api
            .get_opt(name)
            .await
            .map_err(|e| query_failed(format!("get node {name}"), e))?;

        node.map(node_from_k8s).ok_or_else(|| {
            Report::new(ClusterError::NodeNotFound {
                node: name.to_string(),
            })
        })
    }

    async fn list_pods(&self, prefix: &str, namespace: &str) -> ClusterResult<Vec<ClusterPod>> {
        require_filters(prefix, namespace)?;

        let pods = self
            .list_namespaced_pods(namespace, &ListParams::default())
            .await?;
        Ok(plugin_pods(pods, prefix, namespace).collect())
    }

    async fn get_pod_on_node(
        &self,
        node: &str,
        prefix: &str,
        namespace: &str,
    ) -> ClusterResult<ClusterPod> {
        require_filters(prefix, namespace)?;
        if node.is_empty() {
            return Err(Report::new(ClusterError::InvalidArgument {
                message: "node name must not be empty".to_string(),
            }));
        }

        let params = ListParams::default().fields(&format!("spec.nodeName={node}"));
        let pods = self.list_namespaced_pods(namespace, &params).await?;
        plugin_pods(pods, prefix, namespace)
            .next()
            .ok_or_else(|| {
                Report::new(ClusterError::PodNotFound {
                    node: node.to_string(),
                    prefix: prefix.to_string(),
                    namespace: namespace.to_string(),
                })
            })
    }
}

fn query_failed(action: String, e: kube::Error) -> Report<ClusterError> {
    Report::new(ClusterError::Query { message: action })
        .attach_printable(format!("Kubernetes API error: {e}"))
}

pub(crate) fn node_from_k8s(node: Node) -> ClusterNode {
    let name = node.metadata.name.unwrap_or_default();
    let labels = node.metadata.labels.unwrap_or_default();

    let mut cluster_node = ClusterNode::with_labels(name, labels.keys());
    cluster_node.unschedulable = node
        .spec
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false);
    if let Some(status) = node.status {
        cluster_node.capacity = status.capacity.unwrap_or_default();
        cluster_node.allocatable = status.allocatable.unwrap_or_default();
    }
    cluster_node
}

/// Converts listed pods and keeps those belonging to the plugin
pub(crate) fn plugin_pods<'a>(
    pods: Vec<Pod>,
    prefix: &'a str,
    namespace: &'a str,
) -> impl Iterator<Item = ClusterPod> + 'a {
    pods.into_iter()
        .map(pod_from_k8s)
        .filter(move |pod| is_plugin_pod(pod, prefix, namespace))
}

pub(crate) fn pod_from_k8s(pod: Pod) -> ClusterPod {
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref());

    ClusterPod {
        phase: PodPhase::parse(phase),
        name: pod.metadata.name.unwrap_or_default(),
        namespace: pod.metadata.namespace.unwrap_or_default(),
        node_name: pod.spec.and_then(|spec| spec.node_name),
    }
}
