//! Test adapters implementing the provider traits
//!
//! In-memory stand-ins for the cluster and the workload orchestrator so the
//! validators can be exercised without a live cluster.

use std::collections::VecDeque;
use std::sync::Mutex;

use error_stack::Report;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::cluster_state::is_plugin_pod;
use super::cluster_state::require_filters;
use super::cluster_state::ClusterError;
use super::cluster_state::ClusterNode;
use super::cluster_state::ClusterPod;
use super::cluster_state::ClusterResult;
use super::cluster_state::ClusterStateProvider;
use super::cluster_state::PodPhase;
use super::cluster_state::CONTROL_PLANE_ROLE_LABEL;
use super::workload::WorkloadError;
use super::workload::WorkloadHandle;
use super::workload::WorkloadPhase;
use super::workload::WorkloadProvider;
use super::workload::WorkloadResult;
use super::workload::WorkloadSpec;

/// Static cluster snapshot answering every query from memory
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeCluster {
    nodes: Vec<ClusterNode>,
    pods: Vec<ClusterPod>,
    fail_queries: bool,
}

impl FakeCluster {
    pub(crate) fn with_worker(mut self, name: &str) -> Self {
        self.nodes.push(ClusterNode {
            name: name.to_string(),
            ..Default::default()
        });
        self
    }

    pub(crate) fn with_control_plane(mut self, name: &str) -> Self {
        let labels = [CONTROL_PLANE_ROLE_LABEL.to_string()];
        self.nodes.push(ClusterNode::with_labels(name, labels.iter()));
        self
    }

    pub(crate) fn with_unschedulable(mut self, name: &str) -> Self {
        self.nodes.push(ClusterNode {
            name: name.to_string(),
            unschedulable: true,
            ..Default::default()
        });
        self
    }

    pub(crate) fn with_pod(
        mut self,
        name: &str,
        namespace: &str,
        node: Option<&str>,
        phase: PodPhase,
    ) -> Self {
        self.pods.push(ClusterPod {
            name: name.to_string(),
            namespace: namespace.to_string(),
            node_name: node.map(str::to_string),
            phase,
        });
        self
    }

    pub(crate) fn with_capacity(mut self, node: &str, device: &str, quantity: &str) -> Self {
        self.node_mut(node)
            .capacity
            .insert(device.to_string(), Quantity(quantity.to_string()));
        self
    }

    pub(crate) fn with_allocatable(mut self, node: &str, device: &str, quantity: &str) -> Self {
        self.node_mut(node)
            .allocatable
            .insert(device.to_string(), Quantity(quantity.to_string()));
        self
    }

    /// Every query fails as if the API server were unreachable.
    pub(crate) fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    fn node_mut(&mut self, name: &str) -> &mut ClusterNode {
        self.nodes
            .iter_mut()
            .find(|n| n.name == name)
            .unwrap_or_else(|| panic!("node {name} must be added before its quantities"))
    }

    fn check_reachable(&self) -> ClusterResult<()> {
        if self.fail_queries {
            return Err(Report::new(ClusterError::Query {
                message: "connection refused".to_string(),
            }));
        }
        Ok(())
    }

    fn matching_pods<'a>(
        &'a self,
        prefix: &'a str,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a ClusterPod> {
        self.pods
            .iter()
            .filter(move |p| is_plugin_pod(p, prefix, namespace))
    }
}

#[async_trait::async_trait]
impl ClusterStateProvider for FakeCluster {
    async fn list_worker_nodes(&self) -> ClusterResult<Vec<ClusterNode>> {
        self.check_reachable()?;
        Ok(self.nodes.iter().filter(|n| n.is_worker()).cloned().collect())
    }

    async fn get_node(&self, name: &str) -> ClusterResult<ClusterNode> {
        self.check_reachable()?;
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .ok_or_else(|| {
                Report::new(ClusterError::NodeNotFound {
                    node: name.to_string(),
                })
            })
    }

    async fn list_pods(&self, prefix: &str, namespace: &str) -> ClusterResult<Vec<ClusterPod>> {
        require_filters(prefix, namespace)?;
        self.check_reachable()?;
        Ok(self.matching_pods(prefix, namespace).cloned().collect())
    }

    async fn get_pod_on_node(
        &self,
        node: &str,
        prefix: &str,
        namespace: &str,
    ) -> ClusterResult<ClusterPod> {
        require_filters(prefix, namespace)?;
        self.check_reachable()?;
        self.matching_pods(prefix, namespace)
            .find(|p| p.node_name.as_deref() == Some(node))
            .cloned()
            .ok_or_else(|| {
                Report::new(ClusterError::PodNotFound {
                    node: node.to_string(),
                    prefix: prefix.to_string(),
                    namespace: namespace.to_string(),
                })
            })
    }
}

#[derive(Debug, Default)]
struct FakeWorkloadState {
    /// Scripted answers to phase queries; the last successful phase repeats once drained
    phases: VecDeque<Result<WorkloadPhase, String>>,
    sticky_phase: Option<WorkloadPhase>,
    reject_create: Option<String>,
    reject_delete: Option<String>,
    /// Existence polls that still report the workload after deletion
    lingering_polls: usize,
    exists: bool,
    created: Vec<WorkloadSpec>,
    deleted: Vec<WorkloadHandle>,
    phase_queries: usize,
    /// Phase queries never complete, like a request to a stalled API server
    hang_phase_queries: bool,
}

/// Scripted workload orchestrator
#[derive(Debug, Default)]
pub(crate) struct FakeWorkloads {
    state: Mutex<FakeWorkloadState>,
}

impl FakeWorkloads {
    /// Phase queries answer from `phases` in order; `Err` entries are transport failures.
    pub(crate) fn with_phases<I>(phases: I) -> Self
    where
        I: IntoIterator<Item = Result<WorkloadPhase, &'static str>>,
    {
        let fake = Self::default();
        fake.state().phases = phases
            .into_iter()
            .map(|p| p.map_err(str::to_string))
            .collect();
        fake
    }

    pub(crate) fn rejecting_create(self, message: &str) -> Self {
        self.state().reject_create = Some(message.to_string());
        self
    }

    pub(crate) fn rejecting_delete(self, message: &str) -> Self {
        self.state().reject_delete = Some(message.to_string());
        self
    }

    pub(crate) fn lingering_after_delete(self, polls: usize) -> Self {
        self.state().lingering_polls = polls;
        self
    }

    pub(crate) fn hanging_phase_queries(self) -> Self {
        self.state().hang_phase_queries = true;
        self
    }

    pub(crate) fn created(&self) -> Vec<WorkloadSpec> {
        self.state().created.clone()
    }

    pub(crate) fn deleted(&self) -> Vec<WorkloadHandle> {
        self.state().deleted.clone()
    }

    pub(crate) fn phase_queries(&self) -> usize {
        self.state().phase_queries
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeWorkloadState> {
        self.state.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl WorkloadProvider for FakeWorkloads {
    async fn create_workload(&self, spec: &WorkloadSpec) -> WorkloadResult<WorkloadHandle> {
        let mut state = self.state();
        if let Some(message) = &state.reject_create {
            return Err(Report::new(WorkloadError::CreateRejected {
                workload: spec.handle(),
                message: message.clone(),
            }));
        }
        state.created.push(spec.clone());
        state.exists = true;
        Ok(spec.handle())
    }

    async fn get_workload_phase(&self, handle: &WorkloadHandle) -> WorkloadResult<WorkloadPhase> {
        let hang = {
            let mut state = self.state();
            state.phase_queries += 1;
            state.hang_phase_queries
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();
        match state.phases.pop_front() {
            Some(Ok(phase)) => {
                state.sticky_phase = Some(phase);
                Ok(phase)
            }
            Some(Err(message)) => Err(Report::new(WorkloadError::Query {
                workload: handle.clone(),
                message,
            })),
            None => Ok(state.sticky_phase.unwrap_or(WorkloadPhase::Unknown)),
        }
    }

    async fn delete_workload(&self, handle: &WorkloadHandle) -> WorkloadResult<()> {
        let mut state = self.state();
        if let Some(message) = &state.reject_delete {
            return Err(Report::new(WorkloadError::DeleteRejected {
                workload: handle.clone(),
                message: message.clone(),
            }));
        }
        state.deleted.push(handle.clone());
        Ok(())
    }

    async fn workload_exists(&self, _handle: &WorkloadHandle) -> WorkloadResult<bool> {
        let mut state = self.state();
        if state.deleted.is_empty() {
            return Ok(state.exists);
        }
        if state.lingering_polls > 0 {
            state.lingering_polls -= 1;
            return Ok(true);
        }
        state.exists = false;
        Ok(false)
    }
}
