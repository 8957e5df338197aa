use std::collections::BTreeMap;
use std::collections::HashSet;

use error_stack::ResultExt;
use tracing::info;
use tracing::warn;

use super::CheckKind;
use super::CheckReport;
use super::Finding;
use crate::domain::cluster_state::ClusterError;
use crate::domain::cluster_state::ClusterNode;
use crate::domain::cluster_state::ClusterPod;
use crate::domain::cluster_state::ClusterResult;
use crate::domain::cluster_state::ClusterStateProvider;
use crate::domain::cluster_state::PodPhase;
use crate::domain::expected_state::PluginIdentity;

/// How plugin placement across worker nodes is verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PlacementMode {
    /// Compare the number of worker nodes with the number of plugin pods
    #[default]
    Cardinality,
    /// Require a plugin pod on every worker node and flag colocated pods
    PerNode,
}

/// Asserts the device plugin runs once per worker node and every instance is healthy.
pub struct DeploymentValidator<'a, C: ?Sized> {
    cluster: &'a C,
    identity: &'a PluginIdentity,
    mode: PlacementMode,
}

impl<'a, C> DeploymentValidator<'a, C>
where
    C: ClusterStateProvider + ?Sized,
{
    pub fn new(cluster: &'a C, identity: &'a PluginIdentity, mode: PlacementMode) -> Self {
        Self {
            cluster,
            identity,
            mode,
        }
    }

    /// Runs placement and health checks and aggregates every finding.
    ///
    /// An empty plugin pod list is always a finding. Placement and health are
    /// still evaluated so the report shows the full picture.
    ///
    /// # Errors
    ///
    /// - [`ClusterError::InvalidArgument`] if the plugin identity has an empty field
    /// - any provider error other than a per-node [`ClusterError::PodNotFound`]
    #[tracing::instrument(skip(self), fields(
        prefix = %self.identity.name_prefix,
        namespace = %self.identity.namespace,
        mode = ?self.mode,
    ))]
    pub async fn validate(&self) -> ClusterResult<CheckReport> {
        let pods = self
            .cluster
            .list_pods(&self.identity.name_prefix, &self.identity.namespace)
            .await
            .attach_printable("while listing device plugin pods")?;
        info!(pods = pods.len(), "found device plugin pods");

        let mut findings = Vec::new();
        if pods.is_empty() {
            findings.push(Finding::NoPluginPods {
                prefix: self.identity.name_prefix.clone(),
                namespace: self.identity.namespace.clone(),
            });
        }

        findings.extend(self.check_placement(&pods).await?);
        findings.extend(self.check_health(&pods)?);

        for finding in &findings {
            warn!("{finding}");
        }
        Ok(CheckReport::from_findings(CheckKind::Deployment, findings))
    }

    async fn check_placement(&self, pods: &[ClusterPod]) -> ClusterResult<Vec<Finding>> {
        let workers = self
            .cluster
            .list_worker_nodes()
            .await
            .attach_printable("while listing worker nodes")?;
        info!(workers = workers.len(), "found worker nodes");

        match self.mode {
            PlacementMode::Cardinality => Ok(check_cardinality(&workers, pods)),
            PlacementMode::PerNode => {
                let mut findings = Vec::new();
                for worker in &workers {
                    if let Some(finding) = self.check_node(&worker.name).await? {
                        findings.push(finding);
                    }
                }
                findings.extend(find_colocated(&workers, pods));
                Ok(findings)
            }
        }
    }

    async fn check_node(&self, node: &str) -> ClusterResult<Option<Finding>> {
        match self
            .cluster
            .get_pod_on_node(node, &self.identity.name_prefix, &self.identity.namespace)
            .await
        {
            Ok(pod) => {
                info!(node, pod = %pod.name, "device plugin pod present on node");
                Ok(None)
            }
            Err(report) if matches!(report.current_context(), ClusterError::PodNotFound { .. }) => {
                Ok(Some(Finding::MissingOnNode {
                    node: node.to_string(),
                }))
            }
            Err(report) => Err(report.attach_printable(format!("node: {node}"))),
        }
    }

    fn check_health(&self, pods: &[ClusterPod]) -> ClusterResult<Vec<Finding>> {
        let phases = self.cluster.pod_phase_map(Some(pods))?;
        Ok(phases
            .into_iter()
            .filter(|(_, phase)| *phase != PodPhase::Running)
            .map(|(pod, phase)| Finding::PodNotRunning { pod, phase })
            .collect())
    }
}

fn check_cardinality(workers: &[ClusterNode], pods: &[ClusterPod]) -> Vec<Finding> {
    if workers.len() == pods.len() {
        Vec::new()
    } else {
        vec![Finding::PodCountMismatch {
            workers: workers.len(),
            pods: pods.len(),
        }]
    }
}

/// Worker nodes hosting more than one plugin pod, in node-name order.
fn find_colocated(workers: &[ClusterNode], pods: &[ClusterPod]) -> Vec<Finding> {
    let worker_names: HashSet<&str> = workers.iter().map(|w| w.name.as_str()).collect();

    let mut by_node: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for pod in pods {
        if let Some(node) = pod.node_name.as_deref().filter(|n| worker_names.contains(n)) {
            by_node.entry(node).or_default().push(pod.name.clone());
        }
    }

    by_node
        .into_iter()
        .filter(|(_, pods)| pods.len() > 1)
        .map(|(node, mut pods)| {
            pods.sort();
            Finding::ColocatedPods {
                node: node.to_string(),
                pods,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::domain::mock::FakeCluster;

    fn identity() -> PluginIdentity {
        PluginIdentity {
            name_prefix: "nvidia-kubevirt-gpu-dp".to_string(),
            namespace: "kube-system".to_string(),
        }
    }

    fn healthy_cluster(workers: usize) -> FakeCluster {
        let mut cluster = FakeCluster::default().with_control_plane("cp-1");
        for i in 1..=workers {
            let node = format!("worker-{i}");
            cluster = cluster.with_worker(&node).with_pod(
                &format!("nvidia-kubevirt-gpu-dp-{i}"),
                "kube-system",
                Some(&node),
                PodPhase::Running,
            );
        }
        cluster
    }

    #[test(tokio::test)]
    async fn one_running_pod_per_worker_passes_in_both_modes() {
        let cluster = healthy_cluster(3);
        let identity = identity();

        for mode in [PlacementMode::Cardinality, PlacementMode::PerNode] {
            let report = DeploymentValidator::new(&cluster, &identity, mode)
                .validate()
                .await
                .expect("validation should complete");
            assert!(report.is_passed(), "{mode:?}: {report:?}");
        }
    }

    #[test(tokio::test)]
    async fn cardinality_mismatch_reports_both_counts() {
        let cluster = healthy_cluster(2).with_worker("worker-3");
        let identity = identity();

        let report = DeploymentValidator::new(&cluster, &identity, PlacementMode::Cardinality)
            .validate()
            .await
            .expect("validation should complete");

        assert_eq!(
            report.findings(),
            &[Finding::PodCountMismatch {
                workers: 3,
                pods: 2
            }]
        );
        assert!(report.findings()[0].to_string().ends_with("3 != 2"));
    }

    #[test(tokio::test)]
    async fn per_node_detects_colocation_that_cardinality_misses() {
        // Two pods on worker-1, none on worker-2: counts match.
        let cluster = FakeCluster::default()
            .with_worker("worker-1")
            .with_worker("worker-2")
            .with_pod(
                "nvidia-kubevirt-gpu-dp-a",
                "kube-system",
                Some("worker-1"),
                PodPhase::Running,
            )
            .with_pod(
                "nvidia-kubevirt-gpu-dp-b",
                "kube-system",
                Some("worker-1"),
                PodPhase::Running,
            );
        let identity = identity();

        let cardinality = DeploymentValidator::new(&cluster, &identity, PlacementMode::Cardinality)
            .validate()
            .await
            .expect("validation should complete");
        assert!(cardinality.is_passed());

        let per_node = DeploymentValidator::new(&cluster, &identity, PlacementMode::PerNode)
            .validate()
            .await
            .expect("validation should complete");
        assert_eq!(
            per_node.findings(),
            &[
                Finding::MissingOnNode {
                    node: "worker-2".to_string()
                },
                Finding::ColocatedPods {
                    node: "worker-1".to_string(),
                    pods: vec![
                        "nvidia-kubevirt-gpu-dp-a".to_string(),
                        "nvidia-kubevirt-gpu-dp-b".to_string()
                    ],
                },
            ]
        );
    }

    #[test(tokio::test)]
    async fn health_names_exactly_the_non_running_pods() {
        let cluster = healthy_cluster(3).with_worker("worker-4").with_pod(
            "nvidia-kubevirt-gpu-dp-4",
            "kube-system",
            Some("worker-4"),
            PodPhase::Pending,
        );
        let identity = identity();

        let report = DeploymentValidator::new(&cluster, &identity, PlacementMode::Cardinality)
            .validate()
            .await
            .expect("validation should complete");

        assert_eq!(
            report.findings(),
            &[Finding::PodNotRunning {
                pod: "nvidia-kubevirt-gpu-dp-4".to_string(),
                phase: PodPhase::Pending,
            }]
        );
    }

    #[test(tokio::test)]
    async fn all_unhealthy_pods_are_reported_together() {
        let cluster = FakeCluster::default()
            .with_worker("worker-1")
            .with_worker("worker-2")
            .with_pod(
                "nvidia-kubevirt-gpu-dp-1",
                "kube-system",
                Some("worker-1"),
                PodPhase::Failed,
            )
            .with_pod(
                "nvidia-kubevirt-gpu-dp-2",
                "kube-system",
                Some("worker-2"),
                PodPhase::Unknown,
            );
        let identity = identity();

        let report = DeploymentValidator::new(&cluster, &identity, PlacementMode::PerNode)
            .validate()
            .await
            .expect("validation should complete");

        assert_eq!(report.findings().len(), 2);
    }

    #[test(tokio::test)]
    async fn empty_pod_list_always_fails() {
        let cluster = FakeCluster::default();
        let identity = identity();

        let report = DeploymentValidator::new(&cluster, &identity, PlacementMode::Cardinality)
            .validate()
            .await
            .expect("validation should complete");

        assert_eq!(
            report.findings(),
            &[Finding::NoPluginPods {
                prefix: "nvidia-kubevirt-gpu-dp".to_string(),
                namespace: "kube-system".to_string(),
            }]
        );
    }

    #[test(tokio::test)]
    async fn empty_pod_list_is_aggregated_with_placement() {
        let cluster = FakeCluster::default().with_worker("worker-1");
        let identity = identity();

        let report = DeploymentValidator::new(&cluster, &identity, PlacementMode::PerNode)
            .validate()
            .await
            .expect("validation should complete");

        assert_eq!(
            report.findings(),
            &[
                Finding::NoPluginPods {
                    prefix: "nvidia-kubevirt-gpu-dp".to_string(),
                    namespace: "kube-system".to_string(),
                },
                Finding::MissingOnNode {
                    node: "worker-1".to_string()
                },
            ]
        );
    }

    #[test(tokio::test)]
    async fn pods_outside_namespace_or_prefix_are_ignored() {
        let cluster = healthy_cluster(1)
            .with_pod("nvidia-kubevirt-gpu-dp-x", "default", Some("worker-1"), PodPhase::Pending)
            .with_pod("other-daemon", "kube-system", Some("worker-1"), PodPhase::Pending);
        let identity = identity();

        let report = DeploymentValidator::new(&cluster, &identity, PlacementMode::PerNode)
            .validate()
            .await
            .expect("validation should complete");

        assert!(report.is_passed(), "{report:?}");
    }

    #[test(tokio::test)]
    async fn empty_identity_is_invalid_argument() {
        let cluster = healthy_cluster(1);
        let identity = PluginIdentity {
            name_prefix: String::new(),
            namespace: "kube-system".to_string(),
        };

        let err = DeploymentValidator::new(&cluster, &identity, PlacementMode::Cardinality)
            .validate()
            .await
            .expect_err("empty prefix must be rejected");

        assert!(matches!(
            err.current_context(),
            ClusterError::InvalidArgument { .. }
        ));
    }

    #[test(tokio::test)]
    async fn transport_errors_propagate() {
        let cluster = healthy_cluster(1).failing_queries();
        let identity = identity();

        let err = DeploymentValidator::new(&cluster, &identity, PlacementMode::Cardinality)
            .validate()
            .await
            .expect_err("query failure must surface");

        assert!(matches!(err.current_context(), ClusterError::Query { .. }));
    }

    #[test(tokio::test)]
    async fn repeated_runs_are_identical() {
        let cluster = healthy_cluster(2).with_worker("worker-3");
        let identity = identity();
        let validator = DeploymentValidator::new(&cluster, &identity, PlacementMode::PerNode);

        let first = validator.validate().await.expect("first run");
        let second = validator.validate().await.expect("second run");

        assert_eq!(first, second);
    }

    #[test(tokio::test)]
    async fn cordoned_nodes_are_not_counted_as_workers() {
        let cluster = healthy_cluster(2).with_unschedulable("worker-3");
        let identity = identity();

        for mode in [PlacementMode::Cardinality, PlacementMode::PerNode] {
            let report = DeploymentValidator::new(&cluster, &identity, mode)
                .validate()
                .await
                .expect("validation should complete");
            assert!(report.is_passed(), "{mode:?}: {report:?}");
        }
    }
}
