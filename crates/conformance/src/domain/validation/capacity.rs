use tracing::debug;
use tracing::info;
use tracing::warn;

use super::CheckKind;
use super::CheckReport;
use super::Finding;
use crate::domain::cluster_state::ClusterError;
use crate::domain::cluster_state::ClusterResult;
use crate::domain::cluster_state::ClusterStateProvider;
use crate::domain::expected_state::DeviceExpectation;
use crate::domain::expected_state::NodeExpectation;

/// Which node quantity map the expectations are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum QuantitySource {
    /// Total advertised devices (`status.capacity`)
    #[default]
    Capacity,
    /// Devices schedulable workloads may consume (`status.allocatable`)
    Allocatable,
}

/// Compares expected per-node device quantities with what the cluster reports.
pub struct CapacityValidator<'a, C: ?Sized> {
    cluster: &'a C,
    expectations: &'a [NodeExpectation],
    source: QuantitySource,
}

/// Result of evaluating one node/device pair.
enum DeviceCheck {
    Matched,
    Mismatch(Finding),
    /// The whole node is missing; remaining devices on it are not evaluated
    NodeMissing(Finding),
}

impl<'a, C> CapacityValidator<'a, C>
where
    C: ClusterStateProvider + ?Sized,
{
    pub fn new(cluster: &'a C, expectations: &'a [NodeExpectation], source: QuantitySource) -> Self {
        Self {
            cluster,
            expectations,
            source,
        }
    }

    /// Evaluates every node/device pair and reports each mismatch individually.
    ///
    /// Returns a skipped report when no node or device expectations are configured.
    /// Quantities are compared by their canonical string, never parsed.
    ///
    /// # Errors
    ///
    /// - provider errors other than [`ClusterError::NodeNotFound`] and
    ///   [`ClusterError::DeviceNotAdvertised`], with node and device attached
    #[tracing::instrument(skip(self), fields(source = ?self.source, nodes = self.expectations.len()))]
    pub async fn validate(&self) -> ClusterResult<CheckReport> {
        let has_devices = self
            .expectations
            .iter()
            .any(|node| !node.device_expectations.is_empty());
        if !has_devices {
            info!("no node or device expectations configured, skipping capacity check");
            return Ok(CheckReport::skipped(
                CheckKind::Capacity,
                "no nodes or devices specified in the expected state",
            ));
        }

        let mut findings = Vec::new();
        for node in self.expectations {
            for device in &node.device_expectations {
                match self.check_device(&node.node_name, device).await? {
                    DeviceCheck::Matched => {}
                    DeviceCheck::Mismatch(finding) => {
                        warn!("{finding}");
                        findings.push(finding);
                    }
                    DeviceCheck::NodeMissing(finding) => {
                        warn!("{finding}");
                        findings.push(finding);
                        break;
                    }
                }
            }
        }

        Ok(CheckReport::from_findings(CheckKind::Capacity, findings))
    }

    async fn check_device(
        &self,
        node: &str,
        device: &DeviceExpectation,
    ) -> ClusterResult<DeviceCheck> {
        let device_name = device.device_name.as_str();
        let result = match self.source {
            QuantitySource::Capacity => self.cluster.get_device_capacity(node, device_name).await,
            QuantitySource::Allocatable => {
                self.cluster
                    .get_allocatable_device_quantity(node, device_name)
                    .await
            }
        };

        let actual = match result {
            Ok(actual) => actual,
            Err(report) => {
                return match report.current_context() {
                    ClusterError::DeviceNotAdvertised { .. } => {
                        Ok(DeviceCheck::Mismatch(Finding::DeviceNotAdvertised {
                            node: node.to_string(),
                            device: device_name.to_string(),
                        }))
                    }
                    ClusterError::NodeNotFound { .. } => {
                        Ok(DeviceCheck::NodeMissing(Finding::NodeNotFound {
                            node: node.to_string(),
                        }))
                    }
                    _ => Err(report.attach_printable(format!("node: {node}, device: {device_name}"))),
                };
            }
        };

        if actual.0 == device.expected_quantity.0 {
            debug!(node, device = device_name, quantity = %actual.0, "device quantity matches");
            Ok(DeviceCheck::Matched)
        } else {
            Ok(DeviceCheck::Mismatch(Finding::QuantityMismatch {
                node: node.to_string(),
                device: device_name.to_string(),
                expected: device.expected_quantity.0.clone(),
                actual: actual.0,
            }))
        }
    }
}
