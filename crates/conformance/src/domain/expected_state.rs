//! Typed reference configuration the validators compare the cluster against.

use api_types::DeviceInfo;
use api_types::NodeInfo;
use api_types::TestConfig;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Identifies the pods that belong to the device plugin under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    pub name_prefix: String,
    pub namespace: String,
}

/// A device the cluster should advertise on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceExpectation {
    pub device_name: String,
    /// Compared verbatim against the cluster's canonical quantity string
    pub expected_quantity: Quantity,
    pub selected_for_allocation: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeExpectation {
    pub node_name: String,
    pub device_expectations: Vec<DeviceExpectation>,
}

/// Root of the expected state. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedConfig {
    pub plugin_identity: PluginIdentity,
    pub node_expectations: Vec<NodeExpectation>,
}

impl ExpectedConfig {
    /// Devices flagged for allocation by the lifecycle check, in document order.
    pub fn devices_for_allocation(&self) -> impl Iterator<Item = &DeviceExpectation> {
        self.node_expectations
            .iter()
            .flat_map(|node| node.device_expectations.iter())
            .filter(|device| device.selected_for_allocation)
    }

    /// Total number of node/device pairs the capacity check will evaluate.
    pub fn device_expectation_count(&self) -> usize {
        self.node_expectations
            .iter()
            .map(|node| node.device_expectations.len())
            .sum()
    }
}

impl From<TestConfig> for ExpectedConfig {
    fn from(config: TestConfig) -> Self {
        Self {
            plugin_identity: PluginIdentity {
                name_prefix: config.device_plugin_name,
                namespace: config.device_plugin_namespace,
            },
            node_expectations: config.nodes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<NodeInfo> for NodeExpectation {
    fn from(node: NodeInfo) -> Self {
        Self {
            node_name: node.name,
            device_expectations: node.devices.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<DeviceInfo> for DeviceExpectation {
    fn from(device: DeviceInfo) -> Self {
        Self {
            device_name: device.name,
            expected_quantity: Quantity(device.number),
            selected_for_allocation: device.allocate,
        }
    }
}
