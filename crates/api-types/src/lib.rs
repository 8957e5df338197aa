//! Shared API type definitions
//!
//! This crate contains the serialized forms used by the conformance validator:
//! the expected-state document operators hand to the validator, and the
//! machine-readable summary it emits after a run.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// Expected-state document describing the device plugin under test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Name prefix shared by every device plugin pod
    #[serde(rename = "deviceplugin_name", default)]
    pub device_plugin_name: String,
    /// Namespace the device plugin is deployed into
    #[serde(rename = "deviceplugin_namespace", default)]
    pub device_plugin_namespace: String,
    /// Per-node device expectations, evaluated in document order
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
}

/// Devices expected on a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeInfo {
    pub name: String,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

/// A single advertised resource and its expected quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceInfo {
    /// Resource name as advertised by the node, e.g. `nvidia.com/GH100_H100_SXM5_80GB`
    pub name: String,
    /// Quantity in the cluster's canonical textual form
    #[serde(deserialize_with = "deserialize_quantity_string")]
    pub number: String,
    /// Whether the lifecycle check should request this device for its test VM
    #[serde(default)]
    pub allocate: bool,
}

/// Accepts `"8"` as well as a bare YAML/JSON integer `8`, keeping the literal text.
fn deserialize_quantity_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInteger {
        String(String),
        Unsigned(u64),
        Signed(i64),
    }

    match StringOrInteger::deserialize(deserializer)? {
        StringOrInteger::String(s) => Ok(s),
        StringOrInteger::Unsigned(n) => Ok(n.to_string()),
        StringOrInteger::Signed(n) => Ok(n.to_string()),
    }
}

/// Outcome of a single check as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[display("PASSED")]
    Passed,
    #[display("FAILED")]
    Failed,
    #[display("SKIPPED")]
    Skipped,
    #[display("ERROR")]
    Error,
}

/// Result of one check in a conformance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name, e.g. `deployment`
    pub check: String,
    pub status: CheckStatus,
    /// Human-readable findings, skip reason, or error chain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

/// Response format for a full conformance run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceSummary {
    /// Validator version string
    pub version: String,
    /// True when no check failed or errored; skipped checks do not count as failures
    pub success: bool,
    pub results: Vec<CheckResult>,
}

impl ConformanceSummary {
    pub fn new(version: impl Into<String>, results: Vec<CheckResult>) -> Self {
        let success = results
            .iter()
            .all(|r| matches!(r.status, CheckStatus::Passed | CheckStatus::Skipped));
        Self {
            version: version.into(),
            success,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_status_display_and_wire_names() {
        assert_eq!(CheckStatus::Passed.to_string(), "PASSED");
        assert_eq!(CheckStatus::Error.to_string(), "ERROR");
        assert_eq!(
            serde_yaml::to_string(&CheckStatus::Skipped).unwrap().trim(),
            "skipped"
        );
    }

    #[test]
    fn deserialize_document_with_string_and_integer_numbers() {
        let yaml = r#"
deviceplugin_name: nvidia-kubevirt-gpu-dp
deviceplugin_namespace: kube-system
nodes:
  - name: worker-1
    devices:
      - name: nvidia.com/GH100_H100_SXM5_80GB
        number: "8"
        allocate: true
      - name: nvidia.com/GH100_H100_NVSwitch
        number: 4
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).expect("should parse document");

        assert_eq!(config.device_plugin_name, "nvidia-kubevirt-gpu-dp");
        assert_eq!(config.device_plugin_namespace, "kube-system");
        assert_eq!(config.nodes.len(), 1);
        let devices = &config.nodes[0].devices;
        assert_eq!(devices[0].number, "8");
        assert!(devices[0].allocate);
        assert_eq!(devices[1].number, "4");
        assert!(!devices[1].allocate, "allocate should default to false");
    }

    #[test]
    fn missing_nodes_defaults_to_empty() {
        let yaml = "deviceplugin_name: dp\ndeviceplugin_namespace: ns\n";
        let config: TestConfig = serde_yaml::from_str(yaml).expect("should parse document");
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = "deviceplugin_name: dp\ndeviceplugin_namespace: ns\nnode: []\n";
        assert!(serde_yaml::from_str::<TestConfig>(yaml).is_err());
    }

    #[test]
    fn summary_success_ignores_skipped_checks() {
        let summary = ConformanceSummary::new(
            "test",
            vec![
                CheckResult {
                    check: "deployment".to_string(),
                    status: CheckStatus::Passed,
                    messages: vec![],
                },
                CheckResult {
                    check: "capacity".to_string(),
                    status: CheckStatus::Skipped,
                    messages: vec!["no nodes configured".to_string()],
                },
            ],
        );
        assert!(summary.success);

        let failed = ConformanceSummary::new(
            "test",
            vec![CheckResult {
                check: "lifecycle".to_string(),
                status: CheckStatus::Error,
                messages: vec![],
            }],
        );
        assert!(!failed.success);
    }
}
