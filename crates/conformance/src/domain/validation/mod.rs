//! Validators comparing discovered cluster state against the expected state.
//!
//! Assertion failures are not errors: each validator collects every [`Finding`]
//! in one pass and returns them inside a [`CheckReport`]. Errors are reserved
//! for provider calls that could not be answered at all.

pub mod capacity;
pub mod deployment;
pub mod lifecycle;
pub mod poll;

use api_types::CheckResult;
use api_types::CheckStatus;

use crate::domain::cluster_state::PodPhase;

pub use capacity::CapacityValidator;
pub use capacity::QuantitySource;
pub use deployment::DeploymentValidator;
pub use deployment::PlacementMode;
pub use lifecycle::LifecycleConfig;
pub use lifecycle::LifecycleError;
pub use lifecycle::LifecycleReport;
pub use lifecycle::LifecycleValidator;

/// The checks a conformance run is made of.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum, derive_more::Display,
)]
pub enum CheckKind {
    #[display("deployment")]
    Deployment,
    #[display("capacity")]
    Capacity,
    #[display("lifecycle")]
    Lifecycle,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [CheckKind::Deployment, CheckKind::Capacity, CheckKind::Lifecycle];
}

/// A single divergence between expected and observed state.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Finding {
    #[display("No device plugin pods with prefix \"{prefix}\" found in namespace \"{namespace}\"")]
    NoPluginPods { prefix: String, namespace: String },
    #[display("Number of device plugin pods is not aligned with the number of worker nodes: {workers} != {pods}")]
    PodCountMismatch { workers: usize, pods: usize },
    #[display("No device plugin pod is running on worker node {node}")]
    MissingOnNode { node: String },
    #[display("Worker node {node} hosts more than one device plugin pod: {}", pods.join(", "))]
    ColocatedPods { node: String, pods: Vec<String> },
    #[display("Pod {pod} is {phase}")]
    PodNotRunning { pod: String, phase: PodPhase },
    #[display("Number of device {device} on node {node} is incorrect: expected {expected}, actual {actual}")]
    QuantityMismatch {
        node: String,
        device: String,
        expected: String,
        actual: String,
    },
    #[display("Device {device} is not advertised on node {node}")]
    DeviceNotAdvertised { node: String, device: String },
    #[display("Node {node} from the expected state does not exist in the cluster")]
    NodeNotFound { node: String },
}

/// Outcome of a check. `Skipped` means "not evaluated" and is never a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(Vec<Finding>),
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub check: CheckKind,
    pub verdict: Verdict,
}

impl CheckReport {
    /// Passed when `findings` is empty, failed otherwise.
    pub fn from_findings(check: CheckKind, findings: Vec<Finding>) -> Self {
        let verdict = if findings.is_empty() {
            Verdict::Passed
        } else {
            Verdict::Failed(findings)
        };
        Self { check, verdict }
    }

    pub fn skipped(check: CheckKind, reason: impl Into<String>) -> Self {
        Self {
            check,
            verdict: Verdict::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.verdict, Verdict::Skipped { .. })
    }

    pub fn findings(&self) -> &[Finding] {
        match &self.verdict {
            Verdict::Failed(findings) => findings,
            _ => &[],
        }
    }
}

impl From<CheckReport> for CheckResult {
    fn from(report: CheckReport) -> Self {
        let (status, messages) = match report.verdict {
            Verdict::Passed => (CheckStatus::Passed, Vec::new()),
            Verdict::Failed(findings) => (
                CheckStatus::Failed,
                findings.iter().map(ToString::to_string).collect(),
            ),
            Verdict::Skipped { reason } => (CheckStatus::Skipped, vec![reason]),
        };
        CheckResult {
            check: report.check.to_string(),
            status,
            messages,
        }
    }
}
