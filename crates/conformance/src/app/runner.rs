use api_types::CheckResult;
use api_types::CheckStatus;
use api_types::ConformanceSummary;
use error_stack::Report;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use utils::version;

use crate::domain::cluster_state::ClusterResult;
use crate::domain::cluster_state::ClusterStateProvider;
use crate::domain::expected_state::ExpectedConfig;
use crate::domain::validation::CapacityValidator;
use crate::domain::validation::CheckKind;
use crate::domain::validation::CheckReport;
use crate::domain::validation::DeploymentValidator;
use crate::domain::validation::LifecycleConfig;
use crate::domain::validation::LifecycleError;
use crate::domain::validation::LifecycleReport;
use crate::domain::validation::LifecycleValidator;
use crate::domain::validation::PlacementMode;
use crate::domain::validation::QuantitySource;
use crate::domain::workload::WorkloadProvider;

/// Per-run knobs for the individual checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    pub placement_mode: PlacementMode,
    pub quantity_source: QuantitySource,
    pub lifecycle: LifecycleConfig,
}

/// Runs the selected checks one after another and reports every outcome.
pub struct ConformanceRunner<C, W> {
    cluster: C,
    workloads: W,
    expected: ExpectedConfig,
    settings: RunSettings,
    cancellation_token: CancellationToken,
}

impl<C, W> ConformanceRunner<C, W>
where
    C: ClusterStateProvider,
    W: WorkloadProvider,
{
    pub fn new(cluster: C, workloads: W, expected: ExpectedConfig, settings: RunSettings) -> Self {
        Self {
            cluster,
            workloads,
            expected,
            settings,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation_token: CancellationToken) -> Self {
        self.cancellation_token = cancellation_token;
        self
    }

    /// A failing or erroring check never stops the checks after it.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, checks: &[CheckKind]) -> ConformanceSummary {
        let mut results = Vec::with_capacity(checks.len());

        for &check in checks {
            let result = if self.cancellation_token.is_cancelled() {
                CheckResult {
                    check: check.to_string(),
                    status: CheckStatus::Error,
                    messages: vec!["Run was cancelled before this check started".to_string()],
                }
            } else {
                info!(%check, "running check");
                match check {
                    CheckKind::Deployment => self.run_deployment().await,
                    CheckKind::Capacity => self.run_capacity().await,
                    CheckKind::Lifecycle => self.run_lifecycle().await,
                }
            };
            info!(%check, status = %result.status, "check finished");
            results.push(result);
        }

        ConformanceSummary::new(version::VERSION.as_str(), results)
    }

    async fn run_deployment(&self) -> CheckResult {
        let validator = DeploymentValidator::new(
            &self.cluster,
            &self.expected.plugin_identity,
            self.settings.placement_mode,
        );
        check_result(CheckKind::Deployment, validator.validate().await)
    }

    async fn run_capacity(&self) -> CheckResult {
        let validator = CapacityValidator::new(
            &self.cluster,
            &self.expected.node_expectations,
            self.settings.quantity_source,
        );
        check_result(CheckKind::Capacity, validator.validate().await)
    }

    async fn run_lifecycle(&self) -> CheckResult {
        let spec = self.settings.lifecycle.workload_spec(&self.expected);
        let outcome = LifecycleValidator::new(&self.workloads, &self.settings.lifecycle)
            .with_cancellation(self.cancellation_token.clone())
            .validate(&spec)
            .await;
        lifecycle_result(outcome)
    }
}

fn check_result(check: CheckKind, outcome: ClusterResult<CheckReport>) -> CheckResult {
    match outcome {
        Ok(report) => report.into(),
        Err(report) => {
            error!(%check, "check could not complete: {report:?}");
            CheckResult {
                check: check.to_string(),
                status: CheckStatus::Error,
                messages: vec![format!("{report:#}")],
            }
        }
    }
}

fn lifecycle_result(outcome: Result<LifecycleReport, Report<LifecycleError>>) -> CheckResult {
    let check = CheckKind::Lifecycle.to_string();
    match outcome {
        Ok(report) => {
            let phases: Vec<String> = report.observed_phases.iter().map(ToString::to_string).collect();
            let mut messages = vec![format!(
                "Workload {} reached Running after {:?} ({})",
                report.workload,
                report.time_to_running,
                phases.join(" -> ")
            )];
            if let Some(waited) = report.time_to_deleted {
                messages.push(format!("Workload {} deleted after {waited:?}", report.workload));
            }
            CheckResult {
                check,
                status: CheckStatus::Passed,
                messages,
            }
        }
        Err(report) => {
            error!("lifecycle check failed: {report:?}");
            let status = match report.current_context() {
                LifecycleError::Cancelled { .. } => CheckStatus::Error,
                _ => CheckStatus::Failed,
            };
            CheckResult {
                check,
                status,
                messages: vec![format!("{report:#}")],
            }
        }
    }
}
