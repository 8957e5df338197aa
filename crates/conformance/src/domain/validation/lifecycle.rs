use core::error::Error;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::poll::poll_until;
use super::poll::PollOutcome;
use super::poll::PollSettings;
use crate::domain::expected_state::ExpectedConfig;
use crate::domain::workload::WorkloadHandle;
use crate::domain::workload::WorkloadPhase;
use crate::domain::workload::WorkloadProvider;
use crate::domain::workload::WorkloadSpec;
use crate::domain::workload::DEFAULT_WORKLOAD_NAME;
use crate::domain::workload::DEFAULT_WORKLOAD_NAMESPACE;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for the workload lifecycle check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub workload_name: String,
    pub workload_namespace: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Poll until the workload is gone after deleting it
    pub await_deletion: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            workload_name: DEFAULT_WORKLOAD_NAME.to_string(),
            workload_namespace: DEFAULT_WORKLOAD_NAMESPACE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            await_deletion: false,
        }
    }
}

impl LifecycleConfig {
    /// Builds the test workload requesting every device flagged for allocation.
    pub fn workload_spec(&self, expected: &ExpectedConfig) -> WorkloadSpec {
        WorkloadSpec::new(&self.workload_name, &self.workload_namespace)
            .with_devices(expected.devices_for_allocation())
    }

    fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum LifecycleError {
    #[display("Workload was rejected on create")]
    CreateRejected,
    #[display("Workload did not reach Running within {waited:?} (last observed phase: {last_phase})")]
    RunningTimeout {
        last_phase: WorkloadPhase,
        waited: Duration,
    },
    #[display("Workload was rejected on delete")]
    DeleteRejected,
    #[display("Workload still present {waited:?} after deletion")]
    DeletionTimeout { waited: Duration },
    #[display("Lifecycle check cancelled after {waited:?}")]
    Cancelled { waited: Duration },
}

impl Error for LifecycleError {}

/// What the lifecycle check observed on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub workload: WorkloadHandle,
    /// Distinct phases in the order they were first observed
    pub observed_phases: Vec<WorkloadPhase>,
    pub time_to_running: Duration,
    /// `None` unless deletion convergence was awaited
    pub time_to_deleted: Option<Duration>,
}

/// Drives one workload through create → running → delete.
pub struct LifecycleValidator<'a, W: ?Sized> {
    workloads: &'a W,
    config: &'a LifecycleConfig,
    cancellation_token: CancellationToken,
}

impl<'a, W> LifecycleValidator<'a, W>
where
    W: WorkloadProvider + ?Sized,
{
    pub fn new(workloads: &'a W, config: &'a LifecycleConfig) -> Self {
        Self {
            workloads,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Lets the caller abort the poll loops early.
    pub fn with_cancellation(mut self, cancellation_token: CancellationToken) -> Self {
        self.cancellation_token = cancellation_token;
        self
    }

    /// # Errors
    ///
    /// - [`LifecycleError::CreateRejected`] if the provider refuses the workload
    /// - [`LifecycleError::RunningTimeout`] if `Running` is never observed before the deadline
    /// - [`LifecycleError::DeleteRejected`] if the provider refuses the deletion
    /// - [`LifecycleError::DeletionTimeout`] if awaited deletion does not converge
    /// - [`LifecycleError::Cancelled`] if the cancellation token fires while polling
    #[tracing::instrument(skip_all, fields(workload = %spec.handle(), gpus = spec.gpus.len()))]
    pub async fn validate(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<LifecycleReport, Report<LifecycleError>> {
        if spec.gpus.is_empty() {
            warn!("no devices selected for allocation, workload is created without GPUs");
        }

        let handle = self
            .workloads
            .create_workload(spec)
            .await
            .change_context(LifecycleError::CreateRejected)?;
        info!("workload created");

        let (observed_phases, time_to_running) = match self.await_running(&handle).await {
            Ok(observed) => observed,
            Err(report) => {
                self.cleanup(&handle).await;
                return Err(report);
            }
        };
        info!(?time_to_running, "workload is running");

        self.workloads
            .delete_workload(&handle)
            .await
            .change_context(LifecycleError::DeleteRejected)?;
        info!("workload deletion issued");

        let time_to_deleted = if self.config.await_deletion {
            Some(self.await_deletion(&handle).await?)
        } else {
            None
        };

        Ok(LifecycleReport {
            workload: handle,
            observed_phases,
            time_to_running,
            time_to_deleted,
        })
    }

    async fn await_running(
        &self,
        handle: &WorkloadHandle,
    ) -> Result<(Vec<WorkloadPhase>, Duration), Report<LifecycleError>> {
        let observed = Mutex::new(Vec::new());
        let observed_ref = &observed;
        let workloads = self.workloads;

        let outcome = poll_until(self.config.poll_settings(), &self.cancellation_token, move || async move {
            let phase = match workloads.get_workload_phase(handle).await {
                Ok(phase) => phase,
                Err(e) => {
                    warn!("transient error while polling workload phase: {e:?}");
                    WorkloadPhase::Unknown
                }
            };
            record_phase(observed_ref, phase);

            if phase == WorkloadPhase::Running {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(phase)
            }
        })
        .await;

        let observed = observed.into_inner().unwrap_or_else(|e| e.into_inner());
        match outcome {
            PollOutcome::Done { waited, .. } => Ok((observed, waited)),
            PollOutcome::TimedOut { last, waited } => Err(Report::new(
                LifecycleError::RunningTimeout {
                    last_phase: last.unwrap_or(WorkloadPhase::Unknown),
                    waited,
                },
            )
            .attach_printable(format!("observed phases: {observed:?}"))),
            PollOutcome::Cancelled { waited, .. } => {
                Err(Report::new(LifecycleError::Cancelled { waited }))
            }
        }
    }

    async fn await_deletion(&self, handle: &WorkloadHandle) -> Result<Duration, Report<LifecycleError>> {
        let workloads = self.workloads;

        let outcome = poll_until(self.config.poll_settings(), &self.cancellation_token, move || async move {
            match workloads.workload_exists(handle).await {
                Ok(false) => ControlFlow::Break(()),
                Ok(true) => ControlFlow::Continue(()),
                Err(e) => {
                    warn!("transient error while polling workload existence: {e:?}");
                    ControlFlow::Continue(())
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Done { waited, .. } => {
                info!(?waited, "workload deleted");
                Ok(waited)
            }
            PollOutcome::TimedOut { waited, .. } => {
                Err(Report::new(LifecycleError::DeletionTimeout { waited }))
            }
            PollOutcome::Cancelled { waited, .. } => {
                Err(Report::new(LifecycleError::Cancelled { waited }))
            }
        }
    }

    /// Best-effort removal after a failed wait so the test VM is not leaked.
    async fn cleanup(&self, handle: &WorkloadHandle) {
        match self.workloads.delete_workload(handle).await {
            Ok(()) => info!("deleted workload after failed lifecycle check"),
            Err(e) => error!("failed to delete workload after failed lifecycle check: {e:?}"),
        }
    }
}

/// Appends `phase` when it differs from the previous observation.
fn record_phase(observed: &Mutex<Vec<WorkloadPhase>>, phase: WorkloadPhase) {
    let mut observed = observed.lock().unwrap_or_else(|e| e.into_inner());
    if observed.last() != Some(&phase) {
        info!(%phase, "workload phase changed");
        observed.push(phase);
    }
}
