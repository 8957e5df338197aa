//! Test workload (virtual machine) model and the orchestration boundary.

use core::error::Error;

use error_stack::Report;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::domain::expected_state::DeviceExpectation;

pub const DEFAULT_WORKLOAD_NAME: &str = "gpu-test-vm";
pub const DEFAULT_WORKLOAD_NAMESPACE: &str = "default";
pub const DEFAULT_DISK_IMAGE: &str = "quay.io/kubevirt/cirros-container-disk-demo";

/// Observed phase of a workload instance. Owned by the orchestrator, only read here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum WorkloadPhase {
    /// Accepted but not yet picked up by the scheduler
    #[display("Submitted")]
    Submitted,
    #[display("Scheduling")]
    Scheduling,
    #[display("Scheduled")]
    Scheduled,
    #[display("Running")]
    Running,
    #[display("Succeeded")]
    Succeeded,
    #[display("Failed")]
    Failed,
    /// Transient: the instance may not exist yet or the query failed
    #[display("Unknown")]
    Unknown,
}

impl WorkloadPhase {
    /// Maps a KubeVirt `VirtualMachineInstance` phase string.
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            None | Some("") | Some("Pending") => WorkloadPhase::Submitted,
            Some("Scheduling") => WorkloadPhase::Scheduling,
            Some("Scheduled") => WorkloadPhase::Scheduled,
            Some("Running") => WorkloadPhase::Running,
            Some("Succeeded") => WorkloadPhase::Succeeded,
            Some("Failed") => WorkloadPhase::Failed,
            Some(_) => WorkloadPhase::Unknown,
        }
    }
}

/// One device request attached to the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuRequest {
    /// Name of the device inside the guest spec
    pub name: String,
    /// Advertised resource name, e.g. `nvidia.com/GH100_H100_SXM5_80GB`
    pub device_name: String,
}

/// Everything needed to submit the test workload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub gpus: Vec<GpuRequest>,
    pub cpu_request: Quantity,
    pub memory_request: Quantity,
    pub disk_image: String,
}

impl WorkloadSpec {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            gpus: Vec::new(),
            cpu_request: Quantity("2".to_string()),
            memory_request: Quantity("4Gi".to_string()),
            disk_image: DEFAULT_DISK_IMAGE.to_string(),
        }
    }

    /// Requests one device per flagged expectation, named `gpu-<index>`.
    pub fn with_devices<'a>(mut self, devices: impl IntoIterator<Item = &'a DeviceExpectation>) -> Self {
        self.gpus = devices
            .into_iter()
            .enumerate()
            .map(|(idx, device)| GpuRequest {
                name: format!("gpu-{idx}"),
                device_name: device.device_name.clone(),
            })
            .collect();
        self
    }

    pub fn handle(&self) -> WorkloadHandle {
        WorkloadHandle {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Name/namespace pair addressing a submitted workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{namespace}/{name}")]
pub struct WorkloadHandle {
    pub name: String,
    pub namespace: String,
}

/// Errors raised by [`WorkloadProvider`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum WorkloadError {
    #[display("Workload {workload} rejected on create: {message}")]
    CreateRejected {
        workload: WorkloadHandle,
        message: String,
    },
    #[display("Workload {workload} query failed: {message}")]
    Query {
        workload: WorkloadHandle,
        message: String,
    },
    #[display("Workload {workload} rejected on delete: {message}")]
    DeleteRejected {
        workload: WorkloadHandle,
        message: String,
    },
}

impl Error for WorkloadError {}

pub type WorkloadResult<T> = Result<T, Report<WorkloadError>>;

/// Creates, observes and deletes the test workload.
#[async_trait::async_trait]
pub trait WorkloadProvider: Send + Sync {
    /// # Errors
    ///
    /// - [`WorkloadError::CreateRejected`] if the orchestrator refuses the spec
    async fn create_workload(&self, spec: &WorkloadSpec) -> WorkloadResult<WorkloadHandle>;

    /// Current phase of the running instance. An instance that does not exist yet
    /// reports [`WorkloadPhase::Unknown`].
    ///
    /// # Errors
    ///
    /// - [`WorkloadError::Query`] on transport or API failure
    async fn get_workload_phase(&self, handle: &WorkloadHandle) -> WorkloadResult<WorkloadPhase>;

    /// # Errors
    ///
    /// - [`WorkloadError::DeleteRejected`] if the orchestrator refuses the deletion
    async fn delete_workload(&self, handle: &WorkloadHandle) -> WorkloadResult<()>;

    /// Whether the workload object still exists.
    ///
    /// # Errors
    ///
    /// - [`WorkloadError::Query`] on transport or API failure
    async fn workload_exists(&self, handle: &WorkloadHandle) -> WorkloadResult<bool>;
}
