use error_stack::Report;
use kube::api::ApiResource;
use kube::api::DeleteParams;
use kube::api::DynamicObject;
use kube::api::GroupVersionKind;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use serde_json::json;
use serde_json::Value;
use tracing::debug;

use crate::domain::workload::WorkloadError;
use crate::domain::workload::WorkloadHandle;
use crate::domain::workload::WorkloadPhase;
use crate::domain::workload::WorkloadProvider;
use crate::domain::workload::WorkloadResult;
use crate::domain::workload::WorkloadSpec;

const KUBEVIRT_GROUP: &str = "kubevirt.io";
const KUBEVIRT_VERSION: &str = "v1";
const DOMAIN_LABEL: &str = "kubevirt.io/domain";
const CONTAINER_DISK_VOLUME: &str = "containerdisk";

/// Runs the test workload as a KubeVirt `VirtualMachine` with `runStrategy: Always`.
///
/// The phase is read from the `VirtualMachineInstance` of the same name.
#[derive(Clone)]
pub struct KubeVirtWorkloads {
    client: Client,
    vm_resource: ApiResource,
    vmi_resource: ApiResource,
}

impl KubeVirtWorkloads {
    pub fn new(client: Client) -> Self {
        let gvk = |kind: &str| GroupVersionKind::gvk(KUBEVIRT_GROUP, KUBEVIRT_VERSION, kind);
        Self {
            client,
            vm_resource: ApiResource::from_gvk(&gvk("VirtualMachine")),
            vmi_resource: ApiResource::from_gvk(&gvk("VirtualMachineInstance")),
        }
    }

    fn vms(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.vm_resource)
    }

    fn vmis(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.vmi_resource)
    }

    fn query_failed(handle: &WorkloadHandle, e: kube::Error) -> Report<WorkloadError> {
        Report::new(WorkloadError::Query {
            workload: handle.clone(),
            message: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl WorkloadProvider for KubeVirtWorkloads {
    async fn create_workload(&self, spec: &WorkloadSpec) -> WorkloadResult<WorkloadHandle> {
        let handle = spec.handle();
        let mut vm = DynamicObject::new(&spec.name, &self.vm_resource).within(&spec.namespace);
        vm.data = virtual_machine_body(spec);

        self.vms(&spec.namespace)
            .create(&PostParams::default(), &vm)
            .await
            .map_err(|e| {
                Report::new(WorkloadError::CreateRejected {
                    workload: handle.clone(),
                    message: e.to_string(),
                })
            })?;
        debug!(workload = %handle, "created VirtualMachine");
        Ok(handle)
    }

    async fn get_workload_phase(&self, handle: &WorkloadHandle) -> WorkloadResult<WorkloadPhase> {
        let vmi = self
            .vmis(&handle.namespace)
            .get_opt(&handle.name)
            .await
            .map_err(|e| Self::query_failed(handle, e))?;

        // The instance is created asynchronously by the VM controller.
        Ok(vmi.map_or(WorkloadPhase::Unknown, |vmi| vmi_phase(&vmi)))
    }

    async fn delete_workload(&self, handle: &WorkloadHandle) -> WorkloadResult<()> {
        self.vms(&handle.namespace)
            .delete(&handle.name, &DeleteParams::default())
            .await
            .map_err(|e| {
                Report::new(WorkloadError::DeleteRejected {
                    workload: handle.clone(),
                    message: e.to_string(),
                })
            })?;
        debug!(workload = %handle, "deleted VirtualMachine");
        Ok(())
    }

    async fn workload_exists(&self, handle: &WorkloadHandle) -> WorkloadResult<bool> {
        let vm = self
            .vms(&handle.namespace)
            .get_opt(&handle.name)
            .await
            .map_err(|e| Self::query_failed(handle, e))?;
        if vm.is_some() {
            return Ok(true);
        }

        let vmi = self
            .vmis(&handle.namespace)
            .get_opt(&handle.name)
            .await
            .map_err(|e| Self::query_failed(handle, e))?;
        Ok(vmi.is_some())
    }
}

fn vmi_phase(vmi: &DynamicObject) -> WorkloadPhase {
    WorkloadPhase::parse(vmi.data.pointer("/status/phase").and_then(Value::as_str))
}

/// Everything of the `VirtualMachine` object except metadata and type information.
pub(crate) fn virtual_machine_body(spec: &WorkloadSpec) -> Value {
    let gpus: Vec<Value> = spec
        .gpus
        .iter()
        .map(|gpu| json!({ "name": gpu.name, "deviceName": gpu.device_name }))
        .collect();

    json!({
        "spec": {
            "runStrategy": "Always",
            "template": {
                "metadata": {
                    "labels": { DOMAIN_LABEL: spec.name }
                },
                "spec": {
                    "domain": {
                        "resources": {
                            "requests": {
                                "cpu": spec.cpu_request,
                                "memory": spec.memory_request,
                            }
                        },
                        "devices": {
                            "gpus": gpus
                        }
                    },
                    "volumes": [{
                        "name": CONTAINER_DISK_VOLUME,
                        "containerDisk": { "image": spec.disk_image }
                    }]
                }
            }
        }
    })
}
