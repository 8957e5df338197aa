use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::infrastructure::k8s::KubernetesError;

/// Where to find the cluster under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Explicit kubeconfig file; in-cluster config or `~/.kube/config` otherwise
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
}

pub async fn init_kube_client(cluster: &ClusterConfig) -> Result<Client, Report<KubernetesError>> {
    let options = KubeConfigOptions {
        context: cluster.context.clone(),
        ..Default::default()
    };

    let config = match &cluster.kubeconfig {
        Some(kubeconfig_path) => {
            let kubeconfig = Kubeconfig::read_from(kubeconfig_path).change_context(
                KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    ),
                })?
        }
        None if options.context.is_some() => Config::from_kubeconfig(&options)
            .await
            .change_context(KubernetesError::ConnectionFailed {
                message: "Failed to create config from default kubeconfig".to_string(),
            })?,
        None => {
            // In-cluster service account or ~/.kube/config
            Config::infer()
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: "Failed to infer Kubernetes config".to_string(),
                })?
        }
    };

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: "Failed to create Kubernetes client".to_string(),
    })
}
