use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::domain::validation::CheckKind;
use crate::domain::validation::LifecycleConfig;
use crate::domain::validation::PlacementMode;
use crate::domain::validation::QuantitySource;
use crate::domain::workload::DEFAULT_WORKLOAD_NAME;
use crate::domain::workload::DEFAULT_WORKLOAD_NAMESPACE;
use crate::infrastructure::kube_client::ClusterConfig;

pub const TEST_CONFIG_ENV_VAR: &str = "CONFORMANCE_TEST_CONFIG";
pub const DEFAULT_TEST_CONFIG: &str = "test_config.yaml";

/// How the run summary is written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long,
        env = TEST_CONFIG_ENV_VAR,
        value_hint = clap::ValueHint::FilePath,
        default_value = DEFAULT_TEST_CONFIG,
        help = "Path to the expected-state document, e.g. test_config.yaml"
    )]
    pub test_config: PathBuf,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, help = "Kubeconfig context to use instead of the current one")]
    pub kube_context: Option<String>,

    #[arg(
        long,
        value_enum,
        default_value_t = PlacementMode::Cardinality,
        help = "How device plugin pod placement is verified"
    )]
    pub placement_mode: PlacementMode,

    #[arg(
        long,
        value_enum,
        default_value_t = QuantitySource::Capacity,
        help = "Node quantity map compared against the expected device numbers"
    )]
    pub quantity_source: QuantitySource,

    #[arg(
        long,
        default_value = "2",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between workload phase polls"
    )]
    pub poll_interval_secs: u64,

    #[arg(
        long,
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds to wait for the workload to reach Running"
    )]
    pub timeout_secs: u64,

    #[arg(long, default_value = DEFAULT_WORKLOAD_NAME, help = "Name of the test VirtualMachine")]
    pub workload_name: String,

    #[arg(
        long,
        default_value = DEFAULT_WORKLOAD_NAMESPACE,
        help = "Namespace of the test VirtualMachine"
    )]
    pub workload_namespace: String,

    #[arg(long, help = "Wait until the test VirtualMachine is gone after deleting it")]
    pub await_deletion: bool,

    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        help = "Checks to run, comma separated (default: all)"
    )]
    pub checks: Vec<CheckKind>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Summary output format")]
    pub output: OutputFormat,
}

impl RunArgs {
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            kubeconfig: self.kubeconfig.clone(),
            context: self.kube_context.clone(),
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            workload_name: self.workload_name.clone(),
            workload_namespace: self.workload_namespace.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            await_deletion: self.await_deletion,
        }
    }

    /// Requested checks in execution order; every check when none were named.
    pub fn selected_checks(&self) -> Vec<CheckKind> {
        if self.checks.is_empty() {
            return CheckKind::ALL.to_vec();
        }
        CheckKind::ALL
            .into_iter()
            .filter(|check| self.checks.contains(check))
            .collect()
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CheckConfigArgs {
    #[arg(
        long,
        env = TEST_CONFIG_ENV_VAR,
        value_hint = clap::ValueHint::FilePath,
        default_value = DEFAULT_TEST_CONFIG,
        help = "Path to the expected-state document, e.g. test_config.yaml"
    )]
    pub test_config: PathBuf,
}
