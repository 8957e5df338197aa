pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export main modules
pub use domain::cluster_state;
pub use domain::expected_state;
pub use domain::validation;
pub use domain::workload;
pub use infrastructure::k8s;
pub use infrastructure::kube_client;
pub use infrastructure::logging;
