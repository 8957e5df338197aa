use std::path::Path;
use std::path::PathBuf;

use api_types::TestConfig;
use thiserror::Error;

use crate::domain::expected_state::ExpectedConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read test config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse test config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reads the expected-state document and converts it into the typed model.
///
/// Nothing is checked against the cluster here; an empty plugin identity is
/// only rejected once the deployment check runs.
pub async fn load_expected_config(path: &Path) -> Result<ExpectedConfig, ConfigError> {
    tracing::info!("Loading expected state from {:?}", path);

    let yaml_content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let document: TestConfig =
        serde_yaml::from_str(&yaml_content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let expected = ExpectedConfig::from(document);
    tracing::info!(
        nodes = expected.node_expectations.len(),
        devices = expected.device_expectation_count(),
        "Loaded expected state"
    );
    Ok(expected)
}
