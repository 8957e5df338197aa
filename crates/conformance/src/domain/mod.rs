pub mod cluster_state;
pub mod expected_state;
pub mod validation;
pub mod workload;

#[cfg(test)]
pub(crate) mod mock;
