use std::fmt::Write;

use api_types::CheckStatus;
use api_types::ConformanceSummary;

use crate::domain::expected_state::ExpectedConfig;

/// Human-readable rendering of a run summary, one block per check.
pub fn render_summary(summary: &ConformanceSummary) -> String {
    let mut out = String::new();
    for result in &summary.results {
        let _ = writeln!(out, "[{}] {}", result.status, result.check);
        for message in &result.messages {
            let _ = writeln!(out, "    {message}");
        }
    }

    let count = |status: CheckStatus| summary.results.iter().filter(|r| r.status == status).count();
    let _ = writeln!(
        out,
        "gpu-conformance {}: {} passed, {} failed, {} skipped, {} errors",
        summary.version,
        count(CheckStatus::Passed),
        count(CheckStatus::Failed),
        count(CheckStatus::Skipped),
        count(CheckStatus::Error),
    );
    out
}

/// Human-readable rendering of the loaded expected state.
pub fn render_expected(expected: &ExpectedConfig) -> String {
    let mut out = String::new();
    let identity = &expected.plugin_identity;
    let _ = writeln!(
        out,
        "device plugin: {} (namespace {})",
        identity.name_prefix, identity.namespace
    );

    if expected.node_expectations.is_empty() {
        let _ = writeln!(out, "no node expectations, capacity check will be skipped");
    }
    for node in &expected.node_expectations {
        let _ = writeln!(out, "node {}", node.node_name);
        for device in &node.device_expectations {
            let allocate = if device.selected_for_allocation {
                " [allocate]"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "    {} = {}{allocate}",
                device.device_name, device.expected_quantity.0
            );
        }
    }
    out
}
