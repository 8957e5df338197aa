//! Orchestration of a conformance run
//!
//! Sequences the selected checks against the providers and folds their
//! outcomes into a single [`api_types::ConformanceSummary`].

pub mod report;
pub mod runner;

pub use report::render_expected;
pub use report::render_summary;
pub use runner::ConformanceRunner;
pub use runner::RunSettings;
