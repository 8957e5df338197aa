//! provides logging helpers

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Environment variable pointing at a directory for rolling log files.
pub const LOG_PATH_ENV_VAR: &str = "CONFORMANCE_LOG_PATH";

const LOG_FILE_PREFIX: &str = "conformance.log";

/// A formatting layer plus the guard that keeps its background writer alive.
pub type FmtLayer<S> = (Box<dyn Layer<S> + Send + Sync>, Option<WorkerGuard>);

/// Builds the human-readable formatting layer.
///
/// With `log_path` set, events go to a daily rolling file inside that directory;
/// otherwise they go to stderr. Falls back to stderr if the appender cannot be created.
pub fn get_fmt_layer<S>(log_path: Option<String>) -> FmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(log_path) = log_path.filter(|p| !p.is_empty()) else {
        return (stderr_layer(), None);
    };

    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(3)
        .build(Path::new(&log_path))
    {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (layer, Some(guard))
        }
        Err(err) => {
            eprintln!("failed to create rolling log appender at {log_path}: {err}; logging to stderr");
            (stderr_layer(), None)
        }
    }
}

fn stderr_layer<S>() -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .boxed()
}
