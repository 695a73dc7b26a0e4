//! Logging Infrastructure

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber
///
/// `level` is a filter directive ("debug", "cloud_link=trace,info", ...).
/// With `log_dir`, output goes to a daily rolling file instead of stdout.
pub fn init_logger(level: &str, json: bool, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let file_appender = log_dir.map(|dir| tracing_appender::rolling::daily(dir, "link-agent"));

    match (json, file_appender) {
        (true, Some(appender)) => subscriber.json().with_writer(appender).init(),
        (true, None) => subscriber.json().init(),
        (false, Some(appender)) => subscriber.with_writer(appender).init(),
        (false, None) => subscriber.init(),
    }
}
