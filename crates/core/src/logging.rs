use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. When `log_dir` is set, logs are
/// additionally written to a daily-rotated file under that directory; the
/// returned guard must be kept alive for the duration of the process so the
/// non-blocking file writer keeps flushing.
pub fn init_logging(log_level: &str, log_to_file: bool, log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if log_to_file {
        let dir = log_dir.unwrap_or("logs");
        let file_appender = tracing_appender::rolling::daily(dir, "genrelay.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .json()
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}
