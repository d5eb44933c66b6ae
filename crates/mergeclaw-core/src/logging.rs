use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with both stderr and file output.
/// Returns a guard that must be held for the lifetime of the application
/// to ensure log messages are flushed.
///
/// Console output goes to stderr so that JSON printed by commands on stdout
/// stays machine-readable.
pub fn init_logging(
    log_dir: &Path,
    verbose: bool,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::never(log_dir, "mergeclaw.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if verbose {
        "debug,reqwest=info,hyper=info"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
