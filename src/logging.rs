//! Logging setup: compact terminal output plus an optional rotating file
//! layer under the output directory.
//!
//! Level filtering comes from `RUST_LOG` (default: "info"). A long crawl
//! benefits from `RUST_LOG=forum_migrate=debug` to watch pagination and
//! dedup decisions without drowning in dependency chatter.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber. When `log_dir` is given, a daily
/// rotating `migrate.log` is written there alongside the terminal output.
///
/// # Panics
/// Panics if the subscriber is already initialized.
pub fn init_logging<P: AsRef<Path>>(log_dir: Option<P>) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create EnvFilter");

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stdout_layer);

    match log_dir {
        Some(dir) => {
            let log_path = dir.as_ref();
            std::fs::create_dir_all(log_path)?;

            let file_appender = tracing_appender::rolling::daily(log_path, "migrate.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

            let file_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .expect("Failed to create EnvFilter");
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .compact()
                .with_filter(file_filter);

            registry.with(file_layer).init();

            // The guard must outlive the program for the background writer to
            // keep flushing; leaking it is the simplest way to guarantee that.
            Box::leak(Box::new(guard));

            tracing::debug!("file logs: {}/migrate.log", log_path.display());
        }
        None => registry.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    #[test]
    fn log_directory_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs");

        // The subscriber can only be installed once per process, so cover the
        // directory-creation side without calling init.
        std::fs::create_dir_all(&log_path).unwrap();
        assert!(log_path.exists());
    }
}
