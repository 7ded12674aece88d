//! Tracing setup.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Get the .dscheduler directory path.
pub(crate) fn dscheduler_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".dscheduler"))
        .unwrap_or_else(|| PathBuf::from(".dscheduler"))
}

/// Daily-rotating log file writer in `log_dir`, keeping 30 files.
fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("dscheduler")
        .filename_suffix("log")
        .max_log_files(30)
        .build(log_dir)?;

    Ok(tracing_appender::non_blocking(file_appender))
}

/// Initialize tracing with console and file output.
///
/// Console output goes to stderr so command output on stdout stays clean.
/// Log files are written to ~/.dscheduler/logs/. Pending file output is
/// flushed when the returned guard is dropped, so hold it until exit.
pub(crate) fn init_tracing() -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let (non_blocking, guard) = file_writer(&dscheduler_dir().join("logs"))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_dropping_guard_flushes_last_lines() {
        let temp_dir = TempDir::new().unwrap();
        let (mut writer, guard) = file_writer(temp_dir.path()).unwrap();
        writer.write_all(b"Error: job not found\n").unwrap();
        drop(guard);

        let content: String = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(content.contains("Error: job not found"));
    }
}
