use anyhow::{Context, bail};
use std::{fs, io, path::Path};
use tracing::level_filters::LevelFilter;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging to stderr and, if a path is provided, to that file.
///
/// The returned guard must be held for as long as logs should be flushed to the file.
pub fn init(log_path: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    let stderr_layer = fmt::layer().with_writer(io::stderr);
    let (file_layer, guard) = match log_path {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

fn file_writer(path: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let Some(file_name) = path.file_name() else {
        bail!("log path {} has no file name", path.display());
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_directory() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("nested").join("gateway.log");
        let (_writer, _guard) = file_writer(&path).expect("failed to create writer");
        assert!(path.is_file());
    }

    #[test]
    fn rejects_path_without_file_name() {
        assert!(file_writer(Path::new("/")).is_err());
    }
}
