use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// Logs go to stderr at `warn` unless `RUST_LOG` says otherwise. With
/// `debug` set, this crate logs at `debug` and a copy of every line is
/// appended to a dated file under `log_dir`.
pub fn init_tracing(debug: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if debug {
        filter = filter.add_directive("ghi=debug".parse().context("Invalid log directive")?);
    }

    let (file_layer, log_path) = match log_dir.filter(|_| debug) {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(chrono::Local::now().date_naive()));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(log_path)
}

pub fn log_file_name(date: NaiveDate) -> String {
    format!("ghi-{}.log", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(log_file_name(date), "ghi-2026-03-07.log");
    }
}
