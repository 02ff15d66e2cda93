//! Observability infrastructure for the inventory tool
//!
//! Provides:
//! - Tracing subscriber setup writing to stderr or a log file
//! - Structured lifecycle events for inventory runs
//!
//! Stdout is reserved for report documents, so logs never go there.

use crate::inventory::{InventoryError, RunSummary};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Logging settings resolved from configuration
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Filter directive such as `info` or `inventory_lib=debug`
    pub level: String,
    /// Append logs to this file instead of stderr
    pub file: Option<String>,
    /// Emit JSON lines instead of human readable text
    pub json: bool,
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("Invalid log level {:?}", settings.level))?;

    let layer = match settings.file.as_deref().filter(|f| !f.is_empty()) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Path::new(path))
                .with_context(|| format!("Failed to open log file {path}"))?;
            fmt_layer(Mutex::new(file), settings.json, false)
        }
        None => fmt_layer(std::io::stderr, settings.json, true),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")
}

fn fmt_layer<W>(writer: W, json: bool, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Structured lifecycle events for inventory runs
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    region: String,
}

impl StructuredLogger {
    pub fn new(region: Option<&str>) -> Self {
        Self {
            region: region.unwrap_or("default").to_string(),
        }
    }

    /// Log tool startup
    pub fn log_startup(&self, version: &str, polling_interval_secs: u64) {
        info!(
            event = "inventory_started",
            region = %self.region,
            version = %version,
            polling_interval_secs,
            "ECS inventory started"
        );
    }

    /// Log the start of one inventory pass
    pub fn log_run_started(&self) {
        info!(
            event = "inventory_run_started",
            region = %self.region,
            "Getting inventory reports for region"
        );
    }

    /// Log the result of one inventory pass
    pub fn log_run_complete(&self, summary: &RunSummary) {
        if summary.has_failures() {
            warn!(
                event = "inventory_run_complete",
                region = %self.region,
                reported = summary.reported.len(),
                empty = summary.empty.len(),
                failed = summary.failures.len(),
                "Inventory run finished with cluster failures"
            );
        } else {
            info!(
                event = "inventory_run_complete",
                region = %self.region,
                reported = summary.reported.len(),
                empty = summary.empty.len(),
                "Inventory run finished"
            );
        }
    }

    /// Log a run that aborted before fan-out
    pub fn log_run_failed(&self, err: &InventoryError) {
        error!(
            event = "inventory_run_failed",
            region = %self.region,
            error = %err,
            "Inventory run failed"
        );
    }

    /// Log tool shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "inventory_shutdown",
            region = %self.region,
            reason = %reason,
            "ECS inventory shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_logger_default_region() {
        assert_eq!(StructuredLogger::new(None).region, "default");
        assert_eq!(StructuredLogger::new(Some("eu-west-1")).region, "eu-west-1");
    }

    #[test]
    fn test_init_tracing_rejects_unopenable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            level: "info".to_string(),
            file: Some(dir.path().join("missing").join("app.log").display().to_string()),
            json: false,
        };

        let err = init_tracing(&settings).unwrap_err();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}
