//! Per-report decision between printing, delivering and skipping

use super::client::{DeliveryClient, DeliveryError};
use crate::connection::AnchoreInfo;
use crate::models::Report;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::{debug, error, info};

/// Run-mode flags that affect dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Do not print reports to the output sink
    pub quiet: bool,
    /// Do not deliver reports to Anchore
    pub dry_run: bool,
}

/// What happened to a report on the delivery side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Dry run, delivery skipped
    DryRun,
    /// Posted to Anchore
    Delivered,
    /// No valid delivery target, delivery skipped
    NotConfigured,
}

/// Errors raised while dispatching a single cluster's report
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unable to report inventory for cluster {cluster} to Anchore: {source}")]
    Delivery {
        cluster: String,
        source: DeliveryError,
    },
    #[error("unable to show inventory for cluster {cluster}: {source}")]
    Output { cluster: String, source: io::Error },
}

/// Routes each report to the output sink and/or the delivery client
///
/// The output sink is shared by all concurrently running clusters; each report
/// is written as one complete document while holding the lock.
pub struct ReportDispatcher {
    options: DispatchOptions,
    client: Option<DeliveryClient>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl ReportDispatcher {
    /// Create a dispatcher printing to stdout
    ///
    /// `client` should be `Some` only when the delivery target is valid.
    pub fn new(options: DispatchOptions, client: Option<DeliveryClient>) -> Self {
        Self {
            options,
            client,
            output: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a dispatcher for a configured target
    ///
    /// An invalid target is not an error; delivery is simply skipped. A valid
    /// target with a malformed URL fails each delivery, not construction.
    pub fn from_target(
        options: DispatchOptions,
        target: &AnchoreInfo,
    ) -> Result<Self, DeliveryError> {
        let client = if target.is_valid() {
            Some(DeliveryClient::new(target)?)
        } else {
            None
        };
        Ok(Self::new(options, client))
    }

    /// Replace the output sink
    pub fn with_output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Mutex::new(Box::new(output));
        self
    }

    /// Dispatch one report
    ///
    /// Delivery failure does not prevent printing; it is returned after the
    /// report has been printed.
    pub async fn dispatch(&self, report: &Report) -> Result<DispatchOutcome, DispatchError> {
        let delivery = self.deliver(report).await;

        if !self.options.quiet {
            if let Err(source) = self.print(report) {
                if let Err(e) = &delivery {
                    error!(cluster = %report.cluster_arn, error = %e, "Delivery also failed");
                }
                return Err(DispatchError::Output {
                    cluster: report.cluster_arn.clone(),
                    source,
                });
            }
        }

        delivery
    }

    async fn deliver(&self, report: &Report) -> Result<DispatchOutcome, DispatchError> {
        if self.options.dry_run {
            info!(cluster = %report.cluster_arn, "Dry run specified, not reporting inventory");
            return Ok(DispatchOutcome::DryRun);
        }

        match &self.client {
            Some(client) => {
                client
                    .post(report)
                    .await
                    .map_err(|source| DispatchError::Delivery {
                        cluster: report.cluster_arn.clone(),
                        source,
                    })?;
                Ok(DispatchOutcome::Delivered)
            }
            None => {
                debug!(
                    cluster = %report.cluster_arn,
                    "Anchore details not specified, not reporting inventory"
                );
                Ok(DispatchOutcome::NotConfigured)
            }
        }
    }

    /// Write the report as indented JSON followed by a newline
    fn print(&self, report: &Report) -> io::Result<()> {
        let mut document = serde_json::to_vec_pretty(report)?;
        document.push(b'\n');

        let mut output = self
            .output
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output lock poisoned"))?;
        output.write_all(&document)?;
        output.flush()
    }
}
