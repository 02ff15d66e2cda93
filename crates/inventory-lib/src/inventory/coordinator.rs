//! Fan-out over all clusters of an account/region
//!
//! One tokio task per cluster, gated by a semaphore. Cluster-level failures are
//! logged and recorded in the [`RunSummary`]; only credential and enumeration
//! failures abort a run.

use super::{assemble_report, fetch_cluster};
use crate::ecs::{EcsApi, EcsError};
use crate::reporter::{DispatchOutcome, ReportDispatcher};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Default number of clusters processed at the same time
pub const DEFAULT_MAX_CONCURRENT_CLUSTERS: usize = 16;

/// Errors that abort an inventory run before any cluster is processed
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("AWS credential check failed: {0}")]
    Credentials(EcsError),
    #[error("unable to list clusters: {0}")]
    ListClusters(EcsError),
}

/// Configuration for an inventory run
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Include task and service metadata in reports
    pub metadata: bool,
    /// Upper bound on clusters processed concurrently
    pub max_concurrent_clusters: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            metadata: false,
            max_concurrent_clusters: DEFAULT_MAX_CONCURRENT_CLUSTERS,
        }
    }
}

/// A cluster that produced no report because of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterFailure {
    pub cluster: String,
    pub error: String,
}

/// Per-cluster results of one inventory run, in enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Clusters whose report was dispatched
    pub reported: Vec<String>,
    /// Clusters without running containers
    pub empty: Vec<String>,
    /// Clusters that failed during fetch, assembly or dispatch
    pub failures: Vec<ClusterFailure>,
}

impl RunSummary {
    /// Total number of clusters processed
    pub fn cluster_count(&self) -> usize {
        self.reported.len() + self.empty.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record(&mut self, cluster: String, outcome: ClusterOutcome) {
        match outcome {
            ClusterOutcome::Reported(outcome) => {
                debug!(cluster = %cluster, outcome = ?outcome, "Cluster report dispatched");
                self.reported.push(cluster);
            }
            ClusterOutcome::Empty => self.empty.push(cluster),
            ClusterOutcome::Failed(error) => self.failures.push(ClusterFailure { cluster, error }),
        }
    }
}

/// Result of a single cluster's unit of work
#[derive(Debug)]
enum ClusterOutcome {
    Reported(DispatchOutcome),
    Empty,
    Failed(String),
}

/// Gathers and dispatches inventory reports for every cluster
pub struct InventoryCollector {
    api: Arc<dyn EcsApi>,
    dispatcher: Arc<ReportDispatcher>,
    config: CollectorConfig,
}

impl InventoryCollector {
    /// Create a new collector
    pub fn new(
        api: Arc<dyn EcsApi>,
        dispatcher: Arc<ReportDispatcher>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            api,
            dispatcher,
            config,
        }
    }

    /// Run one inventory pass over all clusters
    ///
    /// Waits for every cluster to finish. Reports are dispatched as soon as their
    /// own cluster completes.
    pub async fn run(&self) -> Result<RunSummary, InventoryError> {
        let start = Instant::now();

        self.api
            .check_credentials()
            .await
            .map_err(InventoryError::Credentials)?;

        let clusters = self.api.list_clusters().await.map_err(|e| {
            if matches!(e, EcsError::Credentials(_)) {
                InventoryError::Credentials(e)
            } else {
                InventoryError::ListClusters(e)
            }
        })?;

        info!(cluster_count = clusters.len(), "Found clusters");

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_clusters));
        let handles: Vec<(String, JoinHandle<ClusterOutcome>)> = clusters
            .into_iter()
            .map(|cluster| {
                let handle = self.spawn_cluster(cluster.clone(), Arc::clone(&permits));
                (cluster, handle)
            })
            .collect();

        let mut summary = RunSummary::default();
        for (cluster, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(cluster = %cluster, error = %e, "Cluster inventory task aborted");
                    ClusterOutcome::Failed(format!("cluster task aborted: {e}"))
                }
            };
            summary.record(cluster, outcome);
        }

        info!(
            reported = summary.reported.len(),
            empty = summary.empty.len(),
            failed = summary.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Inventory run complete"
        );

        Ok(summary)
    }

    fn spawn_cluster(&self, cluster: String, permits: Arc<Semaphore>) -> JoinHandle<ClusterOutcome> {
        let api = Arc::clone(&self.api);
        let dispatcher = Arc::clone(&self.dispatcher);
        let metadata = self.config.metadata;

        tokio::spawn(async move {
            match permits.acquire_owned().await {
                Ok(_permit) => process_cluster(api.as_ref(), &dispatcher, &cluster, metadata).await,
                Err(e) => ClusterOutcome::Failed(e.to_string()),
            }
        })
    }
}

/// Fetch, assemble and dispatch a single cluster
async fn process_cluster(
    api: &dyn EcsApi,
    dispatcher: &ReportDispatcher,
    cluster: &str,
    metadata: bool,
) -> ClusterOutcome {
    let inventory = match fetch_cluster(api, cluster, metadata).await {
        Ok(inventory) => inventory,
        Err(e) => {
            error!(cluster = %cluster, error = %e, "Failed to get inventory report for cluster");
            return ClusterOutcome::Failed(e.to_string());
        }
    };

    let Some(report) = assemble_report(inventory) else {
        debug!(cluster = %cluster, "No containers in cluster, not reporting");
        return ClusterOutcome::Empty;
    };

    match dispatcher.dispatch(&report).await {
        Ok(outcome) => ClusterOutcome::Reported(outcome),
        Err(e) => {
            error!(cluster = %cluster, error = %e, "Failed to report inventory for cluster");
            ClusterOutcome::Failed(e.to_string())
        }
    }
}

/// Builder for an [`InventoryCollector`]
pub struct InventoryCollectorBuilder {
    api: Option<Arc<dyn EcsApi>>,
    dispatcher: Option<Arc<ReportDispatcher>>,
    config: CollectorConfig,
}

impl InventoryCollectorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            api: None,
            dispatcher: None,
            config: CollectorConfig::default(),
        }
    }

    /// Set the orchestration API client
    pub fn api(mut self, api: Arc<dyn EcsApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the report dispatcher
    pub fn dispatcher(mut self, dispatcher: Arc<ReportDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Include task and service metadata
    pub fn metadata(mut self, metadata: bool) -> Self {
        self.config.metadata = metadata;
        self
    }

    /// Set the maximum number of clusters processed concurrently
    pub fn max_concurrent_clusters(mut self, limit: usize) -> Self {
        self.config.max_concurrent_clusters = limit;
        self
    }

    /// Build the collector
    pub fn build(self) -> Result<InventoryCollector> {
        let api = self
            .api
            .ok_or_else(|| anyhow::anyhow!("ECS API client is required"))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| anyhow::anyhow!("Report dispatcher is required"))?;

        if self.config.max_concurrent_clusters == 0 {
            anyhow::bail!("max_concurrent_clusters must be at least 1");
        }

        Ok(InventoryCollector::new(api, dispatcher, self.config))
    }
}

impl Default for InventoryCollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
