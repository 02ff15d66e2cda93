//! Concurrent inventory gathering
//!
//! This module fetches the running tasks, containers and (optionally) service
//! metadata of every cluster in an account/region, folds them into one
//! [`Report`](crate::models::Report) per cluster and hands each non-empty report
//! to the dispatcher. Clusters are processed concurrently and independently.

mod assembler;
mod coordinator;
mod fetcher;


pub use assembler::{assemble_report, assemble_report_at};
pub use coordinator::{
    ClusterFailure, CollectorConfig, InventoryCollector, InventoryCollectorBuilder, InventoryError,
    RunSummary,
};
pub use fetcher::{fetch_cluster, ClusterInventory};
