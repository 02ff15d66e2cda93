//! Inventory library for ECS container reporting
//!
//! This crate provides the core functionality for:
//! - Enumerating ECS clusters and reading their running tasks and services
//! - Assembling one inventory report per cluster
//! - Fanning the per-cluster work out concurrently with failure isolation
//! - Printing reports and delivering them to Anchore

pub mod connection;
pub mod ecs;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod reporter;

pub use connection::{AnchoreInfo, HttpConfig};
pub use inventory::{
    ClusterFailure, InventoryCollector, InventoryCollectorBuilder, InventoryError, RunSummary,
};
pub use models::*;
pub use reporter::{DeliveryClient, DispatchOptions, DispatchOutcome, ReportDispatcher};
