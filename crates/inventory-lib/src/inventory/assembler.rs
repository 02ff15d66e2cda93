//! Folding fetched cluster data into a report

use super::ClusterInventory;
use crate::models::{cluster_name_from_arn, report_timestamp, Report};

/// Build the report for a cluster, stamped with the current time
///
/// Returns `None` when the cluster has no containers; such clusters are never
/// printed or delivered.
pub fn assemble_report(inventory: ClusterInventory) -> Option<Report> {
    assemble_report_at(inventory, report_timestamp())
}

/// Build the report for a cluster with an explicit timestamp
pub fn assemble_report_at(inventory: ClusterInventory, timestamp: String) -> Option<Report> {
    if inventory.containers.is_empty() {
        return None;
    }

    Some(Report {
        timestamp,
        cluster_name: cluster_name_from_arn(&inventory.cluster_arn).to_string(),
        cluster_arn: inventory.cluster_arn,
        containers: inventory.containers,
        tasks: inventory.tasks,
        services: inventory.services,
    })
}
