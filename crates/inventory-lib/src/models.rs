//! Core data models for inventory reports
//!
//! Field names follow the JSON contract of the Anchore `ecs-inventory` endpoint.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inventory snapshot of a single cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// RFC3339 UTC time at which the report was assembled
    pub timestamp: String,
    pub cluster_name: String,
    pub cluster_arn: String,
    /// Containers in discovery order
    pub containers: Vec<Container>,
    /// Task metadata, only present in metadata mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    /// Service metadata, only present in metadata mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Service>>,
}

/// A container running inside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    /// Image digest, absent for some runtime configurations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub task_arn: String,
    pub cluster_arn: String,
}

/// Descriptive metadata for a running task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub arn: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Descriptive metadata for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub arn: String,
    pub name: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub task_definition_arn: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Current time formatted for `Report::timestamp` (e.g. `2024-01-02T15:04:05Z`)
pub fn report_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Extract the cluster name from a cluster ARN
///
/// `arn:aws:ecs:us-east-1:123456789012:cluster/prod` yields `prod`. Input without a
/// `/` is returned unchanged so plain cluster names pass through.
pub fn cluster_name_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn sample_report() -> Report {
        Report {
            timestamp: "2024-03-01T10:20:30Z".to_string(),
            cluster_name: "prod".to_string(),
            cluster_arn: "arn:aws:ecs:us-east-1:123456789012:cluster/prod".to_string(),
            containers: vec![
                Container {
                    name: "web".to_string(),
                    image: "nginx:1.25".to_string(),
                    digest: Some("sha256:abc".to_string()),
                    task_arn: "arn:aws:ecs:us-east-1:123456789012:task/prod/1".to_string(),
                    cluster_arn: "arn:aws:ecs:us-east-1:123456789012:cluster/prod".to_string(),
                },
                Container {
                    name: "sidecar".to_string(),
                    image: "envoy<dev>&co".to_string(),
                    digest: None,
                    task_arn: "arn:aws:ecs:us-east-1:123456789012:task/prod/1".to_string(),
                    cluster_arn: "arn:aws:ecs:us-east-1:123456789012:cluster/prod".to_string(),
                },
            ],
            tasks: None,
            services: None,
        }
    }

    #[test]
    fn test_report_json_field_names() {
        let value = serde_json::to_value(sample_report()).unwrap();

        assert_eq!(value["timestamp"], "2024-03-01T10:20:30Z");
        assert_eq!(value["clusterName"], "prod");
        assert_eq!(value["containers"][0]["name"], "web");
        assert_eq!(value["containers"][0]["image"], "nginx:1.25");
        assert_eq!(value["containers"][0]["digest"], "sha256:abc");
        assert!(value["containers"][1].get("digest").is_none());
        assert!(value.get("tasks").is_none());
        assert!(value.get("services").is_none());
    }

    #[test]
    fn test_report_round_trip_keeps_absent_and_empty_apart() {
        let absent = sample_report();
        let mut empty = sample_report();
        empty.tasks = Some(vec![]);
        empty.services = Some(vec![Service {
            arn: "arn:aws:ecs:us-east-1:123456789012:service/prod/api".to_string(),
            name: "api".to_string(),
            desired_count: 3,
            running_count: 2,
            task_definition_arn: "arn:aws:ecs:us-east-1:123456789012:task-definition/api:7"
                .to_string(),
            tags: BTreeMap::from([("team".to_string(), "core".to_string())]),
        }]);

        for report in [absent, empty] {
            let json = serde_json::to_string(&report).unwrap();
            let decoded: Report = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded, report);
        }
    }

    #[test]
    fn test_report_timestamp_format() {
        let ts = report_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(!ts.contains('.'));
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_cluster_name_from_arn() {
        assert_eq!(
            cluster_name_from_arn("arn:aws:ecs:us-east-1:123456789012:cluster/prod"),
            "prod"
        );
        assert_eq!(cluster_name_from_arn("staging"), "staging");
    }
}
