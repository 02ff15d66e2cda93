//! Per-cluster reads against the orchestration API

use crate::ecs::{EcsApi, EcsError, ServiceDetail, TaskDetail};
use crate::models::{Container, Service, Task};
use tracing::{debug, info};

/// Everything read from one cluster, ready for assembly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterInventory {
    pub cluster_arn: String,
    /// Containers of all running tasks, in discovery order
    pub containers: Vec<Container>,
    /// Task metadata; `Some` only in metadata mode with at least one task
    pub tasks: Option<Vec<Task>>,
    /// Service metadata; `Some` in metadata mode, possibly empty
    pub services: Option<Vec<Service>>,
}

/// Read the inventory of a single cluster
///
/// The task description read and the service reads are independent and run
/// concurrently. Any failure fails the whole cluster.
pub async fn fetch_cluster(
    api: &dyn EcsApi,
    cluster: &str,
    metadata: bool,
) -> Result<ClusterInventory, EcsError> {
    debug!(cluster = %cluster, "Found cluster");

    let task_arns = api.list_tasks(cluster).await?;

    let (task_details, services) = tokio::try_join!(
        describe_tasks(api, cluster, &task_arns),
        fetch_services(api, cluster, metadata),
    )?;

    let containers = flatten_containers(cluster, &task_details);
    if !task_arns.is_empty() {
        info!(
            cluster = %cluster,
            container_count = containers.len(),
            "Found containers in cluster"
        );
    }

    let tasks = (metadata && !task_arns.is_empty()).then(|| task_metadata(cluster, task_details));

    Ok(ClusterInventory {
        cluster_arn: cluster.to_string(),
        containers,
        tasks,
        services,
    })
}

async fn describe_tasks(
    api: &dyn EcsApi,
    cluster: &str,
    task_arns: &[String],
) -> Result<Vec<TaskDetail>, EcsError> {
    if task_arns.is_empty() {
        debug!(cluster = %cluster, "No tasks found in cluster");
        return Ok(Vec::new());
    }

    debug!(cluster = %cluster, task_count = task_arns.len(), "Found tasks in cluster");
    api.describe_tasks(cluster, task_arns).await
}

async fn fetch_services(
    api: &dyn EcsApi,
    cluster: &str,
    metadata: bool,
) -> Result<Option<Vec<Service>>, EcsError> {
    if !metadata {
        return Ok(None);
    }

    let service_arns = api.list_services(cluster).await?;
    if service_arns.is_empty() {
        debug!(cluster = %cluster, "No services found in cluster");
        return Ok(Some(Vec::new()));
    }

    let details = api.describe_services(cluster, &service_arns).await?;
    Ok(Some(details.into_iter().map(service_metadata).collect()))
}

/// Flatten every task's containers, attaching the owning task and cluster
fn flatten_containers(cluster: &str, tasks: &[TaskDetail]) -> Vec<Container> {
    tasks
        .iter()
        .flat_map(|task| {
            let cluster_arn = if task.cluster_arn.is_empty() {
                cluster
            } else {
                task.cluster_arn.as_str()
            };

            task.containers.iter().map(move |c| Container {
                name: c.name.clone(),
                image: c.image.clone(),
                digest: c.image_digest.clone(),
                task_arn: task.arn.clone(),
                cluster_arn: cluster_arn.to_string(),
            })
        })
        .collect()
}

fn task_metadata(cluster: &str, tasks: Vec<TaskDetail>) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|task| Task {
            cluster_arn: if task.cluster_arn.is_empty() {
                cluster.to_string()
            } else {
                task.cluster_arn
            },
            arn: task.arn,
            task_definition_arn: task.task_definition_arn,
            tags: task.tags.into_iter().collect(),
        })
        .collect()
}

fn service_metadata(service: ServiceDetail) -> Service {
    Service {
        arn: service.arn,
        name: service.name,
        desired_count: service.desired_count,
        running_count: service.running_count,
        task_definition_arn: service.task_definition_arn,
        tags: service.tags.into_iter().collect(),
    }
}
