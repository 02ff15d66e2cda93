//! Read-only access to the ECS orchestration API
//!
//! The inventory pipeline talks to ECS only through the [`EcsApi`] trait so the
//! fan-out logic can be exercised against an in-memory implementation.

mod aws;

pub use aws::AwsEcsClient;

pub use async_trait::async_trait;

/// Errors returned by the orchestration API
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// Credentials could not be resolved, or ECS rejected them
    #[error("invalid AWS credentials: {0}")]
    Credentials(String),
    /// A list or describe call failed
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

/// Full description of a task as returned by `DescribeTasks`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDetail {
    pub arn: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub containers: Vec<ContainerDetail>,
    pub tags: Vec<(String, String)>,
}

/// A container embedded in a task description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetail {
    pub name: String,
    pub image: String,
    pub image_digest: Option<String>,
}

/// Full description of a service as returned by `DescribeServices`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDetail {
    pub arn: String,
    pub name: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub task_definition_arn: String,
    pub tags: Vec<(String, String)>,
}

/// Paged list and batched describe operations over ECS
///
/// List operations return every page concatenated. Describe operations take
/// any number of identifiers and batch them as the backend allows.
#[async_trait]
pub trait EcsApi: Send + Sync {
    /// Verify that credentials resolve before any work starts
    async fn check_credentials(&self) -> Result<(), EcsError>;

    /// List the ARNs of all clusters visible to the session
    async fn list_clusters(&self) -> Result<Vec<String>, EcsError>;

    /// List the ARNs of running tasks in a cluster
    async fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, EcsError>;

    /// Describe tasks, including their containers
    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskDetail>, EcsError>;

    /// List the ARNs of services in a cluster
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, EcsError>;

    /// Describe services
    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceDetail>, EcsError>;
}
