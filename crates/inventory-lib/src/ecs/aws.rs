//! `EcsApi` backed by the AWS SDK

use super::{async_trait, ContainerDetail, EcsApi, EcsError, ServiceDetail, TaskDetail};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ecs::types::{DesiredStatus, Failure, ServiceField, Tag, TaskField};
use aws_sdk_ecs::Client;
use tracing::{debug, warn};

/// Maximum number of tasks accepted by a single `DescribeTasks` call
const DESCRIBE_TASKS_BATCH: usize = 100;

/// Maximum number of services accepted by a single `DescribeServices` call
const DESCRIBE_SERVICES_BATCH: usize = 10;

/// Service error codes meaning the caller's keys were rejected
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "AccessDeniedException",
];

/// ECS client for one account/region
///
/// The underlying SDK client is cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct AwsEcsClient {
    client: Client,
    sdk_config: SdkConfig,
}

impl AwsEcsClient {
    /// Load the shared AWS configuration, optionally overriding the region
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region.filter(|r| !r.is_empty()) {
            loader = loader.region(Region::new(region));
        }

        let sdk_config = loader.load().await;
        debug!(region = ?sdk_config.region(), "Loaded AWS configuration");

        Self::from_conf(sdk_config)
    }

    /// Create a client from an already loaded AWS configuration
    pub fn from_conf(sdk_config: SdkConfig) -> Self {
        Self {
            client: Client::new(&sdk_config),
            sdk_config,
        }
    }

    /// Region the client talks to, if one was resolved
    pub fn region(&self) -> Option<&str> {
        self.sdk_config.region().map(|r| r.as_ref())
    }
}

fn is_credential_error(code: Option<&str>) -> bool {
    code.is_some_and(|code| CREDENTIAL_ERROR_CODES.contains(&code))
}

fn api_error<E>(operation: &'static str, err: E) -> EcsError
where
    E: std::error::Error + ProvideErrorMetadata,
{
    let rejected = is_credential_error(err.code());
    let message = DisplayErrorContext(err).to_string();

    if rejected {
        EcsError::Credentials(format!("{operation} rejected the credentials: {message}"))
    } else {
        EcsError::Api { operation, message }
    }
}

fn tag_pairs(tags: &[Tag]) -> Vec<(String, String)> {
    tags.iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect()
}

fn log_failures(operation: &'static str, cluster: &str, failures: &[Failure]) {
    for failure in failures {
        warn!(
            cluster = %cluster,
            operation,
            arn = failure.arn().unwrap_or_default(),
            reason = failure.reason().unwrap_or_default(),
            "ECS reported a failure for a described resource"
        );
    }
}

#[async_trait]
impl EcsApi for AwsEcsClient {
    async fn check_credentials(&self) -> Result<(), EcsError> {
        let provider = self
            .sdk_config
            .credentials_provider()
            .ok_or_else(|| EcsError::Credentials("no credentials provider configured".into()))?;

        provider
            .provide_credentials()
            .await
            .map_err(|e| EcsError::Credentials(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }

    async fn list_clusters(&self) -> Result<Vec<String>, EcsError> {
        let mut clusters = Vec::new();
        let mut next_token = None;

        loop {
            let resp = self
                .client
                .list_clusters()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("ListClusters", e))?;

            clusters.extend(resp.cluster_arns().iter().cloned());

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(clusters)
    }

    async fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, EcsError> {
        let mut tasks = Vec::new();
        let mut next_token = None;

        loop {
            let resp = self
                .client
                .list_tasks()
                .cluster(cluster)
                .desired_status(DesiredStatus::Running)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("ListTasks", e))?;

            tasks.extend(resp.task_arns().iter().cloned());

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(tasks)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskDetail>, EcsError> {
        let mut details = Vec::with_capacity(tasks.len());

        for batch in tasks.chunks(DESCRIBE_TASKS_BATCH) {
            let resp = self
                .client
                .describe_tasks()
                .cluster(cluster)
                .set_tasks(Some(batch.to_vec()))
                .include(TaskField::Tags)
                .send()
                .await
                .map_err(|e| api_error("DescribeTasks", e))?;

            log_failures("DescribeTasks", cluster, resp.failures());

            details.extend(resp.tasks().iter().map(|task| TaskDetail {
                arn: task.task_arn().unwrap_or_default().to_string(),
                cluster_arn: task.cluster_arn().unwrap_or(cluster).to_string(),
                task_definition_arn: task.task_definition_arn().unwrap_or_default().to_string(),
                containers: task
                    .containers()
                    .iter()
                    .map(|c| ContainerDetail {
                        name: c.name().unwrap_or_default().to_string(),
                        image: c.image().unwrap_or_default().to_string(),
                        image_digest: c.image_digest().map(str::to_string),
                    })
                    .collect(),
                tags: tag_pairs(task.tags()),
            }));
        }

        Ok(details)
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, EcsError> {
        let mut services = Vec::new();
        let mut next_token = None;

        loop {
            let resp = self
                .client
                .list_services()
                .cluster(cluster)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error("ListServices", e))?;

            services.extend(resp.service_arns().iter().cloned());

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(services)
    }

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> Result<Vec<ServiceDetail>, EcsError> {
        let mut details = Vec::with_capacity(services.len());

        for batch in services.chunks(DESCRIBE_SERVICES_BATCH) {
            let resp = self
                .client
                .describe_services()
                .cluster(cluster)
                .set_services(Some(batch.to_vec()))
                .include(ServiceField::Tags)
                .send()
                .await
                .map_err(|e| api_error("DescribeServices", e))?;

            log_failures("DescribeServices", cluster, resp.failures());

            details.extend(resp.services().iter().map(|s| ServiceDetail {
                arn: s.service_arn().unwrap_or_default().to_string(),
                name: s.service_name().unwrap_or_default().to_string(),
                desired_count: s.desired_count(),
                running_count: s.running_count(),
                task_definition_arn: s.task_definition().unwrap_or_default().to_string(),
                tags: tag_pairs(s.tags()),
            }));
        }

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{InventoryCollectorBuilder, InventoryError};
    use crate::reporter::{DispatchOptions, ReportDispatcher};
    use aws_config::retry::RetryConfig;
    use aws_credential_types::Credentials;
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;
    use std::sync::Arc;

    const CLUSTER: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/prod";
    const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";

    async fn client(server: &ServerGuard) -> AwsEcsClient {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
            .endpoint_url(server.url())
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        AwsEcsClient::from_conf(sdk_config)
    }

    fn ecs_call(server: &mut ServerGuard, operation: &str) -> Mock {
        server
            .mock("POST", "/")
            .match_header("x-amz-target", format!("{TARGET_PREFIX}.{operation}").as_str())
    }

    fn json_reply(mock: Mock, body: serde_json::Value) -> Mock {
        mock.with_status(200)
            .with_header("content-type", "application/x-amz-json-1.1")
            .with_body(body.to_string())
    }

    fn task_arns(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("arn:aws:ecs:us-east-1:123456789012:task/prod/{i:03}"))
            .collect()
    }

    async fn reject_list_clusters(server: &mut ServerGuard, code: &str) -> Mock {
        ecs_call(server, "ListClusters")
            .with_status(400)
            .with_header("content-type", "application/x-amz-json-1.1")
            .with_header("x-amzn-errortype", code)
            .with_body(json!({"__type": code, "message": "request rejected"}).to_string())
            .create_async()
            .await
    }

    #[test]
    fn test_credential_error_codes() {
        assert!(is_credential_error(Some("UnrecognizedClientException")));
        assert!(is_credential_error(Some("ExpiredTokenException")));
        assert!(is_credential_error(Some("AccessDeniedException")));
        assert!(!is_credential_error(Some("ClusterNotFoundException")));
        assert!(!is_credential_error(None));
    }

    #[tokio::test]
    async fn test_list_clusters_concatenates_pages() {
        let mut server = mockito::Server::new_async().await;
        // first page: the request carries no nextToken
        let first = json_reply(
            ecs_call(&mut server, "ListClusters").match_body(Matcher::Regex("^[^N]*$".into())),
            json!({"clusterArns": ["arn:c/a", "arn:c/b"], "nextToken": "page-2"}),
        )
        .create_async()
        .await;
        let second = json_reply(
            ecs_call(&mut server, "ListClusters")
                .match_body(Matcher::PartialJson(json!({"nextToken": "page-2"}))),
            json!({"clusterArns": ["arn:c/c"]}),
        )
        .create_async()
        .await;

        let clusters = client(&server).await.list_clusters().await.unwrap();

        assert_eq!(clusters, vec!["arn:c/a", "arn:c/b", "arn:c/c"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_tasks_only_asks_for_running_tasks() {
        let mut server = mockito::Server::new_async().await;
        let mock = json_reply(
            ecs_call(&mut server, "ListTasks").match_body(Matcher::PartialJson(
                json!({"cluster": CLUSTER, "desiredStatus": "RUNNING"}),
            )),
            json!({"taskArns": task_arns(150)}),
        )
        .create_async()
        .await;

        let tasks = client(&server).await.list_tasks(CLUSTER).await.unwrap();

        assert_eq!(tasks.len(), 150);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_describe_tasks_batches_by_one_hundred() {
        let mut server = mockito::Server::new_async().await;
        let first_batch = json_reply(
            ecs_call(&mut server, "DescribeTasks").match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"cluster": CLUSTER, "include": ["TAGS"]})),
                Matcher::Regex(r#"task/prod/099""#.into()),
            ])),
            json!({
                "tasks": [{
                    "taskArn": "arn:aws:ecs:us-east-1:123456789012:task/prod/000",
                    "clusterArn": CLUSTER,
                    "taskDefinitionArn": "arn:aws:ecs:us-east-1:123456789012:task-definition/web:3",
                    "containers": [
                        {"name": "web", "image": "nginx:1.25", "imageDigest": "sha256:0123"},
                        {"name": "sidecar", "image": "envoy:1.28"}
                    ],
                    "tags": [{"key": "team", "value": "payments"}]
                }],
                "failures": []
            }),
        )
        .expect(1)
        .create_async()
        .await;
        let second_batch = json_reply(
            ecs_call(&mut server, "DescribeTasks")
                .match_body(Matcher::Regex(r#"task/prod/149""#.into())),
            json!({
                "tasks": [{
                    "taskArn": "arn:aws:ecs:us-east-1:123456789012:task/prod/149",
                    "containers": [{"name": "worker", "image": "worker:7"}]
                }],
                "failures": [{
                    "arn": "arn:aws:ecs:us-east-1:123456789012:task/prod/148",
                    "reason": "MISSING"
                }]
            }),
        )
        .expect(1)
        .create_async()
        .await;

        let details = client(&server)
            .await
            .describe_tasks(CLUSTER, &task_arns(150))
            .await
            .unwrap();

        first_batch.assert_async().await;
        second_batch.assert_async().await;

        assert_eq!(details.len(), 2);
        assert_eq!(
            details[0].containers[0],
            ContainerDetail {
                name: "web".to_string(),
                image: "nginx:1.25".to_string(),
                image_digest: Some("sha256:0123".to_string()),
            }
        );
        assert_eq!(details[0].containers[1].image_digest, None);
        assert_eq!(
            details[0].tags,
            vec![("team".to_string(), "payments".to_string())]
        );
        // cluster falls back to the one that was asked for
        assert_eq!(details[1].cluster_arn, CLUSTER);
        assert_eq!(details[1].containers[0].image, "worker:7");
    }

    #[tokio::test]
    async fn test_describe_services_batches_by_ten() {
        let mut server = mockito::Server::new_async().await;
        let mock = json_reply(
            ecs_call(&mut server, "DescribeServices")
                .match_body(Matcher::PartialJson(json!({"cluster": CLUSTER, "include": ["TAGS"]}))),
            json!({
                "services": [{
                    "serviceArn": "arn:aws:ecs:us-east-1:123456789012:service/prod/web",
                    "serviceName": "web",
                    "desiredCount": 3,
                    "runningCount": 2,
                    "taskDefinition": "arn:aws:ecs:us-east-1:123456789012:task-definition/web:3"
                }],
                "failures": []
            }),
        )
        .expect(2)
        .create_async()
        .await;

        let services: Vec<String> = (0..12)
            .map(|i| format!("arn:aws:ecs:us-east-1:123456789012:service/prod/svc-{i}"))
            .collect();
        let details = client(&server)
            .await
            .describe_services(CLUSTER, &services)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].name, "web");
        assert_eq!(details[0].desired_count, 3);
        assert_eq!(details[0].running_count, 2);
        assert!(details[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_describe_with_no_identifiers_makes_no_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = ecs_call(&mut server, "DescribeTasks")
            .expect(0)
            .create_async()
            .await;

        let client = client(&server).await;
        assert_eq!(client.region(), Some("us-east-1"));

        let details = client.describe_tasks(CLUSTER, &[]).await.unwrap();

        assert!(details.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_keys_are_a_credential_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = reject_list_clusters(&mut server, "UnrecognizedClientException").await;

        let err = client(&server).await.list_clusters().await.unwrap_err();

        assert!(matches!(err, EcsError::Credentials(_)), "unexpected error: {err:?}");
        assert!(err.to_string().contains("UnrecognizedClientException"));
    }

    #[tokio::test]
    async fn test_other_service_errors_are_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = reject_list_clusters(&mut server, "InvalidParameterException").await;

        let err = client(&server).await.list_clusters().await.unwrap_err();

        assert!(
            matches!(err, EcsError::Api { operation: "ListClusters", .. }),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_run_with_rejected_keys_fails_on_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _mock = reject_list_clusters(&mut server, "UnrecognizedClientException").await;

        let options = DispatchOptions {
            quiet: true,
            dry_run: true,
        };
        let collector = InventoryCollectorBuilder::new()
            .api(Arc::new(client(&server).await))
            .dispatcher(Arc::new(ReportDispatcher::new(options, None)))
            .build()
            .unwrap();

        let err = collector.run().await.unwrap_err();

        assert!(matches!(err, InventoryError::Credentials(_)), "unexpected error: {err:?}");
    }
}
