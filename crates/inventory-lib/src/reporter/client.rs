//! HTTP client for delivering reports to Anchore

use crate::connection::AnchoreInfo;
use crate::models::Report;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Path of the inventory endpoint, appended to the configured base URL
pub const REPORT_API_PATH: &str = "v1/enterprise/ecs-inventory";

/// Header carrying the Anchore account the report belongs to
pub const ACCOUNT_HEADER: &str = "x-anchore-account";

/// Errors returned when delivering a report
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("invalid Anchore URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to serialize report as JSON: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to report data to Anchore, check credentials")]
    Unauthorized,
    #[error("failed to report data to Anchore: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to report data to Anchore: HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Build the delivery URL from the configured base
///
/// The path is appended verbatim; a trailing slash on the base is kept, so
/// `https://ancho.re/` becomes `https://ancho.re//v1/enterprise/ecs-inventory`.
pub fn build_url(base: &str) -> Result<String, DeliveryError> {
    Url::parse(base).map_err(|source| DeliveryError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;

    Ok(format!("{base}/{REPORT_API_PATH}"))
}

/// Posts inventory reports to the Anchore endpoint
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    account: String,
}

impl DeliveryClient {
    /// Create a client for the given delivery target
    ///
    /// When `http.insecure` is set, server certificates are not verified. The
    /// target URL is checked on each delivery, so a malformed URL fails the
    /// post rather than client creation.
    pub fn new(target: &AnchoreInfo) -> Result<Self, DeliveryError> {
        let mut builder = Client::builder().danger_accept_invalid_certs(target.http.insecure);
        if target.http.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(target.http.timeout_seconds));
        }
        let client = builder.build().map_err(DeliveryError::Client)?;

        Ok(Self {
            client,
            base_url: target.url.clone(),
            user: target.user.clone(),
            password: target.password.clone(),
            account: target.account.clone(),
        })
    }

    /// Post a report; any 2xx response counts as success
    pub async fn post(&self, report: &Report) -> Result<(), DeliveryError> {
        let start = Instant::now();
        info!(
            account = %self.account,
            cluster = %report.cluster_arn,
            "Reporting results to Anchore"
        );

        let url = build_url(&self.base_url)?;
        let body = serde_json::to_vec(report).map_err(DeliveryError::Serialize)?;

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCOUNT_HEADER, &self.account)
            .body(body)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DeliveryError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            account = %self.account,
            cluster = %report.cluster_arn,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Successfully reported results to Anchore"
        );
        Ok(())
    }
}
