//! Delivery target for inventory reports

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "******";

/// Default Anchore account used for the tenant header
pub const DEFAULT_ACCOUNT: &str = "admin";

/// Default HTTP timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Connection details for posting reports to Anchore
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchoreInfo {
    pub url: String,
    pub user: String,
    pub password: String,
    pub account: String,
    pub http: HttpConfig,
}

/// Settings for the HTTP client itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Request timeout, 0 disables the timeout
    #[serde(alias = "timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for AnchoreInfo {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            account: DEFAULT_ACCOUNT.to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl AnchoreInfo {
    /// Whether enough details are present to attempt delivery
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && !self.user.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for AnchoreInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { REDACTED };
        f.debug_struct("AnchoreInfo")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &password)
            .field("account", &self.account)
            .field("http", &self.http)
            .finish()
    }
}
