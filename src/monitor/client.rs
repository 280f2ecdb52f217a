//! Zabbix JSON-RPC client
//!
//! API tokens travel in an `Authorization: Bearer` header on 6.4 and later,
//! and as the `auth` member of the request body on older servers. The server
//! version is read once when the client connects.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::model::{Problem, ProblemQuery};
use crate::config::ZabbixConfig;

/// Anything that can list open problems
#[async_trait]
pub trait ProblemSource: Send + Sync {
    async fn problems(&self, query: &ProblemQuery) -> Result<Vec<Problem>, MonitorError>;
}

/// Server API version, major and minor only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    /// First release that reads the token from the Authorization header
    pub const HEADER_AUTH: ApiVersion = ApiVersion { major: 6, minor: 4 };

    /// Parse an `apiinfo.version` result such as `6.0.21`
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some(Self { major, minor })
    }

    pub fn auth_mode(self) -> AuthMode {
        if self >= Self::HEADER_AUTH {
            AuthMode::Header
        } else {
            AuthMode::Body
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Where the API token goes on authenticated calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Header,
    Body,
}

/// JSON-RPC client for the Zabbix API
#[derive(Clone)]
pub struct ZabbixClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
    auth_mode: AuthMode,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

impl ZabbixClient {
    /// Create a client that assumes a 6.4+ server. Use [`ZabbixClient::connect`]
    /// to match the server's actual version.
    pub fn new(config: &ZabbixConfig) -> Result<Self, MonitorError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MonitorError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint_url(&config.url),
            token: config.token.clone(),
            auth_mode: AuthMode::Header,
        })
    }

    /// Create a client and pick the token placement from the server version
    pub async fn connect(config: &ZabbixConfig) -> Result<Self, MonitorError> {
        let client = Self::new(config)?;
        let version = client.api_version().await?;
        tracing::info!(version = %version, endpoint = %client.endpoint, "Connected to monitoring API");
        Ok(client.with_auth_mode(version.auth_mode()))
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the server for its API version. Sent without credentials.
    pub async fn api_version(&self) -> Result<ApiVersion, MonitorError> {
        let version: String = self
            .call("apiinfo.version", serde_json::json!({}), false)
            .await?;
        ApiVersion::parse(&version).ok_or_else(|| {
            MonitorError::Deserialization(format!("unrecognized API version {:?}", version))
        })
    }

    /// Verify the API token. Called once at startup so a bad token fails
    /// the process before any category runs.
    pub async fn check_authentication(&self) -> Result<(), MonitorError> {
        match self.auth_mode {
            AuthMode::Header => {
                let params = serde_json::json!({ "token": self.token });
                // Must be sent without credentials
                let _: serde_json::Value = self
                    .call("user.checkAuthentication", params, false)
                    .await?;
            }
            AuthMode::Body => {
                // Older servers only check session ids there, so make a cheap authenticated read
                let params = serde_json::json!({ "output": ["eventid"], "limit": 1 });
                let _: serde_json::Value = self.call("problem.get", params, true).await?;
            }
        }
        Ok(())
    }

    fn request(
        &self,
        method: &str,
        params: serde_json::Value,
        authenticated: bool,
    ) -> reqwest::RequestBuilder {
        let mut request = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let builder = self.http_client.post(&self.endpoint);
        match (authenticated, self.auth_mode) {
            (false, _) => builder.json(&request),
            (true, AuthMode::Header) => builder.bearer_auth(&self.token).json(&request),
            (true, AuthMode::Body) => {
                request["auth"] = serde_json::Value::String(self.token.clone());
                builder.json(&request)
            }
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        authenticated: bool,
    ) -> Result<T, MonitorError> {
        let response = self
            .request(method, params, authenticated)
            .send()
            .await
            .map_err(|e| MonitorError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::Status(response.status().as_u16()));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| MonitorError::Deserialization(e.to_string()))?;

        decode_response(method, body)
    }
}

#[async_trait]
impl ProblemSource for ZabbixClient {
    async fn problems(&self, query: &ProblemQuery) -> Result<Vec<Problem>, MonitorError> {
        let params = serde_json::to_value(query)
            .map_err(|e| MonitorError::Deserialization(e.to_string()))?;
        let problems: Vec<Problem> = self.call("problem.get", params, true).await?;

        tracing::debug!(
            groupids = ?query.groupids,
            severity = query.severities,
            count = problems.len(),
            "Fetched open problems"
        );

        Ok(problems)
    }
}

fn decode_response<T>(method: &str, body: RpcResponse<T>) -> Result<T, MonitorError> {
    if let Some(err) = body.error {
        return Err(MonitorError::Api {
            method: method.to_string(),
            code: err.code,
            message: if err.data.is_empty() {
                err.message
            } else {
                format!("{} {}", err.message, err.data)
            },
        });
    }

    body.result.ok_or_else(|| {
        MonitorError::Deserialization(format!("{} response has neither result nor error", method))
    })
}

/// Accepts either the frontend base URL or the full API path
fn endpoint_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("api_jsonrpc.php") {
        base.to_string()
    } else {
        format!("{}/api_jsonrpc.php", base)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Monitoring API returned status {0}")]
    Status(u16),

    #[error("{method} failed ({code}): {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
