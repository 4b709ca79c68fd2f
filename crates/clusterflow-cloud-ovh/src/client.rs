//! OVHcloud API client
//!
//! Thin JSON client for the OVHcloud REST API. Requests are authenticated
//! with an OAuth2 access token sent as a Bearer header.

use crate::error::{OvhError, Result};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const OVH_API_BASE: &str = "https://eu.api.ovh.com/1.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Known endpoint aliases
const ENDPOINTS: &[(&str, &str)] = &[
    ("ovh-eu", "https://eu.api.ovh.com/1.0"),
    ("ovh-ca", "https://ca.api.ovh.com/1.0"),
    ("ovh-us", "https://api.us.ovhcloud.com/1.0"),
    ("kimsufi-eu", "https://eu.api.kimsufi.com/1.0"),
    ("kimsufi-ca", "https://ca.api.kimsufi.com/1.0"),
    ("soyoustart-eu", "https://eu.api.soyoustart.com/1.0"),
    ("soyoustart-ca", "https://ca.api.soyoustart.com/1.0"),
];

/// Resolve an endpoint alias (`ovh-eu`) or pass a URL through
pub fn resolve_endpoint(endpoint: &str) -> Result<String> {
    if let Some((_, url)) = ENDPOINTS.iter().find(|(alias, _)| *alias == endpoint) {
        return Ok((*url).to_string());
    }
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }
    Err(OvhError::InvalidConfig(format!(
        "unknown endpoint {:?}: expected one of {} or an http(s) URL",
        endpoint,
        ENDPOINTS
            .iter()
            .map(|(alias, _)| *alias)
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub token: SecretString,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self {
            endpoint: endpoint.into(),
            token: SecretString::new(token.into()),
        }
    }
}

/// OVHcloud API client
#[derive(Clone)]
pub struct OvhClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl OvhClient {
    /// Create a new API client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = resolve_endpoint(&config.endpoint)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("clusterflow/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
        })
    }

    /// Get the resolved base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.execute::<()>(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST `body` to `path` and decode the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.execute(Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// PUT `body` to `path`, ignoring the response body
    pub async fn put<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(Method::PUT, path, Some(body)).await?;
        Ok(())
    }

    /// DELETE `path`, ignoring the response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|e| e.message)
                .unwrap_or_else(|_| {
                    if text.trim().is_empty() {
                        status.canonical_reason().unwrap_or("unknown error").to_string()
                    } else {
                        text.clone()
                    }
                });
            tracing::debug!("{} {} -> {}: {}", method, url, status, message);
            return Err(OvhError::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }
}

impl std::fmt::Debug for OvhClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvhClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
