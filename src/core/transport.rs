//! HTTP Session (C1): a cookie-jar-backed request executor with per-response
//! error classification.
//!
//! [`Transport`] is the collaborator seam for JSON request/response traffic
//! (login, validate, list, delete). Streaming media bytes is a separate
//! concern, owned by the `Downloader` collaborator in
//! [`crate::core::download`], since tests fake the two independently.

use crate::core::cookie_jar::CookieJar;
use crate::core::error::{ApiError, SessionError, TransportError};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A single JSON request to execute against the provider.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub json_body: Option<Value>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            json_body: None,
        }
    }

    pub fn post(url: impl Into<String>, json_body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            json_body: Some(json_body),
        }
    }
}

/// The result of a completed request: status plus a best-effort JSON parse
/// of the body (media endpoints never flow through this trait).
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status_code: u16,
    pub json: Option<Value>,
    /// Response headers relevant to session-token extraction, lowercased keys.
    pub headers: HashMap<String, String>,
    /// Raw `Set-Cookie` lines, in order, for jar persistence.
    pub set_cookies: Vec<String>,
}

impl TransportResponse {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

impl TransportResponse {
    /// Examines the parsed body for the provider's error envelope and turns
    /// a non-success status (or a recognized error shape) into an [`ApiError`].
    pub fn classify(&self) -> Option<ApiError> {
        let reason = self
            .json
            .as_ref()
            .and_then(|v| v.get("errorMessage").or_else(|| v.get("reason")))
            .and_then(Value::as_str)
            .map(str::to_string);

        let code = self
            .json
            .as_ref()
            .and_then(|v| v.get("errorCode").or_else(|| v.get("code")))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        if self.status().is_success() && reason.is_none() && code.is_none() {
            return None;
        }

        Some(ApiError {
            reason: reason.unwrap_or_else(|| format!("HTTP {}", self.status())),
            code,
        })
    }
}

/// Collaborator interface for JSON request execution.
///
/// Real traffic goes through [`HttpTransport`]; tests substitute a fake that
/// returns canned [`TransportResponse`]s or errors per URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, SessionError>;
}

/// Production transport: a `reqwest::Client` backed by a persistent cookie
/// jar, with connect/read timeouts.
pub struct HttpTransport {
    client: reqwest::Client,
    jar: Arc<CookieJar>,
}

impl HttpTransport {
    pub fn new(jar: Arc<CookieJar>) -> anyhow::Result<Self> {
        Self::with_timeout(jar, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(jar: Arc<CookieJar>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar.store())
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, jar })
    }

    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, SessionError> {
        let mut builder = self.client.request(request.method, &request.url);
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError)?;
        let status_code = response.status().as_u16();

        let mut headers = HashMap::new();
        let mut set_cookies = Vec::new();
        for (name, value) in response.headers().iter() {
            if let Ok(value_str) = value.to_str() {
                if name.as_str().eq_ignore_ascii_case("set-cookie") {
                    set_cookies.push(value_str.to_string());
                } else {
                    headers.insert(name.as_str().to_ascii_lowercase(), value_str.to_string());
                }
            }
        }

        let bytes = response.bytes().await.map_err(TransportError)?;
        let json = serde_json::from_slice::<Value>(&bytes).ok();

        let transport_response = TransportResponse {
            status_code,
            json,
            headers,
            set_cookies,
        };

        if let Some(api_error) = transport_response.classify() {
            return Err(SessionError::Api(api_error));
        }

        Ok(transport_response)
    }
}
