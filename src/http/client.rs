//! Downstream HTTP client.
//!
//! A thin wrapper over a shared `reqwest::Client`. Headers travel with each
//! call, so concurrent relays never see each other's headers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::http::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::error::RelayError;

/// Methods the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ProxyMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            ProxyMethod::Get => reqwest::Method::GET,
            ProxyMethod::Post => reqwest::Method::POST,
            ProxyMethod::Put => reqwest::Method::PUT,
            ProxyMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// GET and DELETE carry the payload as query parameters.
    fn payload_in_query(self) -> bool {
        matches!(self, ProxyMethod::Get | ProxyMethod::Delete)
    }
}

impl FromStr for ProxyMethod {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(ProxyMethod::Get),
            "POST" => Ok(ProxyMethod::Post),
            "PUT" => Ok(ProxyMethod::Put),
            "DELETE" => Ok(ProxyMethod::Delete),
            other => Err(RelayError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// Outcome of a downstream call.
///
/// `status` is absent when the call never produced a response (connect
/// failure, timeout, bad URL). 2xx bodies land in `data`, everything else in
/// `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownstreamResponse {
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub error: Option<Value>,
}

impl DownstreamResponse {
    /// Status to mirror back; 500 when the downstream reported none.
    pub fn status_code(&self) -> StatusCode {
        self.status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Body to mirror back: `data`, else `error`, else `null`.
    pub fn into_body(self) -> Value {
        self.data.or(self.error).unwrap_or(Value::Null)
    }

    fn failed(status: Option<StatusCode>, err: &reqwest::Error) -> Self {
        Self {
            status: status.map(|s| s.as_u16()),
            data: None,
            error: Some(json!({ "message": err.to_string() })),
        }
    }
}

/// Shared downstream client.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    inner: reqwest::Client,
}

impl DownstreamClient {
    /// Build a client, optionally bounding every call by `timeout`.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            inner: builder.build()?,
        })
    }

    pub async fn get(&self, url: &str, headers: HeaderMap, payload: &Value) -> DownstreamResponse {
        self.send(ProxyMethod::Get, url, headers, payload).await
    }

    pub async fn post(&self, url: &str, headers: HeaderMap, payload: &Value) -> DownstreamResponse {
        self.send(ProxyMethod::Post, url, headers, payload).await
    }

    pub async fn put(&self, url: &str, headers: HeaderMap, payload: &Value) -> DownstreamResponse {
        self.send(ProxyMethod::Put, url, headers, payload).await
    }

    pub async fn delete(&self, url: &str, headers: HeaderMap, payload: &Value) -> DownstreamResponse {
        self.send(ProxyMethod::Delete, url, headers, payload).await
    }

    /// Issue one downstream call. Never fails; failures are folded into
    /// the returned `DownstreamResponse`.
    pub async fn send(
        &self,
        method: ProxyMethod,
        url: &str,
        headers: HeaderMap,
        payload: &Value,
    ) -> DownstreamResponse {
        let mut request = self.inner.request(method.as_reqwest(), url).headers(headers);

        if method.payload_in_query() {
            let pairs = query_pairs(payload);
            if !pairs.is_empty() {
                request = request.query(&pairs);
            }
        } else {
            request = request.json(payload);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %method, url = %url, error = %e, "Downstream request failed");
                return DownstreamResponse::failed(e.status(), &e);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(bytes) => decode_body(&bytes),
            Err(e) => {
                tracing::warn!(method = %method, url = %url, error = %e, "Failed to read downstream body");
                return DownstreamResponse::failed(Some(status), &e);
            }
        };

        tracing::debug!(method = %method, url = %url, status = status.as_u16(), "Downstream responded");

        if status.is_success() {
            DownstreamResponse {
                status: Some(status.as_u16()),
                data: Some(body),
                error: None,
            }
        } else {
            DownstreamResponse {
                status: Some(status.as_u16()),
                data: None,
                error: Some(body),
            }
        }
    }
}

/// Flatten an object payload into query pairs. Strings pass through, nulls
/// are skipped, anything else is JSON-encoded.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };

    object
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// JSON when the body parses as JSON, a JSON string otherwise, `null` when empty.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
