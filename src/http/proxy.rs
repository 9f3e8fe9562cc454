//! `POST /proxy` handler.
//!
//! # Data Flow
//! ```text
//! JSON body {method, url, headers?, payload?}
//!     → ProxyRequest (lenient deserialize)
//!     → RelayCall (validated: method, url, HeaderMap)
//!     → DownstreamClient::{get,post,put,delete}
//!     → downstream status (or 500) + data / error
//! ```

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::http::client::{DownstreamResponse, ProxyMethod};
use crate::http::error::RelayError;
use crate::http::server::AppState;
use crate::net::headers;

/// Relay request as posted by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// A validated relay call, ready for the downstream client.
#[derive(Debug, Clone)]
pub struct RelayCall {
    pub method: ProxyMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub payload: Value,
}

impl TryFrom<ProxyRequest> for RelayCall {
    type Error = RelayError;

    fn try_from(request: ProxyRequest) -> Result<Self, Self::Error> {
        let method = request.method.filter(|m| !m.is_empty());
        let url = request.url.filter(|u| !u.is_empty());
        let (Some(method), Some(url)) = (method, url) else {
            return Err(RelayError::BadParams);
        };

        let method: ProxyMethod = method.parse()?;

        let raw_headers = request
            .headers
            .as_ref()
            .map(headers::stringify)
            .unwrap_or_default();
        let mut headers = HeaderMap::with_capacity(raw_headers.len());
        for (name, value) in raw_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RelayError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|_| RelayError::InvalidHeader(name))?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            method,
            url,
            headers,
            payload: request
                .payload
                .unwrap_or_else(|| Value::Object(Default::default())),
        })
    }
}

/// Relay one request to the caller-supplied URL.
pub async fn proxy_handler(
    State(state): State<AppState>,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return rejection.into_response();
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable relay request");
            return RelayError::BadParams.into_response();
        }
    };

    tracing::info!(
        method = request.method.as_deref().unwrap_or(""),
        url = request.url.as_deref().unwrap_or(""),
        "Relay request"
    );

    let call = match RelayCall::try_from(request) {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected relay request");
            return e.into_response();
        }
    };

    let client = &state.client;
    let response = match call.method {
        ProxyMethod::Get => client.get(&call.url, call.headers, &call.payload).await,
        ProxyMethod::Post => client.post(&call.url, call.headers, &call.payload).await,
        ProxyMethod::Put => client.put(&call.url, call.headers, &call.payload).await,
        ProxyMethod::Delete => client.delete(&call.url, call.headers, &call.payload).await,
    };

    mirror(response)
}

/// Turn a downstream outcome into the caller's response. Strings go out as
/// plain text and `null` as an empty body; everything else as JSON.
fn mirror(response: DownstreamResponse) -> Response {
    let status = response.status_code();
    match response.into_body() {
        Value::Null => status.into_response(),
        Value::String(text) => (status, text).into_response(),
        body => (status, Json(body)).into_response(),
    }
}
