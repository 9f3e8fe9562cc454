//! Client frame classification.
//!
//! Every frame from the local client is JSON. An object with a non-empty
//! string `url` asks for a new upstream; anything else is data for the
//! current upstream.

use std::collections::HashMap;

use serde_json::{json, Value};
use thiserror::Error;

use crate::net::headers;

/// What a client frame asks the relay to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Open (or replace) the upstream connection.
    Connect(ConnectFrame),
    /// Forward the frame verbatim.
    Data,
}

/// Target of a connect instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFrame {
    pub url: String,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connect frame headers must be an object")]
    InvalidHeaders,
}

/// Classify a raw client frame payload.
pub fn classify(payload: &[u8]) -> Result<ClientFrame, FrameError> {
    let value: Value = serde_json::from_slice(payload)?;

    let url = match value.get("url") {
        Some(Value::String(url)) if !url.is_empty() => url.clone(),
        _ => return Ok(ClientFrame::Data),
    };

    let headers = match value.get("headers") {
        None | Some(Value::Null) => HashMap::new(),
        Some(Value::Object(map)) => headers::stringify(map),
        Some(_) => return Err(FrameError::InvalidHeaders),
    };

    Ok(ClientFrame::Connect(ConnectFrame { url, headers }))
}

/// Out-of-band notice sent to the client when `report_upstream_errors` is on.
pub fn upstream_error(url: &str, message: &str) -> String {
    json!({
        "type": "upstream-error",
        "url": url,
        "message": message,
    })
    .to_string()
}
