//! Caller-supplied header maps.
//!
//! Both relays accept headers as a JSON object. String values are used as
//! is; any other value is sent as its JSON text (`1`, `true`, `null`).

use std::collections::HashMap;

use serde_json::{Map, Value};

pub fn stringify(headers: &Map<String, Value>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}
