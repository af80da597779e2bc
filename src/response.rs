use serde_json::{Map, Value};
use tracing::error;

use crate::error::RpcError;

/// Raw reply from a JSON-RPC endpoint: HTTP status plus body text.
///
/// The body is parsed once at construction; the accessors read from the
/// cached document. A well-formed reply carries exactly one of a `result` or
/// an `error` branch. The accessors are permissive: a malformed body or a
/// branch of the wrong shape degrades to an empty container, with the
/// mismatch logged.
#[derive(Debug, Clone, Default)]
pub struct RpcResponse {
    status: u16,
    body: String,
    json: Option<Value>,
}

impl RpcResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let json = match serde_json::from_str(&body) {
            Ok(json) => Some(json),
            Err(err) => {
                error!("response is not valid json: {err}");
                None
            }
        };
        Self { status, body, json }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// True iff the HTTP status is 200 and the body is JSON without an
    /// `error` key.
    pub fn is_ok(&self) -> bool {
        if self.status != 200 {
            return false;
        }
        match &self.json {
            Some(json) => json.get("error").is_none(),
            None => false,
        }
    }

    /// The parsed body, or `None` when it is not valid JSON.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// The `result` branch, whatever its shape.
    pub fn result(&self) -> Option<Value> {
        self.json.as_ref().and_then(|json| json.get("result")).cloned()
    }

    /// The `result` branch as an array; empty when absent or another shape.
    pub fn result_array(&self) -> Vec<Value> {
        match self.result() {
            Some(Value::Array(items)) => items,
            _ => {
                error!("result is not an array. {}", self.body);
                Vec::new()
            }
        }
    }

    /// The `result` branch as an object; empty when absent or another shape.
    pub fn result_object(&self) -> Map<String, Value> {
        match self.result() {
            Some(Value::Object(object)) => object,
            _ => {
                error!("result is not an object. {}", self.body);
                Map::new()
            }
        }
    }

    /// The `error` branch as an object; empty when absent.
    pub fn error_object(&self) -> Map<String, Value> {
        match self.json.as_ref().and_then(|json| json.get("error")) {
            Some(Value::Object(object)) => object.clone(),
            _ => Map::new(),
        }
    }

    /// "name. message" from the error's nested `data` object.
    pub fn error_message(&self) -> String {
        let error = self.error_object();
        let data = error.get("data").and_then(Value::as_object);
        match data {
            Some(data) => format!(
                "{}. {}",
                data.get("name").and_then(Value::as_str).unwrap_or_default(),
                data.get("message").and_then(Value::as_str).unwrap_or_default(),
            ),
            None => error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// The remote-reported error as a typed error value.
    pub fn to_error(&self) -> RpcError {
        let error = self.error_object();
        let data = error.get("data").and_then(Value::as_object);
        let name = data
            .and_then(|data| data.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("UnknownError")
            .to_string();
        let message = data
            .and_then(|data| data.get("message"))
            .and_then(Value::as_str)
            .or_else(|| error.get("message").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        RpcError::Rpc { name, message }
    }
}
