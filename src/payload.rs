use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::domain::Context;

const RPC_VERSION: &str = "2.0";
const RPC_METHOD: &str = "call";

/// JSON-RPC 2.0 envelope sent to the Odoo web endpoints.
///
/// The outer shape is always
/// `{"jsonrpc":"2.0","method":"call","id":<int>,"params":{...}}`; only the
/// params vary per endpoint. Params always carry a `context` key, even when
/// the context is empty.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcPayload {
    jsonrpc: &'static str,
    method: &'static str,
    id: u64,
    params: Value,
}

impl JsonRpcPayload {
    /// Model-method call params for `/web/dataset/call_kw`.
    pub fn call_kw(
        id: u64,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        context: &Context,
    ) -> Self {
        Self::wrap(
            id,
            json!({
                "model": model,
                "method": method,
                "args": args,
                "kwargs": kwargs,
                "context": context,
            }),
        )
    }

    /// Credential params for `/web/session/authenticate`.
    pub fn login(id: u64, user: &str, database: &str, password: &str) -> Self {
        Self::wrap(
            id,
            json!({
                "login": user,
                "password": password,
                "db": database,
                "context": {},
            }),
        )
    }

    /// Free-form params (e.g. `/web/dataset/search_read`); the client context
    /// is injected unless the caller already set one.
    pub fn with_params(id: u64, mut params: Map<String, Value>, context: &Context) -> Self {
        if !params.contains_key("context") {
            params.insert("context".to_string(), json!(context));
        }
        Self::wrap(id, Value::Object(params))
    }

    /// Params carrying nothing but the context (session info, db/module lists).
    pub fn empty(id: u64, context: &Context) -> Self {
        Self::wrap(id, json!({ "context": context }))
    }

    fn wrap(id: u64, params: Value) -> Self {
        Self {
            jsonrpc: RPC_VERSION,
            method: RPC_METHOD,
            id,
            params,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Pretty-printed form, used by the request dump.
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
