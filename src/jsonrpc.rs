//! Client for the JSON-RPC flavor of the Odoo API.
//!
//! Every call POSTs a JSON-RPC 2.0 envelope to a fixed `/web/...` path. The
//! session cookie issued by `authenticate` lives in the client's cookie store
//! and rides along on every subsequent call from the same instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};
use url::Url;

use crate::domain::{Context, Domain, with_base_filter};
use crate::error::RpcError;
use crate::payload::JsonRpcPayload;
use crate::response::RpcResponse;

pub const AUTH_URI: &str = "/web/session/authenticate";
pub const SESSION_URI: &str = "/web/session/get_session_info";
pub const MODULES_URI: &str = "/web/session/modules";
pub const DBLIST_URI: &str = "/web/database/list";
pub const CALLKW_URI: &str = "/web/dataset/call_kw";
pub const SEARCHR_URI: &str = "/web/dataset/search_read";

/// Module prefix the bulk-import machinery assigns to external identifiers.
pub const IMPORT_MODULE: &str = "__import__";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON-RPC client holding one cookie-backed session.
///
/// Not synchronized: one instance belongs to one task.
#[derive(Debug)]
pub struct OdooJsonRpc {
    http: Client,
    base_url: Url,
    connected: bool,
    uid: Option<i64>,
    context: Context,
    dump_requests: bool,
    next_id: AtomicU64,
}

impl OdooJsonRpc {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        let base_url = Url::parse(url).map_err(|err| {
            error!("malformed host url '{url}': {err}");
            RpcError::from(err)
        })?;
        let http = Client::builder()
            .cookie_store(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REPLY_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            connected: false,
            uid: None,
            context: Context::new(),
            dump_requests: false,
            next_id: AtomicU64::new(1),
        })
    }

    /// Mirror outgoing payloads and raw replies to the log. Debug aid only.
    pub fn dump_requests(&mut self, flag: bool) {
        self.dump_requests = flag;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Identity reported by the last successful login, when the server sent one.
    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    pub fn add_context(&mut self, key: &str, value: impl Into<Value>) {
        self.context.insert(key.to_string(), value.into());
    }

    /// Authenticate and retain the session cookie for subsequent calls.
    /// Success is an HTTP 200 reply without an error branch.
    pub async fn login(
        &mut self,
        user: &str,
        database: &str,
        password: &str,
    ) -> Result<bool, RpcError> {
        // the previous session must not stay visible past a failed attempt
        self.connected = false;
        self.uid = None;

        let payload = JsonRpcPayload::login(self.next_id(), user, database, password);
        let response = self.execute(AUTH_URI, &payload).await?;
        self.connected = response.is_ok();
        if self.connected {
            self.uid = response.result_object().get("uid").and_then(Value::as_i64);
        } else {
            warn!("login rejected: {}", response.error_message());
        }
        Ok(self.connected)
    }

    /// Names of the databases the server hosts.
    pub async fn database_list(&self) -> Result<Vec<String>, RpcError> {
        let payload = JsonRpcPayload::empty(self.next_id(), &self.context);
        let response = self.execute(DBLIST_URI, &payload).await?;
        self.ensure_ok(&response)?;
        Ok(response.result_array().iter().map(display_string).collect())
    }

    /// Names of the modules installed in the session database.
    pub async fn module_list(&self) -> Result<Vec<String>, RpcError> {
        let payload = JsonRpcPayload::empty(self.next_id(), &self.context);
        let response = self.execute(MODULES_URI, &payload).await?;
        self.ensure_ok(&response)?;
        Ok(response.result_array().iter().map(display_string).collect())
    }

    /// Session details (uid, user context, database) as reported by the server.
    pub async fn session_info(&self) -> Result<Map<String, Value>, RpcError> {
        let payload = JsonRpcPayload::empty(self.next_id(), &self.context);
        let response = self.execute(SESSION_URI, &payload).await?;
        self.ensure_ok(&response)?;
        Ok(response.result_object())
    }

    /// Generic dispatch: run `method` on `model` with positional args.
    /// Remote errors are logged and left in the response for inspection.
    pub async fn call_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<RpcResponse, RpcError> {
        self.call_kw_with(model, method, args, Map::new()).await
    }

    /// Generic dispatch with keyword arguments.
    pub async fn call_kw_with(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<RpcResponse, RpcError> {
        let payload = JsonRpcPayload::call_kw(
            self.next_id(),
            model,
            method,
            args,
            kwargs,
            &self.context,
        );
        let response = self.execute(CALLKW_URI, &payload).await?;
        if !response.is_ok() {
            warn!("{model}.{method} failed: {}", response.error_message());
        }
        Ok(response)
    }

    /// Search for record ids. The mandatory `id > 0` filter is prepended to
    /// the caller's filters.
    pub async fn search(
        &self,
        model: &str,
        filters: &[Domain],
        offset: u32,
        limit: u32,
        order: &str,
    ) -> Result<Vec<i64>, RpcError> {
        let args = vec![
            json!(with_base_filter(filters)),
            json!(offset),
            json!(limit),
            json!(order),
            json!(false),
        ];
        let response = self.call_kw(model, "search", args).await?;
        self.ensure_ok(&response)?;
        Ok(response.result_array().iter().filter_map(Value::as_i64).collect())
    }

    /// Count of records matching the filters.
    pub async fn search_count(&self, model: &str, filters: &[Domain]) -> Result<i64, RpcError> {
        let response = self.call_kw(model, "search_count", vec![json!(filters)]).await?;
        self.ensure_ok(&response)?;
        let result = response.result();
        result
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| shape_error("a count", result.as_ref()))
    }

    /// Server-side search+read through the dedicated endpoint. The result
    /// object carries `length` and `records`.
    pub async fn search_read(
        &self,
        model: &str,
        fields: &[&str],
        filters: &[Domain],
        offset: u32,
        limit: u32,
        sort: &str,
    ) -> Result<Map<String, Value>, RpcError> {
        let mut params = Map::new();
        params.insert("model".to_string(), json!(model));
        params.insert("fields".to_string(), json!(fields));
        params.insert("domain".to_string(), json!(filters));
        params.insert("offset".to_string(), json!(offset));
        params.insert("limit".to_string(), json!(limit));
        params.insert("sort".to_string(), json!(sort));
        let payload = JsonRpcPayload::with_params(self.next_id(), params, &self.context);
        let response = self.execute(SEARCHR_URI, &payload).await?;
        self.ensure_ok(&response)?;
        Ok(response.result_object())
    }

    /// Read the given fields of the given records.
    pub async fn read(
        &self,
        model: &str,
        fields: &[&str],
        ids: &[i64],
    ) -> Result<Vec<Map<String, Value>>, RpcError> {
        let response = self
            .call_kw(model, "read", vec![json!(ids), json!(fields)])
            .await?;
        self.ensure_ok(&response)?;
        Ok(response
            .result_array()
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect())
    }

    /// Create a record, returning its id.
    pub async fn create(&self, model: &str, data: Map<String, Value>) -> Result<i64, RpcError> {
        let response = self.call_kw(model, "create", vec![json!(data)]).await?;
        self.ensure_ok(&response)?;
        let result = response.result();
        result
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| shape_error("a record id", result.as_ref()))
    }

    /// Update existing records with the given field values.
    pub async fn write(
        &self,
        model: &str,
        ids: &[i64],
        data: Map<String, Value>,
    ) -> Result<bool, RpcError> {
        let response = self
            .call_kw(model, "write", vec![json!(ids), json!(data)])
            .await?;
        self.ensure_ok(&response)?;
        Ok(response.result().as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Delete records.
    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool, RpcError> {
        let response = self.call_kw(model, "unlink", vec![json!(ids)]).await?;
        self.ensure_ok(&response)?;
        Ok(response.result().as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Export rows for the given records, fields in the CSV header format.
    pub async fn export(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<Value>, RpcError> {
        let response = self
            .call_kw(model, "export_data", vec![json!(ids), json!(fields)])
            .await?;
        self.ensure_ok(&response)?;
        match response.result_object().remove("datas") {
            Some(Value::Array(rows)) => Ok(rows),
            other => Err(shape_error("export rows", other.as_ref())),
        }
    }

    /// Search then export: composes `search` and `export` server-side ids.
    pub async fn export_filtered(
        &self,
        model: &str,
        filters: &[Domain],
        fields: &[&str],
    ) -> Result<Vec<Value>, RpcError> {
        let ids = self.search(model, filters, 0, 0, "").await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.export(model, &ids, fields).await
    }

    /// Export records addressed by external identifiers under the default
    /// import module.
    pub async fn export_by_external_id(
        &self,
        model: &str,
        xml_ids: &[&str],
        fields: &[&str],
    ) -> Result<Vec<Value>, RpcError> {
        self.export_by_xml_id(IMPORT_MODULE, model, xml_ids, fields).await
    }

    /// Resolve module-qualified external identifiers to internal ids through
    /// `ir.model.data`, then export those records.
    pub async fn export_by_xml_id(
        &self,
        module: &str,
        model: &str,
        xml_ids: &[&str],
        fields: &[&str],
    ) -> Result<Vec<Value>, RpcError> {
        let prefix = format!("{module}.");
        let names: Vec<String> = xml_ids
            .iter()
            .map(|xml_id| xml_id.replace(&prefix, ""))
            .collect();

        let lookup = self
            .search_read(
                "ir.model.data",
                &["res_id"],
                &[
                    Domain::new("model", "=", model),
                    Domain::new("module", "=", module),
                    Domain::new("name", "in", json!(names)),
                ],
                0,
                0,
                "",
            )
            .await?;
        let ids: Vec<i64> = match lookup.get("records") {
            Some(Value::Array(records)) => records
                .iter()
                .filter_map(|record| record.get("res_id").and_then(Value::as_i64))
                .collect(),
            other => return Err(shape_error("an id lookup", other)),
        };
        self.export(model, &ids, fields).await
    }

    /// Import multiple records through the `load` machinery; returns the
    /// created ids. Rows the server rejects come back as an empty id list,
    /// with the server messages logged.
    pub async fn bulk_import(
        &self,
        model: &str,
        rows: Vec<Value>,
        fields: &[&str],
    ) -> Result<Vec<i64>, RpcError> {
        let response = self
            .call_kw(model, "load", vec![json!(fields), json!(rows)])
            .await?;
        self.ensure_ok(&response)?;
        let result = response.result_object();
        match result.get("ids") {
            Some(Value::Array(ids)) => Ok(ids.iter().filter_map(Value::as_i64).collect()),
            _ => {
                warn!(
                    "import into {model} created nothing: {}",
                    result.get("messages").cloned().unwrap_or_default()
                );
                Ok(Vec::new())
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_ok(&self, response: &RpcResponse) -> Result<(), RpcError> {
        if response.is_ok() {
            Ok(())
        } else {
            let err = response.to_error();
            warn!("{err}");
            Err(err)
        }
    }

    async fn execute(
        &self,
        uri: &str,
        payload: &JsonRpcPayload,
    ) -> Result<RpcResponse, RpcError> {
        let url = self.base_url.join(uri)?;
        if self.dump_requests {
            info!("POST {url}: {}", payload.to_pretty_string());
        }

        let response = self
            .http
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                error!("http communication error calling {url}: {err}");
                RpcError::from(err)
            })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            error!("unreadable reply from {url}: {err}");
            RpcError::from(err)
        })?;
        if self.dump_requests {
            info!("RESPONSE - Code {status}, Body: {body}");
        }
        Ok(RpcResponse::new(status, body))
    }
}

fn display_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn shape_error(expected: &str, got: Option<&Value>) -> RpcError {
    let err = RpcError::UnexpectedShape(match got {
        Some(value) => format!("expected {expected}, got {value}"),
        None => format!("expected {expected}, got nothing"),
    });
    error!("{err}");
    err
}
