//! Client for the XML-RPC flavor of the Odoo API.
//!
//! Authentication goes through `{host}/xmlrpc/2/common`; every model call is
//! a positional `execute_kw` envelope against `{host}/xmlrpc/2/object`.

mod codec;

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};
use url::Url;

use crate::domain::{Context, Domain, with_base_filter};
use crate::error::RpcError;

pub const COMMON_ENDPOINT: &str = "/xmlrpc/2/common";
pub const OBJECT_ENDPOINT: &str = "/xmlrpc/2/object";

/// User id sentinel meaning "not logged in".
pub const UNAUTHENTICATED: i64 = -1;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// XML-RPC client holding one session (host, database, uid, credential).
///
/// Created empty; `login` populates the session fields. Not synchronized:
/// one instance belongs to one task.
#[derive(Debug)]
pub struct OdooXmlRpc {
    http: Client,
    host: Option<Url>,
    uid: i64,
    database: String,
    password: String,
    context: Context,
    dump_requests: bool,
}

impl OdooXmlRpc {
    pub fn new() -> Result<Self, RpcError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REPLY_TIMEOUT)
            .build()?;

        // archived records are visible by default, as in the original API
        let mut context = Context::new();
        context.insert("active_test".to_string(), json!(false));

        Ok(Self {
            http,
            host: None,
            uid: UNAUTHENTICATED,
            database: String::new(),
            password: String::new(),
            context,
            dump_requests: false,
        })
    }

    /// Mirror outgoing and incoming bodies to the log (decoded replies are
    /// reformatted as pretty JSON for readability). Debug aid only.
    pub fn dump_requests(&mut self, flag: bool) {
        self.dump_requests = flag;
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn set_uid(&mut self, uid: i64) {
        self.uid = uid;
    }

    /// True iff the last login produced an identity other than the
    /// "not logged in" sentinel.
    pub fn is_connected(&self) -> bool {
        self.uid != UNAUTHENTICATED
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn host(&self) -> Option<&Url> {
        self.host.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn add_context(&mut self, key: &str, value: impl Into<Value>) {
        self.context.insert(key.to_string(), value.into());
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    /// Initiate a session. A malformed host is a configuration error; a
    /// rejected credential is `Ok(false)`.
    pub async fn login(
        &mut self,
        host: &str,
        database: &str,
        user: &str,
        password: &str,
    ) -> Result<bool, RpcError> {
        debug!("starting connection to {host} - {database} as {user}");
        // the previous session must not stay visible past a failed attempt
        self.uid = UNAUTHENTICATED;
        let parsed = Url::parse(host).map_err(|err| {
            error!("malformed host url '{host}': {err}");
            RpcError::from(err)
        })?;
        self.host = Some(parsed);
        self.database = database.to_string();
        self.password = password.to_string();

        let reply = self
            .call(
                COMMON_ENDPOINT,
                "authenticate",
                &[json!(database), json!(user), json!(password), json!({})],
            )
            .await?;
        self.uid = uid_from_reply(&reply);
        Ok(self.is_connected())
    }

    /// Server version details (debugging aid).
    pub async fn version(&self) -> Result<Map<String, Value>, RpcError> {
        let reply = self.call(COMMON_ENDPOINT, "version", &[]).await?;
        object_from(reply)
    }

    /// Generic dispatch: run `method` on `model` with positional args.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        self.execute(model, method, args, None).await
    }

    /// Generic dispatch with keyword arguments.
    pub async fn execute_kw_with(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, RpcError> {
        self.execute(model, method, args, Some(kwargs)).await
    }

    async fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Option<Map<String, Value>>,
    ) -> Result<Value, RpcError> {
        let mut params = vec![
            json!(self.database),
            json!(self.uid),
            json!(self.password),
            json!(model),
            json!(method),
            Value::Array(args),
        ];
        if let Some(kwargs) = kwargs {
            params.push(Value::Object(kwargs));
        }
        self.call(OBJECT_ENDPOINT, "execute_kw", &params)
            .await
            .map_err(|err| {
                error!("execution of {model}.{method} failed: {err}");
                err
            })
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
        let mut kwargs = Map::new();
        if offset > 0 {
            kwargs.insert("offset".to_string(), json!(offset));
        }
        if limit > 0 {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if !order.is_empty() {
            kwargs.insert("order".to_string(), json!(order));
        }
        kwargs.insert("context".to_string(), json!(self.context));
        let reply = self
            .execute_kw_with(model, "search", vec![json!(with_base_filter(filters))], kwargs)
            .await?;
        ids_from(reply)
    }

    /// Search with an explicit record-visibility override instead of the
    /// instance context.
    pub async fn search_records(
        &self,
        model: &str,
        filters: &[Domain],
        only_active: bool,
    ) -> Result<Vec<i64>, RpcError> {
        let mut kwargs = Map::new();
        kwargs.insert("context".to_string(), json!({ "active_test": only_active }));
        let reply = self
            .execute_kw_with(model, "search", vec![json!(filters)], kwargs)
            .await?;
        ids_from(reply)
    }

    /// Read the given fields of the given records.
    pub async fn read(
        &self,
        model: &str,
        fields: &[&str],
        ids: &[i64],
    ) -> Result<Vec<Map<String, Value>>, RpcError> {
        let reply = self
            .execute_kw(model, "read", vec![json!(ids), json!(fields)])
            .await?;
        records_from(reply)
    }

    /// Server-side search+read. Fields default to `id` and `name` when none
    /// are given; the `id > 0` base filter applies.
    pub async fn get_records(
        &self,
        model: &str,
        fields: &[&str],
        filters: &[Domain],
    ) -> Result<Vec<Map<String, Value>>, RpcError> {
        let fields: Vec<&str> = if fields.is_empty() {
            vec!["id", "name"]
        } else {
            fields.to_vec()
        };
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(fields));
        kwargs.insert("context".to_string(), json!(self.context));
        let reply = self
            .execute_kw_with(
                model,
                "search_read",
                vec![json!(with_base_filter(filters))],
                kwargs,
            )
            .await?;
        records_from(reply)
    }

    /// Fetch one record by id; `None` unless exactly one record matches.
    pub async fn get_record_by_id(
        &self,
        model: &str,
        id: i64,
        fields: &[&str],
    ) -> Result<Option<Map<String, Value>>, RpcError> {
        let mut records = self
            .get_records(model, fields, &[Domain::new("id", "=", id)])
            .await?;
        if records.len() == 1 {
            Ok(records.pop())
        } else {
            Ok(None)
        }
    }

    /// Create a record, returning its id.
    pub async fn create_record(
        &self,
        model: &str,
        data: Map<String, Value>,
    ) -> Result<i64, RpcError> {
        let reply = self.execute_kw(model, "create", vec![json!(data)]).await?;
        reply
            .as_i64()
            .ok_or_else(|| shape_error("a record id", &reply))
    }

    /// Update existing records with the given field values.
    pub async fn update_record(
        &self,
        model: &str,
        ids: &[i64],
        data: Map<String, Value>,
    ) -> Result<bool, RpcError> {
        let reply = self
            .execute_kw(model, "write", vec![json!(ids), json!(data)])
            .await?;
        Ok(reply.as_bool().unwrap_or(false))
    }

    /// Delete records.
    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool, RpcError> {
        let reply = self.execute_kw(model, "unlink", vec![json!(ids)]).await?;
        Ok(reply.as_bool().unwrap_or(false))
    }

    /// Field metadata of a model: name -> {label, help, type}.
    pub async fn fields_metadata(&self, model: &str) -> Result<Map<String, Value>, RpcError> {
        let mut kwargs = Map::new();
        kwargs.insert("attributes".to_string(), json!(["string", "help", "type"]));
        let reply = self
            .execute_kw_with(model, "fields_get", vec![], kwargs)
            .await?;
        object_from(reply)
    }

    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: &[Value],
    ) -> Result<Value, RpcError> {
        let host = self.host.as_ref().ok_or(RpcError::NotConnected)?;
        let url = host.join(endpoint)?;
        let body = codec::encode_call(method, params);
        if self.dump_requests {
            info!("POST {url}: {body}");
        }

        let response = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                error!("http communication error calling {url}: {err}");
                RpcError::from(err)
            })?;
        let status = response.status();
        let text = response.text().await.map_err(|err| {
            error!("unreadable reply from {url}: {err}");
            RpcError::from(err)
        })?;
        if self.dump_requests {
            info!("RESPONSE - Code {status}, Body: {text}");
        }

        let value = codec::decode_response(&text).map_err(|err| {
            error!("{err}");
            err
        })?;
        if self.dump_requests {
            info!(
                "decoded reply: {}",
                serde_json::to_string_pretty(&value).unwrap_or_default()
            );
        }
        Ok(value)
    }
}

/// Map an `authenticate` reply onto a uid. Booleans come back from older
/// servers: true is identity 1, false is 0. Anything else stays
/// unauthenticated.
fn uid_from_reply(reply: &Value) -> i64 {
    match reply {
        Value::Bool(true) => 1,
        Value::Bool(false) => 0,
        Value::Number(number) => number.as_i64().unwrap_or(UNAUTHENTICATED),
        _ => UNAUTHENTICATED,
    }
}

fn ids_from(reply: Value) -> Result<Vec<i64>, RpcError> {
    match reply {
        Value::Array(items) => Ok(items.iter().filter_map(Value::as_i64).collect()),
        other => Err(shape_error("an id array", &other)),
    }
}

fn records_from(reply: Value) -> Result<Vec<Map<String, Value>>, RpcError> {
    match reply {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect()),
        other => Err(shape_error("a record array", &other)),
    }
}

fn object_from(reply: Value) -> Result<Map<String, Value>, RpcError> {
    match reply {
        Value::Object(object) => Ok(object),
        other => Err(shape_error("an object", &other)),
    }
}

fn shape_error(expected: &str, got: &Value) -> RpcError {
    let err = RpcError::UnexpectedShape(format!("expected {expected}, got {got}"));
    error!("{err}");
    err
}
