//! Client library for the Odoo RPC API.
//!
//! Two interchangeable clients cover the same operation surface over the two
//! wire protocols the server speaks:
//!
//! - [`OdooXmlRpc`] talks to the `/xmlrpc/2/common` and `/xmlrpc/2/object`
//!   endpoints with positional `execute_kw` envelopes.
//! - [`OdooJsonRpc`] talks to the `/web/...` JSON-RPC 2.0 endpoints and
//!   carries the session cookie across calls.
//!
//! Both are thin pass-throughs: build a payload, POST it, unwrap the reply.
//! Errors are logged where they happen and returned as [`RpcError`], so an
//! empty result is always distinguishable from a failed call.
//!
//! ```no_run
//! use odoo_rpc::{Domain, OdooJsonRpc};
//!
//! # async fn demo() -> Result<(), odoo_rpc::RpcError> {
//! let mut odoo = OdooJsonRpc::new("http://localhost:8069")?;
//! odoo.login("admin", "prod", "admin").await?;
//! let ids = odoo
//!     .search("res.partner", &[Domain::new("name", "ilike", "%customer%")], 0, 10, "")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod domain;
mod error;
pub mod jsonrpc;
pub mod payload;
pub mod response;
pub mod xmlrpc;

// Re-export types for easier imports elsewhere
pub use domain::{Context, Domain, many2many_override, with_base_filter};
pub use error::RpcError;
pub use jsonrpc::OdooJsonRpc;
pub use payload::JsonRpcPayload;
pub use response::RpcResponse;
pub use xmlrpc::OdooXmlRpc;
