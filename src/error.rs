use thiserror::Error;

/// Errors surfaced by both protocol clients.
///
/// Every variant is logged where it is detected, then returned to the caller,
/// so an empty result and a failed call are distinguishable.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The server address could not be parsed as a URL.
    #[error("invalid host url: {0}")]
    InvalidHost(#[from] url::ParseError),

    /// No session yet: `login` was never called or never succeeded.
    #[error("not connected: call login first")]
    NotConnected,

    /// Transport-level failure (connection refused, timeout, I/O).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Fault reported by the XML-RPC endpoint.
    #[error("xmlrpc fault {code}: {message}")]
    Fault { code: i64, message: String },

    /// Error object reported by the JSON-RPC endpoint.
    #[error("rpc error: {name}. {message}")]
    Rpc { name: String, message: String },

    /// The reply parsed, but not into the shape the operation expects.
    #[error("unexpected reply shape: {0}")]
    UnexpectedShape(String),

    /// The reply was not a well-formed XML-RPC document.
    #[error("malformed xmlrpc reply: {0}")]
    Xml(String),
}
