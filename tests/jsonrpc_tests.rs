#[cfg(test)]
mod tests {
    use std::time::Duration;

    use odoo_rpc::{JsonRpcPayload, OdooJsonRpc, RpcError};
    use serde_json::{Map, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // One-shot HTTP stub replying to a single request with a canned body,
    // then going away.
    async fn canned_server(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    // Unit test for creating a client
    #[test]
    fn test_client_creation() {
        let client = OdooJsonRpc::new("http://example.com:8069").unwrap();
        assert_eq!(client.base_url().as_str(), "http://example.com:8069/");
        assert!(!client.is_connected());
        assert!(client.uid().is_none());
        assert!(client.context().is_empty());

        match OdooJsonRpc::new("not a url") {
            Err(RpcError::InvalidHost(_)) => {}
            other => panic!("expected InvalidHost, got {other:?}"),
        }
    }

    // The envelope a model call serializes to
    #[test]
    fn test_call_envelope() {
        let payload = JsonRpcPayload::call_kw(
            2,
            "res.partner",
            "search_count",
            vec![json!([["id", ">", 0]])],
            Map::new(),
            &Map::new(),
        );

        let envelope = serde_json::to_value(&payload).unwrap();
        assert_eq!(envelope["jsonrpc"], "2.0");
        assert_eq!(envelope["method"], "call");
        assert_eq!(envelope["params"]["model"], "res.partner");
        assert_eq!(envelope["params"]["method"], "search_count");
        assert_eq!(envelope["params"]["args"], json!([[["id", ">", 0]]]));
        assert!(envelope["params"]["context"].is_object());
    }

    // An unreachable server surfaces as a transport error, never a panic
    #[tokio::test]
    async fn test_create_against_unreachable_host() {
        let client = OdooJsonRpc::new("http://127.0.0.1:1").unwrap();

        let mut data = Map::new();
        data.insert("name".to_string(), json!("razalghoul"));
        data.insert("email".to_string(), json!("razal@ghoul.com"));

        match client.create("res.partner", data).await {
            Err(RpcError::Http(_)) => {}
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_login_against_unreachable_host() {
        let mut client = OdooJsonRpc::new("http://127.0.0.1:1").unwrap();
        match client.login("admin", "prod", "admin").await {
            Err(RpcError::Http(_)) => {}
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert!(!client.is_connected());
        assert!(client.uid().is_none());
    }

    // A failed re-login must not leave the previous session visible
    #[tokio::test]
    async fn test_failed_relogin_clears_previous_session() {
        let url = canned_server(r#"{"jsonrpc":"2.0","id":1,"result":{"uid":2}}"#).await;
        let mut client = OdooJsonRpc::new(&url).unwrap();
        assert!(client.login("admin", "prod", "admin").await.unwrap());
        assert!(client.is_connected());
        assert_eq!(client.uid(), Some(2));

        // the stub is gone; give its socket a moment to close
        tokio::time::sleep(Duration::from_millis(50)).await;
        match client.login("admin", "prod", "admin").await {
            Err(RpcError::Http(_)) => {}
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert!(!client.is_connected());
        assert!(client.uid().is_none());
    }

    // A write reply of an unexpected shape reads as failure, not success
    #[tokio::test]
    async fn test_odd_shaped_write_reply_is_failure() {
        let url = canned_server(r#"{"jsonrpc":"2.0","id":1,"result":7}"#).await;
        let client = OdooJsonRpc::new(&url).unwrap();

        let mut data = Map::new();
        data.insert("name".to_string(), json!("renamed"));
        assert!(!client.write("res.partner", &[1], data).await.unwrap());
    }
}
