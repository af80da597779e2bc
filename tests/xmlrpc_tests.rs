#[cfg(test)]
mod tests {
    use odoo_rpc::xmlrpc::UNAUTHENTICATED;
    use odoo_rpc::{OdooXmlRpc, RpcError};
    use serde_json::{Map, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // HTTP stub answering every request with the same canned XML-RPC reply.
    async fn canned_server(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request).await;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    const UID_REPLY: &str = "<?xml version=\"1.0\"?><methodResponse><params>\
        <param><value><int>2</int></value></param></params></methodResponse>";

    #[test]
    fn test_client_starts_unauthenticated() {
        let mut client = OdooXmlRpc::new().unwrap();
        assert_eq!(client.uid(), UNAUTHENTICATED);
        assert!(!client.is_connected());
        assert!(client.host().is_none());
        // archived records are visible by default
        assert_eq!(client.context().get("active_test"), Some(&json!(false)));

        client.set_uid(7);
        assert!(client.is_connected());
        client.set_uid(UNAUTHENTICATED);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_context_editing() {
        let mut client = OdooXmlRpc::new().unwrap();
        client.add_context("lang", "en_US");
        assert_eq!(client.context().get("lang"), Some(&json!("en_US")));
        client.clear_context();
        assert!(client.context().is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_host() {
        let mut client = OdooXmlRpc::new().unwrap();
        match client.login("nonsense host", "prod", "admin", "admin").await {
            Err(RpcError::InvalidHost(_)) => {}
            other => panic!("expected InvalidHost, got {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_calls_require_a_session() {
        let client = OdooXmlRpc::new().unwrap();
        match client.version().await {
            Err(RpcError::NotConnected) => {}
            other => panic!("expected NotConnected, got {other:?}"),
        }
    }

    // An unreachable server surfaces as a transport error, never a panic
    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let mut client = OdooXmlRpc::new().unwrap();
        match client.login("http://127.0.0.1:1", "prod", "admin", "admin").await {
            Err(RpcError::Http(_)) => {}
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert!(!client.is_connected());

        let mut data = Map::new();
        data.insert("name".to_string(), json!("razalghoul"));
        match client.create_record("res.partner", data).await {
            Err(RpcError::Http(_)) => {}
            other => panic!("expected a transport error, got {other:?}"),
        }
    }

    // A failed re-login must not leave the previous session visible
    #[tokio::test]
    async fn test_failed_relogin_resets_the_session() {
        let url = canned_server(UID_REPLY).await;
        let mut client = OdooXmlRpc::new().unwrap();
        assert!(client.login(&url, "prod", "admin", "admin").await.unwrap());
        assert_eq!(client.uid(), 2);

        match client.login("http://127.0.0.1:1", "prod", "admin", "admin").await {
            Err(RpcError::Http(_)) => {}
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert!(!client.is_connected());
        assert_eq!(client.uid(), UNAUTHENTICATED);
    }

    // An update or unlink reply of an unexpected shape reads as failure
    #[tokio::test]
    async fn test_odd_shaped_write_reply_is_failure() {
        let url = canned_server(UID_REPLY).await;
        let mut client = OdooXmlRpc::new().unwrap();
        assert!(client.login(&url, "prod", "admin", "admin").await.unwrap());

        // every call comes back as the integer 2, never a boolean
        let mut data = Map::new();
        data.insert("name".to_string(), json!("renamed"));
        assert!(!client.update_record("res.partner", &[1], data).await.unwrap());
        assert!(!client.unlink("res.partner", &[1]).await.unwrap());
    }
}
