//! Probe tests against a minimal HTTP/1.1 responder

use std::net::SocketAddr;
use std::time::Duration;

use devpane_core::probe::{BackendClient, BackendInfo, HealthStatus};
use devpane_core::DevpaneError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `/health` and `/api/info` like the chat backend; 404 otherwise
async fn spawn_backend(healthy: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = match path.as_str() {
                    "/health" if healthy => ("200 OK", r#"{"status":"ok"}"#),
                    "/health" => ("503 Service Unavailable", r#"{"status":"down"}"#),
                    "/api/info" => ("200 OK", r#"{"name":"Cursor DevOps AI","version":"0.1.0"}"#),
                    _ => ("404 Not Found", r#"{"detail":"Not Found"}"#),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

fn client(addr: SocketAddr) -> BackendClient {
    BackendClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_probe_healthy_backend() {
    let addr = spawn_backend(true).await;
    let report = client(addr).probe().await;

    assert!(report.is_healthy());
    assert_eq!(
        report.health.unwrap(),
        HealthStatus {
            status: "ok".to_string()
        }
    );
    assert_eq!(
        report.info.unwrap(),
        BackendInfo {
            name: "Cursor DevOps AI".to_string(),
            version: "0.1.0".to_string()
        }
    );
}

#[tokio::test]
async fn test_probe_reports_error_status() {
    let addr = spawn_backend(false).await;
    let report = client(addr).probe().await;

    assert!(!report.is_healthy());
    assert!(matches!(report.health, Err(DevpaneError::Http(_))));
    assert!(report.info.is_ok());
}

#[tokio::test]
async fn test_probe_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).health().await.unwrap_err();
    assert!(matches!(err, DevpaneError::Http(_)));
    assert!(err.is_retryable());
}
