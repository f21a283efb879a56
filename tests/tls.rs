//! TLS listeners with self-provisioned certificates.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use mythic_http::config::InstanceConfig;
use mythic_http::net::tls::backend_client_config;

mod common;

use common::{backend_at, loopback_instance, start_echo_backend, TestListeners};

fn tls_instance(dir: &TempDir) -> InstanceConfig {
    let mut instance = loopback_instance();
    instance.use_ssl = true;
    instance.cert_path = dir.path().join("http.crt").display().to_string();
    instance.key_path = dir.path().join("http.key").display().to_string();
    instance
}

/// Send one HTTP/1.1 request over TLS and return the raw response.
async fn tls_get(addr: SocketAddr, path: &str) -> String {
    let connector = TlsConnector::from(Arc::new(backend_client_config().unwrap()));
    let stream = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut tls = connector.connect(server_name, stream).await.unwrap();

    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    tls.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let _ = tls.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn missing_certificate_is_generated_and_served() {
    let dir = TempDir::new().unwrap();
    let instance = tls_instance(&dir);
    let cert_path = std::path::PathBuf::from(&instance.cert_path);
    let key_path = std::path::PathBuf::from(&instance.key_path);
    assert!(!cert_path.exists());

    let backend = start_echo_backend().await;
    let listeners = TestListeners::start(vec![instance], backend_at(backend)).await;

    assert!(cert_path.exists());
    assert!(key_path.exists());
    let cert = std::fs::read_to_string(&cert_path).unwrap();
    assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let response = tls_get(listeners.addrs[0], "/index?q=abc").await;
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.contains("\"path\":\"/agent_message\""));
    assert!(response.contains("\"query\":\"q=abc\""));

    listeners.stop().await;
}

#[tokio::test]
async fn existing_certificate_is_reused() {
    let dir = TempDir::new().unwrap();
    let backend = start_echo_backend().await;

    let listeners = TestListeners::start(vec![tls_instance(&dir)], backend_at(backend)).await;
    listeners.stop().await;
    let instance = tls_instance(&dir);
    let first_cert = std::fs::read(&instance.cert_path).unwrap();
    let first_key = std::fs::read(&instance.key_path).unwrap();

    let listeners = TestListeners::start(vec![instance.clone()], backend_at(backend)).await;
    assert_eq!(std::fs::read(&instance.cert_path).unwrap(), first_cert);
    assert_eq!(std::fs::read(&instance.key_path).unwrap(), first_key);

    let response = tls_get(listeners.addrs[0], "/").await;
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");

    listeners.stop().await;
}
