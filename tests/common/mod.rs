//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use span_blobs::blobs::{BlobCapture, StoredBlob};
use span_blobs::config::AppConfig;
use span_blobs::{HttpServer, Shutdown, TracerBundle};

/// Start a mock backend that drains each request and answers with a fixed JSON body.
pub async fn start_json_backend(addr: SocketAddr, response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let _ = tokio::time::timeout(
                            Duration::from_secs(2),
                            read_request(&mut socket),
                        )
                        .await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Read one request head plus its `content-length` body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return received,
            Ok(n) => n,
        };
        received.extend_from_slice(&buf[..n]);

        let Some(head_end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&received[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if received.len() >= head_end + 4 + body_len {
            return received;
        }
    }
}

/// Start the capture proxy with blobs written under `working_dir`.
pub async fn start_proxy(config: AppConfig, working_dir: &Path) -> Arc<Shutdown> {
    let capture = BlobCapture::new(config.blobs.clone()).with_working_dir(working_dir);
    let bundle =
        TracerBundle::new(config.tracer.service_name.clone(), Arc::new(capture)).unwrap();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let server = HttpServer::new(config, &bundle).unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown
}

/// A client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Every blob written under `dir/blobs`, with its payload, sorted by key.
pub fn read_blobs(dir: &Path) -> Vec<(StoredBlob, Vec<u8>)> {
    let blob_dir = dir.join("blobs");
    let mut blobs: Vec<_> = std::fs::read_dir(&blob_dir)
        .unwrap()
        .filter_map(|entry| {
            let name = entry.unwrap().file_name().into_string().unwrap();
            let key = name.strip_suffix(".meta.json")?.to_string();
            let sidecar = std::fs::read(blob_dir.join(&name)).unwrap();
            let sidecar: StoredBlob = serde_json::from_slice(&sidecar).unwrap();
            let data = std::fs::read(blob_dir.join(&key)).unwrap();
            Some((sidecar, data))
        })
        .collect();
    blobs.sort_by(|a, b| a.0.key.cmp(&b.0.key));
    blobs
}
