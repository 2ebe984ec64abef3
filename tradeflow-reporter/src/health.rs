//! Liveness endpoint for the hosting platform's uptime checks.
//!
//! A single unauthenticated GET answered with a static string; not part of
//! the monitoring core.

use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tracing::{debug, error, info};

const RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/plain; charset=utf-8\r\n\
    Content-Length: 29\r\n\
    Connection: close\r\n\
    \r\n\
    heartbeat: service is running";

pub async fn serve(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind health endpoint");
            return;
        }
    };
    info!(%addr, "health endpoint listening");

    loop {
        match listener.accept().await {
            Ok((mut stream, peer_addr)) => {
                debug!(%peer_addr, "health check");
                tokio::spawn(async move {
                    let mut request = [0u8; 1024];
                    let _ = stream.read(&mut request).await;
                    let _ = stream.write_all(RESPONSE.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
            Err(e) => error!(error = %e, "health endpoint accept failed"),
        }
    }
}
