// Server loop module
// Accepts connections until a shutdown signal arrives

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Run the accept loop on the current `LocalSet`.
///
/// Returns once `shutdown` is notified. Connections already being served
/// finish on their own tasks.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                logger::log_shutdown("Stopped accepting connections");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use crate::config::Config;
    use crate::server::listener::{create_listener, DEFAULT_BACKLOG};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;

    fn test_config() -> Config {
        let mut config = Config::load_from("does-not-exist/config").unwrap();
        config.logging.access_log = false;
        config
    }

    /// Start the accept loop on the current `LocalSet`
    fn spawn_server(config: Config) -> (std::net::SocketAddr, Arc<Notify>, JoinHandle<()>) {
        let state = Arc::new(app::build_state(config).unwrap());
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), DEFAULT_BACKLOG).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::task::spawn_local(start_server_loop(
            listener,
            state,
            Arc::new(AtomicUsize::new(0)),
            Arc::clone(&shutdown),
        ));
        (addr, shutdown, server)
    }

    async fn fetch(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        // the server may close before reading an oversized body
        let _ = stream.read_to_end(&mut response).await;
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (addr, shutdown, server) = spawn_server(test_config());

                let response = fetch(
                    addr,
                    "GET /hero/7 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(response.starts_with("HTTP/1.1 200 OK"));
                assert!(response.contains("server: Quickstart/0.1"));
                assert!(response.ends_with("Hero number: 7"));

                let response = fetch(
                    addr,
                    "HEAD / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(response.starts_with("HTTP/1.1 200 OK"));
                assert!(!response.contains("First API call"));

                shutdown.notify_one();
                server.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_oversized_bodies_are_413() {
        let mut config = test_config();
        config.http.max_body_size = 10;

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (addr, shutdown, server) = spawn_server(config);

                let declared = fetch(
                    addr,
                    "POST /post HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                     Content-Length: 20\r\n\r\n{\"name\": \"Blitty!!\"}",
                )
                .await;
                assert!(declared.starts_with("HTTP/1.1 413 Payload Too Large"), "{declared}");

                let chunked = fetch(
                    addr,
                    "POST /post HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                     Transfer-Encoding: chunked\r\n\r\n\
                     14\r\n{\"name\": \"Blitty!!\"}\r\n0\r\n\r\n",
                )
                .await;
                assert!(chunked.starts_with("HTTP/1.1 413 Payload Too Large"), "{chunked}");

                let small = fetch(
                    addr,
                    "POST /post HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                     Content-Length: 10\r\n\r\n{\"name\":1}",
                )
                .await;
                assert!(small.starts_with("HTTP/1.1 200 OK"), "{small}");

                shutdown.notify_one();
                server.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_bad_body_on_unknown_path_is_404() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (addr, shutdown, server) = spawn_server(test_config());
                let request = |path: &str| {
                    format!(
                        "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                         Content-Type: multipart/form-data\r\nContent-Length: 1\r\n\r\nx"
                    )
                };

                let response = fetch(addr, &request("/nowhere")).await;
                assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");

                let response = fetch(addr, &request("/hello/")).await;
                assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed"), "{response}");

                let response = fetch(addr, &request("/upload_img")).await;
                assert!(response.starts_with("HTTP/1.1 400 Bad Request"), "{response}");

                shutdown.notify_one();
                server.await.unwrap();
            })
            .await;
    }
}
