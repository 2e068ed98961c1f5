//! Shared utilities for integration testing.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use query_sanitizer::config::ServiceConfig;
use query_sanitizer::http::HttpServer;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub config_updates: mpsc::UnboundedSender<ServiceConfig>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(config: ServiceConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (config_updates, updates_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let server = HttpServer::new(config).unwrap();
        tokio::spawn(async move {
            let _ = server
                .run(listener, updates_rx, async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            config_updates,
            shutdown: Some(shutdown),
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
