//! Local HTTP fixtures for client tests.

use crate::config::Config;
use crate::fetcher::{ApiClient, RetryPolicy};
use axum::Router;
use std::time::Duration;

fn client_for(base_url: String, attempts: u32) -> ApiClient {
    let mut config = Config::new("acme");
    config.api_base_url = base_url;
    config.retry = RetryPolicy {
        attempts,
        delay: Duration::from_millis(10),
    };
    ApiClient::new(&config).unwrap()
}

/// Serve `app` on an ephemeral port and return a client for it.
///
/// The client's API root is `/api`, so routes are declared as `/api/...`.
pub async fn serve(app: Router) -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    client_for(format!("http://{}/api", addr), 3)
}

/// Client whose every request fails fast; nothing listens on port 9
pub fn offline_client() -> ApiClient {
    client_for("http://127.0.0.1:9/api".to_string(), 1)
}
