//! Helpers for tests that need a fake upstream service.

use axum::Router;
use tokio::net::TcpListener;

/// Serve a router on an ephemeral local port and return its base URL.
pub(crate) async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}
