use serde_json::Value;
use storefront_server::{AppConfig, build_app};
use tokio::task::JoinHandle;

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(&AppConfig::default()).await;

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn server_endpoints_work() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // GET /healthz
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // GET /readyz reports the local-only cache
    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["cache"]["mode"], "local");
    assert_eq!(body["cache"]["remoteAvailable"], false);

    // Incoming request ids are echoed back
    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-123");

    // Read-through caching over the wire
    let first: Value = client
        .get(format!("{base}/api/products/trending?limit=3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["trendingProducts"].as_array().map(Vec::len), Some(3));
    assert!(first.get("cached").is_none());

    let second: Value = client
        .get(format!("{base}/api/products/trending?limit=3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["cached"], true);

    // Response cache headers
    let resp = client
        .get(format!("{base}/api/search/filters"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-cache"], "MISS");
    let filters: Value = resp.json().await.unwrap();
    assert!(filters["categories"].as_array().is_some_and(|c| !c.is_empty()));

    // GET /metrics exposes request counters
    let resp = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert!(resp.status().is_success());
    let text = resp.text().await.unwrap();
    assert!(text.contains("http_requests_total"));

    // GET /api/cache/stats
    let resp = client
        .get(format!("{base}/api/cache/stats"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let stats: Value = resp.json().await.unwrap();
    assert_eq!(stats["mode"], "local");
    assert!(stats["fallback"]["entries"].as_u64().unwrap() >= 1);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
