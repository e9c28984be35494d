//! Integration tests for the ingestion pipeline
//!
//! These tests use wiremock to stand in for the upstream catalog and image
//! origin, and exercise the HTTP client's retry/classification behavior,
//! boundary discovery, and the full ingest cycle end-to-end.

use booru_harvest::config::{CatalogConfig, Config, HarvestConfig, StorageConfig};
use booru_harvest::harvest::{discover_max_post_id, Coordinator, HttpClient};
use booru_harvest::index::{sink_from_config, HttpIndexSink, IndexSink};
use booru_harvest::storage::{SqliteStore, Store};
use booru_harvest::HarvestError;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn post_page_html(image_path: &str, tags: &[&str]) -> String {
    let items: String = tags
        .iter()
        .map(|t| {
            format!(
                r#"<li><span class="tag-count">5</span> <a href="/index">?</a> <a href="/index">{t}</a></li>"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <div id="post-list">
            <ul id="tag-sidebar">{items}</ul>
            <img id="image" width="640" height="480" src="{image_path}" />
        </div>
        </body></html>"#
    )
}

fn past_end_html() -> &'static str {
    "<html><body><h1>Nothing found</h1></body></html>"
}

fn test_config(server_uri: &str, db_path: &str, image_root: &str) -> Config {
    Config {
        catalog: CatalogConfig {
            page_url_template: format!("{server_uri}/post?id={{id}}"),
            id_ceiling: 100,
        },
        harvest: HarvestConfig {
            concurrency: 3,
            request_timeout_secs: 5,
        },
        storage: StorageConfig {
            database_path: db_path.to_string(),
            image_root: image_root.to_string(),
        },
        index: None,
    }
}

// ===== Status classification =====

#[tokio::test]
async fn test_200_passes_body_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(Duration::from_secs(5)).unwrap();
    let body = client.get_text(&format!("{}/page", server.uri())).await.unwrap();
    assert_eq!(body, "hello");
}

#[tokio::test]
async fn test_404_is_bad_request_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(Duration::from_secs(5)).unwrap();
    let result = client.get_text(&format!("{}/missing", server.uri())).await;

    match result {
        Err(HarvestError::BadRequest { status, body, .. }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "not here");
        }
        other => panic!("expected BadRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_503_is_server_error_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(Duration::from_secs(5)).unwrap();
    let result = client.get_text(&format!("{}/down", server.uri())).await;

    match result {
        Err(HarvestError::ServerError { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected ServerError, got {other:?}"),
    }
}

// ===== Retry / backoff =====

#[tokio::test]
async fn test_timeout_twice_then_success() {
    let server = MockServer::start().await;

    // First two requests stall past the client timeout, then expire
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(Duration::from_millis(200)).unwrap();
    let started = Instant::now();
    let body = client.get_text(&format!("{}/slow", server.uri())).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(body, "finally");
    // Two backoff delays: 2^1 + 2^2 seconds
    assert!(
        elapsed >= Duration::from_secs(6),
        "expected two backoff delays, elapsed only {elapsed:?}"
    );
}

#[tokio::test]
async fn test_three_timeouts_exhaust_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::new(Duration::from_millis(200)).unwrap();
    let result = client.get_text(&format!("{}/slow", server.uri())).await;

    assert!(matches!(result, Err(HarvestError::RequestTimedOut { .. })));
}

#[tokio::test]
async fn test_stalled_body_is_retried_as_timeout() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // wiremock delays whole responses, not bodies, so stand up a raw server
    // that sends the headers plus a few body bytes and then goes quiet
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicU32::new(0));
    let server_connections = connections.clone();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            server_connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 64\r\n\r\npartial")
                    .await;
                let _ = socket.flush().await;
                // Never send the remaining bytes
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });

    let client = HttpClient::new(Duration::from_millis(200)).unwrap();
    let started = Instant::now();
    let result = client.get_text(&format!("http://{addr}/post")).await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(HarvestError::RequestTimedOut { .. })),
        "expected RequestTimedOut, got {result:?}"
    );
    assert_eq!(
        connections.load(Ordering::SeqCst),
        3,
        "a body stall must consume the full retry budget"
    );
    // Two backoff delays: 2^1 + 2^2 seconds
    assert!(
        elapsed >= Duration::from_secs(6),
        "expected two backoff delays, elapsed only {elapsed:?}"
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Unroutable port, nothing listening
    let client = HttpClient::new(Duration::from_secs(2)).unwrap();
    let result = client.get_text("http://127.0.0.1:1/nothing").await;
    assert!(matches!(result, Err(HarvestError::Transport { .. })));
}

// ===== Boundary discovery =====

#[tokio::test]
async fn test_discovery_against_mock_catalog() {
    let server = MockServer::start().await;

    // IDs 1..=4 are real posts, everything above shows the past-end page
    for id in 1..=4 {
        Mock::given(method("GET"))
            .and(path("/post"))
            .and(query_param("id", id.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(post_page_html("/img.jpg", &[])),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string(past_end_html()))
        .mount(&server)
        .await;

    let catalog = CatalogConfig {
        page_url_template: format!("{}/post?id={{id}}", server.uri()),
        id_ceiling: 50,
    };
    let client = Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap());

    let max = discover_max_post_id(client, &catalog, 1).await;
    assert_eq!(max, 4);
}

// ===== End-to-end ingest =====

#[tokio::test]
async fn test_full_ingest_cycle() {
    let server = MockServer::start().await;
    let image_bytes = vec![0xFFu8, 0xD8, 0xFF, 0xE0, 1, 2, 3];

    for (id, tags) in [(1, vec!["blue_sky", "clouds"]), (2, vec!["night"])] {
        Mock::given(method("GET"))
            .and(path("/post"))
            .and(query_param("id", id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(post_page_html(
                &format!("/images/{id}.jpg"),
                &tags,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/images/{id}.jpg")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes.clone()))
            .mount(&server)
            .await;
    }

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let image_dir = tempfile::tempdir().unwrap();
    let config = test_config(
        &server.uri(),
        db_file.path().to_str().unwrap(),
        image_dir.path().to_str().unwrap(),
    );

    let client = Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap());
    let store = Arc::new(Mutex::new(
        SqliteStore::new(db_file.path()).unwrap(),
    ));
    let index = sink_from_config(client.clone(), None);

    let coordinator = Coordinator::new(config, client, store.clone(), index);
    let report = coordinator.ingest_range(1, Some(2)).await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(report.failed.is_empty());

    // Images were written to deterministic paths
    assert!(image_dir.path().join("image_1.jpg").exists());
    assert!(image_dir.path().join("image_2.jpg").exists());

    // Database holds the pictures with their tag sets
    let store = store.lock().unwrap();
    assert_eq!(store.count_pictures().unwrap(), 2);
    let picture = store
        .get_picture_by_image_url(&format!("{}/images/1.jpg", server.uri()))
        .unwrap()
        .expect("picture 1 should exist");
    assert_eq!(picture.width, 640);
    assert_eq!(
        store.get_tags_for_picture(picture.id).unwrap(),
        vec!["blue_sky", "clouds"]
    );
}

#[tokio::test]
async fn test_failed_post_does_not_abort_range() {
    let server = MockServer::start().await;
    let image_bytes = vec![1u8, 2, 3];

    // Post 1 is fine
    Mock::given(method("GET"))
        .and(path("/post"))
        .and(query_param("id", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(post_page_html("/images/1.jpg", &["ok"])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes))
        .mount(&server)
        .await;

    // Post 2 is a deleted page with no image element
    Mock::given(method("GET"))
        .and(path("/post"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(past_end_html()))
        .mount(&server)
        .await;

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let image_dir = tempfile::tempdir().unwrap();
    let config = test_config(
        &server.uri(),
        db_file.path().to_str().unwrap(),
        image_dir.path().to_str().unwrap(),
    );

    let client = Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap());
    let store = Arc::new(Mutex::new(SqliteStore::new(db_file.path()).unwrap()));
    let index = sink_from_config(client.clone(), None);

    let coordinator = Coordinator::new(config, client, store.clone(), index);
    let report = coordinator.ingest_range(1, Some(2)).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, vec![2]);
    assert_eq!(store.lock().unwrap().count_pictures().unwrap(), 1);
}

#[tokio::test]
async fn test_reingest_converges_to_same_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .and(query_param("id", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(post_page_html("/images/1.jpg", &["a", "b"])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8]))
        .mount(&server)
        .await;

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let image_dir = tempfile::tempdir().unwrap();
    let config = test_config(
        &server.uri(),
        db_file.path().to_str().unwrap(),
        image_dir.path().to_str().unwrap(),
    );

    let client = Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap());
    let store = Arc::new(Mutex::new(SqliteStore::new(db_file.path()).unwrap()));
    let index = sink_from_config(client.clone(), None);
    let coordinator = Coordinator::new(config, client, store.clone(), index);

    coordinator.ingest_range(1, Some(1)).await.unwrap();
    coordinator.ingest_range(1, Some(1)).await.unwrap();

    let store = store.lock().unwrap();
    assert_eq!(store.count_pictures().unwrap(), 1);
    assert_eq!(store.count_associations().unwrap(), 2);
}

// ===== Index sink =====

#[tokio::test]
async fn test_http_index_sink_publishes_document() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pictures/_doc/42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "created"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap());
    let sink = HttpIndexSink::new(
        client,
        &booru_harvest::config::IndexConfig {
            endpoint: server.uri(),
            index_name: "pictures".to_string(),
        },
    );

    sink.publish(42, &["a".to_string(), "b".to_string()])
        .await
        .unwrap();
}
