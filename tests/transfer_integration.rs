//! Integration tests for the resumable transfer engine.
//!
//! These tests verify fresh, resumed and restarted transfers against a mock
//! media host.

use std::path::Path;
use std::time::Duration;

use catalog_sync_core::catalog::{PendingTransfer, parse_publish_date};
use catalog_sync_core::download::{
    HttpClient, TransferEngine, TransferError, TransferMode, TransferOutcome, TransferSettings,
};
use catalog_sync_core::interrupt::InterruptSignal;
use catalog_sync_core::resolver::Quality;
use catalog_sync_core::store::CatalogStore;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_NAME: &str = "Quick Look - Foo-Bar.mp4";
const PARTIAL_NAME: &str = "Quick Look - Foo-Bar.mp4_hd.part";

fn item(server: &MockServer) -> PendingTransfer {
    PendingTransfer {
        id: 42,
        file_name: FILE_NAME.to_string(),
        published_at: parse_publish_date("2021-01-01 10:00:00").unwrap(),
        source_url: format!("{}/v/clip_4000.mp4", server.uri()),
        category: None,
    }
}

fn engine(dir: &Path) -> TransferEngine {
    TransferEngine::new(
        HttpClient::new().unwrap().with_api_key("secret"),
        TransferSettings::new(dir, Quality::Hd),
    )
}

#[tokio::test]
async fn test_fresh_transfer_writes_final_file_and_records() {
    let server = MockServer::start().await;
    let content = b"0123456789abcdef".repeat(1000);
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .and(query_param("api_key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let store = CatalogStore::new_in_memory().await.unwrap();

    let outcome = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .expect("transfer succeeds");

    assert!(matches!(
        outcome,
        TransferOutcome::Completed {
            bytes: 16_000,
            already_present: false
        }
    ));
    assert_eq!(std::fs::read(temp_dir.path().join(FILE_NAME)).unwrap(), content);
    assert!(!temp_dir.path().join(PARTIAL_NAME).exists());

    let record = store.get(42).await.unwrap().expect("record written");
    assert_eq!(record.file_name, FILE_NAME);
    assert!(!record.source_url.contains("secret"));
}

#[tokio::test]
async fn test_resume_appends_from_partial_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .and(header("range", "bytes=6-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 6-11/12")
                .set_body_bytes(b"world!".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"hello ").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let outcome = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .expect("transfer succeeds");

    assert!(matches!(outcome, TransferOutcome::Completed { bytes: 12, .. }));
    assert_eq!(
        std::fs::read(temp_dir.path().join(FILE_NAME)).unwrap(),
        b"hello world!"
    );
    assert!(store.contains(42).await.unwrap());
}

#[tokio::test]
async fn test_short_stream_keeps_partial_and_writes_no_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .and(header("range", "bytes=6-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 6-19/20")
                .set_body_bytes(b"world!".to_vec()),
        )
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"hello ").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let outcome = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .expect("transfer returns an outcome");

    let TransferOutcome::PartiallyDownloaded(state) = outcome else {
        panic!("expected partial outcome, got {outcome:?}");
    };
    assert_eq!(state.bytes_on_disk, 12);
    assert_eq!(state.expected_total_bytes, Some(20));
    assert_eq!(state.mode, TransferMode::Resuming);
    assert_eq!(
        std::fs::read(temp_dir.path().join(PARTIAL_NAME)).unwrap(),
        b"hello world!"
    );
    assert!(!temp_dir.path().join(FILE_NAME).exists());
    assert!(!store.contains(42).await.unwrap());
}

#[tokio::test]
async fn test_server_ignoring_range_restarts_from_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"complete body".to_vec()))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"stale").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let outcome = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .expect("transfer succeeds");

    assert!(matches!(outcome, TransferOutcome::Completed { bytes: 13, .. }));
    assert_eq!(
        std::fs::read(temp_dir.path().join(FILE_NAME)).unwrap(),
        b"complete body"
    );
}

#[tokio::test]
async fn test_unsatisfiable_range_on_complete_partial_promotes_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .and(header("range", "bytes=6-"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */6"))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"abcdef").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let outcome = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .expect("transfer succeeds");

    assert!(matches!(outcome, TransferOutcome::Completed { bytes: 6, .. }));
    assert_eq!(std::fs::read(temp_dir.path().join(FILE_NAME)).unwrap(), b"abcdef");
    assert!(store.contains(42).await.unwrap());
}

#[tokio::test]
async fn test_oversized_partial_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */4"))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"abcdef").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let err = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::OversizedPartial { on_disk: 6, total: 4, .. }));
    assert!(!temp_dir.path().join(PARTIAL_NAME).exists());
    assert!(!store.contains(42).await.unwrap());
}

#[tokio::test]
async fn test_http_error_is_per_item_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let err = engine(temp_dir.path())
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::HttpStatus { status: 404, .. }));
    assert!(!err.is_retryable());
    assert!(!temp_dir.path().join(PARTIAL_NAME).exists());
    assert!(!store.contains(42).await.unwrap());
}

#[tokio::test]
async fn test_stalled_response_times_out_and_keeps_partial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 3-5/6")
                .set_body_bytes(b"def".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"abc").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();

    let mut settings = TransferSettings::new(temp_dir.path(), Quality::Hd);
    settings.idle_timeout = Duration::from_millis(200);
    let engine = TransferEngine::new(HttpClient::new().unwrap(), settings);

    let err = engine
        .transfer(&item(&server), &store, &InterruptSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Timeout { .. }), "{err:?}");
    assert!(err.is_retryable());
    assert_eq!(std::fs::read(temp_dir.path().join(PARTIAL_NAME)).unwrap(), b"abc");
    assert!(!store.contains(42).await.unwrap());
}

#[tokio::test]
async fn test_interrupt_while_waiting_leaves_partial_and_no_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/clip_4000.mp4"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 3-5/6")
                .set_body_bytes(b"def".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(PARTIAL_NAME), b"abc").unwrap();
    let store = CatalogStore::new_in_memory().await.unwrap();
    let signal = InterruptSignal::new();

    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
    });

    let outcome = engine(temp_dir.path())
        .transfer(&item(&server), &store, &signal)
        .await
        .expect("interrupt is not an error");

    let TransferOutcome::Interrupted(ctx) = outcome else {
        panic!("expected interrupted outcome, got {outcome:?}");
    };
    assert!(ctx.state.bytes_on_disk >= 3);
    assert_eq!(ctx.partial_path, temp_dir.path().join(PARTIAL_NAME));
    assert!(ctx.partial_path.exists());
    assert!(!temp_dir.path().join(FILE_NAME).exists());
    assert!(!store.contains(42).await.unwrap());
}
