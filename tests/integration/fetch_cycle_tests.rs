//! Integration tests for the fetch cycle
//!
//! These tests use wiremock to create mock feed servers and run full
//! cycles against an on-disk SQLite store.

use feedpulse::config::{Settings, SourceDescriptor};
use feedpulse::fetch::Scheduler;
use feedpulse::normalize::FeedShape;
use feedpulse::state::TaskState;
use feedpulse::storage::{AttemptStatus, SqliteStorage, Storage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    _dir: TempDir,
    storage: Arc<SqliteStorage>,
    scheduler: Scheduler<SqliteStorage>,
}

/// Creates a scheduler over a fresh database with fast retries
fn harness(settings: Settings) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = Arc::new(
        SqliteStorage::new(&dir.path().join("feedpulse.db")).expect("Failed to open storage"),
    );
    let scheduler =
        Scheduler::new(Arc::clone(&storage), settings).expect("Failed to build scheduler");
    Harness {
        _dir: dir,
        storage,
        scheduler,
    }
}

fn fast_settings() -> Settings {
    Settings {
        max_concurrency: 4,
        default_timeout_secs: 5,
        retry_max: 3,
        retry_base_delay_ms: 10,
        ..Settings::default()
    }
}

fn source(server: &MockServer, name: &str, shape: Option<FeedShape>) -> SourceDescriptor {
    SourceDescriptor::new(name, &format!("{}/{}", server.uri(), name), shape)
}

async fn mount_json(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/json"),
        )
        .mount(server)
        .await;
}

async fn run(h: &Harness, sources: &[SourceDescriptor]) -> Vec<feedpulse::FetchOutcome> {
    h.scheduler
        .run_cycle(sources, &CancellationToken::new())
        .await
        .expect("cycle failed")
}

#[tokio::test]
async fn test_list_of_ids_cycle() {
    let server = MockServer::start().await;
    mount_json(&server, "/hn", "[1,2,3]").await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "hn", Some(FeedShape::ListOfIds))]).await;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert!(outcome.success);
    assert_eq!(outcome.state, TaskState::Success);
    assert_eq!(outcome.item_count, 3);
    assert_eq!(outcome.new_item_count, 3);
    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.attempts, 1);

    let items = h.storage.get_items(Some("hn"), None).unwrap();
    assert_eq!(items.len(), 3);
    let mut titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["HN Story 1", "HN Story 2", "HN Story 3"]);
    assert!(items.iter().all(|i| i.created_at.is_some()));
}

#[tokio::test]
async fn test_partial_payload_is_still_success() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/gh",
        r#"{"items":[{"full_name":"a/b","html_url":"https://x"},{"full_name":"c/d"}]}"#,
    )
    .await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "gh", Some(FeedShape::NestedItemsArray))]).await;

    let outcome = &outcomes[0];
    assert!(outcome.success);
    assert_eq!(outcome.item_count, 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("item 1"));
    assert!(outcome.warnings[0].contains("html_url"));

    let items = h.storage.get_items(Some("gh"), None).unwrap();
    assert_eq!(items[0].title, "a/b");

    let log = h.storage.get_audit_log("gh").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, AttemptStatus::Success);
    assert_eq!(log[0].item_count, 1);
}

#[tokio::test]
async fn test_malformed_json_fails_source() {
    let server = MockServer::start().await;
    mount_json(&server, "/broken", "{invalid").await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "broken", Some(FeedShape::FlatObjectArray))]).await;

    let outcome = &outcomes[0];
    assert!(!outcome.success);
    assert_eq!(outcome.state, TaskState::Failed);
    assert_eq!(outcome.item_count, 0);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.error.as_deref().unwrap().contains("malformed JSON"));
    // A bad body is not retried
    assert_eq!(outcome.attempts, 1);

    assert_eq!(h.storage.count_items("broken").unwrap(), 0);
    let log = h.storage.get_audit_log("broken").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, AttemptStatus::Error);
}

#[tokio::test]
async fn test_second_cycle_adds_nothing() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/lobsters",
        r#"[{"title":"One","url":"https://one","tags":["rust"]},
            {"title":"Two","url":"","comments_url":"https://lobste.rs/s/two"}]"#,
    )
    .await;

    let h = harness(fast_settings());
    let sources = vec![source(&server, "lobsters", Some(FeedShape::FlatObjectArray))];

    let first = run(&h, &sources).await;
    assert_eq!(first[0].new_item_count, 2);
    let count_after_first = h.storage.count_all_items().unwrap();

    let second = run(&h, &sources).await;
    assert!(second[0].success);
    assert_eq!(second[0].item_count, 2);
    assert_eq!(second[0].new_item_count, 0);
    assert_eq!(h.storage.count_all_items().unwrap(), count_after_first);

    assert_eq!(h.storage.get_audit_log("lobsters").unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "down", Some(FeedShape::ListOfIds))]).await;

    let outcome = &outcomes[0];
    assert_eq!(outcome.state, TaskState::Failed);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(outcome.error.as_deref(), Some("HTTP 503"));

    // One audit row for the whole cycle, not one per attempt
    let log = h.storage.get_audit_log("down").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, AttemptStatus::Error);
    assert_eq!(log[0].error_message.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "gone", Some(FeedShape::ListOfIds))]).await;

    assert_eq!(outcomes[0].state, TaskState::Failed);
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(outcomes[0].error.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(&server, "/busy", "[7]").await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "busy", Some(FeedShape::ListOfIds))]).await;

    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].attempts, 2);
    assert_eq!(outcomes[0].item_count, 1);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_json(&server, "/flaky", "[1]").await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "flaky", Some(FeedShape::ListOfIds))]).await;

    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].attempts, 3);

    let log = h.storage.get_audit_log("flaky").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, AttemptStatus::Success);
}

#[tokio::test]
async fn test_timeout_is_retried_with_fresh_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[1]")
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(&server, "/slow", "[1]").await;

    let h = harness(fast_settings());
    let mut slow = source(&server, "slow", Some(FeedShape::ListOfIds));
    slow.timeout_secs = Some(1);

    let outcomes = run(&h, &[slow]).await;
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].attempts, 2);
}

#[tokio::test]
async fn test_one_failing_source_does_not_block_others() {
    let server = MockServer::start().await;
    mount_json(&server, "/first", "[1,2]").await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_json(&server, "/third", "[3]").await;

    let h = harness(Settings {
        retry_max: 1,
        ..fast_settings()
    });
    let sources = vec![
        source(&server, "first", Some(FeedShape::ListOfIds)),
        source(&server, "broken", Some(FeedShape::ListOfIds)),
        source(&server, "third", Some(FeedShape::ListOfIds)),
    ];
    let outcomes = run(&h, &sources).await;

    let names: Vec<_> = outcomes.iter().map(|o| o.source.as_str()).collect();
    assert_eq!(names, vec!["first", "broken", "third"]);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[1].state, TaskState::Failed);
    assert_eq!(outcomes[1].attempts, 2);
    assert!(outcomes[2].success);
    assert_eq!(h.storage.count_all_items().unwrap(), 3);
}

#[tokio::test]
async fn test_outcomes_follow_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[1]")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_json(&server, "/fast", "[2]").await;

    let h = harness(fast_settings());
    let sources = vec![
        source(&server, "slow", Some(FeedShape::ListOfIds)),
        source(&server, "fast", Some(FeedShape::ListOfIds)),
    ];
    let outcomes = run(&h, &sources).await;

    assert_eq!(outcomes[0].source, "slow");
    assert_eq!(outcomes[1].source, "fast");
    assert!(outcomes.iter().all(|o| o.success));
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[1]")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let h = harness(Settings {
        max_concurrency: 1,
        ..fast_settings()
    });
    let sources: Vec<_> = (0..3)
        .map(|n| source(&server, &format!("s{}", n), Some(FeedShape::ListOfIds)))
        .collect();

    let started = Instant::now();
    let outcomes = run(&h, &sources).await;

    assert!(outcomes.iter().all(|o| o.success));
    assert!(
        started.elapsed() >= Duration::from_millis(600),
        "sources overlapped: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_cancellation_mid_cycle() {
    let server = MockServer::start().await;
    mount_json(&server, "/done-a", "[1]").await;
    mount_json(&server, "/done-b", "[2]").await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[3]")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let h = harness(Settings {
        max_concurrency: 5,
        ..fast_settings()
    });
    let sources: Vec<_> = ["done-a", "done-b", "hung-a", "hung-b", "hung-c"]
        .iter()
        .map(|name| source(&server, name, Some(FeedShape::ListOfIds)))
        .collect();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcomes = h.scheduler.run_cycle(&sources, &cancel).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    let states: Vec<_> = outcomes.iter().map(|o| o.state).collect();
    assert_eq!(
        states,
        vec![
            TaskState::Success,
            TaskState::Success,
            TaskState::Cancelled,
            TaskState::Cancelled,
            TaskState::Cancelled,
        ]
    );

    // Completed work stays; nothing from the in-flight bodies was stored
    assert_eq!(h.storage.count_items("done-a").unwrap(), 1);
    assert_eq!(h.storage.count_items("done-b").unwrap(), 1);
    for name in ["hung-a", "hung-b", "hung-c"] {
        assert_eq!(h.storage.count_items(name).unwrap(), 0);
        let log = h.storage.get_audit_log(name).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].error_message.as_deref(), Some("cancelled"));
    }
}

#[tokio::test]
async fn test_cancellation_while_waiting_for_slot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[1]")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let h = harness(Settings {
        max_concurrency: 1,
        ..fast_settings()
    });
    let sources = vec![
        source(&server, "running", Some(FeedShape::ListOfIds)),
        source(&server, "queued", Some(FeedShape::ListOfIds)),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let outcomes = h.scheduler.run_cycle(&sources, &cancel).await.unwrap();
    assert!(outcomes.iter().all(|o| o.state == TaskState::Cancelled));

    // The in-flight source is audited; the queued one never started
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(h.storage.get_audit_log("running").unwrap().len(), 1);
    assert_eq!(outcomes[1].attempts, 0);
    assert!(h.storage.get_audit_log("queued").unwrap().is_empty());
}

#[tokio::test]
async fn test_aggregate_includes_failing_source() {
    let server = MockServer::start().await;
    mount_json(&server, "/good", "[1,2]").await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let h = harness(Settings {
        retry_max: 0,
        ..fast_settings()
    });
    run(
        &h,
        &[
            source(&server, "good", Some(FeedShape::ListOfIds)),
            source(&server, "bad", Some(FeedShape::ListOfIds)),
        ],
    )
    .await;

    let stats = h.storage.aggregate_stats().unwrap();
    assert_eq!(stats.len(), 2);

    let bad = stats.iter().find(|s| s.source == "bad").unwrap();
    assert_eq!(bad.item_count, 0);
    assert_eq!(bad.error_count, 1);
    assert_eq!(bad.total_attempts, 1);
    assert!(bad.last_success.is_none());
    assert_eq!(bad.last_error.as_deref(), Some("HTTP 502"));

    let good = stats.iter().find(|s| s.source == "good").unwrap();
    assert_eq!(good.item_count, 2);
    assert!(good.last_success.is_some());
}

#[tokio::test]
async fn test_untagged_source_detects_shape() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/reddit",
        r#"{"data":{"children":[
            {"data":{"title":"Hello","url":"https://r/1","created_utc":1700000000,"link_flair_text":"news"}}
        ]}}"#,
    )
    .await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "reddit", None)]).await;
    assert!(outcomes[0].success);

    let items = h.storage.get_items(Some("reddit"), None).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].tags, vec!["news".to_string()]);
    assert_eq!(items[0].timestamp.as_deref(), Some("2023-11-14T22:13:20Z"));
}

#[tokio::test]
async fn test_headers_and_raw_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"title":"T","url":"https://t"}]"#))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(fast_settings());
    let mut private = source(&server, "private", Some(FeedShape::FlatObjectArray));
    private
        .headers
        .insert("Authorization".to_string(), "Bearer token".to_string());
    private.keep_raw = true;

    let outcomes = run(&h, &[private]).await;
    assert!(outcomes[0].success);

    let items = h.storage.get_items(Some("private"), None).unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(items[0].raw_payload.as_deref().unwrap()).unwrap();
    assert_eq!(raw["title"], "T");
}

#[tokio::test]
async fn test_empty_feed_is_success_with_warning() {
    let server = MockServer::start().await;
    mount_json(&server, "/empty", r#"{"items":[]}"#).await;

    let h = harness(fast_settings());
    let outcomes = run(&h, &[source(&server, "empty", Some(FeedShape::NestedItemsArray))]).await;

    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].item_count, 0);
    assert_eq!(outcomes[0].warnings, vec!["no items".to_string()]);
}

#[tokio::test]
async fn test_max_items_caps_stored_items() {
    let server = MockServer::start().await;
    mount_json(&server, "/top", "[9,8,7,6,5]").await;

    let h = harness(fast_settings());
    let mut top = source(&server, "top", Some(FeedShape::ListOfIds));
    top.max_items = Some(3);

    let outcomes = run(&h, &[top]).await;
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].item_count, 3);
    assert_eq!(outcomes[0].new_item_count, 3);
    assert_eq!(h.storage.count_items("top").unwrap(), 3);
}
