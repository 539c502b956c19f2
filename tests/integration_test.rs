//! Integration tests for the record/replay cycle

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tempfile::TempDir;

use snapreplay::recording::REPORT_FILE;
use snapreplay::replay::compression::decode_header;
use snapreplay::storage::{file_name_for, SnapshotRecord};
use snapreplay::{Config, Mode, Request, Response, SnapError, SnapshotSession};

fn session(mode: Mode, temp_dir: &TempDir) -> SnapshotSession {
    SnapshotSession::new(Config::new(mode, temp_dir.path()))
}

/// Drive one request through the session, answering live with `live`
async fn exchange(
    session: &SnapshotSession,
    request: &Request,
    live: &Response,
) -> snapreplay::Result<(Response, Option<Arc<SnapshotRecord>>)> {
    let decision = session.on_request(request).await?;
    if let Some(replayed) = decision.response {
        return Ok((replayed, None));
    }
    let written = session.on_response(&decision.context, request, live).await?;
    Ok((live.clone(), written))
}

fn xkcd_request() -> Request {
    Request::new("GET", "https://xkcd.com/info.0.json")
}

fn xkcd_response() -> Response {
    Response::new(200, "OK")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"num":614,"title":"Woodpecker"}"#)
}

#[tokio::test]
async fn test_read_miss_reports_expected_file() {
    let temp_dir = TempDir::new().unwrap();
    let reader = session(Mode::Read, &temp_dir);

    let err = reader.on_request(&xkcd_request()).await.unwrap_err();
    let missing = err.as_missing().expect("missing snapshot error");

    let expected = file_name_for("get-xkcd-com-info-0", "GET#https://xkcd.com/info.0.json#");
    assert_eq!(missing.expected_file, expected);
    assert_eq!(missing.expected_suffix_key, "GET#https://xkcd.com/info.0.json#");

    let text = err.to_string();
    assert!(text.contains("GET https://xkcd.com/info.0.json"));
    assert!(text.contains(&expected));
}

#[tokio::test]
async fn test_record_then_replay() {
    let temp_dir = TempDir::new().unwrap();

    {
        let writer = session(Mode::Update, &temp_dir);
        let (_, written) = exchange(&writer, &xkcd_request(), &xkcd_response())
            .await
            .unwrap();
        assert!(written.is_some());
    }

    let reader = session(Mode::Read, &temp_dir);
    let decision = reader.on_request(&xkcd_request()).await.unwrap();
    let replayed = decision.response.expect("replayed response");

    assert_eq!(replayed.status, 200);
    assert_eq!(replayed.status_text, "OK");
    assert_eq!(&replayed.body[..], br#"{"num":614,"title":"Woodpecker"}"#);
}

#[tokio::test]
async fn test_gzip_replay_recompresses_and_fixes_length() {
    let temp_dir = TempDir::new().unwrap();
    let plain = r#"{"num":614,"title":"Woodpecker","safe_title":"Woodpecker"}"#;
    let live = Response::new(200, "OK")
        .with_header("Content-Type", "application/json")
        .with_header("Content-Encoding", "gzip")
        .with_header("Content-Length", "79")
        .with_body(plain);

    {
        let writer = session(Mode::Update, &temp_dir);
        exchange(&writer, &xkcd_request(), &live).await.unwrap();
    }

    let reader = session(Mode::Read, &temp_dir);
    let replayed = reader
        .on_request(&xkcd_request())
        .await
        .unwrap()
        .response
        .unwrap();

    assert_eq!(replayed.header("content-encoding"), Some("gzip"));
    assert_eq!(
        replayed.header("content-length"),
        Some(replayed.body.len().to_string().as_str())
    );
    assert_eq!(decode_header(&replayed.body, "gzip").unwrap(), plain.as_bytes());
}

#[tokio::test]
async fn test_append_captures_once_then_replays() {
    let temp_dir = TempDir::new().unwrap();
    let appender = session(Mode::Append, &temp_dir);

    let first = appender.on_request(&xkcd_request()).await.unwrap();
    assert!(first.response.is_none(), "first request goes live");
    let written = appender
        .on_response(&first.context, &xkcd_request(), &xkcd_response())
        .await
        .unwrap();
    assert!(written.is_some());

    let second = appender.on_request(&xkcd_request()).await.unwrap();
    assert!(second.context.replayed);
    let rewritten = appender
        .on_response(&second.context, &xkcd_request(), &xkcd_response())
        .await
        .unwrap();
    assert!(rewritten.is_none());

    assert_eq!(appender.store_stats().disk_writes, 1);
}

#[tokio::test]
async fn test_append_does_not_touch_existing_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    {
        let writer = session(Mode::Update, &temp_dir);
        exchange(&writer, &xkcd_request(), &xkcd_response()).await.unwrap();
    }

    let appender = session(Mode::Append, &temp_dir);
    let changed = Response::new(500, "Internal Server Error");
    let (response, written) = exchange(&appender, &xkcd_request(), &changed).await.unwrap();

    assert_eq!(response.status, 200);
    assert!(written.is_none());
    assert_eq!(appender.store_stats().disk_writes, 0);
}

#[tokio::test]
async fn test_renamed_snapshot_is_suggested() {
    let temp_dir = TempDir::new().unwrap();
    let identity = {
        let writer = session(Mode::Update, &temp_dir);
        let decision = writer.on_request(&xkcd_request()).await.unwrap();
        writer
            .on_response(&decision.context, &xkcd_request(), &xkcd_response())
            .await
            .unwrap();
        decision.context.identity.unwrap()
    };

    let renamed = temp_dir.path().join("get-xkcd-com-info-0-by-hand.json");
    std::fs::rename(&identity.absolute_path, &renamed).unwrap();

    let reader = session(Mode::Read, &temp_dir);
    let err = reader.on_request(&xkcd_request()).await.unwrap_err();
    let suggestion = err.as_missing().unwrap().suggestion.clone().unwrap();

    assert!(suggestion.contains("get-xkcd-com-info-0-by-hand.json"));
    assert!(suggestion.contains("same suffix key"));
    assert!(suggestion.contains(identity.file_name()));
}

#[tokio::test]
async fn test_changed_body_gets_diff_suggestion() {
    let temp_dir = TempDir::new().unwrap();
    let request = |qty: u32| {
        Request::new("POST", "https://shop.example.com/cart")
            .with_header("Content-Type", "application/json")
            .with_body(format!(r#"{{"sku":"A-100","qty":{qty}}}"#))
    };
    {
        let writer = session(Mode::Update, &temp_dir);
        exchange(&writer, &request(1), &Response::new(201, "Created"))
            .await
            .unwrap();
    }

    let reader = session(Mode::Read, &temp_dir);
    let err = reader.on_request(&request(2)).await.unwrap_err();
    let suggestion = err.as_missing().unwrap().suggestion.clone().unwrap();

    assert!(suggestion.contains("differs in"));
    assert!(suggestion.contains("[-1-]{+2+}"));
}

/// Deterministic lowercase text, distinct per seed
fn noise(seed: u64, len: usize) -> String {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            char::from(b'a' + ((state >> 33) % 26) as u8)
        })
        .collect()
}

#[tokio::test]
async fn test_large_changed_body_misses_promptly() {
    let temp_dir = TempDir::new().unwrap();
    let request = |seed: u64| {
        Request::new("POST", "https://search.example.com/query")
            .with_header("Content-Type", "text/plain")
            .with_body(noise(seed, 30_000))
    };
    {
        let writer = session(Mode::Update, &temp_dir);
        exchange(&writer, &request(1), &Response::new(200, "OK"))
            .await
            .unwrap();
    }

    let reader = session(Mode::Read, &temp_dir);
    let started = Instant::now();
    let err = reader.on_request(&request(2)).await.unwrap_err();

    assert!(err.as_missing().unwrap().suggestion.is_none());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_concurrent_responses_write_once() {
    let temp_dir = TempDir::new().unwrap();
    let writer = session(Mode::Update, &temp_dir);
    let request = xkcd_request();
    let response = xkcd_response();

    let decision = writer.on_request(&request).await.unwrap();
    let results = join_all(
        (0..16).map(|_| writer.on_response(&decision.context, &request, &response)),
    )
    .await;

    let records: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
    assert!(records.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(writer.store_stats().disk_writes, 1);
    assert_eq!(writer.snapshots_written(), 1);
}

#[tokio::test]
async fn test_update_overwrites_across_runs() {
    let temp_dir = TempDir::new().unwrap();

    for title in ["First", "Second"] {
        let writer = session(Mode::Update, &temp_dir);
        let live = Response::new(200, "OK")
            .with_header("Content-Type", "application/json")
            .with_body(format!(r#"{{"title":"{title}"}}"#));
        exchange(&writer, &xkcd_request(), &live).await.unwrap();
    }

    let reader = session(Mode::Read, &temp_dir);
    let replayed = reader
        .on_request(&xkcd_request())
        .await
        .unwrap()
        .response
        .unwrap();
    assert_eq!(&replayed.body[..], br#"{"title":"Second"}"#);
}

#[tokio::test]
async fn test_ignored_request_in_read_mode() {
    let temp_dir = TempDir::new().unwrap();
    let mut reader = session(Mode::Read, &temp_dir);
    reader.set_ignore_predicate(|request: &Request| request.url.starts_with("https://xkcd.com"));

    let err = reader.on_request(&xkcd_request()).await.unwrap_err();
    assert!(matches!(err, SnapError::IgnoredRequest { .. }));
}

#[tokio::test]
async fn test_unused_snapshot_report() {
    let temp_dir = TempDir::new().unwrap();
    let other = Request::new("GET", "https://xkcd.com/614/info.0.json");
    {
        let writer = session(Mode::Update, &temp_dir);
        exchange(&writer, &xkcd_request(), &xkcd_response()).await.unwrap();
        exchange(&writer, &other, &xkcd_response()).await.unwrap();
    }

    let reader = session(Mode::Read, &temp_dir);
    reader.on_request(&xkcd_request()).await.unwrap();
    let report = reader.finalize().await.unwrap().unwrap();

    assert_eq!(report.unused.len(), 1);
    assert!(report.unused[0].starts_with("get-xkcd-com-614-info-0-"));
    let content = std::fs::read_to_string(temp_dir.path().join(REPORT_FILE)).unwrap();
    assert_eq!(content, format!("{}\n", report.unused[0]));

    // A clean run removes the stale report
    let reader = session(Mode::Read, &temp_dir);
    reader.on_request(&xkcd_request()).await.unwrap();
    reader.on_request(&other).await.unwrap();
    assert!(reader.finalize().await.unwrap().unwrap().is_clean());
    assert!(!temp_dir.path().join(REPORT_FILE).exists());
}

#[tokio::test]
async fn test_scoped_snapshots_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut writer = session(Mode::Update, &temp_dir);
        writer.set_scope(Some("comic_test")).unwrap();
        exchange(&writer, &xkcd_request(), &xkcd_response()).await.unwrap();
    }

    let mut reader = session(Mode::Read, &temp_dir);
    assert!(reader.on_request(&xkcd_request()).await.is_err());

    reader.set_scope(Some("comic_test")).unwrap();
    let decision = reader.on_request(&xkcd_request()).await.unwrap();
    assert!(decision.context.replayed);
    assert!(reader.consulted()[0].starts_with("comic_test/"));
}

#[tokio::test]
async fn test_binary_body_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let image = Request::new("GET", "https://imgs.xkcd.com/comics/woodpecker.png");
    let live = Response::new(200, "OK")
        .with_header("Content-Type", "image/png")
        .with_body(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff]);

    {
        let writer = session(Mode::Update, &temp_dir);
        exchange(&writer, &image, &live).await.unwrap();
    }

    let reader = session(Mode::Read, &temp_dir);
    let replayed = reader.on_request(&image).await.unwrap().response.unwrap();
    assert_eq!(replayed.body, live.body);
}
