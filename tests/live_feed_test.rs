//! Live Feed Integration Tests
//!
//! Runs the feed client against an in-process tungstenite server.

use cloudshield_client::{ClientConfig, FeedCallbacks, FeedEvent, FeedHandle, LiveEvent, LiveFeedClient};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

struct FakeFeed {
    base_url: String,
    request_uri: Arc<Mutex<Option<String>>>,
    task: JoinHandle<()>,
}

/// Accept one connection, send `frames`, then either close or wait for the
/// client to go away
async fn fake_feed(frames: Vec<Message>, close_after: bool) -> FakeFeed {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let request_uri = Arc::new(Mutex::new(None));
    let seen = request_uri.clone();

    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *seen.lock() = Some(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        if close_after {
            let _ = ws.close(None).await;
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    FakeFeed {
        base_url: format!("http://{}", addr),
        request_uri,
        task,
    }
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string())
}

fn client(base_url: &str, buffer: usize) -> LiveFeedClient {
    let mut config = ClientConfig::for_api(base_url);
    config.feed_buffer = buffer;
    LiveFeedClient::new(&config)
}

async fn next(handle: &mut FeedHandle) -> Option<FeedEvent> {
    tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("feed stalled")
}

async fn drain(mut handle: FeedHandle) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    while let Some(event) = next(&mut handle).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_malformed_frame_is_dropped() {
    let feed = fake_feed(
        vec![
            Message::Text("{bad json".to_string()),
            text(json!({"type": "metrics", "data": {"x": 1}})),
        ],
        true,
    )
    .await;

    let handle = client(&feed.base_url, 16).open("tok1").unwrap();
    let events = drain(handle).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        FeedEvent::Message(message) => {
            assert_eq!(message.event(), LiveEvent::Metrics(json!({"x": 1})));
        }
        other => panic!("expected metrics, got {:?}", other),
    }
    feed.task.await.unwrap();
}

#[tokio::test]
async fn test_token_sent_as_query_parameter() {
    let feed = fake_feed(vec![], true).await;

    let handle = client(&feed.base_url, 16).open("tok 1&x").unwrap();
    drain(handle).await;

    assert_eq!(
        feed.request_uri.lock().as_deref(),
        Some("/monitoring/ws?token=tok+1%26x")
    );
}

#[tokio::test]
async fn test_frames_arrive_in_order_with_backpressure() {
    let frames = (0..50)
        .map(|i| text(json!({"type": "new_log", "data": {"id": i}})))
        .collect();
    let feed = fake_feed(frames, true).await;

    // Capacity 1 forces the reader to wait on the consumer
    let mut handle = client(&feed.base_url, 1).open("tok1").unwrap();
    let mut ids = Vec::new();
    while let Some(event) = next(&mut handle).await {
        if let FeedEvent::Message(message) = event {
            tokio::time::sleep(Duration::from_millis(1)).await;
            ids.push(message.data().and_then(|d| d["id"].as_i64()).unwrap());
        }
    }

    assert_eq!(ids, (0..50i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_close_is_idempotent_and_ends_stream() {
    let feed = fake_feed(vec![text(json!({"type": "new_alert", "data": {"id": "a1"}}))], false).await;

    let mut handle = client(&feed.base_url, 16).open("tok1").unwrap();
    assert!(matches!(next(&mut handle).await, Some(FeedEvent::Message(_))));

    handle.close();
    handle.close();
    assert_eq!(next(&mut handle).await, None);
    assert_eq!(next(&mut handle).await, None);

    // Server sees the client go away
    tokio::time::timeout(Duration::from_secs(5), feed.task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_callbacks_close_fires_once() {
    let feed = fake_feed(
        vec![
            text(json!({"type": "metrics", "data": {}})),
            text(json!({"type": "new_log", "data": {"id": "l1"}})),
        ],
        false,
    )
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();

    let callbacks = FeedCallbacks::new(move |frame| {
        let _ = tx.send(frame);
    })
    .on_close(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let subscription = client(&feed.base_url, 16)
        .open_with_callbacks("tok1", callbacks)
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first["type"], "metrics");
    assert_eq!(second["data"]["id"], "l1");

    subscription.close();
    subscription.close();
    // Never synchronously inside close()
    assert_eq!(closes.load(Ordering::SeqCst), 0);

    tokio::time::timeout(Duration::from_secs(5), subscription.closed())
        .await
        .unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_close_fires_on_close() {
    let feed = fake_feed(vec![text(json!({"type": "heartbeat"}))], true).await;

    let messages = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(AtomicUsize::new(0));
    let (seen, counter) = (messages.clone(), closes.clone());

    let callbacks = FeedCallbacks::new(move |frame| seen.lock().push(frame))
        .on_error(|e| panic!("unexpected feed error: {}", e))
        .on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let subscription = client(&feed.base_url, 16)
        .open_with_callbacks("tok1", callbacks)
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), subscription.closed())
        .await
        .unwrap();

    // Unknown discriminators are still forwarded verbatim
    assert_eq!(*messages.lock(), vec![json!({"type": "heartbeat"})]);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connect_failure_reports_error_and_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let errors = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let (error_count, close_count) = (errors.clone(), closes.clone());

    let callbacks = FeedCallbacks::new(|_| panic!("no frames expected"))
        .on_error(move |_| {
            error_count.fetch_add(1, Ordering::SeqCst);
        })
        .on_close(move || {
            close_count.fetch_add(1, Ordering::SeqCst);
        });

    let subscription = client(&format!("http://{}", addr), 16)
        .open_with_callbacks("tok1", callbacks)
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), subscription.closed())
        .await
        .unwrap();

    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
