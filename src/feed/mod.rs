//! Live Monitoring Feed
//!
//! WebSocket client for `/monitoring/ws`. The bearer token is passed as the
//! `token` query parameter at connect time; the connection is never
//! re-authenticated afterwards.
//!
//! # Delivery model
//!
//! - One task owns each connection and reads frames in arrival order.
//! - Parsed frames are pushed into a bounded channel; a slow consumer
//!   back-pressures the socket reader.
//! - Frames that are not valid JSON are logged and dropped.
//! - The end of the event stream is the close notification: it happens
//!   exactly once, after which `next_event()` returns `None`.
//! - No reconnect: a dropped connection simply ends the stream and the owner
//!   decides whether to open a new one.

pub mod frame;

use futures_util::{SinkExt, Stream, StreamExt};
use reqwest::Url;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
pub use frame::{parse_frame, FeedMessage, LiveEvent};

/// Feed connection errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Item yielded by a [`FeedHandle`]
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Message(FeedMessage),
    Error(FeedError),
}

/// Opens live feed connections
#[derive(Debug, Clone)]
pub struct LiveFeedClient {
    feed_url: String,
    connect_timeout: Duration,
    buffer: usize,
}

impl LiveFeedClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            feed_url: config.feed_url(),
            connect_timeout: config.ws_connect_timeout,
            buffer: config.feed_buffer.max(1),
        }
    }

    /// Endpoint with the token attached
    pub fn endpoint(&self, token: &str) -> Result<Url, FeedError> {
        let mut url =
            Url::parse(&self.feed_url).map_err(|e| FeedError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    /// Open a connection. Returns immediately; connect failures arrive as a
    /// [`FeedEvent::Error`] followed by the end of the stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn open(&self, token: &str) -> Result<FeedHandle, FeedError> {
        let url = self.endpoint(token)?;
        let (events_tx, events_rx) = mpsc::channel(self.buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        debug!("Opening live feed: {}", self.feed_url);

        let connection = Connection {
            events: events_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(connection.run(url, self.connect_timeout));

        Ok(FeedHandle {
            events: ReceiverStream::new(events_rx),
            control: FeedControl { shutdown: shutdown_tx },
            task,
        })
    }

    /// Open a connection and dispatch to callbacks.
    ///
    /// Callbacks run on a single dispatcher task, one frame at a time, in
    /// arrival order. `on_message` receives every parsed frame verbatim.
    pub fn open_with_callbacks(
        &self,
        token: &str,
        callbacks: FeedCallbacks,
    ) -> Result<FeedSubscription, FeedError> {
        let (events, control, _connection) = self.open(token)?.into_parts();
        let dispatcher = tokio::spawn(dispatch(events, callbacks));
        Ok(FeedSubscription { control, dispatcher })
    }
}

/// Handle to one live feed connection
///
/// Dropping the handle closes the connection.
pub struct FeedHandle {
    events: ReceiverStream<FeedEvent>,
    control: FeedControl,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Next event, or None once the connection is closed
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events.next().await
    }

    /// Request the connection to close. Idempotent; the stream ends
    /// asynchronously once the connection task has shut down.
    pub fn close(&self) {
        self.control.close();
    }

    pub fn is_closing(&self) -> bool {
        self.control.is_closing()
    }

    /// Close and wait for the connection task to finish
    pub async fn shutdown(self) {
        self.control.close();
        let Self { events, control, task } = self;
        drop(events);
        let _ = task.await;
        drop(control);
    }

    fn into_parts(self) -> (ReceiverStream<FeedEvent>, FeedControl, JoinHandle<()>) {
        (self.events, self.control, self.task)
    }
}

impl Stream for FeedHandle {
    type Item = FeedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FeedEvent>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

/// Callbacks for [`LiveFeedClient::open_with_callbacks`]
pub struct FeedCallbacks {
    on_message: Box<dyn FnMut(Value) + Send>,
    on_error: Option<Box<dyn FnMut(FeedError) + Send>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedCallbacks {
    pub fn new(on_message: impl FnMut(Value) + Send + 'static) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_error: None,
            on_close: None,
        }
    }

    pub fn on_error(mut self, on_error: impl FnMut(FeedError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Called once when the connection ends, whatever the cause
    pub fn on_close(mut self, on_close: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }
}

/// Callback-driven feed connection
///
/// Dropping the subscription closes the connection; `on_close` still runs.
pub struct FeedSubscription {
    control: FeedControl,
    dispatcher: JoinHandle<()>,
}

impl FeedSubscription {
    /// Request the connection to close. Idempotent; `on_close` runs later on
    /// the dispatcher task, never inside this call.
    pub fn close(&self) {
        self.control.close();
    }

    pub fn is_closing(&self) -> bool {
        self.control.is_closing()
    }

    /// Wait until the connection has ended and `on_close` has run
    pub async fn closed(self) {
        let Self { control, dispatcher } = self;
        let _ = dispatcher.await;
        drop(control);
    }
}

async fn dispatch(mut events: ReceiverStream<FeedEvent>, mut callbacks: FeedCallbacks) {
    while let Some(event) = events.next().await {
        match event {
            FeedEvent::Message(message) => (callbacks.on_message)(message.into_raw()),
            FeedEvent::Error(e) => {
                if let Some(on_error) = callbacks.on_error.as_mut() {
                    on_error(e);
                }
            }
        }
    }

    if let Some(on_close) = callbacks.on_close.take() {
        on_close();
    }
}

/// Close signal shared between a handle and its connection task
struct FeedControl {
    shutdown: watch::Sender<bool>,
}

impl FeedControl {
    fn close(&self) {
        let first = self.shutdown.send_if_modified(|closing| {
            if *closing {
                false
            } else {
                *closing = true;
                true
            }
        });
        if first {
            debug!("Live feed close requested");
        }
    }

    fn is_closing(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolves once a close is requested or the owning handle is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

struct Connection {
    events: mpsc::Sender<FeedEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    async fn run(mut self, url: Url, connect_timeout: Duration) {
        let connect = tokio::time::timeout(connect_timeout, connect_async(url.as_str()));

        let connected = tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => None,
            result = connect => Some(result),
        };

        let socket = match connected {
            None => {
                debug!("Live feed closed before connecting");
                return;
            }
            Some(Ok(Ok((socket, _response)))) => socket,
            Some(Ok(Err(e))) => {
                warn!("Live feed connection failed: {}", e);
                self.deliver(FeedEvent::Error(FeedError::Connect(e.to_string())))
                    .await;
                return;
            }
            Some(Err(_)) => {
                warn!("Live feed connection timed out after {:?}", connect_timeout);
                self.deliver(FeedEvent::Error(FeedError::Timeout(connect_timeout)))
                    .await;
                return;
            }
        };

        info!("Live feed connected");
        let (mut sink, mut stream) = socket.split();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => None,
                frame = stream.next() => Some(frame),
            };

            let message = match next {
                None => {
                    let _ = sink.close().await;
                    break;
                }
                Some(None) => {
                    info!("Live feed disconnected");
                    break;
                }
                Some(Some(Err(e))) => {
                    warn!("Live feed transport error: {}", e);
                    self.deliver(FeedEvent::Error(FeedError::Transport(e.to_string())))
                        .await;
                    break;
                }
                Some(Some(Ok(message))) => message,
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("Dropping non-UTF-8 binary feed frame");
                        continue;
                    }
                },
                Message::Close(reason) => {
                    info!("Live feed closed by server: {:?}", reason);
                    break;
                }
                // ping/pong handled by tungstenite
                _ => continue,
            };

            match parse_frame(&text) {
                Ok(message) => {
                    if !self.deliver(FeedEvent::Message(message)).await {
                        let _ = sink.close().await;
                        break;
                    }
                }
                Err(e) => warn!("Dropping malformed feed frame: {}", e),
            }
        }

        debug!("Live feed connection task finished");
    }

    /// Push an event to the consumer. False if the consumer is gone or a
    /// close was requested while waiting for capacity.
    async fn deliver(&mut self, event: FeedEvent) -> bool {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }
}
