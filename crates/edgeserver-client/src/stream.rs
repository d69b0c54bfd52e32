//! Pull-based consumer for the `message/sse` endpoint.
//!
//! Opening a [`BotStream`] spawns one producer task that owns the HTTP
//! response. Decoded events flow to the consumer through a bounded channel;
//! the consumer pulls them with [`BotStream::advance`] and reads the latest
//! one with [`BotStream::current`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt as _;
use reqwest::header::ACCEPT;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::api::API_KEY_HEADER;
use crate::config::{EdgeServerConfig, FrameErrorPolicy};
use crate::errors::{ClientError, StreamError};
use crate::event::BotEvent;
use crate::message::BotMessage;
use crate::policy::ReconnectPolicy;
use crate::sse::{SseDecoder, SseFrame, decode_frame};

type StreamItem = Result<BotEvent, StreamError>;

/// Caller-owned cancellation signal.
///
/// Clones share the same signal. Aborting wakes a pending
/// [`BotStream::advance`], which then reports [`StreamError::Cancelled`], and
/// makes the producer drop its connection.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the flag flips to `true`. Never resolves if the sender side
/// is gone without having been set.
async fn flag_raised(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Lifecycle of a [`BotStream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Open,
    /// The server ended the body cleanly.
    Finished,
    /// A terminal error is available from [`BotStream::last_error`].
    Errored,
    Closed,
}

#[derive(Debug)]
struct Inner {
    state: StreamState,
    current: Option<Arc<BotEvent>>,
    error: Option<StreamError>,
}

enum Wake {
    Item(Option<StreamItem>),
    Aborted,
    Closed,
}

/// Event stream for one conversational turn.
///
/// All methods take `&self`; the stream can be shared (e.g. in an `Arc`) so one
/// task consumes while another closes it.
pub struct BotStream {
    inner: Mutex<Inner>,
    rx: tokio::sync::Mutex<mpsc::Receiver<StreamItem>>,
    abort: AbortHandle,
    close_tx: watch::Sender<bool>,
    channel_id: String,
}

impl BotStream {
    /// Validates `config` and `message`, then starts streaming the turn.
    ///
    /// Nothing is sent before this returns; connection failures are reported
    /// through [`advance`](Self::advance) and [`last_error`](Self::last_error).
    pub async fn open(
        config: &EdgeServerConfig,
        message: BotMessage,
        abort: AbortHandle,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let http = config.build_http_client()?;
        Self::start(http, config, message, abort)
    }

    pub(crate) fn start(
        http: reqwest::Client,
        config: &EdgeServerConfig,
        message: BotMessage,
        abort: AbortHandle,
    ) -> Result<Self, ClientError> {
        message.validate()?;
        let url = config.endpoint(&["message", "sse"])?;
        let (tx, rx) = mpsc::channel(config.stream_buffer_capacity.max(1));

        info!(
            event = "stream.open",
            domain = "edgeserver",
            namespace = %config.namespace,
            bot_provider = %config.bot_provider_name,
            channel_id = %message.custom_channel_id,
            message_id = %message.custom_message_id,
            "opening event stream"
        );

        let channel_id = message.custom_channel_id.clone();
        let producer = Producer {
            http,
            url,
            api_key: config.api_key.clone(),
            message,
            reconnect: config.reconnect.clone(),
            frame_error_policy: config.frame_error_policy,
            max_frame_bytes: config.max_frame_bytes,
            tx,
        };
        tokio::spawn(run_producer(producer, abort.subscribe()));

        Ok(Self::with_receiver(rx, abort, channel_id))
    }

    fn with_receiver(
        rx: mpsc::Receiver<StreamItem>,
        abort: AbortHandle,
        channel_id: String,
    ) -> Self {
        let (close_tx, _close_rx) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner {
                state: StreamState::Open,
                current: None,
                error: None,
            }),
            rx: tokio::sync::Mutex::new(rx),
            abort,
            close_tx,
            channel_id,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to the next event.
    ///
    /// Returns `true` when [`current`](Self::current) holds a new event, and
    /// `false` once the stream has ended, failed, been aborted or been closed.
    /// After the first `false`, every later call returns `false` without
    /// waiting.
    pub async fn advance(&self) -> bool {
        if self.lock().state != StreamState::Open {
            return false;
        }

        let mut close_rx = self.close_tx.subscribe();
        let mut abort_rx = self.abort.subscribe();

        let mut rx = tokio::select! {
            biased;
            _ = flag_raised(&mut close_rx) => return false,
            guard = self.rx.lock() => guard,
        };

        let wake = tokio::select! {
            biased;
            _ = flag_raised(&mut close_rx) => Wake::Closed,
            _ = flag_raised(&mut abort_rx) => Wake::Aborted,
            item = rx.recv() => Wake::Item(item),
        };

        let mut inner = self.lock();
        if inner.state != StreamState::Open {
            rx.close();
            return false;
        }
        match wake {
            Wake::Item(Some(Ok(event))) => {
                if let Some(detail) = event.run_error() {
                    warn!(
                        event = "stream.run_error",
                        domain = "edgeserver",
                        channel_id = %self.channel_id,
                        request_id = %event.request_id,
                        code = %detail.code,
                        "run reported an error"
                    );
                    inner.error = Some(StreamError::Run {
                        request_id: event.request_id.clone(),
                        event_id: event.event_id.clone(),
                        detail: detail.clone(),
                    });
                    inner.state = StreamState::Errored;
                    rx.close();
                    return false;
                }
                inner.current = Some(Arc::new(event));
                true
            }
            Wake::Item(Some(Err(err))) => {
                warn!(
                    event = "stream.failed",
                    domain = "edgeserver",
                    channel_id = %self.channel_id,
                    error = %err
                );
                inner.error = Some(err);
                inner.state = StreamState::Errored;
                rx.close();
                false
            }
            Wake::Item(None) => {
                debug!(
                    event = "stream.finished",
                    domain = "edgeserver",
                    channel_id = %self.channel_id
                );
                inner.state = StreamState::Finished;
                false
            }
            Wake::Aborted => {
                info!(
                    event = "stream.cancelled",
                    domain = "edgeserver",
                    channel_id = %self.channel_id
                );
                inner.error = Some(StreamError::Cancelled);
                inner.state = StreamState::Errored;
                rx.close();
                false
            }
            // close() already moved the state; unreachable past the check above.
            Wake::Closed => {
                rx.close();
                false
            }
        }
    }

    /// The event produced by the last successful [`advance`](Self::advance).
    pub fn current(&self) -> Option<Arc<BotEvent>> {
        self.lock().current.clone()
    }

    /// Terminal error, if the stream ended with one.
    pub fn last_error(&self) -> Option<StreamError> {
        self.lock().error.clone()
    }

    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Stops consuming. Idempotent; wakes a concurrent [`advance`](Self::advance)
    /// and makes the producer drop the connection.
    pub fn close(&self) -> Result<(), ClientError> {
        {
            let mut inner = self.lock();
            if inner.state == StreamState::Closed {
                return Ok(());
            }
            inner.state = StreamState::Closed;
            inner.current = None;
        }
        self.close_tx.send_replace(true);
        // An in-flight advance holds the receiver and closes it on wake-up.
        if let Ok(mut rx) = self.rx.try_lock() {
            rx.close();
        }
        debug!(
            event = "stream.closed",
            domain = "edgeserver",
            channel_id = %self.channel_id
        );
        Ok(())
    }

    /// Drains the stream and returns every event, or the terminal error.
    pub async fn collect(&self) -> Result<Vec<Arc<BotEvent>>, ClientError> {
        let mut events = Vec::new();
        while self.advance().await {
            if let Some(event) = self.current() {
                events.push(event);
            }
        }
        match self.last_error() {
            Some(err) => Err(err.into()),
            None => Ok(events),
        }
    }
}

impl std::fmt::Debug for BotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotStream")
            .field("channel_id", &self.channel_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct Producer {
    http: reqwest::Client,
    url: reqwest::Url,
    api_key: String,
    message: BotMessage,
    reconnect: ReconnectPolicy,
    frame_error_policy: FrameErrorPolicy,
    max_frame_bytes: usize,
    tx: mpsc::Sender<StreamItem>,
}

async fn run_producer(producer: Producer, mut abort_rx: watch::Receiver<bool>) {
    let channel_id = producer.message.custom_channel_id.clone();
    tokio::select! {
        _ = flag_raised(&mut abort_rx) => {
            debug!(event = "stream.producer_aborted", domain = "edgeserver", channel_id = %channel_id);
        }
        _ = producer.tx.closed() => {
            debug!(event = "stream.consumer_gone", domain = "edgeserver", channel_id = %channel_id);
        }
        _ = producer.pump() => {}
    }
}

impl Producer {
    async fn pump(&self) {
        let response = match self.connect().await {
            Ok(response) => response,
            Err(err) => {
                self.push(Err(err)).await;
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            self.push(Err(StreamError::Transport {
                message: format!("server responded with status {status}: {body}"),
                status: Some(status.as_u16()),
            }))
            .await;
            return;
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new(self.max_frame_bytes);
        let mut frames = Vec::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => {
                    let pushed = decoder.push_chunk(&chunk, &mut frames);
                    for frame in frames.drain(..) {
                        if !self.forward(&frame).await {
                            return;
                        }
                    }
                    if let Err(err) = pushed {
                        self.push(Err(err)).await;
                        return;
                    }
                }
                Err(err) => {
                    self.push(Err(StreamError::transport(format!(
                        "failed to read event stream: {err}"
                    ))))
                    .await;
                    return;
                }
            }
        }
        if let Some(frame) = decoder.finish() {
            self.forward(&frame).await;
        }
        debug!(
            event = "stream.body_complete",
            domain = "edgeserver",
            channel_id = %self.message.custom_channel_id
        );
    }

    /// Establishes the connection, retrying failures that happened before any
    /// response was received.
    async fn connect(&self) -> Result<reqwest::Response, StreamError> {
        let mut retries_done = 0u32;
        loop {
            let sent = self
                .http
                .post(self.url.clone())
                .header(API_KEY_HEADER, &self.api_key)
                .header(ACCEPT, "text/event-stream")
                .json(&self.message)
                .send()
                .await;
            match sent {
                Ok(response) => return Ok(response),
                Err(err) if err.is_connect() && self.reconnect.can_retry(retries_done) => {
                    let backoff = self.reconnect.backoff_duration(retries_done);
                    info!(
                        event = "stream.reconnect_scheduled",
                        domain = "edgeserver",
                        channel_id = %self.message.custom_channel_id,
                        attempt = retries_done + 1,
                        next_attempt = retries_done + 2,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err
                    );
                    tokio::time::sleep(backoff).await;
                    retries_done = retries_done.saturating_add(1);
                }
                Err(err) => {
                    return Err(StreamError::transport(format!("request failed: {err}")));
                }
            }
        }
    }

    /// Returns `false` when the producer must stop.
    async fn forward(&self, frame: &SseFrame) -> bool {
        match decode_frame(frame) {
            Ok(None) => true,
            Ok(Some(event)) => {
                debug!(
                    event = "stream.event",
                    domain = "edgeserver",
                    channel_id = %self.message.custom_channel_id,
                    event_type = %event.event_type(),
                    event_id = %event.event_id
                );
                let run_failed = event.run_error().is_some();
                self.push(Ok(event)).await && !run_failed
            }
            Err(err) => match self.frame_error_policy {
                FrameErrorPolicy::Terminate => {
                    self.push(Err(err)).await;
                    false
                }
                FrameErrorPolicy::Skip => {
                    warn!(
                        event = "stream.frame_skipped",
                        domain = "edgeserver",
                        channel_id = %self.message.custom_channel_id,
                        error = %err
                    );
                    true
                }
            },
        }
    }

    async fn push(&self, item: StreamItem) -> bool {
        self.tx.send(item).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_detail::ErrorDetail;
    use crate::event::{EventFact, EventType};
    use crate::message::BufferedMessage;
    use std::time::Duration;

    fn event(event_id: &str, fact: EventFact) -> BotEvent {
        BotEvent {
            request_id: "r1".into(),
            event_id: event_id.into(),
            namespace: "ns".into(),
            bot_provider_name: "bot".into(),
            custom_channel_id: "c1".into(),
            fact,
        }
    }

    fn delta(event_id: &str, text: &str) -> BotEvent {
        event(
            event_id,
            EventFact::MessageDelta(BufferedMessage {
                text: text.into(),
                ..Default::default()
            }),
        )
    }

    fn stream_with(items: Vec<StreamItem>) -> BotStream {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.try_send(item).expect("capacity");
        }
        BotStream::with_receiver(rx, AbortHandle::new(), "c1".into())
    }

    #[tokio::test]
    async fn yields_events_in_order_then_finishes() {
        let stream = stream_with(vec![
            Ok(delta("e1", "He")),
            Ok(delta("e2", "llo")),
            Ok(event("e3", EventFact::RunDone)),
        ]);

        let mut ids = Vec::new();
        while stream.advance().await {
            ids.push(stream.current().expect("current").event_id.clone());
        }
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
        assert_eq!(stream.state(), StreamState::Finished);
        assert_eq!(stream.last_error(), None);
        assert!(!stream.advance().await);
    }

    #[tokio::test]
    async fn error_item_is_terminal() {
        let stream = stream_with(vec![
            Ok(delta("e1", "x")),
            Err(StreamError::decode("bad frame")),
            Ok(delta("e2", "never")),
        ]);

        assert!(stream.advance().await);
        assert!(!stream.advance().await);
        assert!(matches!(stream.last_error(), Some(StreamError::Decode { .. })));
        assert_eq!(stream.state(), StreamState::Errored);
        assert!(!stream.advance().await);
        assert_eq!(stream.current().map(|e| e.event_id.clone()), Some("e1".into()));
    }

    #[tokio::test]
    async fn run_error_event_becomes_stream_error() {
        let stream = stream_with(vec![Ok(event(
            "e7",
            EventFact::RunError(ErrorDetail::new("E42", "workflow exploded")),
        ))]);

        assert!(!stream.advance().await);
        match stream.last_error() {
            Some(StreamError::Run {
                request_id,
                event_id,
                detail,
            }) => {
                assert_eq!(request_id, "r1");
                assert_eq!(event_id, "e7");
                assert_eq!(detail.code, "E42");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn abort_wakes_pending_advance() {
        let (_tx, rx) = mpsc::channel::<StreamItem>(1);
        let abort = AbortHandle::new();
        let stream = Arc::new(BotStream::with_receiver(rx, abort.clone(), "c1".into()));

        let waiter = {
            let stream = Arc::clone(&stream);
            tokio::spawn(async move { stream.advance().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        abort.abort();

        let advanced = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("advance returned")
            .expect("join");
        assert!(!advanced);
        assert_eq!(stream.last_error(), Some(StreamError::Cancelled));
        assert!(stream.abort_handle().is_aborted());
    }

    #[tokio::test]
    async fn abort_before_advance_wins_over_buffered_items() {
        let stream = stream_with(vec![Ok(delta("e1", "x"))]);
        stream.abort_handle().abort();
        assert!(!stream.advance().await);
        assert_eq!(stream.last_error(), Some(StreamError::Cancelled));
    }

    #[tokio::test]
    async fn close_wakes_pending_advance_and_is_idempotent() {
        let (tx, rx) = mpsc::channel::<StreamItem>(1);
        let stream = Arc::new(BotStream::with_receiver(rx, AbortHandle::new(), "c1".into()));

        let waiter = {
            let stream = Arc::clone(&stream);
            tokio::spawn(async move { stream.advance().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.close().expect("close");
        stream.close().expect("close again");

        let advanced = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("advance returned")
            .expect("join");
        assert!(!advanced);
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(stream.current().is_none());
        assert_eq!(stream.last_error(), None);

        // The woken advance closed the receiver, so the producer side sees it.
        tokio::time::timeout(Duration::from_secs(1), tx.closed())
            .await
            .expect("receiver closed");
    }

    #[tokio::test]
    async fn close_drops_current_event() {
        let stream = stream_with(vec![Ok(event("e1", EventFact::RunInit))]);
        assert!(stream.advance().await);
        assert_eq!(
            stream.current().map(|e| e.event_type()),
            Some(EventType::RunInit)
        );
        stream.close().expect("close");
        assert!(stream.current().is_none());
        assert!(!stream.advance().await);
    }

    #[tokio::test]
    async fn collect_returns_stream_error() {
        let stream = stream_with(vec![
            Ok(delta("e1", "x")),
            Err(StreamError::transport("reset by peer")),
        ]);
        let err = stream.collect().await.expect_err("transport error");
        assert!(matches!(err, ClientError::Stream(StreamError::Transport { .. })));
    }
}
