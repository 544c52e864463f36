use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use hyperhive_events::codec::{self, RawFrame};

use crate::credentials::{feed_endpoint, CredentialCache};
use crate::error::FeedError;

/// Delay before re-establishing a dropped connection.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Frames read from one established connection; the stream ending means the
/// server closed.
pub type FrameStream = BoxStream<'static, Result<RawFrame, FeedError>>;

/// Seam between the feed and the actual transport, injected so connection
/// lifecycle behavior is testable without a live server.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>>;
}

/// Production connector over tokio-tungstenite.
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>> {
        async move {
            let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|error| FeedError::Transport(error.to_string()))?;
            let frames = ws
                .filter_map(|message| {
                    futures::future::ready(match message {
                        Ok(WsMessage::Text(text)) => Some(Ok(RawFrame::Text(text))),
                        Ok(WsMessage::Binary(bytes)) => {
                            Some(Ok(RawFrame::Binary(Bytes::from(bytes))))
                        }
                        // Ping/pong and close are handled by the transport;
                        // close also ends the stream.
                        Ok(_) => None,
                        Err(error) => Some(Err(FeedError::Transport(error.to_string()))),
                    })
                })
                .boxed();
            Ok(frames)
        }
        .boxed()
    }
}

type Handler = Box<dyn Fn(&[Value]) + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

/// The single logical connection to the backend event feed.
///
/// Exactly one transport is live at a time. Subscribers register batch
/// handlers and survive reconnects; the connection is established on the
/// first subscriber (or an explicit [`ensure_connected`](Self::ensure_connected))
/// and torn down when the last [`Subscription`] is dropped.
pub struct EventFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    credentials: Arc<CredentialCache>,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    connection: Mutex<Option<Connection>>,
}

struct Connection {
    endpoint: Url,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Connection {
    fn stop(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }
}

impl EventFeed {
    pub fn new(credentials: Arc<CredentialCache>, connector: Arc<dyn Connector>) -> Self {
        Self::with_reconnect_delay(credentials, connector, RECONNECT_DELAY)
    }

    pub fn with_reconnect_delay(
        credentials: Arc<CredentialCache>,
        connector: Arc<dyn Connector>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                credentials,
                connector,
                reconnect_delay,
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(0),
                connection: Mutex::new(None),
            }),
        }
    }

    /// Register a handler called once per raw frame with every message
    /// decoded from it, in arrival order. Handlers run synchronously on the
    /// connection task and must not subscribe or unsubscribe from within.
    ///
    /// The first subscriber brings the connection up; dropping the returned
    /// [`Subscription`] (or calling [`Subscription::unsubscribe`]) removes
    /// the handler, and the last removal closes the socket.
    pub fn subscribe(&self, handler: impl Fn(&[Value]) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push(Subscriber {
            id,
            handler: Box::new(handler),
        });
        self.ensure_connected();
        Subscription {
            feed: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Idempotently bring the connection up.
    ///
    /// Resolves credentials through the cache; when either half is missing
    /// the feed stays down and any live connection is torn down. An existing
    /// healthy connection to the current endpoint is left alone; anything
    /// else is replaced (prior transport torn down first).
    pub fn ensure_connected(&self) {
        FeedInner::ensure_connected(&self.inner);
    }

    /// External credential-change signal: drop the cached credentials, tear
    /// the connection down, and re-establish with whatever the store now
    /// holds rather than waiting for the old connection to fail.
    pub fn credentials_changed(&self) {
        self.inner.credentials.invalidate();
        self.inner.teardown();
        FeedInner::ensure_connected(&self.inner);
    }

    /// Whether a connection task is currently running.
    pub fn is_connected(&self) -> bool {
        self.inner
            .connection
            .lock()
            .as_ref()
            .is_some_and(|connection| !connection.task.is_finished())
    }

    /// Close the socket and cancel any pending reconnect. Subscribers stay
    /// registered; a later [`ensure_connected`](Self::ensure_connected)
    /// resumes delivery.
    pub fn shutdown(&self) {
        self.inner.teardown();
    }
}

impl FeedInner {
    fn ensure_connected(inner: &Arc<Self>) {
        let Some(credentials) = inner.credentials.resolve() else {
            tracing::debug!("feed credentials unavailable, staying disconnected");
            inner.teardown();
            return;
        };
        let endpoint = match feed_endpoint(&credentials.base_url, &credentials.token) {
            Ok(endpoint) => endpoint,
            Err(error) => {
                tracing::warn!(%error, "cannot build feed endpoint");
                inner.teardown();
                return;
            }
        };

        let mut connection = inner.connection.lock();
        if let Some(existing) = connection.as_ref() {
            if existing.endpoint == endpoint && !existing.task.is_finished() {
                return;
            }
        }
        if let Some(previous) = connection.take() {
            previous.stop();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Self::run(
            Arc::downgrade(inner),
            Arc::clone(&inner.connector),
            endpoint.clone(),
            inner.reconnect_delay,
            shutdown_rx,
        ));
        *connection = Some(Connection {
            endpoint,
            shutdown: shutdown_tx,
            task,
        });
    }

    fn teardown(&self) {
        if let Some(connection) = self.connection.lock().take() {
            tracing::debug!("feed connection torn down");
            connection.stop();
        }
    }

    /// Connection task: connect, read frames, dispatch, and on any failure
    /// or close wait out the reconnect delay and try again. Nothing here is
    /// ever surfaced to subscribers as an error.
    async fn run(
        feed: Weak<Self>,
        connector: Arc<dyn Connector>,
        endpoint: Url,
        reconnect_delay: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let connected = tokio::select! {
                result = connector.connect(endpoint.clone()) => result,
                _ = shutdown.changed() => return,
            };

            match connected {
                Ok(mut frames) => {
                    tracing::debug!(endpoint = %endpoint, "feed connected");
                    loop {
                        tokio::select! {
                            frame = frames.next() => match frame {
                                Some(Ok(frame)) => {
                                    let Some(feed) = feed.upgrade() else { return };
                                    feed.dispatch(&frame);
                                }
                                Some(Err(error)) => {
                                    tracing::warn!(%error, "feed read error");
                                    break;
                                }
                                None => {
                                    tracing::debug!("feed closed by server");
                                    break;
                                }
                            },
                            _ = shutdown.changed() => return,
                        }
                    }
                }
                Err(error) => tracing::warn!(%error, "feed connect failed"),
            }

            tokio::select! {
                () = tokio::time::sleep(reconnect_delay) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    fn dispatch(&self, frame: &RawFrame) {
        let batch = codec::decode_frame(frame);
        if batch.is_empty() {
            return;
        }
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            (subscriber.handler)(&batch);
        }
    }
}

/// Handle for one registered subscriber; unsubscribes on drop.
pub struct Subscription {
    feed: Weak<FeedInner>,
    id: u64,
}

impl Subscription {
    /// Explicitly remove this handler. Equivalent to dropping.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(feed) = self.feed.upgrade() else {
            return;
        };
        let now_empty = {
            let mut subscribers = feed.subscribers.lock();
            subscribers.retain(|subscriber| subscriber.id != self.id);
            subscribers.is_empty()
        };
        if now_empty {
            feed.teardown();
        }
    }
}

impl Drop for FeedInner {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.stop();
        }
    }
}
