//! End-to-end pipeline tests: scripted transport frames in, progress board
//! and modal slots out, through the real decode/classify/dispatch path.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;
use url::Url;

use hyperhive_events::codec::RawFrame;
use hyperhive_feed::credentials::{CredentialCache, CredentialSource, Credentials};
use hyperhive_feed::listener::attach_ui_listeners;
use hyperhive_feed::modal::ModalSlots;
use hyperhive_feed::progress::{ProgressBoard, IDLE_EVICTION};
use hyperhive_feed::socket::{Connector, EventFeed, FrameStream};
use hyperhive_feed::FeedError;

struct FixedCredentials;

impl CredentialSource for FixedCredentials {
    fn load(&self) -> Option<Credentials> {
        Some(Credentials {
            base_url: "https://hive.example.com".into(),
            token: "token".into(),
        })
    }
}

/// Delivers the scripted frames on the first connect, then stays open.
struct ScriptedConnector {
    frames: Mutex<VecDeque<RawFrame>>,
}

impl ScriptedConnector {
    fn new(frames: Vec<RawFrame>) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(frames.into()),
        })
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _url: Url) -> BoxFuture<'static, Result<FrameStream, FeedError>> {
        let frames: Vec<RawFrame> = self.frames.lock().drain(..).collect();
        async move {
            let frames = stream::iter(frames.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed();
            Ok(frames)
        }
        .boxed()
    }
}

struct Pipeline {
    feed: EventFeed,
    board: Arc<ProgressBoard>,
    slots: Arc<ModalSlots>,
}

fn pipeline(frames: Vec<RawFrame>) -> (Pipeline, hyperhive_feed::Subscription) {
    let cache = Arc::new(CredentialCache::new(Arc::new(FixedCredentials)));
    let feed = EventFeed::new(cache, ScriptedConnector::new(frames) as _);
    let board = Arc::new(ProgressBoard::new());
    let slots = Arc::new(ModalSlots::new());
    let subscription = attach_ui_listeners(&feed, Arc::clone(&board), Arc::clone(&slots));
    (Pipeline { feed, board, slots }, subscription)
}

fn text(frame: &str) -> RawFrame {
    RawFrame::Text(frame.to_string())
}

#[tokio::test(start_paused = true)]
async fn progress_updates_merge_and_evict() {
    let (pipe, _sub) = pipeline(vec![
        text(r#"{"type":"migratevm","data":"10%","extra":"webserver-abc123"}"#),
        text(r#"{"type":"migratevm","data":"70%","extra":"webserver-abc123"}"#),
    ]);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let entries = pipe.board.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "webserver-abc123");
    assert_eq!(entries[0].title, "webserver — Migrate VM");
    assert_eq!(entries[0].description, "70%");

    tokio::time::sleep(IDLE_EVICTION + Duration::from_millis(10)).await;
    assert!(pipe.board.is_empty());
}

#[tokio::test(start_paused = true)]
async fn modal_slot_takes_the_last_notification_of_a_batch() {
    // Two notifications concatenated in one frame: only the second shows.
    let (pipe, _sub) = pipeline(vec![text(concat!(
        r#"{"type":"notification","extra":"First","data":"old"}"#,
        r#"{"type":"notification","extra":"Second","data":"new"}"#,
    ))]);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let modal = pipe.slots.notification().unwrap();
    assert_eq!(modal.title, "Second");
    assert_eq!(modal.body, "new");
}

#[tokio::test(start_paused = true)]
async fn categories_do_not_interfere() {
    let (pipe, _sub) = pipeline(vec![text(concat!(
        r#"{"type":"error","data":"node unreachable"}"#,
        r#"{"type":"backupvm","data":"copying disk","extra":"db-42"}"#,
        r#"{"type":"heartbeat","data":"ignored"}"#,
    ))]);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(pipe.slots.error().unwrap().body, "node unreachable");
    assert!(pipe.slots.notification().is_none());

    let entries = pipe.board.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "db-42");
    assert_eq!(entries[0].title, "db — Copy VM");

    // The error modal needs explicit dismissal; progress eviction must not
    // touch it.
    tokio::time::sleep(IDLE_EVICTION * 2).await;
    assert!(pipe.board.is_empty());
    assert!(pipe.slots.error().is_some());

    pipe.slots.dismiss_error();
    assert!(pipe.slots.error().is_none());
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_absorbed() {
    let (pipe, _sub) = pipeline(vec![
        text("not json"),
        text(""),
        RawFrame::Binary(bytes::Bytes::from_static(&[0xff, 0xfe])),
        text(r#"{"type":"notification","data":"still alive"}"#),
    ]);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(pipe.feed.is_connected());
    let modal = pipe.slots.notification().unwrap();
    assert_eq!(modal.title, "Notification");
    assert_eq!(modal.body, "still alive");
}

#[tokio::test(start_paused = true)]
async fn detaching_the_listeners_closes_the_feed() {
    let (pipe, sub) = pipeline(vec![]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(pipe.feed.is_connected());

    sub.unsubscribe();
    assert!(!pipe.feed.is_connected());

    pipe.board.clear();
    tokio::time::sleep(IDLE_EVICTION * 2).await;
    assert!(pipe.board.is_empty());
}
