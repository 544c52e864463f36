//! Debugging tap for a live HyperHive event feed.
//!
//! Connects with credentials from `HYPERHIVE_API_URL` / `HYPERHIVE_TOKEN`
//! and logs every classified event until interrupted:
//!
//! ```sh
//! HYPERHIVE_API_URL=https://hive.local:8006 HYPERHIVE_TOKEN=... feed-tap
//! ```

use std::sync::Arc;

use hyperhive_events::{feed_event, ui};
use hyperhive_feed::credentials::{CredentialCache, CredentialSource, Credentials};
use hyperhive_feed::socket::{EventFeed, WsConnector};

struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn load(&self) -> Option<Credentials> {
        let base_url = std::env::var("HYPERHIVE_API_URL").ok()?;
        let token = std::env::var("HYPERHIVE_TOKEN").ok()?;
        Some(Credentials { base_url, token })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cache = Arc::new(CredentialCache::new(Arc::new(EnvCredentials)));
    let feed = EventFeed::new(cache, Arc::new(WsConnector));

    let subscription = feed.subscribe(|batch| {
        for message in batch {
            if let Some(event) = ui::classify(message) {
                tracing::info!(?event, "ui event");
            } else {
                for event in feed_event::classify_all(message) {
                    tracing::info!(?event, "feed event");
                }
            }
        }
    });

    if !feed.is_connected() {
        tracing::error!("set HYPERHIVE_API_URL and HYPERHIVE_TOKEN to a reachable backend");
        std::process::exit(1);
    }

    tracing::info!("tapping feed, ctrl-c to stop");
    let _ = tokio::signal::ctrl_c().await;
    subscription.unsubscribe();
}
