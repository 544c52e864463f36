use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

use crate::error::FeedError;

/// API base URL plus bearer token, as persisted by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub token: String,
}

/// Persisted credential store, owned by the auth layer and injected here.
pub trait CredentialSource: Send + Sync {
    /// Load the persisted credentials, if any exist.
    fn load(&self) -> Option<Credentials>;
}

/// In-memory cache in front of the persisted [`CredentialSource`].
///
/// Reads hit the cache first and fall back to the store; the cache is cleared
/// by [`invalidate`](Self::invalidate) when the app signals that stored
/// credentials changed.
pub struct CredentialCache {
    store: Arc<dyn CredentialSource>,
    cached: RwLock<Option<Credentials>>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn CredentialSource>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /// Current credentials, consulting the cache and then the store.
    /// `None` when neither has a complete set.
    pub fn resolve(&self) -> Option<Credentials> {
        if let Some(credentials) = self.cached.read().clone() {
            return Some(credentials);
        }
        let loaded = self.store.load()?;
        *self.cached.write() = Some(loaded.clone());
        Some(loaded)
    }

    /// Prime the cache directly (e.g. right after login).
    pub fn set(&self, credentials: Credentials) {
        *self.cached.write() = Some(credentials);
    }

    /// Drop the cached copy; the next [`resolve`](Self::resolve) re-reads the
    /// store. Called on the storage-changed signal.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }
}

/// Build the realtime endpoint from the configured API base URL: scheme
/// swapped to its WebSocket equivalent, trailing slashes stripped, `/ws`
/// appended, token as query parameter.
pub fn feed_endpoint(base_url: &str, token: &str) -> Result<Url, FeedError> {
    let swapped = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(FeedError::InvalidEndpoint(format!(
            "expected http(s) base URL, got {base_url}"
        )));
    };

    let mut url = Url::parse(&swapped)
        .map_err(|error| FeedError::InvalidEndpoint(format!("{base_url}: {error}")))?;
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{path}/ws"));
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
