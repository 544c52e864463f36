use thiserror::Error;

/// Failures internal to the feed client. None of these ever cross the
/// subscribe boundary; the connection task absorbs them and retries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transport error: {0}")]
    Transport(String),
}
