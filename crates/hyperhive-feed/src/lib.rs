//! Realtime feed client for the HyperHive dashboard.
//!
//! Owns the single persistent WebSocket to the backend event endpoint and the
//! transient UI state driven by it. [`socket::EventFeed`] keeps the
//! connection alive (reconnecting after unplanned closes), decodes each frame
//! with `hyperhive-events`, and fans the resulting message batches out to
//! subscribers. [`listener::attach_ui_listeners`] routes classified events
//! into [`progress::ProgressBoard`] (in-flight VM operations with idle
//! eviction) and [`modal::ModalSlots`] (blocking error/notification state).
//!
//! UI components never touch the socket directly; they subscribe through the
//! feed and read board/slot snapshots.

pub mod credentials;
pub mod error;
pub mod listener;
pub mod modal;
pub mod progress;
pub mod socket;

pub use error::FeedError;
pub use socket::{EventFeed, Subscription};
